/// JWT Token Generation and Validation
///
/// Issues access/refresh pairs signed with a single shared HS256 secret and
/// validates presented tokens against that secret, the configured issuer and
/// the current time.

use chrono::{DateTime, Duration, TimeZone, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::auth::claims::{Claims, TokenKind};
use crate::configuration::JwtSettings;
use crate::error::{AppError, AuthError};
use crate::models::User;

/// Access and refresh token issued together
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    /// Expiry of the access token
    pub expires_at: DateTime<Utc>,
    pub token_type: String,
}

#[derive(Clone)]
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    issuer: String,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenService {
    pub fn new(secret: &str, issuer: &str, access_ttl: Duration, refresh_ttl: Duration) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.validate_nbf = true;
        validation.set_issuer(&[issuer]);
        validation.set_required_spec_claims(&["exp", "nbf", "iss", "sub"]);

        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            issuer: issuer.to_string(),
            access_ttl,
            refresh_ttl,
        }
    }

    /// Build from configuration; `issuer` is the application name
    pub fn from_settings(settings: &JwtSettings, issuer: &str) -> Self {
        Self::new(
            &settings.secret,
            issuer,
            Duration::hours(settings.access_token_expiry_hours),
            Duration::hours(settings.refresh_token_expiry_hours),
        )
    }

    /// Generate a new access/refresh pair for `user`
    ///
    /// Both tokens share `iat` and `nbf`. Nothing is persisted here.
    ///
    /// # Errors
    /// Returns error if signing fails
    pub fn issue_pair(&self, user: &User) -> Result<TokenPair, AppError> {
        let now = Utc::now().timestamp();
        let access = Claims::new(user, TokenKind::Access, now, self.access_ttl.num_seconds(), &self.issuer);
        let refresh = Claims::new(user, TokenKind::Refresh, now, self.refresh_ttl.num_seconds(), &self.issuer);

        let expires_at = Utc
            .timestamp_opt(access.exp, 0)
            .single()
            .ok_or_else(|| AppError::Internal("Token expiry out of range".to_string()))?;

        Ok(TokenPair {
            access_token: self.sign(&access)?,
            refresh_token: self.sign(&refresh)?,
            expires_at,
            token_type: "Bearer".to_string(),
        })
    }

    fn sign(&self, claims: &Claims) -> Result<String, AppError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)
            .map_err(|e| AppError::Internal(format!("Token generation failed: {}", e)))
    }

    /// Validate a token and extract its claims
    ///
    /// # Errors
    /// [`AuthError::InvalidToken`] if the token is malformed, signed with
    /// another key or algorithm, expired, not yet valid, or from another
    /// issuer. The reason is logged, never returned.
    pub fn validate(&self, token: &str) -> Result<Claims, AuthError> {
        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::debug!(reason = %e, "JWT validation failed");
                AuthError::InvalidToken
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret-key-at-least-32-characters-long";

    fn service() -> TokenService {
        TokenService::new(SECRET, "test", Duration::hours(24), Duration::hours(168))
    }

    fn user() -> User {
        User::new(
            "test@example.com".to_string(),
            "Test".to_string(),
            "User".to_string(),
            "hash".to_string(),
        )
    }

    #[test]
    fn test_issue_and_validate_pair() {
        let service = service();
        let user = user();

        let pair = service.issue_pair(&user).expect("Failed to issue tokens");
        assert_eq!(pair.token_type, "Bearer");

        let access = service.validate(&pair.access_token).expect("Failed to validate access token");
        let refresh = service.validate(&pair.refresh_token).expect("Failed to validate refresh token");

        assert_eq!(access.user_id, user.id);
        assert_eq!(access.sub, user.id.to_string());
        assert_eq!(access.token_type, TokenKind::Access);
        assert_eq!(refresh.token_type, TokenKind::Refresh);
        assert_eq!(access.iat, refresh.iat);
        assert_eq!(access.exp - access.iat, 24 * 3600);
        assert_eq!(refresh.exp - refresh.iat, 168 * 3600);
        assert_eq!(pair.expires_at.timestamp(), access.exp);
    }

    #[test]
    fn test_consecutive_pairs_differ() {
        let service = service();
        let user = user();
        let a = service.issue_pair(&user).unwrap();
        let b = service.issue_pair(&user).unwrap();
        assert_ne!(a.refresh_token, b.refresh_token);
    }

    #[test]
    fn test_invalid_token() {
        assert_eq!(service().validate("invalid.token.here").unwrap_err(), AuthError::InvalidToken);
        assert_eq!(service().validate("").unwrap_err(), AuthError::InvalidToken);
    }

    #[test]
    fn test_tampered_token() {
        let service = service();
        let pair = service.issue_pair(&user()).unwrap();

        let tampered = format!("{}X", pair.access_token);
        assert!(service.validate(&tampered).is_err());
    }

    #[test]
    fn test_wrong_secret() {
        let pair = service().issue_pair(&user()).unwrap();
        let other = TokenService::new(
            "another-secret-key-at-least-32-characters",
            "test",
            Duration::hours(24),
            Duration::hours(168),
        );
        assert!(other.validate(&pair.access_token).is_err());
    }

    #[test]
    fn test_wrong_issuer() {
        let pair = service().issue_pair(&user()).unwrap();
        let other = TokenService::new(SECRET, "wrong-issuer", Duration::hours(24), Duration::hours(168));
        assert!(other.validate(&pair.access_token).is_err());
    }

    #[test]
    fn test_other_hmac_width_is_rejected() {
        let service = service();
        let now = Utc::now().timestamp();
        let claims = Claims::new(&user(), TokenKind::Access, now, 3600, "test");
        let token = encode(
            &Header::new(Algorithm::HS512),
            &claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap();

        assert!(service.validate(&token).is_err());
    }

    #[test]
    fn test_asymmetric_header_is_rejected() {
        let service = service();
        let pair = service.issue_pair(&user()).unwrap();

        // {"alg":"RS256","typ":"JWT"} over a payload signed with the shared secret
        let mut parts = pair.access_token.splitn(2, '.');
        parts.next();
        let forged = format!("eyJhbGciOiJSUzI1NiIsInR5cCI6IkpXVCJ9.{}", parts.next().unwrap());

        assert!(service.validate(&forged).is_err());
    }

    #[test]
    fn test_expired_token() {
        let service = service();
        let now = Utc::now().timestamp();
        let claims = Claims::new(&user(), TokenKind::Access, now - 120, 60, "test");
        let token = service.sign(&claims).unwrap();

        assert!(service.validate(&token).is_err());
    }

    #[test]
    fn test_not_yet_valid_token() {
        let service = service();
        let now = Utc::now().timestamp();
        let claims = Claims::new(&user(), TokenKind::Access, now + 600, 3600, "test");
        let token = service.sign(&claims).unwrap();

        assert!(service.validate(&token).is_err());
    }
}
