/// JWT Claims structure
///
/// Payload of both access and refresh tokens: the identity snapshot taken at
/// issuance plus the registered claims of RFC 7519.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Role, User};

/// Which operation a token may be used for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub user_id: Uuid,
    pub email: String,
    /// Role at issuance; not refreshed if the stored role changes later
    pub role: Role,
    pub token_type: TokenKind,
    pub iat: i64,
    pub nbf: i64,
    pub exp: i64,
    pub iss: String,
    /// Subject (user ID as UUID string)
    pub sub: String,
    /// Unique per token, keeps two pairs minted in the same second distinct
    pub jti: String,
}

impl Claims {
    /// Build claims for `user` valid from `now` for `ttl_seconds`
    ///
    /// # Arguments
    /// * `user` - Identity the token is issued to
    /// * `kind` - Access or refresh
    /// * `now` - Issue time (Unix timestamp), also used as `nbf`
    /// * `ttl_seconds` - Lifetime from `now`
    /// * `issuer` - Issuer identifier
    pub fn new(user: &User, kind: TokenKind, now: i64, ttl_seconds: i64, issuer: &str) -> Self {
        Self {
            user_id: user.id,
            email: user.email.clone(),
            role: user.role,
            token_type: kind,
            iat: now,
            nbf: now,
            exp: now + ttl_seconds,
            iss: issuer.to_string(),
            sub: user.id.to_string(),
            jti: Uuid::new_v4().to_string(),
        }
    }

    pub fn is_access(&self) -> bool {
        self.token_type == TokenKind::Access
    }

    pub fn is_refresh(&self) -> bool {
        self.token_type == TokenKind::Refresh
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> User {
        User::new(
            "test@example.com".to_string(),
            "Test".to_string(),
            "User".to_string(),
            "hash".to_string(),
        )
    }

    #[test]
    fn test_claims_creation() {
        let user = user();
        let claims = Claims::new(&user, TokenKind::Access, 1_000, 3600, "test");

        assert_eq!(claims.user_id, user.id);
        assert_eq!(claims.sub, user.id.to_string());
        assert_eq!(claims.email, "test@example.com");
        assert_eq!(claims.role, Role::User);
        assert_eq!(claims.iss, "test");
        assert_eq!(claims.nbf, claims.iat);
        assert_eq!(claims.exp, 4_600);
        assert!(claims.is_access());
        assert!(!claims.is_refresh());
    }

    #[test]
    fn test_jti_is_unique() {
        let user = user();
        let a = Claims::new(&user, TokenKind::Refresh, 1_000, 60, "test");
        let b = Claims::new(&user, TokenKind::Refresh, 1_000, 60, "test");
        assert_ne!(a.jti, b.jti);
    }

    #[test]
    fn test_token_type_wire_format() {
        let claims = Claims::new(&user(), TokenKind::Refresh, 0, 60, "test");
        let json = serde_json::to_value(&claims).unwrap();
        assert_eq!(json["token_type"], "refresh");
        assert_eq!(json["role"], "user");
    }
}
