/// Token-to-identity resolution shared by the required and optional guards

use actix_web::http::header::{HeaderMap, AUTHORIZATION};
use thiserror::Error;
use uuid::Uuid;

use crate::auth::{AuthService, Claims};
use crate::error::{AppError, AuthError};
use crate::models::{Role, User};
use crate::store::StoreError;

const BEARER_PREFIX: &str = "Bearer ";

/// Identity resolved for the current request
#[derive(Debug, Clone)]
pub struct AuthContext {
    /// Current stored record, loaded after the token was validated
    pub user: User,
    pub claims: Claims,
}

impl AuthContext {
    pub fn user_id(&self) -> Uuid {
        self.user.id
    }

    pub fn role(&self) -> Role {
        self.user.role
    }

    pub fn is_admin(&self) -> bool {
        self.user.is_admin()
    }

    /// Owner of the resource, or an admin
    pub fn can_manage(&self, owner_id: Uuid) -> bool {
        self.user.id == owner_id || self.is_admin()
    }
}

/// Why a request could not be resolved to an identity
///
/// Logged server-side; clients only ever see a uniform 401 (or a 500 for
/// `Store`).
#[derive(Debug, Error)]
pub enum GuardRejection {
    #[error("missing Authorization header")]
    MissingHeader,
    #[error("Authorization header is not a Bearer credential")]
    MalformedHeader,
    #[error("empty bearer token")]
    EmptyToken,
    #[error("token failed validation")]
    InvalidToken,
    #[error("token is not an access token")]
    WrongTokenKind,
    #[error("token names an unknown identity")]
    UnknownIdentity,
    #[error("identity is not active")]
    InactiveIdentity,
    #[error("credential store failure: {0}")]
    Store(StoreError),
}

impl From<GuardRejection> for AppError {
    fn from(rejection: GuardRejection) -> Self {
        match rejection {
            GuardRejection::Store(e) => AppError::Store(e),
            _ => AppError::Auth(AuthError::Unauthorized),
        }
    }
}

/// Resolve the request's `Authorization` header to an active identity
///
/// Checks run in order and stop at the first failure: header present,
/// `Bearer ` prefix, non-empty token, valid token, access kind, identity
/// exists, identity active.
pub async fn authenticate(auth: &AuthService, headers: &HeaderMap) -> Result<AuthContext, GuardRejection> {
    let header = headers
        .get(AUTHORIZATION)
        .ok_or(GuardRejection::MissingHeader)?
        .to_str()
        .map_err(|_| GuardRejection::MalformedHeader)?;

    let token = header
        .strip_prefix(BEARER_PREFIX)
        .ok_or(GuardRejection::MalformedHeader)?
        .trim();
    if token.is_empty() {
        return Err(GuardRejection::EmptyToken);
    }

    let claims = auth
        .validate_token(token)
        .map_err(|_| GuardRejection::InvalidToken)?;
    if !claims.is_access() {
        return Err(GuardRejection::WrongTokenKind);
    }

    let user = match auth.identity_from_claims(&claims).await {
        Ok(user) => user,
        Err(AppError::NotFound(_)) => return Err(GuardRejection::UnknownIdentity),
        Err(AppError::Store(e)) => return Err(GuardRejection::Store(e)),
        Err(other) => return Err(GuardRejection::Store(StoreError::Backend(other.to_string()))),
    };
    if !user.is_active() {
        return Err(GuardRejection::InactiveIdentity);
    }

    Ok(AuthContext { user, claims })
}

/// Role gate: the caller must be known (else 401) and hold one of `allowed`
/// (else 403)
pub fn require_role(ctx: Option<&AuthContext>, allowed: &[Role]) -> Result<(), AppError> {
    let ctx = ctx.ok_or(AppError::Auth(AuthError::Unauthorized))?;
    if allowed.contains(&ctx.role()) {
        Ok(())
    } else {
        tracing::info!(user_id = %ctx.user_id(), role = %ctx.role(), "Insufficient role");
        Err(AppError::forbidden("Insufficient permissions"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use actix_web::http::header::HeaderValue;

    use crate::auth::{AuthSession, PasswordHasher, Registration, TokenService};
    use crate::models::UserStatus;
    use crate::store::{InMemoryUserStore, UserStore};

    async fn setup() -> (AuthService, Arc<InMemoryUserStore>, AuthSession) {
        let store = Arc::new(InMemoryUserStore::new());
        let auth = AuthService::new(
            store.clone(),
            TokenService::new(
                "test-secret-key-at-least-32-characters-long",
                "test",
                chrono::Duration::hours(1),
                chrono::Duration::hours(2),
            ),
            PasswordHasher::new(4),
            Duration::from_secs(5),
        );
        let session = auth
            .register(Registration {
                email: "guard@example.com".to_string(),
                password: "ValidPass123!".to_string(),
                first_name: "Guard".to_string(),
                last_name: "Test".to_string(),
            })
            .await
            .unwrap();
        (auth, store, session)
    }

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[tokio::test]
    async fn test_valid_access_token_resolves() {
        let (auth, _, session) = setup().await;
        let ctx = authenticate(&auth, &headers(&format!("Bearer {}", session.tokens.access_token)))
            .await
            .unwrap();
        assert_eq!(ctx.user_id(), session.user.id);
        assert_eq!(ctx.claims.user_id, session.user.id);
    }

    #[tokio::test]
    async fn test_rejections_are_distinct() {
        let (auth, _, session) = setup().await;

        assert!(matches!(
            authenticate(&auth, &HeaderMap::new()).await,
            Err(GuardRejection::MissingHeader)
        ));
        assert!(matches!(
            authenticate(&auth, &headers(&format!("Token {}", session.tokens.access_token))).await,
            Err(GuardRejection::MalformedHeader)
        ));
        assert!(matches!(
            authenticate(&auth, &headers("Bearer ")).await,
            Err(GuardRejection::EmptyToken)
        ));
        assert!(matches!(
            authenticate(&auth, &headers("Bearer not.a.jwt")).await,
            Err(GuardRejection::InvalidToken)
        ));
        assert!(matches!(
            authenticate(&auth, &headers(&format!("Bearer {}", session.tokens.refresh_token))).await,
            Err(GuardRejection::WrongTokenKind)
        ));
    }

    #[tokio::test]
    async fn test_banned_identity_is_rejected() {
        let (auth, store, session) = setup().await;
        store.update_status(session.user.id, UserStatus::Banned).await.unwrap();

        let result = authenticate(&auth, &headers(&format!("Bearer {}", session.tokens.access_token))).await;
        assert!(matches!(result, Err(GuardRejection::InactiveIdentity)));
    }

    #[tokio::test]
    async fn test_deleted_identity_is_unknown() {
        let (auth, store, session) = setup().await;
        store.delete(session.user.id).await.unwrap();

        let result = authenticate(&auth, &headers(&format!("Bearer {}", session.tokens.access_token))).await;
        assert!(matches!(result, Err(GuardRejection::UnknownIdentity)));
    }

    #[tokio::test]
    async fn test_role_gate() {
        let (auth, store, session) = setup().await;
        let bearer = headers(&format!("Bearer {}", session.tokens.access_token));
        let ctx = authenticate(&auth, &bearer).await.unwrap();

        assert!(require_role(Some(&ctx), &[Role::User]).is_ok());
        let forbidden = require_role(Some(&ctx), &[Role::Admin]).unwrap_err();
        assert!(matches!(forbidden, AppError::Auth(AuthError::Forbidden(_))));
        let unknown = require_role(None, &[Role::Admin]).unwrap_err();
        assert!(matches!(unknown, AppError::Auth(AuthError::Unauthorized)));

        // The gate reads the stored role, not the one frozen in the token
        store.update_role(session.user.id, Role::Admin).await.unwrap();
        let ctx = authenticate(&auth, &bearer).await.unwrap();
        assert!(require_role(Some(&ctx), &[Role::Admin]).is_ok());
    }

    #[test]
    fn test_rejection_maps_to_uniform_unauthorized() {
        let err: AppError = GuardRejection::InactiveIdentity.into();
        assert!(matches!(err, AppError::Auth(AuthError::Unauthorized)));
        let err: AppError = GuardRejection::Store(StoreError::Timeout).into();
        assert!(matches!(err, AppError::Store(StoreError::Timeout)));
    }
}
