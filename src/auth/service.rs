/// Authentication flows exposed to request handlers
///
/// `AuthService` ties the credential store, the token service and the
/// password hasher together. Every credential-store call is bounded by the
/// configured store timeout.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use uuid::Uuid;

use crate::auth::claims::Claims;
use crate::auth::jwt::{TokenPair, TokenService};
use crate::auth::password::PasswordHasher;
use crate::auth::refresh_token;
use crate::error::{AppError, AuthError, ValidationError};
use crate::models::User;
use crate::store::{StoreError, StoreResult, UserStore};
use crate::validators::{validate_email, validate_name, validate_password};

/// Registration payload
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Registration {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
}

/// A freshly authenticated identity and its token pair
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub user: User,
    pub tokens: TokenPair,
}

#[derive(Clone)]
pub struct AuthService {
    users: Arc<dyn UserStore>,
    tokens: TokenService,
    hasher: PasswordHasher,
    store_timeout: Duration,
}

impl AuthService {
    pub fn new(
        users: Arc<dyn UserStore>,
        tokens: TokenService,
        hasher: PasswordHasher,
        store_timeout: Duration,
    ) -> Self {
        Self {
            users,
            tokens,
            hasher,
            store_timeout,
        }
    }

    pub fn hasher(&self) -> &PasswordHasher {
        &self.hasher
    }

    /// Run a credential-store call under the store timeout
    async fn within<T, F>(&self, op: &'static str, call: F) -> Result<T, AppError>
    where
        F: Future<Output = StoreResult<T>>,
    {
        match tokio::time::timeout(self.store_timeout, call).await {
            Ok(result) => result.map_err(AppError::Store),
            Err(_) => {
                tracing::error!(op, timeout_ms = self.store_timeout.as_millis() as u64, "Credential store call timed out");
                Err(AppError::Store(StoreError::Timeout))
            }
        }
    }

    async fn store_refresh_token(&self, user: &mut User, tokens: &TokenPair) -> Result<(), AppError> {
        let fingerprint = refresh_token::fingerprint(&tokens.refresh_token);
        self.within(
            "update_refresh_token",
            self.users.update_refresh_token(user.id, Some(&fingerprint)),
        )
        .await
        .map_err(user_missing)?;
        user.refresh_token_hash = Some(fingerprint);
        Ok(())
    }

    /// Create an account and sign it in
    ///
    /// # Errors
    /// - `Validation` for malformed input
    /// - `Conflict` if the email is already registered
    pub async fn register(&self, registration: Registration) -> Result<AuthSession, AppError> {
        let email = validate_email(&registration.email)?;
        let first_name = validate_name("first_name", &registration.first_name)?;
        let last_name = validate_name("last_name", &registration.last_name)?;
        validate_password("password", &registration.password)?;

        if self.within("exists_by_email", self.users.exists_by_email(&email)).await? {
            return Err(AppError::Conflict("Email already exists".to_string()));
        }

        let password_hash = self.hasher.hash(&registration.password).await?;
        let mut user = User::new(email, first_name, last_name, password_hash);

        match self.within("create", self.users.create(&user)).await {
            Ok(()) => {}
            // Lost a race with a concurrent registration of the same email
            Err(AppError::Store(StoreError::Duplicate(_))) => {
                return Err(AppError::Conflict("Email already exists".to_string()));
            }
            Err(e) => return Err(e),
        }

        let tokens = self.tokens.issue_pair(&user)?;
        self.store_refresh_token(&mut user, &tokens).await?;

        tracing::info!(user_id = %user.id, "User registered");
        Ok(AuthSession { user, tokens })
    }

    /// Authenticate with email and password
    ///
    /// An unknown email and a wrong password fail identically, with the same
    /// amount of hashing work.
    ///
    /// # Errors
    /// - `InvalidCredentials` for an unknown email or wrong password
    /// - `Forbidden` if the password is right but the account is not active
    pub async fn login(&self, email: &str, password: &str) -> Result<AuthSession, AppError> {
        let email = validate_email(email)?;
        if password.is_empty() {
            return Err(ValidationError::EmptyField("password".to_string()).into());
        }

        let user = self.within("find_by_email", self.users.find_by_email(&email)).await?;
        let mut user = match user {
            Some(user) => user,
            None => {
                self.hasher.verify_dummy(password).await;
                tracing::info!("Login failed: unknown email");
                return Err(AuthError::InvalidCredentials.into());
            }
        };

        if !self.hasher.verify(password, &user.password_hash).await {
            tracing::info!(user_id = %user.id, "Login failed: wrong password");
            return Err(AuthError::InvalidCredentials.into());
        }

        if !user.is_active() {
            tracing::info!(user_id = %user.id, status = %user.status, "Login refused: account not active");
            return Err(AppError::forbidden("Account is not active"));
        }

        let tokens = self.tokens.issue_pair(&user)?;
        self.store_refresh_token(&mut user, &tokens).await?;

        if let Err(e) = self.within("touch_last_login", self.users.touch_last_login(user.id)).await {
            tracing::warn!(user_id = %user.id, error = %e, "Failed to record last login");
        }

        tracing::info!(user_id = %user.id, "User logged in");
        Ok(AuthSession { user, tokens })
    }

    /// Clear the stored refresh token; outstanding access tokens stay valid
    /// until they expire
    pub async fn logout(&self, user_id: Uuid) -> Result<(), AppError> {
        self.within("update_refresh_token", self.users.update_refresh_token(user_id, None))
            .await
            .map_err(user_missing)?;
        tracing::info!(user_id = %user_id, "User logged out");
        Ok(())
    }

    /// Exchange a refresh token for a new pair, superseding the presented one
    ///
    /// # Errors
    /// - `InvalidToken` if the token is invalid, not a refresh token, not the
    ///   currently stored one, or lost a race with a concurrent refresh
    /// - `NotFound` if the identity no longer exists
    /// - `Forbidden` if the account is not active
    pub async fn refresh_tokens(&self, token: &str) -> Result<TokenPair, AppError> {
        if token.trim().is_empty() {
            return Err(ValidationError::EmptyField("refresh_token".to_string()).into());
        }

        let claims = self.tokens.validate(token)?;
        if !claims.is_refresh() {
            tracing::info!(user_id = %claims.user_id, "Refresh refused: not a refresh token");
            return Err(AuthError::InvalidToken.into());
        }

        let user = self.identity_from_claims(&claims).await?;

        let stored = match user.refresh_token_hash.as_deref() {
            Some(stored) if refresh_token::matches(token, Some(stored)) => stored.to_owned(),
            _ => {
                tracing::warn!(user_id = %user.id, "Refresh refused: token superseded or revoked");
                return Err(AuthError::InvalidToken.into());
            }
        };

        if !user.is_active() {
            return Err(AppError::forbidden("Account is not active"));
        }

        let tokens = self.tokens.issue_pair(&user)?;
        let replacement = refresh_token::fingerprint(&tokens.refresh_token);
        let swapped = self
            .within(
                "rotate_refresh_token",
                self.users.rotate_refresh_token(user.id, &stored, &replacement),
            )
            .await?;

        if !swapped {
            tracing::warn!(user_id = %user.id, "Refresh refused: concurrent rotation won");
            return Err(AuthError::InvalidToken.into());
        }

        tracing::debug!(user_id = %user.id, "Tokens refreshed");
        Ok(tokens)
    }

    pub fn validate_token(&self, token: &str) -> Result<Claims, AuthError> {
        self.tokens.validate(token)
    }

    /// Load the current identity named by `claims`
    ///
    /// # Errors
    /// `NotFound("user")` if the account is gone or deleted
    pub async fn identity_from_claims(&self, claims: &Claims) -> Result<User, AppError> {
        self.within("find_by_id", self.users.find_by_id(claims.user_id))
            .await?
            .ok_or(AppError::NotFound("user"))
    }

    /// Replace the password after checking the current one, then sign the
    /// account out of refresh
    ///
    /// # Errors
    /// - `InvalidPassword` if `old_password` is wrong; nothing is changed
    /// - `Validation` if `new_password` is too weak
    pub async fn change_password(
        &self,
        user_id: Uuid,
        old_password: &str,
        new_password: &str,
    ) -> Result<(), AppError> {
        if old_password.is_empty() {
            return Err(ValidationError::EmptyField("old_password".to_string()).into());
        }
        validate_password("new_password", new_password)?;

        let user = self
            .within("find_by_id", self.users.find_by_id(user_id))
            .await?
            .ok_or(AppError::NotFound("user"))?;

        if !self.hasher.verify(old_password, &user.password_hash).await {
            tracing::info!(user_id = %user_id, "Password change refused: wrong current password");
            return Err(AuthError::InvalidPassword.into());
        }

        let password_hash = self.hasher.hash(new_password).await?;
        self.within("replace_password", self.users.replace_password(user_id, &password_hash))
            .await
            .map_err(user_missing)?;

        tracing::info!(user_id = %user_id, "Password changed");
        Ok(())
    }
}

fn user_missing(err: AppError) -> AppError {
    match err {
        AppError::Store(StoreError::NotFound) => AppError::NotFound("user"),
        other => other,
    }
}
