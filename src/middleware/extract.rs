/// Typed access to the identity attached by [`super::JwtMiddleware`]

use std::future::{ready, Ready};

use actix_web::{dev::Payload, FromRequest, HttpMessage, HttpRequest};

use crate::error::{AppError, AuthError};
use crate::middleware::guard::AuthContext;

/// Caller identity on a route behind the required guard
///
/// Extraction fails with 401 if no identity was attached, e.g. when the route
/// was mounted without the guard.
#[derive(Debug, Clone)]
pub struct Authenticated(pub AuthContext);

impl FromRequest for Authenticated {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        let ctx = req.extensions().get::<AuthContext>().cloned();
        ready(
            ctx.map(Authenticated)
                .ok_or(AppError::Auth(AuthError::Unauthorized)),
        )
    }
}

impl std::ops::Deref for Authenticated {
    type Target = AuthContext;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// Caller identity on a route behind the optional guard; `None` for
/// anonymous callers
#[derive(Debug, Clone)]
pub struct MaybeAuthenticated(pub Option<AuthContext>);

impl FromRequest for MaybeAuthenticated {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(Ok(MaybeAuthenticated(
            req.extensions().get::<AuthContext>().cloned(),
        )))
    }
}
