/// JWT Authentication Middleware
///
/// Resolves the bearer token to an identity and injects an [`AuthContext`]
/// into request extensions, where the `Authenticated` and
/// `MaybeAuthenticated` extractors pick it up.

use actix_web::{
    body::EitherBody,
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    Error, HttpMessage, ResponseError,
};
use futures::future::LocalBoxFuture;
use std::rc::Rc;
use std::sync::Arc;

use crate::auth::AuthService;
use crate::error::AppError;
use crate::middleware::guard::{authenticate, AuthContext, GuardRejection};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GuardMode {
    /// Reject unauthenticated requests before they reach the handler
    Required,
    /// Attach an identity when one resolves, otherwise continue anonymously
    Optional,
}

pub struct JwtMiddleware {
    auth: Arc<AuthService>,
    mode: GuardMode,
}

impl JwtMiddleware {
    pub fn required(auth: Arc<AuthService>) -> Self {
        Self {
            auth,
            mode: GuardMode::Required,
        }
    }

    pub fn optional(auth: Arc<AuthService>) -> Self {
        Self {
            auth,
            mode: GuardMode::Optional,
        }
    }
}

impl<S, B> Transform<S, ServiceRequest> for JwtMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type InitError = ();
    type Transform = JwtMiddlewareService<S>;
    type Future = std::future::Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        std::future::ready(Ok(JwtMiddlewareService {
            service: Rc::new(service),
            auth: self.auth.clone(),
            mode: self.mode,
        }))
    }
}

pub struct JwtMiddlewareService<S> {
    service: Rc<S>,
    auth: Arc<AuthService>,
    mode: GuardMode,
}

impl<S, B> Service<ServiceRequest> for JwtMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = self.service.clone();
        let auth = self.auth.clone();
        let mode = self.mode;

        Box::pin(async move {
            let outcome = authenticate(&auth, req.headers()).await;
            match outcome {
                Ok(ctx) => {
                    tracing::debug!(user_id = %ctx.user_id(), role = %ctx.role(), "Request authenticated");
                    req.extensions_mut().insert::<AuthContext>(ctx);
                    service.call(req).await.map(ServiceResponse::map_into_left_body)
                }
                Err(rejection) if mode == GuardMode::Optional => {
                    match &rejection {
                        GuardRejection::MissingHeader => {}
                        GuardRejection::Store(e) => {
                            tracing::warn!(error = %e, path = req.path(), "Optional auth skipped after store failure");
                        }
                        other => {
                            tracing::debug!(reason = %other, path = req.path(), "Optional auth resolved to anonymous");
                        }
                    }
                    service.call(req).await.map(ServiceResponse::map_into_left_body)
                }
                Err(rejection) => {
                    tracing::warn!(reason = %rejection, path = req.path(), "Request rejected by access guard");
                    let response = AppError::from(rejection).error_response();
                    Ok(req.into_response(response).map_into_right_body())
                }
            }
        })
    }
}
