use std::net::TcpListener;
use std::sync::Arc;

use actix_web::dev::Server;
use actix_web::{guard, web, App, HttpResponse, HttpServer};

use crate::auth::{AuthService, PasswordHasher, TokenService};
use crate::configuration::Settings;
use crate::error::{AppError, ValidationError};
use crate::logger::LoggerMiddleware;
use crate::middleware::{JwtMiddleware, RequireRole};
use crate::routes::{
    change_password, create_post, delete_post, delete_user, get_current_user, get_post,
    get_post_by_slug, get_user, health_check, list_posts, list_users, liveness, login, logout,
    my_posts, readiness, refresh, register, search_posts, system_info, update_post,
    update_user, update_user_role, update_user_status, ServerInfo,
};
use crate::security::{RateLimit, RateLimiter, SecurityHeaders};
use crate::store::{PostStore, UserStore};

const JSON_LIMIT_BYTES: usize = 64 * 1024;

/// Everything the HTTP layer shares across workers
#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<AuthService>,
    pub users: Arc<dyn UserStore>,
    pub posts: Arc<dyn PostStore>,
    /// Per client IP, across all routes
    pub global_limiter: Arc<RateLimiter>,
    /// Per client IP and path, on register/login/refresh
    pub auth_limiter: Arc<RateLimiter>,
    pub info: Arc<ServerInfo>,
}

impl AppState {
    pub fn new(settings: &Settings, users: Arc<dyn UserStore>, posts: Arc<dyn PostStore>) -> Self {
        let tokens = TokenService::from_settings(&settings.jwt, &settings.application.name);
        let auth = AuthService::new(
            users.clone(),
            tokens,
            PasswordHasher::new(settings.auth.bcrypt_cost),
            settings.auth.store_timeout(),
        );

        let global_limiter = Arc::new(RateLimiter::new(
            "global",
            settings.rate_limit.requests_per_minute,
        ));
        let auth_limiter = Arc::new(RateLimiter::new(
            "auth",
            settings.rate_limit.auth_requests_per_minute,
        ));
        let info = ServerInfo::new(
            settings.application.name.clone(),
            vec![global_limiter.clone(), auth_limiter.clone()],
        );

        Self {
            auth: Arc::new(auth),
            users,
            posts,
            global_limiter,
            auth_limiter,
            info: Arc::new(info),
        }
    }
}

async fn not_found() -> Result<HttpResponse, AppError> {
    Err(AppError::NotFound("route"))
}

pub fn run(listener: TcpListener, state: AppState) -> Result<Server, std::io::Error> {
    let auth_data = web::Data::from(state.auth.clone());
    let users_data: web::Data<dyn UserStore> = web::Data::from(state.users.clone());
    let posts_data: web::Data<dyn PostStore> = web::Data::from(state.posts.clone());
    let info_data = web::Data::from(state.info.clone());

    let server = HttpServer::new(move || {
        let auth = state.auth.clone();
        let strict = state.auth_limiter.clone();

        let json_config = web::JsonConfig::default()
            .limit(JSON_LIMIT_BYTES)
            .error_handler(|err, _req| {
                AppError::Validation(ValidationError::rule("body", err.to_string())).into()
            });
        let path_config = web::PathConfig::default().error_handler(|err, _req| {
            AppError::Validation(ValidationError::rule("id", err.to_string())).into()
        });
        let query_config = web::QueryConfig::default().error_handler(|err, _req| {
            AppError::Validation(ValidationError::rule("query", err.to_string())).into()
        });

        App::new()
            // Global middleware; the last one wrapped runs first
            .wrap(RateLimit::per_client(state.global_limiter.clone()))
            .wrap(LoggerMiddleware)
            .wrap(SecurityHeaders::middleware())

            // Shared state
            .app_data(json_config)
            .app_data(path_config)
            .app_data(query_config)
            .app_data(auth_data.clone())
            .app_data(users_data.clone())
            .app_data(posts_data.clone())
            .app_data(info_data.clone())

            .service(
                web::scope("/api/v1")
                    .service(
                        web::scope("/health")
                            .route("", web::get().to(health_check))
                            .route("/live", web::get().to(liveness))
                            .route("/ready", web::get().to(readiness)),
                    )
                    .service(
                        web::scope("/auth")
                            // Public, strictly rate limited
                            .service(
                                web::resource("/register")
                                    .wrap(RateLimit::per_client_and_path(strict.clone()))
                                    .route(web::post().to(register)),
                            )
                            .service(
                                web::resource("/login")
                                    .wrap(RateLimit::per_client_and_path(strict.clone()))
                                    .route(web::post().to(login)),
                            )
                            .service(
                                web::resource("/refresh")
                                    .wrap(RateLimit::per_client_and_path(strict.clone()))
                                    .route(web::post().to(refresh)),
                            )
                            // Protected
                            .service(
                                web::resource("/logout")
                                    .wrap(JwtMiddleware::required(auth.clone()))
                                    .route(web::post().to(logout)),
                            )
                            .service(
                                web::resource("/change-password")
                                    .wrap(JwtMiddleware::required(auth.clone()))
                                    .route(web::post().to(change_password)),
                            )
                            .service(
                                web::resource("/me")
                                    .wrap(JwtMiddleware::required(auth.clone()))
                                    .route(web::get().to(get_current_user)),
                            ),
                    )
                    .service(
                        web::scope("/users")
                            .wrap(JwtMiddleware::required(auth.clone()))
                            .service(web::resource("").route(web::get().to(list_users)))
                            .service(
                                web::resource("/{id}/status")
                                    .wrap(RequireRole::admin())
                                    .route(web::patch().to(update_user_status)),
                            )
                            .service(
                                web::resource("/{id}/role")
                                    .wrap(RequireRole::admin())
                                    .route(web::patch().to(update_user_role)),
                            )
                            // Resource guards let the admin-only DELETE share
                            // the path with the self-service routes
                            .service(
                                web::resource("/{id}")
                                    .guard(guard::Delete())
                                    .wrap(RequireRole::admin())
                                    .to(delete_user),
                            )
                            .service(
                                web::resource("/{id}")
                                    .route(web::get().to(get_user))
                                    .route(web::put().to(update_user)),
                            ),
                    )
                    .service(
                        web::scope("/posts")
                            .service(
                                web::resource("")
                                    .guard(guard::Get())
                                    .wrap(JwtMiddleware::optional(auth.clone()))
                                    .to(list_posts),
                            )
                            .service(
                                web::resource("")
                                    .wrap(JwtMiddleware::required(auth.clone()))
                                    .route(web::post().to(create_post)),
                            )
                            .service(web::resource("/search").route(web::get().to(search_posts)))
                            .service(
                                web::resource("/slug/{slug}")
                                    .wrap(JwtMiddleware::optional(auth.clone()))
                                    .route(web::get().to(get_post_by_slug)),
                            )
                            .service(
                                web::resource("/my")
                                    .wrap(JwtMiddleware::required(auth.clone()))
                                    .route(web::get().to(my_posts)),
                            )
                            .service(
                                web::resource("/{id}")
                                    .guard(guard::Get())
                                    .wrap(JwtMiddleware::optional(auth.clone()))
                                    .to(get_post),
                            )
                            .service(
                                web::resource("/{id}")
                                    .wrap(JwtMiddleware::required(auth.clone()))
                                    .route(web::put().to(update_post))
                                    .route(web::delete().to(delete_post)),
                            ),
                    )
                    .service(
                        web::scope("/admin")
                            .wrap(RequireRole::admin())
                            .wrap(JwtMiddleware::required(auth.clone()))
                            .route("/health/info", web::get().to(system_info)),
                    ),
            )
            .default_service(web::to(not_found))
    })
    .listen(listener)?
    .run();

    Ok(server)
}
