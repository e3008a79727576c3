use std::sync::Arc;
use std::time::Instant;

use actix_web::{web, HttpResponse};
use serde_json::{json, Map, Value};

use crate::middleware::Authenticated;
use crate::security::RateLimiter;
use crate::store::UserStore;

/// Process facts reported by the admin info endpoint
pub struct ServerInfo {
    name: String,
    started_at: Instant,
    limiters: Vec<Arc<RateLimiter>>,
}

impl ServerInfo {
    pub fn new(name: impl Into<String>, limiters: Vec<Arc<RateLimiter>>) -> Self {
        Self {
            name: name.into(),
            started_at: Instant::now(),
            limiters,
        }
    }
}

/// GET /api/v1/health
pub async fn health_check() -> HttpResponse {
    tracing::debug!("Health check endpoint called");
    HttpResponse::Ok().json(json!({
        "status": "ok",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

/// GET /api/v1/health/live
pub async fn liveness() -> HttpResponse {
    HttpResponse::Ok().json(json!({ "status": "alive" }))
}

/// GET /api/v1/health/ready
///
/// Ready only while the credential store answers.
pub async fn readiness(users: web::Data<dyn UserStore>) -> HttpResponse {
    match users.ping().await {
        Ok(()) => HttpResponse::Ok().json(json!({ "status": "ready", "database": "up" })),
        Err(e) => {
            tracing::warn!(error = %e, "Readiness check failed");
            HttpResponse::ServiceUnavailable().json(json!({ "status": "not ready", "database": "down" }))
        }
    }
}

/// GET /api/v1/admin/health/info (admin)
pub async fn system_info(caller: Authenticated, info: web::Data<ServerInfo>) -> HttpResponse {
    let tracked: Map<String, Value> = info
        .limiters
        .iter()
        .map(|limiter| (limiter.name().to_string(), json!(limiter.tracked_keys())))
        .collect();

    tracing::debug!(user_id = %caller.user_id(), "System info requested");
    HttpResponse::Ok().json(json!({
        "name": info.name,
        "version": env!("CARGO_PKG_VERSION"),
        "os": std::env::consts::OS,
        "arch": std::env::consts::ARCH,
        "cpu_count": std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1),
        "uptime_seconds": info.started_at.elapsed().as_secs(),
        "rate_limited_clients": tracked,
    }))
}
