/// Security middleware module
/// Features:
/// - Rate limiting per client IP, or per client IP and path (DoS and
///   credential-stuffing protection)
/// - Security headers (XSS, clickjacking, sniffing protection)

use std::collections::HashMap;
use std::rc::Rc;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use actix_web::{
    body::EitherBody,
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    middleware::DefaultHeaders,
    Error, ResponseError,
};
use futures::future::LocalBoxFuture;
use tokio::task::JoinHandle;

use crate::error::AppError;

/// Simple token bucket rate limiter implementation
struct TokenBucket {
    tokens: f64,
    last_refill: Instant,
    capacity: u32,
    refill_rate: f64, // tokens per second
}

impl TokenBucket {
    fn new(requests_per_minute: u32) -> Self {
        Self {
            tokens: requests_per_minute as f64,
            last_refill: Instant::now(),
            capacity: requests_per_minute,
            refill_rate: requests_per_minute as f64 / 60.0,
        }
    }

    fn refill(&mut self, now: Instant) {
        let elapsed_secs = now.saturating_duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed_secs * self.refill_rate).min(self.capacity as f64);
        self.last_refill = now;
    }

    fn try_take_token(&mut self, now: Instant) -> bool {
        self.refill(now);
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// A full bucket carries no state worth keeping
    fn is_idle(&mut self, now: Instant) -> bool {
        self.refill(now);
        self.tokens >= self.capacity as f64
    }
}

/// Per-key token buckets behind one lock
///
/// Created once at start-up and shared through `Arc`. Idle buckets are
/// dropped by [`RateLimiter::sweep`], normally driven by
/// [`RateLimiter::spawn_sweeper`].
pub struct RateLimiter {
    name: &'static str,
    requests_per_minute: u32,
    buckets: Mutex<HashMap<String, TokenBucket>>,
}

impl RateLimiter {
    pub fn new(name: &'static str, requests_per_minute: u32) -> Self {
        Self {
            name,
            requests_per_minute: requests_per_minute.max(1),
            buckets: Mutex::new(HashMap::new()),
        }
    }

    fn buckets(&self) -> MutexGuard<'_, HashMap<String, TokenBucket>> {
        self.buckets.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Take one token for `key`
    ///
    /// # Errors
    /// `RateLimited` once `key` has used up its budget for the window
    pub fn check(&self, key: &str) -> Result<(), AppError> {
        let now = Instant::now();
        let mut buckets = self.buckets();
        let bucket = buckets
            .entry(key.to_string())
            .or_insert_with(|| TokenBucket::new(self.requests_per_minute));

        if bucket.try_take_token(now) {
            Ok(())
        } else {
            tracing::warn!(limiter = self.name, key, limit = self.requests_per_minute, "Rate limit exceeded");
            Err(AppError::RateLimited)
        }
    }

    /// Drop fully refilled buckets; returns how many were removed
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let mut buckets = self.buckets();
        let before = buckets.len();
        buckets.retain(|_, bucket| !bucket.is_idle(now));
        before - buckets.len()
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn tracked_keys(&self) -> usize {
        self.buckets().len()
    }

    /// Sweep every `interval` until the returned handle is aborted
    pub fn spawn_sweeper(self: Arc<Self>, interval: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // First tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let removed = self.sweep();
                if removed > 0 {
                    tracing::debug!(limiter = self.name, removed, "Rate limiter swept");
                }
            }
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KeyScope {
    Client,
    ClientAndPath,
}

/// Rate limiting middleware keyed on the peer address
pub struct RateLimit {
    limiter: Arc<RateLimiter>,
    scope: KeyScope,
}

impl RateLimit {
    /// One budget per client across all routes
    pub fn per_client(limiter: Arc<RateLimiter>) -> Self {
        Self {
            limiter,
            scope: KeyScope::Client,
        }
    }

    /// One budget per client for each path
    pub fn per_client_and_path(limiter: Arc<RateLimiter>) -> Self {
        Self {
            limiter,
            scope: KeyScope::ClientAndPath,
        }
    }
}

impl<S, B> Transform<S, ServiceRequest> for RateLimit
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type InitError = ();
    type Transform = RateLimitService<S>;
    type Future = std::future::Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        std::future::ready(Ok(RateLimitService {
            service: Rc::new(service),
            limiter: self.limiter.clone(),
            scope: self.scope,
        }))
    }
}

pub struct RateLimitService<S> {
    service: Rc<S>,
    limiter: Arc<RateLimiter>,
    scope: KeyScope,
}

impl<S, B> Service<ServiceRequest> for RateLimitService<S>
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
        let client = req
            .peer_addr()
            .map(|addr| addr.ip().to_string())
            .unwrap_or_else(|| "unknown".to_string());
        let key = match self.scope {
            KeyScope::Client => client,
            KeyScope::ClientAndPath => format!("{}:{}", client, req.path()),
        };

        match self.limiter.check(&key) {
            Ok(()) => {
                let fut = self.service.call(req);
                Box::pin(async move { fut.await.map(ServiceResponse::map_into_left_body) })
            }
            Err(e) => {
                let response = req.into_response(e.error_response()).map_into_right_body();
                Box::pin(async move { Ok(response) })
            }
        }
    }
}

/// Security headers for HTTP responses
pub struct SecurityHeaders;

impl SecurityHeaders {
    /// Get security headers to prevent common attacks
    pub fn get_headers() -> Vec<(&'static str, &'static str)> {
        vec![
            ("X-Content-Type-Options", "nosniff"),
            ("X-Frame-Options", "DENY"),
            ("X-XSS-Protection", "1; mode=block"),
            ("Content-Security-Policy", "default-src 'none'; frame-ancestors 'none'"),
            ("Referrer-Policy", "strict-origin-when-cross-origin"),
            ("Strict-Transport-Security", "max-age=31536000; includeSubDomains"),
        ]
    }

    pub fn middleware() -> DefaultHeaders {
        Self::get_headers()
            .into_iter()
            .fold(DefaultHeaders::new(), |headers, header| headers.add(header))
    }
}
