//! Shared harness: the full server on a random port, backed by in-memory stores

#![allow(dead_code)]

use std::net::TcpListener;
use std::sync::Arc;

use blog_backend::configuration::{
    ApplicationSettings, AuthSettings, DatabaseSettings, JwtSettings, LogFormat, LogSettings,
    RateLimitSettings, Settings,
};
use blog_backend::models::{Role, UserStatus};
use blog_backend::startup::{run, AppState};
use blog_backend::store::{InMemoryPostStore, InMemoryUserStore, UserStore};
use serde_json::{json, Value};
use uuid::Uuid;

pub const PASSWORD: &str = "ValidPass123!";

pub struct TestApp {
    pub address: String,
    pub client: reqwest::Client,
    pub users: Arc<InMemoryUserStore>,
    pub posts: Arc<InMemoryPostStore>,
}

/// A registered account and the tokens it was issued
pub struct TestUser {
    pub id: Uuid,
    pub email: String,
    pub access_token: String,
    pub refresh_token: String,
}

pub fn test_settings() -> Settings {
    Settings {
        application: ApplicationSettings {
            host: "127.0.0.1".to_string(),
            port: 0,
            name: "blog_backend_test".to_string(),
        },
        database: DatabaseSettings {
            username: "unused".to_string(),
            password: "unused".to_string(),
            port: 5432,
            host: "localhost".to_string(),
            database_name: "unused".to_string(),
            max_connections: 1,
        },
        jwt: JwtSettings {
            secret: "integration-test-secret-at-least-32-characters".to_string(),
            access_token_expiry_hours: 24,
            refresh_token_expiry_hours: 168,
        },
        auth: AuthSettings {
            bcrypt_cost: 4,
            store_timeout_ms: 5000,
        },
        rate_limit: RateLimitSettings {
            requests_per_minute: 10_000,
            auth_requests_per_minute: 10_000,
            sweep_interval_secs: 60,
        },
        log: LogSettings {
            level: "warn".to_string(),
            format: LogFormat::Pretty,
        },
    }
}

pub async fn spawn_app() -> TestApp {
    spawn_app_with(test_settings()).await
}

pub async fn spawn_app_with(settings: Settings) -> TestApp {
    let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();

    let users = Arc::new(InMemoryUserStore::new());
    let posts = Arc::new(InMemoryPostStore::new());
    let state = AppState::new(&settings, users.clone(), posts.clone());

    let server = run(listener, state).expect("Failed to create server");
    let _ = tokio::spawn(server);

    TestApp {
        address: format!("http://127.0.0.1:{}/api/v1", port),
        client: reqwest::Client::new(),
        users,
        posts,
    }
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.address, path)
    }

    pub async fn post_json(&self, path: &str, body: &Value) -> reqwest::Response {
        self.client
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .expect("Failed to execute request")
    }

    pub async fn get_authed(&self, path: &str, token: &str) -> reqwest::Response {
        self.client
            .get(self.url(path))
            .bearer_auth(token)
            .send()
            .await
            .expect("Failed to execute request")
    }

    pub async fn register(&self, email: &str) -> TestUser {
        let response = self
            .post_json(
                "/auth/register",
                &json!({
                    "email": email,
                    "password": PASSWORD,
                    "first_name": "Test",
                    "last_name": "User",
                }),
            )
            .await;
        assert_eq!(201, response.status().as_u16(), "registration of {} failed", email);

        let body: Value = response.json().await.expect("Failed to parse response");
        TestUser {
            id: body["user"]["id"].as_str().unwrap().parse().unwrap(),
            email: email.to_string(),
            access_token: body["tokens"]["access_token"].as_str().unwrap().to_string(),
            refresh_token: body["tokens"]["refresh_token"].as_str().unwrap().to_string(),
        }
    }

    /// Register and promote to admin directly in the store
    pub async fn register_admin(&self, email: &str) -> TestUser {
        let admin = self.register(email).await;
        self.users.update_role(admin.id, Role::Admin).await.unwrap();
        admin
    }

    pub async fn set_status(&self, id: Uuid, status: UserStatus) {
        self.users.update_status(id, status).await.unwrap();
    }
}

pub async fn error_code(response: reqwest::Response) -> String {
    let body: Value = response.json().await.expect("Failed to parse error body");
    body["code"].as_str().unwrap_or_default().to_string()
}
