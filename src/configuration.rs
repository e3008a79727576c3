use std::time::Duration;

use config::ConfigError;

const MIN_SECRET_LENGTH: usize = 32;

#[derive(serde::Deserialize, Clone, Debug)]
pub struct Settings {
    pub application: ApplicationSettings,
    pub database: DatabaseSettings,
    pub jwt: JwtSettings,
    #[serde(default)]
    pub auth: AuthSettings,
    #[serde(default)]
    pub rate_limit: RateLimitSettings,
    #[serde(default)]
    pub log: LogSettings,
}

#[derive(serde::Deserialize, Clone, Debug)]
pub struct ApplicationSettings {
    #[serde(default = "default_host")]
    pub host: String,
    pub port: u16,
    /// Also the issuer (`iss`) of every token
    #[serde(default = "default_name")]
    pub name: String,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_name() -> String {
    "blog_backend".to_string()
}

#[derive(serde::Deserialize, Clone, Debug)]
pub struct DatabaseSettings {
    pub username: String,
    pub password: String,
    pub port: u16,
    pub host: String,
    pub database_name: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    10
}

impl DatabaseSettings {
    pub fn connection_string(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.username, self.password, self.host, self.port, self.database_name
        )
    }

    /// Server connection without a database, for creating one
    pub fn connection_string_without_db(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}",
            self.username, self.password, self.host, self.port
        )
    }
}

/// JWT authentication settings
#[derive(serde::Deserialize, Clone)]
pub struct JwtSettings {
    pub secret: String,
    #[serde(default = "default_access_expiry")]
    pub access_token_expiry_hours: i64,
    #[serde(default = "default_refresh_expiry")]
    pub refresh_token_expiry_hours: i64,
}

fn default_access_expiry() -> i64 {
    24
}

fn default_refresh_expiry() -> i64 {
    168
}

// Keeps the secret out of logs
impl std::fmt::Debug for JwtSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtSettings")
            .field("secret", &"<redacted>")
            .field("access_token_expiry_hours", &self.access_token_expiry_hours)
            .field("refresh_token_expiry_hours", &self.refresh_token_expiry_hours)
            .finish()
    }
}

#[derive(serde::Deserialize, Clone, Debug)]
#[serde(default)]
pub struct AuthSettings {
    pub bcrypt_cost: u32,
    pub store_timeout_ms: u64,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            bcrypt_cost: bcrypt::DEFAULT_COST,
            store_timeout_ms: 5000,
        }
    }
}

impl AuthSettings {
    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }
}

#[derive(serde::Deserialize, Clone, Debug)]
#[serde(default)]
pub struct RateLimitSettings {
    /// Per client IP, across all routes
    pub requests_per_minute: u32,
    /// Per client IP and path, on register/login/refresh
    pub auth_requests_per_minute: u32,
    pub sweep_interval_secs: u64,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            requests_per_minute: 100,
            auth_requests_per_minute: 10,
            sweep_interval_secs: 60,
        }
    }
}

#[derive(serde::Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Pretty,
}

#[derive(serde::Deserialize, Clone, Debug)]
#[serde(default)]
pub struct LogSettings {
    pub level: String,
    pub format: LogFormat,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Json,
        }
    }
}

impl Settings {
    /// Reject settings the server cannot run safely with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.jwt.secret.len() < MIN_SECRET_LENGTH {
            return Err(ConfigError::Message(format!(
                "jwt.secret must be at least {} characters",
                MIN_SECRET_LENGTH
            )));
        }
        if self.jwt.access_token_expiry_hours <= 0 || self.jwt.refresh_token_expiry_hours <= 0 {
            return Err(ConfigError::Message("token expiry must be positive".to_string()));
        }
        if !(4..=31).contains(&self.auth.bcrypt_cost) {
            return Err(ConfigError::Message("auth.bcrypt_cost must be between 4 and 31".to_string()));
        }
        if self.auth.store_timeout_ms == 0 {
            return Err(ConfigError::Message("auth.store_timeout_ms must be positive".to_string()));
        }
        if self.rate_limit.sweep_interval_secs == 0 {
            return Err(ConfigError::Message(
                "rate_limit.sweep_interval_secs must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Load `configuration.yaml` (optional) overlaid with `APP_` environment
/// variables, e.g. `APP_JWT__SECRET` or `APP_APPLICATION__PORT`
pub fn get_configuration() -> Result<Settings, ConfigError> {
    let settings = config::Config::builder()
        .add_source(config::File::with_name("configuration").required(false))
        .add_source(
            config::Environment::with_prefix("APP")
                .prefix_separator("_")
                .separator("__"),
        )
        .build()?
        .try_deserialize::<Settings>()?;
    settings.validate()?;
    Ok(settings)
}
