use std::net::TcpListener;
use std::sync::Arc;
use std::time::Duration;

use blog_backend::configuration::get_configuration;
use blog_backend::startup::{run, AppState};
use blog_backend::store::{PgPostStore, PgUserStore};
use blog_backend::telemetry::init_telemetry;
use sqlx::postgres::PgPoolOptions;

#[tokio::main]
async fn main() -> std::io::Result<()> {
    let configuration = get_configuration().map_err(|e| {
        eprintln!("Failed to read configuration: {}", e);
        std::io::Error::new(std::io::ErrorKind::InvalidInput, "Configuration error")
    })?;

    init_telemetry(&configuration.log);
    tracing::info!(app = %configuration.application.name, "Configuration loaded");

    let pool = PgPoolOptions::new()
        .max_connections(configuration.database.max_connections)
        .acquire_timeout(configuration.auth.store_timeout())
        .connect(&configuration.database.connection_string())
        .await
        .map_err(|e| {
            tracing::error!("Failed to create connection pool: {}", e);
            std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "Database connection error")
        })?;
    tracing::info!("Database connection pool created");

    sqlx::migrate!("./migrations").run(&pool).await.map_err(|e| {
        tracing::error!("Failed to run migrations: {}", e);
        std::io::Error::new(std::io::ErrorKind::Other, "Migration error")
    })?;

    let state = AppState::new(
        &configuration,
        Arc::new(PgUserStore::new(pool.clone())),
        Arc::new(PgPostStore::new(pool)),
    );

    let sweep_interval = Duration::from_secs(configuration.rate_limit.sweep_interval_secs);
    let sweepers = [
        state.global_limiter.clone().spawn_sweeper(sweep_interval),
        state.auth_limiter.clone().spawn_sweeper(sweep_interval),
    ];

    let address = format!(
        "{}:{}",
        configuration.application.host, configuration.application.port
    );
    let listener = TcpListener::bind(&address)?;
    tracing::info!("Server listening on: {}", address);

    let result = run(listener, state)?.await;

    for sweeper in sweepers {
        sweeper.abort();
    }
    tracing::info!("Server stopped");
    result
}
