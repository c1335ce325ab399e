//! Donation Exchange Server
//!
//! REST API server for the campus donation exchange.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use donation_exchange_server::{
    api,
    config::{AppConfig, LoggingConfig, StoreBackend},
    repository::{memory::MemoryStore, Repository},
    services::Services,
    AppState,
};

/// The returned guard flushes buffered log lines when dropped
fn init_tracing(logging: &LoggingConfig) -> WorkerGuard {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!("donation_exchange_server={},tower_http=debug", logging.level).into()
    });

    let (writer, guard) = match logging.directory {
        Some(ref directory) => tracing_appender::non_blocking(tracing_appender::rolling::daily(
            directory,
            "donation-exchange.log",
        )),
        None => tracing_appender::non_blocking(std::io::stdout()),
    };

    let registry = tracing_subscriber::registry().with(filter);
    if logging.format == "json" {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(writer))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(writer))
            .init();
    }

    guard
}

async fn build_repository(config: &AppConfig) -> anyhow::Result<Repository> {
    match config.database.backend {
        StoreBackend::Memory => {
            tracing::warn!("Using the in-memory store, data is lost on shutdown");
            Ok(Repository::in_memory(Arc::new(MemoryStore::new())))
        }
        StoreBackend::Postgres => {
            let pool = PgPoolOptions::new()
                .max_connections(config.database.max_connections)
                .min_connections(config.database.min_connections)
                .connect(&config.database.url)
                .await
                .context("Failed to connect to database")?;

            tracing::info!("Connected to database");

            sqlx::migrate!("./migrations")
                .run(&pool)
                .await
                .context("Failed to run database migrations")?;

            tracing::info!("Database migrations completed");

            Ok(Repository::new(pool))
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    let config = AppConfig::load().context("Failed to load configuration")?;

    let _guard = init_tracing(&config.logging);

    tracing::info!("Starting Donation Exchange Server v{}", env!("CARGO_PKG_VERSION"));

    let repository = build_repository(&config).await?;
    let services = Services::new(repository);

    let addr = SocketAddr::new(
        config.server.host.parse::<IpAddr>().context("Invalid host address")?,
        config.server.port,
    );

    let state = AppState {
        config: Arc::new(config),
        services: Arc::new(services),
    };

    let app = api::create_router(state);

    tracing::info!("Server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
