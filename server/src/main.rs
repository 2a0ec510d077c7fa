use std::str::FromStr;
use std::sync::Arc;

use anyhow::Context;
use circleup_auth::Authenticator;
use circleup_backend_api::{build_router, AppState};
use circleup_config::load as load_config;
use circleup_realtime::InMemoryRoomBus;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use tokio::{net::TcpListener, signal};
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

mod migrations {
    pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("../migrations");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_env_filter(env_filter)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    info!("starting CircleUp backend");

    let config = load_config().context("failed to load configuration")?;

    let connect_options = SqliteConnectOptions::from_str(&config.database.url)
        .with_context(|| format!("invalid database url {}", config.database.url))?
        .create_if_missing(true)
        .foreign_keys(true);

    let db_pool = SqlitePoolOptions::new()
        .max_connections(config.database.max_connections)
        .connect_with(connect_options)
        .await
        .with_context(|| format!("failed to connect to database {}", config.database.url))?;

    migrations::MIGRATOR
        .run(&db_pool)
        .await
        .context("database migrations failed")?;

    let authenticator = Authenticator::new(db_pool.clone(), config.auth.clone());
    info!("authentication subsystem ready");

    // Process-local fan-out; swap in a message-bus backed RoomBus to run
    // more than one server process.
    let rooms = Arc::new(InMemoryRoomBus::new());

    let state = AppState::new(db_pool, authenticator, rooms);
    let app = build_router(state);

    let address = format!("{}:{}", config.http.address, config.http.port);
    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("failed to bind http listener on {address}"))?;

    info!(%address, "http server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("http server error")?;

    info!("backend shut down");
    Ok(())
}

fn shutdown_signal() -> impl std::future::Future<Output = ()> {
    async {
        if let Err(error) = signal::ctrl_c().await {
            error!(?error, "failed to listen for shutdown signal");
        }
        info!("shutdown signal received");
    }
}
