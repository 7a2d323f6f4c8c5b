//! Library lending server entry point

use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use lending_server::{
    config::AppConfig,
    create_router,
    repository::Repository,
    services::{
        checkout::StripeClient,
        notifications::{self, NotificationDispatcher},
        redis::RedisService,
        telegram::TelegramClient,
        Services,
    },
    AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    let config = AppConfig::load().context("Failed to load configuration")?;

    // Initialize tracing
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("lending_server={},tower_http=debug", config.logging.level).into());

    let registry = tracing_subscriber::registry().with(filter);
    if config.logging.format == "json" {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    tracing::info!("Starting lending server v{}", env!("CARGO_PKG_VERSION"));

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

    let redis_service = RedisService::new(&config.redis.url, config.redis.session_ttl_seconds)
        .await
        .context("Failed to connect to Redis")?;

    tracing::info!("Connected to Redis");

    let stripe = StripeClient::new(config.payments.clone()).context("Failed to create Stripe client")?;
    if config.payments.stripe_secret_key.is_empty() {
        tracing::warn!("Stripe secret key not set, checkout sessions will not be created");
    }
    let telegram = Arc::new(TelegramClient::new(config.telegram.clone()).context("Failed to create Telegram client")?);

    // Notification worker
    let (dispatcher, receiver) = NotificationDispatcher::channel();
    tokio::spawn(notifications::run_worker(
        receiver,
        Arc::new(redis_service.clone()),
        telegram.clone(),
    ));

    let server_host = config.server.host.clone();
    let server_port = config.server.port;

    let repository = Repository::new(pool);
    let services = Services::new(
        repository,
        &config,
        redis_service,
        Arc::new(stripe),
        telegram,
        dispatcher,
    );

    let state = AppState {
        config: Arc::new(config),
        services: Arc::new(services),
    };

    let app = create_router(state);

    let addr = SocketAddr::new(server_host.parse().context("Invalid host address")?, server_port);

    tracing::info!("Server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
