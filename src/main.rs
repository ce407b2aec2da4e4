use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use wallpaper_server::{
    auth::{ClerkIdentity, SessionVerifier},
    config::Config,
    create_app,
    database::{Database, MemoryDatabase, Repository},
    handlers::AppState,
    services::{generator::OpenAiGenerator, orders::StripeGateway, MetricsService},
    storage::create_storage,
};

/// `DATABASE_URL` value selecting the in-process store.
const IN_MEMORY_DATABASE: &str = "memory";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "wallpaper_server=info,tower_http=info,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_file(true).with_line_number(true))
        .init();

    let config = Config::from_env()?;

    let database: Arc<dyn Repository> = if config.database_url == IN_MEMORY_DATABASE {
        tracing::warn!("Using in-memory database, data is lost on exit");
        Arc::new(MemoryDatabase::new())
    } else {
        let database = Database::new(&config.database_url, config.database_max_connections).await?;
        database.migrate().await?;
        tracing::info!("Database connected and migrated");
        Arc::new(database)
    };

    let storage = create_storage(&config)?;
    tracing::info!(backend = ?config.storage_backend, "Object storage ready");

    let http = reqwest::Client::new();

    let jwt_key = config
        .clerk_jwt_key
        .as_deref()
        .context("CLERK_JWT_KEY must be set to verify sessions")?;
    let identity = ClerkIdentity::new(
        http.clone(),
        &config.clerk_api_url,
        &config.clerk_secret_key,
        SessionVerifier::from_rsa_pem(jwt_key)?,
    );
    let generator = OpenAiGenerator::new(http.clone(), &config.openai_api_url, &config.openai_api_key);
    let payments = StripeGateway::new(
        http.clone(),
        &config.stripe_api_url,
        &config.stripe_private_key,
        &config.web_base_url,
    );

    let port = config.port;
    let state = AppState {
        config: Arc::new(config),
        database,
        identity: Arc::new(identity),
        generator: Arc::new(generator),
        storage,
        payments: Arc::new(payments),
        http,
        metrics: Arc::new(MetricsService::new()?),
    };

    let app = create_app(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Server starting on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
