//! TestVault server entry point.

use std::sync::Arc;

use anyhow::Context;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use testvault_server::{
    auth::JwtVerifier,
    config::{Config, StorageBackend},
    create_router, db,
    generation::build_generator,
    repository::{ArtifactRepository, MemoryArtifactRepository, PgArtifactRepository},
    routes::cors_layer,
    service::ArtifactService,
    AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let config = Config::from_env().context("Invalid configuration")?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!(
                    "testvault_server={level},tower_http={level}",
                    level = config.log_level
                )
                .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting TestVault server");

    let repo = build_repository(&config).await?;
    let service = ArtifactService::new(repo, build_generator(config.generator))
        .with_retry_policy(config.retry_policy());
    let state = AppState::new(service, JwtVerifier::new(&config.jwt_secret));

    let app = create_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(config.cors_allow_localhost));

    let listener = tokio::net::TcpListener::bind(&config.bind_address)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_address))?;
    tracing::info!(address = %config.bind_address, "Listening");

    axum::serve(listener, app).await?;
    Ok(())
}

async fn build_repository(config: &Config) -> anyhow::Result<Arc<dyn ArtifactRepository>> {
    match config.storage_backend {
        StorageBackend::Postgres => {
            let database_url = config
                .database_url
                .as_deref()
                .context("DATABASE_URL not set")?;

            let pool = db::create_pool(database_url, config.db_max_connections)
                .await
                .context("Failed to connect to database")?;
            tracing::info!("Connected to database");

            db::run_migrations(&pool)
                .await
                .context("Failed to run migrations")?;
            tracing::info!("Database migrations complete");

            Ok(Arc::new(PgArtifactRepository::new(pool)))
        }
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory storage; artifacts are lost on restart");
            Ok(Arc::new(MemoryArtifactRepository::new()))
        }
    }
}
