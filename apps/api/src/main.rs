mod assets;
mod config;
mod db;
mod errors;
mod models;
mod print;
mod routes;
mod scanner;
mod state;
mod storage;
#[cfg(test)]
mod testutil;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use aws_config::Region;
use aws_sdk_s3::config::Credentials;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::assets::metadata::PgMetadataStore;
use crate::assets::quota::{QuotaGuard, RedisRateCounter};
use crate::assets::upload::{UploadPipeline, UploadPolicy};
use crate::config::Config;
use crate::db::create_pool;
use crate::routes::build_router;
use crate::scanner::ClamdScanner;
use crate::state::AppState;
use crate::storage::S3ObjectStore;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Folio API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize PostgreSQL
    let pool = create_pool(&config.database_url, config.db_max_connections).await?;

    // Initialize Redis
    let redis = redis::Client::open(config.redis_url.clone())?;
    info!("Redis client initialized");

    // Initialize S3 / MinIO
    let s3 = build_s3_client(&config).await;
    info!("S3 client initialized");

    // Wire the upload pipeline collaborators
    let store = Arc::new(S3ObjectStore::new(s3, config.s3_bucket.clone()));
    let scanner = Arc::new(ClamdScanner::new(config.clamd_addr.clone()));
    let metadata = Arc::new(PgMetadataStore::new(pool.clone()));
    let rate = Arc::new(RedisRateCounter::new(redis));
    let quota = QuotaGuard::new(rate, metadata.clone());
    let uploads = Arc::new(UploadPipeline::new(
        store.clone(),
        scanner,
        metadata.clone(),
        quota,
        UploadPolicy::from_config(&config),
    ));

    // Build app state
    let state = AppState {
        db: pool,
        store,
        metadata,
        uploads,
        config: config.clone(),
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: tighten CORS in production

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Constructs an S3 client configured for MinIO (local) or AWS (production).
async fn build_s3_client(config: &Config) -> aws_sdk_s3::Client {
    let credentials = Credentials::new(
        &config.aws_access_key_id,
        &config.aws_secret_access_key,
        None,
        None,
        "folio-static",
    );

    let s3_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(Region::new("us-east-1"))
        .credentials_provider(credentials)
        .endpoint_url(&config.s3_endpoint)
        .load()
        .await;

    aws_sdk_s3::Client::new(&s3_config)
}
