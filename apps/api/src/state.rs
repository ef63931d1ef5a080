use std::sync::Arc;

use sqlx::PgPool;

use crate::assets::metadata::MetadataStore;
use crate::assets::upload::UploadPipeline;
use crate::config::Config;
use crate::storage::ObjectStore;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub store: Arc<dyn ObjectStore>,
    pub metadata: Arc<dyn MetadataStore>,
    pub uploads: Arc<UploadPipeline>,
    pub config: Config,
}
