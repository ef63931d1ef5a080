use anyhow::Result;
use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::asset::AssetRow;

/// Asset metadata seam. Production is a single Postgres table written one
/// row per committed upload.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    async fn count_by_user(&self, user_id: Uuid) -> Result<i64>;

    async fn create(&self, asset: &AssetRow) -> Result<()>;

    async fn find_by_user_and_key(&self, user_id: Uuid, key: &str) -> Result<Option<AssetRow>>;

    async fn list_by_user(&self, user_id: Uuid, limit: i64) -> Result<Vec<AssetRow>>;

    async fn delete_by_id(&self, id: Uuid) -> Result<()>;
}

pub struct PgMetadataStore {
    pool: PgPool,
}

impl PgMetadataStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MetadataStore for PgMetadataStore {
    async fn count_by_user(&self, user_id: Uuid) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM assets WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn create(&self, asset: &AssetRow) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO assets (id, user_id, object_key, content_type, size_bytes, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(asset.id)
        .bind(asset.user_id)
        .bind(&asset.object_key)
        .bind(&asset.content_type)
        .bind(asset.size_bytes)
        .bind(asset.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_by_user_and_key(&self, user_id: Uuid, key: &str) -> Result<Option<AssetRow>> {
        Ok(sqlx::query_as::<_, AssetRow>(
            "SELECT * FROM assets WHERE user_id = $1 AND object_key = $2",
        )
        .bind(user_id)
        .bind(key)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn list_by_user(&self, user_id: Uuid, limit: i64) -> Result<Vec<AssetRow>> {
        Ok(sqlx::query_as::<_, AssetRow>(
            "SELECT * FROM assets WHERE user_id = $1 ORDER BY created_at DESC LIMIT $2",
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn delete_by_id(&self, id: Uuid) -> Result<()> {
        sqlx::query("DELETE FROM assets WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
