use std::sync::Arc;

use sqlx::SqlitePool;

use crate::domain::asset_model::AssetCollection;
use crate::error::AppError;

/// Access to the asset collection embedded in the owner row.
///
/// The collection is one JSON column; `save` rewrites the whole column in
/// a single UPDATE, which is the atomicity boundary for record mutations.
/// Object-store side effects are never covered by it.
#[derive(Clone, Debug)]
pub struct AssetStore {
    pool: Arc<SqlitePool>,
}

impl AssetStore {
    pub fn new(pool: Arc<SqlitePool>) -> Self {
        Self { pool }
    }

    pub async fn load(&self, owner_id: &str) -> Result<AssetCollection, AppError> {
        let raw: Option<String> = sqlx::query_scalar("select assets from owners where id = $1")
            .bind(owner_id)
            .fetch_optional(self.pool.as_ref())
            .await?;
        let raw = raw.ok_or_else(|| AppError::NotFound(format!("owner {owner_id}")))?;
        Ok(serde_json::from_str(&raw)?)
    }

    pub async fn save(&self, owner_id: &str, assets: &AssetCollection) -> Result<(), AppError> {
        let raw = serde_json::to_string(assets)?;
        let result = sqlx::query("UPDATE owners SET assets = $1 WHERE id = $2")
            .bind(raw)
            .bind(owner_id)
            .execute(self.pool.as_ref())
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("owner {owner_id}")));
        }
        Ok(())
    }
}
