use std::sync::Arc;

use sqlx::SqlitePool;

use crate::domain::owner_model::Owner;
use crate::error::AppError;

#[derive(Clone, Debug)]
pub struct OwnerStorage {
    pool: Arc<SqlitePool>,
}

impl OwnerStorage {
    pub fn new(pool: Arc<SqlitePool>) -> Self {
        Self { pool }
    }

    pub async fn query_owner_by_id(&self, id: &str) -> Result<Owner, AppError> {
        sqlx::query_as::<_, Owner>("select * from owners where id = $1")
            .bind(id)
            .fetch_optional(self.pool.as_ref())
            .await?
            .ok_or_else(|| AppError::NotFound(format!("owner {id}")))
    }

    pub async fn query_owner_by_name(&self, username: &str) -> Result<Owner, AppError> {
        sqlx::query_as::<_, Owner>("select * from owners where username = $1")
            .bind(username)
            .fetch_optional(self.pool.as_ref())
            .await?
            .ok_or_else(|| AppError::NotFound(format!("owner {username}")))
    }

    pub async fn query_owner_by_email(&self, email: &str) -> Result<Owner, AppError> {
        sqlx::query_as::<_, Owner>("select * from owners where email = $1")
            .bind(email)
            .fetch_optional(self.pool.as_ref())
            .await?
            .ok_or_else(|| AppError::NotFound(format!("owner {email}")))
    }

    /// Login lookup: username or email, case-insensitive.
    pub async fn query_owner_by_login(&self, identifier: &str) -> Result<Owner, AppError> {
        sqlx::query_as::<_, Owner>(
            "select * from owners where lower(username) = lower($1) or lower(email) = lower($1)",
        )
        .bind(identifier)
        .fetch_optional(self.pool.as_ref())
        .await?
        .ok_or_else(|| AppError::NotFound(format!("owner {identifier}")))
    }

    pub async fn insert_owner(&self, owner: &Owner) -> Result<(), AppError> {
        sqlx::query(
            "INSERT INTO owners (id, username, email, password, assets, created_at) \
             VALUES ($1, $2, $3, $4, '{}', $5)",
        )
        .bind(&owner.id)
        .bind(&owner.username)
        .bind(&owner.email)
        .bind(&owner.password)
        .bind(owner.created_at)
        .execute(self.pool.as_ref())
        .await?;
        Ok(())
    }

    pub async fn update_account(&self, owner: &Owner) -> Result<(), AppError> {
        sqlx::query("UPDATE owners SET username = $1, email = $2, password = $3 WHERE id = $4")
            .bind(&owner.username)
            .bind(&owner.email)
            .bind(&owner.password)
            .bind(&owner.id)
            .execute(self.pool.as_ref())
            .await?;
        Ok(())
    }

    pub async fn list_owners(&self) -> Result<Vec<Owner>, AppError> {
        Ok(
            sqlx::query_as::<_, Owner>("select * from owners order by created_at")
                .fetch_all(self.pool.as_ref())
                .await?,
        )
    }
}
