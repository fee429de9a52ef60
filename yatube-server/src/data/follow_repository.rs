use crate::domain::error::DomainError;
use crate::domain::follow::{Follow, FollowView};
use async_trait::async_trait;
use sqlx::PgPool;
use tracing::{error, info};
use uuid::Uuid;

#[async_trait]
pub trait FollowRepository: Send + Sync {
    /// Returns `false` when the pair already exists or `user_id == author_id`.
    async fn follow(&self, user_id: Uuid, author_id: Uuid) -> Result<bool, DomainError>;
    /// Returns `false` when there was nothing to remove.
    async fn unfollow(&self, user_id: Uuid, author_id: Uuid) -> Result<bool, DomainError>;
    async fn is_following(&self, user_id: Uuid, author_id: Uuid) -> Result<bool, DomainError>;
    async fn list(&self, limit: i64, offset: i64) -> Result<Vec<FollowView>, DomainError>;
    async fn count(&self) -> Result<i64, DomainError>;
}

#[derive(Clone)]
pub struct PostgresFollowRepository {
    pool: PgPool,
}

impl PostgresFollowRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl FollowRepository for PostgresFollowRepository {
    async fn follow(&self, user_id: Uuid, author_id: Uuid) -> Result<bool, DomainError> {
        if user_id == author_id {
            return Ok(false);
        }

        let inserted = sqlx::query_as::<_, Follow>(
            r#"
            INSERT INTO follows (user_id, author_id)
            VALUES ($1, $2)
            ON CONFLICT ON CONSTRAINT follow DO NOTHING
            RETURNING id, user_id, author_id
            "#,
        )
        .bind(user_id)
        .bind(author_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            error!("failed to follow {} -> {}: {}", user_id, author_id, e);
            DomainError::from(e)
        })?;

        if let Some(follow) = &inserted {
            info!(
                follow_id = follow.id,
                user_id = %follow.user_id,
                author_id = %follow.author_id,
                "follow created"
            );
        }
        Ok(inserted.is_some())
    }

    async fn unfollow(&self, user_id: Uuid, author_id: Uuid) -> Result<bool, DomainError> {
        let deleted = sqlx::query("DELETE FROM follows WHERE user_id = $1 AND author_id = $2")
            .bind(user_id)
            .bind(author_id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                error!("failed to unfollow {} -> {}: {}", user_id, author_id, e);
                DomainError::from(e)
            })?;

        let removed = deleted.rows_affected() > 0;
        if removed {
            info!(user_id = %user_id, author_id = %author_id, "follow removed");
        }
        Ok(removed)
    }

    async fn is_following(&self, user_id: Uuid, author_id: Uuid) -> Result<bool, DomainError> {
        sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM follows WHERE user_id = $1 AND author_id = $2)",
        )
        .bind(user_id)
        .bind(author_id)
        .fetch_one(&self.pool)
        .await
        .map_err(DomainError::from)
    }

    async fn list(&self, limit: i64, offset: i64) -> Result<Vec<FollowView>, DomainError> {
        sqlx::query_as::<_, FollowView>(
            r#"
            SELECT f.id, u.username AS user_username, a.username AS author_username
            FROM follows f
            JOIN users u ON u.id = f.user_id
            JOIN users a ON a.id = f.author_id
            ORDER BY a.username, f.id
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            error!("db error while fetching follows: {}", e);
            DomainError::from(e)
        })
    }

    async fn count(&self) -> Result<i64, DomainError> {
        sqlx::query_scalar("SELECT COUNT(*) FROM follows")
            .fetch_one(&self.pool)
            .await
            .map_err(DomainError::from)
    }
}
