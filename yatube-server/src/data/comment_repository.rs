use crate::domain::comment::{Comment, CommentView, NewComment};
use crate::domain::error::DomainError;
use crate::domain::filter::CommentFilter;
use async_trait::async_trait;
use sqlx::PgPool;
use tracing::{error, info};

#[async_trait]
pub trait CommentRepository: Send + Sync {
    async fn create(&self, comment: NewComment) -> Result<Comment, DomainError>;
    /// Oldest first, as read under a post.
    async fn list_for_post(&self, post_id: i64) -> Result<Vec<CommentView>, DomainError>;
    /// Newest first, as listed in the admin.
    async fn list(
        &self,
        filter: &CommentFilter,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<CommentView>, DomainError>;
    async fn count(&self, filter: &CommentFilter) -> Result<i64, DomainError>;
}

#[derive(Clone)]
pub struct PostgresCommentRepository {
    pool: PgPool,
}

impl PostgresCommentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const VIEW_SELECT: &str = r#"
    SELECT c.id, c.post_id, c.author_id, u.username AS author_username, c.created, c.text
    FROM comments c
    JOIN users u ON u.id = c.author_id
"#;

#[async_trait]
impl CommentRepository for PostgresCommentRepository {
    async fn create(&self, comment: NewComment) -> Result<Comment, DomainError> {
        let created = sqlx::query_as::<_, Comment>(
            r#"
            INSERT INTO comments (post_id, author_id, text, created)
            VALUES ($1, $2, $3, NOW())
            RETURNING id, post_id, author_id, created, text
            "#,
        )
        .bind(comment.post_id)
        .bind(comment.author_id)
        .bind(&comment.text)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            error!("failed to create comment: {}", e);
            DomainError::from(e)
        })?;

        info!(comment_id = created.id, post_id = created.post_id, "comment created");
        Ok(created)
    }

    async fn list_for_post(&self, post_id: i64) -> Result<Vec<CommentView>, DomainError> {
        sqlx::query_as::<_, CommentView>(&format!(
            "{VIEW_SELECT} WHERE c.post_id = $1 ORDER BY c.created, c.id"
        ))
        .bind(post_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            error!("db error while fetching comments of post {}: {}", post_id, e);
            DomainError::from(e)
        })
    }

    async fn list(
        &self,
        filter: &CommentFilter,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<CommentView>, DomainError> {
        sqlx::query_as::<_, CommentView>(&format!(
            r#"
            {VIEW_SELECT}
            WHERE ($1::BIGINT IS NULL OR c.post_id = $1)
              AND ($2::TIMESTAMPTZ IS NULL OR c.created >= $2)
            ORDER BY c.created DESC, c.id DESC
            LIMIT $3 OFFSET $4
            "#
        ))
        .bind(filter.post_id)
        .bind(filter.created_since)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            error!("db error while fetching comments: {}", e);
            DomainError::from(e)
        })
    }

    async fn count(&self, filter: &CommentFilter) -> Result<i64, DomainError> {
        sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM comments c
            WHERE ($1::BIGINT IS NULL OR c.post_id = $1)
              AND ($2::TIMESTAMPTZ IS NULL OR c.created >= $2)
            "#,
        )
        .bind(filter.post_id)
        .bind(filter.created_since)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            error!("db error while counting comments: {}", e);
            DomainError::from(e)
        })
    }
}
