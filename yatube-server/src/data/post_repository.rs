use crate::domain::error::DomainError;
use crate::domain::filter::{PostFilter, escape_like};
use crate::domain::post::{ImageChange, NewPost, Post, PostUpdate, PostView};
use async_trait::async_trait;
use sqlx::PgPool;
use sqlx::postgres::PgArguments;
use sqlx::query::QueryAs;
use sqlx::Postgres;
use tracing::{error, info};

#[async_trait]
pub trait PostRepository: Send + Sync {
    async fn create(&self, post: NewPost) -> Result<Post, DomainError>;
    async fn find_by_id(&self, id: i64) -> Result<Option<PostView>, DomainError>;
    async fn update(&self, id: i64, update: PostUpdate) -> Result<Option<Post>, DomainError>;
    async fn set_group(&self, id: i64, group_id: Option<i64>) -> Result<bool, DomainError>;
    /// Newest first.
    async fn list(
        &self,
        filter: &PostFilter,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<PostView>, DomainError>;
    async fn count(&self, filter: &PostFilter) -> Result<i64, DomainError>;
}

#[derive(Clone)]
pub struct PostgresPostRepository {
    pool: PgPool,
}

impl PostgresPostRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const POST_COLUMNS: &str = "id, text, pub_date, author_id, group_id, image";

const VIEW_SELECT: &str = r#"
    SELECT p.id, p.text, p.pub_date, p.image,
           p.author_id, u.username AS author_username,
           p.group_id, g.title AS group_title, g.slug AS group_slug
    FROM posts p
    JOIN users u ON u.id = p.author_id
    LEFT JOIN groups g ON g.id = p.group_id
"#;

const FILTER_WHERE: &str = r#"
    WHERE ($1::BIGINT IS NULL OR p.group_id = $1)
      AND ($2::UUID IS NULL OR p.author_id = $2)
      AND ($3::UUID IS NULL OR p.author_id IN (SELECT f.author_id FROM follows f WHERE f.user_id = $3))
      AND ($4::TEXT IS NULL OR p.text ILIKE '%' || $4 || '%')
      AND ($5::TIMESTAMPTZ IS NULL OR p.pub_date >= $5)
"#;

fn bind_filter<'q, O>(
    query: QueryAs<'q, Postgres, O, PgArguments>,
    filter: &PostFilter,
) -> QueryAs<'q, Postgres, O, PgArguments> {
    query
        .bind(filter.group_id)
        .bind(filter.author_id)
        .bind(filter.followed_by)
        .bind(filter.text_contains.as_deref().map(escape_like))
        .bind(filter.published_since)
}

#[async_trait]
impl PostRepository for PostgresPostRepository {
    async fn create(&self, post: NewPost) -> Result<Post, DomainError> {
        let created = sqlx::query_as::<_, Post>(&format!(
            r#"
            INSERT INTO posts (text, author_id, group_id, image, pub_date)
            VALUES ($1, $2, $3, $4, NOW())
            RETURNING {POST_COLUMNS}
            "#
        ))
        .bind(&post.text)
        .bind(post.author_id)
        .bind(post.group_id)
        .bind(&post.image)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            error!("failed to create post: {}", e);
            DomainError::from(e)
        })?;

        info!(post_id = created.id, author_id = %created.author_id, "post created");
        Ok(created)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<PostView>, DomainError> {
        sqlx::query_as::<_, PostView>(&format!("{VIEW_SELECT} WHERE p.id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                error!("db error find_by_id {}: {}", id, e);
                DomainError::from(e)
            })
    }

    async fn update(&self, id: i64, update: PostUpdate) -> Result<Option<Post>, DomainError> {
        let (replace_image, image) = match update.image {
            ImageChange::Keep => (false, None),
            ImageChange::Clear => (true, None),
            ImageChange::Replace(path) => (true, Some(path)),
        };

        let post = sqlx::query_as::<_, Post>(&format!(
            r#"
            UPDATE posts
            SET
                text = $1,
                group_id = $2,
                image = CASE WHEN $3 THEN $4 ELSE image END
            WHERE id = $5
            RETURNING {POST_COLUMNS}
            "#
        ))
        .bind(&update.text)
        .bind(update.group_id)
        .bind(replace_image)
        .bind(image)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            error!("failed to update post {}: {}", id, e);
            DomainError::from(e)
        })?;

        if post.is_some() {
            info!(post_id = id, "post updated");
        }

        Ok(post)
    }

    async fn set_group(&self, id: i64, group_id: Option<i64>) -> Result<bool, DomainError> {
        let updated = sqlx::query("UPDATE posts SET group_id = $1 WHERE id = $2")
            .bind(group_id)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                error!("failed to set group of post {}: {}", id, e);
                DomainError::from(e)
            })?;

        Ok(updated.rows_affected() > 0)
    }

    async fn list(
        &self,
        filter: &PostFilter,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<PostView>, DomainError> {
        let sql = format!(
            "{VIEW_SELECT} {FILTER_WHERE} ORDER BY p.pub_date DESC, p.id DESC LIMIT $6 OFFSET $7"
        );
        bind_filter(sqlx::query_as::<_, PostView>(&sql), filter)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                error!("db error while fetching posts: {}", e);
                DomainError::from(e)
            })
    }

    async fn count(&self, filter: &PostFilter) -> Result<i64, DomainError> {
        let sql = format!("SELECT COUNT(*) FROM posts p {FILTER_WHERE}");
        let (count,): (i64,) = bind_filter(sqlx::query_as::<_, (i64,)>(&sql), filter)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                error!("db error while counting posts: {}", e);
                DomainError::from(e)
            })?;
        Ok(count)
    }
}
