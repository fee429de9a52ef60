use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Follow {
    pub id: i64,
    pub user_id: Uuid,
    pub author_id: Uuid,
}

/// Follow row with both usernames resolved, ordered by author.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct FollowView {
    pub id: i64,
    pub user_username: String,
    pub author_username: String,
}
