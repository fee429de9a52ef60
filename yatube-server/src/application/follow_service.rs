use std::sync::Arc;

use tracing::{debug, instrument};
use uuid::Uuid;

use crate::application::paginator::{Page, Paginator};
use crate::data::follow_repository::FollowRepository;
use crate::data::user_repository::UserRepository;
use crate::domain::error::DomainError;
use crate::domain::follow::FollowView;
use crate::domain::user::User;

#[derive(Clone)]
pub struct FollowService {
    follows: Arc<dyn FollowRepository>,
    users: Arc<dyn UserRepository>,
}

impl FollowService {
    pub fn new(follows: Arc<dyn FollowRepository>, users: Arc<dyn UserRepository>) -> Self {
        Self { follows, users }
    }

    /// Subscribes `user_id` to `author_username`. Following yourself or an
    /// author you already follow changes nothing.
    #[instrument(skip(self))]
    pub async fn follow(&self, user_id: Uuid, author_username: &str) -> Result<User, DomainError> {
        let author = self.author(author_username).await?;
        if author.id == user_id {
            debug!("ignoring self-follow");
            return Ok(author);
        }
        self.follows.follow(user_id, author.id).await?;
        Ok(author)
    }

    #[instrument(skip(self))]
    pub async fn unfollow(&self, user_id: Uuid, author_username: &str) -> Result<User, DomainError> {
        let author = self.author(author_username).await?;
        self.follows.unfollow(user_id, author.id).await?;
        Ok(author)
    }

    pub async fn is_following(&self, user_id: Uuid, author_id: Uuid) -> Result<bool, DomainError> {
        if user_id == author_id {
            return Ok(false);
        }
        self.follows.is_following(user_id, author_id).await
    }

    pub async fn page(
        &self,
        paginator: Paginator,
        requested: Option<&str>,
    ) -> Result<Page<FollowView>, DomainError> {
        let total = self.follows.count().await?;
        let number = paginator.page_number(requested, total);
        let (limit, offset) = paginator.window(number);
        let items = self.follows.list(limit, offset).await?;
        Ok(Page::new(items, number, paginator.num_pages(total), total))
    }

    async fn author(&self, username: &str) -> Result<User, DomainError> {
        self.users
            .find_by_username(username)
            .await?
            .ok_or_else(|| DomainError::UserNotFound(username.to_string()))
    }
}
