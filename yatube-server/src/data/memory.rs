//! In-process store implementing every repository trait, for handler and
//! service tests. Mirrors the database constraints of the migrations.

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::data::comment_repository::CommentRepository;
use crate::data::follow_repository::FollowRepository;
use crate::data::group_repository::GroupRepository;
use crate::data::post_repository::PostRepository;
use crate::data::user_repository::UserRepository;
use crate::domain::comment::{Comment, CommentView, NewComment};
use crate::domain::error::DomainError;
use crate::domain::filter::{CommentFilter, PostFilter};
use crate::domain::follow::{Follow, FollowView};
use crate::domain::group::{Group, NewGroup};
use crate::domain::post::{ImageChange, NewPost, Post, PostUpdate, PostView};
use crate::domain::user::User;

#[derive(Default)]
struct Tables {
    users: Vec<User>,
    groups: Vec<Group>,
    posts: Vec<Post>,
    comments: Vec<Comment>,
    follows: Vec<Follow>,
    next_id: i64,
    last_timestamp: Option<DateTime<Utc>>,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    /// Strictly increasing, so insertion order matches timestamp order.
    fn now(&mut self) -> DateTime<Utc> {
        let mut now = Utc::now();
        if let Some(last) = self.last_timestamp {
            if now <= last {
                now = last + Duration::microseconds(1);
            }
        }
        self.last_timestamp = Some(now);
        now
    }

    fn username(&self, id: Uuid) -> String {
        self.users
            .iter()
            .find(|u| u.id == id)
            .map(|u| u.username.clone())
            .unwrap_or_default()
    }

    fn post_view(&self, post: &Post) -> PostView {
        let group = post
            .group_id
            .and_then(|id| self.groups.iter().find(|g| g.id == id));
        PostView {
            id: post.id,
            text: post.text.clone(),
            pub_date: post.pub_date,
            image: post.image.clone(),
            author_id: post.author_id,
            author_username: self.username(post.author_id),
            group_id: post.group_id,
            group_title: group.map(|g| g.title.clone()),
            group_slug: group.map(|g| g.slug.clone()),
        }
    }

    fn comment_view(&self, comment: &Comment) -> CommentView {
        CommentView {
            id: comment.id,
            post_id: comment.post_id,
            author_id: comment.author_id,
            author_username: self.username(comment.author_id),
            created: comment.created,
            text: comment.text.clone(),
        }
    }

    fn post_matches(&self, post: &Post, filter: &PostFilter) -> bool {
        filter.group_id.is_none_or(|g| post.group_id == Some(g))
            && filter.author_id.is_none_or(|a| post.author_id == a)
            && filter.followed_by.is_none_or(|user| {
                self.follows
                    .iter()
                    .any(|f| f.user_id == user && f.author_id == post.author_id)
            })
            && filter.text_contains.as_deref().is_none_or(|q| {
                post.text.to_lowercase().contains(&q.to_lowercase())
            })
            && filter.published_since.is_none_or(|since| post.pub_date >= since)
    }

    fn filtered_posts(&self, filter: &PostFilter) -> Vec<&Post> {
        let mut posts: Vec<&Post> = self
            .posts
            .iter()
            .filter(|p| self.post_matches(p, filter))
            .collect();
        posts.sort_by(|a, b| b.pub_date.cmp(&a.pub_date).then(b.id.cmp(&a.id)));
        posts
    }

    fn filtered_comments(&self, filter: &CommentFilter) -> Vec<&Comment> {
        let mut comments: Vec<&Comment> = self
            .comments
            .iter()
            .filter(|c| filter.post_id.is_none_or(|p| c.post_id == p))
            .filter(|c| filter.created_since.is_none_or(|s| c.created >= s))
            .collect();
        comments.sort_by(|a, b| b.created.cmp(&a.created).then(b.id.cmp(&a.id)));
        comments
    }
}

fn window<T>(items: Vec<T>, limit: i64, offset: i64) -> Vec<T> {
    items
        .into_iter()
        .skip(offset.max(0) as usize)
        .take(limit.max(0) as usize)
        .collect()
}

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn with<R>(&self, f: impl FnOnce(&mut Tables) -> R) -> R {
        let mut tables = self.tables.lock().expect("memory store poisoned");
        f(&mut tables)
    }

    /// Inserts a user without hashing a password.
    pub fn add_user(&self, username: &str) -> User {
        let user = User::new(username.into(), format!("{username}@example.com"), "!".into());
        self.with(|t| t.users.push(user.clone()));
        user
    }

    pub fn add_staff(&self, username: &str) -> User {
        let mut user = User::new(username.into(), format!("{username}@example.com"), "!".into());
        user.is_staff = true;
        self.with(|t| t.users.push(user.clone()));
        user
    }

    pub fn add_group(&self, title: &str, slug: &str, description: &str) -> Group {
        self.with(|t| {
            let group = Group {
                id: t.next_id(),
                title: title.into(),
                slug: slug.into(),
                description: description.into(),
            };
            t.groups.push(group.clone());
            group
        })
    }

    pub fn add_post(&self, author: &User, text: &str, group: Option<&Group>) -> Post {
        self.add_post_with_image(author, text, group, None)
    }

    pub fn add_post_with_image(
        &self,
        author: &User,
        text: &str,
        group: Option<&Group>,
        image: Option<&str>,
    ) -> Post {
        self.with(|t| {
            let post = Post {
                id: t.next_id(),
                text: text.into(),
                pub_date: t.now(),
                author_id: author.id,
                group_id: group.map(|g| g.id),
                image: image.map(str::to_string),
            };
            t.posts.push(post.clone());
            post
        })
    }

    pub fn posts(&self) -> Vec<Post> {
        self.with(|t| t.posts.clone())
    }

    pub fn comments(&self) -> Vec<Comment> {
        self.with(|t| t.comments.clone())
    }

    pub fn follows(&self) -> Vec<Follow> {
        self.with(|t| t.follows.clone())
    }

    /// Same effect as the `ON DELETE SET NULL` of `posts.group_id`.
    pub fn delete_group(&self, id: i64) {
        self.with(|t| {
            t.groups.retain(|g| g.id != id);
            for post in t.posts.iter_mut().filter(|p| p.group_id == Some(id)) {
                post.group_id = None;
            }
        })
    }

    /// Same effect as the `ON DELETE CASCADE` foreign keys.
    pub fn delete_user(&self, id: Uuid) {
        self.with(|t| {
            t.users.retain(|u| u.id != id);
            let removed: Vec<i64> = t
                .posts
                .iter()
                .filter(|p| p.author_id == id)
                .map(|p| p.id)
                .collect();
            t.posts.retain(|p| p.author_id != id);
            t.comments
                .retain(|c| c.author_id != id && !removed.contains(&c.post_id));
            t.follows.retain(|f| f.user_id != id && f.author_id != id);
        })
    }
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn create(&self, user: User) -> Result<User, DomainError> {
        self.with(|t| {
            if t.users.iter().any(|u| u.username == user.username) {
                return Err(DomainError::UserAlreadyExists(user.username.clone()));
            }
            t.users.push(user.clone());
            Ok(user)
        })
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, DomainError> {
        Ok(self.with(|t| t.users.iter().find(|u| u.username == username).cloned()))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, DomainError> {
        Ok(self.with(|t| t.users.iter().find(|u| u.id == id).cloned()))
    }
}

#[async_trait]
impl GroupRepository for MemoryStore {
    async fn create(&self, group: NewGroup) -> Result<Group, DomainError> {
        self.with(|t| {
            if t.groups.iter().any(|g| g.slug == group.slug) {
                return Err(DomainError::GroupAlreadyExists(group.slug.clone()));
            }
            let created = Group {
                id: t.next_id(),
                title: group.title,
                slug: group.slug,
                description: group.description,
            };
            t.groups.push(created.clone());
            Ok(created)
        })
    }

    async fn find_by_slug(&self, slug: &str) -> Result<Option<Group>, DomainError> {
        Ok(self.with(|t| t.groups.iter().find(|g| g.slug == slug).cloned()))
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Group>, DomainError> {
        Ok(self.with(|t| t.groups.iter().find(|g| g.id == id).cloned()))
    }

    async fn list(&self, search: Option<&str>) -> Result<Vec<Group>, DomainError> {
        let needle = search.map(str::to_lowercase);
        Ok(self.with(|t| {
            let mut groups: Vec<Group> = t
                .groups
                .iter()
                .filter(|g| {
                    needle
                        .as_deref()
                        .is_none_or(|n| g.description.to_lowercase().contains(n))
                })
                .cloned()
                .collect();
            groups.sort_by(|a, b| a.title.cmp(&b.title).then(a.id.cmp(&b.id)));
            groups
        }))
    }
}

#[async_trait]
impl PostRepository for MemoryStore {
    async fn create(&self, post: NewPost) -> Result<Post, DomainError> {
        self.with(|t| {
            if !t.users.iter().any(|u| u.id == post.author_id) {
                return Err(DomainError::Internal("posts_author_id_fkey".into()));
            }
            let created = Post {
                id: t.next_id(),
                text: post.text,
                pub_date: t.now(),
                author_id: post.author_id,
                group_id: post.group_id,
                image: post.image,
            };
            t.posts.push(created.clone());
            Ok(created)
        })
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<PostView>, DomainError> {
        Ok(self.with(|t| {
            t.posts
                .iter()
                .find(|p| p.id == id)
                .map(|p| t.post_view(p))
        }))
    }

    async fn update(&self, id: i64, update: PostUpdate) -> Result<Option<Post>, DomainError> {
        Ok(self.with(|t| {
            let post = t.posts.iter_mut().find(|p| p.id == id)?;
            post.text = update.text;
            post.group_id = update.group_id;
            match update.image {
                ImageChange::Keep => {}
                ImageChange::Clear => post.image = None,
                ImageChange::Replace(path) => post.image = Some(path),
            }
            Some(post.clone())
        }))
    }

    async fn set_group(&self, id: i64, group_id: Option<i64>) -> Result<bool, DomainError> {
        Ok(self.with(|t| match t.posts.iter_mut().find(|p| p.id == id) {
            Some(post) => {
                post.group_id = group_id;
                true
            }
            None => false,
        }))
    }

    async fn list(
        &self,
        filter: &PostFilter,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<PostView>, DomainError> {
        Ok(self.with(|t| {
            let views = t
                .filtered_posts(filter)
                .into_iter()
                .map(|p| t.post_view(p))
                .collect();
            window(views, limit, offset)
        }))
    }

    async fn count(&self, filter: &PostFilter) -> Result<i64, DomainError> {
        Ok(self.with(|t| t.filtered_posts(filter).len() as i64))
    }
}

#[async_trait]
impl CommentRepository for MemoryStore {
    async fn create(&self, comment: NewComment) -> Result<Comment, DomainError> {
        self.with(|t| {
            if !t.posts.iter().any(|p| p.id == comment.post_id) {
                return Err(DomainError::Internal("comments_post_id_fkey".into()));
            }
            let created = Comment {
                id: t.next_id(),
                post_id: comment.post_id,
                author_id: comment.author_id,
                created: t.now(),
                text: comment.text,
            };
            t.comments.push(created.clone());
            Ok(created)
        })
    }

    async fn list_for_post(&self, post_id: i64) -> Result<Vec<CommentView>, DomainError> {
        Ok(self.with(|t| {
            let mut comments: Vec<&Comment> =
                t.comments.iter().filter(|c| c.post_id == post_id).collect();
            comments.sort_by(|a, b| a.created.cmp(&b.created).then(a.id.cmp(&b.id)));
            comments.into_iter().map(|c| t.comment_view(c)).collect()
        }))
    }

    async fn list(
        &self,
        filter: &CommentFilter,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<CommentView>, DomainError> {
        Ok(self.with(|t| {
            let views = t
                .filtered_comments(filter)
                .into_iter()
                .map(|c| t.comment_view(c))
                .collect();
            window(views, limit, offset)
        }))
    }

    async fn count(&self, filter: &CommentFilter) -> Result<i64, DomainError> {
        Ok(self.with(|t| t.filtered_comments(filter).len() as i64))
    }
}

#[async_trait]
impl FollowRepository for MemoryStore {
    async fn follow(&self, user_id: Uuid, author_id: Uuid) -> Result<bool, DomainError> {
        Ok(self.with(|t| {
            if user_id == author_id
                || t.follows
                    .iter()
                    .any(|f| f.user_id == user_id && f.author_id == author_id)
            {
                return false;
            }
            let id = t.next_id();
            t.follows.push(Follow {
                id,
                user_id,
                author_id,
            });
            true
        }))
    }

    async fn unfollow(&self, user_id: Uuid, author_id: Uuid) -> Result<bool, DomainError> {
        Ok(self.with(|t| {
            let before = t.follows.len();
            t.follows
                .retain(|f| !(f.user_id == user_id && f.author_id == author_id));
            t.follows.len() != before
        }))
    }

    async fn is_following(&self, user_id: Uuid, author_id: Uuid) -> Result<bool, DomainError> {
        Ok(self.with(|t| {
            t.follows
                .iter()
                .any(|f| f.user_id == user_id && f.author_id == author_id)
        }))
    }

    async fn list(&self, limit: i64, offset: i64) -> Result<Vec<FollowView>, DomainError> {
        Ok(self.with(|t| {
            let mut views: Vec<FollowView> = t
                .follows
                .iter()
                .map(|f| FollowView {
                    id: f.id,
                    user_username: t.username(f.user_id),
                    author_username: t.username(f.author_id),
                })
                .collect();
            views.sort_by(|a, b| {
                a.author_username
                    .cmp(&b.author_username)
                    .then(a.id.cmp(&b.id))
            });
            window(views, limit, offset)
        }))
    }

    async fn count(&self) -> Result<i64, DomainError> {
        Ok(self.with(|t| t.follows.len() as i64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[actix_web::test]
    async fn deleting_a_group_keeps_its_posts() {
        let store = MemoryStore::new();
        let author = store.add_user("author");
        let group = store.add_group("Cats", "cats", "All about cats");
        let post = store.add_post(&author, "Meow", Some(&group));

        store.delete_group(group.id);

        let view = PostRepository::find_by_id(&store, post.id).await.unwrap().unwrap();
        assert_eq!(view.group_id, None);
        assert_eq!(view.group_slug, None);
    }

    #[actix_web::test]
    async fn deleting_a_user_cascades() {
        let store = MemoryStore::new();
        let author = store.add_user("author");
        let reader = store.add_user("reader");
        let post = store.add_post(&author, "Hello", None);
        CommentRepository::create(
            &store,
            NewComment {
                post_id: post.id,
                author_id: reader.id,
                text: "Hi".into(),
            },
        )
        .await
        .unwrap();
        FollowRepository::follow(&store, reader.id, author.id).await.unwrap();

        store.delete_user(author.id);

        assert!(store.posts().is_empty());
        assert!(store.comments().is_empty());
        assert!(store.follows().is_empty());
    }
}
