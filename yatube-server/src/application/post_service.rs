use std::sync::Arc;

use tracing::{info, instrument};
use uuid::Uuid;

use crate::application::paginator::{Page, Paginator};
use crate::data::comment_repository::CommentRepository;
use crate::data::group_repository::GroupRepository;
use crate::data::post_repository::PostRepository;
use crate::domain::comment::{Comment, CommentView, NewComment};
use crate::domain::error::DomainError;
use crate::domain::filter::{CommentFilter, PostFilter};
use crate::domain::post::{ImageChange, NewPost, Post, PostUpdate, PostView};
use crate::domain::validation::{FormErrors, REQUIRED};
use crate::infrastructure::media::{MediaStorage, POST_IMAGES_DIR};

pub const INVALID_GROUP: &str = "Select a valid choice. That choice is not one of the available choices.";

/// An uploaded image that already passed form validation.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// Post fields as submitted through the post form.
#[derive(Debug, Clone, Default)]
pub struct PostDraft {
    pub text: String,
    pub group_id: Option<i64>,
    pub image: Option<ImageUpload>,
    pub clear_image: bool,
}

#[derive(Clone)]
pub struct PostService {
    posts: Arc<dyn PostRepository>,
    comments: Arc<dyn CommentRepository>,
    groups: Arc<dyn GroupRepository>,
    media: MediaStorage,
    paginator: Paginator,
}

impl PostService {
    pub fn new(
        posts: Arc<dyn PostRepository>,
        comments: Arc<dyn CommentRepository>,
        groups: Arc<dyn GroupRepository>,
        media: MediaStorage,
        paginator: Paginator,
    ) -> Self {
        Self {
            posts,
            comments,
            groups,
            media,
            paginator,
        }
    }

    pub async fn page(
        &self,
        filter: &PostFilter,
        requested: Option<&str>,
    ) -> Result<Page<PostView>, DomainError> {
        self.page_with(self.paginator, filter, requested).await
    }

    pub async fn page_with(
        &self,
        paginator: Paginator,
        filter: &PostFilter,
        requested: Option<&str>,
    ) -> Result<Page<PostView>, DomainError> {
        let total = self.posts.count(filter).await?;
        let number = paginator.page_number(requested, total);
        let (limit, offset) = paginator.window(number);
        let items = self.posts.list(filter, limit, offset).await?;
        Ok(Page::new(items, number, paginator.num_pages(total), total))
    }

    pub async fn get_post(&self, id: i64) -> Result<PostView, DomainError> {
        self.posts
            .find_by_id(id)
            .await?
            .ok_or(DomainError::PostNotFound(id))
    }

    pub async fn count_by_author(&self, author_id: Uuid) -> Result<i64, DomainError> {
        self.posts.count(&PostFilter::author(author_id)).await
    }

    #[instrument(skip(self, draft), fields(group_id = ?draft.group_id))]
    pub async fn create_post(&self, author_id: Uuid, draft: PostDraft) -> Result<Post, DomainError> {
        let text = self.validate(&draft).await?;
        let image = match &draft.image {
            Some(upload) => Some(self.store_image(upload).await?),
            None => None,
        };

        self.posts
            .create(NewPost {
                text,
                author_id,
                group_id: draft.group_id,
                image,
            })
            .await
    }

    /// Only the author may edit a post.
    #[instrument(skip(self, draft))]
    pub async fn update_post(
        &self,
        editor_id: Uuid,
        post_id: i64,
        draft: PostDraft,
    ) -> Result<Post, DomainError> {
        let current = self.get_post(post_id).await?;
        if current.author_id != editor_id {
            return Err(DomainError::Forbidden);
        }

        let text = self.validate(&draft).await?;
        let image = match (&draft.image, draft.clear_image) {
            (Some(upload), _) => ImageChange::Replace(self.store_image(upload).await?),
            (None, true) => ImageChange::Clear,
            (None, false) => ImageChange::Keep,
        };

        self.posts
            .update(
                post_id,
                PostUpdate {
                    text,
                    group_id: draft.group_id,
                    image,
                },
            )
            .await?
            .ok_or(DomainError::PostNotFound(post_id))
    }

    #[instrument(skip(self))]
    pub async fn set_group(&self, post_id: i64, group_id: Option<i64>) -> Result<(), DomainError> {
        self.ensure_group(group_id)
            .await?
            .into_result()
            .map_err(DomainError::Validation)?;
        if self.posts.set_group(post_id, group_id).await? {
            info!(post_id, ?group_id, "post group changed");
            Ok(())
        } else {
            Err(DomainError::PostNotFound(post_id))
        }
    }

    pub async fn comments(&self, post_id: i64) -> Result<Vec<CommentView>, DomainError> {
        self.comments.list_for_post(post_id).await
    }

    #[instrument(skip(self, text))]
    pub async fn add_comment(
        &self,
        author_id: Uuid,
        post_id: i64,
        text: &str,
    ) -> Result<Comment, DomainError> {
        self.get_post(post_id).await?;

        let text = text.trim();
        if text.is_empty() {
            return Err(DomainError::Validation(FormErrors::single("text", REQUIRED)));
        }

        self.comments
            .create(NewComment {
                post_id,
                author_id,
                text: text.to_string(),
            })
            .await
    }

    pub async fn comments_page(
        &self,
        paginator: Paginator,
        filter: &CommentFilter,
        requested: Option<&str>,
    ) -> Result<Page<CommentView>, DomainError> {
        let total = self.comments.count(filter).await?;
        let number = paginator.page_number(requested, total);
        let (limit, offset) = paginator.window(number);
        let items = self.comments.list(filter, limit, offset).await?;
        Ok(Page::new(items, number, paginator.num_pages(total), total))
    }

    /// Returns the trimmed text when the draft is acceptable.
    async fn validate(&self, draft: &PostDraft) -> Result<String, DomainError> {
        let mut errors = self.ensure_group(draft.group_id).await?;
        let text = draft.text.trim();
        if text.is_empty() {
            errors.add("text", REQUIRED);
        }
        errors.into_result().map_err(DomainError::Validation)?;
        Ok(text.to_string())
    }

    async fn ensure_group(&self, group_id: Option<i64>) -> Result<FormErrors, DomainError> {
        let mut errors = FormErrors::new();
        if let Some(id) = group_id {
            if self.groups.find_by_id(id).await?.is_none() {
                errors.add("group", INVALID_GROUP);
            }
        }
        Ok(errors)
    }

    async fn store_image(&self, upload: &ImageUpload) -> Result<String, DomainError> {
        self.media
            .save(POST_IMAGES_DIR, &upload.file_name, &upload.bytes)
            .await
            .map_err(|e| DomainError::Internal(format!("failed to store image: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::memory::MemoryStore;
    use crate::domain::user::User;

    struct Fixture {
        store: Arc<MemoryStore>,
        service: PostService,
        _media: tempfile::TempDir,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let media = tempfile::tempdir().unwrap();
        let service = PostService::new(
            store.clone(),
            store.clone(),
            store.clone(),
            MediaStorage::new(media.path()),
            Paginator::default(),
        );
        Fixture {
            store,
            service,
            _media: media,
        }
    }

    fn draft(text: &str) -> PostDraft {
        PostDraft {
            text: text.into(),
            ..PostDraft::default()
        }
    }

    fn seed_posts(store: &MemoryStore, author: &User, n: usize) {
        for i in 0..n {
            store.add_post(author, &format!("Post {i}"), None);
        }
    }

    #[actix_web::test]
    async fn pages_hold_ten_posts_newest_first() {
        let f = fixture();
        let author = f.store.add_user("author");
        seed_posts(&f.store, &author, 13);

        let first = f.service.page(&PostFilter::all(), None).await.unwrap();
        assert_eq!(first.len(), 10);
        assert_eq!(first.num_pages, 2);
        assert_eq!(first.items[0].text, "Post 12");

        let second = f.service.page(&PostFilter::all(), Some("2")).await.unwrap();
        assert_eq!(second.len(), 3);
        assert_eq!(second.items[2].text, "Post 0");
    }

    #[actix_web::test]
    async fn creates_post_in_group() {
        let f = fixture();
        let author = f.store.add_user("author");
        let group = f.store.add_group("Cats", "cats", "About cats");

        let post = f
            .service
            .create_post(
                author.id,
                PostDraft {
                    text: "  Meow  ".into(),
                    group_id: Some(group.id),
                    ..PostDraft::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(post.text, "Meow");

        let in_group = f.service.page(&PostFilter::group(group.id), None).await.unwrap();
        assert_eq!(in_group.total, 1);
        assert_eq!(in_group.items[0].group_slug.as_deref(), Some("cats"));
    }

    #[actix_web::test]
    async fn rejects_blank_text_and_unknown_group() {
        let f = fixture();
        let author = f.store.add_user("author");

        let err = f
            .service
            .create_post(
                author.id,
                PostDraft {
                    text: "   ".into(),
                    group_id: Some(999),
                    ..PostDraft::default()
                },
            )
            .await
            .unwrap_err();
        match err {
            DomainError::Validation(errors) => {
                assert_eq!(errors.field("text"), [REQUIRED.to_string()]);
                assert_eq!(errors.field("group"), [INVALID_GROUP.to_string()]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(f.store.posts().is_empty());
    }

    #[actix_web::test]
    async fn stores_uploaded_image() {
        let f = fixture();
        let author = f.store.add_user("author");
        let post = f
            .service
            .create_post(
                author.id,
                PostDraft {
                    text: "With a picture".into(),
                    image: Some(ImageUpload {
                        file_name: "small.gif".into(),
                        bytes: b"GIF89a".to_vec(),
                    }),
                    ..PostDraft::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(post.image.as_deref(), Some("posts/small.gif"));
        let stored = f.service.media.read("posts/small.gif").await.unwrap();
        assert_eq!(stored, b"GIF89a");
    }

    #[actix_web::test]
    async fn only_author_updates() {
        let f = fixture();
        let author = f.store.add_user("author");
        let other = f.store.add_user("other");
        let post = f.store.add_post(&author, "Original", None);

        assert!(matches!(
            f.service.update_post(other.id, post.id, draft("Hijacked")).await,
            Err(DomainError::Forbidden)
        ));

        let updated = f
            .service
            .update_post(author.id, post.id, draft("Edited"))
            .await
            .unwrap();
        assert_eq!(updated.text, "Edited");
        assert_eq!(updated.pub_date, post.pub_date);
    }

    #[actix_web::test]
    async fn update_keeps_or_clears_image() {
        let f = fixture();
        let author = f.store.add_user("author");
        let post = f
            .store
            .add_post_with_image(&author, "Picture", None, Some("posts/cat.png"));

        let kept = f
            .service
            .update_post(author.id, post.id, draft("Still a picture"))
            .await
            .unwrap();
        assert_eq!(kept.image.as_deref(), Some("posts/cat.png"));

        let cleared = f
            .service
            .update_post(
                author.id,
                post.id,
                PostDraft {
                    text: "No picture".into(),
                    clear_image: true,
                    ..PostDraft::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(cleared.image, None);
    }

    #[actix_web::test]
    async fn missing_post_is_not_found() {
        let f = fixture();
        assert!(matches!(
            f.service.get_post(42).await,
            Err(DomainError::PostNotFound(42))
        ));
    }

    #[actix_web::test]
    async fn comments_are_listed_oldest_first() {
        let f = fixture();
        let author = f.store.add_user("author");
        let reader = f.store.add_user("reader");
        let post = f.store.add_post(&author, "Hello", None);

        f.service.add_comment(reader.id, post.id, "first").await.unwrap();
        f.service.add_comment(author.id, post.id, "second").await.unwrap();

        let comments = f.service.comments(post.id).await.unwrap();
        let texts: Vec<&str> = comments.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, ["first", "second"]);
        assert_eq!(comments[0].author_username, "reader");
    }

    #[actix_web::test]
    async fn comment_needs_text_and_post() {
        let f = fixture();
        let author = f.store.add_user("author");
        let post = f.store.add_post(&author, "Hello", None);

        assert!(matches!(
            f.service.add_comment(author.id, post.id, "  ").await,
            Err(DomainError::Validation(_))
        ));
        assert!(matches!(
            f.service.add_comment(author.id, 999, "hi").await,
            Err(DomainError::PostNotFound(999))
        ));
        assert!(f.store.comments().is_empty());
    }

    #[actix_web::test]
    async fn set_group_validates_group() {
        let f = fixture();
        let author = f.store.add_user("author");
        let group = f.store.add_group("Cats", "cats", "About cats");
        let post = f.store.add_post(&author, "Hello", None);

        f.service.set_group(post.id, Some(group.id)).await.unwrap();
        assert_eq!(f.service.get_post(post.id).await.unwrap().group_id, Some(group.id));

        assert!(matches!(
            f.service.set_group(post.id, Some(999)).await,
            Err(DomainError::Validation(_))
        ));
        assert!(matches!(
            f.service.set_group(999, None).await,
            Err(DomainError::PostNotFound(999))
        ));
    }

    #[actix_web::test]
    async fn author_post_count() {
        let f = fixture();
        let author = f.store.add_user("author");
        let other = f.store.add_user("other");
        seed_posts(&f.store, &author, 3);
        seed_posts(&f.store, &other, 2);
        assert_eq!(f.service.count_by_author(author.id).await.unwrap(), 3);
    }
}
