use std::sync::Arc;

use tracing::instrument;

use crate::data::group_repository::GroupRepository;
use crate::domain::error::DomainError;
use crate::domain::group::{Group, NewGroup, TITLE_MAX_LEN, is_valid_slug};
use crate::domain::validation::{FormErrors, REQUIRED};

#[derive(Clone)]
pub struct GroupService {
    repo: Arc<dyn GroupRepository>,
}

impl GroupService {
    pub fn new(repo: Arc<dyn GroupRepository>) -> Self {
        Self { repo }
    }

    pub async fn get_by_slug(&self, slug: &str) -> Result<Group, DomainError> {
        self.repo
            .find_by_slug(slug)
            .await?
            .ok_or_else(|| DomainError::GroupNotFound(slug.to_string()))
    }

    pub async fn list(&self, search: Option<&str>) -> Result<Vec<Group>, DomainError> {
        let search = search.map(str::trim).filter(|s| !s.is_empty());
        self.repo.list(search).await
    }

    #[instrument(skip(self))]
    pub async fn create(&self, group: NewGroup) -> Result<Group, DomainError> {
        let group = NewGroup {
            title: group.title.trim().to_string(),
            slug: group.slug.trim().to_string(),
            description: group.description.trim().to_string(),
        };

        let mut errors = FormErrors::new();
        if group.title.is_empty() {
            errors.add("title", REQUIRED);
        } else if group.title.chars().count() > TITLE_MAX_LEN {
            errors.add(
                "title",
                format!("Ensure this value has at most {TITLE_MAX_LEN} characters."),
            );
        }
        if group.slug.is_empty() {
            errors.add("slug", REQUIRED);
        } else if !is_valid_slug(&group.slug) {
            errors.add(
                "slug",
                "Enter a valid slug consisting of letters, numbers, underscores or hyphens.",
            );
        }
        if group.description.is_empty() {
            errors.add("description", REQUIRED);
        }
        errors.into_result().map_err(DomainError::Validation)?;

        self.repo.create(group).await
    }
}
