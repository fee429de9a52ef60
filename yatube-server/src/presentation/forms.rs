use actix_multipart::{Field, Multipart};
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};

use crate::application::auth_service::Registration;
use crate::application::post_service::{INVALID_GROUP, ImageUpload, PostDraft};
use crate::domain::error::DomainError;
use crate::domain::validation::{FormErrors, NON_FIELD};

pub const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;
const MAX_TEXT_FIELD_BYTES: usize = 64 * 1024;

const INVALID_IMAGE: &str =
    "Upload a valid image. The file you uploaded was either not an image or a corrupted image.";

#[derive(Debug, Clone, Copy, Serialize)]
pub struct FieldMeta {
    pub label: &'static str,
    pub help_text: &'static str,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct PostFormFields {
    pub text: FieldMeta,
    pub group: FieldMeta,
    pub image: FieldMeta,
}

pub const POST_FORM_FIELDS: PostFormFields = PostFormFields {
    text: FieldMeta {
        label: "Post text",
        help_text: "Text of the post, required",
    },
    group: FieldMeta {
        label: "Group",
        help_text: "Group of the post, optional",
    },
    image: FieldMeta {
        label: "Image",
        help_text: "",
    },
};

/// Values the post form is rendered with.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PostForm {
    pub text: String,
    pub group: Option<i64>,
    pub image: Option<String>,
    pub errors: FormErrors,
}

impl PostForm {
    pub fn bound(draft: &PostDraft, current_image: Option<String>, errors: FormErrors) -> Self {
        Self {
            text: draft.text.clone(),
            group: draft.group_id,
            image: current_image,
            errors,
        }
    }
}

/// Reads the multipart post form. Field-level problems are returned as
/// errors next to whatever could be read.
pub async fn read_post_form(mut payload: Multipart) -> Result<(PostDraft, FormErrors), DomainError> {
    let mut draft = PostDraft::default();
    let mut errors = FormErrors::new();

    while let Some(field) = payload.next().await {
        let field = field.map_err(|e| DomainError::Validation(FormErrors::single(
            NON_FIELD,
            format!("Malformed form data: {}", e),
        )))?;
        let name = field.name().unwrap_or_default().to_string();
        let file_name = field
            .content_disposition()
            .and_then(|cd| cd.get_filename())
            .map(str::to_string);

        match name.as_str() {
            "text" => {
                draft.text = read_text(field, "text", &mut errors).await?;
            }
            "group" => {
                let value = read_text(field, "group", &mut errors).await?;
                let value = value.trim();
                if !value.is_empty() {
                    match value.parse::<i64>() {
                        Ok(id) => draft.group_id = Some(id),
                        Err(_) => errors.add("group", INVALID_GROUP),
                    }
                }
            }
            "image" => {
                let bytes = read_bytes(field, MAX_IMAGE_BYTES).await?;
                match bytes {
                    None => errors.add(
                        "image",
                        format!("The image is larger than {} MB.", MAX_IMAGE_BYTES / (1024 * 1024)),
                    ),
                    // an empty file input submits a part without content
                    Some(bytes) if bytes.is_empty() => {}
                    Some(bytes) => {
                        if is_valid_image(&bytes) {
                            draft.image = Some(ImageUpload {
                                file_name: file_name.unwrap_or_else(|| "image".into()),
                                bytes,
                            });
                        } else {
                            errors.add("image", INVALID_IMAGE);
                        }
                    }
                }
            }
            "image-clear" => {
                let value = read_text(field, "image-clear", &mut errors).await?;
                draft.clear_image = matches!(value.trim(), "on" | "true" | "1");
            }
            _ => {
                read_bytes(field, MAX_TEXT_FIELD_BYTES).await?;
            }
        }
    }

    Ok((draft, errors))
}

/// Decodes the whole image, not just its header.
pub fn is_valid_image(bytes: &[u8]) -> bool {
    image::guess_format(bytes).is_ok() && image::load_from_memory(bytes).is_ok()
}

async fn read_text(field: Field, name: &str, errors: &mut FormErrors) -> Result<String, DomainError> {
    match read_bytes(field, MAX_TEXT_FIELD_BYTES).await? {
        Some(bytes) => match String::from_utf8(bytes) {
            Ok(text) => Ok(text),
            Err(_) => {
                errors.add(name, "Enter valid text.");
                Ok(String::new())
            }
        },
        None => {
            errors.add(name, "This value is too long.");
            Ok(String::new())
        }
    }
}

/// `None` when the field exceeds `limit`; the rest of it is drained.
async fn read_bytes(mut field: Field, limit: usize) -> Result<Option<Vec<u8>>, DomainError> {
    let mut data = Vec::new();
    let mut too_large = false;
    while let Some(chunk) = field.next().await {
        let chunk = chunk.map_err(|e| {
            DomainError::Validation(FormErrors::single(NON_FIELD, format!("Malformed form data: {}", e)))
        })?;
        if too_large {
            continue;
        }
        if data.len() + chunk.len() > limit {
            too_large = true;
            data.clear();
        } else {
            data.extend_from_slice(&chunk);
        }
    }
    Ok(if too_large { None } else { Some(data) })
}

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub page: Option<String>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct CommentForm {
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct LoginQuery {
    pub next: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    pub next: Option<String>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct SignupForm {
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default, skip_serializing)]
    pub password: String,
    #[serde(default, skip_serializing)]
    pub password_confirmation: String,
}

impl From<&SignupForm> for Registration {
    fn from(form: &SignupForm) -> Self {
        Registration {
            username: form.username.trim().to_string(),
            email: form.email.trim().to_string(),
            first_name: form.first_name.trim().to_string(),
            last_name: form.last_name.trim().to_string(),
            password: form.password.clone(),
            password_confirmation: form.password_confirmation.clone(),
        }
    }
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct GroupForm {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Deserialize)]
pub struct PostGroupForm {
    #[serde(default)]
    pub group: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct AdminListQuery {
    pub q: Option<String>,
    pub date: Option<String>,
    pub page: Option<String>,
}
