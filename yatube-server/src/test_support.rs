//! Shared fixtures for handler tests: the real route table over an
//! in-memory store, a temporary media root and the crate's templates.

use std::sync::Arc;

use actix_http::Request;
use actix_web::body::MessageBody;
use actix_web::cookie::Cookie;
use actix_web::dev::{Service, ServiceResponse};
use actix_web::test;
use tempfile::TempDir;

use crate::data::memory::MemoryStore;
use crate::domain::user::User;
use crate::infrastructure::config::AppConfig;
use crate::infrastructure::templates::load_templates;
use crate::presentation::utils::AUTH_COOKIE;
use crate::server::{AppState, Repositories, app};

pub struct TestApp {
    pub store: Arc<MemoryStore>,
    pub state: AppState,
    pub media: TempDir,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_settings(&[])
    }

    /// Builds the app with extra environment settings on top of the test
    /// defaults.
    pub fn with_settings(settings: &[(&str, &str)]) -> Self {
        let media = tempfile::tempdir().expect("temp media root");
        let media_root = media.path().to_string_lossy().into_owned();
        let config = AppConfig::from_lookup(|key| {
            if let Some((_, value)) = settings.iter().find(|(k, _)| *k == key) {
                return Some(value.to_string());
            }
            match key {
                "DATABASE_URL" => Some("postgres://localhost/unused".into()),
                "JWT_SECRET" => Some("test-secret".into()),
                "MEDIA_ROOT" => Some(media_root.clone()),
                _ => None,
            }
        })
        .expect("test config");
        let tera = load_templates(&config.templates_dir).expect("templates");

        let store = Arc::new(MemoryStore::new());
        let repos = Repositories {
            users: store.clone(),
            groups: store.clone(),
            posts: store.clone(),
            comments: store.clone(),
            follows: store.clone(),
        };
        let state = AppState::new(&config, repos, tera);

        Self {
            store,
            state,
            media,
        }
    }

    pub async fn service(
        &self,
    ) -> impl Service<Request, Response = ServiceResponse<impl MessageBody>, Error = actix_web::Error>
    {
        test::init_service(app(self.state.clone())).await
    }

    pub fn session_for(&self, user: &User) -> Cookie<'static> {
        let token = self.state.auth.issue_token(user).expect("token");
        Cookie::new(AUTH_COOKIE, token)
    }
}

pub async fn body_text(res: ServiceResponse<impl MessageBody>) -> String {
    let bytes = test::read_body(res).await;
    String::from_utf8(bytes.to_vec()).expect("utf-8 body")
}

pub fn location<B>(res: &ServiceResponse<B>) -> String {
    res.headers()
        .get("location")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

/// How many post cards a listing page rendered.
pub fn post_cards(body: &str) -> usize {
    body.matches("<article class=\"post\"").count()
}

/// Hand-built `multipart/form-data` body.
pub struct MultipartBody {
    boundary: &'static str,
    body: Vec<u8>,
}

impl MultipartBody {
    pub fn new() -> Self {
        Self {
            boundary: "----yatube-test-boundary",
            body: Vec::new(),
        }
    }

    pub fn text(mut self, name: &str, value: &str) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                self.boundary, name, value
            )
            .as_bytes(),
        );
        self
    }

    pub fn file(mut self, name: &str, file_name: &str, content_type: &str, bytes: &[u8]) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
                self.boundary, name, file_name, content_type
            )
            .as_bytes(),
        );
        self.body.extend_from_slice(bytes);
        self.body.extend_from_slice(b"\r\n");
        self
    }

    /// `(content type header, body)`.
    pub fn finish(mut self) -> (String, Vec<u8>) {
        self.body
            .extend_from_slice(format!("--{}--\r\n", self.boundary).as_bytes());
        (
            format!("multipart/form-data; boundary={}", self.boundary),
            self.body,
        )
    }
}
