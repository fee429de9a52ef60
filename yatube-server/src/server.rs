use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use actix_files::Files;
use actix_web::body::MessageBody;
use actix_web::dev::{ServiceFactory, ServiceRequest, ServiceResponse};
use actix_web::middleware::{DefaultHeaders, Logger};
use actix_web::{App, Error, HttpRequest, HttpResponse, HttpServer, Responder, web};
use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use tera::Tera;
use tracing::info;

use crate::application::auth_service::AuthService;
use crate::application::follow_service::FollowService;
use crate::application::group_service::GroupService;
use crate::application::paginator::Paginator;
use crate::application::post_service::PostService;
use crate::data::comment_repository::{CommentRepository, PostgresCommentRepository};
use crate::data::follow_repository::{FollowRepository, PostgresFollowRepository};
use crate::data::group_repository::{GroupRepository, PostgresGroupRepository};
use crate::data::post_repository::{PostRepository, PostgresPostRepository};
use crate::data::user_repository::{PostgresUserRepository, UserRepository};
use crate::domain::error::DomainError;
use crate::infrastructure::cache::PageCache;
use crate::infrastructure::config::AppConfig;
use crate::infrastructure::database::{create_pool, run_migrations};
use crate::infrastructure::media::MediaStorage;
use crate::infrastructure::security::JwtKeys;
use crate::infrastructure::templates::{error_pages, load_templates};
use crate::presentation::handlers;
use crate::presentation::middleware::{IdentityMiddleware, RequestIdMiddleware, TimingMiddleware};
use crate::presentation::utils::SessionCookie;

/// One implementation per repository trait.
#[derive(Clone)]
pub struct Repositories {
    pub users: Arc<dyn UserRepository>,
    pub groups: Arc<dyn GroupRepository>,
    pub posts: Arc<dyn PostRepository>,
    pub comments: Arc<dyn CommentRepository>,
    pub follows: Arc<dyn FollowRepository>,
}

impl Repositories {
    pub fn postgres(pool: PgPool) -> Self {
        Self {
            users: Arc::new(PostgresUserRepository::new(pool.clone())),
            groups: Arc::new(PostgresGroupRepository::new(pool.clone())),
            posts: Arc::new(PostgresPostRepository::new(pool.clone())),
            comments: Arc::new(PostgresCommentRepository::new(pool.clone())),
            follows: Arc::new(PostgresFollowRepository::new(pool)),
        }
    }
}

/// Everything the handlers pull out of `app_data`, built once and shared by
/// all workers.
#[derive(Clone)]
pub struct AppState {
    pub auth: web::Data<AuthService>,
    pub groups: web::Data<GroupService>,
    pub posts: web::Data<PostService>,
    pub follows: web::Data<FollowService>,
    pub tera: web::Data<Tera>,
    pub index_cache: web::Data<PageCache>,
    pub session: web::Data<SessionCookie>,
    media_root: PathBuf,
}

impl AppState {
    pub fn new(config: &AppConfig, repos: Repositories, tera: Tera) -> Self {
        let keys = JwtKeys::new(
            config.jwt_secret.clone(),
            chrono::Duration::hours(config.session_ttl_hours),
        );
        let media = MediaStorage::new(&config.media_root);

        Self {
            auth: web::Data::new(AuthService::new(repos.users.clone(), keys)),
            groups: web::Data::new(GroupService::new(repos.groups.clone())),
            posts: web::Data::new(PostService::new(
                repos.posts,
                repos.comments,
                repos.groups,
                media.clone(),
                Paginator::new(config.posts_per_page),
            )),
            follows: web::Data::new(FollowService::new(repos.follows, repos.users)),
            tera: web::Data::new(tera),
            index_cache: web::Data::new(PageCache::new(
                "index_page",
                Duration::from_secs(config.index_cache_seconds),
            )),
            session: web::Data::new(SessionCookie {
                secure: config.cookie_secure,
            }),
            media_root: media.root().to_path_buf(),
        }
    }

    pub fn configure(&self, cfg: &mut web::ServiceConfig) {
        cfg.app_data(self.auth.clone())
            .app_data(self.groups.clone())
            .app_data(self.posts.clone())
            .app_data(self.follows.clone())
            .app_data(self.tera.clone())
            .app_data(self.index_cache.clone())
            .app_data(self.session.clone())
            .route("/health", web::get().to(health))
            .service(Files::new("/media", &self.media_root))
            .service(handlers::auth::scope())
            .service(handlers::admin::scope());
        handlers::posts::configure(cfg);
        handlers::follow::configure(cfg);
    }
}

/// The full application: routes, error pages and middleware.
pub fn app(
    state: AppState,
) -> App<
    impl ServiceFactory<
        ServiceRequest,
        Config = (),
        Response = ServiceResponse<impl MessageBody>,
        Error = Error,
        InitError = (),
    >,
> {
    App::new()
        .configure(|cfg| state.configure(cfg))
        .default_service(web::to(not_found))
        .wrap(error_pages())
        .wrap(IdentityMiddleware)
        .wrap(TimingMiddleware)
        .wrap(RequestIdMiddleware)
        .wrap(Logger::default())
        .wrap(
            DefaultHeaders::new()
                .add(("X-Content-Type-Options", "nosniff"))
                .add(("Referrer-Policy", "same-origin"))
                .add(("Permissions-Policy", "geolocation=()"))
                .add(("Cross-Origin-Opener-Policy", "same-origin")),
        )
}

pub async fn run(config: AppConfig) -> anyhow::Result<()> {
    let pool = create_pool(&config.database_url)
        .await
        .context("failed to connect to database")?;
    run_migrations(&pool)
        .await
        .context("failed to run migrations")?;
    tokio::fs::create_dir_all(&config.media_root)
        .await
        .with_context(|| format!("failed to create media root {}", config.media_root))?;
    let tera = load_templates(&config.templates_dir).context("failed to load templates")?;

    let state = AppState::new(&config, Repositories::postgres(pool), tera);
    info!(host = %config.host, port = config.port, "HTTP server starting");

    HttpServer::new(move || app(state.clone()))
        .bind((config.host.as_str(), config.port))?
        .run()
        .await?;

    info!("HTTP server stopped");
    Ok(())
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub timestamp: DateTime<Utc>,
}

async fn health() -> impl Responder {
    HttpResponse::Ok().json(HealthResponse {
        status: "ok",
        timestamp: Utc::now(),
    })
}

async fn not_found(req: HttpRequest) -> Result<HttpResponse, DomainError> {
    Err(DomainError::PageNotFound(req.path().to_string()))
}
