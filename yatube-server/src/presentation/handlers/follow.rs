use actix_web::{HttpRequest, HttpResponse, route, web};
use tracing::info;

use crate::application::follow_service::FollowService;
use crate::domain::error::DomainError;
use crate::presentation::utils::{AuthenticatedUser, redirect, request_id};

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(profile_follow).service(profile_unfollow);
}

#[route("/profile/{username}/follow/", method = "GET", method = "POST")]
async fn profile_follow(
    req: HttpRequest,
    user: AuthenticatedUser,
    follows: web::Data<FollowService>,
    path: web::Path<String>,
) -> Result<HttpResponse, DomainError> {
    let author = follows.follow(user.id, &path).await?;
    info!(
        request_id = %request_id(&req),
        username = %user.username,
        author = %author.username,
        "author followed"
    );
    Ok(redirect(format!("/profile/{}/", author.username)))
}

#[route("/profile/{username}/unfollow/", method = "GET", method = "POST")]
async fn profile_unfollow(
    req: HttpRequest,
    user: AuthenticatedUser,
    follows: web::Data<FollowService>,
    path: web::Path<String>,
) -> Result<HttpResponse, DomainError> {
    let author = follows.unfollow(user.id, &path).await?;
    info!(
        request_id = %request_id(&req),
        username = %user.username,
        author = %author.username,
        "author unfollowed"
    );
    Ok(redirect(format!("/profile/{}/", author.username)))
}
