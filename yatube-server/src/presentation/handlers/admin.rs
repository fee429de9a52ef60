use actix_web::{HttpRequest, HttpResponse, Scope, get, post, web};
use chrono::Utc;
use serde::Serialize;
use tera::Tera;
use tracing::info;

use crate::application::follow_service::FollowService;
use crate::application::group_service::GroupService;
use crate::application::paginator::Paginator;
use crate::application::post_service::{INVALID_GROUP, PostService};
use crate::domain::error::DomainError;
use crate::domain::filter::{CommentFilter, DateRange, PostFilter};
use crate::domain::group::NewGroup;
use crate::domain::validation::FormErrors;
use crate::infrastructure::templates::{html, render};
use crate::presentation::forms::{AdminListQuery, GroupForm, PostGroupForm};
use crate::presentation::utils::{
    AuthenticatedUser, StaffUser, base_context, redirect, request_id,
};

/// Rows per admin list page.
const ADMIN_PER_PAGE: u32 = 100;
const EMPTY_VALUE: &str = "-empty-";

pub fn scope() -> Scope {
    web::scope("/admin")
        .service(admin_index)
        .service(posts)
        .service(post_group)
        .service(groups)
        .service(create_group)
        .service(comments)
        .service(follows)
}

#[derive(Serialize)]
struct DateChoice {
    key: &'static str,
    label: &'static str,
    selected: bool,
}

fn date_choices(selected: DateRange) -> Vec<DateChoice> {
    DateRange::ALL
        .iter()
        .map(|range| DateChoice {
            key: range.key(),
            label: range.label(),
            selected: *range == selected,
        })
        .collect()
}

#[get("/")]
async fn admin_index(
    StaffUser(user): StaffUser,
    tera: web::Data<Tera>,
) -> Result<HttpResponse, DomainError> {
    let context = base_context(Some(&user));
    Ok(html(render(&tera, "admin/index.html", &context)?))
}

#[get("/posts/")]
async fn posts(
    StaffUser(user): StaffUser,
    tera: web::Data<Tera>,
    post_service: web::Data<PostService>,
    group_service: web::Data<GroupService>,
    query: web::Query<AdminListQuery>,
) -> Result<HttpResponse, DomainError> {
    render_posts(&tera, &post_service, &group_service, &user, &query, None).await
}

#[post("/posts/{id}/group/")]
async fn post_group(
    req: HttpRequest,
    StaffUser(user): StaffUser,
    tera: web::Data<Tera>,
    post_service: web::Data<PostService>,
    group_service: web::Data<GroupService>,
    path: web::Path<i64>,
    form: web::Form<PostGroupForm>,
) -> Result<HttpResponse, DomainError> {
    let post_id = path.into_inner();
    let value = form.group.trim();
    let changed = if value.is_empty() {
        post_service.set_group(post_id, None).await.map(|()| None)
    } else {
        match value.parse::<i64>() {
            Ok(id) => post_service.set_group(post_id, Some(id)).await.map(|()| Some(id)),
            Err(_) => Err(DomainError::Validation(FormErrors::single("group", INVALID_GROUP))),
        }
    };

    let errors = match changed {
        Ok(group_id) => {
            info!(
                request_id = %request_id(&req),
                username = %user.username,
                post_id,
                ?group_id,
                "post group changed from admin"
            );
            return Ok(redirect("/admin/posts/"));
        }
        Err(DomainError::Validation(errors)) => errors,
        Err(e) => return Err(e),
    };
    let rejected = RejectedRow { post_id, errors };
    render_posts(
        &tera,
        &post_service,
        &group_service,
        &user,
        &AdminListQuery::default(),
        Some(&rejected),
    )
    .await
}

/// Inline edit that failed validation, shown next to its row.
#[derive(Serialize)]
struct RejectedRow {
    post_id: i64,
    errors: FormErrors,
}

async fn render_posts(
    tera: &Tera,
    post_service: &PostService,
    group_service: &GroupService,
    user: &AuthenticatedUser,
    query: &AdminListQuery,
    rejected: Option<&RejectedRow>,
) -> Result<HttpResponse, DomainError> {
    let range = DateRange::parse(query.date.as_deref());
    let search = query.q.as_deref().map(str::trim).filter(|q| !q.is_empty());
    let filter = PostFilter::all()
        .search(search)
        .since(range.since(Utc::now()));
    let page = post_service
        .page_with(Paginator::new(ADMIN_PER_PAGE), &filter, query.page.as_deref())
        .await?;

    let mut context = base_context(Some(user));
    context.insert("page_obj", &page);
    context.insert("groups", &group_service.list(None).await?);
    context.insert("q", &search.unwrap_or_default());
    context.insert("date", range.key());
    context.insert("date_choices", &date_choices(range));
    context.insert("empty_value", EMPTY_VALUE);
    context.insert("rejected", &rejected);
    Ok(html(render(tera, "admin/posts.html", &context)?))
}

#[get("/groups/")]
async fn groups(
    StaffUser(user): StaffUser,
    tera: web::Data<Tera>,
    group_service: web::Data<GroupService>,
    query: web::Query<AdminListQuery>,
) -> Result<HttpResponse, DomainError> {
    render_groups(
        &tera,
        &group_service,
        &user,
        query.q.as_deref(),
        &GroupForm::default(),
        &FormErrors::new(),
    )
    .await
}

#[post("/groups/")]
async fn create_group(
    req: HttpRequest,
    StaffUser(user): StaffUser,
    tera: web::Data<Tera>,
    group_service: web::Data<GroupService>,
    form: web::Form<GroupForm>,
) -> Result<HttpResponse, DomainError> {
    let form = form.into_inner();
    let created = group_service
        .create(NewGroup {
            title: form.title.clone(),
            slug: form.slug.clone(),
            description: form.description.clone(),
        })
        .await;

    let errors = match created {
        Ok(group) => {
            info!(
                request_id = %request_id(&req),
                username = %user.username,
                slug = %group.slug,
                "group created from admin"
            );
            return Ok(redirect("/admin/groups/"));
        }
        Err(DomainError::Validation(errors)) => errors,
        Err(DomainError::GroupAlreadyExists(_)) => {
            FormErrors::single("slug", "Group with this Slug already exists.")
        }
        Err(e) => return Err(e),
    };
    render_groups(&tera, &group_service, &user, None, &form, &errors).await
}

#[get("/comments/")]
async fn comments(
    StaffUser(user): StaffUser,
    tera: web::Data<Tera>,
    post_service: web::Data<PostService>,
    query: web::Query<AdminListQuery>,
) -> Result<HttpResponse, DomainError> {
    let range = DateRange::parse(query.date.as_deref());
    let filter = CommentFilter {
        post_id: None,
        created_since: range.since(Utc::now()),
    };
    let page = post_service
        .comments_page(Paginator::new(ADMIN_PER_PAGE), &filter, query.page.as_deref())
        .await?;

    let mut context = base_context(Some(&user));
    context.insert("page_obj", &page);
    context.insert("date", range.key());
    context.insert("date_choices", &date_choices(range));
    Ok(html(render(&tera, "admin/comments.html", &context)?))
}

#[get("/follows/")]
async fn follows(
    StaffUser(user): StaffUser,
    tera: web::Data<Tera>,
    follow_service: web::Data<FollowService>,
    query: web::Query<AdminListQuery>,
) -> Result<HttpResponse, DomainError> {
    let page = follow_service
        .page(Paginator::new(ADMIN_PER_PAGE), query.page.as_deref())
        .await?;

    let mut context = base_context(Some(&user));
    context.insert("page_obj", &page);
    Ok(html(render(&tera, "admin/follows.html", &context)?))
}

async fn render_groups(
    tera: &Tera,
    group_service: &GroupService,
    user: &AuthenticatedUser,
    search: Option<&str>,
    form: &GroupForm,
    errors: &FormErrors,
) -> Result<HttpResponse, DomainError> {
    let mut context = base_context(Some(user));
    context.insert("groups", &group_service.list(search).await?);
    context.insert("q", search.map(str::trim).unwrap_or_default());
    context.insert("form", form);
    context.insert("errors", errors);
    Ok(html(render(tera, "admin/groups.html", &context)?))
}
