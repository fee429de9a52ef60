use actix_multipart::Multipart;
use actix_web::{HttpRequest, HttpResponse, get, post, web};
use tera::{Context, Tera};
use tracing::info;

use crate::application::auth_service::AuthService;
use crate::application::follow_service::FollowService;
use crate::application::group_service::GroupService;
use crate::application::post_service::PostService;
use crate::domain::error::DomainError;
use crate::domain::filter::PostFilter;
use crate::domain::user::Profile;
use crate::domain::validation::FormErrors;
use crate::infrastructure::cache::PageCache;
use crate::infrastructure::templates::{html, render};
use crate::presentation::forms::{
    CommentForm, POST_FORM_FIELDS, PageQuery, PostForm, read_post_form,
};
use crate::presentation::utils::{
    AuthenticatedUser, base_context, path_and_query, redirect, request_id,
};

#[get("/")]
async fn index(
    req: HttpRequest,
    user: Option<AuthenticatedUser>,
    tera: web::Data<Tera>,
    posts: web::Data<PostService>,
    cache: web::Data<PageCache>,
    query: web::Query<PageQuery>,
) -> Result<HttpResponse, DomainError> {
    let key = cache.key(user.as_ref().map(|u| u.id), &path_and_query(&req));
    if let Some(body) = cache.get(&key).await {
        return Ok(html(body));
    }

    let page = posts.page(&PostFilter::all(), query.page.as_deref()).await?;
    let mut context = base_context(user.as_ref());
    context.insert("page_obj", &page);
    let body = render(&tera, "posts/index.html", &context)?;

    cache.insert(key, body.clone()).await;
    Ok(html(body))
}

#[get("/group/{slug}/")]
async fn group_posts(
    user: Option<AuthenticatedUser>,
    tera: web::Data<Tera>,
    groups: web::Data<GroupService>,
    posts: web::Data<PostService>,
    path: web::Path<String>,
    query: web::Query<PageQuery>,
) -> Result<HttpResponse, DomainError> {
    let group = groups.get_by_slug(&path).await?;
    let page = posts
        .page(&PostFilter::group(group.id), query.page.as_deref())
        .await?;

    let mut context = base_context(user.as_ref());
    context.insert("group", &group);
    context.insert("page_obj", &page);
    Ok(html(render(&tera, "posts/group_list.html", &context)?))
}

#[get("/profile/{username}/")]
async fn profile(
    user: Option<AuthenticatedUser>,
    tera: web::Data<Tera>,
    auth: web::Data<AuthService>,
    posts: web::Data<PostService>,
    follows: web::Data<FollowService>,
    path: web::Path<String>,
    query: web::Query<PageQuery>,
) -> Result<HttpResponse, DomainError> {
    let author = auth.get_by_username(&path).await?;
    let page = posts
        .page(&PostFilter::author(author.id), query.page.as_deref())
        .await?;
    let following = match &user {
        Some(viewer) => follows.is_following(viewer.id, author.id).await?,
        None => false,
    };
    let is_self = user.as_ref().is_some_and(|viewer| viewer.id == author.id);

    let mut context = base_context(user.as_ref());
    context.insert("author", &Profile::from(&author));
    context.insert("page_obj", &page);
    context.insert("post_count", &page.total);
    context.insert("following", &following);
    context.insert("is_self", &is_self);
    Ok(html(render(&tera, "posts/profile.html", &context)?))
}

#[get("/posts/{id}/")]
async fn post_detail(
    user: Option<AuthenticatedUser>,
    tera: web::Data<Tera>,
    posts: web::Data<PostService>,
    path: web::Path<i64>,
) -> Result<HttpResponse, DomainError> {
    let post = posts.get_post(path.into_inner()).await?;
    let post_count = posts.count_by_author(post.author_id).await?;
    let comments = posts.comments(post.id).await?;
    let is_author = user.as_ref().is_some_and(|viewer| viewer.id == post.author_id);

    let mut context = base_context(user.as_ref());
    context.insert("title", &post.short_text());
    context.insert("post", &post);
    context.insert("post_count", &post_count);
    context.insert("comments", &comments);
    context.insert("form", &CommentForm::default());
    context.insert("is_author", &is_author);
    Ok(html(render(&tera, "posts/post_detail.html", &context)?))
}

#[get("/create/")]
async fn post_create_form(
    user: AuthenticatedUser,
    tera: web::Data<Tera>,
    groups: web::Data<GroupService>,
) -> Result<HttpResponse, DomainError> {
    render_post_form(&tera, &groups, &user, PostForm::default(), None).await
}

#[post("/create/")]
async fn post_create(
    req: HttpRequest,
    user: AuthenticatedUser,
    tera: web::Data<Tera>,
    groups: web::Data<GroupService>,
    posts: web::Data<PostService>,
    payload: Multipart,
) -> Result<HttpResponse, DomainError> {
    let (draft, errors) = read_post_form(payload).await?;
    if !errors.is_empty() {
        let form = PostForm::bound(&draft, None, errors);
        return render_post_form(&tera, &groups, &user, form, None).await;
    }

    let form_values = PostForm::bound(&draft, None, FormErrors::new());
    match posts.create_post(user.id, draft).await {
        Ok(post) => {
            info!(
                request_id = %request_id(&req),
                username = %user.username,
                post_id = post.id,
                "post created"
            );
            Ok(redirect(format!("/profile/{}/", user.username)))
        }
        Err(DomainError::Validation(errors)) => {
            let form = PostForm { errors, ..form_values };
            render_post_form(&tera, &groups, &user, form, None).await
        }
        Err(e) => Err(e),
    }
}

#[get("/posts/{id}/edit/")]
async fn post_edit_form(
    user: AuthenticatedUser,
    tera: web::Data<Tera>,
    groups: web::Data<GroupService>,
    posts: web::Data<PostService>,
    path: web::Path<i64>,
) -> Result<HttpResponse, DomainError> {
    let post = posts.get_post(path.into_inner()).await?;
    if post.author_id != user.id {
        return Ok(redirect(format!("/posts/{}/", post.id)));
    }

    let form = PostForm {
        text: post.text.clone(),
        group: post.group_id,
        image: post.image.clone(),
        errors: FormErrors::new(),
    };
    render_post_form(&tera, &groups, &user, form, Some(post.id)).await
}

#[post("/posts/{id}/edit/")]
async fn post_edit(
    req: HttpRequest,
    user: AuthenticatedUser,
    tera: web::Data<Tera>,
    groups: web::Data<GroupService>,
    posts: web::Data<PostService>,
    path: web::Path<i64>,
    payload: Multipart,
) -> Result<HttpResponse, DomainError> {
    let post = posts.get_post(path.into_inner()).await?;
    if post.author_id != user.id {
        return Ok(redirect(format!("/posts/{}/", post.id)));
    }

    let (draft, errors) = read_post_form(payload).await?;
    let form_values = PostForm::bound(&draft, post.image.clone(), FormErrors::new());
    if !errors.is_empty() {
        let form = PostForm { errors, ..form_values };
        return render_post_form(&tera, &groups, &user, form, Some(post.id)).await;
    }

    match posts.update_post(user.id, post.id, draft).await {
        Ok(updated) => {
            info!(
                request_id = %request_id(&req),
                username = %user.username,
                post_id = updated.id,
                "post updated"
            );
            Ok(redirect(format!("/posts/{}/", updated.id)))
        }
        Err(DomainError::Validation(errors)) => {
            let form = PostForm { errors, ..form_values };
            render_post_form(&tera, &groups, &user, form, Some(post.id)).await
        }
        Err(DomainError::Forbidden) => Ok(redirect(format!("/posts/{}/", post.id))),
        Err(e) => Err(e),
    }
}

#[get("/posts/{id}/comment/")]
async fn comment_redirect(
    _user: AuthenticatedUser,
    posts: web::Data<PostService>,
    path: web::Path<i64>,
) -> Result<HttpResponse, DomainError> {
    let post = posts.get_post(path.into_inner()).await?;
    Ok(redirect(format!("/posts/{}/", post.id)))
}

#[post("/posts/{id}/comment/")]
async fn add_comment(
    req: HttpRequest,
    user: AuthenticatedUser,
    posts: web::Data<PostService>,
    path: web::Path<i64>,
    form: web::Form<CommentForm>,
) -> Result<HttpResponse, DomainError> {
    let post_id = path.into_inner();
    match posts.add_comment(user.id, post_id, &form.text).await {
        Ok(comment) => {
            info!(
                request_id = %request_id(&req),
                username = %user.username,
                post_id,
                comment_id = comment.id,
                "comment added"
            );
        }
        // an empty comment is dropped, like an invalid bound form
        Err(DomainError::Validation(_)) => {}
        Err(e) => return Err(e),
    }
    Ok(redirect(format!("/posts/{}/", post_id)))
}

#[get("/follow/")]
async fn follow_index(
    user: AuthenticatedUser,
    tera: web::Data<Tera>,
    posts: web::Data<PostService>,
    query: web::Query<PageQuery>,
) -> Result<HttpResponse, DomainError> {
    let page = posts
        .page(&PostFilter::feed(user.id), query.page.as_deref())
        .await?;

    let mut context = base_context(Some(&user));
    context.insert("page_obj", &page);
    Ok(html(render(&tera, "posts/follow.html", &context)?))
}

async fn render_post_form(
    tera: &Tera,
    groups: &GroupService,
    user: &AuthenticatedUser,
    form: PostForm,
    editing: Option<i64>,
) -> Result<HttpResponse, DomainError> {
    let mut context: Context = base_context(Some(user));
    context.insert("form", &form);
    context.insert("fields", &POST_FORM_FIELDS);
    context.insert("groups", &groups.list(None).await?);
    context.insert("is_edit", &editing.is_some());
    context.insert("post_id", &editing);
    Ok(html(render(tera, "posts/create_post.html", &context)?))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(index)
        .service(group_posts)
        .service(follow_index)
        .service(post_create_form)
        .service(post_create)
        .service(profile)
        .service(post_detail)
        .service(post_edit_form)
        .service(post_edit)
        .service(comment_redirect)
        .service(add_comment);
}
