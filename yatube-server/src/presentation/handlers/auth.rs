use actix_web::{HttpRequest, HttpResponse, Scope, get, post, route, web};
use tera::Tera;
use tracing::{info, warn};

use crate::application::auth_service::{AuthService, Registration};
use crate::domain::error::DomainError;
use crate::domain::validation::{FormErrors, NON_FIELD};
use crate::infrastructure::templates::{html, render};
use crate::presentation::forms::{LoginForm, LoginQuery, SignupForm};
use crate::presentation::utils::{
    AuthenticatedUser, SessionCookie, base_context, request_id, safe_next,
};

const INVALID_LOGIN: &str = "Please enter a correct username and password.";

pub fn scope() -> Scope {
    web::scope("/auth")
        .service(signup_form)
        .service(signup)
        .service(login_form)
        .service(login)
        .service(logout)
}

#[get("/signup/")]
async fn signup_form(
    user: Option<AuthenticatedUser>,
    tera: web::Data<Tera>,
) -> Result<HttpResponse, DomainError> {
    render_signup(&tera, user.as_ref(), &SignupForm::default(), &FormErrors::new())
}

#[post("/signup/")]
async fn signup(
    req: HttpRequest,
    user: Option<AuthenticatedUser>,
    tera: web::Data<Tera>,
    auth: web::Data<AuthService>,
    session: web::Data<SessionCookie>,
    form: web::Form<SignupForm>,
) -> Result<HttpResponse, DomainError> {
    let form = form.into_inner();
    let registration = Registration::from(&form);

    let created = match auth.register(registration).await {
        Ok(created) => created,
        Err(DomainError::Validation(errors)) => {
            return render_signup(&tera, user.as_ref(), &form, &errors);
        }
        Err(e) => return Err(e),
    };
    let token = auth.issue_token(&created)?;

    info!(
        request_id = %request_id(&req),
        user_id = %created.id,
        username = %created.username,
        "user signed up"
    );

    Ok(HttpResponse::Found()
        .insert_header(("Location", "/"))
        .cookie(session.issue(token, auth.keys().ttl()))
        .finish())
}

#[get("/login/")]
async fn login_form(
    user: Option<AuthenticatedUser>,
    tera: web::Data<Tera>,
    query: web::Query<LoginQuery>,
) -> Result<HttpResponse, DomainError> {
    render_login(&tera, user.as_ref(), "", query.next.as_deref(), &FormErrors::new())
}

#[post("/login/")]
async fn login(
    req: HttpRequest,
    user: Option<AuthenticatedUser>,
    tera: web::Data<Tera>,
    auth: web::Data<AuthService>,
    session: web::Data<SessionCookie>,
    query: web::Query<LoginQuery>,
    form: web::Form<LoginForm>,
) -> Result<HttpResponse, DomainError> {
    let next = form.next.as_deref().or(query.next.as_deref());

    match auth.login(&form.username, &form.password).await {
        Ok((logged_in, token)) => {
            info!(
                request_id = %request_id(&req),
                username = %logged_in.username,
                "user logged in"
            );
            Ok(HttpResponse::Found()
                .insert_header(("Location", safe_next(next)))
                .cookie(session.issue(token, auth.keys().ttl()))
                .finish())
        }
        Err(DomainError::Unauthorized) => {
            warn!(
                request_id = %request_id(&req),
                username = %form.username,
                "failed login attempt"
            );
            let errors = FormErrors::single(NON_FIELD, INVALID_LOGIN);
            render_login(&tera, user.as_ref(), &form.username, next, &errors)
        }
        Err(e) => Err(e),
    }
}

#[route("/logout/", method = "GET", method = "POST")]
async fn logout(
    req: HttpRequest,
    user: Option<AuthenticatedUser>,
    tera: web::Data<Tera>,
    session: web::Data<SessionCookie>,
) -> Result<HttpResponse, DomainError> {
    if let Some(user) = &user {
        info!(request_id = %request_id(&req), username = %user.username, "user logged out");
    }

    let body = render(&tera, "users/logged_out.html", &base_context(None))?;
    let mut response = html(body);
    response
        .add_cookie(&session.removal())
        .map_err(|e| DomainError::Internal(e.to_string()))?;
    Ok(response)
}

fn render_signup(
    tera: &Tera,
    user: Option<&AuthenticatedUser>,
    form: &SignupForm,
    errors: &FormErrors,
) -> Result<HttpResponse, DomainError> {
    let mut context = base_context(user);
    context.insert("form", form);
    context.insert("errors", errors);
    Ok(html(render(tera, "users/signup.html", &context)?))
}

fn render_login(
    tera: &Tera,
    user: Option<&AuthenticatedUser>,
    username: &str,
    next: Option<&str>,
    errors: &FormErrors,
) -> Result<HttpResponse, DomainError> {
    let mut context = base_context(user);
    context.insert("username", username);
    context.insert("next", &next);
    context.insert("errors", errors);
    Ok(html(render(tera, "users/login.html", &context)?))
}
