use actix_web::body::MessageBody;
use actix_web::dev::ServiceResponse;
use actix_web::http::StatusCode;
use actix_web::http::header::{self, HeaderValue};
use actix_web::middleware::{ErrorHandlerResponse, ErrorHandlers};
use actix_web::{HttpResponse, web};
use tera::{Context, Tera};
use tracing::{error, info};

use crate::domain::error::DomainError;

pub fn load_templates(dir: &str) -> Result<Tera, tera::Error> {
    let glob = format!("{}/**/*.html", dir.trim_end_matches('/'));
    let tera = Tera::new(&glob)?;
    info!(templates = tera.get_template_names().count(), dir, "templates loaded");
    Ok(tera)
}

pub fn render(tera: &Tera, name: &str, context: &Context) -> Result<String, DomainError> {
    tera.render(name, context).map_err(|e| {
        error!(template = name, error = ?e, "failed to render template");
        DomainError::from(e)
    })
}

pub fn html(body: String) -> HttpResponse {
    HttpResponse::Ok()
        .content_type("text/html; charset=utf-8")
        .body(body)
}

/// Replaces bare 403/404/500 responses with the rendered `core/` pages.
pub fn error_pages<B: MessageBody + 'static>() -> ErrorHandlers<B> {
    ErrorHandlers::new()
        .handler(StatusCode::FORBIDDEN, |res| error_page(res, "core/403.html"))
        .handler(StatusCode::NOT_FOUND, |res| error_page(res, "core/404.html"))
        .handler(StatusCode::INTERNAL_SERVER_ERROR, |res| {
            error_page(res, "core/500.html")
        })
}

fn error_page<B: MessageBody + 'static>(
    res: ServiceResponse<B>,
    template: &str,
) -> actix_web::Result<ErrorHandlerResponse<B>> {
    let Some(tera) = res.request().app_data::<web::Data<Tera>>().cloned() else {
        return Ok(ErrorHandlerResponse::Response(res.map_into_left_body()));
    };

    let mut context = Context::new();
    context.insert("path", res.request().path());
    let body = match tera.render(template, &context) {
        Ok(body) => body,
        Err(e) => {
            error!(template, error = ?e, "failed to render error page");
            return Ok(ErrorHandlerResponse::Response(res.map_into_left_body()));
        }
    };

    let (req, mut res) = res.into_parts();
    res.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/html; charset=utf-8"),
    );
    let res = ServiceResponse::new(req, res.set_body(body))
        .map_into_boxed_body()
        .map_into_right_body();
    Ok(ErrorHandlerResponse::Response(res))
}
