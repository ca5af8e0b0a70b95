use std::borrow::Cow;

use axum::{
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use hyper::header::CONTENT_TYPE;
use hyper::StatusCode;

#[cfg(debug_assertions)]
async fn index() -> Cow<'static, [u8]> {
    match tokio::fs::read("src/public/index.html").await {
        Ok(content) => Cow::from(content),
        Err(err) => crate::exit_error!("Cannot read index page: {}", err),
    }
}

#[cfg(not(debug_assertions))]
async fn index() -> Cow<'static, [u8]> {
    Cow::from(include_bytes!("public/index.html").as_ref())
}

pub async fn handler() -> Response {
    (
        StatusCode::OK,
        [(CONTENT_TYPE, "text/html; charset=utf-8")],
        index().await,
    )
        .into_response()
}

pub fn router() -> Router {
    Router::new()
        .route("/", get(handler))
        .route("/index.html", get(handler))
}
