//! Redirect the site root and favicon into the blog router.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::{StatusCode, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

/// Redirect `/` to `{router}/` and `/favicon.ico` to `{router}/favicon.ico`.
pub(crate) async fn redirect_root(State(router): State<Arc<str>>, request: Request, next: Next) -> Response {
    let path = request.uri().path();
    if path == "/" || path == "/favicon.ico" {
        let target = format!("{router}{path}");
        tracing::debug!(from = path, to = %target, "Redirecting");
        return (StatusCode::MOVED_PERMANENTLY, [(header::LOCATION, target)]).into_response();
    }
    next.run(request).await
}
