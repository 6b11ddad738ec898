//! Router construction.
//!
//! Builds the axum router with all routes and middleware.

use std::sync::Arc;

use axum::Router;
use axum::middleware::from_fn_with_state;
use axum::routing::get;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::middleware::{rate_limit, redirect};
use crate::state::AppState;

/// Create the application router.
///
/// Layers run outermost first: tracing, CORS, root redirect, rate limit.
pub(crate) fn create_router(state: Arc<AppState>) -> Router {
    let blog = state.blog_router.to_string();
    let api = &state.api_router;

    let routes = Router::new()
        .route(&blog, get(handlers::blog::get_blog))
        .route(&format!("{blog}/"), get(handlers::blog::get_blog))
        .route(&format!("{blog}/{{*path}}"), get(handlers::blog::get_blog))
        .route(&format!("{api}/search"), get(handlers::search::search))
        .route(&format!("{api}/searchers"), get(handlers::search::searchers));

    routes
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive())
                .layer(from_fn_with_state(
                    Arc::clone(&state.blog_router),
                    redirect::redirect_root,
                ))
                .layer(from_fn_with_state(
                    Arc::clone(&state.limiter),
                    rate_limit::rate_limit,
                )),
        )
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{Request, StatusCode, header};
    use tower::ServiceExt;

    use super::*;
    use crate::testing::{Blog, blog, build};
    use pretty_assertions::assert_eq;

    async fn get(b: &Blog, uri: &str) -> (StatusCode, String, String) {
        let response = create_router(Arc::clone(&b.state))
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .map(|v| v.to_str().unwrap().to_owned())
            .unwrap_or_default();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, content_type, String::from_utf8_lossy(&bytes).into_owned())
    }

    #[tokio::test]
    async fn test_root_and_favicon_redirect() {
        let b = blog(&[], &[], &[]);
        for (uri, target) in [("/", "/blog/"), ("/favicon.ico", "/blog/favicon.ico")] {
            let response = create_router(Arc::clone(&b.state))
                .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::MOVED_PERMANENTLY);
            assert_eq!(response.headers()[header::LOCATION], target);
        }
    }

    #[tokio::test]
    async fn test_serves_markdown_and_listing() {
        let b = blog(&[("z.md", "zed"), ("a.md", "ay"), ("hide.md", "")], &["hide.md"], &[]);
        let (status, content_type, body) = get(&b, "/blog/a.md").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(content_type, "text/html; charset=utf-8");
        assert_eq!(body, "ay");

        let (status, _, body) = get(&b, "/blog/").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            "<a href=\"/blog/a.md\">a.md</a><br>\n<a href=\"/blog/z.md\">z.md</a><br>\n"
        );
    }

    #[tokio::test]
    async fn test_other_files_keep_type() {
        let b = blog(&[("img/dot.png", "PNG"), ("my notes.txt", "plain")], &[], &[]);
        let (status, content_type, body) = get(&b, "/blog/img/dot.png").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(content_type, "image/png");
        assert_eq!(body, "PNG");

        let (status, _, body) = get(&b, "/blog/my%20notes.txt").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "plain");
    }

    #[tokio::test]
    async fn test_private_is_indistinguishable_from_missing() {
        let b = blog(&[("secret.md", "x")], &[], &["secret.md"]);
        let private = get(&b, "/blog/secret.md").await;
        let missing = get(&b, "/blog/missing.md").await;
        assert_eq!(private.0, StatusCode::NOT_FOUND);
        assert_eq!(private, missing);
        assert_eq!(b.loads(), 1);
    }

    #[tokio::test]
    async fn test_search_validation() {
        let b = blog(&[("a.md", "")], &[], &[]);
        let cases = [
            ("/api/search", "keyword is empty"),
            ("/api/search?keyword=", "keyword is empty"),
            ("/api/search?keyword=a&num=x", "num must be int"),
            ("/api/search?keyword=a&searchType=nope", "search type not found"),
        ];
        for (uri, message) in cases {
            let (status, _, body) = get(&b, uri).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
            let json: serde_json::Value = serde_json::from_str(&body).unwrap();
            assert_eq!(json["error"], message);
        }
    }

    #[tokio::test]
    async fn test_search_returns_urls_and_caches() {
        let b = blog(&[("rust.md", ""), ("go.md", ""), ("secret.md", "")], &[], &["secret.md"]);
        let (status, _, body) = get(&b, "/api/search?keyword=rust&num=2").await;
        assert_eq!(status, StatusCode::OK);
        let urls: Vec<String> = serde_json::from_str(&body).unwrap();
        assert_eq!(urls, vec!["/blog/rust.md", "/blog/go.md"]);
        assert!(b.state.search_cache.contains("search:title:2:rust"));

        let (_, _, body) = get(&b, "/api/search?keyword=secret&searchType=title").await;
        let urls: Vec<String> = serde_json::from_str(&body).unwrap();
        assert!(!urls.contains(&"/blog/secret.md".to_owned()));
    }

    #[tokio::test]
    async fn test_searchers_listing() {
        let b = blog(&[], &[], &[]);
        let (status, _, body) = get(&b, "/api/searchers").await;
        assert_eq!(status, StatusCode::OK);
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        let types: Vec<&str> = json
            .as_array()
            .unwrap()
            .iter()
            .map(|entry| entry["type"].as_str().unwrap())
            .collect();
        assert_eq!(types, vec!["content", "fulltext", "keyword", "title"]);
    }

    #[tokio::test]
    async fn test_rate_limit_per_path() {
        let per_second = 3;
        let b = build(&[("a.md", "")], &[], &[], |config| config.rate_limit.per_second = per_second);
        for _ in 0..per_second {
            assert_eq!(get(&b, "/blog/a.md").await.0, StatusCode::OK);
        }
        let (status, _, body) = get(&b, "/blog/a.md").await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert!(body.contains("too many requests"));
        assert_eq!(get(&b, "/api/searchers").await.0, StatusCode::OK);
    }
}
