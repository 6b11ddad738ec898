//! Per-request content pipeline for the blog route.
//!
//! Stages run in a fixed order and the first one to answer wins:
//!
//! 1. resolve the URL to a tracked path (404 if outside the root)
//! 2. private check (404, before anything is read)
//! 3. invalidation: a changed path drops its cache entry
//! 4. cache lookup
//! 5. load and render, then fill the cache unless the path changed during
//!    the load
//! 6. static export of the freshly loaded item, when enabled

use std::sync::Arc;

use eb_cache::ContentCache;
use eb_site::{BlogItem, ContentLoader, UrlMapper, cache_key};
use eb_storage::{ChangeTracker, IgnoreSet, is_dir_path};

use crate::error::ApiError;
use crate::export::{ExportError, Exporter};

const HTML: &str = "text/html; charset=utf-8";

pub(crate) struct BlogPipeline {
    pub(crate) mapper: UrlMapper,
    pub(crate) ignore: Arc<IgnoreSet>,
    pub(crate) loader: Arc<dyn ContentLoader>,
    pub(crate) cache: Arc<ContentCache<Arc<BlogItem>>>,
    pub(crate) tracker: Arc<ChangeTracker>,
    pub(crate) exporter: Option<Exporter>,
}

impl BlogPipeline {
    /// Serve the item for a decoded request path.
    pub(crate) async fn handle(&self, url: &str) -> Result<Arc<BlogItem>, ApiError> {
        let mut path = self.mapper.url_to_path(url).ok_or(ApiError::NotFound)?;
        if !is_dir_path(&path) && tokio::fs::metadata(&path).await.is_ok_and(|m| m.is_dir()) {
            path.push('/');
        }

        if self.ignore.is_private(&path) {
            tracing::debug!(path = %path, "Private path requested");
            return Err(ApiError::NotFound);
        }

        let url = self.mapper.path_to_url(&path).ok_or(ApiError::NotFound)?;
        let key = cache_key(&url);
        let generation = self.tracker.generation(&path);
        if self.tracker.take_changed(&path) && self.cache.remove(&key) {
            tracing::debug!(url = %url, "Dropped stale cache entry");
        }

        if let Some(item) = self.cache.get(&key) {
            tracing::debug!(url = %url, "Cache hit");
            return Ok(item);
        }

        let loader = Arc::clone(&self.loader);
        let load_path = path.clone();
        let loaded = tokio::task::spawn_blocking(move || loader.load(&load_path))
            .await
            .map_err(|e| ApiError::Internal(format!("loader task failed: {e}")))?;
        let item = match loaded {
            Ok(item) => Arc::new(item),
            Err(e) if e.is_not_found() => return Err(ApiError::NotFound),
            Err(e) => {
                tracing::error!(path = %path, error = %e, "Failed to load blog item");
                return Err(ApiError::Internal("failed to load content".to_owned()));
            }
        };
        tracing::debug!(url = %url, kind = ?item.kind, "Loaded");
        if self.tracker.generation(&path) == generation {
            self.cache.set(key, Arc::clone(&item));
        } else {
            // A newer version may already be cached; this load could be older
            tracing::debug!(url = %url, "Changed while loading, not caching");
        }

        if let Some(exporter) = &self.exporter
            && exporter.export(&item).is_none()
        {
            return Err(ApiError::Internal("static export failed".to_owned()));
        }
        Ok(item)
    }

    pub(crate) fn take_export_failure(&self) -> Option<ExportError> {
        self.exporter.as_ref().and_then(Exporter::take_failure)
    }
}

/// Content type of a served item: HTML for rendered items, otherwise
/// guessed from the extension with HTML as the fallback.
pub(crate) fn content_type(item: &BlogItem) -> String {
    if item.kind.is_rendered() {
        return HTML.to_owned();
    }
    mime_guess::from_path(&item.path)
        .first()
        .map_or_else(|| HTML.to_owned(), |mime| mime.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Blog, blog, build};
    use eb_site::{ItemKind, LoadError, Meta};
    use pretty_assertions::assert_eq;

    fn item(path: &str, kind: ItemKind) -> BlogItem {
        BlogItem::source(path.to_owned(), String::new(), Meta::default(), kind, Vec::new())
    }

    #[test]
    fn test_content_type() {
        assert_eq!(content_type(&item("/b/a.md", ItemKind::Markdown)), HTML);
        assert_eq!(content_type(&item("/b/x.png", ItemKind::Other)), "image/png");
        assert_eq!(content_type(&item("/b/x.jpeg", ItemKind::Other)), "image/jpeg");
        assert_eq!(content_type(&item("/b/x.svg", ItemKind::Other)), "image/svg+xml");
        assert_eq!(content_type(&item("/b/LICENSE", ItemKind::Other)), HTML);
    }

    async fn served(b: &Blog, url: &str) -> String {
        let item = b.state.pipeline.handle(url).await.unwrap();
        String::from_utf8_lossy(item.rendered()).into_owned()
    }

    #[tokio::test]
    async fn test_cache_until_changed() {
        let b = blog(&[("a.md", "first")], &[], &[]);
        assert_eq!(served(&b, "/blog/a.md").await, "first");

        b.write("a.md", "second");
        assert_eq!(served(&b, "/blog/a.md").await, "first");
        assert_eq!(b.loads(), 1);

        b.state.pipeline.tracker.set_changed(&b.path("a.md"), true);
        assert_eq!(served(&b, "/blog/a.md").await, "second");
        assert_eq!(b.loads(), 2);
        assert!(!b.state.pipeline.tracker.changed(&b.path("a.md")));
    }

    /// Delivers a change notification for the path while it is being loaded.
    struct ChangingLoader {
        inner: Arc<dyn ContentLoader>,
        tracker: Arc<ChangeTracker>,
    }

    impl ContentLoader for ChangingLoader {
        fn load(&self, path: &str) -> Result<BlogItem, LoadError> {
            let item = self.inner.load(path);
            self.tracker.set_changed(path, true);
            item
        }

        fn read_source(&self, path: &str) -> Result<BlogItem, LoadError> {
            self.inner.read_source(path)
        }
    }

    #[tokio::test]
    async fn test_change_during_load_is_not_cached() {
        let b = blog(&[("a.md", "old")], &[], &[]);
        let shared = &b.state.pipeline;
        let racing = BlogPipeline {
            mapper: shared.mapper.clone(),
            ignore: Arc::clone(&shared.ignore),
            loader: Arc::new(ChangingLoader {
                inner: Arc::clone(&shared.loader),
                tracker: Arc::clone(&shared.tracker),
            }),
            cache: Arc::clone(&shared.cache),
            tracker: Arc::clone(&shared.tracker),
            exporter: None,
        };
        let key = cache_key("/blog/a.md");

        let item = racing.handle("/blog/a.md").await.unwrap();
        assert_eq!(item.rendered(), b"old");
        assert!(!shared.cache.contains(&key));
        assert!(shared.tracker.changed(&b.path("a.md")));

        b.write("a.md", "new");
        assert_eq!(served(&b, "/blog/a.md").await, "new");
        assert!(shared.cache.contains(&key));
        assert_eq!(served(&b, "/blog/a.md").await, "new");
    }

    #[tokio::test]
    async fn test_private_never_loaded() {
        let b = blog(&[("secret/a.md", "x"), ("p.md", "x")], &[], &["secret/", "p.md"]);
        for url in ["/blog/secret/a.md", "/blog/secret/", "/blog/secret", "/blog/p.md"] {
            assert!(matches!(b.state.pipeline.handle(url).await, Err(ApiError::NotFound)), "{url}");
        }
        assert_eq!(b.loads(), 0);
    }

    #[tokio::test]
    async fn test_directory_without_slash_shares_cache_entry() {
        let b = blog(&[("notes/a.md", "")], &[], &[]);
        let first = b.state.pipeline.handle("/blog/notes").await.unwrap();
        let second = b.state.pipeline.handle("/blog/notes/").await.unwrap();
        assert_eq!(first.url, "/blog/notes/");
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(b.loads(), 1);
    }

    #[tokio::test]
    async fn test_missing_and_escaping_paths() {
        let b = blog(&[], &[], &[]);
        assert!(matches!(b.state.pipeline.handle("/blog/nope.md").await, Err(ApiError::NotFound)));
        assert!(matches!(b.state.pipeline.handle("/blog/../etc/passwd").await, Err(ApiError::NotFound)));
        assert!(matches!(b.state.pipeline.handle("/other/a.md").await, Err(ApiError::NotFound)));
    }

    #[tokio::test]
    async fn test_export_only_on_fresh_load() {
        let out = tempfile::tempdir().unwrap();
        let b = build(&[("a.md", "body")], &[], &[], |config| {
            config.export_resolved.enabled = true;
            config.export_resolved.root = out.path().to_path_buf();
        });
        served(&b, "/blog/a.md").await;
        let exported = out.path().join("a.html");
        assert_eq!(std::fs::read_to_string(&exported).unwrap(), "body");

        std::fs::remove_file(&exported).unwrap();
        served(&b, "/blog/a.md").await;
        assert!(!exported.exists());
    }

    #[tokio::test]
    async fn test_export_failure_requests_shutdown() {
        let out = tempfile::NamedTempFile::new().unwrap();
        let b = build(&[("a.md", "body")], &[], &[], |config| {
            config.export_resolved.enabled = true;
            config.export_resolved.root = out.path().to_path_buf();
        });
        let result = b.state.pipeline.handle("/blog/a.md").await;
        assert!(matches!(result, Err(ApiError::Internal(_))));
        assert!(b.token.is_cancelled());
        assert!(b.state.pipeline.take_export_failure().is_some());
    }
}
