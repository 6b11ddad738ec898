//! HTTP server for easyblog.
//!
//! Serves the blog tree under the blog router and the search API under the
//! API router:
//!
//! - `GET {blog}/*path` renders Markdown, lists directories and passes other
//!   files through with their guessed content type
//! - `GET {api}/search?keyword=..&num=..&searchType=..` returns blog URLs
//! - `GET {api}/searchers` lists the registered strategies
//!
//! # Architecture
//!
//! ```text
//! notify ──► FsCrawler ──broadcast──┬─► ChangeTracker   (stale content flags)
//!                                   ├─► FullTextSearcher (index updates)
//!                                   └─► purge task      (search cache)
//!
//! Browser ──HTTP──► axum router ──► rate limit ──► BlogPipeline ──► BlogLoader
//!                                             └──► SearcherRegistry
//! ```
//!
//! # Quick Start
//!
//! ```ignore
//! use eb_config::Config;
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = Config::load(None, None).unwrap();
//!     eb_server::run_server(&config).await.unwrap();
//! }
//! ```

mod app;
mod error;
mod export;
mod handlers;
mod middleware;
mod pipeline;
mod purge;
mod state;

use std::net::SocketAddr;
use std::sync::Arc;

use eb_cache::ContentCache;
use eb_config::Config;
use eb_search::{FullTextSearcher, SearchContext, SearcherRegistry};
use eb_site::{BlogLoader, CommandRenderer, UrlMapper};
use eb_storage::{ChangeTracker, Crawler, FsCrawler, IgnoreSet};
use tokio_util::sync::CancellationToken;

pub use error::ServerError;
pub use export::{ExportError, ExportSummary};

use export::Exporter;
use pipeline::BlogPipeline;
use state::AppState;

/// Run the server until Ctrl+C or a static export failure.
///
/// # Errors
///
/// Returns an error if the blog root cannot be crawled, a pattern, render
/// command or plugin is invalid, the listener cannot be bound, or a static
/// export write failed while serving.
pub async fn run_server(config: &Config) -> Result<(), ServerError> {
    let blog = &config.blog_resolved;

    let crawler = Arc::new(FsCrawler::new(&blog.root)?);
    let root = crawler.root().to_owned();
    let (ignore, mapper, loader) = blog_loader(config, &root)?;
    let tracker = Arc::new(ChangeTracker::new());
    let token = CancellationToken::new();

    // Subscribe before watching so no event is missed
    let tracker_events = crawler.subscribe();
    let index_events = crawler.subscribe();
    let purge_events = crawler.subscribe();
    let watch = crawler.watch()?;

    let ctx = Arc::new(SearchContext {
        crawler: Arc::clone(&crawler) as Arc<dyn Crawler>,
        ignore,
        loader,
        cache: Arc::new(ContentCache::new(blog.cache_capacity)),
        tracker: Arc::clone(&tracker),
        mapper,
    });
    let fulltext = Arc::new(FullTextSearcher::open(&blog.index_dir())?);
    let registry = SearcherRegistry::with_defaults(&ctx, Arc::clone(&fulltext), &config.search.plugins)?;

    let exporter = config.export_resolved.enabled.then(|| {
        tracing::info!(root = %config.export_resolved.root.display(), "Static export enabled");
        Exporter::new(&config.export_resolved.root, &config.routes.blog, token.clone())
    });
    let state = Arc::new(AppState::new(&ctx, registry, exporter, config));

    let tasks = [
        tracker.spawn_listener(tracker_events, token.clone()),
        fulltext.spawn_indexer(Arc::clone(&ctx), index_events, token.clone()),
        purge::spawn_purger(
            Arc::clone(&state.search_cache),
            Arc::clone(&ctx.cache),
            purge_events,
            token.clone(),
        ),
    ];

    let app = app::create_router(Arc::clone(&state));
    let listener = tokio::net::TcpListener::bind((config.server.host.as_str(), config.server.port)).await?;
    tracing::info!(address = %listener.local_addr()?, root = %root, "Starting server");

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal(token.clone()))
        .await?;

    token.cancel();
    watch.stop();
    for task in tasks {
        if let Err(e) = task.await {
            tracing::warn!(error = %e, "Background task failed");
        }
    }

    match state.pipeline.take_export_failure() {
        Some(e) => Err(e.into()),
        None => Ok(()),
    }
}

/// Render every item under the blog root into the export root, then return.
///
/// Uses the same pipeline as the server with export forced on, starting
/// from the root listing. Private paths are not exported.
///
/// # Errors
///
/// Returns an error if the blog root cannot be crawled, a pattern or render
/// command is invalid, or an export write fails.
pub async fn export_site(config: &Config) -> Result<ExportSummary, ServerError> {
    let crawler = FsCrawler::new(&config.blog_resolved.root)?;
    let root = crawler.root().to_owned();
    let (ignore, mapper, loader) = blog_loader(config, &root)?;
    let export_root = &config.export_resolved.root;
    let pipeline = BlogPipeline {
        mapper,
        ignore,
        loader,
        cache: Arc::new(ContentCache::new(config.blog_resolved.cache_capacity)),
        tracker: Arc::new(ChangeTracker::new()),
        exporter: Some(Exporter::new(export_root, &config.routes.blog, CancellationToken::new())),
    };

    let mut paths = vec![root.clone()];
    paths.extend(crawler.paths().into_iter().filter(|path| *path != root));
    tracing::info!(root = %root, export_root = %export_root.display(), count = paths.len(), "Exporting blog");
    let summary = export::export_all(&pipeline, &paths).await?;
    tracing::info!(exported = summary.exported, skipped = summary.skipped, "Export finished");
    Ok(summary)
}

/// Ignore set, URL mapper and loader for the blog rooted at `root`.
fn blog_loader(
    config: &Config,
    root: &str,
) -> Result<(Arc<IgnoreSet>, UrlMapper, Arc<BlogLoader>), ServerError> {
    let blog = &config.blog_resolved;
    let ignore = Arc::new(IgnoreSet::new(root, &blog.hide, &blog.private)?);
    let mapper = UrlMapper::new(config.routes.blog.as_str(), root);
    let renderer = Arc::new(match &blog.render_command {
        Some(line) => CommandRenderer::from_command_line(line, &blog.template)?,
        None => CommandRenderer::pandoc(&blog.template),
    });
    let loader = Arc::new(BlogLoader::new(mapper.clone(), Arc::clone(&ignore), renderer));
    Ok((ignore, mapper, loader))
}

/// Wait for Ctrl+C or an internal shutdown request.
async fn shutdown_signal(token: CancellationToken) {
    tokio::select! {
        () = token.cancelled() => {
            tracing::warn!("Shutdown requested, stopping server...");
        }
        result = tokio::signal::ctrl_c() => {
            result.expect("Failed to install Ctrl+C handler");
            tracing::info!("Shutdown signal received, stopping server...");
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::path::Path;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use eb_cache::ContentCache;
    use eb_config::Config;
    use eb_search::{FullTextSearcher, SearchContext, SearcherRegistry};
    use eb_site::{BlogItem, BlogLoader, CommandRenderer, ContentLoader, LoadError, UrlMapper};
    use eb_storage::{ChangeTracker, Crawler, IgnoreSet, MockCrawler, tracked_path};
    use tokio_util::sync::CancellationToken;

    use crate::export::Exporter;
    use crate::state::AppState;

    /// Loader that counts rendering loads.
    pub struct CountingLoader {
        inner: BlogLoader,
        loads: AtomicUsize,
    }

    impl ContentLoader for CountingLoader {
        fn load(&self, path: &str) -> Result<BlogItem, LoadError> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            self.inner.load(path)
        }

        fn read_source(&self, path: &str) -> Result<BlogItem, LoadError> {
            self.inner.read_source(path)
        }
    }

    /// Blog tree on disk served by a fully wired [`AppState`].
    pub struct Blog {
        pub _dir: tempfile::TempDir,
        pub root: String,
        pub crawler: Arc<MockCrawler>,
        pub loader: Arc<CountingLoader>,
        pub state: Arc<AppState>,
        pub token: CancellationToken,
    }

    impl Blog {
        pub fn path(&self, rel: &str) -> String {
            format!("{}{rel}", self.root)
        }

        pub fn write(&self, rel: &str, content: &str) {
            let path = Path::new(&self.root).join(rel);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(path, content).unwrap();
        }

        /// Number of rendering loads so far.
        pub fn loads(&self) -> usize {
            self.loader.loads.load(Ordering::SeqCst)
        }
    }

    pub fn blog(files: &[(&str, &str)], hide: &[&str], private: &[&str]) -> Blog {
        build(files, hide, private, |_| {})
    }

    /// Build a blog from `(relative path, content)` pairs with `cat` as the
    /// renderer and rate limits high enough to stay out of the way.
    pub fn build(
        files: &[(&str, &str)],
        hide: &[&str],
        private: &[&str],
        configure: impl FnOnce(&mut Config),
    ) -> Blog {
        let dir = tempfile::tempdir().unwrap();
        let root = tracked_path(&dir.path().canonicalize().unwrap(), true);
        let mut crawler = MockCrawler::new(root.clone());
        for (rel, content) in files {
            let path = Path::new(&root).join(rel);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(&path, content).unwrap();
            crawler = crawler.with_path(format!("{root}{rel}"));
        }
        let crawler = Arc::new(crawler);

        let mut config = Config::default();
        config.rate_limit.per_second = 10_000;
        config.rate_limit.per_minute = 10_000;
        config.rate_limit.per_hour = 10_000;
        configure(&mut config);

        let ignore = Arc::new(IgnoreSet::new(&root, hide, private).unwrap());
        let mapper = UrlMapper::new(config.routes.blog.as_str(), root.as_str());
        let renderer = Arc::new(CommandRenderer::from_command_line("cat", "t.html").unwrap());
        let loader = Arc::new(CountingLoader {
            inner: BlogLoader::new(mapper.clone(), Arc::clone(&ignore), renderer),
            loads: AtomicUsize::new(0),
        });
        let ctx = Arc::new(SearchContext {
            crawler: Arc::clone(&crawler) as Arc<dyn Crawler>,
            ignore,
            loader: Arc::clone(&loader) as Arc<dyn ContentLoader>,
            cache: Arc::new(ContentCache::new(100)),
            tracker: Arc::new(ChangeTracker::new()),
            mapper,
        });
        let fulltext = Arc::new(FullTextSearcher::in_memory().unwrap());
        let registry = SearcherRegistry::with_defaults(&ctx, fulltext, &config.search.plugins).unwrap();

        let token = CancellationToken::new();
        let exporter = config
            .export_resolved
            .enabled
            .then(|| Exporter::new(&config.export_resolved.root, &config.routes.blog, token.clone()));
        let state = Arc::new(AppState::new(&ctx, registry, exporter, &config));
        Blog {
            _dir: dir,
            root,
            crawler,
            loader,
            state,
            token,
        }
    }
}
