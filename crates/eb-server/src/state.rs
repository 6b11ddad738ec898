//! Application state.
//!
//! Shared state for all request handlers.

use std::sync::Arc;

use eb_cache::ContentCache;
use eb_config::Config;
use eb_search::{SearchContext, SearcherRegistry};

use crate::export::Exporter;
use crate::middleware::rate_limit::RateLimiter;
use crate::pipeline::BlogPipeline;

/// Application state shared across all handlers.
pub(crate) struct AppState {
    /// Content pipeline behind the blog route.
    pub(crate) pipeline: BlogPipeline,
    /// Search strategies by `searchType`.
    pub(crate) registry: SearcherRegistry,
    /// Search results keyed by type, cap and keyword. Purged on any change.
    pub(crate) search_cache: Arc<ContentCache<Vec<String>>>,
    pub(crate) default_num: usize,
    pub(crate) blog_router: Arc<str>,
    pub(crate) api_router: String,
    pub(crate) limiter: Arc<RateLimiter>,
}

impl AppState {
    pub(crate) fn new(
        ctx: &SearchContext,
        registry: SearcherRegistry,
        exporter: Option<Exporter>,
        config: &Config,
    ) -> Self {
        Self {
            pipeline: BlogPipeline {
                mapper: ctx.mapper.clone(),
                ignore: Arc::clone(&ctx.ignore),
                loader: Arc::clone(&ctx.loader),
                cache: Arc::clone(&ctx.cache),
                tracker: Arc::clone(&ctx.tracker),
                exporter,
            },
            registry,
            search_cache: Arc::new(ContentCache::new(config.blog_resolved.cache_capacity)),
            default_num: config.search.default_num,
            blog_router: Arc::from(config.routes.blog.as_str()),
            api_router: config.routes.api.clone(),
            limiter: Arc::new(RateLimiter::new(&config.rate_limit)),
        }
    }
}
