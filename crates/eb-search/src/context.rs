//! State shared by the content-reading strategies.

use std::sync::Arc;

use rayon::prelude::*;

use eb_cache::ContentCache;
use eb_site::{BlogItem, ContentLoader, ItemKind, LoadError, UrlMapper, cache_key};
use eb_storage::{ChangeTracker, Crawler, IgnoreSet};

/// Everything a strategy needs to enumerate and read the blog.
pub struct SearchContext {
    pub crawler: Arc<dyn Crawler>,
    pub ignore: Arc<IgnoreSet>,
    pub loader: Arc<dyn ContentLoader>,
    /// Rendered items cached by the request pipeline.
    pub cache: Arc<ContentCache<Arc<BlogItem>>>,
    pub tracker: Arc<ChangeTracker>,
    pub mapper: UrlMapper,
}

impl SearchContext {
    /// Known paths that are neither hidden nor private.
    pub fn visible_paths(&self) -> Vec<String> {
        self.crawler
            .paths()
            .into_iter()
            .filter(|path| self.ignore.is_visible(path))
            .collect()
    }

    /// Item for `path`, from the content cache unless the path changed since.
    ///
    /// Never writes to the cache: the pipeline only caches rendered items.
    pub fn item(&self, path: &str) -> Result<Arc<BlogItem>, LoadError> {
        if !self.tracker.changed(path)
            && let Some(url) = self.mapper.path_to_url(path)
            && let Some(item) = self.cache.get(&cache_key(&url))
        {
            return Ok(item);
        }
        self.loader.read_source(path).map(Arc::new)
    }

    /// Load every visible text file in parallel, skipping failures.
    ///
    /// Directories and files that are not valid UTF-8 are left out.
    pub fn file_items(&self) -> Vec<Arc<BlogItem>> {
        self.visible_paths()
            .par_iter()
            .filter(|path| !eb_storage::is_dir_path(path))
            .filter_map(|path| match self.item(path) {
                Ok(item) if is_searchable(&item) => Some(item),
                Ok(_) => None,
                Err(e) => {
                    tracing::debug!(path = %path, error = %e, "Skipping unreadable path");
                    None
                }
            })
            .collect()
    }
}

/// Whether an item carries text the content strategies can read.
pub(crate) fn is_searchable(item: &BlogItem) -> bool {
    match item.kind {
        ItemKind::Markdown => true,
        ItemKind::Other => std::str::from_utf8(&item.raw).is_ok(),
        ItemKind::Dir => false,
    }
}
