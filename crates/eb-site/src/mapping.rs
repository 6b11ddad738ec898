//! URL to filesystem path translation.

use eb_storage::clean_path;

/// Maps URLs under the blog router onto tracked paths under the blog root.
///
/// For any path under the root, `url_to_path(path_to_url(p)) == p`.
#[derive(Debug, Clone)]
pub struct UrlMapper {
    router: String,
    root: String,
}

impl UrlMapper {
    /// `router` is a prefix like `/blog`; `root` a tracked directory path.
    pub fn new(router: impl Into<String>, root: impl Into<String>) -> Self {
        let router = router.into().trim_end_matches('/').to_owned();
        let mut root = root.into();
        if !root.ends_with('/') {
            root.push('/');
        }
        Self { router, root }
    }

    pub fn router(&self) -> &str {
        &self.router
    }

    /// Blog root, with trailing slash.
    pub fn root(&self) -> &str {
        &self.root
    }

    /// Resolve a decoded URL path. Returns `None` when the URL is not under
    /// the router after cleaning, which also rejects `..` escapes.
    pub fn url_to_path(&self, url: &str) -> Option<String> {
        let cleaned = clean_path(url);
        let rest = if cleaned == self.router {
            ""
        } else {
            cleaned.strip_prefix(&self.router)?.strip_prefix('/')?
        };

        let mut path = format!("{}{rest}", self.root);
        if url.ends_with('/') && !path.ends_with('/') {
            path.push('/');
        }
        Some(path)
    }

    /// URL for a tracked path, or `None` if it lies outside the root.
    pub fn path_to_url(&self, path: &str) -> Option<String> {
        if path == self.root || path == self.root.trim_end_matches('/') {
            return Some(format!("{}/", self.router));
        }
        let rest = path.strip_prefix(&self.root)?;
        Some(format!("{}/{rest}", self.router))
    }
}
