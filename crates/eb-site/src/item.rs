//! Content records.

use serde::{Deserialize, Serialize};

/// Content cache key for the item served at `url`.
pub fn cache_key(url: &str) -> String {
    format!("blog:{url}")
}

/// Front-matter metadata of a blog item.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Meta {
    pub title: String,
    pub keywords: Vec<String>,
    pub description: String,
}

/// What a tracked path turned out to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemKind {
    /// Directory, served as a rendered link listing.
    Dir,
    /// Markdown source, served rendered.
    Markdown,
    /// Anything else, served verbatim.
    Other,
}

impl ItemKind {
    /// Whether items of this kind go through the renderer.
    pub fn is_rendered(self) -> bool {
        matches!(self, Self::Dir | Self::Markdown)
    }
}

/// One loaded path. Immutable once built; a reload produces a new item.
#[derive(Debug, Clone)]
pub struct BlogItem {
    /// Tracked path.
    pub path: String,
    /// URL under the blog router.
    pub url: String,
    pub meta: Meta,
    pub kind: ItemKind,
    /// File bytes, or the generated listing for directories.
    pub raw: Vec<u8>,
    html: Option<String>,
}

impl BlogItem {
    /// Build an item that has not been rendered.
    pub fn source(path: String, url: String, meta: Meta, kind: ItemKind, raw: Vec<u8>) -> Self {
        Self {
            path,
            url,
            meta,
            kind,
            raw,
            html: None,
        }
    }

    /// Attach renderer output. Ignored for [`ItemKind::Other`].
    #[must_use]
    pub fn with_html(mut self, html: String) -> Self {
        if self.kind.is_rendered() {
            self.html = Some(html);
        }
        self
    }

    /// Bytes to serve: rendered HTML, or the raw file for [`ItemKind::Other`]
    /// and items that were only read for their source.
    pub fn rendered(&self) -> &[u8] {
        self.html.as_deref().map_or(self.raw.as_slice(), str::as_bytes)
    }

    /// Whether renderer output is attached.
    pub fn is_rendered(&self) -> bool {
        self.html.is_some()
    }

    /// Source text, lossily decoded.
    pub fn text(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.raw)
    }
}
