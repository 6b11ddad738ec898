//! Path to [`BlogItem`] loading.

use std::path::Path;
use std::sync::Arc;

use eb_storage::{IgnoreSet, clean_path, stem};

use crate::front_matter::{MetadataError, parse_front_matter};
use crate::item::{BlogItem, ItemKind, Meta};
use crate::listing::render_listing;
use crate::mapping::UrlMapper;
use crate::renderer::{RenderError, Renderer};

/// Error loading a blog item.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    /// Path does not exist or lies outside the blog root.
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Metadata(#[from] MetadataError),
    #[error(transparent)]
    Render(#[from] RenderError),
}

impl LoadError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// Source of blog items.
///
/// [`BlogLoader`] is the production implementation; tests substitute their own.
pub trait ContentLoader: Send + Sync {
    /// Load and render the item at a tracked path.
    fn load(&self, path: &str) -> Result<BlogItem, LoadError>;

    /// Load the item without rendering. Front matter is still parsed.
    fn read_source(&self, path: &str) -> Result<BlogItem, LoadError>;
}

/// Loads items from the filesystem and renders them with a [`Renderer`].
pub struct BlogLoader {
    mapper: UrlMapper,
    ignore: Arc<IgnoreSet>,
    renderer: Arc<dyn Renderer>,
}

impl BlogLoader {
    pub fn new(mapper: UrlMapper, ignore: Arc<IgnoreSet>, renderer: Arc<dyn Renderer>) -> Self {
        Self {
            mapper,
            ignore,
            renderer,
        }
    }

    pub fn mapper(&self) -> &UrlMapper {
        &self.mapper
    }

    pub fn ignore(&self) -> &IgnoreSet {
        &self.ignore
    }

    fn io_error(path: &str, source: std::io::Error) -> LoadError {
        if matches!(
            source.kind(),
            std::io::ErrorKind::NotFound | std::io::ErrorKind::NotADirectory
        ) {
            LoadError::NotFound(path.to_owned())
        } else {
            LoadError::Io {
                path: path.to_owned(),
                source,
            }
        }
    }
}

/// Markdown by extension, case-insensitively.
fn is_markdown(path: &str) -> bool {
    let ext = Path::new(path)
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase());
    matches!(ext.as_deref(), Some("md" | "markdown"))
}

impl ContentLoader for BlogLoader {
    fn read_source(&self, path: &str) -> Result<BlogItem, LoadError> {
        let mut path = clean_path(path);
        let root = self.mapper.root();
        if path != root.trim_end_matches('/') && !path.starts_with(root) {
            return Err(LoadError::NotFound(path));
        }
        let metadata = std::fs::metadata(&path).map_err(|e| Self::io_error(&path, e))?;

        let (kind, raw) = if metadata.is_dir() {
            path.push('/');
            let listing = render_listing(Path::new(&path), &self.ignore, &self.mapper)
                .map_err(|e| Self::io_error(&path, e))?;
            (ItemKind::Dir, listing.into_bytes())
        } else {
            let raw = std::fs::read(&path).map_err(|e| Self::io_error(&path, e))?;
            let kind = if is_markdown(&path) {
                ItemKind::Markdown
            } else {
                ItemKind::Other
            };
            (kind, raw)
        };

        let mut meta = if kind == ItemKind::Markdown {
            parse_front_matter(&String::from_utf8_lossy(&raw))?
        } else {
            Meta::default()
        };
        if meta.title.is_empty() {
            stem(&path).clone_into(&mut meta.title);
        }

        let url = self
            .mapper
            .path_to_url(&path)
            .ok_or_else(|| LoadError::NotFound(path.clone()))?;
        Ok(BlogItem::source(path, url, meta, kind, raw))
    }

    fn load(&self, path: &str) -> Result<BlogItem, LoadError> {
        let item = self.read_source(path)?;
        if !item.kind.is_rendered() {
            return Ok(item);
        }

        let html = self.renderer.render(&item.raw, &item.meta.title)?;
        tracing::debug!(path = %item.path, kind = ?item.kind, "Rendered blog item");
        Ok(item.with_html(html))
    }
}
