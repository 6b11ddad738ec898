//! Blog content for easyblog.
//!
//! Turns tracked paths into [`BlogItem`]s: directories become link
//! listings, Markdown files are rendered by an external command, and
//! everything else is served verbatim.
//!
//! # Architecture
//!
//! - [`UrlMapper`]: router prefix to blog root translation (both directions)
//! - [`parse_front_matter`]: leading `---` YAML block to [`Meta`]
//! - [`Renderer`] / [`CommandRenderer`]: Markdown to HTML via a subprocess
//! - [`BlogLoader`]: the [`ContentLoader`] used by the server and search
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use eb_site::{BlogLoader, CommandRenderer, ContentLoader, UrlMapper};
//!
//! let mapper = UrlMapper::new("/blog", "/srv/blog/");
//! let renderer = Arc::new(CommandRenderer::pandoc("template.html"));
//! let loader = BlogLoader::new(mapper, ignore, renderer);
//! let item = loader.load("/srv/blog/hello.md")?;
//! ```

mod command;
mod front_matter;
mod item;
mod listing;
mod loader;
mod mapping;
mod renderer;

pub use command::{CommandError, split_command};
pub use front_matter::{MetadataError, parse_front_matter};
pub use item::{BlogItem, ItemKind, Meta, cache_key};
pub use listing::{escape_html, render_listing};
pub use loader::{BlogLoader, ContentLoader, LoadError};
pub use mapping::UrlMapper;
pub use renderer::{CommandRenderer, RenderError, Renderer};
