//! Path tracking for the easyblog content tree.
//!
//! This crate owns everything that knows about the set of files under the
//! blog root:
//!
//! - [`clean_path`] and friends normalize paths into tracked form
//!   (forward slashes, cleaned, directories end with `/`)
//! - [`PathMatcher`] and [`IgnoreSet`] decide whether a path is hidden or private
//! - [`Crawler`] exposes a snapshot of known paths plus a change-event stream,
//!   implemented by [`FsCrawler`] on top of `notify`
//! - [`ChangeTracker`] remembers which paths changed since they were last served
//!
//! [`MockCrawler`] is available behind the `mock` feature flag.
//!
//! # Example
//!
//! ```ignore
//! use eb_storage::{Crawler, FsCrawler};
//!
//! let crawler = FsCrawler::new("blog")?;
//! let _handle = crawler.watch()?;
//! for path in crawler.paths() {
//!     println!("{path}");
//! }
//! ```

mod crawler;
mod debouncer;
mod event;
mod matcher;
#[cfg(feature = "mock")]
mod mock;
mod path;
mod tracker;

pub use crawler::{Crawler, FsCrawler};
pub use event::{ChangeEvent, ChangeKind, WatchHandle};
pub use matcher::{IgnoreSet, MatcherError, PathMatcher, path_match};
#[cfg(feature = "mock")]
pub use mock::MockCrawler;
pub use path::{base_name, clean_path, is_dir_path, parent_dir, stem, tracked_path};
pub use tracker::ChangeTracker;

use std::path::PathBuf;

/// Error raised while crawling or watching the blog root.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Blog root does not exist or is not a directory.
    #[error("Blog root not found: {}", .0.display())]
    RootNotFound(PathBuf),
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// Directory walk failed.
    #[error("Walk error: {0}")]
    Walk(#[from] ignore::Error),
    /// File watcher could not be started.
    #[error("Watch error: {0}")]
    Watch(#[from] notify::Error),
}
