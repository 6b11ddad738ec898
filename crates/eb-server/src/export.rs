//! Static export of served content.
//!
//! Every freshly loaded item is mirrored under the export root so the tree
//! can later be served by any static file server. Rendered pages have their
//! absolute `.md` links rewritten to `.html`. [`export_all`] drives the
//! pipeline over a whole path snapshot for one-shot exports.

use std::path::{Path, PathBuf};
use std::sync::{LazyLock, Mutex};

use regex::{Captures, Regex};
use tokio_util::sync::CancellationToken;

use eb_site::BlogItem;

use crate::pipeline::BlogPipeline;

/// Absolute `.md` href in double quotes, single quotes or unquoted. An
/// unquoted value also captures its terminator.
static MD_HREF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"href=(?:"(/[^"]*)\.md"|'(/[^']*)\.md'|(/[^\s"'<>`=]*)\.md([\s>]|$))"#)
        .expect("invalid href regex")
});

/// Outcome of a one-shot export.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ExportSummary {
    /// Items written under the export root.
    pub exported: usize,
    /// Paths that vanished or failed to render.
    pub skipped: usize,
}

/// Error writing an exported file.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("URL {0} is not under the blog router")]
    OutsideRouter(String),
    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Writes served items under the export root.
///
/// A failed write is fatal: the error is kept for [`crate::run_server`] to
/// return and the shutdown token is cancelled.
pub(crate) struct Exporter {
    root: PathBuf,
    router: String,
    token: CancellationToken,
    failure: Mutex<Option<ExportError>>,
}

impl Exporter {
    pub(crate) fn new(root: impl Into<PathBuf>, router: &str, token: CancellationToken) -> Self {
        Self {
            root: root.into(),
            router: router.trim_end_matches('/').to_owned(),
            token,
            failure: Mutex::new(None),
        }
    }

    /// Export location for a blog URL.
    ///
    /// `/blog/a/` maps to `a/index.html`, `/blog/a.md` to `a.html`; anything
    /// else keeps its name.
    pub(crate) fn gen_path(&self, url: &str) -> Option<PathBuf> {
        let rest = if url == self.router {
            ""
        } else {
            url.strip_prefix(&self.router)?.strip_prefix('/')?
        };
        let relative = if rest.is_empty() || rest.ends_with('/') {
            format!("{rest}index.html")
        } else if let Some(stem) = rest.strip_suffix(".md") {
            format!("{stem}.html")
        } else {
            rest.to_owned()
        };
        Some(self.root.join(relative))
    }

    /// Write `item`. On error the failure is recorded, shutdown is
    /// requested and `None` is returned.
    pub(crate) fn export(&self, item: &BlogItem) -> Option<PathBuf> {
        match self.write(item) {
            Ok(path) => {
                tracing::debug!(url = %item.url, path = %path.display(), "Exported");
                Some(path)
            }
            Err(e) => {
                tracing::error!(url = %item.url, error = %e, "Static export failed, shutting down");
                self.failure.lock().unwrap().get_or_insert(e);
                self.token.cancel();
                None
            }
        }
    }

    fn write(&self, item: &BlogItem) -> Result<PathBuf, ExportError> {
        let path = self
            .gen_path(&item.url)
            .ok_or_else(|| ExportError::OutsideRouter(item.url.clone()))?;
        let data = if item.is_rendered() {
            rewrite_links(&String::from_utf8_lossy(item.rendered())).into_bytes()
        } else {
            item.rendered().to_vec()
        };
        write_file(&path, &data)?;
        Ok(path)
    }

    /// The first export failure, if any.
    pub(crate) fn take_failure(&self) -> Option<ExportError> {
        self.failure.lock().unwrap().take()
    }
}

/// Serve every path in `paths` through `pipeline`, whose exporter writes
/// each fresh item. Private paths are left out. A missing or unrenderable
/// path is skipped; the first write failure aborts the export.
pub(crate) async fn export_all(
    pipeline: &BlogPipeline,
    paths: &[String],
) -> Result<ExportSummary, ExportError> {
    let mut summary = ExportSummary::default();
    for path in paths.iter().filter(|path| !pipeline.ignore.is_private(path)) {
        let Some(url) = pipeline.mapper.path_to_url(path) else {
            continue;
        };
        match pipeline.handle(&url).await {
            Ok(_) => summary.exported += 1,
            Err(e) => {
                if let Some(failure) = pipeline.take_export_failure() {
                    return Err(failure);
                }
                tracing::warn!(url = %url, error = %e, "Skipping during export");
                summary.skipped += 1;
            }
        }
    }
    Ok(summary)
}

fn write_file(path: &Path, data: &[u8]) -> Result<(), ExportError> {
    let write_error = |source| ExportError::Write {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(write_error)?;
    }
    std::fs::write(path, data).map_err(write_error)
}

/// Point absolute links to Markdown files at their exported HTML.
pub(crate) fn rewrite_links(html: &str) -> String {
    MD_HREF
        .replace_all(html, |caps: &Captures<'_>| {
            if let Some(target) = caps.get(1) {
                format!(r#"href="{}.html""#, target.as_str())
            } else if let Some(target) = caps.get(2) {
                format!("href='{}.html'", target.as_str())
            } else {
                format!("href={}.html{}", &caps[3], &caps[4])
            }
        })
        .into_owned()
}
