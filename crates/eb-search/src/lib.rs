//! Search strategies for easyblog.
//!
//! Every strategy implements [`Searcher`]: given a keyword and a cap it
//! returns tracked paths, best match first, ties broken by path.
//!
//! | name       | signal                                             |
//! |------------|----------------------------------------------------|
//! | `title`    | edit distance between keyword and file stem        |
//! | `keyword`  | front-matter keywords containing the keyword       |
//! | `content`  | keyword occurrences in body, title and description |
//! | `fulltext` | fuzzy BM25 over a tantivy index kept in sync       |
//! | plugins    | external command or HTTP endpoint                  |
//!
//! Strategies that read content skip paths that fail to load. Full-text and
//! plugin failures fail the search.

mod content;
mod context;
mod fulltext;
mod keyword;
mod plugin;
mod registry;
mod title;

pub use content::ContentSearcher;
pub use context::SearchContext;
pub use fulltext::FullTextSearcher;
pub use keyword::KeywordSearcher;
pub use plugin::PluginSearcher;
pub use registry::{SearcherInfo, SearcherRegistry};
pub use title::TitleSearcher;

/// Error returned by a search strategy.
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("Full-text index error: {0}")]
    Index(#[from] tantivy::TantivyError),
    #[error("Full-text index directory error: {0}")]
    IndexDirectory(#[from] tantivy::directory::error::OpenDirectoryError),
    #[error("Invalid plugin command: {0}")]
    Command(#[from] eb_site::CommandError),
    #[error("Plugin {name} failed to start: {source}")]
    Spawn {
        name: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Plugin {name} exited with {status}: {stderr}")]
    PluginExit {
        name: String,
        status: std::process::ExitStatus,
        stderr: String,
    },
    #[error("Plugin request failed: {0}")]
    Http(#[from] ureq::Error),
    #[error("Invalid plugin output: {0}")]
    Output(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A ranking strategy over the blog tree.
pub trait Searcher: Send + Sync {
    /// Registry key, also the `searchType` query value.
    fn name(&self) -> &str;

    /// One-line description shown by the searchers endpoint.
    fn brief(&self) -> &str;

    /// Up to `num` tracked paths, best first.
    fn search(&self, keyword: &str, num: usize) -> Result<Vec<String>, SearchError>;
}

/// Sort `(score, path)` pairs by score then path and keep the first `num` paths.
pub(crate) fn rank<K: Ord>(mut scored: Vec<(K, String)>, num: usize) -> Vec<String> {
    scored.sort();
    scored.into_iter().take(num).map(|(_, path)| path).collect()
}
