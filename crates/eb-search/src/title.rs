use std::sync::Arc;

use eb_storage::stem;

use crate::{SearchContext, SearchError, Searcher, rank};

/// Ranks visible paths by Levenshtein distance between the keyword and the
/// path's file stem.
pub struct TitleSearcher {
    ctx: Arc<SearchContext>,
}

impl TitleSearcher {
    pub fn new(ctx: Arc<SearchContext>) -> Self {
        Self { ctx }
    }
}

impl Searcher for TitleSearcher {
    fn name(&self) -> &str {
        "title"
    }

    fn brief(&self) -> &str {
        "edit distance between the keyword and file names"
    }

    fn search(&self, keyword: &str, num: usize) -> Result<Vec<String>, SearchError> {
        let scored = self
            .ctx
            .visible_paths()
            .into_iter()
            .map(|path| (strsim::levenshtein(keyword, stem(&path)), path))
            .collect();
        Ok(rank(scored, num))
    }
}
