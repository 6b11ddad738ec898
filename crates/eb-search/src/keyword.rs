use std::cmp::Reverse;
use std::sync::Arc;

use crate::{SearchContext, SearchError, Searcher, rank};

/// Ranks visible files by how many front-matter keywords contain the search
/// keyword, plus one if the file itself contains it. Matching is
/// case-sensitive. Files without a hit still rank, after every hit.
pub struct KeywordSearcher {
    ctx: Arc<SearchContext>,
}

impl KeywordSearcher {
    pub fn new(ctx: Arc<SearchContext>) -> Self {
        Self { ctx }
    }
}

impl Searcher for KeywordSearcher {
    fn name(&self) -> &str {
        "keyword"
    }

    fn brief(&self) -> &str {
        "matches against front-matter keywords"
    }

    fn search(&self, keyword: &str, num: usize) -> Result<Vec<String>, SearchError> {
        let scored = self
            .ctx
            .file_items()
            .into_iter()
            .map(|item| {
                let mut hits = item
                    .meta
                    .keywords
                    .iter()
                    .filter(|k| k.contains(keyword))
                    .count();
                if item.text().contains(keyword) {
                    hits += 1;
                }
                (Reverse(hits), item.path.clone())
            })
            .collect();
        Ok(rank(scored, num))
    }
}
