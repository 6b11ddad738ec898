use std::cmp::Reverse;
use std::sync::Arc;

use crate::{SearchContext, SearchError, Searcher, rank};

/// Ranks visible text files by occurrences of the keyword in their source,
/// title and description (case-insensitive). Files with no match are dropped.
pub struct ContentSearcher {
    ctx: Arc<SearchContext>,
}

impl ContentSearcher {
    pub fn new(ctx: Arc<SearchContext>) -> Self {
        Self { ctx }
    }
}

fn occurrences(haystack: &str, needle: &str) -> usize {
    haystack.to_lowercase().matches(needle).count()
}

impl Searcher for ContentSearcher {
    fn name(&self) -> &str {
        "content"
    }

    fn brief(&self) -> &str {
        "keyword occurrences in content, title and description"
    }

    fn search(&self, keyword: &str, num: usize) -> Result<Vec<String>, SearchError> {
        let needle = keyword.to_lowercase();
        if needle.is_empty() {
            return Ok(Vec::new());
        }
        let scored = self
            .ctx
            .file_items()
            .into_iter()
            .filter_map(|item| {
                let hits = occurrences(&item.text(), &needle)
                    + occurrences(&item.meta.title, &needle)
                    + occurrences(&item.meta.description, &needle);
                (hits > 0).then(|| (Reverse(hits), item.path.clone()))
            })
            .collect();
        Ok(rank(scored, num))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::blog;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_counts_body_title_and_description() {
        let b = blog(
            &[
                ("a.md", "borrow borrow"),
                ("b.md", "---\ntitle: Borrowing\ndescription: the borrow checker\n---\nBORROW"),
                ("c.md", "nothing here"),
                ("d.md", "borrow"),
            ],
            &[],
            &[],
        );
        let searcher = ContentSearcher::new(Arc::clone(&b.ctx));
        // b.md: source has 3 (title, description, body), plus title and description
        assert_eq!(
            searcher.search("borrow", 10).unwrap(),
            vec![b.path("b.md"), b.path("a.md"), b.path("d.md")]
        );
    }

    #[test]
    fn test_finds_plain_text_files() {
        let b = blog(&[("notes.txt", "lifetime lifetime"), ("a.md", "lifetime")], &[], &[]);
        let searcher = ContentSearcher::new(Arc::clone(&b.ctx));
        assert_eq!(
            searcher.search("lifetime", 10).unwrap(),
            vec![b.path("notes.txt"), b.path("a.md")]
        );
    }

    #[test]
    fn test_hidden_excluded_and_changed_reread() {
        let b = blog(&[("a.md", "alpha"), ("h.md", "alpha")], &["h.md"], &[]);
        let searcher = ContentSearcher::new(Arc::clone(&b.ctx));
        assert_eq!(searcher.search("alpha", 10).unwrap(), vec![b.path("a.md")]);

        b.write("a.md", "beta");
        b.ctx.tracker.set_changed(&b.path("a.md"), true);
        assert!(searcher.search("alpha", 10).unwrap().is_empty());
    }
}
