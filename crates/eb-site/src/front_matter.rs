//! Leading `---` YAML block of a Markdown file.

use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;

use crate::item::Meta;

/// First `---...---` block at the start of the file, possibly multi-line.
static FRONT_MATTER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)^\s*---(.*?)---").expect("invalid front matter regex"));

/// Error parsing a front-matter block.
#[derive(Debug, thiserror::Error)]
#[error("Invalid front matter: {0}")]
pub struct MetadataError(#[from] serde_yaml::Error);

/// Fields as written; `null` and missing are treated alike.
#[derive(Deserialize)]
struct RawMeta {
    title: Option<String>,
    keywords: Option<Vec<String>>,
    description: Option<String>,
}

/// Parse the front matter of `source`.
///
/// Returns default metadata when there is no block or the block is blank.
/// The title is left empty when absent; callers fill in their own default.
pub fn parse_front_matter(source: &str) -> Result<Meta, MetadataError> {
    let Some(block) = FRONT_MATTER.captures(source).and_then(|c| c.get(1)) else {
        return Ok(Meta::default());
    };
    let yaml = block.as_str();
    if yaml.trim().is_empty() {
        return Ok(Meta::default());
    }

    let raw: RawMeta = serde_yaml::from_str(yaml)?;
    Ok(Meta {
        title: raw.title.unwrap_or_default(),
        keywords: raw.keywords.unwrap_or_default(),
        description: raw.description.unwrap_or_default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_full_block() {
        let meta = parse_front_matter("---\ntitle: X\nkeywords: [a,b]\n---\nbody").unwrap();
        assert_eq!(
            meta,
            Meta {
                title: "X".to_owned(),
                keywords: vec!["a".to_owned(), "b".to_owned()],
                description: String::new(),
            }
        );
    }

    #[test]
    fn test_multiline_with_leading_whitespace() {
        let source = "\n\n---\ntitle: Rust notes\ndescription: >\n  ownership and\n  borrowing\nkeywords:\n  - rust\n  - memory\n---\n# Heading\n";
        let meta = parse_front_matter(source).unwrap();
        assert_eq!(meta.title, "Rust notes");
        assert_eq!(meta.description, "ownership and borrowing\n");
        assert_eq!(meta.keywords, vec!["rust".to_owned(), "memory".to_owned()]);
    }

    #[test]
    fn test_no_block() {
        assert_eq!(parse_front_matter("# Just a heading\n").unwrap(), Meta::default());
        assert_eq!(parse_front_matter("").unwrap(), Meta::default());
    }

    #[test]
    fn test_only_first_block() {
        let meta = parse_front_matter("---\ntitle: first\n---\n---\ntitle: second\n---\n").unwrap();
        assert_eq!(meta.title, "first");
    }

    #[test]
    fn test_block_not_at_start_is_ignored() {
        let meta = parse_front_matter("intro\n---\ntitle: late\n---\n").unwrap();
        assert_eq!(meta, Meta::default());
    }

    #[test]
    fn test_null_fields() {
        let meta = parse_front_matter("---\ntitle:\nkeywords:\n---\n").unwrap();
        assert_eq!(meta, Meta::default());
    }

    #[test]
    fn test_malformed_yaml() {
        assert!(parse_front_matter("---\ntitle: [unclosed\n---\n").is_err());
        assert!(parse_front_matter("---\nkeywords: 12\n---\n").is_err());
    }
}
