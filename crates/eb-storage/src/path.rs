//! Tracked path normalization.
//!
//! A tracked path is a cleaned, forward-slash string. Directories carry a
//! trailing `/`, files never do. All components agree on this form so that
//! cache keys, change flags and matcher input line up.

use std::path::Path;

/// Lexically clean a slash-separated path.
///
/// Collapses repeated separators, drops `.` segments and resolves `..`
/// against preceding segments. A `..` that would climb above a rooted path
/// is dropped. Returns `"."` for an empty relative result. A trailing slash
/// is not preserved.
#[must_use]
pub fn clean_path(path: &str) -> String {
    if path.is_empty() {
        return ".".to_owned();
    }

    let rooted = path.starts_with('/');
    let mut parts: Vec<&str> = Vec::new();

    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => match parts.last() {
                Some(&last) if last != ".." => {
                    parts.pop();
                }
                _ if rooted => {}
                _ => parts.push(".."),
            },
            other => parts.push(other),
        }
    }

    let joined = parts.join("/");
    match (rooted, joined.is_empty()) {
        (true, _) => format!("/{joined}"),
        (false, true) => ".".to_owned(),
        (false, false) => joined,
    }
}

/// Convert a filesystem path to tracked form.
#[must_use]
pub fn tracked_path(path: &Path, is_dir: bool) -> String {
    let slashed = path.to_string_lossy().replace('\\', "/");
    let mut cleaned = clean_path(&slashed);
    if is_dir && !cleaned.ends_with('/') {
        cleaned.push('/');
    }
    cleaned
}

/// Whether a tracked path names a directory.
#[must_use]
pub fn is_dir_path(path: &str) -> bool {
    path.ends_with('/')
}

/// Containing directory of a tracked path, with trailing slash.
///
/// Returns `None` for paths without a parent segment.
#[must_use]
pub fn parent_dir(path: &str) -> Option<String> {
    let trimmed = path.trim_end_matches('/');
    let idx = trimmed.rfind('/')?;
    Some(trimmed[..=idx].to_owned())
}

/// Last segment of a tracked path, without trailing slash.
#[must_use]
pub fn base_name(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    trimmed.rsplit('/').next().unwrap_or(trimmed)
}

/// Base name with its extension stripped.
///
/// Directories keep their full name; dotfiles such as `.profile` are
/// returned unchanged.
#[must_use]
pub fn stem(path: &str) -> &str {
    let name = base_name(path);
    if is_dir_path(path) {
        return name;
    }
    match name.rfind('.') {
        Some(idx) if idx > 0 => &name[..idx],
        _ => name,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_clean_path() {
        let cases = [
            ("", "."),
            ("/", "/"),
            ("a/b/../c", "a/c"),
            ("/blog//a/./b/", "/blog/a/b"),
            ("/../a", "/a"),
            ("../a", "../a"),
            ("a/../..", ".."),
            ("./", "."),
        ];
        for (input, expected) in cases {
            assert_eq!(clean_path(input), expected, "clean_path({input:?})");
        }
    }

    #[test]
    fn test_tracked_path_dir_gets_slash() {
        assert_eq!(
            tracked_path(&PathBuf::from("/srv/blog/notes"), true),
            "/srv/blog/notes/"
        );
        assert_eq!(tracked_path(&PathBuf::from("/srv/blog/a.md"), false), "/srv/blog/a.md");
        assert_eq!(tracked_path(&PathBuf::from("/"), true), "/");
    }

    #[test]
    fn test_parent_dir() {
        assert_eq!(parent_dir("/srv/blog/a.md").as_deref(), Some("/srv/blog/"));
        assert_eq!(parent_dir("/srv/blog/notes/").as_deref(), Some("/srv/blog/"));
        assert_eq!(parent_dir("a.md"), None);
    }

    #[test]
    fn test_base_name_and_stem() {
        assert_eq!(base_name("/blog/post.md"), "post.md");
        assert_eq!(base_name("/blog/notes/"), "notes");
        assert_eq!(stem("/blog/post.md"), "post");
        assert_eq!(stem("/blog/archive.tar.gz"), "archive.tar");
        assert_eq!(stem("/blog/v1.2/"), "v1.2");
        assert_eq!(stem("/blog/.profile"), ".profile");
    }
}
