//! Gitignore-style visibility patterns.
//!
//! [`PathMatcher`] compiles a growing list of patterns into an
//! [`ignore::gitignore::Gitignore`] and publishes it through an [`ArcSwap`].
//! Rebuilds happen on a copy under a mutex; readers load the current matcher
//! without taking the lock and never see a half-built pattern set.

use std::sync::{Arc, Mutex};

use arc_swap::ArcSwap;
use ignore::gitignore::{Gitignore, GitignoreBuilder};

/// Error raised when a pattern cannot be compiled.
#[derive(Debug, thiserror::Error)]
#[error("Invalid pattern {pattern:?}: {source}")]
pub struct MatcherError {
    /// Offending pattern.
    pub pattern: String,
    #[source]
    source: ignore::Error,
}

/// Mutable set of gitignore patterns anchored at a root directory.
pub struct PathMatcher {
    root: String,
    patterns: Mutex<Vec<String>>,
    compiled: ArcSwap<Gitignore>,
}

impl PathMatcher {
    /// Create an empty matcher for paths under `root` (tracked form, trailing `/`).
    #[must_use]
    pub fn new(root: impl Into<String>) -> Self {
        let mut root = root.into();
        if !root.ends_with('/') {
            root.push('/');
        }
        Self {
            root,
            patterns: Mutex::new(Vec::new()),
            compiled: ArcSwap::from_pointee(Gitignore::empty()),
        }
    }

    /// Create a matcher pre-populated with `patterns`.
    pub fn with_patterns<I, S>(root: impl Into<String>, patterns: I) -> Result<Self, MatcherError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let matcher = Self::new(root);
        matcher.add_patterns(patterns)?;
        Ok(matcher)
    }

    /// Merge `patterns` into the set and publish a recompiled matcher.
    ///
    /// On error the previously published matcher stays in place.
    pub fn add_patterns<I, S>(&self, patterns: I) -> Result<(), MatcherError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut current = self.patterns.lock().unwrap();
        let mut next = current.clone();
        for pattern in patterns {
            let pattern = pattern.as_ref().trim();
            if !pattern.is_empty() && !next.iter().any(|p| p == pattern) {
                next.push(pattern.to_owned());
            }
        }
        if next.len() == current.len() {
            return Ok(());
        }
        self.publish(&mut current, next)
    }

    /// Drop `patterns` from the set and publish a recompiled matcher.
    ///
    /// Patterns not in the set are ignored.
    pub fn remove_patterns<I, S>(&self, patterns: I) -> Result<(), MatcherError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut current = self.patterns.lock().unwrap();
        let mut next = current.clone();
        for pattern in patterns {
            let pattern = pattern.as_ref().trim();
            next.retain(|p| p != pattern);
        }
        if next.len() == current.len() {
            return Ok(());
        }
        self.publish(&mut current, next)
    }

    /// Compile `next` and swap it in. `current` is the locked pattern list.
    fn publish(&self, current: &mut Vec<String>, next: Vec<String>) -> Result<(), MatcherError> {
        let compiled = self.compile(&next)?;
        self.compiled.store(Arc::new(compiled));
        tracing::debug!(root = %self.root, count = next.len(), "Rebuilt path matcher");
        *current = next;
        Ok(())
    }

    fn compile(&self, patterns: &[String]) -> Result<Gitignore, MatcherError> {
        let mut builder = GitignoreBuilder::new(&self.root);
        for pattern in patterns {
            builder.add_line(None, pattern).map_err(|source| MatcherError {
                pattern: pattern.clone(),
                source,
            })?;
        }
        builder.build().map_err(|source| MatcherError {
            pattern: patterns.join(","),
            source,
        })
    }

    /// Patterns currently in the set.
    pub fn patterns(&self) -> Vec<String> {
        self.patterns.lock().unwrap().clone()
    }

    /// Whether a tracked path matches any pattern.
    ///
    /// Paths outside the root, and the root itself, never match. A pattern
    /// matching a directory also matches everything below it.
    pub fn is_match(&self, path: &str) -> bool {
        let Some(rel) = path.strip_prefix(&self.root) else {
            return false;
        };
        let is_dir = rel.ends_with('/');
        let rel = rel.trim_matches('/');
        if rel.is_empty() {
            return false;
        }

        let compiled = self.compiled.load();
        compiled.matched_path_or_any_parents(rel, is_dir).is_ignore()
    }
}

/// Returns true if any of `matchers` matches `path`.
pub fn path_match(path: &str, matchers: &[&PathMatcher]) -> bool {
    matchers.iter().any(|m| m.is_match(path))
}

/// The hide and private pattern sets.
///
/// Hidden paths are left out of listings and search results but can still be
/// fetched directly. Private paths are never served.
pub struct IgnoreSet {
    pub hide: PathMatcher,
    pub private: PathMatcher,
}

impl IgnoreSet {
    /// Build both sets for paths under `root`.
    pub fn new<S: AsRef<str>>(
        root: &str,
        hide: &[S],
        private: &[S],
    ) -> Result<Self, MatcherError> {
        Ok(Self {
            hide: PathMatcher::with_patterns(root, hide)?,
            private: PathMatcher::with_patterns(root, private)?,
        })
    }

    pub fn is_hidden(&self, path: &str) -> bool {
        self.hide.is_match(path)
    }

    pub fn is_private(&self, path: &str) -> bool {
        self.private.is_match(path)
    }

    /// Neither hidden nor private.
    pub fn is_visible(&self, path: &str) -> bool {
        !path_match(path, &[&self.hide, &self.private])
    }

    /// All patterns of both sets, hide first.
    pub fn all_patterns(&self) -> Vec<String> {
        let mut patterns = self.hide.patterns();
        patterns.extend(self.private.patterns());
        patterns
    }
}
