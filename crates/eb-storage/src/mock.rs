//! In-memory crawler for tests.

use std::collections::BTreeSet;
use std::sync::RwLock;

use tokio::sync::broadcast;

use crate::crawler::Crawler;
use crate::event::{ChangeEvent, ChangeKind};

/// Crawler whose path set and events are driven by the test.
///
/// # Example
///
/// ```ignore
/// let crawler = MockCrawler::new("/blog/")
///     .with_path("/blog/a.md")
///     .with_path("/blog/notes/");
/// crawler.emit("/blog/a.md", ChangeKind::Modified);
/// ```
pub struct MockCrawler {
    root: String,
    paths: RwLock<BTreeSet<String>>,
    events: broadcast::Sender<ChangeEvent>,
}

impl MockCrawler {
    #[must_use]
    pub fn new(root: impl Into<String>) -> Self {
        let mut root = root.into();
        if !root.ends_with('/') {
            root.push('/');
        }
        let (events, _) = broadcast::channel(256);
        Self {
            root,
            paths: RwLock::new(BTreeSet::new()),
            events,
        }
    }

    /// Add a known path.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    #[must_use]
    pub fn with_path(self, path: impl Into<String>) -> Self {
        self.paths.write().unwrap().insert(path.into());
        self
    }

    /// Update the snapshot and publish an event, like a real crawler would.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    pub fn emit(&self, path: impl Into<String>, kind: ChangeKind) {
        let path = path.into();
        {
            let mut paths = self.paths.write().unwrap();
            if kind == ChangeKind::Removed {
                paths.remove(&path);
            } else {
                paths.insert(path.clone());
            }
        }
        let _ = self.events.send(ChangeEvent::new(path, kind));
    }
}

impl Crawler for MockCrawler {
    fn root(&self) -> &str {
        &self.root
    }

    fn paths(&self) -> Vec<String> {
        self.paths.read().unwrap().iter().cloned().collect()
    }

    fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.events.subscribe()
    }
}
