//! Snapshot and change stream of the blog tree.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock, mpsc};
use std::time::Duration;

use ignore::WalkBuilder;
use notify::{RecursiveMode, Watcher};
use tokio::sync::broadcast;

use crate::StorageError;
use crate::debouncer::EventDebouncer;
use crate::event::{ChangeEvent, ChangeKind, WatchHandle};
use crate::path::{is_dir_path, tracked_path};

/// Capacity of the change broadcast channel.
const EVENT_CAPACITY: usize = 1024;

/// How long a path must be quiet before its event is published.
const DEBOUNCE: Duration = Duration::from_millis(100);

/// Source of the known path set and its changes.
pub trait Crawler: Send + Sync {
    /// Blog root in tracked form (trailing `/`).
    fn root(&self) -> &str;

    /// Every known path below the root, sorted. The root itself is excluded.
    fn paths(&self) -> Vec<String>;

    /// Subscribe to change events emitted after this call.
    fn subscribe(&self) -> broadcast::Receiver<ChangeEvent>;
}

struct Tree {
    root: String,
    root_dir: PathBuf,
    paths: RwLock<BTreeSet<String>>,
    events: broadcast::Sender<ChangeEvent>,
}

impl Tree {
    /// Walk `dir` and insert everything below it.
    fn scan(&self, dir: &Path) -> Result<usize, StorageError> {
        let mut found = Vec::new();
        for entry in WalkBuilder::new(dir).standard_filters(false).build() {
            let entry = entry?;
            if entry.path() == self.root_dir {
                continue;
            }
            let is_dir = entry.file_type().is_some_and(|t| t.is_dir());
            found.push(tracked_path(entry.path(), is_dir));
        }
        let count = found.len();
        self.paths.write().unwrap().extend(found);
        Ok(count)
    }

    /// Update the snapshot for a debounced event and publish it.
    fn apply(&self, path: &Path, kind: ChangeKind) {
        let tracked = match kind {
            ChangeKind::Removed => {
                let as_dir = tracked_path(path, true);
                let mut paths = self.paths.write().unwrap();
                if paths.contains(&as_dir) {
                    paths.retain(|p| !p.starts_with(&as_dir));
                    as_dir
                } else {
                    let as_file = tracked_path(path, false);
                    paths.remove(&as_file);
                    as_file
                }
            }
            ChangeKind::Created | ChangeKind::Modified => {
                let is_dir = path.is_dir();
                let tracked = tracked_path(path, is_dir);
                if is_dir && kind == ChangeKind::Created {
                    // Moved-in directories bring their children without events
                    if let Err(e) = self.scan(path) {
                        tracing::warn!(path = %tracked, error = %e, "Failed to scan new directory");
                    }
                }
                self.paths.write().unwrap().insert(tracked.clone());
                tracked
            }
        };

        if tracked == self.root || !tracked.starts_with(&self.root) {
            return;
        }

        tracing::debug!(path = %tracked, ?kind, "Path changed");
        // No receivers is fine: nobody is interested yet
        let _ = self.events.send(ChangeEvent::new(tracked, kind));
    }
}

/// Filesystem crawler backed by `ignore` for the initial walk and `notify`
/// for subsequent changes.
///
/// # Example
///
/// ```ignore
/// let crawler = FsCrawler::new("blog")?;
/// let mut rx = crawler.subscribe();
/// let _handle = crawler.watch()?;
/// ```
#[derive(Clone)]
pub struct FsCrawler {
    tree: Arc<Tree>,
}

impl FsCrawler {
    /// Canonicalize `root` and take the initial snapshot.
    pub fn new(root: impl AsRef<Path>) -> Result<Self, StorageError> {
        let root = root.as_ref();
        if !root.is_dir() {
            return Err(StorageError::RootNotFound(root.to_path_buf()));
        }
        let root_dir = root.canonicalize()?;
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let tree = Tree {
            root: tracked_path(&root_dir, true),
            root_dir,
            paths: RwLock::new(BTreeSet::new()),
            events,
        };
        let count = tree.scan(&tree.root_dir)?;
        tracing::info!(root = %tree.root, count, "Crawled blog root");
        Ok(Self {
            tree: Arc::new(tree),
        })
    }

    /// Canonical root directory.
    pub fn root_dir(&self) -> &Path {
        &self.tree.root_dir
    }

    /// Start watching the root recursively.
    ///
    /// Events are debounced and published to subscribers until the returned
    /// handle is dropped.
    pub fn watch(&self) -> Result<WatchHandle, StorageError> {
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();
        let debouncer = Arc::new(EventDebouncer::new(DEBOUNCE));

        let recorder = Arc::clone(&debouncer);
        let mut watcher =
            notify::recommended_watcher(move |res: Result<notify::Event, notify::Error>| {
                let event = match res {
                    Ok(event) => event,
                    Err(e) => {
                        tracing::warn!(error = %e, "File watcher error");
                        return;
                    }
                };
                let kind = match event.kind {
                    notify::EventKind::Create(_) => ChangeKind::Created,
                    notify::EventKind::Modify(_) => ChangeKind::Modified,
                    notify::EventKind::Remove(_) => ChangeKind::Removed,
                    _ => return,
                };
                for path in event.paths {
                    recorder.record(path, kind);
                }
            })?;
        watcher.watch(&self.tree.root_dir, RecursiveMode::Recursive)?;

        let tree = Arc::clone(&self.tree);
        std::thread::spawn(move || {
            let _watcher = watcher;
            loop {
                match shutdown_rx.recv_timeout(Duration::from_millis(50)) {
                    Err(mpsc::RecvTimeoutError::Timeout) => {}
                    Ok(()) | Err(mpsc::RecvTimeoutError::Disconnected) => break,
                }
                for (path, kind) in debouncer.drain_ready() {
                    tree.apply(&path, kind);
                }
            }
            tracing::debug!(root = %tree.root, "File watcher stopped");
        });

        Ok(WatchHandle::new(shutdown_tx))
    }

    /// Whether a tracked path is currently known.
    pub fn contains(&self, path: &str) -> bool {
        let paths = self.tree.paths.read().unwrap();
        paths.contains(path) || (!is_dir_path(path) && paths.contains(&format!("{path}/")))
    }
}

impl Crawler for FsCrawler {
    fn root(&self) -> &str {
        &self.tree.root
    }

    fn paths(&self) -> Vec<String> {
        self.tree.paths.read().unwrap().iter().cloned().collect()
    }

    fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.tree.events.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;

    fn blog() -> (tempfile::TempDir, FsCrawler) {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.md"), "# A").unwrap();
        fs::create_dir(dir.path().join("notes")).unwrap();
        fs::write(dir.path().join("notes/b.md"), "# B").unwrap();
        fs::write(dir.path().join(".hidden.md"), "").unwrap();
        let crawler = FsCrawler::new(dir.path()).unwrap();
        (dir, crawler)
    }

    #[test]
    fn test_crawler_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<FsCrawler>();
    }

    #[test]
    fn test_initial_snapshot() {
        let (_dir, crawler) = blog();
        let root = crawler.root().to_owned();
        assert!(root.ends_with('/'));
        assert_eq!(
            crawler.paths(),
            vec![
                format!("{root}.hidden.md"),
                format!("{root}a.md"),
                format!("{root}notes/"),
                format!("{root}notes/b.md"),
            ]
        );
    }

    #[test]
    fn test_missing_root() {
        let err = FsCrawler::new("/nonexistent/blog/root").err().unwrap();
        assert!(matches!(err, StorageError::RootNotFound(_)));
    }

    #[test]
    fn test_contains_accepts_dir_without_slash() {
        let (_dir, crawler) = blog();
        let root = crawler.root().to_owned();
        assert!(crawler.contains(&format!("{root}notes")));
        assert!(crawler.contains(&format!("{root}a.md")));
        assert!(!crawler.contains(&format!("{root}missing.md")));
    }

    #[test]
    fn test_apply_removed_directory_drops_children() {
        let (dir, crawler) = blog();
        let mut rx = crawler.subscribe();
        let root = crawler.root().to_owned();
        fs::remove_dir_all(dir.path().join("notes")).unwrap();

        crawler
            .tree
            .apply(&crawler.root_dir().join("notes"), ChangeKind::Removed);

        assert_eq!(
            crawler.paths(),
            vec![format!("{root}.hidden.md"), format!("{root}a.md")]
        );
        let event = rx.try_recv().unwrap();
        assert_eq!(event, ChangeEvent::new(format!("{root}notes/"), ChangeKind::Removed));
    }

    #[test]
    fn test_apply_created_file_is_published() {
        let (dir, crawler) = blog();
        let mut rx = crawler.subscribe();
        let root = crawler.root().to_owned();
        fs::write(dir.path().join("c.md"), "# C").unwrap();

        crawler
            .tree
            .apply(&crawler.root_dir().join("c.md"), ChangeKind::Created);

        assert!(crawler.contains(&format!("{root}c.md")));
        assert_eq!(
            rx.try_recv().unwrap(),
            ChangeEvent::new(format!("{root}c.md"), ChangeKind::Created)
        );
    }

    // Watcher tests are timing-sensitive
    #[test]
    #[ignore]
    fn test_watch_detects_file_creation() {
        let (dir, crawler) = blog();
        let mut rx = crawler.subscribe();
        let _handle = crawler.watch().unwrap();
        std::thread::sleep(Duration::from_millis(200));

        fs::write(dir.path().join("new.md"), "# New").unwrap();
        std::thread::sleep(Duration::from_millis(500));

        let expected = format!("{}new.md", crawler.root());
        let events: Vec<_> = std::iter::from_fn(|| rx.try_recv().ok()).collect();
        assert!(
            events.iter().any(|e| e.path == expected),
            "Expected event for new.md, got: {events:?}"
        );
    }

    #[test]
    #[ignore]
    fn test_dropping_handle_stops_events() {
        let (dir, crawler) = blog();
        let mut rx = crawler.subscribe();
        let handle = crawler.watch().unwrap();
        drop(handle);
        std::thread::sleep(Duration::from_millis(200));

        fs::write(dir.path().join("late.md"), "# Late").unwrap();
        std::thread::sleep(Duration::from_millis(500));

        assert!(rx.try_recv().is_err());
    }
}
