//! Coalescing of raw watcher events.
//!
//! Editors typically emit several events per save. Events for the same path
//! are merged until the path has been quiet for the debounce window.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::event::ChangeKind;

struct Pending {
    kind: ChangeKind,
    deadline: Instant,
    seq: u64,
}

#[derive(Default)]
struct Queue {
    entries: HashMap<PathBuf, Pending>,
    next_seq: u64,
}

/// Per-path event coalescer shared between the notify callback and the
/// drain thread.
pub(crate) struct EventDebouncer {
    queue: Mutex<Queue>,
    window: Duration,
}

impl EventDebouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            queue: Mutex::new(Queue::default()),
            window,
        }
    }

    /// Record a raw event, merging it with any pending event for the path.
    pub fn record(&self, path: PathBuf, kind: ChangeKind) {
        let mut queue = self.queue.lock().unwrap();
        let deadline = Instant::now() + self.window;
        let seq = queue.next_seq;
        queue.next_seq += 1;

        let merged = match queue.entries.remove(&path) {
            None => Some(kind),
            Some(prev) => merge(prev.kind, kind),
        };
        if let Some(kind) = merged {
            queue.entries.insert(
                path,
                Pending {
                    kind,
                    deadline,
                    seq,
                },
            );
        }
    }

    /// Remove and return events whose window has elapsed, oldest first.
    pub fn drain_ready(&self) -> Vec<(PathBuf, ChangeKind)> {
        let now = Instant::now();
        let mut queue = self.queue.lock().unwrap();
        let mut ready: Vec<_> = queue
            .entries
            .extract_if(|_, pending| pending.deadline <= now)
            .collect();
        ready.sort_by_key(|(_, pending)| pending.seq);
        ready
            .into_iter()
            .map(|(path, pending)| (path, pending.kind))
            .collect()
    }
}

/// Merge a pending kind with a newer one. `None` drops the path entirely.
#[allow(clippy::match_same_arms)]
fn merge(prev: ChangeKind, next: ChangeKind) -> Option<ChangeKind> {
    use ChangeKind::{Created, Modified, Removed};

    match (prev, next) {
        // Never observed by anyone
        (Created, Removed) => None,
        (Created, _) => Some(Created),
        (Removed, Created) => Some(Modified),
        (Removed, _) => Some(Removed),
        (Modified, next) => Some(next),
    }
}
