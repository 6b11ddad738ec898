//! Per-path "changed since last served" flags.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::event::ChangeEvent;
use crate::path::parent_dir;

#[derive(Debug, Default, Clone, Copy)]
struct Flag {
    changed: bool,
    /// Bumped on every change notification, consumed or not.
    generation: u64,
}

/// Tracks which paths changed since their cached content was last dropped.
///
/// The outstanding counter always equals the number of flags set to `true`.
/// It is only modified while the map lock is held, so it can never drift or
/// go negative.
#[derive(Default)]
pub struct ChangeTracker {
    flags: Mutex<HashMap<String, Flag>>,
    outstanding: AtomicUsize,
}

impl ChangeTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the flag for `path`.
    ///
    /// Writing the value a path already has is a no-op. Clearing a path that
    /// was never seen records it as unchanged without touching the counter.
    pub fn set_changed(&self, path: &str, changed: bool) {
        let mut flags = self.flags.lock().unwrap();
        let flag = flags.entry(path.to_owned()).or_default();
        let previous = flag.changed;
        flag.changed = changed;
        if changed {
            flag.generation += 1;
        }
        match (previous, changed) {
            (false, true) => {
                self.outstanding.fetch_add(1, Ordering::SeqCst);
            }
            (true, false) => {
                self.outstanding.fetch_sub(1, Ordering::SeqCst);
            }
            _ => tracing::debug!(path, changed, "Change flag already set"),
        }
    }

    /// Flag for `path`. The empty path asks whether anything is outstanding.
    pub fn changed(&self, path: &str) -> bool {
        if path.is_empty() {
            return self.outstanding() != 0;
        }
        self.flags.lock().unwrap().get(path).is_some_and(|flag| flag.changed)
    }

    /// Number of change notifications seen for `path`.
    ///
    /// Compare values taken before and after reading a path to tell whether
    /// it changed in between, even if the flag was consumed meanwhile.
    pub fn generation(&self, path: &str) -> u64 {
        self.flags.lock().unwrap().get(path).map_or(0, |flag| flag.generation)
    }

    /// Clear the flag for `path`, returning whether it was set.
    ///
    /// Check and clear happen under one lock so two requests cannot both
    /// consume the same change.
    pub fn take_changed(&self, path: &str) -> bool {
        let mut flags = self.flags.lock().unwrap();
        match flags.get_mut(path) {
            Some(flag) if flag.changed => {
                flag.changed = false;
                self.outstanding.fetch_sub(1, Ordering::SeqCst);
                true
            }
            _ => false,
        }
    }

    /// Number of paths currently flagged.
    pub fn outstanding(&self) -> usize {
        self.outstanding.load(Ordering::SeqCst)
    }

    /// Flag a changed path and its containing directory.
    pub fn record(&self, event: &ChangeEvent) {
        self.set_changed(&event.path, true);
        if let Some(dir) = parent_dir(&event.path) {
            self.set_changed(&dir, true);
        }
    }

    /// Flag every path seen so far. Used when events were dropped.
    pub fn mark_all(&self) {
        let mut flags = self.flags.lock().unwrap();
        let mut newly = 0;
        for flag in flags.values_mut() {
            flag.generation += 1;
            if !flag.changed {
                flag.changed = true;
                newly += 1;
            }
        }
        self.outstanding.fetch_add(newly, Ordering::SeqCst);
    }

    /// Consume change events until `token` is cancelled or the stream ends.
    pub fn spawn_listener(
        self: &Arc<Self>,
        mut events: broadcast::Receiver<ChangeEvent>,
        token: CancellationToken,
    ) -> JoinHandle<()> {
        let tracker = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                let received = tokio::select! {
                    () = token.cancelled() => break,
                    received = events.recv() => received,
                };
                match received {
                    Ok(event) => tracker.record(&event),
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        tracing::warn!(missed, "Change tracker lagged, flagging all paths");
                        tracker.mark_all();
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            tracing::debug!("Change tracker stopped");
        })
    }
}
