//! Change events published by a [`Crawler`](crate::Crawler).

use std::sync::mpsc;

/// Kind of filesystem change.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChangeKind {
    Created,
    Modified,
    /// Deletion is delivered like any other update.
    Removed,
}

/// A change to one tracked path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChangeEvent {
    /// Tracked path (directories end with `/`).
    pub path: String,
    pub kind: ChangeKind,
}

impl ChangeEvent {
    pub fn new(path: impl Into<String>, kind: ChangeKind) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }
}

/// Handle to stop watching for changes.
///
/// Dropping the handle stops the watcher thread: the thread polls a channel
/// whose only sender lives here.
pub struct WatchHandle {
    _shutdown: Option<mpsc::Sender<()>>,
}

impl WatchHandle {
    pub(crate) fn new(shutdown: mpsc::Sender<()>) -> Self {
        Self {
            _shutdown: Some(shutdown),
        }
    }

    /// Stop watching immediately (consumes the handle).
    pub fn stop(mut self) {
        self._shutdown.take();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_watch_handle_drop_closes_channel() {
        let (tx, rx) = mpsc::channel();
        let handle = WatchHandle::new(tx);
        drop(handle);
        assert!(rx.recv().is_err());
    }

    #[test]
    fn test_watch_handle_stop_closes_channel() {
        let (tx, rx) = mpsc::channel::<()>();
        WatchHandle::new(tx).stop();
        assert_eq!(
            rx.recv_timeout(std::time::Duration::from_millis(10)),
            Err(mpsc::RecvTimeoutError::Disconnected)
        );
    }

    #[test]
    fn test_event_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ChangeEvent>();
        assert_send_sync::<WatchHandle>();
    }
}
