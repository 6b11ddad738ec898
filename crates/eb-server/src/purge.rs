//! Cache purging on content changes.
//!
//! Any change can move search results, so the whole search cache goes. The
//! content cache is invalidated per path through the change tracker and only
//! purged here when events were lost.

use std::sync::Arc;

use eb_cache::ContentCache;
use eb_site::BlogItem;
use eb_storage::ChangeEvent;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub(crate) fn spawn_purger(
    search_cache: Arc<ContentCache<Vec<String>>>,
    content_cache: Arc<ContentCache<Arc<BlogItem>>>,
    mut events: broadcast::Receiver<ChangeEvent>,
    token: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let received = tokio::select! {
                () = token.cancelled() => break,
                received = events.recv() => received,
            };
            match received {
                Ok(event) => {
                    tracing::debug!(path = %event.path, kind = ?event.kind, "Purging search cache");
                    search_cache.remove_all();
                }
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    tracing::warn!(missed, "Cache purger lagged, purging all caches");
                    search_cache.remove_all();
                    content_cache.remove_all();
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
        tracing::debug!("Cache purger stopped");
    })
}
