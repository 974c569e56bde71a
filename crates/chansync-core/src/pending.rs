//! Queue for reply posts whose parent mapping was absent at arrival time.
//!
//! Entries are process-local and lost on restart; a post still queued at
//! shutdown is simply dropped. This is a known limitation of the design.

use std::{collections::HashMap, sync::Arc, time::Duration};

use tokio::sync::Mutex;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::{
    domain::{ChatId, MessageId},
    forwarder::Forwarder,
    messaging::types::ChannelPost,
};

/// A reply post parked until its parent has (hopefully) been forwarded.
pub struct PendingEntry {
    pub post: ChannelPost,
    pub targets: Vec<ChatId>,
    /// Source-side id the post is waiting to reply onto.
    pub parent_id: MessageId,
}

#[derive(Default)]
pub struct PendingQueue {
    entries: Mutex<HashMap<i32, PendingEntry>>,
}

impl PendingQueue {
    pub async fn enqueue(&self, entry: PendingEntry) {
        let mut entries = self.entries.lock().await;
        entries.insert(entry.post.message_id.0, entry);
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    /// Forward every currently queued entry and consume it.
    ///
    /// The queue is snapshotted and cleared first, so arrivals during the
    /// drain are neither lost nor double-processed. Each entry is forwarded
    /// best-effort: the forwarder's own reply resolution (with its bounded
    /// wait) runs, and if the parent still is not mapped the post goes out
    /// without a reply reference. Nothing is re-queued. Draining an empty
    /// queue is a no-op.
    pub async fn drain(&self, forwarder: &Forwarder) {
        let snapshot = {
            let mut entries = self.entries.lock().await;
            std::mem::take(&mut *entries)
        };
        if snapshot.is_empty() {
            return;
        }

        info!("draining {} pending message(s)", snapshot.len());
        for (source_id, entry) in snapshot {
            if let Err(e) = forwarder.create(&entry.post, &entry.targets).await {
                warn!("failed to forward pending message {source_id}: {e}");
            }
        }
    }

    /// Spawn a drain after `delay`, the heuristic guess that the parent will
    /// have been forwarded by then. Cancelled entirely on shutdown; drains
    /// are idempotent, so a double schedule is harmless.
    pub fn schedule_drain(
        self: &Arc<Self>,
        forwarder: Arc<Forwarder>,
        delay: Duration,
        shutdown: CancellationToken,
    ) {
        let queue = Arc::clone(self);
        tokio::spawn(async move {
            tokio::select! {
                _ = shutdown.cancelled() => {}
                _ = sleep(delay) => queue.drain(&forwarder).await,
            }
        });
    }
}
