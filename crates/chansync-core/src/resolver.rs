//! Reply-parent resolution against the correspondence record.
//!
//! Bridges the forward-order race: a reply to a very recent parent may be
//! processed before the parent's own forward completes and is persisted, so
//! an absent entry is polled for a bounded window before giving up.

use std::{sync::Arc, time::Duration};

use tokio::time::{sleep, Instant};
use tracing::{debug, warn};

use crate::{
    domain::MessageId,
    store::{SyncStore, TargetMap},
};

pub struct ReplyResolver {
    store: Arc<SyncStore>,
    poll_interval: Duration,
    wait_budget: Duration,
}

impl ReplyResolver {
    pub fn new(store: Arc<SyncStore>, poll_interval: Duration, wait_budget: Duration) -> Self {
        Self {
            store,
            poll_interval,
            wait_budget,
        }
    }

    /// Look up the per-target forwarded ids of `source_parent_id`.
    ///
    /// If the entry is not yet present, re-reads the store at a fixed interval
    /// until the wait budget elapses, then returns `None`. Each caller polls
    /// independently; there is no shared wait per parent id.
    pub async fn resolve(&self, source_parent_id: MessageId) -> Option<TargetMap> {
        let key = source_parent_id.key();
        let deadline = Instant::now() + self.wait_budget;

        loop {
            match self.store.load_map() {
                Ok(map) => {
                    if let Some(entry) = map.get(&key) {
                        return Some(entry.clone());
                    }
                }
                Err(e) => warn!("correspondence read failed while resolving reply: {e}"),
            }

            if Instant::now() >= deadline {
                debug!("no mapping for reply parent {source_parent_id} within wait budget");
                return None;
            }
            sleep(self.poll_interval).await;
        }
    }
}
