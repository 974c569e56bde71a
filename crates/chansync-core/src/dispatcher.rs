//! Routing of source-channel events to the forwarder or the pending queue.
//!
//! The configuration is loaded fresh for every event, so external edits to
//! the config record between runs (or via the command surface) take effect
//! without a restart.

use std::{sync::Arc, time::Duration};

use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::{
    domain::ChatId,
    forwarder::Forwarder,
    messaging::types::{ChannelPost, DeletedPosts},
    pending::{PendingEntry, PendingQueue},
    store::SyncStore,
    Result,
};

pub struct EventDispatcher {
    store: Arc<SyncStore>,
    forwarder: Arc<Forwarder>,
    pending: Arc<PendingQueue>,
    drain_delay: Duration,
    shutdown: CancellationToken,
}

impl EventDispatcher {
    pub fn new(
        store: Arc<SyncStore>,
        forwarder: Arc<Forwarder>,
        pending: Arc<PendingQueue>,
        drain_delay: Duration,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            store,
            forwarder,
            pending,
            drain_delay,
            shutdown,
        }
    }

    /// Returns the target list when the event should be mirrored, `None` when
    /// the config is inactive or the event is not from the source channel.
    ///
    /// `event_chat` is `None` for deletion events that arrive without a chat
    /// id; those pass the source filter.
    fn routing(&self, event_chat: Option<ChatId>) -> Result<Option<Vec<ChatId>>> {
        let config = self.store.load_config()?;
        let Some(source) = config.source_channel else {
            return Ok(None);
        };
        if config.target_channels.is_empty() {
            return Ok(None);
        }

        if let Some(chat) = event_chat {
            if chat != source.normalized() {
                return Ok(None);
            }
        }
        Ok(Some(config.target_channels))
    }

    /// A new post in the source channel.
    ///
    /// A reply whose parent has no correspondence entry yet is parked in the
    /// pending queue with a drain scheduled; everything else is forwarded
    /// immediately.
    pub async fn handle_post(&self, post: ChannelPost) -> Result<()> {
        let Some(targets) = self.routing(Some(post.chat_id))? else {
            return Ok(());
        };

        if let Some(parent) = post.reply_to {
            let map = self.store.load_map()?;
            if !map.contains_key(&parent.key()) {
                info!(
                    "message {} queued, waiting for reply mapping of {parent}",
                    post.message_id
                );
                self.pending
                    .enqueue(PendingEntry {
                        post,
                        targets,
                        parent_id: parent,
                    })
                    .await;
                self.pending.schedule_drain(
                    self.forwarder.clone(),
                    self.drain_delay,
                    self.shutdown.clone(),
                );
                return Ok(());
            }
        }

        self.forwarder.create(&post, &targets).await
    }

    /// An edit of a source-channel post.
    pub async fn handle_edit(&self, post: ChannelPost) -> Result<()> {
        if self.routing(Some(post.chat_id))?.is_none() {
            return Ok(());
        }
        self.forwarder.edit(&post).await
    }

    /// A deletion batch from the source channel.
    pub async fn handle_delete(&self, deleted: DeletedPosts) -> Result<()> {
        if self.routing(deleted.chat_id)?.is_none() {
            return Ok(());
        }
        self.forwarder.delete(&deleted.message_ids).await
    }
}
