//! Fan-out of creates, edits and deletes to every target channel, plus the
//! bookkeeping of the source-to-target message correspondence.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::{
    domain::{ChatId, MessageId},
    messaging::{port::MessengerPort, types::ChannelPost},
    resolver::ReplyResolver,
    store::{SyncStore, TargetMap},
    Result,
};

/// State machine per source message: unmapped -> mapped (first successful
/// create) -> absent (delete). Edits never change state.
pub struct Forwarder {
    store: Arc<SyncStore>,
    messenger: Arc<dyn MessengerPort>,
    resolver: ReplyResolver,
    /// Serializes every read-modify-write of the correspondence record so two
    /// concurrent mutations cannot interleave against the shared file.
    map_lock: Mutex<()>,
}

impl Forwarder {
    pub fn new(
        store: Arc<SyncStore>,
        messenger: Arc<dyn MessengerPort>,
        resolver: ReplyResolver,
    ) -> Self {
        Self {
            store,
            messenger,
            resolver,
            map_lock: Mutex::new(()),
        }
    }

    /// Forward a new post to every target and record the resulting ids.
    ///
    /// Per-target failures are logged and skipped; the stored entry contains
    /// only the targets that succeeded. At most one entry is ever created per
    /// source message id, and none at all when every target fails.
    pub async fn create(&self, post: &ChannelPost, targets: &[ChatId]) -> Result<()> {
        let parent_map = match post.reply_to {
            Some(parent) => self.resolver.resolve(parent).await,
            None => None,
        };

        let mut forwarded = TargetMap::new();
        for &target in targets {
            let reply_to = parent_map
                .as_ref()
                .and_then(|entry| entry.get(&target.key()))
                .copied();

            match self.messenger.send(target, &post.content, reply_to).await {
                Ok(new_id) => {
                    info!(
                        "forwarded message {} to {target} as {new_id}",
                        post.message_id
                    );
                    forwarded.insert(target.key(), new_id);
                }
                Err(e) => warn!(
                    "failed to forward message {} to {target}: {e}",
                    post.message_id
                ),
            }
        }

        if forwarded.is_empty() {
            return Ok(());
        }

        let _guard = self.map_lock.lock().await;
        let mut map = self.store.load_map()?;
        map.insert(post.message_id.key(), forwarded);
        self.store.save_map(&map)
    }

    /// Propagate an edit to every mapped copy.
    ///
    /// A full edit (text + media + preview + buttons) is attempted first; on
    /// failure a text-only edit is tried before the target is given up on.
    /// An absent mapping means the message was never forwarded: no-op.
    pub async fn edit(&self, post: &ChannelPost) -> Result<()> {
        let entry = {
            let _guard = self.map_lock.lock().await;
            self.store.load_map()?.get(&post.message_id.key()).cloned()
        };
        let Some(entry) = entry else {
            debug!("no mapping for edited message {}, nothing to do", post.message_id);
            return Ok(());
        };

        for (target_key, forwarded_id) in &entry {
            let Some(target) = parse_target(target_key) else {
                warn!("malformed target key `{target_key}` in correspondence record");
                continue;
            };

            if let Err(e) = self.messenger.edit(target, *forwarded_id, &post.content).await {
                warn!(
                    "full edit of {forwarded_id} in {target} failed ({e}), retrying text-only"
                );
                if let Err(e) = self
                    .messenger
                    .edit_text_only(target, *forwarded_id, &post.content)
                    .await
                {
                    warn!("text-only edit of {forwarded_id} in {target} failed: {e}");
                }
            }
        }
        Ok(())
    }

    /// Delete the mapped copies of each source id and drop its entry.
    ///
    /// Entry removal is atomic with the delete fan-out: the whole per-id
    /// sequence runs under the correspondence lock. Per-target failures are
    /// logged and do not keep the entry alive.
    pub async fn delete(&self, source_ids: &[MessageId]) -> Result<()> {
        for &source_id in source_ids {
            let _guard = self.map_lock.lock().await;
            let mut map = self.store.load_map()?;
            let Some(entry) = map.remove(&source_id.key()) else {
                debug!("no mapping for deleted message {source_id}, nothing to do");
                continue;
            };

            for (target_key, forwarded_id) in &entry {
                let Some(target) = parse_target(target_key) else {
                    warn!("malformed target key `{target_key}` in correspondence record");
                    continue;
                };
                match self.messenger.delete(target, &[*forwarded_id]).await {
                    Ok(()) => info!("deleted forwarded message {forwarded_id} in {target}"),
                    Err(e) => {
                        warn!("failed to delete message {forwarded_id} in {target}: {e}")
                    }
                }
            }

            self.store.save_map(&map)?;
            info!("removed message mapping for {source_id}");
        }
        Ok(())
    }
}

fn parse_target(key: &str) -> Option<ChatId> {
    key.parse().ok().map(ChatId)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::messaging::types::{EntityInfo, PostContent};
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::sync::Mutex as StdMutex;
    use std::time::Duration;
    use tempfile::TempDir;

    use crate::Error;

    #[derive(Clone, Debug, PartialEq, Eq)]
    pub(crate) struct SentRecord {
        pub target: ChatId,
        pub text: String,
        pub reply_to: Option<MessageId>,
    }

    #[derive(Default)]
    pub(crate) struct FakeMessenger {
        next_id: StdMutex<i32>,
        pub sent: StdMutex<Vec<SentRecord>>,
        pub edited: StdMutex<Vec<(ChatId, MessageId, String)>>,
        pub edited_text_only: StdMutex<Vec<(ChatId, MessageId)>>,
        pub deleted: StdMutex<Vec<(ChatId, MessageId)>>,
        pub fail_targets: StdMutex<HashSet<i64>>,
        pub fail_full_edit: StdMutex<bool>,
    }

    impl FakeMessenger {
        pub fn fail_target(&self, target: ChatId) {
            self.fail_targets.lock().unwrap().insert(target.0);
        }

        fn check_target(&self, target: ChatId) -> Result<()> {
            if self.fail_targets.lock().unwrap().contains(&target.0) {
                return Err(Error::External(format!("target {target} unavailable")));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl MessengerPort for FakeMessenger {
        async fn send(
            &self,
            target: ChatId,
            content: &PostContent,
            reply_to: Option<MessageId>,
        ) -> Result<MessageId> {
            self.check_target(target)?;
            let mut next = self.next_id.lock().unwrap();
            *next += 1;
            self.sent.lock().unwrap().push(SentRecord {
                target,
                text: content.text.clone(),
                reply_to,
            });
            Ok(MessageId(*next))
        }

        async fn edit(&self, target: ChatId, id: MessageId, content: &PostContent) -> Result<()> {
            self.check_target(target)?;
            if *self.fail_full_edit.lock().unwrap() {
                return Err(Error::External("media edit rejected".to_string()));
            }
            self.edited
                .lock()
                .unwrap()
                .push((target, id, content.text.clone()));
            Ok(())
        }

        async fn edit_text_only(
            &self,
            target: ChatId,
            id: MessageId,
            _content: &PostContent,
        ) -> Result<()> {
            self.check_target(target)?;
            self.edited_text_only.lock().unwrap().push((target, id));
            Ok(())
        }

        async fn delete(&self, target: ChatId, ids: &[MessageId]) -> Result<()> {
            self.check_target(target)?;
            let mut deleted = self.deleted.lock().unwrap();
            for id in ids {
                deleted.push((target, *id));
            }
            Ok(())
        }

        async fn resolve_entity(&self, reference: &str) -> Result<EntityInfo> {
            Err(Error::Resolution {
                input: reference.to_string(),
                reason: "not implemented in fake".to_string(),
            })
        }
    }

    pub(crate) fn post(id: i32, text: &str, reply_to: Option<i32>) -> ChannelPost {
        ChannelPost {
            chat_id: ChatId(-100111),
            message_id: MessageId(id),
            content: PostContent {
                text: text.to_string(),
                ..Default::default()
            },
            reply_to: reply_to.map(MessageId),
        }
    }

    fn forwarder(dir: &TempDir, messenger: Arc<FakeMessenger>) -> Forwarder {
        let store = Arc::new(SyncStore::new(dir.path()));
        let resolver = ReplyResolver::new(
            store.clone(),
            Duration::from_millis(10),
            Duration::from_millis(50),
        );
        Forwarder::new(store, messenger, resolver)
    }

    const T1: ChatId = ChatId(-100222);
    const T2: ChatId = ChatId(-100333);

    #[tokio::test]
    async fn create_maps_every_successful_target() {
        let dir = TempDir::new().unwrap();
        let messenger = Arc::new(FakeMessenger::default());
        let fwd = forwarder(&dir, messenger.clone());

        fwd.create(&post(1, "hello", None), &[T1, T2]).await.unwrap();

        let map = fwd.store.load_map().unwrap();
        let entry = &map[&MessageId(1).key()];
        assert_eq!(entry.len(), 2);
        assert!(entry.contains_key(&T1.key()));
        assert!(entry.contains_key(&T2.key()));
        assert_eq!(messenger.sent.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn create_keeps_only_succeeding_targets() {
        let dir = TempDir::new().unwrap();
        let messenger = Arc::new(FakeMessenger::default());
        messenger.fail_target(T2);
        let fwd = forwarder(&dir, messenger.clone());

        fwd.create(&post(1, "hello", None), &[T1, T2]).await.unwrap();

        let map = fwd.store.load_map().unwrap();
        let entry = &map[&MessageId(1).key()];
        assert_eq!(entry.len(), 1);
        assert!(entry.contains_key(&T1.key()));

        // A later delete of that source id only touches the mapped target.
        fwd.delete(&[MessageId(1)]).await.unwrap();
        let deleted = messenger.deleted.lock().unwrap().clone();
        assert_eq!(deleted.len(), 1);
        assert_eq!(deleted[0].0, T1);
    }

    #[tokio::test]
    async fn create_with_no_successes_stores_no_entry() {
        let dir = TempDir::new().unwrap();
        let messenger = Arc::new(FakeMessenger::default());
        messenger.fail_target(T1);
        messenger.fail_target(T2);
        let fwd = forwarder(&dir, messenger);

        fwd.create(&post(1, "hello", None), &[T1, T2]).await.unwrap();
        assert!(fwd.store.load_map().unwrap().is_empty());
    }

    #[tokio::test]
    async fn replies_carry_mapped_parent_ids_per_target() {
        let dir = TempDir::new().unwrap();
        let messenger = Arc::new(FakeMessenger::default());
        let fwd = forwarder(&dir, messenger.clone());

        fwd.create(&post(1, "parent", None), &[T1, T2]).await.unwrap();
        let parents = fwd.store.load_map().unwrap()[&MessageId(1).key()].clone();

        fwd.create(&post(2, "child", Some(1)), &[T1, T2]).await.unwrap();

        let sent = messenger.sent.lock().unwrap().clone();
        for record in sent.iter().filter(|r| r.text == "child") {
            assert_eq!(record.reply_to, Some(parents[&record.target.key()]));
        }
    }

    #[tokio::test]
    async fn reply_with_unmapped_parent_sends_without_reference_after_wait() {
        let dir = TempDir::new().unwrap();
        let messenger = Arc::new(FakeMessenger::default());
        let fwd = forwarder(&dir, messenger.clone());

        fwd.create(&post(2, "orphan", Some(99)), &[T1]).await.unwrap();

        let sent = messenger.sent.lock().unwrap().clone();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].reply_to, None);
        assert!(fwd
            .store
            .load_map()
            .unwrap()
            .contains_key(&MessageId(2).key()));
    }

    #[tokio::test]
    async fn edit_updates_every_copy_in_place() {
        let dir = TempDir::new().unwrap();
        let messenger = Arc::new(FakeMessenger::default());
        let fwd = forwarder(&dir, messenger.clone());

        fwd.create(&post(1, "v1", None), &[T1, T2]).await.unwrap();
        fwd.edit(&post(1, "v2", None)).await.unwrap();

        let edited = messenger.edited.lock().unwrap().clone();
        assert_eq!(edited.len(), 2);
        assert!(edited.iter().all(|(_, _, text)| text == "v2"));
        // Mapping is unchanged by edits.
        assert_eq!(fwd.store.load_map().unwrap()[&MessageId(1).key()].len(), 2);
    }

    #[tokio::test]
    async fn edit_of_unmapped_message_is_noop() {
        let dir = TempDir::new().unwrap();
        let messenger = Arc::new(FakeMessenger::default());
        let fwd = forwarder(&dir, messenger.clone());

        fwd.edit(&post(7, "ghost", None)).await.unwrap();
        assert!(messenger.edited.lock().unwrap().is_empty());
        assert!(messenger.edited_text_only.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn edit_falls_back_to_text_only() {
        let dir = TempDir::new().unwrap();
        let messenger = Arc::new(FakeMessenger::default());
        let fwd = forwarder(&dir, messenger.clone());

        fwd.create(&post(1, "v1", None), &[T1]).await.unwrap();
        *messenger.fail_full_edit.lock().unwrap() = true;
        fwd.edit(&post(1, "v2", None)).await.unwrap();

        assert!(messenger.edited.lock().unwrap().is_empty());
        assert_eq!(messenger.edited_text_only.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn delete_removes_entry_and_all_copies() {
        let dir = TempDir::new().unwrap();
        let messenger = Arc::new(FakeMessenger::default());
        let fwd = forwarder(&dir, messenger.clone());

        fwd.create(&post(1, "hello", None), &[T1, T2]).await.unwrap();
        fwd.delete(&[MessageId(1)]).await.unwrap();

        assert!(fwd.store.load_map().unwrap().is_empty());
        assert_eq!(messenger.deleted.lock().unwrap().len(), 2);

        // Subsequent edit/delete of the same id are no-ops.
        fwd.edit(&post(1, "late", None)).await.unwrap();
        fwd.delete(&[MessageId(1)]).await.unwrap();
        assert!(messenger.edited.lock().unwrap().is_empty());
        assert_eq!(messenger.deleted.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn delete_batch_skips_unknown_ids() {
        let dir = TempDir::new().unwrap();
        let messenger = Arc::new(FakeMessenger::default());
        let fwd = forwarder(&dir, messenger.clone());

        fwd.create(&post(1, "hello", None), &[T1]).await.unwrap();
        fwd.delete(&[MessageId(99), MessageId(1)]).await.unwrap();

        assert!(fwd.store.load_map().unwrap().is_empty());
        assert_eq!(messenger.deleted.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn delete_drops_entry_even_when_target_delete_fails() {
        let dir = TempDir::new().unwrap();
        let messenger = Arc::new(FakeMessenger::default());
        let fwd = forwarder(&dir, messenger.clone());

        fwd.create(&post(1, "hello", None), &[T1, T2]).await.unwrap();
        messenger.fail_target(T2);
        fwd.delete(&[MessageId(1)]).await.unwrap();

        assert!(fwd.store.load_map().unwrap().is_empty());
    }
}
