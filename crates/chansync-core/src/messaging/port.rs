use async_trait::async_trait;

use crate::{
    domain::{ChatId, MessageId},
    messaging::types::{EntityInfo, PostContent},
    Result,
};

/// Messenger port.
///
/// Telegram is the first implementation; the shape is narrow enough that other
/// transports with send/edit/delete primitives can fit behind it.
#[async_trait]
pub trait MessengerPort: Send + Sync {
    /// Send `content` to `target`, optionally as a reply to an existing
    /// message in that target. Returns the id of the created message.
    async fn send(
        &self,
        target: ChatId,
        content: &PostContent,
        reply_to: Option<MessageId>,
    ) -> Result<MessageId>;

    /// Full edit: text, media, link preview and button layout.
    async fn edit(&self, target: ChatId, id: MessageId, content: &PostContent) -> Result<()>;

    /// Degraded edit that only touches the text/caption, used as a fallback
    /// when the full edit is rejected.
    async fn edit_text_only(&self, target: ChatId, id: MessageId, content: &PostContent)
        -> Result<()>;

    async fn delete(&self, target: ChatId, ids: &[MessageId]) -> Result<()>;

    /// Resolve a channel reference (numeric id, `@username` or t.me link).
    async fn resolve_entity(&self, reference: &str) -> Result<EntityInfo>;
}
