use crate::domain::{ChatId, MessageId};

/// Outbound content derived from an inbound post.
///
/// Content is carried through as-is; transforming text or transcoding media
/// is out of scope for the core.
#[derive(Clone, Debug, Default)]
pub struct PostContent {
    pub text: String,
    pub media: Option<MediaRef>,
    pub link_preview: bool,
    pub buttons: Option<ButtonLayout>,
}

/// Reference to an already-uploaded media object, reusable across sends.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MediaRef {
    pub kind: MediaKind,
    pub file_id: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MediaKind {
    Photo,
    Document,
}

/// Inline button rows attached to a post.
#[derive(Clone, Debug, Default)]
pub struct ButtonLayout {
    pub rows: Vec<Vec<Button>>,
}

#[derive(Clone, Debug)]
pub struct Button {
    pub label: String,
    pub action: ButtonAction,
}

#[derive(Clone, Debug)]
pub enum ButtonAction {
    Url(String),
    Callback(String),
}

/// A new or edited post delivered from the event stream.
#[derive(Clone, Debug)]
pub struct ChannelPost {
    pub chat_id: ChatId,
    pub message_id: MessageId,
    pub content: PostContent,
    /// Source-side id of the message this post replies to, if any.
    pub reply_to: Option<MessageId>,
}

/// A deletion event. One event may carry one or many ids; some transports
/// deliver deletions without a chat id.
#[derive(Clone, Debug)]
pub struct DeletedPosts {
    pub chat_id: Option<ChatId>,
    pub message_ids: Vec<MessageId>,
}

/// Resolved channel/chat identity.
#[derive(Clone, Debug)]
pub struct EntityInfo {
    pub id: ChatId,
    pub title: Option<String>,
    pub username: Option<String>,
}

impl EntityInfo {
    /// Best available display name: title, then `@username`, then the raw id.
    pub fn display_name(&self) -> String {
        if let Some(title) = self.title.as_deref().filter(|t| !t.is_empty()) {
            return title.to_string();
        }
        if let Some(username) = self.username.as_deref().filter(|u| !u.is_empty()) {
            return format!("@{username}");
        }
        format!("ID: {}", self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_name_prefers_title_then_username_then_id() {
        let mut info = EntityInfo {
            id: ChatId(-100123),
            title: Some("News".to_string()),
            username: Some("news_feed".to_string()),
        };
        assert_eq!(info.display_name(), "News");

        info.title = None;
        assert_eq!(info.display_name(), "@news_feed");

        info.username = None;
        assert_eq!(info.display_name(), "ID: -100123");
    }
}
