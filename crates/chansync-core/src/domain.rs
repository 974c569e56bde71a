use serde::{Deserialize, Serialize};

/// Telegram chat id (numeric; supergroups/channels are negative).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChatId(pub i64);

/// Telegram message id (numeric, unique per chat).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub i32);

impl ChatId {
    /// Convert a "short" positive channel id into the signed supergroup/channel
    /// id space by prefixing `-100` (`123456789` -> `-100123456789`).
    ///
    /// Already-signed ids pass through unchanged. Applied both when storing a
    /// newly resolved id and when comparing an incoming event's chat id
    /// against the stored source id, so the two sides always agree.
    pub fn normalized(self) -> Self {
        if self.0 <= 0 {
            return self;
        }
        format!("-100{}", self.0).parse().map(Self).unwrap_or(self)
    }

    /// Key form used in the persisted correspondence record.
    pub fn key(self) -> String {
        self.0.to_string()
    }
}

impl MessageId {
    /// Key form used in the persisted correspondence record.
    pub fn key(self) -> String {
        self.0.to_string()
    }
}

impl std::fmt::Display for ChatId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_channel_id_gets_supergroup_prefix() {
        assert_eq!(ChatId(123456789).normalized(), ChatId(-100123456789));
    }

    #[test]
    fn signed_ids_pass_through() {
        assert_eq!(ChatId(-100123456789).normalized(), ChatId(-100123456789));
        assert_eq!(ChatId(-42).normalized(), ChatId(-42));
        assert_eq!(ChatId(0).normalized(), ChatId(0));
    }

    #[test]
    fn stored_short_id_matches_incoming_event_chat_id() {
        // A config record may carry `123456789`; events arrive as `-100123456789`.
        let stored = ChatId(123456789).normalized();
        let incoming = ChatId(-100123456789);
        assert_eq!(stored, incoming);
    }
}
