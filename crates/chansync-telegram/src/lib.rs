//! Telegram adapter (teloxide).
//!
//! This crate implements the `chansync-core` MessengerPort over the Telegram
//! Bot API.

use async_trait::async_trait;

use teloxide::{
    prelude::*,
    types::{
        InlineKeyboardButton, InlineKeyboardMarkup, InputFile, InputMedia, InputMediaDocument,
        InputMediaPhoto, ParseMode, Recipient,
    },
};

use tokio::time::sleep;

pub mod handlers;
pub mod router;

use chansync_core::{
    domain::{ChatId, MessageId},
    errors::Error,
    messaging::{
        port::MessengerPort,
        types::{ButtonAction, ButtonLayout, EntityInfo, MediaKind, PostContent},
    },
    Result,
};

#[derive(Clone)]
pub struct TelegramMessenger {
    bot: Bot,
}

impl TelegramMessenger {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }

    pub fn bot(&self) -> Bot {
        self.bot.clone()
    }

    fn tg_chat(chat_id: ChatId) -> teloxide::types::ChatId {
        teloxide::types::ChatId(chat_id.0)
    }

    fn tg_msg_id(message_id: MessageId) -> teloxide::types::MessageId {
        teloxide::types::MessageId(message_id.0)
    }

    fn map_err(e: teloxide::RequestError) -> Error {
        Error::External(format!("telegram error: {e}"))
    }

    async fn with_retry<T, Fut>(&self, mut op: impl FnMut() -> Fut) -> Result<T>
    where
        Fut: std::future::IntoFuture<Output = std::result::Result<T, teloxide::RequestError>>,
        Fut::IntoFuture: Send,
    {
        const MAX_RETRIES: usize = 1;
        let mut attempts = 0usize;
        loop {
            match op().await {
                Ok(v) => return Ok(v),
                Err(e) => match e {
                    teloxide::RequestError::RetryAfter(d) if attempts < MAX_RETRIES => {
                        attempts += 1;
                        sleep(d).await;
                        continue;
                    }
                    other => return Err(Self::map_err(other)),
                },
            }
        }
    }
}

fn markup_from(layout: &ButtonLayout) -> InlineKeyboardMarkup {
    let rows = layout.rows.iter().map(|row| {
        row.iter()
            .filter_map(|button| match &button.action {
                ButtonAction::Url(raw) => url::Url::parse(raw)
                    .ok()
                    .map(|u| InlineKeyboardButton::url(button.label.clone(), u)),
                ButtonAction::Callback(data) => Some(InlineKeyboardButton::callback(
                    button.label.clone(),
                    data.clone(),
                )),
            })
            .collect::<Vec<_>>()
    });
    InlineKeyboardMarkup::new(rows)
}

fn input_media_from(content: &PostContent) -> Option<InputMedia> {
    let media = content.media.as_ref()?;
    let file = InputFile::file_id(media.file_id.clone());
    Some(match media.kind {
        MediaKind::Photo => InputMedia::Photo(
            InputMediaPhoto::new(file)
                .caption(content.text.clone())
                .parse_mode(ParseMode::Html),
        ),
        MediaKind::Document => InputMedia::Document(
            InputMediaDocument::new(file)
                .caption(content.text.clone())
                .parse_mode(ParseMode::Html),
        ),
    })
}

/// Extract a channel username from a `@name` or `t.me/name` reference.
fn username_from_ref(reference: &str) -> Option<String> {
    let stripped = reference
        .strip_prefix("https://t.me/")
        .or_else(|| reference.strip_prefix("http://t.me/"))
        .or_else(|| reference.strip_prefix("t.me/"))
        .unwrap_or(reference);
    let name = stripped.strip_prefix('@').unwrap_or(stripped);
    let name = name.split(['/', '?']).next().unwrap_or("");

    if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return None;
    }
    Some(name.to_string())
}

#[async_trait]
impl MessengerPort for TelegramMessenger {
    async fn send(
        &self,
        target: ChatId,
        content: &PostContent,
        reply_to: Option<MessageId>,
    ) -> Result<MessageId> {
        let chat = Self::tg_chat(target);
        let markup = content.buttons.as_ref().map(markup_from);
        let reply_to = reply_to.map(Self::tg_msg_id);

        let msg = match &content.media {
            Some(media) => {
                let file = InputFile::file_id(media.file_id.clone());
                match media.kind {
                    MediaKind::Photo => {
                        self.with_retry(|| {
                            let mut req = self
                                .bot
                                .send_photo(chat, file.clone())
                                .caption(content.text.clone())
                                .parse_mode(ParseMode::Html);
                            if let Some(id) = reply_to {
                                req = req.reply_to_message_id(id);
                            }
                            if let Some(markup) = markup.clone() {
                                req = req.reply_markup(markup);
                            }
                            req
                        })
                        .await?
                    }
                    MediaKind::Document => {
                        self.with_retry(|| {
                            let mut req = self
                                .bot
                                .send_document(chat, file.clone())
                                .caption(content.text.clone())
                                .parse_mode(ParseMode::Html);
                            if let Some(id) = reply_to {
                                req = req.reply_to_message_id(id);
                            }
                            if let Some(markup) = markup.clone() {
                                req = req.reply_markup(markup);
                            }
                            req
                        })
                        .await?
                    }
                }
            }
            None => {
                self.with_retry(|| {
                    let mut req = self
                        .bot
                        .send_message(chat, content.text.clone())
                        .parse_mode(ParseMode::Html)
                        .disable_web_page_preview(!content.link_preview);
                    if let Some(id) = reply_to {
                        req = req.reply_to_message_id(id);
                    }
                    if let Some(markup) = markup.clone() {
                        req = req.reply_markup(markup);
                    }
                    req
                })
                .await?
            }
        };

        Ok(MessageId(msg.id.0))
    }

    async fn edit(&self, target: ChatId, id: MessageId, content: &PostContent) -> Result<()> {
        let chat = Self::tg_chat(target);
        let msg_id = Self::tg_msg_id(id);
        let markup = content.buttons.as_ref().map(markup_from);

        match input_media_from(content) {
            Some(media) => {
                self.with_retry(|| {
                    let mut req = self.bot.edit_message_media(chat, msg_id, media.clone());
                    if let Some(markup) = markup.clone() {
                        req = req.reply_markup(markup);
                    }
                    req
                })
                .await?;
            }
            None => {
                self.with_retry(|| {
                    let mut req = self
                        .bot
                        .edit_message_text(chat, msg_id, content.text.clone())
                        .parse_mode(ParseMode::Html)
                        .disable_web_page_preview(!content.link_preview);
                    if let Some(markup) = markup.clone() {
                        req = req.reply_markup(markup);
                    }
                    req
                })
                .await?;
            }
        }
        Ok(())
    }

    async fn edit_text_only(
        &self,
        target: ChatId,
        id: MessageId,
        content: &PostContent,
    ) -> Result<()> {
        let chat = Self::tg_chat(target);
        let msg_id = Self::tg_msg_id(id);

        // Media posts carry their text as a caption, plain posts as text.
        if content.media.is_some() {
            self.with_retry(|| {
                self.bot
                    .edit_message_caption(chat, msg_id)
                    .caption(content.text.clone())
                    .parse_mode(ParseMode::Html)
            })
            .await?;
        } else {
            self.with_retry(|| {
                self.bot
                    .edit_message_text(chat, msg_id, content.text.clone())
                    .parse_mode(ParseMode::Html)
            })
            .await?;
        }
        Ok(())
    }

    async fn delete(&self, target: ChatId, ids: &[MessageId]) -> Result<()> {
        let chat = Self::tg_chat(target);
        for &id in ids {
            self.with_retry(|| self.bot.delete_message(chat, Self::tg_msg_id(id)))
                .await?;
        }
        Ok(())
    }

    async fn resolve_entity(&self, reference: &str) -> Result<EntityInfo> {
        let reference = reference.trim();

        if let Ok(raw) = reference.parse::<i64>() {
            // Numeric references resolve structurally; the chat lookup only
            // enriches the display name and may fail for chats the bot
            // cannot see.
            let id = ChatId(raw).normalized();
            return Ok(match self.bot.get_chat(Self::tg_chat(id)).await {
                Ok(chat) => EntityInfo {
                    id,
                    title: chat.title().map(str::to_string),
                    username: chat.username().map(str::to_string),
                },
                Err(_) => EntityInfo {
                    id,
                    title: None,
                    username: None,
                },
            });
        }

        let Some(username) = username_from_ref(reference) else {
            return Err(Error::Resolution {
                input: reference.to_string(),
                reason: "expected a numeric id, @username or t.me link".to_string(),
            });
        };

        let chat = self
            .bot
            .get_chat(Recipient::ChannelUsername(format!("@{username}")))
            .await
            .map_err(|e| Error::Resolution {
                input: reference.to_string(),
                reason: e.to_string(),
            })?;

        Ok(EntityInfo {
            id: ChatId(chat.id.0),
            title: chat.title().map(str::to_string),
            username: chat.username().map(str::to_string),
        })
    }
}
