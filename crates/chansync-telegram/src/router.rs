//! Update routing: configuration commands in private chats, channel posts and
//! edited channel posts from the mirror pipeline.
//!
//! The Bot API delivers no deletion updates; `EventDispatcher::handle_delete`
//! is the entry point for transports that do (an MTProto session, for
//! instance). Deletions in the source channel are otherwise not observed.

use std::sync::Arc;

use teloxide::{dispatching::Dispatcher, dptree, prelude::*};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use chansync_core::{
    config::Config,
    dispatcher::EventDispatcher,
    domain::{ChatId, MessageId},
    forwarder::Forwarder,
    messaging::types::{
        Button, ButtonAction, ButtonLayout, ChannelPost, MediaKind, MediaRef, PostContent,
    },
    pending::PendingQueue,
    resolver::ReplyResolver,
    store::SyncStore,
};

use crate::handlers;
use crate::TelegramMessenger;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<SyncStore>,
    pub dispatcher: Arc<EventDispatcher>,
    pub messenger: Arc<TelegramMessenger>,
}

pub async fn run_polling(cfg: Arc<Config>) -> anyhow::Result<()> {
    let bot = Bot::new(cfg.telegram_bot_token.clone());

    if let Ok(me) = bot.get_me().await {
        info!("chansync started: @{}", me.username());
    }
    info!("data directory: {}", cfg.data_dir.display());

    let messenger = Arc::new(TelegramMessenger::new(bot.clone()));
    let store = Arc::new(SyncStore::new(&cfg.data_dir));
    let resolver = ReplyResolver::new(
        store.clone(),
        cfg.reply_poll_interval,
        cfg.reply_wait_budget,
    );
    let forwarder = Arc::new(Forwarder::new(store.clone(), messenger.clone(), resolver));
    let pending = Arc::new(PendingQueue::default());
    let shutdown = CancellationToken::new();
    let dispatcher = Arc::new(EventDispatcher::new(
        store.clone(),
        forwarder,
        pending,
        cfg.pending_drain_delay,
        shutdown.clone(),
    ));

    let state = Arc::new(AppState {
        store,
        dispatcher,
        messenger,
    });

    let handler = dptree::entry()
        .branch(Update::filter_message().endpoint(handlers::handle_message))
        .branch(Update::filter_channel_post().endpoint(handle_channel_post))
        .branch(Update::filter_edited_channel_post().endpoint(handle_edited_channel_post));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    // Event intake has stopped; scheduled drains must not fire afterwards.
    shutdown.cancel();
    Ok(())
}

async fn handle_channel_post(msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    let post = to_channel_post(&msg);
    if let Err(e) = state.dispatcher.handle_post(post).await {
        error!("failed to handle channel post {}: {e}", msg.id.0);
    }
    Ok(())
}

async fn handle_edited_channel_post(msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    let post = to_channel_post(&msg);
    if let Err(e) = state.dispatcher.handle_edit(post).await {
        error!("failed to handle edited channel post {}: {e}", msg.id.0);
    }
    Ok(())
}

fn to_channel_post(msg: &Message) -> ChannelPost {
    let text = msg
        .text()
        .or_else(|| msg.caption())
        .unwrap_or_default()
        .to_string();

    // Photos arrive as a size ladder; the last entry is the largest.
    let media = if let Some(sizes) = msg.photo() {
        sizes.last().map(|p| MediaRef {
            kind: MediaKind::Photo,
            file_id: p.file.id.clone(),
        })
    } else {
        msg.document().map(|d| MediaRef {
            kind: MediaKind::Document,
            file_id: d.file.id.clone(),
        })
    };

    let buttons = msg.reply_markup().map(layout_from);

    ChannelPost {
        chat_id: ChatId(msg.chat.id.0),
        message_id: MessageId(msg.id.0),
        content: PostContent {
            text,
            media,
            // The Bot API does not expose the preview state of the inbound
            // post; previews stay enabled on the copies.
            link_preview: true,
            buttons,
        },
        reply_to: msg.reply_to_message().map(|r| MessageId(r.id.0)),
    }
}

fn layout_from(markup: &teloxide::types::InlineKeyboardMarkup) -> ButtonLayout {
    let rows = markup
        .inline_keyboard
        .iter()
        .map(|row| {
            row.iter()
                .filter_map(|b| {
                    let action = match &b.kind {
                        teloxide::types::InlineKeyboardButtonKind::Url(u) => {
                            ButtonAction::Url(u.to_string())
                        }
                        teloxide::types::InlineKeyboardButtonKind::CallbackData(d) => {
                            ButtonAction::Callback(d.clone())
                        }
                        _ => return None,
                    };
                    Some(Button {
                        label: b.text.clone(),
                        action,
                    })
                })
                .collect()
        })
        .collect();
    ButtonLayout { rows }
}
