use std::sync::Arc;

use teloxide::prelude::*;
use tracing::warn;

use chansync_core::{
    domain::ChatId,
    messaging::{port::MessengerPort, types::EntityInfo},
    Result,
};

use crate::router::AppState;

pub async fn handle_command(bot: Bot, msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    let (cmd, args) = parse_command(msg.text().unwrap_or_default());

    let reply = match cmd.as_str() {
        "start" => start_text(),
        "set_source" => set_source(&state, &args).await,
        "add_target" => add_target(&state, &args).await,
        "remove_target" => remove_target(&state, &args).await,
        "list_channels" => list_channels(&state).await,
        _ => return Ok(()),
    };

    bot.send_message(msg.chat.id, reply).await?;
    Ok(())
}

fn parse_command(text: &str) -> (String, String) {
    // Telegram may send `/cmd@botname arg1 ...`
    let mut parts = text.trim().splitn(2, char::is_whitespace);
    let first = parts.next().unwrap_or("").trim();
    let rest = parts.next().unwrap_or("").trim().to_string();

    let cmd = first
        .trim_start_matches('/')
        .split('@')
        .next()
        .unwrap_or("")
        .to_lowercase();

    (cmd, rest)
}

fn start_text() -> String {
    "Channel sync bot\n\n\
     Mirrors posts from one source channel to a set of target channels,\n\
     propagating edits and deletions and preserving reply threads.\n\n\
     Commands:\n\
     /set_source <channel> - set the source channel\n\
     /add_target <channel> - add a target channel\n\
     /remove_target <channel> - remove a target channel\n\
     /list_channels - show the current configuration\n\n\
     A channel can be given as a numeric id, @username or t.me link.\n\n\
     Example:\n\
     /set_source @source_channel\n\
     /add_target @target_channel"
        .to_string()
}

async fn set_source(state: &AppState, args: &str) -> String {
    if args.is_empty() {
        return "Usage:\n/set_source @channel_name\n/set_source https://t.me/channel_name\n/set_source -1001234567890".to_string();
    }

    let info = match resolve_channel(state, args).await {
        Ok(info) => info,
        Err(e) => return format!("Source channel not found.\n\n{e}"),
    };

    let saved = (|| -> Result<()> {
        let mut config = state.store.load_config()?;
        config.source_channel = Some(info.id);
        state.store.save_config(&config)
    })();
    if let Err(e) = saved {
        return format!("Failed to save configuration: {e}");
    }

    format!(
        "Source channel set.\n\nChannel: {}\nID: {}\n\nNow add target channels with /add_target",
        info.display_name(),
        info.id
    )
}

async fn add_target(state: &AppState, args: &str) -> String {
    if args.is_empty() {
        return "Usage:\n/add_target @channel_name\n/add_target https://t.me/channel_name"
            .to_string();
    }

    let info = match resolve_channel(state, args).await {
        Ok(info) => info,
        Err(e) => return format!("Target channel not found.\n\n{e}"),
    };

    let added = (|| -> Result<(bool, usize)> {
        let mut config = state.store.load_config()?;
        let added = config.add_target(info.id);
        if added {
            state.store.save_config(&config)?;
        }
        Ok((added, config.target_channels.len()))
    })();

    match added {
        Ok((true, total)) => format!(
            "Target channel added.\n\nChannel: {}\nID: {}\n\nTotal targets: {total}",
            info.display_name(),
            info.id
        ),
        Ok((false, _)) => format!(
            "This channel is already in the target list.\n\nChannel: {}\nID: {}",
            info.display_name(),
            info.id
        ),
        Err(e) => format!("Failed to save configuration: {e}"),
    }
}

async fn remove_target(state: &AppState, args: &str) -> String {
    if args.is_empty() {
        return "Usage:\n/remove_target @channel_name".to_string();
    }

    let info = match resolve_channel(state, args).await {
        Ok(info) => info,
        Err(e) => return format!("Target channel not found.\n\n{e}"),
    };

    let removed = (|| -> Result<(bool, usize)> {
        let mut config = state.store.load_config()?;
        let removed = config.remove_target(info.id);
        if removed {
            state.store.save_config(&config)?;
        }
        Ok((removed, config.target_channels.len()))
    })();

    match removed {
        Ok((true, left)) => format!(
            "Target channel removed.\n\nChannel: {}\nID: {}\n\nRemaining targets: {left}",
            info.display_name(),
            info.id
        ),
        Ok((false, _)) => format!(
            "This channel is not in the target list.\n\nChannel: {}\nID: {}",
            info.display_name(),
            info.id
        ),
        Err(e) => format!("Failed to save configuration: {e}"),
    }
}

async fn list_channels(state: &AppState) -> String {
    let config = match state.store.load_config() {
        Ok(config) => config,
        Err(e) => return format!("Failed to load configuration: {e}"),
    };

    let mut out = String::from("Channel configuration\n\n");

    out.push_str("Source channel:\n");
    match config.source_channel {
        None => out.push_str("  (not set)\n\n"),
        Some(id) => {
            let name = channel_name(state, id).await;
            out.push_str(&format!("  {name}\n  ID: {id}\n\n"));
        }
    }

    out.push_str("Target channels:\n");
    if config.target_channels.is_empty() {
        out.push_str("  (none)\n\n");
    } else {
        for (i, &target) in config.target_channels.iter().enumerate() {
            let name = channel_name(state, target).await;
            out.push_str(&format!("  {}. {name}\n     ID: {target}\n", i + 1));
        }
        out.push('\n');
    }

    if config.is_active() {
        out.push_str(&format!(
            "Status: active ({} target channel(s))",
            config.target_channels.len()
        ));
    } else {
        out.push_str("Status: inactive - configure a source and at least one target");
    }
    out
}

async fn resolve_channel(state: &AppState, reference: &str) -> Result<EntityInfo> {
    let info = state.messenger.resolve_entity(reference).await?;
    Ok(EntityInfo {
        id: info.id.normalized(),
        ..info
    })
}

async fn channel_name(state: &AppState, id: ChatId) -> String {
    match state.messenger.resolve_entity(&id.to_string()).await {
        Ok(info) => info.display_name(),
        Err(e) => {
            warn!("failed to resolve channel name for {id}: {e}");
            format!("ID: {id}")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_command_splits_name_and_args() {
        assert_eq!(
            parse_command("/set_source @news"),
            ("set_source".to_string(), "@news".to_string())
        );
        assert_eq!(
            parse_command("/list_channels"),
            ("list_channels".to_string(), String::new())
        );
    }

    #[test]
    fn parse_command_strips_bot_suffix() {
        assert_eq!(
            parse_command("/add_target@chansync_bot t.me/news"),
            ("add_target".to_string(), "t.me/news".to_string())
        );
    }

    #[test]
    fn parse_command_lowercases_the_name() {
        assert_eq!(parse_command("/START").0, "start");
    }
}
