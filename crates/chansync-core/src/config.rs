use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{errors::Error, Result};

/// Typed runtime configuration, loaded from the environment (with `.env`
/// support). The channel configuration itself lives in the persistent store,
/// not here.
#[derive(Clone, Debug)]
pub struct Config {
    pub telegram_bot_token: String,

    /// Directory holding the two persisted records
    /// (`channels.json`, `message_map.json`).
    pub data_dir: PathBuf,

    /// How long a reply waits for its parent's mapping before forwarding
    /// without a reply reference.
    pub reply_wait_budget: Duration,
    /// Poll interval of the reply-mapping wait.
    pub reply_poll_interval: Duration,
    /// Delay between queuing a pending reply and draining the queue.
    pub pending_drain_delay: Duration,
}

impl Config {
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));

        let telegram_bot_token = env_str("TELEGRAM_BOT_TOKEN").unwrap_or_default();
        if telegram_bot_token.trim().is_empty() {
            return Err(Error::Config(
                "TELEGRAM_BOT_TOKEN environment variable is required".to_string(),
            ));
        }

        let data_dir =
            PathBuf::from(env_str("CHANSYNC_DATA_DIR").unwrap_or("/tmp/chansync".to_string()));
        fs::create_dir_all(&data_dir)?;

        let reply_wait_budget =
            Duration::from_millis(env_u64("REPLY_WAIT_BUDGET_MS").unwrap_or(10_000));
        let reply_poll_interval =
            Duration::from_millis(env_u64("REPLY_POLL_INTERVAL_MS").unwrap_or(500));
        let pending_drain_delay =
            Duration::from_millis(env_u64("PENDING_DRAIN_DELAY_MS").unwrap_or(2_000));

        Ok(Self {
            telegram_bot_token,
            data_dir,
            reply_wait_budget,
            reply_poll_interval,
            pending_drain_delay,
        })
    }
}

fn env_str(key: &str) -> Option<String> {
    env::var(key).ok()
}

fn env_u64(key: &str) -> Option<u64> {
    env_str(key).and_then(|v| v.trim().parse().ok())
}

fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((k, v)) = line.split_once('=') else {
            continue;
        };

        let key = k.trim();
        if key.is_empty() {
            continue;
        }
        if env::var_os(key).is_some() {
            continue; // do not override existing env
        }

        let mut value = v.trim();
        if value.len() >= 2
            && ((value.starts_with('"') && value.ends_with('"'))
                || (value.starts_with('\'') && value.ends_with('\'')))
        {
            value = &value[1..value.len() - 1];
        }
        env::set_var(key, value);
    }
}
