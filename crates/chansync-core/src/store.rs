//! Durable records for channel configuration and message-id correspondence.
//!
//! Both records are single JSON documents rewritten in full on every save.
//! There is no in-memory cache: callers load fresh before each use, so the
//! files stay the source of truth across restarts and manual edits between
//! runs. Cross-process writers are unsupported (last writer wins).

use std::{
    collections::HashMap,
    fs, io,
    path::{Path, PathBuf},
};

use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::{
    domain::{ChatId, MessageId},
    Result,
};

const CHANNELS_FILE: &str = "channels.json";
const MESSAGE_MAP_FILE: &str = "message_map.json";

/// Map from target chat id (as text) to the forwarded message id in that target.
pub type TargetMap = HashMap<String, MessageId>;

/// Map from source message id (as text) to its per-target forwarded copies.
///
/// An entry exists iff at least one target copy was successfully created for
/// that source message; absence means "not yet forwarded or forward failed".
pub type Correspondence = HashMap<String, TargetMap>;

/// Source channel + ordered unique target channels.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ChannelConfig {
    pub source_channel: Option<ChatId>,
    pub target_channels: Vec<ChatId>,
}

impl ChannelConfig {
    /// Returns `false` if the channel was already a target.
    pub fn add_target(&mut self, id: ChatId) -> bool {
        if self.target_channels.contains(&id) {
            return false;
        }
        self.target_channels.push(id);
        true
    }

    /// Returns `false` if the channel was not a target.
    pub fn remove_target(&mut self, id: ChatId) -> bool {
        let before = self.target_channels.len();
        self.target_channels.retain(|t| *t != id);
        self.target_channels.len() != before
    }

    /// Mirroring runs only with a source and at least one target configured.
    pub fn is_active(&self) -> bool {
        self.source_channel.is_some() && !self.target_channels.is_empty()
    }
}

/// File-backed store for the two persisted records.
pub struct SyncStore {
    config_path: PathBuf,
    map_path: PathBuf,
}

impl SyncStore {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            config_path: data_dir.join(CHANNELS_FILE),
            map_path: data_dir.join(MESSAGE_MAP_FILE),
        }
    }

    pub fn load_config(&self) -> Result<ChannelConfig> {
        load_or_default(&self.config_path)
    }

    pub fn save_config(&self, config: &ChannelConfig) -> Result<()> {
        write_record(&self.config_path, config)
    }

    pub fn load_map(&self) -> Result<Correspondence> {
        load_or_default(&self.map_path)
    }

    pub fn save_map(&self, map: &Correspondence) -> Result<()> {
        write_record(&self.map_path, map)
    }
}

fn load_or_default<T: DeserializeOwned + Default>(path: &Path) -> Result<T> {
    match fs::read_to_string(path) {
        Ok(text) => Ok(serde_json::from_str(&text)?),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(T::default()),
        Err(e) => Err(e.into()),
    }
}

fn write_record<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, serde_json::to_string_pretty(value)?)?;
    Ok(())
}
