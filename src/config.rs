//! Game configuration loaded from ~/.keyfall/config.yaml.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::judge::DEFAULT_HIT_WINDOW;
use crate::note::{KeyMap, DEFAULT_KEY_COUNT};
use crate::scheduler::{DEFAULT_FINISH_GRACE, DEFAULT_LOOK_AHEAD, DEFAULT_SEEK_EPSILON};
use crate::session::SessionSettings;
use crate::synth::DEFAULT_BASE_GAIN;

/// Backend used for key polling and score submission when none is configured.
pub const DEFAULT_BACKEND_URL: &str = "http://192.168.15.12:5000";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("config yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Every field has a default, so a partial file (or none at all) is fine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    /// Seconds either side of a note's start that a press still counts.
    pub hit_window: f64,
    /// Keys on the physical keyboard; pitches are folded onto them.
    pub key_count: u16,
    pub look_ahead: f64,
    pub seek_epsilon: f64,
    pub finish_grace: f64,
    pub countdown_steps: u32,
    pub countdown_interval: f64,
    pub backend_url: String,
    pub key_poll_interval_ms: u64,
    pub player_name: Option<String>,
    pub master_gain: f32,
    /// Preferred MIDI input (substring match). None = first available.
    pub midi_device: Option<String>,
    /// Only listen to this MIDI channel (0-15). None = all channels.
    pub midi_channel: Option<u8>,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            hit_window: DEFAULT_HIT_WINDOW,
            key_count: DEFAULT_KEY_COUNT,
            look_ahead: DEFAULT_LOOK_AHEAD,
            seek_epsilon: DEFAULT_SEEK_EPSILON,
            finish_grace: DEFAULT_FINISH_GRACE,
            countdown_steps: 3,
            countdown_interval: 1.0,
            backend_url: DEFAULT_BACKEND_URL.to_string(),
            key_poll_interval_ms: 50,
            player_name: None,
            master_gain: DEFAULT_BASE_GAIN,
            midi_device: None,
            midi_channel: None,
        }
    }
}

impl GameConfig {
    /// Load from the standard path. Returns None if the file doesn't exist
    /// or can't be read.
    pub fn load() -> Option<Self> {
        let path = default_config_path()?;
        if !path.exists() {
            return None;
        }
        match Self::load_from(&path) {
            Ok(config) => Some(config),
            Err(e) => {
                log::warn!("ignoring {}: {e}", path.display());
                None
            }
        }
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&content)?)
    }

    /// Write to `path`, creating parent directories as needed.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_yaml::to_string(self)?)?;
        Ok(())
    }

    pub fn keymap(&self) -> KeyMap {
        KeyMap::new(self.key_count)
    }

    /// Session tunables; unusable timings fall back to their defaults.
    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            hit_window: self.hit_window,
            keymap: self.keymap(),
            look_ahead: self.look_ahead,
            seek_epsilon: self.seek_epsilon,
            finish_grace: self.finish_grace,
            countdown_steps: self.countdown_steps,
            countdown_interval: self.countdown_interval,
            master_gain: self.master_gain,
        }
        .sanitized()
    }

    /// The configured MIDI channel, ignoring values outside 0-15.
    pub fn midi_channel_filter(&self) -> Option<u8> {
        match self.midi_channel {
            Some(ch) if ch <= 15 => Some(ch),
            Some(ch) => {
                log::warn!("ignoring midi_channel {ch}; listening on all channels");
                None
            }
            None => None,
        }
    }
}

/// ~/.keyfall/config.yaml, if a home directory is known.
pub fn default_config_path() -> Option<PathBuf> {
    Some(dirs::home_dir()?.join(".keyfall").join("config.yaml"))
}
