//! Pitch → physical key mapping.
//!
//! The physical keyboard reports a fixed number of keys, numbered from 0. A
//! note's pitch is folded onto that range with a plain modulus, so pitches a
//! whole keyboard-width apart share a key.

use serde::{Deserialize, Serialize};

/// Key count of the reference keyboard (four octaves).
pub const DEFAULT_KEY_COUNT: u16 = 48;

/// Identifier of one key on the physical keyboard, `0..key_count`.
pub type KeyId = u16;

/// Folds pitches onto a keyboard of `key_count` keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyMap {
    key_count: u16,
}

impl KeyMap {
    /// Create a mapping for a keyboard with `key_count` keys (at least 1).
    pub fn new(key_count: u16) -> Self {
        Self {
            key_count: key_count.max(1),
        }
    }

    pub fn key_count(&self) -> u16 {
        self.key_count
    }

    /// Key that must be pressed to play `pitch`.
    pub fn key_for(&self, pitch: u8) -> KeyId {
        u16::from(pitch) % self.key_count
    }
}

impl Default for KeyMap {
    fn default() -> Self {
        Self::new(DEFAULT_KEY_COUNT)
    }
}
