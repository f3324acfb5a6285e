//! Key state: which piano keys are held right now.
//!
//! A key source (HTTP poller, MIDI input) publishes whole [`KeySnapshot`]s
//! into a [`SharedKeys`] cell; the game tick loads the latest one without
//! blocking. Readers always see a complete snapshot, never a partial update.

use std::collections::BTreeSet;
use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::note::KeyId;

/// Set of currently pressed keys.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeySnapshot {
    pressed: BTreeSet<KeyId>,
}

impl KeySnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pressed(keys: impl IntoIterator<Item = KeyId>) -> Self {
        Self {
            pressed: keys.into_iter().collect(),
        }
    }

    pub fn is_pressed(&self, key: KeyId) -> bool {
        self.pressed.contains(&key)
    }

    pub fn is_empty(&self) -> bool {
        self.pressed.is_empty()
    }

    /// Pressed keys in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = KeyId> + '_ {
        self.pressed.iter().copied()
    }
}

/// Latest-snapshot cell shared between one writer and the game tick.
#[derive(Debug, Clone)]
pub struct SharedKeys {
    inner: Arc<ArcSwap<KeySnapshot>>,
}

impl SharedKeys {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(ArcSwap::from_pointee(KeySnapshot::new())),
        }
    }

    /// Replace the snapshot.
    pub fn publish(&self, snapshot: KeySnapshot) {
        self.inner.store(Arc::new(snapshot));
    }

    /// The most recently published snapshot.
    pub fn latest(&self) -> Arc<KeySnapshot> {
        self.inner.load_full()
    }
}

impl Default for SharedKeys {
    fn default() -> Self {
        Self::new()
    }
}
