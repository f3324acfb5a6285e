//! MIDI message mapping: converts raw MIDI bytes to note presses and releases,
//! and folds the held notes onto game keys.

use std::collections::BTreeSet;

use crate::keys::KeySnapshot;
use crate::note::KeyMap;

/// A MIDI note going down or up. Carries the raw MIDI note number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyEvent {
    Press(u8),
    Release(u8),
}

/// Parse a raw MIDI message into a note event.
///
/// MIDI message format:
/// - Note On:  [0x90 | channel, note, velocity]
/// - Note Off: [0x80 | channel, note, velocity]
///
/// Note On with velocity 0 is a release. Every other message is ignored.
pub fn parse_key_event(msg: &[u8], channel_filter: Option<u8>) -> Option<KeyEvent> {
    let (&status_byte, data) = msg.split_first()?;
    let status = status_byte & 0xF0;
    let channel = status_byte & 0x0F;

    if let Some(filter) = channel_filter {
        if channel != filter {
            return None;
        }
    }

    match (status, data) {
        (0x90, [note, velocity, ..]) if *velocity > 0 => Some(KeyEvent::Press(*note)),
        (0x90 | 0x80, [note, _, ..]) => Some(KeyEvent::Release(*note)),
        _ => None,
    }
}

/// Raw MIDI notes currently held on the keyboard.
///
/// Several notes can fold onto the same game key, so a key stays pressed
/// until every note mapping to it is released.
#[derive(Debug, Clone, Default)]
pub struct HeldNotes {
    notes: BTreeSet<u8>,
    keymap: KeyMap,
}

impl HeldNotes {
    pub fn new(keymap: KeyMap) -> Self {
        Self {
            notes: BTreeSet::new(),
            keymap,
        }
    }

    /// Record an event. Returns whether the held set changed.
    pub fn apply(&mut self, event: KeyEvent) -> bool {
        match event {
            KeyEvent::Press(note) => self.notes.insert(note),
            KeyEvent::Release(note) => self.notes.remove(&note),
        }
    }

    /// Game keys pressed by the held notes.
    pub fn snapshot(&self) -> KeySnapshot {
        KeySnapshot::from_pressed(self.notes.iter().map(|&n| self.keymap.key_for(n)))
    }
}
