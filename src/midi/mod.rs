//! MIDI keyboard support: a physical or virtual MIDI keyboard as a key-state source.

pub mod input;
pub mod mapping;

pub use input::MidiKeySource;
pub use mapping::{parse_key_event, HeldNotes, KeyEvent};
