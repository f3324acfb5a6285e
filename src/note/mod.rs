//! Note data model: the immutable song notes and their per-session judgment state.
//!
//! A [`TimedNote`] is one note of the loaded song: pitch, start, duration and
//! intensity. The song is a `Vec<TimedNote>` sorted by start time and never
//! mutated after load. A [`GameNote`] wraps a timed note with the judgment
//! flags the [`Judge`](crate::judge::Judge) flips during play.

pub mod keymap;
pub mod source;

pub use keymap::{KeyId, KeyMap, DEFAULT_KEY_COUNT};
pub use source::{load_notes, parse_notes, NoteFormat, NoteSourceError};

use std::fmt;

use serde::{Deserialize, Serialize};

/// A single note of the song, in seconds from the song start.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimedNote {
    /// MIDI note number (0–127).
    #[serde(rename = "midi")]
    pub pitch: u8,
    /// Start offset in seconds (>= 0).
    #[serde(rename = "time")]
    pub start: f64,
    /// Length in seconds (> 0).
    pub duration: f64,
    /// Normalized intensity in the range 0.0–1.0.
    #[serde(rename = "velocity", default = "TimedNote::default_intensity")]
    pub intensity: f32,
}

impl TimedNote {
    /// Intensity used when the source gives none.
    pub const DEFAULT_INTENSITY: f32 = 0.8;

    pub fn new(pitch: u8, start: f64, duration: f64, intensity: f32) -> Self {
        Self {
            pitch,
            start,
            duration,
            intensity,
        }
    }

    /// Time at which the note stops sounding.
    pub fn end(&self) -> f64 {
        self.start + self.duration
    }

    /// Whether the note can take part in a song: finite, non-negative start
    /// and a positive duration.
    pub fn is_valid(&self) -> bool {
        self.start.is_finite()
            && self.start >= 0.0
            && self.duration.is_finite()
            && self.duration > 0.0
    }

    fn default_intensity() -> f32 {
        Self::DEFAULT_INTENSITY
    }
}

/// Length of a song: the latest end time over all notes, 0 when empty.
pub fn total_duration(notes: &[TimedNote]) -> f64 {
    notes.iter().map(TimedNote::end).fold(0.0, f64::max)
}

/// Stable identity of a note within one loaded song (its source index).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NoteId(pub usize);

impl fmt::Display for NoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "note-{}", self.0)
    }
}

/// A song note plus its judgment state for the current session.
///
/// `active` notes are still eligible for judgment. A note leaves the active
/// state exactly once, through [`GameNote::mark_hit`] or
/// [`GameNote::mark_missed`], and never returns to it until the whole list is
/// rebuilt with [`GameNote::from_song`].
#[derive(Debug, Clone, PartialEq)]
pub struct GameNote {
    pub id: NoteId,
    pub note: TimedNote,
    active: bool,
    hit: bool,
    missed: bool,
}

impl GameNote {
    /// Fresh, unjudged note.
    pub fn new(id: NoteId, note: TimedNote) -> Self {
        Self {
            id,
            note,
            active: true,
            hit: false,
            missed: false,
        }
    }

    /// Instantiate the judgment list for a song, ids in source order.
    pub fn from_song(notes: &[TimedNote]) -> Vec<GameNote> {
        notes
            .iter()
            .enumerate()
            .map(|(i, n)| GameNote::new(NoteId(i), *n))
            .collect()
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn is_hit(&self) -> bool {
        self.hit
    }

    pub fn is_missed(&self) -> bool {
        self.missed
    }

    pub fn start(&self) -> f64 {
        self.note.start
    }

    pub fn pitch(&self) -> u8 {
        self.note.pitch
    }

    /// Judge the note as hit. Returns `false` (and changes nothing) when the
    /// note was already judged.
    pub fn mark_hit(&mut self) -> bool {
        if !self.active {
            return false;
        }
        self.active = false;
        self.hit = true;
        true
    }

    /// Judge the note as missed. Returns `false` (and changes nothing) when
    /// the note was already judged.
    pub fn mark_missed(&mut self) -> bool {
        if !self.active {
            return false;
        }
        self.active = false;
        self.missed = true;
        true
    }
}
