//! Presentation-facing state derived from the game notes.
//!
//! Nothing here mutates the session; a renderer calls these each frame with
//! the notes and time from the latest tick report.

use std::collections::BTreeSet;

use crate::keys::KeySnapshot;
use crate::note::{GameNote, KeyId, KeyMap, NoteId};

/// Active notes starting within this distance of the playback time are
/// shown as expected keys.
pub const EXPECTED_RADIUS: f64 = 0.5;
/// Hit and missed notes keep their key lit for this long after their start.
pub const RECENT_WINDOW: f64 = 0.3;
/// How far ahead the falling-note lane shows, in seconds.
pub const VISUAL_LOOK_AHEAD: f64 = 3.0;

const BLACK_IN_OCTAVE: [u8; 5] = [1, 3, 6, 8, 10];

/// Whether `key` is a black key, counting from a C at key 0.
pub fn is_black_key(key: KeyId) -> bool {
    BLACK_IN_OCTAVE.contains(&((key % 12) as u8))
}

/// Number of white keys to the left of `key`.
pub fn white_keys_before(key: KeyId) -> u16 {
    (0..key).filter(|&k| !is_black_key(k)).count() as u16
}

/// Keys to light up on the keyboard.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyHighlights {
    pub expected: BTreeSet<KeyId>,
    pub correct: BTreeSet<KeyId>,
    pub missed: BTreeSet<KeyId>,
}

impl KeyHighlights {
    pub fn compute(notes: &[GameNote], t: f64, keymap: KeyMap) -> Self {
        let mut out = Self::default();
        for note in notes {
            let key = keymap.key_for(note.pitch());
            let since = t - note.start();
            if note.is_active() && since.abs() < EXPECTED_RADIUS {
                out.expected.insert(key);
            } else if note.is_hit() && since < RECENT_WINDOW {
                out.correct.insert(key);
            } else if note.is_missed() && since < RECENT_WINDOW {
                out.missed.insert(key);
            }
        }
        out
    }
}

/// A note in the falling lane.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FallingNote {
    pub id: NoteId,
    pub key: KeyId,
    pub black: bool,
    /// 0.0 at the top of the lane, 1.0 when the note reaches the keys.
    pub progress: f64,
    pub duration: f64,
    pub hit: bool,
    pub missed: bool,
}

/// Notes whose span intersects `[t, t + look_ahead]`.
pub fn visible_notes(
    notes: &[GameNote],
    t: f64,
    look_ahead: f64,
    keymap: KeyMap,
) -> Vec<FallingNote> {
    let look_ahead = look_ahead.max(f64::EPSILON);
    notes
        .iter()
        .filter(|n| n.note.end() >= t && n.start() <= t + look_ahead)
        .map(|n| {
            let key = keymap.key_for(n.pitch());
            FallingNote {
                id: n.id,
                key,
                black: is_black_key(key),
                progress: (1.0 - (n.start() - t) / look_ahead).clamp(0.0, 1.0),
                duration: n.note.duration,
                hit: n.is_hit(),
                missed: n.is_missed(),
            }
        })
        .collect()
}

/// One-line text picture of the keyboard.
///
/// `#` correct, `x` missed, `o` expected, `^` pressed, `.` idle; the first
/// matching mark wins.
pub fn keyboard_line(highlights: &KeyHighlights, pressed: &KeySnapshot, keymap: KeyMap) -> String {
    (0..keymap.key_count())
        .map(|k| {
            if highlights.correct.contains(&k) {
                '#'
            } else if highlights.missed.contains(&k) {
                'x'
            } else if highlights.expected.contains(&k) {
                'o'
            } else if pressed.is_pressed(k) {
                '^'
            } else {
                '.'
            }
        })
        .collect()
}
