//! Judgment engine: hit/miss decisions and scoring.
//!
//! Each pass takes one playback time and one key snapshot. The miss sweep
//! runs first and ignores input; the hit sweep then credits every active note
//! whose key is held within the hit window. A note is judged at most once.

use log::debug;

use crate::keys::KeySnapshot;
use crate::note::{GameNote, KeyId, KeyMap, NoteId};

/// Tolerance either side of a note's start for a press to count, in seconds.
pub const DEFAULT_HIT_WINDOW: f64 = 0.15;
/// Points for a hit with no combo.
pub const BASE_POINTS: u64 = 100;

/// Points for a hit made while holding `combo` (before the hit is counted).
///
/// Equals `floor(100 · (1 + combo · 0.1))`, computed in integers.
pub fn hit_points(combo: u32) -> u64 {
    BASE_POINTS + 10 * u64::from(combo)
}

/// Running score for one session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScoreState {
    pub score: u64,
    pub combo: u32,
    pub max_combo: u32,
}

impl ScoreState {
    fn record_hit(&mut self) -> u64 {
        let points = hit_points(self.combo);
        self.score += points;
        self.combo += 1;
        self.max_combo = self.max_combo.max(self.combo);
        points
    }

    fn record_miss(&mut self) {
        self.combo = 0;
    }
}

/// What happened to a note.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Hit; `combo` is the combo after this hit.
    Hit { points: u64, combo: u32 },
    Miss,
}

/// One note leaving the active state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Judgment {
    pub id: NoteId,
    pub key: KeyId,
    /// Playback time of the pass that judged the note.
    pub time: f64,
    pub verdict: Verdict,
}

impl Judgment {
    pub fn is_hit(&self) -> bool {
        matches!(self.verdict, Verdict::Hit { .. })
    }
}

/// Applies the hit window to game notes.
#[derive(Debug, Clone, Copy)]
pub struct Judge {
    hit_window: f64,
    keymap: KeyMap,
}

impl Judge {
    pub fn new(hit_window: f64, keymap: KeyMap) -> Self {
        Self {
            hit_window: hit_window.max(0.0),
            keymap,
        }
    }

    pub fn hit_window(&self) -> f64 {
        self.hit_window
    }

    pub fn keymap(&self) -> KeyMap {
        self.keymap
    }

    /// Mark every active note whose window closed before `t` as missed.
    pub fn sweep_misses(
        &self,
        notes: &mut [GameNote],
        t: f64,
        score: &mut ScoreState,
        out: &mut Vec<Judgment>,
    ) {
        for note in notes.iter_mut() {
            if note.is_active() && t > note.start() + self.hit_window && note.mark_missed() {
                score.record_miss();
                let key = self.keymap.key_for(note.pitch());
                debug!("{} missed at {t:.3}s", note.id);
                out.push(Judgment {
                    id: note.id,
                    key,
                    time: t,
                    verdict: Verdict::Miss,
                });
            }
        }
    }

    /// Mark every active note whose key is held within the window as hit.
    pub fn sweep_hits(
        &self,
        notes: &mut [GameNote],
        t: f64,
        keys: &KeySnapshot,
        score: &mut ScoreState,
        out: &mut Vec<Judgment>,
    ) {
        for note in notes.iter_mut() {
            if !note.is_active() || (note.start() - t).abs() > self.hit_window {
                continue;
            }
            let key = self.keymap.key_for(note.pitch());
            if keys.is_pressed(key) && note.mark_hit() {
                let points = score.record_hit();
                debug!("{} hit at {t:.3}s for {points}", note.id);
                out.push(Judgment {
                    id: note.id,
                    key,
                    time: t,
                    verdict: Verdict::Hit {
                        points,
                        combo: score.combo,
                    },
                });
            }
        }
    }

    /// One full pass: misses, then hits, at the same `t`.
    pub fn judge(
        &self,
        notes: &mut [GameNote],
        t: f64,
        keys: &KeySnapshot,
        score: &mut ScoreState,
    ) -> Vec<Judgment> {
        let mut out = Vec::new();
        self.sweep_misses(notes, t, score, &mut out);
        self.sweep_hits(notes, t, keys, score, &mut out);
        out
    }
}

impl Default for Judge {
    fn default() -> Self {
        Self::new(DEFAULT_HIT_WINDOW, KeyMap::default())
    }
}

/// Whether every note has been judged (vacuously true for an empty song).
pub fn all_judged(notes: &[GameNote]) -> bool {
    notes.iter().all(|n| !n.is_active())
}
