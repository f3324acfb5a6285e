//! Note scheduler: hands each song note to the synthesis engine exactly once.
//!
//! The song is sorted by start time, so a single cursor is enough: every tick
//! moves it past notes that already ended, then schedules the notes whose
//! start falls inside the look-ahead horizon. Seeking repositions the cursor;
//! nothing behind it is ever scheduled again until the next seek or reset.

use log::debug;

use crate::audio::{AudioError, AudioOutput};
use crate::note::{total_duration, TimedNote};
use crate::synth::SynthEngine;

/// How far ahead of the playback position notes are scheduled, in seconds.
pub const DEFAULT_LOOK_AHEAD: f64 = 0.25;
/// Notes starting this much before a seek target are still scheduled.
pub const DEFAULT_SEEK_EPSILON: f64 = 0.05;
/// Time past the song end before playback counts as finished.
pub const DEFAULT_FINISH_GRACE: f64 = 0.25;

/// Mapping between playback time and the audio output's clock.
///
/// Playback position `t` corresponds to hardware time `epoch + t`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AudioTiming {
    /// Current hardware clock reading.
    pub now: f64,
    /// Hardware time of playback position zero.
    pub epoch: f64,
}

/// Outcome of one scheduler tick.
#[derive(Debug, Default)]
pub struct ScheduleReport {
    /// Tones handed to the synthesis engine this tick.
    pub scheduled: usize,
    /// Failures from the synthesis engine; the affected notes are skipped.
    pub errors: Vec<AudioError>,
    /// Set on the single tick where playback reaches the end of the song.
    pub finished: bool,
}

/// Cursor-based scheduler over a sorted song.
#[derive(Debug, Clone)]
pub struct NoteScheduler {
    look_ahead: f64,
    seek_epsilon: f64,
    finish_grace: f64,
    cursor: usize,
    total: f64,
    finished: bool,
}

impl NoteScheduler {
    pub fn new(look_ahead: f64, seek_epsilon: f64, finish_grace: f64) -> Self {
        Self {
            look_ahead: look_ahead.max(0.0),
            seek_epsilon: seek_epsilon.max(0.0),
            finish_grace: finish_grace.max(0.0),
            cursor: 0,
            total: 0.0,
            finished: false,
        }
    }

    /// Prepare for a new song and rewind.
    pub fn load(&mut self, notes: &[TimedNote]) {
        self.total = total_duration(notes);
        self.reset();
    }

    /// Rewind to the first note.
    pub fn reset(&mut self) {
        self.cursor = 0;
        self.finished = false;
    }

    /// Move the cursor to the first note starting at or after
    /// `target - seek_epsilon`.
    pub fn seek(&mut self, notes: &[TimedNote], target: f64) {
        let from = target - self.seek_epsilon;
        self.cursor = notes.partition_point(|n| n.start < from);
        self.finished = false;
    }

    /// Schedule every note entering the horizon at playback position `t`.
    ///
    /// Without `audio` nothing is sent to the engine; the cursor still moves
    /// so silent play stays in step with the song.
    pub fn tick<O: AudioOutput>(
        &mut self,
        notes: &[TimedNote],
        t: f64,
        audio: Option<AudioTiming>,
        synth: &mut SynthEngine<O>,
    ) -> ScheduleReport {
        let mut report = ScheduleReport::default();

        while self.cursor < notes.len() && notes[self.cursor].end() <= t {
            self.cursor += 1;
        }

        let horizon = t + self.look_ahead;
        while let Some(note) = notes.get(self.cursor) {
            if note.start > horizon {
                break;
            }
            if let Some(timing) = audio {
                let hw_start = timing.epoch + note.start;
                if hw_start >= timing.now {
                    match synth.schedule_tone(note.pitch, note.intensity, hw_start, note.duration)
                    {
                        Ok(_) => report.scheduled += 1,
                        Err(e) => report.errors.push(e),
                    }
                } else {
                    debug!("note {} already past on the output clock", self.cursor);
                }
            }
            self.cursor += 1;
        }

        if !self.finished && self.cursor >= notes.len() && t >= self.total + self.finish_grace {
            self.finished = true;
            report.finished = true;
        }

        report
    }

    /// Index of the next note not yet scheduled.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Song length plus the finish grace; the playback position never needs
    /// to go past this.
    pub fn end_time(&self) -> f64 {
        self.total + self.finish_grace
    }
}

impl Default for NoteScheduler {
    fn default() -> Self {
        Self::new(DEFAULT_LOOK_AHEAD, DEFAULT_SEEK_EPSILON, DEFAULT_FINISH_GRACE)
    }
}
