//! Synthesis engine: turns timed notes into scheduled sine tones.
//!
//! The engine owns the set of live tones it has handed to an
//! [`AudioOutput`]. Tones are released either when their stop time passes on
//! the output clock ([`SynthEngine::release_finished`]) or all at once by
//! [`SynthEngine::stop_all`], which must run before anything is rescheduled
//! so the same note never sounds twice.

pub mod envelope;
pub mod oscillator;

pub use envelope::{ToneEnvelope, RELEASE_FLOOR};
pub use oscillator::{midi_to_freq, sine};

use log::{debug, warn};

use crate::audio::{AudioError, AudioOutput, Tone, ToneId};

/// Shortest tone the engine will schedule, in seconds.
pub const MIN_TONE_DURATION: f64 = 0.05;
/// How long after its nominal end a tone's generator is kept alive.
pub const STOP_TAIL: f64 = 0.1;
/// Lowest velocity a scheduled tone may have; keeps every note audible.
pub const MIN_VELOCITY: f32 = 0.1;
/// Highest velocity a scheduled tone may have.
pub const MAX_VELOCITY: f32 = 1.0;
/// Velocity used when a note carries none (zero or not a number).
pub const DEFAULT_VELOCITY: f32 = 0.8;
/// Gain applied on top of velocity for every tone.
pub const DEFAULT_BASE_GAIN: f32 = 0.5;

/// Clamp a note's velocity into the audible range.
pub fn clamp_velocity(velocity: f32) -> f32 {
    let v = if velocity.is_nan() || velocity <= 0.0 {
        DEFAULT_VELOCITY
    } else {
        velocity
    };
    v.clamp(MIN_VELOCITY, MAX_VELOCITY)
}

/// Handle to a tone scheduled by the engine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ToneHandle {
    pub id: ToneId,
    /// Output-clock time at which the tone's generator stops.
    pub stop_at: f64,
}

/// Schedules tones on an audio output and tracks the ones still sounding.
pub struct SynthEngine<O> {
    output: O,
    envelope: ToneEnvelope,
    base_gain: f32,
    next_id: u64,
    live: Vec<ToneHandle>,
}

impl<O: AudioOutput> SynthEngine<O> {
    /// Engine with the default envelope and base gain.
    pub fn new(output: O) -> Self {
        Self::with_settings(output, ToneEnvelope::default(), DEFAULT_BASE_GAIN)
    }

    pub fn with_settings(output: O, envelope: ToneEnvelope, base_gain: f32) -> Self {
        Self {
            output,
            envelope,
            base_gain: base_gain.clamp(0.0, 1.0),
            next_id: 0,
            live: Vec::new(),
        }
    }

    /// Schedule one tone starting at `start` on the output clock.
    ///
    /// `duration` is raised to [`MIN_TONE_DURATION`]; the generator stops
    /// [`STOP_TAIL`] seconds after the (raised) end.
    pub fn schedule_tone(
        &mut self,
        pitch: u8,
        velocity: f32,
        start: f64,
        duration: f64,
    ) -> Result<ToneHandle, AudioError> {
        let duration = duration.max(MIN_TONE_DURATION);
        let id = ToneId(self.next_id);
        let tone = Tone {
            id,
            frequency: midi_to_freq(pitch),
            peak: clamp_velocity(velocity) * self.base_gain,
            start,
            duration,
            stop: start + duration + STOP_TAIL,
            envelope: self.envelope,
        };
        let handle = ToneHandle {
            id,
            stop_at: tone.stop,
        };

        self.output.start_tone(tone)?;
        self.next_id += 1;
        self.live.push(handle);
        debug!("scheduled tone {} pitch {pitch} at {start:.3}s", id.0);
        Ok(handle)
    }

    /// Dispose of one tone: silence it now and forget its handle.
    ///
    /// Returns `false` when the handle was already released or stopped.
    pub fn stop(&mut self, handle: ToneHandle) -> Result<bool, AudioError> {
        let Some(pos) = self.live.iter().position(|h| h.id == handle.id) else {
            return Ok(false);
        };
        self.live.remove(pos);
        self.output.cancel_tone(handle.id)?;
        Ok(true)
    }

    /// Halt every outstanding tone and forget it. Returns how many were live.
    ///
    /// Output errors are logged; the live set is cleared regardless so the
    /// engine never believes a cancelled tone is still playing.
    pub fn stop_all(&mut self) -> usize {
        let count = self.live.len();
        if let Err(e) = self.output.cancel_all() {
            warn!("failed to cancel scheduled tones: {e}");
        }
        self.live.clear();
        count
    }

    /// Drop handles whose tones have finished on the output clock.
    pub fn release_finished(&mut self) {
        if let Some(now) = self.output.current_time() {
            self.live.retain(|h| h.stop_at > now);
        }
    }

    /// Number of tones scheduled and not yet released.
    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    pub fn envelope(&self) -> ToneEnvelope {
        self.envelope
    }

    pub fn output(&self) -> &O {
        &self.output
    }

    pub fn output_mut(&mut self) -> &mut O {
        &mut self.output
    }
}
