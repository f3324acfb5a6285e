//! Tones and voices: what the synthesis engine schedules and how it is rendered.
//!
//! A [`Tone`] is the full description of one scheduled sine note on the
//! output clock. A [`Voice`] is the same tone pinned to sample frames at a
//! given sample rate; both the live audio callback and the offline renderer
//! mix voices with [`mix_voices`].

use crate::synth::{sine, ToneEnvelope};

/// Identifier of a scheduled tone, unique per synthesis engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ToneId(pub u64);

/// One scheduled sine tone. Times are seconds on the output clock.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tone {
    pub id: ToneId,
    pub frequency: f64,
    /// Amplitude at the top of the envelope.
    pub peak: f32,
    pub start: f64,
    /// Envelope length; the release ends here.
    pub duration: f64,
    /// When the generator is torn down (at or after `start + duration`).
    pub stop: f64,
    pub envelope: ToneEnvelope,
}

impl Tone {
    /// Output value `t` seconds after the tone's start.
    #[inline]
    pub fn value_at(&self, t: f64) -> f32 {
        if t < 0.0 || self.start + t >= self.stop {
            return 0.0;
        }
        let env = self.envelope.amplitude(t, self.duration);
        (sine(self.frequency, t) * env) as f32 * self.peak
    }
}

/// A tone mapped onto sample frames.
#[derive(Debug, Clone, Copy)]
pub struct Voice {
    pub tone: Tone,
    pub start_frame: u64,
    pub stop_frame: u64,
    sample_rate: u32,
}

impl Voice {
    pub fn new(tone: Tone, sample_rate: u32) -> Self {
        let sr = f64::from(sample_rate);
        Self {
            tone,
            start_frame: seconds_to_frames(tone.start, sr),
            stop_frame: seconds_to_frames(tone.stop, sr),
            sample_rate,
        }
    }

    /// Cut the voice short at `time` seconds (no effect if it already ends earlier).
    pub fn cut_at(&mut self, time: f64) {
        let frame = seconds_to_frames(time, f64::from(self.sample_rate));
        self.stop_frame = self.stop_frame.min(frame);
    }

    /// Sample value at absolute frame `frame`.
    #[inline]
    pub fn sample(&self, frame: u64) -> f32 {
        if frame < self.start_frame || frame >= self.stop_frame {
            return 0.0;
        }
        let t = (frame - self.start_frame) as f64 / f64::from(self.sample_rate);
        self.tone.value_at(t)
    }

    /// Whether the voice has nothing left to play at or after `frame`.
    pub fn is_finished(&self, frame: u64) -> bool {
        frame >= self.stop_frame
    }
}

fn seconds_to_frames(seconds: f64, sample_rate: f64) -> u64 {
    (seconds.max(0.0) * sample_rate).round() as u64
}

/// Additively mix `voices` into interleaved `output`, whose first frame is
/// absolute frame `first_frame`. Every channel receives the same signal.
pub fn mix_voices(voices: &[Voice], output: &mut [f32], channels: u16, first_frame: u64) {
    let channels = usize::from(channels.max(1));
    for (i, frame) in output.chunks_mut(channels).enumerate() {
        let abs = first_frame + i as u64;
        let value: f32 = voices.iter().map(|v| v.sample(abs)).sum();
        if value != 0.0 {
            for s in frame.iter_mut() {
                *s += value;
            }
        }
    }
}
