//! Offline output: a manually clocked output that records tones instead of playing them.
//!
//! Every tone handed to an [`OfflineOutput`] is kept together with the time it
//! was cancelled, if it was. The recording can be mixed down with
//! [`OfflineOutput::render`] and written to disk with [`write_wav`].

use std::path::Path;

use super::callback::OUTPUT_CEILING;
use super::voice::{mix_voices, Tone, ToneId, Voice};
use super::{AudioError, AudioOutput};
use crate::clock::{ManualClock, TimeSource};

#[derive(Debug, Clone, Copy)]
struct Recorded {
    tone: Tone,
    cancelled_at: Option<f64>,
}

/// Records scheduled tones against a [`ManualClock`].
#[derive(Debug)]
pub struct OfflineOutput {
    clock: ManualClock,
    recorded: Vec<Recorded>,
    suspended: bool,
    failing: bool,
}

impl OfflineOutput {
    /// Output whose clock is `clock`; advance the clock to move time forward.
    pub fn with_clock(clock: ManualClock) -> Self {
        Self {
            clock,
            recorded: Vec::new(),
            suspended: false,
            failing: false,
        }
    }

    /// Make `resume`/`suspend` fail, as a platform refusing to start or stop
    /// the output would.
    pub fn set_failing(&mut self, failing: bool) {
        self.failing = failing;
    }

    pub fn is_suspended(&self) -> bool {
        self.suspended
    }

    /// Every tone ever scheduled, in scheduling order.
    pub fn tones(&self) -> Vec<&Tone> {
        self.recorded.iter().map(|r| &r.tone).collect()
    }

    /// Tones neither cancelled nor past their stop time.
    pub fn pending_tones(&self) -> impl Iterator<Item = &Tone> + '_ {
        let now = self.clock.now();
        self.recorded
            .iter()
            .filter(move |r| r.cancelled_at.is_none() && r.tone.stop > now)
            .map(|r| &r.tone)
    }

    /// Mix the recording into interleaved samples, honoring cancellations.
    pub fn render(&self, sample_rate: u32, channels: u16) -> Vec<f32> {
        let voices: Vec<Voice> = self
            .recorded
            .iter()
            .map(|r| {
                let mut v = Voice::new(r.tone, sample_rate);
                if let Some(at) = r.cancelled_at {
                    v.cut_at(at);
                }
                v
            })
            .collect();

        let frames = voices.iter().map(|v| v.stop_frame).max().unwrap_or(0);
        let mut out = vec![0.0f32; frames as usize * usize::from(channels.max(1))];
        mix_voices(&voices, &mut out, channels, 0);
        for s in out.iter_mut() {
            *s = s.clamp(-OUTPUT_CEILING, OUTPUT_CEILING);
        }
        out
    }

    fn transport(&mut self, suspended: bool) -> Result<(), AudioError> {
        if self.failing {
            return Err(AudioError::StreamPlay("offline output refused".to_string()));
        }
        self.suspended = suspended;
        Ok(())
    }
}

impl AudioOutput for OfflineOutput {
    fn current_time(&self) -> Option<f64> {
        Some(self.clock.now())
    }

    fn start_tone(&mut self, tone: Tone) -> Result<(), AudioError> {
        self.recorded.push(Recorded {
            tone,
            cancelled_at: None,
        });
        Ok(())
    }

    fn cancel_tone(&mut self, id: ToneId) -> Result<(), AudioError> {
        let now = self.clock.now();
        for r in self.recorded.iter_mut().filter(|r| r.tone.id == id) {
            r.cancelled_at.get_or_insert(now);
        }
        Ok(())
    }

    fn cancel_all(&mut self) -> Result<(), AudioError> {
        let now = self.clock.now();
        for r in self.recorded.iter_mut() {
            r.cancelled_at.get_or_insert(now);
        }
        Ok(())
    }

    fn resume(&mut self) -> Result<(), AudioError> {
        self.transport(false)
    }

    fn suspend(&mut self) -> Result<(), AudioError> {
        self.transport(true)
    }
}

/// Write interleaved float samples to a 16-bit PCM WAV file.
pub fn write_wav(
    path: &Path,
    samples: &[f32],
    sample_rate: u32,
    channels: u16,
) -> Result<(), AudioError> {
    let spec = hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec)?;
    for &s in samples {
        let v = (s.clamp(-1.0, 1.0) * f32::from(i16::MAX)) as i16;
        writer.write_sample(v)?;
    }
    writer.finalize()?;
    Ok(())
}
