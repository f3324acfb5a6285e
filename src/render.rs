//! Offline render: plays a song through the scheduler and synthesis engine
//! on a simulated clock and writes the result to a WAV file.
//!
//! The same look-ahead scheduling, envelopes and mixing as live play are
//! used, so a render is what a perfect live run would have sounded like.

use std::path::Path;

use log::info;

use crate::audio::{write_wav, AudioError, OfflineOutput};
use crate::clock::ManualClock;
use crate::note::TimedNote;
use crate::scheduler::{AudioTiming, NoteScheduler};
use crate::synth::{SynthEngine, ToneEnvelope};

/// Render settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderSettings {
    pub sample_rate: u32,
    pub channels: u16,
    /// Simulated frame rate of the tick loop.
    pub tick_rate: f64,
    pub master_gain: f32,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            sample_rate: 44_100,
            channels: 2,
            tick_rate: 60.0,
            master_gain: crate::synth::DEFAULT_BASE_GAIN,
        }
    }
}

/// Render `song` to interleaved samples.
pub fn render_song(song: &[TimedNote], settings: RenderSettings) -> Vec<f32> {
    let clock = ManualClock::new();
    let output = OfflineOutput::with_clock(clock.clone());
    let mut synth = SynthEngine::with_settings(output, ToneEnvelope::default(), settings.master_gain);
    let mut scheduler = NoteScheduler::default();
    scheduler.load(song);

    let step = 1.0 / settings.tick_rate.max(1.0);
    let mut ticks: u64 = 0;
    let end = loop {
        // Derived from the tick count so long songs don't accumulate drift.
        let t = ticks as f64 * step;
        clock.set(t);
        let timing = AudioTiming { now: t, epoch: 0.0 };
        if scheduler.tick(song, t, Some(timing), &mut synth).finished {
            break t;
        }
        ticks += 1;
    };

    info!(
        "rendered {} tones over {end:.2}s",
        synth.output().tones().len()
    );
    synth.output().render(settings.sample_rate, settings.channels)
}

/// Render `song` straight to a WAV file at `path`.
pub fn render_to_wav(
    song: &[TimedNote],
    path: &Path,
    settings: RenderSettings,
) -> Result<(), AudioError> {
    let samples = render_song(song, settings);
    write_wav(path, &samples, settings.sample_rate, settings.channels)?;
    info!("wrote {}", path.display());
    Ok(())
}
