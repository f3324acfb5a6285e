//! Audio callback: runs on the cpal audio thread.
//!
//! Drains commands from the ring buffer, mixes the live voices into the
//! output, applies the output ceiling, and advances the shared
//! frame counter that serves as the hardware clock.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use ringbuf::traits::Consumer;
use ringbuf::HeapCons;

use super::command::AudioCommand;
use super::voice::{mix_voices, Voice};

/// Voices preallocated so scheduling rarely allocates on the audio thread.
const VOICE_CAPACITY: usize = 256;

/// Output samples are hard-clamped to `[-OUTPUT_CEILING, OUTPUT_CEILING]`.
pub const OUTPUT_CEILING: f32 = 0.95;

/// State that lives on the audio thread. Accessed only from the cpal callback.
pub struct AudioCallback {
    consumer: HeapCons<AudioCommand>,
    voices: Vec<Voice>,
    /// Frames rendered so far; published to `frame_clock` after each buffer.
    frame: u64,
    frame_clock: Arc<AtomicU64>,
    channels: u16,
    sample_rate: u32,
}

impl AudioCallback {
    pub fn new(
        consumer: HeapCons<AudioCommand>,
        frame_clock: Arc<AtomicU64>,
        channels: u16,
        sample_rate: u32,
    ) -> Self {
        Self {
            consumer,
            voices: Vec::with_capacity(VOICE_CAPACITY),
            frame: frame_clock.load(Ordering::Acquire),
            frame_clock,
            channels,
            sample_rate,
        }
    }

    /// Called by cpal for each output buffer.
    pub fn process(&mut self, output: &mut [f32]) {
        // 1. Drain all pending commands from the ring buffer.
        while let Some(cmd) = self.consumer.try_pop() {
            match cmd {
                AudioCommand::Schedule(tone) => {
                    self.voices.push(Voice::new(tone, self.sample_rate));
                }
                AudioCommand::Cancel(id) => {
                    self.voices.retain(|v| v.tone.id != id);
                }
                AudioCommand::CancelAll => {
                    self.voices.clear();
                }
            }
        }

        // 2. Mix voices starting at the current hardware frame.
        output.fill(0.0);
        mix_voices(&self.voices, output, self.channels, self.frame);

        // 3. Ceiling.
        for sample in output.iter_mut() {
            *sample = sample.clamp(-OUTPUT_CEILING, OUTPUT_CEILING);
        }

        // 4. Advance the clock and drop voices that are done.
        let frames = (output.len() / usize::from(self.channels.max(1))) as u64;
        self.frame += frames;
        self.frame_clock.store(self.frame, Ordering::Release);
        let now = self.frame;
        self.voices.retain(|v| !v.is_finished(now));
    }

    /// Number of voices currently held.
    pub fn voice_count(&self) -> usize {
        self.voices.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::voice::{Tone, ToneId};
    use crate::synth::ToneEnvelope;
    use ringbuf::{
        traits::{Producer, Split},
        HeapRb,
    };

    const SR: u32 = 1000;

    fn setup() -> (
        ringbuf::HeapProd<AudioCommand>,
        AudioCallback,
        Arc<AtomicU64>,
    ) {
        let rb = HeapRb::<AudioCommand>::new(16);
        let (prod, cons) = rb.split();
        let clock = Arc::new(AtomicU64::new(0));
        let callback = AudioCallback::new(cons, Arc::clone(&clock), 2, SR);
        (prod, callback, clock)
    }

    fn tone(id: u64, start: f64) -> Tone {
        Tone {
            id: ToneId(id),
            frequency: 125.0,
            peak: 0.5,
            start,
            duration: 0.2,
            stop: start + 0.3,
            envelope: ToneEnvelope::default(),
        }
    }

    #[test]
    fn silence_on_empty() {
        let (_prod, mut cb, _clock) = setup();
        let mut out = vec![999.0f32; 64];
        cb.process(&mut out);
        assert!(out.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn clock_advances_by_frames() {
        let (_prod, mut cb, clock) = setup();
        let mut out = vec![0.0f32; 64];
        cb.process(&mut out);
        assert_eq!(clock.load(Ordering::Acquire), 32);
        cb.process(&mut out);
        assert_eq!(clock.load(Ordering::Acquire), 64);
    }

    #[test]
    fn tone_waits_for_its_start_frame() {
        let (mut prod, mut cb, _clock) = setup();
        prod.try_push(AudioCommand::Schedule(tone(0, 0.1))).unwrap();

        // Frames 0..100: before the tone starts at frame 100.
        let mut out = vec![0.0f32; 200];
        cb.process(&mut out);
        assert!(out.iter().all(|&s| s == 0.0));

        // Frames 100..200 carry the attack.
        cb.process(&mut out);
        assert!(out.iter().any(|&s| s != 0.0));
    }

    #[test]
    fn cancel_all_silences() {
        let (mut prod, mut cb, _clock) = setup();
        prod.try_push(AudioCommand::Schedule(tone(0, 0.0))).unwrap();
        prod.try_push(AudioCommand::Schedule(tone(1, 0.0))).unwrap();
        prod.try_push(AudioCommand::CancelAll).unwrap();

        let mut out = vec![999.0f32; 64];
        cb.process(&mut out);
        assert!(out.iter().all(|&s| s == 0.0));
        assert_eq!(cb.voice_count(), 0);
    }

    #[test]
    fn cancel_one_keeps_others() {
        let (mut prod, mut cb, _clock) = setup();
        prod.try_push(AudioCommand::Schedule(tone(0, 0.0))).unwrap();
        prod.try_push(AudioCommand::Schedule(tone(1, 0.0))).unwrap();
        prod.try_push(AudioCommand::Cancel(ToneId(0))).unwrap();

        let mut out = vec![0.0f32; 8];
        cb.process(&mut out);
        assert_eq!(cb.voice_count(), 1);
    }

    #[test]
    fn finished_voices_are_dropped() {
        let (mut prod, mut cb, _clock) = setup();
        prod.try_push(AudioCommand::Schedule(tone(0, 0.0))).unwrap();

        // 400 frames > stop at 0.3 s (frame 300).
        let mut out = vec![0.0f32; 800];
        cb.process(&mut out);
        assert_eq!(cb.voice_count(), 0);
    }

    #[test]
    fn ceiling_clamps() {
        let (mut prod, mut cb, _clock) = setup();
        let mut loud = tone(0, 0.0);
        loud.peak = 4.0;
        prod.try_push(AudioCommand::Schedule(loud)).unwrap();

        let mut out = vec![0.0f32; 200];
        cb.process(&mut out);
        assert!(out.iter().all(|&s| s.abs() <= OUTPUT_CEILING));
        assert!(out.iter().any(|&s| (s.abs() - OUTPUT_CEILING).abs() < 1e-6));
    }
}
