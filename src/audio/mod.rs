//! Audio output: the hardware clock and tone playback behind one capability trait.
//!
//! [`AudioOutput`] is everything the game needs from a platform audio layer:
//! a monotonic clock, scheduling tones at absolute times on that clock,
//! cancelling them, and suspending/resuming the whole output.
//!
//! - [`AudioEngine`] owns a cpal output stream. Tones travel to the audio
//!   thread over a lock-free ring buffer; the callback counts rendered frames
//!   and that count is the hardware clock.
//! - [`SilentOutput`] stands in when no device is available. It has no clock,
//!   so the game falls back to wall-clock time and plays silently.
//! - [`OfflineOutput`] runs on a manually driven clock and records every
//!   tone, for deterministic tests and offline rendering.

pub mod callback;
pub mod command;
pub mod offline;
pub mod silent;
pub mod voice;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use log::{info, warn};
use ringbuf::{
    traits::{Producer, Split},
    HeapRb,
};
use thiserror::Error;

pub use command::AudioCommand;
pub use offline::{write_wav, OfflineOutput};
pub use silent::SilentOutput;
pub use voice::{mix_voices, Tone, ToneId, Voice};

use callback::AudioCallback;

/// Ring buffer capacity (number of commands).
const RING_BUFFER_CAPACITY: usize = 1024;

/// Audio output errors.
#[derive(Debug, Error)]
pub enum AudioError {
    #[error("no audio output device found")]
    NoOutputDevice,
    #[error("device config error: {0}")]
    DeviceConfig(String),
    #[error("stream build error: {0}")]
    StreamBuild(String),
    #[error("stream play error: {0}")]
    StreamPlay(String),
    #[error("audio command ring buffer is full")]
    BufferFull,
    #[error("audio output is not available")]
    Unavailable,
    #[error("wav error: {0}")]
    Wav(#[from] hound::Error),
}

/// Platform audio capability consumed by the synthesis engine and the session.
pub trait AudioOutput {
    /// Current time on the output's monotonic clock, in seconds. `None` when
    /// the output has no clock (no hardware).
    fn current_time(&self) -> Option<f64>;

    /// Hand a tone to the output. It sounds once the clock reaches `tone.start`.
    fn start_tone(&mut self, tone: Tone) -> Result<(), AudioError>;

    /// Silence one tone now, whether or not it has started.
    fn cancel_tone(&mut self, id: ToneId) -> Result<(), AudioError>;

    /// Silence every tone now.
    fn cancel_all(&mut self) -> Result<(), AudioError>;

    /// Resume a suspended output.
    fn resume(&mut self) -> Result<(), AudioError>;

    /// Suspend the output; its clock stops advancing while suspended.
    fn suspend(&mut self) -> Result<(), AudioError>;

    /// Whether a hardware clock exists.
    fn is_available(&self) -> bool {
        self.current_time().is_some()
    }
}

/// The cpal-backed audio engine. Owns the stream and the ring buffer producer.
///
/// Created on the game thread; the stream callback runs on the audio thread.
pub struct AudioEngine {
    stream: cpal::Stream,
    producer: ringbuf::HeapProd<AudioCommand>,
    frame_clock: Arc<AtomicU64>,
    sample_rate: u32,
}

impl AudioEngine {
    /// Create and start the audio engine with the default output device.
    pub fn new() -> Result<Self, AudioError> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or(AudioError::NoOutputDevice)?;

        let config = device
            .default_output_config()
            .map_err(|e| AudioError::DeviceConfig(e.to_string()))?;

        let sample_rate = config.sample_rate().0;
        let channels = config.channels();

        Self::build_with_device(&device, sample_rate, channels)
    }

    fn build_with_device(
        device: &cpal::Device,
        sample_rate: u32,
        channels: u16,
    ) -> Result<Self, AudioError> {
        let rb = HeapRb::<AudioCommand>::new(RING_BUFFER_CAPACITY);
        let (producer, consumer) = rb.split();

        let frame_clock = Arc::new(AtomicU64::new(0));
        let mut audio_callback =
            AudioCallback::new(consumer, Arc::clone(&frame_clock), channels, sample_rate);

        let stream_config = cpal::StreamConfig {
            channels,
            sample_rate: cpal::SampleRate(sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        let err_fn = |err: cpal::StreamError| {
            warn!("audio stream error: {err}");
        };

        let stream = device
            .build_output_stream(
                &stream_config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    audio_callback.process(data);
                },
                err_fn,
                None,
            )
            .map_err(|e| AudioError::StreamBuild(e.to_string()))?;

        stream
            .play()
            .map_err(|e| AudioError::StreamPlay(e.to_string()))?;

        info!("audio output opened: {sample_rate} Hz, {channels} ch");

        Ok(Self {
            stream,
            producer,
            frame_clock,
            sample_rate,
        })
    }

    fn send(&mut self, cmd: AudioCommand) -> Result<(), AudioError> {
        self.producer
            .try_push(cmd)
            .map_err(|_| AudioError::BufferFull)
    }
}

impl AudioOutput for AudioEngine {
    fn current_time(&self) -> Option<f64> {
        let frames = self.frame_clock.load(Ordering::Acquire);
        Some(frames as f64 / f64::from(self.sample_rate))
    }

    fn start_tone(&mut self, tone: Tone) -> Result<(), AudioError> {
        self.send(AudioCommand::Schedule(tone))
    }

    fn cancel_tone(&mut self, id: ToneId) -> Result<(), AudioError> {
        self.send(AudioCommand::Cancel(id))
    }

    fn cancel_all(&mut self) -> Result<(), AudioError> {
        self.send(AudioCommand::CancelAll)
    }

    fn resume(&mut self) -> Result<(), AudioError> {
        self.stream
            .play()
            .map_err(|e| AudioError::StreamPlay(e.to_string()))
    }

    fn suspend(&mut self) -> Result<(), AudioError> {
        self.stream
            .pause()
            .map_err(|e| AudioError::StreamPlay(e.to_string()))
    }
}

/// Names of the output devices on the default host.
pub fn list_output_devices() -> Vec<String> {
    let host = cpal::default_host();
    let Ok(devices) = host.output_devices() else {
        return Vec::new();
    };
    devices.filter_map(|d| d.name().ok()).collect()
}

/// Open the default output device, or fall back to [`SilentOutput`] when
/// none can be opened. The error is returned alongside so callers can tell
/// the player.
pub fn open_default_output() -> (Box<dyn AudioOutput>, Option<AudioError>) {
    match AudioEngine::new() {
        Ok(engine) => (Box::new(engine), None),
        Err(e) => {
            warn!("audio unavailable, continuing silently: {e}");
            (Box::new(SilentOutput), Some(e))
        }
    }
}

impl<O: AudioOutput + ?Sized> AudioOutput for Box<O> {
    fn current_time(&self) -> Option<f64> {
        (**self).current_time()
    }

    fn start_tone(&mut self, tone: Tone) -> Result<(), AudioError> {
        (**self).start_tone(tone)
    }

    fn cancel_tone(&mut self, id: ToneId) -> Result<(), AudioError> {
        (**self).cancel_tone(id)
    }

    fn cancel_all(&mut self) -> Result<(), AudioError> {
        (**self).cancel_all()
    }

    fn resume(&mut self) -> Result<(), AudioError> {
        (**self).resume()
    }

    fn suspend(&mut self) -> Result<(), AudioError> {
        (**self).suspend()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[ignore] // Requires audio device; run manually with `cargo test -- --ignored`
    fn test_audio_engine_creation() {
        let engine = AudioEngine::new().expect("no audio device");
        assert!(engine.current_time().is_some());
    }

    #[test]
    #[ignore] // Requires audio device
    fn test_suspend_and_resume() {
        let mut engine = AudioEngine::new().expect("no audio device");
        assert!(engine.suspend().is_ok());
        assert!(engine.resume().is_ok());
    }

    #[test]
    fn test_audio_error_display() {
        assert_eq!(
            AudioError::NoOutputDevice.to_string(),
            "no audio output device found"
        );
        assert_eq!(
            AudioError::BufferFull.to_string(),
            "audio command ring buffer is full"
        );
        assert_eq!(
            AudioError::DeviceConfig("test".to_string()).to_string(),
            "device config error: test"
        );
    }

    #[test]
    fn boxed_output_delegates() {
        let mut boxed: Box<dyn AudioOutput> = Box::new(SilentOutput);
        assert!(!boxed.is_available());
        assert!(boxed.resume().is_ok());
        assert!(matches!(
            boxed.cancel_tone(ToneId(0)),
            Ok(())
        ));
    }

    #[test]
    fn list_devices_does_not_panic() {
        let _ = list_output_devices();
    }
}
