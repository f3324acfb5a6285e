//! Silent output: used when no audio device can be opened.

use super::voice::{Tone, ToneId};
use super::{AudioError, AudioOutput};

/// An output with no clock and no sound.
///
/// Tones are rejected with [`AudioError::Unavailable`]; everything else is a
/// no-op. The session sees `current_time() == None` and drives its playback
/// clock from wall-clock time instead.
#[derive(Debug, Clone, Copy, Default)]
pub struct SilentOutput;

impl AudioOutput for SilentOutput {
    fn current_time(&self) -> Option<f64> {
        None
    }

    fn start_tone(&mut self, _tone: Tone) -> Result<(), AudioError> {
        Err(AudioError::Unavailable)
    }

    fn cancel_tone(&mut self, _id: ToneId) -> Result<(), AudioError> {
        Ok(())
    }

    fn cancel_all(&mut self) -> Result<(), AudioError> {
        Ok(())
    }

    fn resume(&mut self) -> Result<(), AudioError> {
        Ok(())
    }

    fn suspend(&mut self) -> Result<(), AudioError> {
        Ok(())
    }
}
