//! Commands sent from the game thread to the audio thread via ring buffer.

use super::voice::{Tone, ToneId};

/// Commands sent from the game thread to the audio thread via ring buffer.
#[derive(Debug)]
pub enum AudioCommand {
    /// Add a tone to the voice list; it sounds once the output clock reaches
    /// its start.
    Schedule(Tone),

    /// Remove one tone immediately, whether or not it has started.
    Cancel(ToneId),

    /// Remove every tone immediately.
    CancelAll,
}
