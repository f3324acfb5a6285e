//! Keyfall: falling-note piano rhythm game core.
//!
//! Schedules a song's notes against the audio clock, judges key presses
//! against them, and keeps score. The binary wraps it in a headless player.

pub mod audio;
pub mod clock;
pub mod config;
pub mod judge;
pub mod keys;
pub mod midi;
pub mod note;
#[cfg(feature = "remote")]
pub mod remote;
pub mod render;
pub mod scheduler;
pub mod session;
pub mod synth;
pub mod view;
