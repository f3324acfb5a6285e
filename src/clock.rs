//! Playback clock: logical song position derived from an external time source.
//!
//! The clock never reads time itself: every transition takes the current
//! reading of whichever source drives it (the audio output's hardware clock,
//! or wall-clock time when there is no audio). That keeps it deterministic
//! under test and lets the session switch sources without a jump.

use std::cell::Cell;
use std::rc::Rc;
use std::time::Instant;

/// Clock state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockState {
    Stopped,
    Running,
    Held,
}

/// Which source the session reads to drive the playback clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockSource {
    /// The audio output's hardware clock.
    Audio,
    /// Wall-clock time; used when no audio output is available.
    Wall,
}

/// A monotonic source of seconds.
pub trait TimeSource {
    fn now(&self) -> f64;
}

/// Wall-clock seconds since construction.
#[derive(Debug, Clone, Copy)]
pub struct WallClock {
    origin: Instant,
}

impl WallClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for WallClock {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeSource for WallClock {
    fn now(&self) -> f64 {
        self.origin.elapsed().as_secs_f64()
    }
}

/// A hand-driven clock. Clones share the same time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Rc<Cell<f64>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, seconds: f64) {
        self.now.set(seconds);
    }

    pub fn advance(&self, seconds: f64) {
        self.now.set(self.now.get() + seconds);
    }
}

impl TimeSource for ManualClock {
    fn now(&self) -> f64 {
        self.now.get()
    }
}

/// Logical playback position.
///
/// While running, `position = source − epoch`, clamped to `[0, limit]` and
/// never allowed to move backwards. Held and stopped clocks report a frozen
/// value.
#[derive(Debug, Clone)]
pub struct PlaybackClock {
    state: ClockState,
    epoch: f64,
    frozen: f64,
    /// Highest position handed out since the last start or seek.
    high_water: f64,
    limit: Option<f64>,
}

impl PlaybackClock {
    pub fn new() -> Self {
        Self {
            state: ClockState::Stopped,
            epoch: 0.0,
            frozen: 0.0,
            high_water: 0.0,
            limit: None,
        }
    }

    /// Upper bound for reported positions; `None` leaves them unbounded.
    pub fn set_limit(&mut self, limit: Option<f64>) {
        self.limit = limit.map(|l| l.max(0.0));
    }

    /// Start running so that the position equals `from` at source time `now`.
    pub fn start(&mut self, from: f64, now: f64) {
        let from = self.clamp(from);
        self.epoch = now - from;
        self.high_water = from;
        self.frozen = from;
        self.state = ClockState::Running;
    }

    /// Current position for source time `now`.
    pub fn sample(&mut self, now: f64) -> f64 {
        match self.state {
            ClockState::Running => {
                let t = self.clamp(now - self.epoch).max(self.high_water);
                self.high_water = t;
                t
            }
            ClockState::Held | ClockState::Stopped => self.frozen,
        }
    }

    /// Freeze the position at its value for `now`.
    pub fn hold(&mut self, now: f64) -> f64 {
        let t = self.sample(now);
        self.frozen = t;
        self.state = ClockState::Held;
        t
    }

    /// Back to stopped at position zero.
    pub fn reset(&mut self) {
        self.state = ClockState::Stopped;
        self.epoch = 0.0;
        self.frozen = 0.0;
        self.high_water = 0.0;
    }

    /// Jump to `target`. A running clock keeps running from there.
    pub fn seek(&mut self, target: f64, now: f64) {
        let target = self.clamp(target);
        match self.state {
            ClockState::Running => {
                self.epoch = now - target;
                self.high_water = target;
            }
            ClockState::Held | ClockState::Stopped => {
                self.frozen = target;
            }
        }
    }

    /// Re-anchor a running clock on a different source whose reading is
    /// `now`, keeping the current position.
    pub fn rebase(&mut self, now: f64) {
        if self.state == ClockState::Running {
            self.epoch = now - self.high_water;
        }
    }

    /// Source time that corresponds to position zero.
    pub fn epoch(&self) -> f64 {
        self.epoch
    }

    pub fn state(&self) -> ClockState {
        self.state
    }

    /// Last position reported, without reading a source.
    pub fn position(&self) -> f64 {
        match self.state {
            ClockState::Running => self.high_water,
            ClockState::Held | ClockState::Stopped => self.frozen,
        }
    }

    fn clamp(&self, t: f64) -> f64 {
        let t = t.max(0.0);
        match self.limit {
            Some(limit) => t.min(limit),
            None => t,
        }
    }
}

impl Default for PlaybackClock {
    fn default() -> Self {
        Self::new()
    }
}
