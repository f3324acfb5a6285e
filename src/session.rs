//! Game session controller: owns one song's playback and judgment.
//!
//! ```text
//! Idle ──play──▶ CountingDown ──(steps elapsed)──▶ Playing ──pause──▶ Paused
//!  ▲  ◀──pause──────────┘                             │  ▲              │
//!  │                                                  │  └───resume────┘
//!  └──────────────reset (any phase)───────── Completed ◀┘
//! ```
//!
//! The session is driven by [`GameSession::tick`], called once per frame by
//! the host loop. A playing tick reads the clock once and runs the pipeline:
//! schedule notes, sweep misses, sweep hits, check completion. Failures at
//! the audio boundary never stop the pipeline; they become [`Notice`]s in
//! the tick report.

use std::fmt;

use log::{info, warn};

use crate::audio::AudioOutput;
use crate::clock::{ClockSource, ClockState, PlaybackClock, TimeSource};
use crate::judge::{all_judged, Judge, Judgment, ScoreState, DEFAULT_HIT_WINDOW};
use crate::keys::KeySnapshot;
use crate::note::{total_duration, GameNote, KeyMap, TimedNote};
use crate::scheduler::{
    AudioTiming, NoteScheduler, DEFAULT_FINISH_GRACE, DEFAULT_LOOK_AHEAD, DEFAULT_SEEK_EPSILON,
};
use crate::synth::{SynthEngine, ToneEnvelope, DEFAULT_BASE_GAIN};

/// Session phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    CountingDown,
    Playing,
    Paused,
    Completed,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Idle => "idle",
            Phase::CountingDown => "counting down",
            Phase::Playing => "playing",
            Phase::Paused => "paused",
            Phase::Completed => "completed",
        };
        f.write_str(name)
    }
}

/// A non-fatal problem the player should hear about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// No audio output; the song plays silently on wall-clock time.
    AudioUnavailable,
    /// The audio output's clock went away during play.
    AudioClockLost,
    AudioResumeFailed(String),
    AudioSuspendFailed(String),
    /// Some notes could not be handed to the audio output this tick.
    ScheduleFailed { count: usize, reason: String },
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::AudioUnavailable => {
                f.write_str("audio unavailable, playing silently on wall-clock time")
            }
            Notice::AudioClockLost => {
                f.write_str("audio clock lost, continuing on wall-clock time")
            }
            Notice::AudioResumeFailed(e) => write!(f, "could not resume audio: {e}"),
            Notice::AudioSuspendFailed(e) => write!(f, "could not suspend audio: {e}"),
            Notice::ScheduleFailed { count, reason } => {
                write!(f, "{count} note(s) could not be played: {reason}")
            }
        }
    }
}

/// Result of a finished song.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FinalScore {
    pub score: u64,
    pub max_combo: u32,
}

/// Everything a presentation layer needs from one tick.
#[derive(Debug, Clone, PartialEq)]
pub struct TickReport {
    pub phase: Phase,
    /// Playback position after the tick.
    pub time: f64,
    /// Countdown steps still to go while counting down.
    pub countdown: Option<u32>,
    pub judgments: Vec<Judgment>,
    /// Present when score or combo changed this tick.
    pub score_changed: Option<ScoreState>,
    /// Present on the single tick where the song completes.
    pub completed: Option<FinalScore>,
    pub notices: Vec<Notice>,
}

/// Tunables for a session.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionSettings {
    pub hit_window: f64,
    pub keymap: KeyMap,
    pub look_ahead: f64,
    pub seek_epsilon: f64,
    pub finish_grace: f64,
    pub countdown_steps: u32,
    pub countdown_interval: f64,
    pub master_gain: f32,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            hit_window: DEFAULT_HIT_WINDOW,
            keymap: KeyMap::default(),
            look_ahead: DEFAULT_LOOK_AHEAD,
            seek_epsilon: DEFAULT_SEEK_EPSILON,
            finish_grace: DEFAULT_FINISH_GRACE,
            countdown_steps: 3,
            countdown_interval: 1.0,
            master_gain: DEFAULT_BASE_GAIN,
        }
    }
}

impl SessionSettings {
    /// Replace timings that would stall the session with their defaults.
    pub fn sanitized(self) -> Self {
        let defaults = Self::default();
        let non_negative_or = |v: f64, d: f64| if v.is_finite() && v >= 0.0 { v } else { d };
        Self {
            countdown_interval: non_negative_or(self.countdown_interval, defaults.countdown_interval),
            look_ahead: non_negative_or(self.look_ahead, defaults.look_ahead),
            seek_epsilon: non_negative_or(self.seek_epsilon, defaults.seek_epsilon),
            finish_grace: non_negative_or(self.finish_grace, defaults.finish_grace),
            ..self
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Countdown {
    remaining: u32,
    next_step_at: f64,
}

/// One song's playback, judgment and score.
pub struct GameSession<O: AudioOutput, C: TimeSource> {
    settings: SessionSettings,
    song: Vec<TimedNote>,
    notes: Vec<GameNote>,
    synth: SynthEngine<O>,
    wall: C,
    clock: PlaybackClock,
    source: ClockSource,
    scheduler: NoteScheduler,
    judge: Judge,
    score: ScoreState,
    phase: Phase,
    countdown: Option<Countdown>,
    completed: bool,
    notices: Vec<Notice>,
}

impl<O: AudioOutput, C: TimeSource> GameSession<O, C> {
    /// New idle session. `song` must be sorted by start time, as
    /// [`load_notes`](crate::note::load_notes) returns it.
    pub fn new(song: Vec<TimedNote>, output: O, wall: C, settings: SessionSettings) -> Self {
        let settings = settings.sanitized();
        let mut notices = Vec::new();
        if !output.is_available() {
            warn!("no audio clock; the song will play silently");
            notices.push(Notice::AudioUnavailable);
        }

        let mut scheduler =
            NoteScheduler::new(settings.look_ahead, settings.seek_epsilon, settings.finish_grace);
        scheduler.load(&song);
        let mut clock = PlaybackClock::new();
        clock.set_limit(Some(scheduler.end_time()));

        info!(
            "session ready: {} notes, {:.2}s",
            song.len(),
            total_duration(&song)
        );

        Self {
            notes: GameNote::from_song(&song),
            song,
            synth: SynthEngine::with_settings(output, ToneEnvelope::default(), settings.master_gain),
            wall,
            clock,
            source: ClockSource::Wall,
            scheduler,
            judge: Judge::new(settings.hit_window, settings.keymap),
            score: ScoreState::default(),
            phase: Phase::Idle,
            countdown: None,
            completed: false,
            notices,
            settings,
        }
    }

    /// Start the countdown. Only valid from idle.
    pub fn play(&mut self) -> bool {
        if self.phase != Phase::Idle {
            return false;
        }
        if self.settings.countdown_steps == 0 {
            self.start_playing(0.0);
            return true;
        }
        self.countdown = Some(Countdown {
            remaining: self.settings.countdown_steps,
            next_step_at: self.wall.now() + self.settings.countdown_interval,
        });
        self.phase = Phase::CountingDown;
        info!("countdown started");
        true
    }

    /// Freeze playback and silence everything scheduled. Only valid while
    /// playing, or counting down, where it cancels the countdown back to idle.
    pub fn pause(&mut self) -> bool {
        if self.phase == Phase::CountingDown {
            self.countdown = None;
            self.phase = Phase::Idle;
            info!("countdown cancelled");
            return true;
        }
        if self.phase != Phase::Playing {
            return false;
        }
        let now = self.read_source();
        let t = self.clock.hold(now);
        self.synth.stop_all();
        self.suspend_output();
        self.phase = Phase::Paused;
        info!("paused at {t:.3}s");
        true
    }

    /// Continue from the paused position. Only valid while paused.
    pub fn resume(&mut self) -> bool {
        if self.phase != Phase::Paused {
            return false;
        }
        let from = self.clock.position();
        self.scheduler.seek(&self.song, from);
        self.start_playing(from);
        true
    }

    /// Back to idle with fresh notes and a zero score. Valid from any phase.
    pub fn reset(&mut self) {
        self.synth.stop_all();
        if self.phase != Phase::Idle {
            self.suspend_output();
        }
        self.notes = GameNote::from_song(&self.song);
        self.score = ScoreState::default();
        self.clock.reset();
        self.scheduler.reset();
        self.countdown = None;
        self.completed = false;
        self.phase = Phase::Idle;
        info!("session reset");
    }

    /// Move the playback position. Only valid while playing or paused.
    ///
    /// Judged notes stay judged; active notes left behind are swept as
    /// misses on the next playing tick.
    pub fn seek(&mut self, target: f64) -> bool {
        match self.phase {
            Phase::Playing => {
                self.synth.stop_all();
                let now = self.read_source();
                self.clock.seek(target, now);
                self.scheduler.seek(&self.song, self.clock.position());
            }
            Phase::Paused => {
                self.clock.seek(target, 0.0);
            }
            _ => return false,
        }
        info!("seek to {:.3}s", self.clock.position());
        true
    }

    /// Advance the session by one frame with the latest key snapshot.
    pub fn tick(&mut self, keys: &KeySnapshot) -> TickReport {
        let mut report = TickReport {
            phase: self.phase,
            time: self.clock.position(),
            countdown: None,
            judgments: Vec::new(),
            score_changed: None,
            completed: None,
            notices: Vec::new(),
        };

        if self.phase == Phase::CountingDown {
            self.advance_countdown();
            report.countdown = self.countdown.map(|c| c.remaining);
        }
        if self.phase == Phase::Playing {
            self.playing_tick(keys, &mut report);
        }

        report.phase = self.phase;
        report.notices = std::mem::take(&mut self.notices);
        report
    }

    fn advance_countdown(&mut self) {
        let Some(mut countdown) = self.countdown else {
            return;
        };
        let now = self.wall.now();
        while countdown.remaining > 0 && now >= countdown.next_step_at {
            countdown.remaining -= 1;
            countdown.next_step_at += self.settings.countdown_interval;
        }
        if countdown.remaining == 0 {
            self.countdown = None;
            self.start_playing(0.0);
        } else {
            self.countdown = Some(countdown);
        }
    }

    fn start_playing(&mut self, from: f64) {
        let resumed = match self.synth.output_mut().resume() {
            Ok(()) => true,
            Err(e) => {
                warn!("audio resume failed: {e}");
                self.notices.push(Notice::AudioResumeFailed(e.to_string()));
                false
            }
        };

        let audio_now = if resumed {
            self.synth.output().current_time()
        } else {
            None
        };
        let now = match audio_now {
            Some(now) => {
                self.source = ClockSource::Audio;
                now
            }
            None => {
                self.source = ClockSource::Wall;
                self.wall.now()
            }
        };

        self.clock.start(from, now);
        self.phase = Phase::Playing;
        info!("playing from {from:.3}s on {:?} clock", self.source);
    }

    fn playing_tick(&mut self, keys: &KeySnapshot, report: &mut TickReport) {
        let now = self.read_source();
        let t = self.clock.sample(now);
        let audio = match self.source {
            ClockSource::Audio => Some(AudioTiming {
                now,
                epoch: self.clock.epoch(),
            }),
            ClockSource::Wall => None,
        };

        self.synth.release_finished();
        let scheduled = self.scheduler.tick(&self.song, t, audio, &mut self.synth);
        if let Some(first) = scheduled.errors.first() {
            warn!("{} tone(s) failed to schedule: {first}", scheduled.errors.len());
            self.notices.push(Notice::ScheduleFailed {
                count: scheduled.errors.len(),
                reason: first.to_string(),
            });
        }

        let before = self.score;
        report.judgments = self.judge.judge(&mut self.notes, t, keys, &mut self.score);
        if self.score.score != before.score || self.score.combo != before.combo {
            report.score_changed = Some(self.score);
        }

        if !self.completed && (all_judged(&self.notes) || scheduled.finished) {
            self.completed = true;
            self.clock.hold(now);
            self.phase = Phase::Completed;
            let final_score = FinalScore {
                score: self.score.score,
                max_combo: self.score.max_combo,
            };
            info!(
                "song complete: score {}, max combo {}",
                final_score.score, final_score.max_combo
            );
            report.completed = Some(final_score);
        }

        report.time = t;
    }

    /// Current reading of the active clock source. Falls back to wall-clock
    /// time, without a jump, if the audio clock disappears.
    fn read_source(&mut self) -> f64 {
        if self.source == ClockSource::Audio {
            if let Some(now) = self.synth.output().current_time() {
                return now;
            }
            warn!("audio clock lost; switching to wall clock");
            self.source = ClockSource::Wall;
            let now = self.wall.now();
            self.clock.rebase(now);
            self.notices.push(Notice::AudioClockLost);
            return now;
        }
        self.wall.now()
    }

    fn suspend_output(&mut self) {
        if let Err(e) = self.synth.output_mut().suspend() {
            warn!("audio suspend failed: {e}");
            self.notices.push(Notice::AudioSuspendFailed(e.to_string()));
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn notes(&self) -> &[GameNote] {
        &self.notes
    }

    pub fn song(&self) -> &[TimedNote] {
        &self.song
    }

    pub fn score(&self) -> ScoreState {
        self.score
    }

    /// Last playback position, without reading a clock.
    pub fn time(&self) -> f64 {
        self.clock.position()
    }

    pub fn clock_state(&self) -> ClockState {
        self.clock.state()
    }

    pub fn clock_source(&self) -> ClockSource {
        self.source
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    pub fn synth(&self) -> &SynthEngine<O> {
        &self.synth
    }

    pub fn countdown_remaining(&self) -> Option<u32> {
        self.countdown.map(|c| c.remaining)
    }
}

impl<O: AudioOutput, C: TimeSource> Drop for GameSession<O, C> {
    fn drop(&mut self) {
        self.synth.stop_all();
    }
}
