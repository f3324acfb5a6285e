//! Session scenario tests: full play/judge/score runs on a manual clock.
//!
//! The audio output is an `OfflineOutput` sharing the test's `ManualClock`,
//! so hardware time, wall time and tick times are all under test control.

use keyfall::audio::{OfflineOutput, SilentOutput};
use keyfall::clock::{ClockSource, ManualClock};
use keyfall::judge::{ScoreState, Verdict};
use keyfall::keys::KeySnapshot;
use keyfall::note::{KeyMap, NoteId, TimedNote};
use keyfall::session::{FinalScore, GameSession, Notice, Phase, SessionSettings, TickReport};

type Session = GameSession<OfflineOutput, ManualClock>;

fn settings() -> SessionSettings {
    SessionSettings {
        countdown_steps: 0,
        ..SessionSettings::default()
    }
}

fn note(pitch: u8, start: f64) -> TimedNote {
    TimedNote::new(pitch, start, 0.5, 0.8)
}

fn session(song: Vec<TimedNote>) -> (ManualClock, Session) {
    let clock = ManualClock::new();
    let output = OfflineOutput::with_clock(clock.clone());
    let session = GameSession::new(song, output, clock.clone(), settings());
    (clock, session)
}

fn holding(pitch: u8) -> KeySnapshot {
    KeySnapshot::from_pressed([KeyMap::default().key_for(pitch)])
}

/// Tick at `t` on the shared clock.
fn tick_at(clock: &ManualClock, s: &mut Session, t: f64, keys: &KeySnapshot) -> TickReport {
    clock.set(t);
    s.tick(keys)
}

/// Tick every 10 ms over `[from, to]` (by index, so times don't drift),
/// pressing keys as `keys_at` says.
fn run(
    clock: &ManualClock,
    s: &mut Session,
    from: f64,
    to: f64,
    keys_at: impl Fn(f64) -> KeySnapshot,
) -> Vec<TickReport> {
    let steps = ((to - from) / 0.01).round() as u32;
    (0..=steps)
        .map(|i| {
            let t = from + f64::from(i) * 0.01;
            tick_at(clock, s, t, &keys_at(t))
        })
        .collect()
}

fn assert_note_invariants(s: &Session) {
    for n in s.notes() {
        assert!(!(n.is_hit() && n.is_missed()), "{} both hit and missed", n.id);
        if n.is_active() {
            assert!(!n.is_hit() && !n.is_missed(), "{} active but judged", n.id);
        }
    }
}

#[test]
fn scenario_a_held_key_hits() {
    let (clock, mut s) = session(vec![note(60, 1.0)]);
    assert!(s.play());

    let reports = run(&clock, &mut s, 0.0, 1.05, |t| {
        if (0.95..=1.05).contains(&t) {
            holding(60)
        } else {
            KeySnapshot::new()
        }
    });

    assert!(s.notes()[0].is_hit());
    assert_eq!(s.score().score, 100);
    assert_eq!(s.score().combo, 1);

    let hits: Vec<_> = reports.iter().flat_map(|r| &r.judgments).collect();
    assert_eq!(hits.len(), 1);
    assert!(hits[0].time <= 1.05 + 1e-9);
    assert_eq!(
        hits[0].verdict,
        Verdict::Hit {
            points: 100,
            combo: 1
        }
    );
}

#[test]
fn scenario_b_untouched_note_misses() {
    let (clock, mut s) = session(vec![note(60, 1.0)]);
    s.play();
    let none = KeySnapshot::new();

    tick_at(&clock, &mut s, 1.14, &none);
    assert!(s.notes()[0].is_active());

    let report = tick_at(&clock, &mut s, 1.16, &none);
    assert!(s.notes()[0].is_missed());
    assert_eq!(report.judgments[0].verdict, Verdict::Miss);
    assert_eq!(s.score().combo, 0);
    assert_eq!(s.score().score, 0);
}

#[test]
fn scenario_c_miss_then_hit_on_same_key() {
    let (clock, mut s) = session(vec![note(60, 1.0), note(60, 1.2)]);
    s.play();
    let none = KeySnapshot::new();

    tick_at(&clock, &mut s, 1.0, &none);
    tick_at(&clock, &mut s, 1.1, &none);
    let report = tick_at(&clock, &mut s, 1.2, &holding(60));

    assert!(s.notes()[0].is_missed());
    assert!(s.notes()[1].is_hit());
    assert_eq!(report.judgments.len(), 2);
    assert_eq!(report.judgments[0].id, NoteId(0));
    assert_eq!(report.judgments[0].verdict, Verdict::Miss);
    assert_eq!(
        report.judgments[1].verdict,
        Verdict::Hit {
            points: 100,
            combo: 1
        }
    );
    assert_eq!(
        report.score_changed,
        Some(ScoreState {
            score: 100,
            combo: 1,
            max_combo: 1
        })
    );
}

#[test]
fn scenario_d_empty_song_completes_immediately() {
    let (clock, mut s) = session(Vec::new());
    s.play();
    let report = tick_at(&clock, &mut s, 0.0, &KeySnapshot::new());

    assert_eq!(report.phase, Phase::Completed);
    assert_eq!(
        report.completed,
        Some(FinalScore {
            score: 0,
            max_combo: 0
        })
    );
    assert!(report.judgments.is_empty());
    assert!(s.synth().output().tones().is_empty());

    let again = tick_at(&clock, &mut s, 1.0, &KeySnapshot::new());
    assert_eq!(again.completed, None);
}

#[test]
fn scenario_e_pause_and_resume() {
    let song = vec![note(60, 0.5), note(62, 1.5), note(64, 2.5), note(65, 3.0)];
    let (clock, mut s) = session(song);
    s.play();

    run(&clock, &mut s, 0.0, 2.0, |t| {
        if (t - 0.5).abs() < 0.05 {
            holding(60)
        } else {
            KeySnapshot::new()
        }
    });
    let judged_before: Vec<_> = s.notes().to_vec();
    let score_before = s.score();
    let tones_before = s.synth().output().tones().len();
    assert_eq!(tones_before, 2);

    assert!(s.pause());
    assert_eq!(s.phase(), Phase::Paused);
    assert_eq!(s.synth().output().pending_tones().count(), 0);
    assert!(s.synth().output().is_suspended());

    // Time passes while paused.
    let paused = tick_at(&clock, &mut s, 5.0, &KeySnapshot::new());
    assert!((paused.time - 2.0).abs() < 1e-9);

    assert!(s.resume());
    let report = tick_at(&clock, &mut s, 5.0, &KeySnapshot::new());
    assert_eq!(report.phase, Phase::Playing);
    assert!((report.time - 2.0).abs() < 1e-9);
    assert!(report.judgments.is_empty());
    assert_eq!(s.notes(), judged_before.as_slice());
    assert_eq!(s.score(), score_before);

    tick_at(&clock, &mut s, 5.3, &KeySnapshot::new());
    let tones = s.synth().output().tones();
    assert_eq!(tones.len(), 3);
    // The only new tone is the 2.5 s note, on the re-anchored hardware clock.
    assert!((tones[2].start - 5.5).abs() < 1e-9);
}

#[test]
fn resume_skips_note_that_started_just_before_pause() {
    // 1.97 s lies inside the seek tolerance of the 2.0 s pause point, so
    // resume puts the cursor back on it; it must not sound a second time.
    let song = vec![note(60, 0.5), note(62, 1.97), note(64, 2.5)];
    let (clock, mut s) = session(song);
    s.play();

    run(&clock, &mut s, 0.0, 2.0, |_| KeySnapshot::new());
    assert_eq!(s.synth().output().tones().len(), 2);

    assert!(s.pause());
    clock.set(5.0);
    assert!(s.resume());
    let report = tick_at(&clock, &mut s, 5.0, &KeySnapshot::new());
    assert!((report.time - 2.0).abs() < 1e-9);
    assert_eq!(s.synth().output().tones().len(), 2);

    let report = tick_at(&clock, &mut s, 5.3, &KeySnapshot::new());
    // The skipped note is still judged, and missed once its window closes.
    assert!(report
        .judgments
        .iter()
        .any(|j| j.id == NoteId(1) && j.verdict == Verdict::Miss));

    let after_resume: Vec<f64> = s
        .synth()
        .output()
        .tones()
        .iter()
        .filter(|t| t.start >= 5.0)
        .map(|t| t.start)
        .collect();
    assert_eq!(after_resume.len(), 1);
    assert!((after_resume[0] - 5.5).abs() < 1e-9);
}

#[test]
fn judged_notes_stay_consistent() {
    let song: Vec<TimedNote> = (0..20u32).map(|i| note(48 + (i % 12) as u8, 0.3 * f64::from(i))).collect();
    let (clock, mut s) = session(song);
    s.play();

    let steps: u16 = 700;
    for i in 0..=steps {
        let t = f64::from(i) * 0.01;
        let keys = if i % 7 < 3 {
            KeySnapshot::from_pressed((0..48).filter(|k| k % 3 == i % 3))
        } else {
            KeySnapshot::new()
        };
        let report = tick_at(&clock, &mut s, t, &keys);
        assert_note_invariants(&s);
        if report.judgments.iter().any(|j| j.verdict == Verdict::Miss) {
            // Misses are swept before hits, so only hits from this tick can
            // have rebuilt the combo.
            assert!(report.judgments.last().is_some_and(|j| j.is_hit()) || s.score().combo == 0);
        }
        if s.phase() == Phase::Completed {
            break;
        }
    }
    assert_eq!(s.phase(), Phase::Completed);
    assert!(s.notes().iter().all(|n| !n.is_active()));
}

#[test]
fn identical_inputs_give_identical_results() {
    let song: Vec<TimedNote> = (0..10u32).map(|i| note(60 + i as u8, 0.4 * f64::from(i) + 0.5)).collect();
    let keys_at = |t: f64| {
        let beat = (t * 10.0).round() as u16;
        KeySnapshot::from_pressed([(beat % 48), ((beat + 12) % 48)])
    };

    let (clock_a, mut a) = session(song.clone());
    let (clock_b, mut b) = session(song);
    a.play();
    b.play();
    let ra = run(&clock_a, &mut a, 0.0, 5.0, keys_at);
    let rb = run(&clock_b, &mut b, 0.0, 5.0, keys_at);

    assert_eq!(ra, rb);
    assert_eq!(a.notes(), b.notes());
    assert_eq!(a.score(), b.score());
}

#[test]
fn reset_restores_initial_state() {
    let song = vec![note(60, 0.5), note(62, 1.0)];
    let (clock, mut s) = session(song);
    s.play();
    run(&clock, &mut s, 0.0, 1.5, |_| holding(60));
    assert!(s.score().score > 0);

    s.reset();
    assert_eq!(s.phase(), Phase::Idle);
    assert!(s.notes().iter().all(|n| n.is_active()));
    assert_eq!(s.score(), ScoreState::default());
    assert_eq!(s.time(), 0.0);
    assert_eq!(s.synth().output().pending_tones().count(), 0);

    // Playing again from a later clock reading judges the same way.
    clock.set(10.0);
    assert!(s.play());
    let report = tick_at(&clock, &mut s, 10.5, &holding(60));
    assert!((report.time - 0.5).abs() < 1e-9);
    assert!(s.notes()[0].is_hit());
    assert_eq!(s.score().score, 100);
}

#[test]
fn completion_hands_back_final_score() {
    let song = vec![note(60, 0.5), note(60, 1.0), note(60, 1.5)];
    let (clock, mut s) = session(song);
    s.play();

    let reports = run(&clock, &mut s, 0.0, 2.0, |_| holding(60));
    let done: Vec<_> = reports.iter().filter_map(|r| r.completed).collect();
    assert_eq!(
        done,
        vec![FinalScore {
            score: 100 + 110 + 120,
            max_combo: 3
        }]
    );
}

#[test]
fn silent_play_judges_on_wall_clock() {
    let clock = ManualClock::new();
    let mut s = GameSession::new(vec![note(60, 1.0)], SilentOutput, clock.clone(), settings());
    let first = s.tick(&KeySnapshot::new());
    assert_eq!(first.notices, vec![Notice::AudioUnavailable]);

    clock.set(3.0);
    s.play();
    assert_eq!(s.clock_source(), ClockSource::Wall);

    clock.set(4.0);
    let report = s.tick(&holding(60));
    assert!(report.judgments[0].is_hit());
    assert!(report.notices.is_empty());
}

#[test]
fn failing_transport_does_not_roll_back_phase() {
    let clock = ManualClock::new();
    let mut output = OfflineOutput::with_clock(clock.clone());
    output.set_failing(true);
    let mut s = GameSession::new(vec![note(60, 1.0)], output, clock.clone(), settings());

    assert!(s.play());
    assert_eq!(s.phase(), Phase::Playing);
    let report = tick_at(&clock, &mut s, 0.5, &KeySnapshot::new());
    assert!(matches!(report.notices[0], Notice::AudioResumeFailed(_)));

    assert!(s.pause());
    assert_eq!(s.phase(), Phase::Paused);
    let report = s.tick(&KeySnapshot::new());
    assert!(matches!(report.notices[0], Notice::AudioSuspendFailed(_)));
}

#[test]
fn countdown_precedes_play() {
    let clock = ManualClock::new();
    let output = OfflineOutput::with_clock(clock.clone());
    let mut s = GameSession::new(
        vec![note(60, 0.1)],
        output,
        clock.clone(),
        SessionSettings::default(),
    );
    s.play();

    let seen: Vec<Option<u32>> = [0.0, 1.0, 2.0]
        .iter()
        .map(|&t| tick_at(&clock, &mut s, t, &KeySnapshot::new()).countdown)
        .collect();
    assert_eq!(seen, vec![Some(3), Some(2), Some(1)]);
    assert!(s.synth().output().tones().is_empty());

    let report = tick_at(&clock, &mut s, 3.0, &KeySnapshot::new());
    assert_eq!(report.phase, Phase::Playing);
    assert_eq!(s.synth().output().tones().len(), 1);
}

#[test]
fn seek_forward_skips_and_misses_passed_notes() {
    let song = vec![note(60, 0.5), note(62, 1.0), note(64, 3.0)];
    let (clock, mut s) = session(song);
    s.play();
    tick_at(&clock, &mut s, 0.3, &KeySnapshot::new());
    assert_eq!(s.synth().output().tones().len(), 1);

    assert!(s.seek(2.9));
    assert_eq!(s.synth().output().pending_tones().count(), 0);
    let report = tick_at(&clock, &mut s, 0.3, &KeySnapshot::new());
    assert!((report.time - 2.9).abs() < 1e-9);
    assert_eq!(report.judgments.len(), 2);
    assert!(report.judgments.iter().all(|j| j.verdict == Verdict::Miss));

    let tones = s.synth().output().tones();
    // First note from before the seek, then only the 3.0 s note.
    assert_eq!(tones.len(), 2);
    assert!((tones[1].start - 0.4).abs() < 1e-9);
}
