//! Offline render integration tests: note file → scheduler → synth → WAV,
//! without audio hardware.

use std::io::Write;

use keyfall::note::{load_notes, total_duration};
use keyfall::render::{render_song, render_to_wav, RenderSettings};
use keyfall::synth::STOP_TAIL;

const SAMPLE_RATE: u32 = 8000;

fn settings() -> RenderSettings {
    RenderSettings {
        sample_rate: SAMPLE_RATE,
        channels: 2,
        ..RenderSettings::default()
    }
}

fn write_song(contents: &str, suffix: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[test]
fn json_song_renders_to_wav() {
    let song_file = write_song(
        r#"[
            {"midi": 64, "time": 0.5, "duration": 0.25, "velocity": 0.7},
            {"midi": 60, "time": 0.0, "duration": 0.5},
            {"midi": 67, "time": 1.0, "duration": 0.5, "velocity": 1.0}
        ]"#,
        ".json",
    );
    let song = load_notes(song_file.path()).unwrap();
    assert_eq!(song.len(), 3);
    assert_eq!(song[0].pitch, 60);

    let out = tempfile::Builder::new().suffix(".wav").tempfile().unwrap();
    render_to_wav(&song, out.path(), settings()).unwrap();

    let mut reader = hound::WavReader::open(out.path()).unwrap();
    let spec = reader.spec();
    assert_eq!(spec.sample_rate, SAMPLE_RATE);
    assert_eq!(spec.channels, 2);

    let expected_frames = ((total_duration(&song) + STOP_TAIL) * f64::from(SAMPLE_RATE)).round();
    assert_eq!(reader.duration(), expected_frames as u32);

    let peak = reader
        .samples::<i16>()
        .map(|s| s.unwrap().unsigned_abs())
        .max()
        .unwrap();
    assert!(peak > 1000, "render is nearly silent: {peak}");
}

#[test]
fn yaml_song_renders_like_json() {
    let json = write_song(r#"{"notes": [{"midi": 69, "time": 0.0, "duration": 0.3}]}"#, ".json");
    let yaml = write_song("notes:\n  - midi: 69\n    time: 0.0\n    duration: 0.3\n", ".yaml");

    let a = render_song(&load_notes(json.path()).unwrap(), settings());
    let b = render_song(&load_notes(yaml.path()).unwrap(), settings());
    assert_eq!(a, b);
    assert!(!a.is_empty());
}

#[test]
fn overlapping_tones_stay_under_ceiling() {
    let chord: Vec<_> = (0..8u8)
        .map(|i| keyfall::note::TimedNote::new(60 + i, 0.0, 0.5, 1.0))
        .collect();
    let samples = render_song(&chord, settings());
    assert!(samples.iter().all(|s| s.abs() <= 0.95));
    assert!(samples.iter().any(|s| s.abs() > 0.9));
}
