//! keyfall: headless falling-note player.
//!
//! Plays a note file against the default audio device, judges presses from
//! the piano backend or a MIDI keyboard, and submits the final score.

use std::error::Error;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use log::{error, warn};

use keyfall::audio::{list_output_devices, open_default_output, AudioOutput, SilentOutput};
use keyfall::clock::WallClock;
use keyfall::config::GameConfig;
use keyfall::keys::SharedKeys;
use keyfall::midi::MidiKeySource;
use keyfall::note::{load_notes, TimedNote};
use keyfall::render::{render_to_wav, RenderSettings};
use keyfall::session::{FinalScore, GameSession, Phase};
use keyfall::view::{keyboard_line, KeyHighlights};

const FRAME: Duration = Duration::from_millis(16);

#[derive(Parser)]
#[command(name = "keyfall", version, about = "Falling-note piano rhythm game")]
struct Cli {
    /// Log at debug level unless RUST_LOG says otherwise.
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Play a song and judge key presses.
    Play {
        /// Note file (.json, .yaml or .yml).
        notes: PathBuf,
        /// Song title for score submission (defaults to the file name).
        #[arg(long)]
        title: Option<String>,
        /// Player name; scores are submitted only when set.
        #[arg(long)]
        player: Option<String>,
        /// Skip the audio device and play on wall-clock time.
        #[arg(long)]
        silent: bool,
        /// Where key presses come from.
        #[arg(long, value_enum, default_value_t = KeyInput::Http)]
        keys: KeyInput,
        /// Backend base URL, overriding the config file.
        #[arg(long)]
        backend: Option<String>,
    },
    /// Render a song to a WAV file.
    Render {
        notes: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
        #[arg(long, default_value_t = 44_100)]
        sample_rate: u32,
    },
    /// List audio outputs and MIDI inputs.
    Devices,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum KeyInput {
    Http,
    Midi,
    None,
}

/// Keeps the active key source alive for the length of the session.
#[allow(dead_code)]
enum KeySourceGuard {
    #[cfg(feature = "remote")]
    Http(keyfall::remote::KeyPoller),
    Midi(MidiKeySource),
    None,
}

fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .try_init();

    let result = match cli.command {
        Command::Play {
            notes,
            title,
            player,
            silent,
            keys,
            backend,
        } => play(&notes, title, player, silent, keys, backend),
        Command::Render {
            notes,
            output,
            sample_rate,
        } => render(&notes, &output, sample_rate),
        Command::Devices => {
            devices();
            Ok(())
        }
    };

    if let Err(e) = result {
        error!("{e}");
        std::process::exit(1);
    }
}

/// Load the song; an unreadable file becomes an empty song.
fn load_song(path: &Path) -> Vec<TimedNote> {
    match load_notes(path) {
        Ok(notes) => notes,
        Err(e) => {
            warn!("could not load {}: {e}", path.display());
            eprintln!("! could not load notes, playing an empty song: {e}");
            Vec::new()
        }
    }
}

fn play(
    path: &Path,
    title: Option<String>,
    player: Option<String>,
    silent: bool,
    key_input: KeyInput,
    backend: Option<String>,
) -> Result<(), Box<dyn Error>> {
    let mut config = GameConfig::load().unwrap_or_default();
    if let Some(url) = backend {
        config.backend_url = url;
    }
    if player.is_some() {
        config.player_name = player;
    }
    let title = title.unwrap_or_else(|| {
        path.file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "untitled".to_string())
    });

    let song = load_song(path);
    let output: Box<dyn AudioOutput> = if silent {
        Box::new(SilentOutput)
    } else {
        open_default_output().0
    };

    let keys = SharedKeys::new();
    let _key_source = start_key_source(key_input, &config, keys.clone());

    let quit = Arc::new(AtomicBool::new(false));
    let quit_flag = Arc::clone(&quit);
    ctrlc::set_handler(move || quit_flag.store(true, Ordering::Relaxed))?;

    let keymap = config.keymap();
    let mut session = GameSession::new(song, output, WallClock::new(), config.session_settings());
    session.play();
    println!("♪ {title}");

    let mut last_countdown = None;
    let final_score = loop {
        if quit.load(Ordering::Relaxed) {
            session.reset();
            println!("stopped.");
            return Ok(());
        }

        let pressed = keys.latest();
        let report = session.tick(&pressed);

        for notice in &report.notices {
            eprintln!("! {notice}");
        }
        if report.countdown.is_some() && report.countdown != last_countdown {
            if let Some(n) = report.countdown {
                println!("{n}…");
            }
            last_countdown = report.countdown;
        }
        if let Some(score) = report.score_changed {
            let highlights = KeyHighlights::compute(session.notes(), report.time, keymap);
            println!(
                "{:>7.2}s  {}  score {:>6}  combo {:>3}",
                report.time,
                keyboard_line(&highlights, &pressed, keymap),
                score.score,
                score.combo
            );
        }
        if let Some(done) = report.completed {
            break done;
        }
        if report.phase == Phase::Idle {
            return Ok(());
        }

        thread::sleep(FRAME);
    };

    println!(
        "final score {}  (max combo {})",
        final_score.score, final_score.max_combo
    );
    submit_score(&config, &title, final_score);

    // Let the last tones ring out before the output is dropped.
    thread::sleep(Duration::from_millis(300));
    Ok(())
}

fn start_key_source(input: KeyInput, config: &GameConfig, keys: SharedKeys) -> KeySourceGuard {
    match input {
        #[cfg(feature = "remote")]
        KeyInput::Http => {
            let interval = Duration::from_millis(config.key_poll_interval_ms.max(1));
            match keyfall::remote::KeyPoller::spawn(&config.backend_url, interval, keys) {
                Ok(poller) => KeySourceGuard::Http(poller),
                Err(e) => {
                    eprintln!("! key polling unavailable: {e}");
                    KeySourceGuard::None
                }
            }
        }
        #[cfg(not(feature = "remote"))]
        KeyInput::Http => {
            eprintln!("! built without the `remote` feature; no key input");
            KeySourceGuard::None
        }
        KeyInput::Midi => {
            match MidiKeySource::start(
                config.midi_device.as_deref(),
                config.midi_channel_filter(),
                config.keymap(),
                keys,
            ) {
                Ok(source) => KeySourceGuard::Midi(source),
                Err(e) => {
                    eprintln!("! MIDI input unavailable: {e}");
                    KeySourceGuard::None
                }
            }
        }
        KeyInput::None => KeySourceGuard::None,
    }
}

#[cfg(feature = "remote")]
fn submit_score(config: &GameConfig, title: &str, final_score: FinalScore) {
    use keyfall::remote::{HttpScoreSubmitter, ScoreSubmission, ScoreSubmitter};

    let Some(player) = config.player_name.clone() else {
        return;
    };
    let submission = ScoreSubmission {
        player_name: player,
        song_title: title.to_string(),
        final_score: final_score.score,
    };
    let result = HttpScoreSubmitter::new(&config.backend_url)
        .and_then(|submitter| submitter.submit(&submission));
    match result {
        Ok(()) => println!("score saved for {}", submission.player_name),
        Err(e) => {
            warn!("score submission failed: {e}");
            eprintln!("! could not save score: {e}");
        }
    }
}

#[cfg(not(feature = "remote"))]
fn submit_score(_config: &GameConfig, _title: &str, _final_score: FinalScore) {}

fn render(path: &Path, output: &Path, sample_rate: u32) -> Result<(), Box<dyn Error>> {
    let song = load_notes(path)?;
    let settings = RenderSettings {
        sample_rate,
        master_gain: GameConfig::load().unwrap_or_default().master_gain,
        ..RenderSettings::default()
    };
    render_to_wav(&song, output, settings)?;
    println!("wrote {}", output.display());
    Ok(())
}

fn devices() {
    println!("audio outputs:");
    for name in list_output_devices() {
        println!("  {name}");
    }
    println!("MIDI inputs:");
    for name in MidiKeySource::list_devices() {
        println!("  {name}");
    }
}
