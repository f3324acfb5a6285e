//! Note source: loads the already-parsed song note list from JSON or YAML.
//!
//! Accepted shapes are a bare list of notes or an object with a `notes` list:
//!
//! ```json
//! [{"midi": 60, "time": 0.0, "duration": 0.5, "velocity": 0.8}]
//! ```
//!
//! Notes that cannot take part in a song (negative or non-finite start,
//! non-positive duration) are dropped with a warning. The result is sorted by
//! start time.

use std::io;
use std::path::Path;

use log::warn;
use serde::Deserialize;
use thiserror::Error;

use super::TimedNote;

/// Errors reading a note file.
#[derive(Debug, Error)]
pub enum NoteSourceError {
    #[error("failed to read note file: {0}")]
    Io(#[from] io::Error),
    #[error("invalid JSON note list: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid YAML note list: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("unsupported note file extension: {0:?}")]
    UnsupportedFormat(String),
}

/// Serialization format of a note file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoteFormat {
    Json,
    Yaml,
}

impl NoteFormat {
    /// Pick the format from a file extension.
    pub fn from_path(path: &Path) -> Result<Self, NoteSourceError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        match ext.as_str() {
            "json" => Ok(NoteFormat::Json),
            "yaml" | "yml" => Ok(NoteFormat::Yaml),
            _ => Err(NoteSourceError::UnsupportedFormat(ext)),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NoteDocument {
    List(Vec<TimedNote>),
    Wrapped { notes: Vec<TimedNote> },
}

impl NoteDocument {
    fn into_notes(self) -> Vec<TimedNote> {
        match self {
            NoteDocument::List(notes) | NoteDocument::Wrapped { notes } => notes,
        }
    }
}

/// Load and normalize a note file.
pub fn load_notes(path: &Path) -> Result<Vec<TimedNote>, NoteSourceError> {
    let format = NoteFormat::from_path(path)?;
    let content = std::fs::read_to_string(path)?;
    parse_notes(&content, format)
}

/// Parse and normalize note text in the given format.
pub fn parse_notes(content: &str, format: NoteFormat) -> Result<Vec<TimedNote>, NoteSourceError> {
    let doc: NoteDocument = match format {
        NoteFormat::Json => serde_json::from_str(content)?,
        NoteFormat::Yaml => serde_yaml::from_str(content)?,
    };
    Ok(normalize(doc.into_notes()))
}

/// Drop unplayable notes and sort by start (stable, so simultaneous notes keep
/// their source order).
fn normalize(notes: Vec<TimedNote>) -> Vec<TimedNote> {
    let before = notes.len();
    let mut notes: Vec<TimedNote> = notes.into_iter().filter(TimedNote::is_valid).collect();
    if notes.len() != before {
        warn!("skipped {} malformed note(s)", before - notes.len());
    }
    notes.sort_by(|a, b| a.start.total_cmp(&b.start));
    notes
}
