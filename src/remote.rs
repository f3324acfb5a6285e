//! Backend HTTP boundary: key-state polling and score submission.
//!
//! Both talk to the piano backend over plain JSON. Failures here are never
//! fatal to a session: a failed poll keeps the previous key snapshot, and a
//! failed submission is reported to the player after the song.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use log::{info, warn};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::keys::{KeySnapshot, SharedKeys};
use crate::note::KeyId;

const USER_AGENT: &str = concat!("keyfall/", env!("CARGO_PKG_VERSION"));
const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);
/// Message used when the backend rejects a submission without saying why.
const DEFAULT_SUBMIT_ERROR: &str = "could not register the player";

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("backend returned {status}: {message}")]
    Status { status: u16, message: String },
    #[error("bad payload: {0}")]
    Payload(#[from] serde_json::Error),
}

#[derive(Debug, Deserialize)]
struct KeyState {
    id: KeyId,
    pressed: bool,
}

#[derive(Debug, Deserialize)]
struct KeysResponse {
    keys: Vec<KeyState>,
}

/// Parse a `GET /api/keys` body into a snapshot of the pressed keys.
pub fn parse_key_payload(body: &str) -> Result<KeySnapshot, RemoteError> {
    let response: KeysResponse = serde_json::from_str(body)?;
    Ok(KeySnapshot::from_pressed(
        response.keys.into_iter().filter(|k| k.pressed).map(|k| k.id),
    ))
}

fn http_client() -> Result<Client, RemoteError> {
    Ok(Client::builder()
        .user_agent(USER_AGENT)
        .timeout(REQUEST_TIMEOUT)
        .build()?)
}

fn fetch_keys(client: &Client, url: &str) -> Result<KeySnapshot, RemoteError> {
    let response = client.get(url).send()?;
    let status = response.status();
    if !status.is_success() {
        return Err(RemoteError::Status {
            status: status.as_u16(),
            message: "failed to fetch keys".to_string(),
        });
    }
    parse_key_payload(&response.text()?)
}

/// Background thread polling the backend's key state into a [`SharedKeys`].
pub struct KeyPoller {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl KeyPoller {
    pub fn spawn(
        base_url: &str,
        interval: Duration,
        keys: SharedKeys,
    ) -> Result<Self, RemoteError> {
        let client = http_client()?;
        let url = format!("{}/api/keys", base_url.trim_end_matches('/'));
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = Arc::clone(&stop);

        info!("polling keys from {url} every {}ms", interval.as_millis());
        let handle = std::thread::spawn(move || {
            let mut healthy = true;
            while !stop_flag.load(Ordering::Relaxed) {
                match fetch_keys(&client, &url) {
                    Ok(snapshot) => {
                        if !healthy {
                            info!("key polling recovered");
                        }
                        healthy = true;
                        keys.publish(snapshot);
                    }
                    Err(e) => {
                        // Keep the last snapshot; warn once per outage.
                        if healthy {
                            warn!("key poll failed: {e}");
                        }
                        healthy = false;
                    }
                }
                std::thread::sleep(interval);
            }
        });

        Ok(Self {
            stop,
            handle: Some(handle),
        })
    }

    /// Stop polling and wait for the thread to exit.
    pub fn stop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("key poller thread panicked");
            }
        }
    }
}

impl Drop for KeyPoller {
    fn drop(&mut self) {
        self.stop();
    }
}

/// A finished song to record for a player.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoreSubmission {
    pub player_name: String,
    pub song_title: String,
    pub final_score: u64,
}

#[derive(Debug, Serialize)]
struct PlayerSong<'a> {
    title: &'a str,
    score: u64,
}

#[derive(Debug, Serialize)]
struct CreatePlayerRequest<'a> {
    name: &'a str,
    songs: Vec<PlayerSong<'a>>,
}

impl ScoreSubmission {
    /// JSON body for `POST /api/players`.
    pub fn to_json(&self) -> Result<String, RemoteError> {
        let request = CreatePlayerRequest {
            name: &self.player_name,
            songs: vec![PlayerSong {
                title: &self.song_title,
                score: self.final_score,
            }],
        };
        Ok(serde_json::to_string(&request)?)
    }
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: Option<serde_json::Value>,
    errors: Option<Vec<String>>,
}

/// Human-readable message from a rejected submission's body: the `error`
/// string if present, else the `errors` list joined by newlines.
pub fn error_message(body: &str) -> Option<String> {
    let parsed: ErrorBody = serde_json::from_str(body).ok()?;
    if let Some(serde_json::Value::String(message)) = parsed.error {
        return Some(message);
    }
    parsed
        .errors
        .filter(|errors| !errors.is_empty())
        .map(|errors| errors.join("\n"))
}

/// Where finished scores go.
pub trait ScoreSubmitter {
    fn submit(&self, submission: &ScoreSubmission) -> Result<(), RemoteError>;
}

/// Submits scores to the backend's player registry.
pub struct HttpScoreSubmitter {
    client: Client,
    url: String,
}

impl HttpScoreSubmitter {
    pub fn new(base_url: &str) -> Result<Self, RemoteError> {
        Ok(Self {
            client: http_client()?,
            url: format!("{}/api/players", base_url.trim_end_matches('/')),
        })
    }
}

impl ScoreSubmitter for HttpScoreSubmitter {
    fn submit(&self, submission: &ScoreSubmission) -> Result<(), RemoteError> {
        let response = self
            .client
            .post(&self.url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(submission.to_json()?)
            .send()?;

        let status = response.status();
        if status.is_success() {
            info!(
                "submitted {} for {} on {}",
                submission.final_score, submission.player_name, submission.song_title
            );
            return Ok(());
        }

        let body = response.text().unwrap_or_default();
        Err(RemoteError::Status {
            status: status.as_u16(),
            message: error_message(&body).unwrap_or_else(|| DEFAULT_SUBMIT_ERROR.to_string()),
        })
    }
}
