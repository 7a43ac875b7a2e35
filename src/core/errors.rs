use std::path::PathBuf;
use std::process::ExitStatus;

use reqwest::StatusCode;
use thiserror::Error;

/// Failure of a single snapshot fetch. Never fatal: the owning worker logs
/// the error and retries at its next poll cycle.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("endpoint returned HTTP {0}")]
    HttpStatus(StatusCode),

    #[error("endpoint returned a markup page instead of image data")]
    NotAnImage,

    #[error("payload does not start with a JPEG start-of-image marker")]
    InvalidImageSignature,

    #[error("request timed out")]
    Timeout(#[source] reqwest::Error),

    #[error("network request failed")]
    Network(#[source] reqwest::Error),
}

/// Failure to commit a snapshot to the archive. Never fatal to the worker.
#[derive(Debug, Error)]
pub enum WriteError {
    #[error("failed to write snapshot to disk")]
    Io(#[from] std::io::Error),
}

/// Camera registry problems. Fatal at startup, before any worker spawns.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("camera config file not found: {}", .0.display())]
    Missing(PathBuf),

    #[error("failed to read camera config file")]
    Io(#[source] std::io::Error),

    #[error("camera config file is not valid JSON")]
    Parse(#[from] serde_json::Error),

    #[error("camera `{slug}`: {reason}")]
    Invalid { slug: String, reason: String },

    #[error("unknown camera `{0}`")]
    UnknownCamera(String),
}

/// Failure while assembling a timelapse video.
#[derive(Debug, Error)]
pub enum TimelapseError {
    #[error("ffmpeg is not installed or not on PATH")]
    EncoderMissing,

    #[error("no archived frames matched for camera `{0}`")]
    NoFrames(String),

    #[error("ffmpeg exited with {0}")]
    EncoderFailed(ExitStatus),

    #[error("timelapse assembly failed on a filesystem operation")]
    Io(#[from] std::io::Error),
}
