use std::io;

use reqwest::StatusCode;
use thiserror::Error;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("failed to resolve required path: {0}")]
    Path(String),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Database(#[from] rusqlite::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("{0}")]
    Config(String),
    #[error("invalid input: {0}")]
    Validation(String),
    #[error("{0} not found")]
    NotFound(String),
    #[error("{0} already exists")]
    Conflict(String),
    #[error("places search failed: {0}")]
    Fetch(#[from] FetchError),
}

/// Failures of the outbound places request. Missing fields in an otherwise
/// well-formed payload are not errors; they resolve to sentinel values.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error(transparent)]
    Transport(#[from] reqwest::Error),
    #[error("places endpoint returned HTTP {0}")]
    Status(StatusCode),
    #[error("malformed places payload: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("places API rejected the request ({status}): {message}")]
    Api { status: String, message: String },
}
