use thiserror::Error;

use crate::engine::EngineState;

pub use anyhow::Context;

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Reqwest(#[from] reqwest::Error),
    #[error("cannot move engine from {from:?} to {to:?}")]
    InvalidTransition { from: EngineState, to: EngineState },
    #[error("{0}")]
    Message(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl AppError {
    pub fn message<T: Into<String>>(msg: T) -> Self {
        AppError::Message(msg.into())
    }
}

/// Failure of a single batch request. Never fatal to a run.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("remote service answered with status {status}")]
    Status { status: reqwest::StatusCode },
    #[error("malformed payload: {0}")]
    Malformed(String),
}

impl FetchError {
    pub fn malformed<T: Into<String>>(msg: T) -> Self {
        FetchError::Malformed(msg.into())
    }
}
