use reqwest::StatusCode;
use thiserror::Error;

/// Why a fetch produced no observation.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to weather service failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("weather service answered {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("weather service returned malformed JSON: {0}")]
    Decode(#[from] serde_json::Error),
}
