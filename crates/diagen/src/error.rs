//! Failure kinds for a single generation request.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::generate::GenerationResult;

/// Public message for every failure the remote side (or we) caused.
pub const GENERATE_FAILED: &str = "Failed to generate audio";

/// Public message for requests refused in strict parameter mode.
pub const INVALID_REQUEST: &str = "Invalid request";

#[derive(Debug, Error)]
pub enum GenerateError {
    /// The multipart body could not be read.
    #[error("Malformed form submission: {0}")]
    Form(String),

    /// Missing text or unparseable numbers, only raised when strict mode is on.
    #[error("Invalid request parameters: {0}")]
    InvalidParams(String),

    /// Network failure, non-2xx from the remote API, or a failed prediction.
    #[error("{0}")]
    Remote(String),

    /// None of the output matchers produced a URL.
    #[error("API did not return a valid audio file URL.")]
    InvalidOutput,
}

impl GenerateError {
    pub fn status(&self) -> StatusCode {
        match self {
            GenerateError::InvalidParams(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// The failure half of [`GenerationResult`] for this error.
    pub fn to_result(&self) -> GenerationResult {
        let error = match self {
            GenerateError::InvalidParams(_) => INVALID_REQUEST,
            _ => GENERATE_FAILED,
        };
        GenerationResult::failure(error, Some(self.to_string()))
    }
}

impl From<axum::extract::multipart::MultipartError> for GenerateError {
    fn from(e: axum::extract::multipart::MultipartError) -> Self {
        GenerateError::Form(e.body_text())
    }
}

impl From<reqwest::Error> for GenerateError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_connect() {
            GenerateError::Remote(format!("Inference API unreachable: {}", e))
        } else if e.is_timeout() {
            GenerateError::Remote(format!("Inference API timed out: {}", e))
        } else if e.is_decode() {
            GenerateError::Remote(format!("Failed to decode inference API response: {}", e))
        } else {
            GenerateError::Remote(format!("HTTP error calling inference API: {}", e))
        }
    }
}

impl IntoResponse for GenerateError {
    fn into_response(self) -> Response {
        (self.status(), Json(self.to_result())).into_response()
    }
}
