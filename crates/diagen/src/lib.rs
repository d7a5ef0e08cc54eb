//! diagen - proxy for text-to-dialogue audio generation.
//!
//! A browser form is posted to `/api/generate-audio`; the request is turned
//! into a model payload, sent to a hosted inference API, and whatever comes
//! back is reduced to one playable audio URL.

pub mod error;
pub mod generate;
pub mod inference;
pub mod output;
pub mod telemetry;
pub mod web;

pub use error::GenerateError;
pub use generate::{GenerationInput, GenerationResult};
pub use inference::InferenceClient;
pub use output::{decode_output, RemoteOutput};
pub use web::{router, AppState};
