//! Clients for hosted inference APIs.
//!
//! Each backend turns a [`GenerationInput`] into whatever the remote returns,
//! as a [`RemoteOutput`]. Picking the URL out of it is `output`'s job.

mod gradio;
mod replicate;

pub use gradio::GradioClient;
pub use replicate::ReplicateClient;

use std::sync::Arc;

use async_trait::async_trait;
use diaconf::{Backend, RemoteConfig};

use crate::error::GenerateError;
use crate::generate::GenerationInput;
use crate::output::RemoteOutput;

#[async_trait]
pub trait InferenceClient: Send + Sync {
    /// Backend name for logs and health.
    fn name(&self) -> &'static str;

    /// Run `model` on `input` and wait for its output. No timeout is applied
    /// here; the call lasts as long as the remote takes.
    async fn run(&self, model: &str, input: &GenerationInput) -> Result<RemoteOutput, GenerateError>;
}

/// Build the client selected by `[remote] backend`, plus the model identifier
/// to pass to it.
pub fn from_config(config: &RemoteConfig) -> (Arc<dyn InferenceClient>, String) {
    match config.backend {
        Backend::Replicate => {
            let token = std::env::var(&config.api_token_env).ok().filter(|t| !t.is_empty());
            if token.is_none() {
                tracing::warn!(
                    env = %config.api_token_env,
                    "No API token set, requests will be sent unauthenticated"
                );
            }
            let client = ReplicateClient::new(&config.base_url, token)
                .with_poll_interval(std::time::Duration::from_millis(config.poll_interval_ms));
            (Arc::new(client), config.model.clone())
        }
        Backend::Gradio => (
            Arc::new(GradioClient::new(&config.gradio_space)),
            config.gradio_endpoint.clone(),
        ),
    }
}

/// Attach a W3C `traceparent` for the current span, when there is one.
pub(crate) fn inject_trace_context(builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
    match crate::telemetry::current_traceparent() {
        Some(traceparent) => builder.header("traceparent", traceparent),
        None => builder,
    }
}

/// Turn a non-2xx response into a `Remote` error carrying status and body.
pub(crate) async fn ensure_success(
    resp: reqwest::Response,
) -> Result<reqwest::Response, GenerateError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    let url = resp.url().to_string();
    let error_body = resp
        .text()
        .await
        .unwrap_or_else(|_| "<failed to read error body>".to_string());
    Err(GenerateError::Remote(format!(
        "Request to {} failed with status {}: {}",
        url, status, error_body
    )))
}
