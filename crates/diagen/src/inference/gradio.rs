//! Gradio Space call API.
//!
//! A call is two requests: `POST /gradio_api/call/{endpoint}` queues the job
//! and returns an `event_id`, then `GET /gradio_api/call/{endpoint}/{event_id}`
//! streams server-sent events until `complete` or `error`. An audio prompt is
//! uploaded first and referenced by its server-side path.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{ensure_success, inject_trace_context, InferenceClient};
use crate::error::GenerateError;
use crate::generate::{decode_data_uri, GenerationInput};
use crate::output::RemoteOutput;

#[derive(Debug, Deserialize)]
struct QueuedCall {
    event_id: String,
}

/// One server-sent event: the `event:` name and its joined `data:` lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SseEvent {
    pub event: String,
    pub data: String,
}

/// Split an SSE body into events. Comments and unknown fields are skipped.
pub(crate) fn parse_sse(body: &str) -> Vec<SseEvent> {
    let mut events = Vec::new();
    let mut event = String::new();
    let mut data: Vec<&str> = Vec::new();

    for line in body.lines().chain(std::iter::once("")) {
        if line.is_empty() {
            if !event.is_empty() || !data.is_empty() {
                events.push(SseEvent {
                    event: if event.is_empty() { "message".to_string() } else { std::mem::take(&mut event) },
                    data: data.join("\n"),
                });
                data.clear();
            }
            continue;
        }
        if let Some(rest) = line.strip_prefix("event:") {
            event = rest.trim().to_string();
        } else if let Some(rest) = line.strip_prefix("data:") {
            data.push(rest.strip_prefix(' ').unwrap_or(rest));
        }
    }
    events
}

fn extension_for(mime_type: &str) -> &'static str {
    match mime_type {
        "audio/wav" | "audio/x-wav" | "audio/wave" => "wav",
        "audio/mpeg" | "audio/mp3" => "mp3",
        "audio/ogg" => "ogg",
        "audio/flac" | "audio/x-flac" => "flac",
        "audio/webm" => "webm",
        _ => "bin",
    }
}

pub struct GradioClient {
    client: reqwest::Client,
    space: String,
}

impl GradioClient {
    pub fn new(space: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            space: space.trim_end_matches('/').to_string(),
        }
    }

    /// Upload an audio prompt, returning a `FileData` reference to it.
    async fn upload(&self, data_uri: &str) -> Result<Value, GenerateError> {
        let (mime_type, bytes) = decode_data_uri(data_uri).ok_or_else(|| {
            GenerateError::Remote("Audio prompt is not a valid data URI".to_string())
        })?;

        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(format!("audio_prompt.{}", extension_for(&mime_type)))
            .mime_str(&mime_type)?;
        let form = reqwest::multipart::Form::new().part("files", part);

        let url = format!("{}/gradio_api/upload", self.space);
        let resp = inject_trace_context(self.client.post(&url).multipart(form))
            .send()
            .await?;
        let resp = ensure_success(resp).await?;
        let paths: Vec<String> = resp.json().await?;
        let path = paths.into_iter().next().ok_or_else(|| {
            GenerateError::Remote("Upload returned no file path".to_string())
        })?;

        tracing::debug!(path = %path, "Uploaded audio prompt");
        Ok(json!({ "path": path, "meta": { "_type": "gradio.FileData" } }))
    }

    async fn call_data(&self, input: &GenerationInput) -> Result<Value, GenerateError> {
        let audio = match &input.audio_prompt {
            Some(uri) => self.upload(uri).await?,
            None => Value::Null,
        };
        Ok(json!({
            "data": [
                input.text.clone().unwrap_or_default(),
                audio,
                input.max_new_tokens,
                input.cfg_scale,
                input.temperature,
                input.top_p,
                input.cfg_filter_top_k,
                input.speed_factor,
            ]
        }))
    }
}

#[async_trait]
impl InferenceClient for GradioClient {
    fn name(&self) -> &'static str {
        "gradio"
    }

    #[tracing::instrument(name = "gradio.run", skip(self, input))]
    async fn run(&self, endpoint: &str, input: &GenerationInput) -> Result<RemoteOutput, GenerateError> {
        let call_url = format!("{}/gradio_api/call/{}", self.space, endpoint.trim_start_matches('/'));
        let body = self.call_data(input).await?;

        let resp = inject_trace_context(self.client.post(&call_url).json(&body))
            .send()
            .await?;
        let queued: QueuedCall = ensure_success(resp).await?.json().await?;
        tracing::info!(event_id = %queued.event_id, "Gradio call queued");

        let result_url = format!("{}/{}", call_url, queued.event_id);
        let resp = inject_trace_context(self.client.get(&result_url)).send().await?;
        let stream = ensure_success(resp).await?.text().await?;

        for event in parse_sse(&stream) {
            match event.event.as_str() {
                "complete" => {
                    let data: Value = serde_json::from_str(&event.data).map_err(|e| {
                        GenerateError::Remote(format!("Malformed completion payload: {}", e))
                    })?;
                    return Ok(RemoteOutput::from(data).wrap_files());
                }
                "error" => {
                    let reason = match event.data.as_str() {
                        "" | "null" => "unknown error",
                        other => other,
                    };
                    return Err(GenerateError::Remote(format!(
                        "Gradio call failed: {}",
                        reason
                    )));
                }
                other => tracing::trace!(event = %other, "Skipping event"),
            }
        }

        Err(GenerateError::Remote(
            "Gradio stream ended without a result".to_string(),
        ))
    }
}
