//! End-to-end scenarios for `POST /api/generate-audio` with a scripted backend.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use diaconf::{GenerationDefaults, ProxyConfig};
use diagen::generate::decode_data_uri;
use diagen::{router, AppState, GenerateError, GenerationInput, GenerationResult, InferenceClient, RemoteOutput};
use serde_json::{json, Value};
use tower::ServiceExt;

const BOUNDARY: &str = "diagen-test-boundary";
const URL: &str = "https://replicate.delivery/out/dialogue.wav";

/// Returns a fixed output and remembers what it was asked.
struct Scripted {
    reply: Result<Value, String>,
    wrap_files: bool,
    seen: Mutex<Vec<(String, GenerationInput)>>,
}

impl Scripted {
    fn ok(reply: Value) -> Arc<Self> {
        Arc::new(Self {
            reply: Ok(reply),
            wrap_files: false,
            seen: Mutex::new(Vec::new()),
        })
    }

    fn wrapped(reply: Value) -> Arc<Self> {
        Arc::new(Self {
            reply: Ok(reply),
            wrap_files: true,
            seen: Mutex::new(Vec::new()),
        })
    }

    fn failing(message: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: Err(message.to_string()),
            wrap_files: false,
            seen: Mutex::new(Vec::new()),
        })
    }

    fn last_input(&self) -> GenerationInput {
        self.seen.lock().unwrap().last().expect("client was not called").1.clone()
    }

    fn calls(&self) -> usize {
        self.seen.lock().unwrap().len()
    }
}

#[async_trait]
impl InferenceClient for Scripted {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn run(&self, model: &str, input: &GenerationInput) -> Result<RemoteOutput, GenerateError> {
        self.seen.lock().unwrap().push((model.to_string(), input.clone()));
        match &self.reply {
            Ok(value) => {
                let output = RemoteOutput::from(value.clone());
                Ok(if self.wrap_files { output.wrap_files() } else { output })
            }
            Err(message) => Err(GenerateError::Remote(message.clone())),
        }
    }
}

fn app(client: Arc<Scripted>, strict: bool) -> Router {
    let proxy = ProxyConfig {
        strict_params: strict,
        ..ProxyConfig::default()
    };
    router(AppState::new(client, "zsxkib/dia:abc", proxy, GenerationDefaults::default()))
}

fn form_body(fields: &[(&str, &str)], audio: Option<(&str, &[u8])>) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    if let Some((mime, bytes)) = audio {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"audio_prompt_input\"; filename=\"prompt.wav\"\r\nContent-Type: {mime}\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

fn standard_fields() -> Vec<(&'static str, &'static str)> {
    vec![
        ("text_input", "[S1] Hello there. [S2] Hi!"),
        ("max_new_tokens", "860"),
        ("cfg_scale", "1.0"),
        ("temperature", "1.0"),
        ("top_p", "0.8"),
        ("cfg_filter_top_k", "15"),
        ("speed_factor", "0.8"),
    ]
}

async fn post(app: Router, body: Vec<u8>) -> (StatusCode, Value) {
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/generate-audio")
                .header(
                    header::CONTENT_TYPE,
                    format!("multipart/form-data; boundary={BOUNDARY}"),
                )
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn test_plain_string_output_succeeds() {
    let client = Scripted::ok(json!(URL));
    let (status, body) = post(app(client.clone(), false), form_body(&standard_fields(), None)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "success": true, "audioDataUrl": URL }));
    assert_eq!(client.seen.lock().unwrap()[0].0, "zsxkib/dia:abc");
}

#[tokio::test]
async fn test_empty_record_output_fails() {
    let client = Scripted::ok(json!({}));
    let (status, body) = post(app(client, false), form_body(&standard_fields(), None)).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        body,
        json!({
            "success": false,
            "error": "Failed to generate audio",
            "details": "API did not return a valid audio file URL."
        })
    );
}

#[tokio::test]
async fn test_wrapped_file_output_succeeds() {
    let client = Scripted::wrapped(json!([URL]));
    let (status, body) = post(app(client, false), form_body(&standard_fields(), None)).await;

    assert_eq!(status, StatusCode::OK);
    let result: GenerationResult = serde_json::from_value(body).unwrap();
    assert_eq!(result, GenerationResult::success(URL));
}

#[tokio::test]
async fn test_wrapped_record_outputs_succeed() {
    for reply in [json!({ "audio": URL }), json!({ "url": URL })] {
        let client = Scripted::wrapped(reply.clone());
        let (status, body) = post(app(client, false), form_body(&standard_fields(), None)).await;

        assert_eq!(status, StatusCode::OK, "reply {}", reply);
        assert_eq!(body, json!({ "success": true, "audioDataUrl": URL }));
    }
}

#[tokio::test]
async fn test_numbers_forwarded_typed() {
    let client = Scripted::ok(json!(URL));
    post(app(client.clone(), false), form_body(&standard_fields(), None)).await;

    let payload = serde_json::to_value(client.last_input()).unwrap();
    assert_eq!(
        payload,
        json!({
            "text": "[S1] Hello there. [S2] Hi!",
            "max_new_tokens": 860,
            "cfg_scale": 1.0,
            "temperature": 1.0,
            "top_p": 0.8,
            "cfg_filter_top_k": 15,
            "speed_factor": 0.8
        })
    );
}

#[tokio::test]
async fn test_no_audio_part_omits_prompt() {
    let client = Scripted::ok(json!(URL));
    post(app(client.clone(), false), form_body(&standard_fields(), None)).await;

    let input = client.last_input();
    assert!(input.audio_prompt.is_none());
    let payload = serde_json::to_value(&input).unwrap();
    assert!(payload.get("audio_prompt").is_none());
}

#[tokio::test]
async fn test_wav_prompt_becomes_data_uri() {
    let wav = b"RIFF\x24\x00\x00\x00WAVEfmt ";
    let client = Scripted::ok(json!(URL));
    post(
        app(client.clone(), false),
        form_body(&standard_fields(), Some(("audio/wav", wav))),
    )
    .await;

    let uri = client.last_input().audio_prompt.expect("audio prompt forwarded");
    assert!(uri.starts_with("data:audio/wav;base64,"));
    let (mime, bytes) = decode_data_uri(&uri).unwrap();
    assert_eq!(mime, "audio/wav");
    assert_eq!(bytes, wav);
}

#[tokio::test]
async fn test_malformed_numbers_forwarded_as_null() {
    let mut fields = standard_fields();
    fields[3] = ("temperature", "warm");
    fields[1] = ("max_new_tokens", "12abc");
    let client = Scripted::ok(json!(URL));
    let (status, _) = post(app(client.clone(), false), form_body(&fields, None)).await;

    assert_eq!(status, StatusCode::OK);
    let payload = serde_json::to_value(client.last_input()).unwrap();
    assert_eq!(payload["temperature"], Value::Null);
    assert_eq!(payload["max_new_tokens"], 12);
}

#[tokio::test]
async fn test_strict_mode_rejects_malformed_numbers() {
    let mut fields = standard_fields();
    fields[3] = ("temperature", "warm");
    let client = Scripted::ok(json!(URL));
    let (status, body) = post(app(client.clone(), true), form_body(&fields, None)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "Invalid request");
    assert!(body["details"].as_str().unwrap().contains("temperature"));
    assert_eq!(client.calls(), 0);
}

#[tokio::test]
async fn test_remote_failure_reports_details() {
    let client = Scripted::failing("Prediction failed: CUDA out of memory");
    let (status, body) = post(app(client, false), form_body(&standard_fields(), None)).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Failed to generate audio");
    assert_eq!(body["details"], "Prediction failed: CUDA out of memory");
}
