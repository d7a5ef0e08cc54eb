//! HTTP surface: the generation proxy, presets, health and the UI page.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{multipart::MultipartRejection, DefaultBodyLimit, Multipart, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use diaconf::{GenerationDefaults, ProxyConfig};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::Instrument;
use tracing_opentelemetry::OpenTelemetrySpanExt;
use uuid::Uuid;

use crate::error::GenerateError;
use crate::generate::{self, GenerationResult};
use crate::inference::InferenceClient;
use crate::output::{decode_output, DecodedOutput};
use crate::telemetry;

/// Shared, read-only state for handlers.
#[derive(Clone)]
pub struct AppState {
    pub client: Arc<dyn InferenceClient>,
    /// Model identifier (or Gradio endpoint) handed to the client.
    pub model: String,
    pub proxy: ProxyConfig,
    pub defaults: GenerationDefaults,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(
        client: Arc<dyn InferenceClient>,
        model: impl Into<String>,
        proxy: ProxyConfig,
        defaults: GenerationDefaults,
    ) -> Self {
        Self {
            client,
            model: model.into(),
            proxy,
            defaults,
            start_time: Instant::now(),
        }
    }
}

pub fn router(state: AppState) -> Router {
    let body_limit = state.proxy.max_upload_bytes;
    Router::new()
        .route("/", get(serve_ui))
        .route("/api/generate-audio", post(generate_audio))
        .route("/api/defaults", get(serve_defaults))
        .route("/health", get(health))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn generate_audio(
    State(state): State<AppState>,
    headers: HeaderMap,
    multipart: Result<Multipart, MultipartRejection>,
) -> Response {
    let request_id = Uuid::new_v4();
    let span = tracing::info_span!(
        "http.generate_audio",
        request_id = %request_id,
        backend = state.client.name(),
    );
    let traceparent = headers
        .get("traceparent")
        .and_then(|v| v.to_str().ok());
    if let Some(parent) = telemetry::parse_traceparent(traceparent) {
        span.set_parent(parent);
    }

    let result = async {
        let multipart = multipart.map_err(|e| GenerateError::Form(e.body_text()))?;
        run_generation(&state, multipart).await
    }
    .instrument(span.clone())
    .await;

    span.in_scope(|| match result {
        Ok(decoded) => {
            tracing::info!(shape = ?decoded.shape, "✅ Audio generated");
            Json(GenerationResult::success(decoded.url)).into_response()
        }
        Err(e) => {
            tracing::error!(error = %e, "❌ Audio generation failed");
            e.into_response()
        }
    })
}

async fn run_generation(
    state: &AppState,
    multipart: Multipart,
) -> Result<DecodedOutput, GenerateError> {
    let request = generate::parse_form(multipart).await?;

    if state.proxy.strict_params {
        request.validate()?;
    } else {
        let invalid = request.invalid_fields();
        if !invalid.is_empty() {
            tracing::warn!(fields = ?invalid, "Forwarding missing or non-numeric fields as null");
        }
    }

    let input = request.into_input();
    tracing::info!(model = %state.model, input = %input.log_view(), "Calling inference API");
    if tracing::enabled!(tracing::Level::DEBUG) {
        if let Ok(payload) = serde_json::to_string(&input) {
            tracing::debug!(payload = %payload, "Full inference payload");
        }
    }

    let output = state.client.run(&state.model, &input).await?;
    tracing::info!(output = %output, "Raw inference output");

    decode_output(&output).inspect_err(|_| {
        tracing::error!(output = %output, "No playable URL in inference output");
    })
}

async fn serve_defaults(State(state): State<AppState>) -> Json<GenerationDefaults> {
    Json(state.defaults)
}

async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "uptime_secs": state.start_time.elapsed().as_secs(),
        "version": env!("CARGO_PKG_VERSION"),
        "backend": state.client.name(),
    }))
}

async fn serve_ui() -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
        UI_HTML,
    )
}

const UI_HTML: &str = r##"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>diagen</title>
<style>
  body { font-family: system-ui, sans-serif; max-width: 720px; margin: 2rem auto; background: #111; color: #eee; }
  textarea { width: 100%; height: 8rem; background: #222; color: #eee; }
  label { display: block; margin-top: .5rem; }
  input[type=number] { width: 6rem; }
  canvas { width: 100%; height: 120px; background: #000; margin-top: 1rem; }
  #error { color: #f66; white-space: pre-wrap; }
</style>
</head>
<body>
<h1>diagen</h1>
<form id="form">
  <textarea name="text_input" id="text_input"></textarea>
  <label>Audio prompt <input type="file" name="audio_prompt_input" accept="audio/*"></label>
  <label>max_new_tokens <input type="number" name="max_new_tokens" step="1"></label>
  <label>cfg_scale <input type="number" name="cfg_scale" step="0.1"></label>
  <label>temperature <input type="number" name="temperature" step="0.05"></label>
  <label>top_p <input type="number" name="top_p" step="0.05"></label>
  <label>cfg_filter_top_k <input type="number" name="cfg_filter_top_k" step="1"></label>
  <label>speed_factor <input type="number" name="speed_factor" step="0.05"></label>
  <button type="submit" id="submit">Generate</button>
</form>
<div id="error"></div>
<audio id="player" controls crossorigin="anonymous"></audio>
<canvas id="scope" width="720" height="120"></canvas>
<script>
const form = document.getElementById('form');
const player = document.getElementById('player');
const canvas = document.getElementById('scope');
const errorBox = document.getElementById('error');
let graph = null;
let frame = null;

fetch('/api/defaults').then(r => r.json()).then(d => {
  form.text_input.value = d.text;
  for (const k of ['max_new_tokens', 'cfg_scale', 'temperature', 'top_p', 'cfg_filter_top_k', 'speed_factor']) {
    form[k].value = d[k];
  }
});

function bind() {
  if (graph) return graph;
  try {
    const ctx = new AudioContext();
    const analyser = ctx.createAnalyser();
    analyser.fftSize = 256;
    ctx.createMediaElementSource(player).connect(analyser);
    analyser.connect(ctx.destination);
    graph = { ctx, analyser, data: new Uint8Array(analyser.frequencyBinCount) };
  } catch (e) {
    console.error('Audio graph unavailable', e);
    graph = false;
  }
  return graph;
}

function draw() {
  frame = requestAnimationFrame(draw);
  const g2d = canvas.getContext('2d');
  graph.analyser.getByteFrequencyData(graph.data);
  g2d.clearRect(0, 0, canvas.width, canvas.height);
  const barWidth = canvas.width / graph.data.length * 2.5;
  let x = 0;
  for (const v of graph.data) {
    const h = v / 255 * canvas.height;
    g2d.fillStyle = "#0060df";
    g2d.fillRect(x, canvas.height - h, barWidth, h);
    x += barWidth + 1;
  }
}

player.addEventListener('play', () => {
  const g = bind();
  if (!g) return;
  g.ctx.resume();
  if (frame === null) draw();
});
player.addEventListener('pause', () => {
  if (frame !== null) cancelAnimationFrame(frame);
  frame = null;
});

form.addEventListener('submit', async ev => {
  ev.preventDefault();
  errorBox.textContent = '';
  form.submit.disabled = true;
  try {
    const resp = await fetch('/api/generate-audio', { method: 'POST', body: new FormData(form) });
    const result = await resp.json();
    if (result.success) {
      player.src = result.audioDataUrl;
      player.play().catch(e => console.error('Playback failed', e));
    } else {
      errorBox.textContent = result.error + (result.details ? '\n' + result.details : '');
    }
  } catch (e) {
    errorBox.textContent = String(e);
  } finally {
    form.submit.disabled = false;
  }
});
</script>
</body>
</html>
"##;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generate::GenerationInput;
    use crate::output::RemoteOutput;
    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use tower::ServiceExt;

    struct Unused;

    #[async_trait]
    impl InferenceClient for Unused {
        fn name(&self) -> &'static str {
            "unused"
        }

        async fn run(&self, _: &str, _: &GenerationInput) -> Result<RemoteOutput, GenerateError> {
            Err(GenerateError::Remote("not called".into()))
        }
    }

    fn app() -> Router {
        router(AppState::new(
            Arc::new(Unused),
            "owner/model",
            ProxyConfig::default(),
            GenerationDefaults::default(),
        ))
    }

    async fn get_json(uri: &str) -> (StatusCode, serde_json::Value) {
        let response = app()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn test_health() {
        let (status, json) = get_json("/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "healthy");
        assert_eq!(json["backend"], "unused");
        assert!(json["uptime_secs"].is_u64());
    }

    #[tokio::test]
    async fn test_defaults() {
        let (status, json) = get_json("/api/defaults").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["max_new_tokens"], 860);
        assert_eq!(json["cfg_filter_top_k"], 15);
        assert_eq!(json["speed_factor"], 0.8);
    }

    #[tokio::test]
    async fn test_ui_page() {
        let response = app()
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "text/html; charset=utf-8"
        );
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let html = String::from_utf8(body.to_vec()).unwrap();
        assert!(html.contains("fftSize = 256"));
        assert!(html.contains("/api/generate-audio"));
        assert!(html.contains(r##"fillStyle = "#0060df""##));
        assert!(html.trim_end().ends_with("</html>"));
    }

    #[tokio::test]
    async fn test_generate_without_multipart_is_form_error() {
        let response = app()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/generate-audio")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from("{}"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["error"], "Failed to generate audio");
    }
}
