//! GradioClient against a mock Space.

use diagen::generate::{AudioPrompt, GenerationRequest, RawFields};
use diagen::inference::GradioClient;
use diagen::{decode_output, GenerateError, GenerationInput, InferenceClient};
use serde_json::json;
use wiremock::matchers::{body_json, body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn raw() -> RawFields {
    RawFields {
        text_input: Some("[S1] Testing.".to_string()),
        max_new_tokens: Some("860".to_string()),
        cfg_scale: Some("1.0".to_string()),
        temperature: Some("1.0".to_string()),
        top_p: Some("0.8".to_string()),
        cfg_filter_top_k: Some("15".to_string()),
        speed_factor: Some("0.8".to_string()),
    }
}

fn input(audio: Option<AudioPrompt>) -> GenerationInput {
    GenerationRequest::from_fields(raw(), audio).into_input()
}

fn sse(events: &[(&str, &str)]) -> String {
    events
        .iter()
        .map(|(event, data)| format!("event: {}\ndata: {}\n\n", event, data))
        .collect()
}

#[tokio::test]
async fn test_call_then_stream_complete() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/gradio_api/call/generate_audio"))
        .and(body_json(json!({
            "data": ["[S1] Testing.", null, 860, 1.0, 1.0, 0.8, 15, 0.8]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "event_id": "ev1" })))
        .expect(1)
        .mount(&server)
        .await;

    let body = sse(&[
        ("generating", "null"),
        (
            "complete",
            r#"[{"path": "/tmp/gradio/out.wav", "url": "https://space.hf.space/file=out.wav", "meta": {"_type": "gradio.FileData"}}]"#,
        ),
    ]);
    Mock::given(method("GET"))
        .and(path("/gradio_api/call/generate_audio/ev1"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .mount(&server)
        .await;

    let output = GradioClient::new(&server.uri())
        .run("generate_audio", &input(None))
        .await
        .unwrap();
    assert_eq!(
        decode_output(&output).unwrap().url,
        "https://space.hf.space/file=out.wav"
    );
}

#[tokio::test]
async fn test_audio_prompt_is_uploaded_first() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/gradio_api/upload"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!(["/tmp/gradio/prompt.wav"])))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/gradio_api/call/generate_audio"))
        .and(body_partial_json(json!({
            "data": [
                "[S1] Testing.",
                { "path": "/tmp/gradio/prompt.wav", "meta": { "_type": "gradio.FileData" } }
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "event_id": "ev2" })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/gradio_api/call/generate_audio/ev2"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            sse(&[("complete", r#"["https://space.hf.space/file=out.wav"]"#)]),
            "text/event-stream",
        ))
        .mount(&server)
        .await;

    let prompt = AudioPrompt {
        bytes: b"RIFF....WAVE".to_vec(),
        mime_type: "audio/wav".to_string(),
    };
    let output = GradioClient::new(&server.uri())
        .run("generate_audio", &input(Some(prompt)))
        .await
        .unwrap();
    assert_eq!(
        decode_output(&output).unwrap().url,
        "https://space.hf.space/file=out.wav"
    );
}

#[tokio::test]
async fn test_error_event_is_remote_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/gradio_api/call/generate_audio"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "event_id": "ev3" })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/gradio_api/call/generate_audio/ev3"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            sse(&[("error", "null")]),
            "text/event-stream",
        ))
        .mount(&server)
        .await;

    let err = GradioClient::new(&server.uri())
        .run("generate_audio", &input(None))
        .await
        .unwrap_err();
    match err {
        GenerateError::Remote(message) => assert_eq!(message, "Gradio call failed: unknown error"),
        other => panic!("expected remote error, got {:?}", other),
    }
}
