//! Generation requests: form parsing, the outgoing payload, and the result
//! shape returned to the browser.
//!
//! Numbers arrive as strings and are parsed the way a browser's
//! `parseInt`/`parseFloat` would. Anything unparseable is kept as
//! [`Lenient::Invalid`] and forwarded as JSON `null`, which is what the
//! remote API would see from a NaN.

use axum::extract::Multipart;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::{Deserialize, Serialize, Serializer};

use crate::error::GenerateError;

/// Used when the uploaded part carries no content type.
pub const FALLBACK_MIME: &str = "application/octet-stream";

// --- Lenient numbers ---

/// A form number that either parsed or did not.
#[derive(Debug, Clone, PartialEq)]
pub enum Lenient<T> {
    Parsed(T),
    /// Raw text that failed to parse, `None` when the field was absent.
    Invalid(Option<String>),
}

impl<T> Lenient<T> {
    pub fn is_invalid(&self) -> bool {
        matches!(self, Lenient::Invalid(_))
    }

    pub fn parsed(&self) -> Option<&T> {
        match self {
            Lenient::Parsed(v) => Some(v),
            Lenient::Invalid(_) => None,
        }
    }
}

impl Lenient<i64> {
    pub fn parse_int(raw: Option<&str>) -> Self {
        match raw.and_then(parse_int_prefix) {
            Some(v) => Lenient::Parsed(v),
            None => Lenient::Invalid(raw.map(str::to_string)),
        }
    }
}

impl Lenient<f64> {
    pub fn parse_float(raw: Option<&str>) -> Self {
        match raw.and_then(parse_float_prefix) {
            Some(v) => Lenient::Parsed(v),
            None => Lenient::Invalid(raw.map(str::to_string)),
        }
    }
}

impl<T: Serialize> Serialize for Lenient<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Lenient::Parsed(v) => v.serialize(serializer),
            Lenient::Invalid(_) => serializer.serialize_none(),
        }
    }
}

/// Longest leading integer, `parseInt` style: `" 12abc"` → 12, `"1.9"` → 1,
/// `"0x1f"` → 31.
pub fn parse_int_prefix(raw: &str) -> Option<i64> {
    let s = raw.trim_start();
    let (negative, s) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };

    let (radix, digits) = match s.get(..2) {
        Some("0x") | Some("0X") => (16, &s[2..]),
        _ => (10, s),
    };

    let end = digits
        .char_indices()
        .find(|(_, c)| !c.is_digit(radix))
        .map(|(i, _)| i)
        .unwrap_or(digits.len());
    if end == 0 {
        return None;
    }

    // Digits are validated above, so the only failure left is overflow.
    // parseInt would keep a huge float there; the field is integer-typed, so
    // saturate instead of dropping the value to null.
    let magnitude = i64::from_str_radix(&digits[..end], radix).unwrap_or(i64::MAX);
    Some(if negative { -magnitude } else { magnitude })
}

/// Longest leading decimal literal, `parseFloat` style: `"0.8xyz"` → 0.8,
/// `".5"` → 0.5, `"1e3"` → 1000, `"Infinity"` → ∞.
pub fn parse_float_prefix(raw: &str) -> Option<f64> {
    let s = raw.trim_start();
    let bytes = s.as_bytes();
    let mut i = 0;

    if matches!(bytes.first(), Some(b'+') | Some(b'-')) {
        i += 1;
    }
    if s[i..].starts_with("Infinity") {
        return Some(if bytes[0] == b'-' {
            f64::NEG_INFINITY
        } else {
            f64::INFINITY
        });
    }

    let int_start = i;
    while i < bytes.len() && bytes[i].is_ascii_digit() {
        i += 1;
    }
    let mut mantissa_digits = i - int_start;

    if i < bytes.len() && bytes[i] == b'.' {
        let frac_start = i + 1;
        let mut j = frac_start;
        while j < bytes.len() && bytes[j].is_ascii_digit() {
            j += 1;
        }
        mantissa_digits += j - frac_start;
        if mantissa_digits > 0 {
            i = j;
        }
    }
    if mantissa_digits == 0 {
        return None;
    }

    // Exponent only counts when at least one digit follows it
    if i < bytes.len() && (bytes[i] == b'e' || bytes[i] == b'E') {
        let mut j = i + 1;
        if j < bytes.len() && (bytes[j] == b'+' || bytes[j] == b'-') {
            j += 1;
        }
        let exp_start = j;
        while j < bytes.len() && bytes[j].is_ascii_digit() {
            j += 1;
        }
        if j > exp_start {
            i = j;
        }
    }

    s[..i].parse().ok()
}

// --- Request ---

/// The uploaded reference clip.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioPrompt {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

impl AudioPrompt {
    pub fn data_uri(&self) -> String {
        audio_data_uri(&self.mime_type, &self.bytes)
    }
}

/// `data:<mime>;base64,<payload>`
pub fn audio_data_uri(mime_type: &str, bytes: &[u8]) -> String {
    format!("data:{};base64,{}", mime_type, BASE64.encode(bytes))
}

/// Split a base64 data URI back into its MIME type and bytes.
pub fn decode_data_uri(uri: &str) -> Option<(String, Vec<u8>)> {
    let rest = uri.strip_prefix("data:")?;
    let (mime, payload) = rest.split_once(";base64,")?;
    let bytes = BASE64.decode(payload).ok()?;
    Some((mime.to_string(), bytes))
}

/// One form submission, as parsed.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub text: Option<String>,
    pub audio_prompt: Option<AudioPrompt>,
    pub max_new_tokens: Lenient<i64>,
    pub cfg_scale: Lenient<f64>,
    pub temperature: Lenient<f64>,
    pub top_p: Lenient<f64>,
    pub cfg_filter_top_k: Lenient<i64>,
    pub speed_factor: Lenient<f64>,
}

/// Raw string values as they came off the form.
#[derive(Debug, Default)]
pub struct RawFields {
    pub text_input: Option<String>,
    pub max_new_tokens: Option<String>,
    pub cfg_scale: Option<String>,
    pub temperature: Option<String>,
    pub top_p: Option<String>,
    pub cfg_filter_top_k: Option<String>,
    pub speed_factor: Option<String>,
}

impl GenerationRequest {
    pub fn from_fields(raw: RawFields, audio_prompt: Option<AudioPrompt>) -> Self {
        Self {
            text: raw.text_input,
            audio_prompt,
            max_new_tokens: Lenient::parse_int(raw.max_new_tokens.as_deref()),
            cfg_scale: Lenient::parse_float(raw.cfg_scale.as_deref()),
            temperature: Lenient::parse_float(raw.temperature.as_deref()),
            top_p: Lenient::parse_float(raw.top_p.as_deref()),
            cfg_filter_top_k: Lenient::parse_int(raw.cfg_filter_top_k.as_deref()),
            speed_factor: Lenient::parse_float(raw.speed_factor.as_deref()),
        }
    }

    /// Names of fields that are missing or did not parse.
    pub fn invalid_fields(&self) -> Vec<&'static str> {
        let mut invalid = Vec::new();
        if self.text.as_deref().map_or(true, str::is_empty) {
            invalid.push("text_input");
        }
        if self.max_new_tokens.is_invalid() {
            invalid.push("max_new_tokens");
        }
        if self.cfg_scale.is_invalid() {
            invalid.push("cfg_scale");
        }
        if self.temperature.is_invalid() {
            invalid.push("temperature");
        }
        if self.top_p.is_invalid() {
            invalid.push("top_p");
        }
        if self.cfg_filter_top_k.is_invalid() {
            invalid.push("cfg_filter_top_k");
        }
        if self.speed_factor.is_invalid() {
            invalid.push("speed_factor");
        }
        invalid
    }

    /// Strict-mode check.
    pub fn validate(&self) -> Result<(), GenerateError> {
        let invalid = self.invalid_fields();
        if invalid.is_empty() {
            Ok(())
        } else {
            Err(GenerateError::InvalidParams(format!(
                "missing or non-numeric: {}",
                invalid.join(", ")
            )))
        }
    }

    /// Build the remote payload, encoding the audio prompt as a data URI.
    pub fn into_input(self) -> GenerationInput {
        GenerationInput {
            text: self.text,
            max_new_tokens: self.max_new_tokens,
            cfg_scale: self.cfg_scale,
            temperature: self.temperature,
            top_p: self.top_p,
            cfg_filter_top_k: self.cfg_filter_top_k,
            speed_factor: self.speed_factor,
            audio_prompt: self.audio_prompt.as_ref().map(AudioPrompt::data_uri),
        }
    }
}

/// Read the multipart body into a [`GenerationRequest`].
///
/// Never rejects on content: bad numbers become [`Lenient::Invalid`].
/// A blank `audio_prompt_input` (no filename, no bytes) counts as absent.
pub async fn parse_form(mut multipart: Multipart) -> Result<GenerationRequest, GenerateError> {
    let mut raw = RawFields::default();
    let mut audio_prompt = None;

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "audio_prompt_input" => {
                let has_filename = field.file_name().is_some_and(|f| !f.is_empty());
                let mime_type = field
                    .content_type()
                    .filter(|m| !m.is_empty())
                    .unwrap_or(FALLBACK_MIME)
                    .to_string();
                let bytes = field.bytes().await?;
                if bytes.is_empty() && !has_filename {
                    continue;
                }
                tracing::debug!(mime_type = %mime_type, size = bytes.len(), "Received audio prompt");
                audio_prompt = Some(AudioPrompt {
                    bytes: bytes.to_vec(),
                    mime_type,
                });
            }
            "text_input" => raw.text_input = Some(field.text().await?),
            "max_new_tokens" => raw.max_new_tokens = Some(field.text().await?),
            "cfg_scale" => raw.cfg_scale = Some(field.text().await?),
            "temperature" => raw.temperature = Some(field.text().await?),
            "top_p" => raw.top_p = Some(field.text().await?),
            "cfg_filter_top_k" => raw.cfg_filter_top_k = Some(field.text().await?),
            "speed_factor" => raw.speed_factor = Some(field.text().await?),
            other => {
                tracing::debug!(field = %other, "Ignoring unknown form field");
            }
        }
    }

    Ok(GenerationRequest::from_fields(raw, audio_prompt))
}

// --- Outgoing payload ---

/// The `input` object sent to the model. `audio_prompt` is omitted, not
/// null, when no clip was uploaded.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationInput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    pub max_new_tokens: Lenient<i64>,
    pub cfg_scale: Lenient<f64>,
    pub temperature: Lenient<f64>,
    pub top_p: Lenient<f64>,
    pub cfg_filter_top_k: Lenient<i64>,
    pub speed_factor: Lenient<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_prompt: Option<String>,
}

impl GenerationInput {
    /// Payload for logs, with the audio data URI replaced by its length.
    pub fn log_view(&self) -> serde_json::Value {
        let mut value = serde_json::to_value(self).unwrap_or_default();
        if let (Some(uri), Some(obj)) = (&self.audio_prompt, value.as_object_mut()) {
            obj.insert(
                "audio_prompt".to_string(),
                serde_json::json!(format!("<data uri, {} chars>", uri.len())),
            );
        }
        value
    }
}

// --- Result ---

/// What the browser gets back. Exactly one of URL or error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "WireResult", try_from = "WireResult")]
pub enum GenerationResult {
    Success { audio_url: String },
    Failure { error: String, details: Option<String> },
}

impl GenerationResult {
    pub fn success(audio_url: impl Into<String>) -> Self {
        GenerationResult::Success {
            audio_url: audio_url.into(),
        }
    }

    pub fn failure(error: impl Into<String>, details: Option<String>) -> Self {
        GenerationResult::Failure {
            error: error.into(),
            details,
        }
    }
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireResult {
    success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    audio_data_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl From<GenerationResult> for WireResult {
    fn from(result: GenerationResult) -> Self {
        match result {
            GenerationResult::Success { audio_url } => WireResult {
                success: true,
                audio_data_url: Some(audio_url),
                error: None,
                details: None,
            },
            GenerationResult::Failure { error, details } => WireResult {
                success: false,
                audio_data_url: None,
                error: Some(error),
                details,
            },
        }
    }
}

impl TryFrom<WireResult> for GenerationResult {
    type Error = String;

    fn try_from(wire: WireResult) -> Result<Self, Self::Error> {
        match (wire.success, wire.audio_data_url, wire.error) {
            (true, Some(audio_url), None) => Ok(GenerationResult::Success { audio_url }),
            (false, None, Some(error)) => Ok(GenerationResult::Failure {
                error,
                details: wire.details,
            }),
            _ => Err("result must carry either audioDataUrl or error".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_int_prefix() {
        assert_eq!(parse_int_prefix("860"), Some(860));
        assert_eq!(parse_int_prefix("  15 "), Some(15));
        assert_eq!(parse_int_prefix("12abc"), Some(12));
        assert_eq!(parse_int_prefix("1.9"), Some(1));
        assert_eq!(parse_int_prefix("-7"), Some(-7));
        assert_eq!(parse_int_prefix("0x1f"), Some(31));
        assert_eq!(parse_int_prefix("abc"), None);
        assert_eq!(parse_int_prefix(""), None);
        assert_eq!(parse_int_prefix("-"), None);
        assert_eq!(parse_int_prefix("99999999999999999999"), Some(i64::MAX));
        assert_eq!(parse_int_prefix("-99999999999999999999"), Some(-i64::MAX));
    }

    #[test]
    fn test_parse_float_prefix() {
        assert_eq!(parse_float_prefix("0.8"), Some(0.8));
        assert_eq!(parse_float_prefix("0.8xyz"), Some(0.8));
        assert_eq!(parse_float_prefix(".5"), Some(0.5));
        assert_eq!(parse_float_prefix("3."), Some(3.0));
        assert_eq!(parse_float_prefix("1e3"), Some(1000.0));
        assert_eq!(parse_float_prefix("2e"), Some(2.0));
        assert_eq!(parse_float_prefix("-Infinity"), Some(f64::NEG_INFINITY));
        assert_eq!(parse_float_prefix("."), None);
        assert_eq!(parse_float_prefix("nope"), None);
    }

    #[test]
    fn test_invalid_numbers_serialize_as_null() {
        let request = GenerationRequest::from_fields(
            RawFields {
                text_input: Some("hello".to_string()),
                max_new_tokens: Some("lots".to_string()),
                cfg_scale: Some("1".to_string()),
                temperature: Some("1.0".to_string()),
                top_p: Some("0.8".to_string()),
                cfg_filter_top_k: Some("15".to_string()),
                speed_factor: None,
            },
            None,
        );
        let json = serde_json::to_value(request.into_input()).unwrap();
        assert_eq!(json["max_new_tokens"], serde_json::Value::Null);
        assert_eq!(json["speed_factor"], serde_json::Value::Null);
        assert_eq!(json["cfg_filter_top_k"], 15);
        assert_eq!(json["top_p"], 0.8);
    }

    #[test]
    fn test_audio_prompt_becomes_data_uri() {
        let bytes: Vec<u8> = (0..=255u8).cycle().take(1000).collect();
        let uri = audio_data_uri("audio/wav", &bytes);
        assert!(uri.starts_with("data:audio/wav;base64,"));

        let (mime, decoded) = decode_data_uri(&uri).unwrap();
        assert_eq!(mime, "audio/wav");
        assert_eq!(decoded, bytes);
    }

    #[test]
    fn test_missing_audio_prompt_is_omitted() {
        let request = GenerationRequest::from_fields(RawFields::default(), None);
        let json = serde_json::to_value(request.into_input()).unwrap();
        assert!(json.as_object().unwrap().get("audio_prompt").is_none());
        assert!(json.as_object().unwrap().get("text").is_none());
    }

    #[test]
    fn test_validate_lists_bad_fields() {
        let request = GenerationRequest::from_fields(
            RawFields {
                text_input: Some("hi".to_string()),
                top_p: Some("high".to_string()),
                ..Default::default()
            },
            None,
        );
        let err = request.validate().unwrap_err();
        let message = err.to_string();
        assert!(message.contains("top_p"));
        assert!(message.contains("max_new_tokens"));
        assert!(!message.contains("text_input"));
    }

    #[test]
    fn test_log_view_hides_audio() {
        let input = GenerationRequest::from_fields(
            RawFields::default(),
            Some(AudioPrompt {
                bytes: vec![1, 2, 3],
                mime_type: "audio/wav".to_string(),
            }),
        )
        .into_input();
        let view = input.log_view();
        assert!(view["audio_prompt"].as_str().unwrap().starts_with("<data uri"));
    }

    #[test]
    fn test_result_wire_shape() {
        let ok = serde_json::to_value(GenerationResult::success("https://cdn.example/a.wav")).unwrap();
        assert_eq!(
            ok,
            serde_json::json!({"success": true, "audioDataUrl": "https://cdn.example/a.wav"})
        );

        let failed = serde_json::to_value(GenerationResult::failure("Failed to generate audio", None)).unwrap();
        assert_eq!(
            failed,
            serde_json::json!({"success": false, "error": "Failed to generate audio"})
        );

        let bad: Result<GenerationResult, _> =
            serde_json::from_value(serde_json::json!({"success": true}));
        assert!(bad.is_err());
    }
}
