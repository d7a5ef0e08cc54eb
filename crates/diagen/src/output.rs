//! Remote output normalization.
//!
//! The inference API does not promise a single return type. Its output is
//! decoded into [`RemoteOutput`] and then run through [`MATCHERS`], an ordered
//! table of shape matchers. The first matcher that yields a non-empty string
//! wins; if none does, the output is invalid.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::error::GenerateError;

/// A remote object that hands out its URL through an accessor.
pub trait FileHandle: fmt::Debug + Send + Sync {
    fn url(&self) -> String;
}

/// File produced by a prediction, referenced by URL or data URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileOutput {
    url: String,
}

impl FileOutput {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

impl FileHandle for FileOutput {
    fn url(&self) -> String {
        self.url.clone()
    }
}

/// Everything a remote call can hand back.
#[derive(Debug, Clone)]
pub enum RemoteOutput {
    Null,
    Bool(bool),
    Number(serde_json::Number),
    Text(String),
    List(Vec<RemoteOutput>),
    /// Key-value object, in the order the remote sent it.
    Record(Vec<(String, RemoteOutput)>),
    File(Arc<dyn FileHandle>),
}

impl RemoteOutput {
    /// Wrap URL and data-URI strings into [`FileOutput`] handles, recursively.
    /// Mirrors how hosted-model clients surface generated files.
    pub fn wrap_files(self) -> Self {
        match self {
            RemoteOutput::Text(s) if is_file_reference(&s) => {
                RemoteOutput::File(Arc::new(FileOutput::new(s)))
            }
            RemoteOutput::List(items) => {
                RemoteOutput::List(items.into_iter().map(RemoteOutput::wrap_files).collect())
            }
            RemoteOutput::Record(entries) => RemoteOutput::Record(
                entries
                    .into_iter()
                    .map(|(k, v)| (k, v.wrap_files()))
                    .collect(),
            ),
            other => other,
        }
    }

    /// JSON rendering for logs. File handles show as `{"url": ...}`.
    pub fn to_json(&self) -> Value {
        match self {
            RemoteOutput::Null => Value::Null,
            RemoteOutput::Bool(b) => Value::Bool(*b),
            RemoteOutput::Number(n) => Value::Number(n.clone()),
            RemoteOutput::Text(s) => Value::String(s.clone()),
            RemoteOutput::List(items) => Value::Array(items.iter().map(Self::to_json).collect()),
            RemoteOutput::Record(entries) => Value::Object(
                entries
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
            RemoteOutput::File(handle) => serde_json::json!({ "url": handle.url() }),
        }
    }
}

impl From<Value> for RemoteOutput {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => RemoteOutput::Null,
            Value::Bool(b) => RemoteOutput::Bool(b),
            Value::Number(n) => RemoteOutput::Number(n),
            Value::String(s) => RemoteOutput::Text(s),
            Value::Array(items) => {
                RemoteOutput::List(items.into_iter().map(RemoteOutput::from).collect())
            }
            Value::Object(map) => RemoteOutput::Record(
                map.into_iter()
                    .map(|(k, v)| (k, RemoteOutput::from(v)))
                    .collect(),
            ),
        }
    }
}

impl fmt::Display for RemoteOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_json())
    }
}

fn is_file_reference(s: &str) -> bool {
    is_http_url(s) || s.starts_with("data:")
}

fn is_http_url(s: &str) -> bool {
    s.starts_with("http://") || s.starts_with("https://")
}

fn non_empty(s: &str) -> Option<String> {
    (!s.is_empty()).then(|| s.to_string())
}

// --- Matchers ---

/// Which matcher produced the URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputShape {
    /// The output is the URL.
    PlainString,
    /// A list; its first element is decoded again.
    Sequence,
    /// A record with a string `url` entry.
    UrlField,
    /// A file handle with a `url()` accessor.
    UrlAccessor,
    /// Any record; first value that is an http(s) URL.
    HttpValueScan,
}

pub type ShapeMatcher = fn(&RemoteOutput) -> Option<String>;

/// Tried top to bottom.
pub const MATCHERS: [(OutputShape, ShapeMatcher); 5] = [
    (OutputShape::PlainString, match_plain_string),
    (OutputShape::Sequence, match_sequence),
    (OutputShape::UrlField, match_url_field),
    (OutputShape::UrlAccessor, match_url_accessor),
    (OutputShape::HttpValueScan, match_http_value),
];

fn match_plain_string(output: &RemoteOutput) -> Option<String> {
    match output {
        RemoteOutput::Text(s) => non_empty(s),
        _ => None,
    }
}

fn match_sequence(output: &RemoteOutput) -> Option<String> {
    match output {
        RemoteOutput::List(items) => first_match(items.first()?).map(|(_, url)| url),
        _ => None,
    }
}

fn match_url_field(output: &RemoteOutput) -> Option<String> {
    match output {
        RemoteOutput::Record(entries) => entries
            .iter()
            .filter(|(k, _)| k == "url")
            .find_map(|(_, v)| string_value(v).and_then(|s| non_empty(&s))),
        _ => None,
    }
}

fn match_url_accessor(output: &RemoteOutput) -> Option<String> {
    match output {
        RemoteOutput::File(handle) => non_empty(&handle.url()),
        _ => None,
    }
}

fn match_http_value(output: &RemoteOutput) -> Option<String> {
    match output {
        RemoteOutput::Record(entries) => entries
            .iter()
            .find_map(|(_, v)| string_value(v).filter(|s| is_http_url(s))),
        _ => None,
    }
}

/// A record value read as a string. Wrapped file handles count as their URL.
fn string_value(output: &RemoteOutput) -> Option<String> {
    match output {
        RemoteOutput::Text(s) => Some(s.clone()),
        RemoteOutput::File(handle) => Some(handle.url()),
        _ => None,
    }
}

fn first_match(output: &RemoteOutput) -> Option<(OutputShape, String)> {
    MATCHERS
        .iter()
        .find_map(|(shape, matcher)| matcher(output).map(|url| (*shape, url)))
}

/// A URL plus the shape it was found in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedOutput {
    pub shape: OutputShape,
    pub url: String,
}

/// Extract the single playable URL from a remote output.
pub fn decode_output(output: &RemoteOutput) -> Result<DecodedOutput, GenerateError> {
    first_match(output)
        .map(|(shape, url)| DecodedOutput { shape, url })
        .ok_or(GenerateError::InvalidOutput)
}
