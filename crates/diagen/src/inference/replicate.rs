//! Replicate predictions API.
//!
//! Creates a prediction with `Prefer: wait` so short runs finish in one round
//! trip, then polls the prediction until it reaches a terminal status.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{ensure_success, inject_trace_context, InferenceClient};
use crate::error::GenerateError;
use crate::generate::GenerationInput;
use crate::output::RemoteOutput;

#[derive(Debug, Deserialize)]
struct Prediction {
    id: String,
    status: String,
    #[serde(default)]
    output: Value,
    #[serde(default)]
    error: Option<Value>,
    #[serde(default)]
    urls: Option<PredictionUrls>,
}

#[derive(Debug, Deserialize)]
struct PredictionUrls {
    get: Option<String>,
}

impl Prediction {
    fn is_terminal(&self) -> bool {
        matches!(
            self.status.as_str(),
            "succeeded" | "failed" | "canceled" | "aborted"
        )
    }
}

/// `owner/name` or `owner/name:version`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ModelRef<'a> {
    owner: &'a str,
    name: &'a str,
    version: Option<&'a str>,
}

impl<'a> ModelRef<'a> {
    pub(crate) fn parse(model: &'a str) -> Result<Self, GenerateError> {
        let (path, version) = match model.split_once(':') {
            Some((path, version)) => (path, Some(version)),
            None => (model, None),
        };
        match path.split_once('/') {
            Some((owner, name)) if !owner.is_empty() && !name.is_empty() => Ok(Self {
                owner,
                name,
                version: version.filter(|v| !v.is_empty()),
            }),
            _ => Err(GenerateError::Remote(format!(
                "Invalid model identifier '{}', expected owner/name[:version]",
                model
            ))),
        }
    }
}

pub struct ReplicateClient {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
    poll_interval: Duration,
}

impl ReplicateClient {
    pub fn new(base_url: &str, token: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
            poll_interval: Duration::from_secs(1),
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    fn authorized(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let builder = match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        };
        inject_trace_context(builder)
    }

    async fn create(&self, model: &str, input: &GenerationInput) -> Result<Prediction, GenerateError> {
        let model = ModelRef::parse(model)?;
        let (url, body) = match model.version {
            Some(version) => (
                format!("{}/predictions", self.base_url),
                json!({ "version": version, "input": input }),
            ),
            None => (
                format!("{}/models/{}/{}/predictions", self.base_url, model.owner, model.name),
                json!({ "input": input }),
            ),
        };

        let builder = self
            .client
            .post(&url)
            .header("Prefer", "wait")
            .json(&body);
        let resp = self.authorized(builder).send().await?;
        let resp = ensure_success(resp).await?;
        Ok(resp.json().await?)
    }

    async fn wait(&self, mut prediction: Prediction) -> Result<Prediction, GenerateError> {
        while !prediction.is_terminal() {
            tracing::debug!(
                prediction_id = %prediction.id,
                status = %prediction.status,
                "Prediction still running"
            );
            tokio::time::sleep(self.poll_interval).await;

            let url = prediction
                .urls
                .as_ref()
                .and_then(|u| u.get.clone())
                .unwrap_or_else(|| format!("{}/predictions/{}", self.base_url, prediction.id));
            let resp = self.authorized(self.client.get(&url)).send().await?;
            let resp = ensure_success(resp).await?;
            prediction = resp.json().await?;
        }
        Ok(prediction)
    }
}

#[async_trait]
impl InferenceClient for ReplicateClient {
    fn name(&self) -> &'static str {
        "replicate"
    }

    #[tracing::instrument(name = "replicate.run", skip(self, input))]
    async fn run(&self, model: &str, input: &GenerationInput) -> Result<RemoteOutput, GenerateError> {
        let created = self.create(model, input).await?;
        tracing::info!(prediction_id = %created.id, status = %created.status, "Prediction created");

        let prediction = self.wait(created).await?;
        match prediction.status.as_str() {
            "succeeded" => Ok(RemoteOutput::from(prediction.output).wrap_files()),
            "failed" => {
                let reason = match prediction.error {
                    Some(Value::String(s)) => s,
                    Some(other) => other.to_string(),
                    None => "unknown error".to_string(),
                };
                Err(GenerateError::Remote(format!(
                    "Prediction failed: {}",
                    reason
                )))
            }
            other => Err(GenerateError::Remote(format!(
                "Prediction {} ended with status {}",
                prediction.id, other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_ref_with_version() {
        let model = ModelRef::parse("zsxkib/dia:2119e338").unwrap();
        assert_eq!(model.owner, "zsxkib");
        assert_eq!(model.name, "dia");
        assert_eq!(model.version, Some("2119e338"));
    }

    #[test]
    fn test_model_ref_without_version() {
        let model = ModelRef::parse("nari-labs/dia").unwrap();
        assert_eq!(model.version, None);
    }

    #[test]
    fn test_model_ref_invalid() {
        assert!(ModelRef::parse("dia").is_err());
        assert!(ModelRef::parse("/dia:abc").is_err());
    }
}
