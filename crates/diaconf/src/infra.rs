//! Infrastructure configuration - things that cannot change at runtime.

use serde::{Deserialize, Serialize};

/// Network bind address for the proxy server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BindConfig {
    /// Interface to bind.
    /// Default: 0.0.0.0
    #[serde(default = "BindConfig::default_host")]
    pub host: String,

    /// HTTP port for the generate endpoint, UI and health.
    /// Default: 3000
    #[serde(default = "BindConfig::default_http_port")]
    pub http_port: u16,
}

impl BindConfig {
    fn default_host() -> String {
        "0.0.0.0".to_string()
    }

    fn default_http_port() -> u16 {
        3000
    }

    /// `host:port` string suitable for `TcpListener::bind`.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.http_port)
    }
}

impl Default for BindConfig {
    fn default() -> Self {
        Self {
            host: Self::default_host(),
            http_port: Self::default_http_port(),
        }
    }
}

/// Telemetry and observability configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// OTLP gRPC endpoint for OpenTelemetry. Empty disables export and
    /// leaves plain stdout logging.
    /// Default: "" (disabled)
    #[serde(default)]
    pub otlp_endpoint: String,

    /// Log filter (trace, debug, info, warn, error, or an EnvFilter directive).
    /// Default: info
    #[serde(default = "TelemetryConfig::default_log_level")]
    pub log_level: String,
}

impl TelemetryConfig {
    fn default_log_level() -> String {
        "info".to_string()
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            otlp_endpoint: String::new(),
            log_level: Self::default_log_level(),
        }
    }
}

/// Which hosted inference API the proxy talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Replicate predictions API.
    Replicate,
    /// A Gradio app (e.g. a Hugging Face Space) via its call/event API.
    Gradio,
}

impl Backend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Backend::Replicate => "replicate",
            Backend::Gradio => "gradio",
        }
    }
}

impl std::str::FromStr for Backend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "replicate" => Ok(Backend::Replicate),
            "gradio" => Ok(Backend::Gradio),
            other => Err(format!("unknown backend '{}', expected replicate or gradio", other)),
        }
    }
}

impl std::fmt::Display for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Remote inference API settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Default: replicate
    #[serde(default = "RemoteConfig::default_backend")]
    pub backend: Backend,

    /// Replicate API root.
    /// Default: https://api.replicate.com/v1
    #[serde(default = "RemoteConfig::default_base_url")]
    pub base_url: String,

    /// Model identifier, `owner/name:version` for Replicate.
    #[serde(default = "RemoteConfig::default_model")]
    pub model: String,

    /// Name of the environment variable holding the API token.
    /// Default: REPLICATE_API_TOKEN
    #[serde(default = "RemoteConfig::default_api_token_env")]
    pub api_token_env: String,

    /// Interval between prediction status polls.
    /// Default: 1000
    #[serde(default = "RemoteConfig::default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Gradio app root.
    /// Default: https://nari-labs-dia-1-6b.hf.space
    #[serde(default = "RemoteConfig::default_gradio_space")]
    pub gradio_space: String,

    /// Gradio API endpoint name (without leading slash).
    /// Default: generate_audio
    #[serde(default = "RemoteConfig::default_gradio_endpoint")]
    pub gradio_endpoint: String,
}

impl RemoteConfig {
    fn default_backend() -> Backend {
        Backend::Replicate
    }

    fn default_base_url() -> String {
        "https://api.replicate.com/v1".to_string()
    }

    fn default_model() -> String {
        "zsxkib/dia:2119e338ca5c0dacd3def83158d6c80d431f2ac1024146d8cca9220b74385599".to_string()
    }

    fn default_api_token_env() -> String {
        "REPLICATE_API_TOKEN".to_string()
    }

    fn default_poll_interval_ms() -> u64 {
        1000
    }

    fn default_gradio_space() -> String {
        "https://nari-labs-dia-1-6b.hf.space".to_string()
    }

    fn default_gradio_endpoint() -> String {
        "generate_audio".to_string()
    }
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            backend: Self::default_backend(),
            base_url: Self::default_base_url(),
            model: Self::default_model(),
            api_token_env: Self::default_api_token_env(),
            poll_interval_ms: Self::default_poll_interval_ms(),
            gradio_space: Self::default_gradio_space(),
            gradio_endpoint: Self::default_gradio_endpoint(),
        }
    }
}

/// Behaviour of the generate endpoint itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProxyConfig {
    /// Reject missing text or unparseable numbers with 400 instead of
    /// forwarding them.
    /// Default: false
    #[serde(default)]
    pub strict_params: bool,

    /// Request body limit for the multipart upload.
    /// Default: 26214400 (25 MiB)
    #[serde(default = "ProxyConfig::default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

impl ProxyConfig {
    fn default_max_upload_bytes() -> usize {
        25 * 1024 * 1024
    }
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            strict_params: false,
            max_upload_bytes: Self::default_max_upload_bytes(),
        }
    }
}

/// Infrastructure configuration - cannot change at runtime.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InfraConfig {
    #[serde(default)]
    pub bind: BindConfig,

    #[serde(default)]
    pub telemetry: TelemetryConfig,

    #[serde(default)]
    pub remote: RemoteConfig,

    #[serde(default)]
    pub proxy: ProxyConfig,
}
