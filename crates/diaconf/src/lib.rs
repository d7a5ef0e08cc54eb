//! Configuration loading for diagen.
//!
//! Shared by the proxy server and the visualizer CLI so both read the same
//! files and environment.
//!
//! # Configuration Philosophy
//!
//! - **Infrastructure** (`InfraConfig`): bind address, telemetry, the remote
//!   inference API and proxy behaviour. Fixed once the server starts.
//!
//! - **Defaults** (`GenerationDefaults`): presets handed to the UI form.
//!   Advisory only; the proxy forwards whatever the client submits.
//!
//! # Config File Locations
//!
//! Files are loaded in order (later wins):
//! 1. `/etc/diagen/config.toml` (system)
//! 2. `~/.config/diagen/config.toml` (user)
//! 3. `./diagen.toml` or the path given with `--config`
//! 4. Environment variables (`DIAGEN_*`)
//!
//! # Example Config
//!
//! ```toml
//! [bind]
//! http_port = 3000
//!
//! [telemetry]
//! otlp_endpoint = "127.0.0.1:4317"
//! log_level = "info,diagen=debug"
//!
//! [remote]
//! backend = "replicate"
//! model = "zsxkib/dia:2119e338ca5c0dacd3def83158d6c80d431f2ac1024146d8cca9220b74385599"
//!
//! [proxy]
//! strict_params = false
//!
//! [defaults]
//! max_new_tokens = 860
//! top_p = 0.8
//! ```

pub mod defaults;
pub mod infra;
pub mod loader;

pub use defaults::GenerationDefaults;
pub use infra::{Backend, BindConfig, InfraConfig, ProxyConfig, RemoteConfig, TelemetryConfig};
pub use loader::{discover_config_files_with_override, ConfigSources};

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    Parse { path: PathBuf, message: String },
}

/// Complete diagen configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct DiaConfig {
    #[serde(flatten)]
    pub infra: InfraConfig,

    #[serde(default)]
    pub defaults: GenerationDefaults,
}

impl DiaConfig {
    /// Load configuration from all standard sources.
    pub fn load() -> Result<Self, ConfigError> {
        let (config, _sources) = Self::load_with_sources_from(None)?;
        Ok(config)
    }

    /// Load configuration, with `config_path` replacing `./diagen.toml`.
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        let (config, _sources) = Self::load_with_sources_from(config_path)?;
        Ok(config)
    }

    /// Load configuration and report which files and env vars contributed.
    pub fn load_with_sources_from(
        config_path: Option<&Path>,
    ) -> Result<(Self, ConfigSources), ConfigError> {
        let mut sources = ConfigSources::default();
        let mut config = DiaConfig::default();

        for path in loader::discover_config_files_with_override(config_path) {
            loader::apply_file(&mut config, &path)?;
            sources.files.push(path);
        }

        loader::apply_env_overrides(&mut config, &mut sources);

        Ok((config, sources))
    }

    /// Serialize config to TOML string.
    pub fn to_toml(&self) -> String {
        let mut output = String::new();

        output.push_str("# diagen configuration\n\n");

        output.push_str("[bind]\n");
        output.push_str(&format!("host = \"{}\"\n", self.infra.bind.host));
        output.push_str(&format!("http_port = {}\n", self.infra.bind.http_port));

        output.push_str("\n[telemetry]\n");
        output.push_str(&format!(
            "otlp_endpoint = \"{}\"\n",
            self.infra.telemetry.otlp_endpoint
        ));
        output.push_str(&format!(
            "log_level = \"{}\"\n",
            self.infra.telemetry.log_level
        ));

        let remote = &self.infra.remote;
        output.push_str("\n[remote]\n");
        output.push_str(&format!("backend = \"{}\"\n", remote.backend));
        output.push_str(&format!("base_url = \"{}\"\n", remote.base_url));
        output.push_str(&format!("model = \"{}\"\n", remote.model));
        output.push_str(&format!("api_token_env = \"{}\"\n", remote.api_token_env));
        output.push_str(&format!("poll_interval_ms = {}\n", remote.poll_interval_ms));
        output.push_str(&format!("gradio_space = \"{}\"\n", remote.gradio_space));
        output.push_str(&format!("gradio_endpoint = \"{}\"\n", remote.gradio_endpoint));

        output.push_str("\n[proxy]\n");
        output.push_str(&format!(
            "strict_params = {}\n",
            self.infra.proxy.strict_params
        ));
        output.push_str(&format!(
            "max_upload_bytes = {}\n",
            self.infra.proxy.max_upload_bytes
        ));

        let defaults = &self.defaults;
        output.push_str("\n[defaults]\n");
        output.push_str(&format!("text = {:?}\n", defaults.text));
        output.push_str(&format!("max_new_tokens = {}\n", defaults.max_new_tokens));
        output.push_str(&format!("cfg_scale = {:?}\n", defaults.cfg_scale));
        output.push_str(&format!("temperature = {:?}\n", defaults.temperature));
        output.push_str(&format!("top_p = {:?}\n", defaults.top_p));
        output.push_str(&format!("cfg_filter_top_k = {}\n", defaults.cfg_filter_top_k));
        output.push_str(&format!("speed_factor = {:?}\n", defaults.speed_factor));

        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = DiaConfig::default();
        assert_eq!(config.infra.bind.http_port, 3000);
        assert_eq!(config.defaults.max_new_tokens, 860);
        assert!(!config.infra.proxy.strict_params);
    }

    #[test]
    fn test_to_toml_round_trips() {
        let config = DiaConfig::default();
        let rendered = config.to_toml();
        assert!(rendered.contains("[bind]"));
        assert!(rendered.contains("[remote]"));
        assert!(rendered.contains("[defaults]"));

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("diagen.toml");
        std::fs::write(&path, &rendered).unwrap();

        let mut reloaded = DiaConfig::default();
        reloaded.infra.bind.http_port = 1;
        loader::apply_file(&mut reloaded, &path).unwrap();
        assert_eq!(reloaded, config);
    }
}
