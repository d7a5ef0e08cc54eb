//! Config file discovery, loading, and environment variable overlay.

use crate::{ConfigError, DiaConfig};
use std::env;
use std::path::{Path, PathBuf};

/// Information about where config values came from.
#[derive(Debug, Clone, Default)]
pub struct ConfigSources {
    /// Config files that were loaded (in order)
    pub files: Vec<PathBuf>,
    /// Environment variables that overrode config values
    pub env_overrides: Vec<String>,
}

/// Discover config files, optionally with a CLI override path.
///
/// If `cli_path` is provided and exists, it replaces the local override.
/// Returns paths in load order (system, user, local/cli).
pub fn discover_config_files_with_override(cli_path: Option<&Path>) -> Vec<PathBuf> {
    let mut files = Vec::new();

    let system = PathBuf::from("/etc/diagen/config.toml");
    if system.exists() {
        files.push(system);
    }

    // User config (XDG_CONFIG_HOME or ~/.config)
    if let Some(config_dir) = directories::BaseDirs::new().map(|d| d.config_dir().to_path_buf()) {
        let user = config_dir.join("diagen/config.toml");
        if user.exists() {
            files.push(user);
        }
    }

    if let Some(path) = cli_path {
        if path.exists() {
            files.push(path.to_path_buf());
            return files;
        }
    }

    let local = PathBuf::from("diagen.toml");
    if local.exists() {
        files.push(local);
    }

    files
}

/// Read a TOML file and overlay every key it sets onto `config`.
pub fn apply_file(config: &mut DiaConfig, path: &Path) -> Result<(), ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
        path: path.to_path_buf(),
        source: e,
    })?;

    apply_toml(config, &contents, path)
}

/// Overlay a TOML document onto `config`. Keys absent from the document keep
/// their current value, so files stack in load order.
pub fn apply_toml(config: &mut DiaConfig, contents: &str, path: &Path) -> Result<(), ConfigError> {
    let table: toml::Table = contents.parse().map_err(|e: toml::de::Error| ConfigError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    let parse_err = |message: String| ConfigError::Parse {
        path: path.to_path_buf(),
        message,
    };

    if let Some(bind) = table.get("bind").and_then(|v| v.as_table()) {
        if let Some(v) = bind.get("host").and_then(|v| v.as_str()) {
            config.infra.bind.host = v.to_string();
        }
        if let Some(v) = bind.get("http_port").and_then(|v| v.as_integer()) {
            config.infra.bind.http_port = u16::try_from(v)
                .map_err(|_| parse_err(format!("bind.http_port out of range: {}", v)))?;
        }
    }

    if let Some(telemetry) = table.get("telemetry").and_then(|v| v.as_table()) {
        if let Some(v) = telemetry.get("otlp_endpoint").and_then(|v| v.as_str()) {
            config.infra.telemetry.otlp_endpoint = v.to_string();
        }
        if let Some(v) = telemetry.get("log_level").and_then(|v| v.as_str()) {
            config.infra.telemetry.log_level = v.to_string();
        }
    }

    if let Some(remote) = table.get("remote").and_then(|v| v.as_table()) {
        let target = &mut config.infra.remote;
        if let Some(v) = remote.get("backend").and_then(|v| v.as_str()) {
            target.backend = v.parse().map_err(parse_err)?;
        }
        if let Some(v) = remote.get("base_url").and_then(|v| v.as_str()) {
            target.base_url = v.to_string();
        }
        if let Some(v) = remote.get("model").and_then(|v| v.as_str()) {
            target.model = v.to_string();
        }
        if let Some(v) = remote.get("api_token_env").and_then(|v| v.as_str()) {
            target.api_token_env = v.to_string();
        }
        if let Some(v) = remote.get("poll_interval_ms").and_then(|v| v.as_integer()) {
            target.poll_interval_ms = v.max(0) as u64;
        }
        if let Some(v) = remote.get("gradio_space").and_then(|v| v.as_str()) {
            target.gradio_space = v.to_string();
        }
        if let Some(v) = remote.get("gradio_endpoint").and_then(|v| v.as_str()) {
            target.gradio_endpoint = v.trim_start_matches('/').to_string();
        }
    }

    if let Some(proxy) = table.get("proxy").and_then(|v| v.as_table()) {
        if let Some(v) = proxy.get("strict_params").and_then(|v| v.as_bool()) {
            config.infra.proxy.strict_params = v;
        }
        if let Some(v) = proxy.get("max_upload_bytes").and_then(|v| v.as_integer()) {
            config.infra.proxy.max_upload_bytes = v.max(0) as usize;
        }
    }

    if let Some(defaults) = table.get("defaults").and_then(|v| v.as_table()) {
        let target = &mut config.defaults;
        if let Some(v) = defaults.get("text").and_then(|v| v.as_str()) {
            target.text = v.to_string();
        }
        if let Some(v) = defaults.get("max_new_tokens").and_then(|v| v.as_integer()) {
            target.max_new_tokens = v;
        }
        if let Some(v) = defaults.get("cfg_scale").and_then(as_number) {
            target.cfg_scale = v;
        }
        if let Some(v) = defaults.get("temperature").and_then(as_number) {
            target.temperature = v;
        }
        if let Some(v) = defaults.get("top_p").and_then(as_number) {
            target.top_p = v;
        }
        if let Some(v) = defaults.get("cfg_filter_top_k").and_then(|v| v.as_integer()) {
            target.cfg_filter_top_k = v;
        }
        if let Some(v) = defaults.get("speed_factor").and_then(as_number) {
            target.speed_factor = v;
        }
    }

    Ok(())
}

// TOML distinguishes `1` from `1.0`; accept either for float settings.
fn as_number(value: &toml::Value) -> Option<f64> {
    value
        .as_float()
        .or_else(|| value.as_integer().map(|i| i as f64))
}

/// Apply environment variable overrides to config.
pub fn apply_env_overrides(config: &mut DiaConfig, sources: &mut ConfigSources) {
    apply_overrides_from(config, sources, env::vars());
}

/// Apply overrides from an explicit set of variables.
pub fn apply_overrides_from(
    config: &mut DiaConfig,
    sources: &mut ConfigSources,
    vars: impl IntoIterator<Item = (String, String)>,
) {
    for (key, value) in vars {
        let applied = match key.as_str() {
            "DIAGEN_HOST" => {
                config.infra.bind.host = value;
                true
            }
            "DIAGEN_HTTP_PORT" => match value.parse() {
                Ok(port) => {
                    config.infra.bind.http_port = port;
                    true
                }
                Err(_) => false,
            },
            // Also support the standard OTEL env var
            "DIAGEN_OTLP_ENDPOINT" | "OTEL_EXPORTER_OTLP_ENDPOINT" => {
                config.infra.telemetry.otlp_endpoint = value;
                true
            }
            "DIAGEN_LOG_LEVEL" | "RUST_LOG" => {
                config.infra.telemetry.log_level = value;
                true
            }
            "DIAGEN_BACKEND" => match value.parse() {
                Ok(backend) => {
                    config.infra.remote.backend = backend;
                    true
                }
                Err(_) => false,
            },
            "DIAGEN_REMOTE_URL" => {
                config.infra.remote.base_url = value;
                true
            }
            "DIAGEN_MODEL" => {
                config.infra.remote.model = value;
                true
            }
            "DIAGEN_STRICT_PARAMS" => match value.to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" => {
                    config.infra.proxy.strict_params = true;
                    true
                }
                "0" | "false" | "no" => {
                    config.infra.proxy.strict_params = false;
                    true
                }
                _ => false,
            },
            _ => false,
        };

        if applied {
            sources.env_overrides.push(key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Backend;

    #[test]
    fn test_discover_config_files() {
        // Just verify it doesn't panic
        let _files = discover_config_files_with_override(None);
    }

    #[test]
    fn test_parse_minimal_toml() {
        let mut config = DiaConfig::default();
        let toml = r#"
[bind]
http_port = 8099
"#;
        apply_toml(&mut config, toml, Path::new("test.toml")).unwrap();
        assert_eq!(config.infra.bind.http_port, 8099);
        // Other values should be defaults
        assert_eq!(config.infra.bind.host, "0.0.0.0");
        assert_eq!(config.infra.remote.backend, Backend::Replicate);
    }

    #[test]
    fn test_parse_full_toml() {
        let mut config = DiaConfig::default();
        let toml = r#"
[telemetry]
log_level = "debug"

[remote]
backend = "gradio"
gradio_space = "http://localhost:7860"
gradio_endpoint = "/generate_audio"

[proxy]
strict_params = true
max_upload_bytes = 1024

[defaults]
cfg_scale = 3
top_p = 0.95
"#;
        apply_toml(&mut config, toml, Path::new("test.toml")).unwrap();
        assert_eq!(config.infra.telemetry.log_level, "debug");
        assert_eq!(config.infra.remote.backend, Backend::Gradio);
        assert_eq!(config.infra.remote.gradio_space, "http://localhost:7860");
        assert_eq!(config.infra.remote.gradio_endpoint, "generate_audio");
        assert!(config.infra.proxy.strict_params);
        assert_eq!(config.infra.proxy.max_upload_bytes, 1024);
        assert_eq!(config.defaults.cfg_scale, 3.0);
        assert_eq!(config.defaults.top_p, 0.95);
    }

    #[test]
    fn test_files_stack_in_order() {
        let mut config = DiaConfig::default();
        apply_toml(&mut config, "[bind]\nhttp_port = 4000\n", Path::new("a.toml")).unwrap();
        apply_toml(&mut config, "[bind]\nhost = \"127.0.0.1\"\n", Path::new("b.toml")).unwrap();
        assert_eq!(config.infra.bind.addr(), "127.0.0.1:4000");
    }

    #[test]
    fn test_invalid_backend_is_parse_error() {
        let mut config = DiaConfig::default();
        let err = apply_toml(&mut config, "[remote]\nbackend = \"ollama\"\n", Path::new("bad.toml"))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_env_overrides() {
        let mut config = DiaConfig::default();
        let mut sources = ConfigSources::default();
        let vars = vec![
            ("DIAGEN_HTTP_PORT".to_string(), "9000".to_string()),
            ("DIAGEN_BACKEND".to_string(), "gradio".to_string()),
            ("DIAGEN_STRICT_PARAMS".to_string(), "true".to_string()),
            ("DIAGEN_HTTP_PORT_TYPO".to_string(), "1".to_string()),
            ("HOME".to_string(), "/root".to_string()),
        ];
        apply_overrides_from(&mut config, &mut sources, vars);

        assert_eq!(config.infra.bind.http_port, 9000);
        assert_eq!(config.infra.remote.backend, Backend::Gradio);
        assert!(config.infra.proxy.strict_params);
        assert_eq!(
            sources.env_overrides,
            vec!["DIAGEN_HTTP_PORT", "DIAGEN_BACKEND", "DIAGEN_STRICT_PARAMS"]
        );
    }

    #[test]
    fn test_bad_env_values_are_ignored() {
        let mut config = DiaConfig::default();
        let mut sources = ConfigSources::default();
        let vars = vec![("DIAGEN_HTTP_PORT".to_string(), "not-a-port".to_string())];
        apply_overrides_from(&mut config, &mut sources, vars);
        assert_eq!(config.infra.bind.http_port, 3000);
        assert!(sources.env_overrides.is_empty());
    }
}
