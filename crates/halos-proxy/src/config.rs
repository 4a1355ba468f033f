//! Configuration for halos-proxy

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{ProxyError, ProxyResult};
use crate::instance::Instance;

/// Prefix of environment variables overriding file settings
pub const ENV_PREFIX: &str = "HALOS_PROXY";

/// Default bind address, localhost only
pub const DEFAULT_BIND: &str = "127.0.0.1:9090";

/// Proxy configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProxyConfig {
    /// Address of the HTTP surface
    pub bind: String,

    /// Timeout of management requests against the instances, in seconds
    pub request_timeout_secs: u64,

    /// Instances registered at startup
    pub instances: Vec<Instance>,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            bind: DEFAULT_BIND.to_string(),
            request_timeout_secs: 30,
            instances: Vec::new(),
        }
    }
}

impl ProxyConfig {
    /// Load configuration from a file (TOML, YAML, or JSON)
    ///
    /// The format is taken from the file extension. Environment variables
    /// prefixed with `HALOS_PROXY__` override file settings, e.g.
    /// `HALOS_PROXY__BIND=0.0.0.0:9090`.
    ///
    /// # Errors
    ///
    /// Returns [`ProxyError::Configuration`] if the file doesn't exist, has an
    /// unsupported extension or contains invalid configuration.
    pub fn from_file(path: impl AsRef<Path>) -> ProxyResult<Self> {
        use ::config::{Config, Environment, File, FileFormat};

        let path = path.as_ref();
        if !path.exists() {
            return Err(ProxyError::configuration(format!(
                "Configuration file not found: {}",
                path.display()
            )));
        }

        let format = match path.extension().and_then(|s| s.to_str()) {
            Some("toml") => FileFormat::Toml,
            Some("yaml" | "yml") => FileFormat::Yaml,
            Some("json") => FileFormat::Json,
            _ => {
                return Err(ProxyError::configuration(
                    "Unsupported configuration file format. Use .toml, .yaml, .yml, or .json",
                ));
            }
        };
        let name = path
            .to_str()
            .ok_or_else(|| ProxyError::configuration("Configuration path is not valid UTF-8"))?;

        let config = Config::builder()
            .add_source(File::new(name, format))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;
        Ok(config.try_deserialize()?)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use std::io::Write;

    fn write_config(extension: &str, content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(extension).tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_defaults() {
        let config = ProxyConfig::default();
        assert_eq!(config.bind, DEFAULT_BIND);
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
        assert!(config.instances.is_empty());
    }

    #[test]
    fn test_from_toml() {
        let file = write_config(
            ".toml",
            r#"
bind = "0.0.0.0:8080"

[[instances]]
name = "wf0"
host = "localhost"
username = "admin"
password = "admin"

[[instances]]
name = "wf1"
host = "localhost"
port = 10090
"#,
        );
        let config = ProxyConfig::from_file(file.path()).unwrap();
        assert_eq!(config.bind, "0.0.0.0:8080");
        assert_eq!(config.request_timeout_secs, 30);
        assert_eq!(config.instances.len(), 2);
        assert_eq!(config.instances[0].port, 9990);
        assert_eq!(
            config.instances[0].password.as_ref().map(|p| p.expose_secret().to_string()),
            Some("admin".to_string())
        );
        assert_eq!(config.instances[1].to_string(), "wf1@localhost:10090");
    }

    #[test]
    fn test_from_json() {
        let file = write_config(
            ".json",
            r#"{"request_timeout_secs": 5, "instances": [{"name": "wf0", "ip": "127.0.0.1"}]}"#,
        );
        let config = ProxyConfig::from_file(file.path()).unwrap();
        assert_eq!(config.request_timeout(), Duration::from_secs(5));
        assert_eq!(config.instances[0].host, "127.0.0.1");
    }

    #[test]
    fn test_missing_and_unsupported_files() {
        let err = ProxyConfig::from_file("/nonexistent/halos-proxy.toml").unwrap_err();
        assert!(err.to_string().contains("not found"));

        let file = write_config(".ini", "bind = x");
        let err = ProxyConfig::from_file(file.path()).unwrap_err();
        assert!(err.to_string().contains("Unsupported"));
    }
}
