//! Configuration of the HTTP dispatcher

use std::time::Duration;

use secrecy::SecretString;
use serde::{Deserialize, Deserializer};

/// Default management endpoint of a standalone server
pub const DEFAULT_ENDPOINT: &str = "http://localhost:9990/management";

/// Default request timeout in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Configuration for [`HttpDispatcher`](crate::HttpDispatcher)
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct HttpDispatcherConfig {
    /// Management endpoint, e.g. `http://localhost:9990/management`
    pub endpoint: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,

    /// Username for basic authentication
    pub username: Option<String>,

    /// Password for basic authentication
    #[serde(deserialize_with = "deserialize_secret")]
    pub password: Option<SecretString>,
}

impl HttpDispatcherConfig {
    /// Configuration for `endpoint` with default timeout and no credentials
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Self::default()
        }
    }

    /// Set basic authentication credentials
    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(SecretString::from(password.into()));
        self
    }

    /// Set the request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_secs = timeout.as_secs();
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for HttpDispatcherConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            username: None,
            password: None,
        }
    }
}

impl std::fmt::Debug for HttpDispatcherConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpDispatcherConfig")
            .field("endpoint", &self.endpoint)
            .field("timeout_secs", &self.timeout_secs)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Deserialize an optional plain string into a secret
pub fn deserialize_secret<'de, D>(deserializer: D) -> Result<Option<SecretString>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.map(SecretString::from))
}
