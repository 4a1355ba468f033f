//! Backend WildFly instances

use std::fmt;

use secrecy::SecretString;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{ProxyError, ProxyResult};

/// Default port of the HTTP management interface
pub const DEFAULT_MANAGEMENT_PORT: u16 = 9990;

fn default_port() -> u16 {
    DEFAULT_MANAGEMENT_PORT
}

fn deserialize_secret<'de, D>(deserializer: D) -> Result<Option<SecretString>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.map(SecretString::from))
}

/// A WildFly instance and how to reach its management endpoint.
///
/// Instances are unique by name. The password is accepted on input but never
/// written back out: use [`InstanceInfo`] to report an instance.
#[derive(Clone, Deserialize)]
pub struct Instance {
    pub name: String,

    /// Host name or IP address
    #[serde(alias = "ip")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default)]
    pub username: Option<String>,

    #[serde(default, deserialize_with = "deserialize_secret")]
    pub password: Option<SecretString>,
}

impl Instance {
    /// Instance without credentials
    pub fn new(name: impl Into<String>, host: impl Into<String>, port: u16) -> Self {
        Self {
            name: name.into(),
            host: host.into(),
            port,
            username: None,
            password: None,
        }
    }

    /// Set the management user
    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(SecretString::from(password.into()));
        self
    }

    /// Check that the name can be used in request paths and event streams.
    ///
    /// # Errors
    ///
    /// Returns [`ProxyError::InvalidInstance`] if the name is empty, contains
    /// `/` or contains control characters such as CR or LF.
    pub fn validate(&self) -> ProxyResult<()> {
        if self.name.is_empty() {
            return Err(ProxyError::invalid_instance(&self.name, "name must not be empty"));
        }
        if self.name.contains('/') {
            return Err(ProxyError::invalid_instance(&self.name, "name must not contain '/'"));
        }
        if self.name.chars().any(char::is_control) {
            return Err(ProxyError::invalid_instance(
                &self.name,
                "name must not contain control characters",
            ));
        }
        Ok(())
    }

    pub fn info(&self) -> InstanceInfo {
        InstanceInfo {
            name: self.name.clone(),
            host: self.host.clone(),
            port: self.port,
            username: self.username.clone(),
        }
    }
}

impl PartialEq for Instance {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for Instance {}

impl fmt::Display for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}:{}", self.name, self.host, self.port)
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance")
            .field("name", &self.name)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Public view of an [`Instance`] without its password
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceInfo {
    pub name: String,
    pub host: String,
    pub port: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}
