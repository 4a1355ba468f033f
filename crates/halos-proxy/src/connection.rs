//! Connections to the management endpoints of backend instances
//!
//! [`ConnectionFactory`] is the seam between the dispatcher and the network.
//! The default [`HttpConnectionFactory`] talks to
//! `http://host:port/management` using the `application/dmr-encoded`
//! content type.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use halos_dmr::{CONTENT_TYPE, DispatchError, ModelNode, Operation};
use reqwest::header;
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, trace};
use url::Url;

use crate::error::{ProxyError, ProxyErrorExt, ProxyResult};
use crate::instance::Instance;

/// Default timeout for management requests
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// A live connection to one management endpoint
#[async_trait]
pub trait ManagementConnection: Send + Sync {
    /// Execute `operation` and return the raw management response
    /// (`outcome`, `result`, `failure-description`)
    ///
    /// # Errors
    ///
    /// Returns [`ProxyError`] if the response could not be obtained.
    async fn execute(&self, operation: &Operation) -> ProxyResult<ModelNode>;

    /// Release the connection
    ///
    /// # Errors
    ///
    /// Returns [`ProxyError::Close`] if releasing failed.
    async fn close(&self) -> ProxyResult<()>;
}

/// Opens connections for instances
#[async_trait]
pub trait ConnectionFactory: Send + Sync {
    /// Resolve the instance's host and open a connection
    ///
    /// # Errors
    ///
    /// Returns [`ProxyError::Connection`] if the host is unknown.
    async fn connect(&self, instance: &Instance) -> ProxyResult<Arc<dyn ManagementConnection>>;
}

/// Opens [`HttpConnection`]s sharing one pooled HTTP client
#[derive(Debug, Clone)]
pub struct HttpConnectionFactory {
    client: reqwest::Client,
}

impl HttpConnectionFactory {
    /// Factory with the default request timeout
    ///
    /// # Errors
    ///
    /// Returns [`ProxyError::Configuration`] if the HTTP client can not be built.
    pub fn new() -> ProxyResult<Self> {
        Self::with_timeout(DEFAULT_REQUEST_TIMEOUT)
    }

    /// Factory with an explicit request timeout
    ///
    /// # Errors
    ///
    /// Returns [`ProxyError::Configuration`] if the HTTP client can not be built.
    pub fn with_timeout(timeout: Duration) -> ProxyResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Some(Duration::from_secs(90)))
            .build()
            .map_err(|e| ProxyError::configuration(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl ConnectionFactory for HttpConnectionFactory {
    async fn connect(&self, instance: &Instance) -> ProxyResult<Arc<dyn ManagementConnection>> {
        let address = tokio::net::lookup_host((instance.host.as_str(), instance.port))
            .await
            .connection_context(instance)?
            .next()
            .ok_or_else(|| ProxyError::connection(instance, "no address found"))?;

        let endpoint = Url::parse(&format!("http://{address}/management")).connection_context(instance)?;
        debug!(%instance, %endpoint, "Resolved management endpoint");

        let credentials = instance.username.clone().map(|username| {
            let password = instance
                .password
                .clone()
                .unwrap_or_else(|| SecretString::from(String::new()));
            (username, password)
        });

        Ok(Arc::new(HttpConnection {
            client: self.client.clone(),
            instance: instance.to_string(),
            endpoint,
            credentials,
            closed: AtomicBool::new(false),
        }))
    }
}

/// Management connection over HTTP
pub struct HttpConnection {
    client: reqwest::Client,
    instance: String,
    endpoint: Url,
    credentials: Option<(String, SecretString)>,
    closed: AtomicBool,
}

impl std::fmt::Debug for HttpConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpConnection")
            .field("instance", &self.instance)
            .field("endpoint", &self.endpoint.as_str())
            .field(
                "credentials",
                &self.credentials.as_ref().map(|(user, _)| (user, "<redacted>")),
            )
            .field("closed", &self.closed.load(Ordering::Relaxed))
            .finish()
    }
}

impl HttpConnection {
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait]
impl ManagementConnection for HttpConnection {
    async fn execute(&self, operation: &Operation) -> ProxyResult<ModelNode> {
        let cli = operation.as_cli();
        if self.closed.load(Ordering::Acquire) {
            return Err(ProxyError::connection(&self.instance, "connection closed"));
        }
        trace!(instance = %self.instance, operation = %cli, "Executing operation");

        let mut builder = self
            .client
            .post(self.endpoint.clone())
            .header(header::ACCEPT, CONTENT_TYPE)
            .header(header::CONTENT_TYPE, CONTENT_TYPE)
            .body(operation.to_model_node().to_base64()?);
        if let Some((username, password)) = &self.credentials {
            builder = builder.basic_auth(username, Some(password.expose_secret()));
        }

        let response = builder
            .send()
            .await
            .map_err(|e| DispatchError::transport(format!("HTTP request failed: {e}"), cli.as_str()))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| DispatchError::transport(format!("Unable to read response body: {e}"), cli.as_str()))?;

        // failed operations come back as 500 with an encoded response
        match ModelNode::from_base64(&body) {
            Ok(node) => Ok(node),
            Err(_) if !status.is_success() => Err(DispatchError::failure(
                status.as_u16(),
                status.canonical_reason().unwrap_or_default(),
                cli,
            )
            .into()),
            Err(e) => Err(e.into()),
        }
    }

    async fn close(&self) -> ProxyResult<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Err(ProxyError::close(&self.instance, "already closed"));
        }
        Ok(())
    }
}
