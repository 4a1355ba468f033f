//! reqwest based dispatcher
//!
//! Operations are posted base64 encoded with `Accept` and `Content-Type` set
//! to `application/dmr-encoded`. The response body is the base64 encoded
//! management response.

use async_trait::async_trait;
use halos_dmr::dispatch::into_result;
use halos_dmr::{
    CONTENT_TYPE, Composite, CompositeResult, DispatchError, DispatchResult, Dispatcher, ModelNode, Operation,
};
use reqwest::header;
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, trace};
use url::Url;

use crate::config::HttpDispatcherConfig;

/// Executes operations against one management endpoint
pub struct HttpDispatcher {
    client: reqwest::Client,
    endpoint: Url,
    credentials: Option<(String, SecretString)>,
}

impl std::fmt::Debug for HttpDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpDispatcher")
            .field("client", &"<reqwest::Client>")
            .field("endpoint", &self.endpoint.as_str())
            .field(
                "credentials",
                &self.credentials.as_ref().map(|(user, _)| (user, "<redacted>")),
            )
            .finish()
    }
}

impl HttpDispatcher {
    /// Create a dispatcher with pooled connections
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Transport`] if the endpoint is not a valid URL
    /// or the HTTP client can not be built.
    pub fn new(config: HttpDispatcherConfig) -> DispatchResult<Self> {
        let endpoint = Url::parse(&config.endpoint)
            .map_err(|e| DispatchError::transport(format!("Invalid endpoint '{}': {e}", config.endpoint), "connect"))?;

        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Some(std::time::Duration::from_secs(90)))
            .build()
            .map_err(|e| DispatchError::transport(format!("Failed to create HTTP client: {e}"), "connect"))?;

        let credentials = match (config.username, config.password) {
            (Some(username), Some(password)) => Some((username, password)),
            (Some(username), None) => Some((username, SecretString::from(String::new()))),
            _ => None,
        };

        debug!(endpoint = %endpoint, "Created HTTP dispatcher");
        Ok(Self {
            client,
            endpoint,
            credentials,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Post one encoded request and decode the raw response
    async fn dmr(&self, request: &ModelNode, cli: &str) -> DispatchResult<ModelNode> {
        let body = request.to_base64()?;
        trace!(operation = cli, endpoint = %self.endpoint, "Executing operation");

        let mut builder = self
            .client
            .post(self.endpoint.clone())
            .header(header::ACCEPT, CONTENT_TYPE)
            .header(header::CONTENT_TYPE, CONTENT_TYPE)
            .body(body);
        if let Some((username, password)) = &self.credentials {
            builder = builder.basic_auth(username, Some(password.expose_secret()));
        }

        let response = builder
            .send()
            .await
            .map_err(|e| DispatchError::transport(format!("HTTP request failed: {e}"), cli))?;

        let status = response.status();
        if !status.is_success() {
            debug!(operation = cli, status = status.as_u16(), "Operation rejected");
            return Err(DispatchError::failure(
                status.as_u16(),
                status.canonical_reason().unwrap_or_default(),
                cli,
            ));
        }

        let payload = response
            .text()
            .await
            .map_err(|e| DispatchError::transport(format!("Unable to read response body: {e}"), cli))?;
        Ok(ModelNode::from_base64(&payload)?)
    }
}

#[async_trait]
impl Dispatcher for HttpDispatcher {
    async fn execute(&self, operation: &Operation) -> DispatchResult<ModelNode> {
        let cli = operation.as_cli();
        let response = self.dmr(&operation.to_model_node(), &cli).await?;
        into_result(response, &cli)
    }

    async fn execute_composite(&self, composite: &Composite) -> DispatchResult<CompositeResult> {
        let cli = composite.as_cli();
        let response = self.dmr(&composite.to_model_node(), &cli).await?;
        let steps = into_result(response, &cli)?;
        Ok(CompositeResult::new(composite.clone(), steps))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_endpoint() {
        let err = HttpDispatcher::new(HttpDispatcherConfig::new("not a url")).unwrap_err();
        assert!(matches!(err, DispatchError::Transport { .. }));
        assert!(err.to_string().contains("Invalid endpoint"));
    }

    #[test]
    fn test_debug_redaction() {
        let config = HttpDispatcherConfig::default().with_credentials("admin", "secret-password-12345");
        let dispatcher = HttpDispatcher::new(config).unwrap();
        let debug_output = format!("{dispatcher:?}");
        assert!(!debug_output.contains("secret-password-12345"));
        assert!(debug_output.contains("<redacted>"));
        assert_eq!(dispatcher.endpoint().port(), Some(9990));
    }
}
