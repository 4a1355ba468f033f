//! Serve command implementation

use std::path::PathBuf;
use std::sync::Arc;

use clap::Args;
use tracing::{info, warn};

use crate::config::ProxyConfig;
use crate::connection::HttpConnectionFactory;
use crate::dispatcher::{InstanceDispatcher, Registration};
use crate::error::{ProxyErrorExt, ProxyResult};
use crate::server;

/// Serve the proxy over HTTP
///
/// # Examples
///
/// Serve on localhost and register the instances of a config file:
///   halos-proxy serve --config proxy.toml
///
/// Listen on all interfaces:
///   halos-proxy serve --bind 0.0.0.0:9090
#[derive(Debug, Args)]
pub struct ServeCommand {
    /// Bind address of the HTTP surface.
    ///
    /// Default: 127.0.0.1:9090 (localhost only)
    #[arg(long, value_name = "ADDR")]
    pub bind: Option<String>,

    /// Configuration file (.toml, .yaml, .yml or .json)
    #[arg(short, long, value_name = "FILE", env = "HALOS_PROXY_CONFIG")]
    pub config: Option<PathBuf>,
}

impl ServeCommand {
    /// Execute the serve command
    ///
    /// # Errors
    ///
    /// Returns `ProxyError` if the configuration is invalid or the server
    /// can not be started.
    pub async fn execute(self) -> ProxyResult<()> {
        let config = match &self.config {
            Some(path) => ProxyConfig::from_file(path)?,
            None => ProxyConfig::default(),
        };
        let bind = self.bind.clone().unwrap_or_else(|| config.bind.clone());

        let factory = HttpConnectionFactory::with_timeout(config.request_timeout())?;
        let dispatcher = Arc::new(InstanceDispatcher::new(Arc::new(factory)));

        // an unreachable instance does not prevent the proxy from starting
        for instance in config.instances {
            let name = instance.to_string();
            match dispatcher.register(instance).await {
                Ok(Registration::Created) => {}
                Ok(Registration::AlreadyRegistered) => warn!(instance = %name, "Duplicate instance in configuration"),
                Err(e) => warn!(instance = %name, error = %e, "Skipping instance"),
            }
        }

        let listener = tokio::net::TcpListener::bind(&bind)
            .await
            .config_context(if self.bind.is_some() { "--bind" } else { "bind" })?;
        info!(bind = %bind, instances = dispatcher.len(), "Starting proxy");

        server::serve(listener, dispatcher, shutdown_signal()).await?;
        info!("Proxy stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
    info!("Ctrl+C received, initiating shutdown");
}
