//! halos-proxy: multi-instance management proxy
//!
//! Holds one management connection per registered WildFly instance and fans
//! DMR operations out to all of them, or to one named instance. Failures of
//! single instances are reported as data (`outcome => failed`) and never fail
//! the broadcast.
//!
//! # Quick Start
//!
//! ```bash
//! # Serve on localhost:9090 and register the instances of a config file
//! halos-proxy serve --bind 127.0.0.1:9090 --config proxy.toml
//!
//! # Register another instance at runtime
//! curl -X POST localhost:9090/v1/instance \
//!   -H 'Content-Type: application/json' \
//!   -d '{"name":"wf0","host":"localhost","port":9990,"username":"admin","password":"admin"}'
//! ```
//!
//! # Architecture
//!
//! ```text
//! HTTP surface (axum)  ──▶  InstanceDispatcher  ──▶  ManagementConnection (one per instance)
//!   server::router          register/unregister        HttpConnection
//!                           execute / execute_stream   application/dmr-encoded
//!                           execute_single
//! ```

#![warn(clippy::all)]

pub mod config;
pub mod connection;
pub mod dispatcher;
pub mod error;
pub mod instance;
pub mod server;

#[cfg(feature = "cli")]
pub mod cli;

// Re-exports for convenience
pub use crate::config::ProxyConfig;
pub use connection::{ConnectionFactory, HttpConnectionFactory, ManagementConnection};
pub use dispatcher::{InstanceDispatcher, Registration};
pub use error::{ProxyError, ProxyErrorExt, ProxyResult};
pub use instance::{Instance, InstanceInfo};

/// Version of halos-proxy
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
