//! # halos-client
//!
//! [`HttpDispatcher`] implements [`halos_dmr::Dispatcher`] on top of reqwest
//! and talks to the `/management` endpoint of a WildFly server.
//!
//! ```no_run
//! use halos_client::{HttpDispatcher, HttpDispatcherConfig};
//! use halos_dmr::{Dispatcher, Operation, ResourceAddress};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = HttpDispatcherConfig::new("http://localhost:9990/management")
//!     .with_credentials("admin", "admin");
//! let dispatcher = HttpDispatcher::new(config)?;
//!
//! let operation = Operation::builder(ResourceAddress::root(), "read-resource").build();
//! let root = dispatcher.execute(&operation).await?;
//! println!("{root}");
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod http;

pub use config::{DEFAULT_ENDPOINT, HttpDispatcherConfig};
pub use http::HttpDispatcher;
