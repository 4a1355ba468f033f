//! Fan-out of management operations to every registered instance
//!
//! The dispatcher keeps one live [`ManagementConnection`] per instance.
//! Operations run concurrently against a snapshot of the registered
//! connections, so registering or removing instances never blocks a running
//! broadcast. A failing instance never fails the broadcast: its error is
//! turned into a synthetic `outcome => failed` response.

use std::sync::Arc;

use dashmap::DashMap;
use futures::future::join_all;
use futures::stream::{BoxStream, FuturesUnordered, StreamExt};
use halos_dmr::{ModelNode, Operation, response};
use tokio::sync::Mutex;
use tracing::{debug, error, info};

use crate::connection::{ConnectionFactory, ManagementConnection};
use crate::error::{ProxyError, ProxyResult};
use crate::instance::Instance;

/// Outcome of [`InstanceDispatcher::register`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    /// A new connection was opened
    Created,
    /// An instance with that name was already registered; nothing changed
    AlreadyRegistered,
}

#[derive(Clone)]
struct Entry {
    instance: Arc<Instance>,
    connection: Arc<dyn ManagementConnection>,
}

/// Holds the connections of all registered instances
pub struct InstanceDispatcher {
    factory: Arc<dyn ConnectionFactory>,
    entries: DashMap<String, Entry>,
    registration: Mutex<()>,
}

impl std::fmt::Debug for InstanceDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<String> = self.entries.iter().map(|e| e.key().clone()).collect();
        names.sort();
        f.debug_struct("InstanceDispatcher").field("instances", &names).finish()
    }
}

impl InstanceDispatcher {
    pub fn new(factory: Arc<dyn ConnectionFactory>) -> Self {
        Self {
            factory,
            entries: DashMap::new(),
            registration: Mutex::new(()),
        }
    }

    /// Open a connection for `instance` and add it.
    ///
    /// # Errors
    ///
    /// Returns [`ProxyError::InvalidInstance`] if the name is not usable and
    /// [`ProxyError::Connection`] if the host can not be resolved. In both cases
    /// nothing is added.
    pub async fn register(&self, instance: Instance) -> ProxyResult<Registration> {
        instance.validate()?;
        let _guard = self.registration.lock().await;
        if self.entries.contains_key(&instance.name) {
            debug!(%instance, "Instance already registered");
            return Ok(Registration::AlreadyRegistered);
        }

        let connection = match self.factory.connect(&instance).await {
            Ok(connection) => connection,
            Err(e) => {
                error!(%instance, error = %e, "Unable to register instance");
                return Err(e);
            }
        };
        info!(%instance, "Created connection");
        self.entries.insert(
            instance.name.clone(),
            Entry {
                instance: Arc::new(instance),
                connection,
            },
        );
        Ok(Registration::Created)
    }

    /// Close and remove the instance `name`. Returns whether it was registered.
    ///
    /// # Errors
    ///
    /// Returns [`ProxyError::Close`] if closing the connection failed. The
    /// instance is removed regardless.
    pub async fn unregister(&self, name: &str) -> ProxyResult<bool> {
        let _guard = self.registration.lock().await;
        let Some((_, entry)) = self.entries.remove(name) else {
            return Ok(false);
        };
        match entry.connection.close().await {
            Ok(()) => {
                info!(instance = %entry.instance, "Closed connection");
                Ok(true)
            }
            Err(e) => {
                error!(instance = %entry.instance, error = %e, "Unable to close connection");
                Err(match e {
                    e @ ProxyError::Close { .. } => e,
                    other => ProxyError::close(entry.instance.as_ref(), other.to_string()),
                })
            }
        }
    }

    /// Execute `operation` against all instances concurrently.
    ///
    /// Returns `{name => response}` once every instance answered. Failures
    /// show up as `outcome => failed` responses.
    pub async fn execute(&self, operation: &Operation) -> ModelNode {
        let calls = self.snapshot().into_iter().map(|entry| async move {
            let response = Self::execute_on(&entry, operation).await;
            (entry.instance.name.clone(), response)
        });
        join_all(calls).await.into_iter().collect()
    }

    /// Execute `operation` against all instances and yield `(name, response)`
    /// pairs in completion order.
    pub fn execute_stream(&self, operation: Operation) -> BoxStream<'static, (String, ModelNode)> {
        let operation = Arc::new(operation);
        let calls: FuturesUnordered<_> = self
            .snapshot()
            .into_iter()
            .map(|entry| {
                let operation = Arc::clone(&operation);
                async move {
                    let response = Self::execute_on(&entry, &operation).await;
                    (entry.instance.name.clone(), response)
                }
            })
            .collect();
        calls.boxed()
    }

    /// Execute `operation` against the instance `name` only and return
    /// `{name => response}`.
    ///
    /// # Errors
    ///
    /// Returns [`ProxyError::InstanceNotFound`] if no such instance is
    /// registered.
    pub async fn execute_single(&self, name: &str, operation: &Operation) -> ProxyResult<ModelNode> {
        let entry = self.entries.get(name).map(|e| e.value().clone()).ok_or_else(|| {
            error!("Unable to find connection for instance {name}. Did you register {name}?");
            ProxyError::instance_not_found(name)
        })?;
        let response = Self::execute_on(&entry, operation).await;
        Ok(std::iter::once((entry.instance.name.clone(), response)).collect())
    }

    /// Registered instances sorted by name
    pub fn instances(&self) -> Vec<Arc<Instance>> {
        let mut instances: Vec<Arc<Instance>> = self.entries.iter().map(|e| Arc::clone(&e.instance)).collect();
        instances.sort_by(|a, b| a.name.cmp(&b.name));
        instances
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    // no map guard may be held across an await
    fn snapshot(&self) -> Vec<Entry> {
        self.entries.iter().map(|e| e.value().clone()).collect()
    }

    async fn execute_on(entry: &Entry, operation: &Operation) -> ModelNode {
        match entry.connection.execute(operation).await {
            Ok(response) => response,
            Err(e) => {
                error!(
                    instance = %entry.instance,
                    operation = %operation.as_cli(),
                    error = %e,
                    "Error executing operation"
                );
                response::failed(e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use halos_dmr::ResourceAddress;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Echo {
        name: String,
    }

    #[async_trait]
    impl ManagementConnection for Echo {
        async fn execute(&self, _operation: &Operation) -> ProxyResult<ModelNode> {
            Ok(response::success(ModelNode::from(self.name.as_str())))
        }

        async fn close(&self) -> ProxyResult<()> {
            Ok(())
        }
    }

    #[derive(Default)]
    struct EchoFactory {
        connects: AtomicUsize,
    }

    #[async_trait]
    impl ConnectionFactory for EchoFactory {
        async fn connect(&self, instance: &Instance) -> ProxyResult<Arc<dyn ManagementConnection>> {
            self.connects.fetch_add(1, Ordering::SeqCst);
            if instance.host == "unknown" {
                return Err(ProxyError::connection(instance, "unknown host"));
            }
            Ok(Arc::new(Echo {
                name: instance.name.clone(),
            }))
        }
    }

    fn whoami() -> Operation {
        Operation::builder(ResourceAddress::root(), "whoami").build()
    }

    #[tokio::test]
    async fn test_register_and_list() {
        let dispatcher = InstanceDispatcher::new(Arc::new(EchoFactory::default()));
        assert!(dispatcher.is_empty());
        for name in ["wf1", "wf0"] {
            assert_eq!(
                dispatcher.register(Instance::new(name, "localhost", 9990)).await.unwrap(),
                Registration::Created
            );
        }
        let names: Vec<String> = dispatcher.instances().iter().map(|i| i.name.clone()).collect();
        assert_eq!(names, vec!["wf0", "wf1"]);
        assert!(dispatcher.contains("wf0"));
        assert!(format!("{dispatcher:?}").contains("wf1"));
    }

    #[tokio::test]
    async fn test_register_unknown_host_adds_nothing() {
        let dispatcher = InstanceDispatcher::new(Arc::new(EchoFactory::default()));
        let err = dispatcher
            .register(Instance::new("wf9", "unknown", 1234))
            .await
            .unwrap_err();
        assert!(matches!(err, ProxyError::Connection { .. }));
        assert!(dispatcher.is_empty());
    }

    #[tokio::test]
    async fn test_register_rejects_invalid_names() {
        let factory = Arc::new(EchoFactory::default());
        let dispatcher = InstanceDispatcher::new(Arc::clone(&factory) as Arc<dyn ConnectionFactory>);
        let err = dispatcher
            .register(Instance::new("wf\n0", "localhost", 9990))
            .await
            .unwrap_err();
        assert!(matches!(err, ProxyError::InvalidInstance { .. }));
        assert!(dispatcher.is_empty());
        assert_eq!(factory.connects.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_execute_single() {
        let dispatcher = InstanceDispatcher::new(Arc::new(EchoFactory::default()));
        dispatcher.register(Instance::new("wf0", "localhost", 9990)).await.unwrap();
        dispatcher.register(Instance::new("wf1", "localhost", 10090)).await.unwrap();

        let result = dispatcher.execute_single("wf1", &whoami()).await.unwrap();
        assert_eq!(result.keys().unwrap(), vec!["wf1"]);
        assert_eq!(result.path("wf1.result").unwrap().as_str(), Some("wf1"));

        let err = dispatcher.execute_single("wf2", &whoami()).await.unwrap_err();
        assert!(matches!(err, ProxyError::InstanceNotFound { .. }));
    }

    #[tokio::test]
    async fn test_execute_stream_yields_every_instance() {
        let dispatcher = InstanceDispatcher::new(Arc::new(EchoFactory::default()));
        for name in ["wf0", "wf1", "wf2"] {
            dispatcher.register(Instance::new(name, "localhost", 9990)).await.unwrap();
        }
        let mut names: Vec<String> = dispatcher
            .execute_stream(whoami())
            .map(|(name, response)| {
                assert!(response::is_success(&response));
                name
            })
            .collect()
            .await;
        names.sort();
        assert_eq!(names, vec!["wf0", "wf1", "wf2"]);
    }

    #[tokio::test]
    async fn test_unregister_unknown() {
        let dispatcher = InstanceDispatcher::new(Arc::new(EchoFactory::default()));
        assert!(!dispatcher.unregister("wf0").await.unwrap());
    }
}
