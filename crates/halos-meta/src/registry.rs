//! The metadata registry
//!
//! Resource descriptions and security contexts are cached per resolved
//! address. [`MetadataRegistry::find`] and [`MetadataRegistry::find_all`]
//! compute the smallest set of `read-resource-description` operations that
//! fills the gaps, execute them through a [`Dispatcher`] and merge the parsed
//! results back into the caches.

use std::sync::Arc;

use futures::future::{join, join_all};
use halos_dmr::constants::{
    ACCESS_CONTROL, COMBINED_DESCRIPTIONS, LOCALE, OPERATIONS, READ_RESOURCE_DESCRIPTION_OPERATION,
    RECURSIVE_DEPTH, TRIM_DESCRIPTIONS,
};
use halos_dmr::{Composite, Dispatcher, Operation, ResourceAddress};
use moka::policy::EvictionPolicy;
use moka::sync::Cache;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use crate::capabilities::Capabilities;
use crate::context::StatementContext;
use crate::description::ResourceDescription;
use crate::error::{MetadataError, MetadataKind, MetadataResult};
use crate::metadata::{Metadata, MetadataRequest, MetadataResults};
use crate::resolver::WildcardResolver;
use crate::rrd::{self, RrdResult};
use crate::scope::Scope;
use crate::security::SecurityContext;
use crate::template::{AddressTemplate, SegmentResolver};

/// Tuning knobs of the registry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Maximum number of cached resource descriptions
    pub description_cache_size: u64,
    /// Maximum number of cached security contexts
    pub security_context_cache_size: u64,
    /// Operations per composite in [`MetadataRegistry::find_all`]
    pub batch_size: usize,
    /// `recursive-depth` of recursive lookups
    pub recursive_depth: i32,
    /// `locale` of every rrd operation
    pub locale: String,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            description_cache_size: 250,
            security_context_cache_size: 300,
            batch_size: 3,
            recursive_depth: 3,
            locale: "en".to_string(),
        }
    }
}

/// Resolved addresses and cache hits for one template
struct Lookup {
    description_address: ResourceAddress,
    security_address: ResourceAddress,
    description: Option<Arc<ResourceDescription>>,
    security_context: Option<Arc<SecurityContext>>,
}

impl Lookup {
    fn is_complete(&self) -> bool {
        self.description.is_some() && self.security_context.is_some()
    }
}

/// Cached access to resource descriptions and security contexts
pub struct MetadataRegistry {
    dispatcher: Arc<dyn Dispatcher>,
    context: Arc<dyn StatementContext>,
    capabilities: Arc<Capabilities>,
    description_resolver: Arc<dyn SegmentResolver>,
    security_resolver: Arc<dyn SegmentResolver>,
    descriptions: Cache<ResourceAddress, Arc<ResourceDescription>>,
    security_contexts: Cache<ResourceAddress, Arc<SecurityContext>>,
    config: RegistryConfig,
}

impl std::fmt::Debug for MetadataRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetadataRegistry")
            .field("descriptions", &self.descriptions.entry_count())
            .field("security_contexts", &self.security_contexts.entry_count())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl MetadataRegistry {
    /// Registry with default configuration and wildcard resolvers
    pub fn new(dispatcher: Arc<dyn Dispatcher>, context: Arc<dyn StatementContext>) -> Self {
        Self::with_config(dispatcher, context, RegistryConfig::default())
    }

    /// Registry with explicit configuration
    pub fn with_config(
        dispatcher: Arc<dyn Dispatcher>,
        context: Arc<dyn StatementContext>,
        config: RegistryConfig,
    ) -> Self {
        let descriptions = Cache::builder()
            .max_capacity(config.description_cache_size)
            .eviction_policy(EvictionPolicy::lru())
            .build();
        let security_contexts = Cache::builder()
            .max_capacity(config.security_context_cache_size)
            .eviction_policy(EvictionPolicy::lru())
            .build();
        Self {
            dispatcher,
            context,
            capabilities: Arc::new(Capabilities::default()),
            description_resolver: Arc::new(WildcardResolver),
            security_resolver: Arc::new(WildcardResolver),
            descriptions,
            security_contexts,
            config,
        }
    }

    /// Use the given capability registry
    pub fn with_capabilities(mut self, capabilities: Arc<Capabilities>) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Use custom resolvers for description and security context addresses
    pub fn with_resolvers(
        mut self,
        description_resolver: Arc<dyn SegmentResolver>,
        security_resolver: Arc<dyn SegmentResolver>,
    ) -> Self {
        self.description_resolver = description_resolver;
        self.security_resolver = security_resolver;
        self
    }

    pub fn capabilities(&self) -> &Arc<Capabilities> {
        &self.capabilities
    }

    pub fn context(&self) -> &Arc<dyn StatementContext> {
        &self.context
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Cached description for an already resolved address
    pub fn cached_description(&self, address: &ResourceAddress) -> Option<Arc<ResourceDescription>> {
        self.descriptions.get(address)
    }

    /// Cached security context for an already resolved address
    pub fn cached_security_context(&self, address: &ResourceAddress) -> Option<Arc<SecurityContext>> {
        self.security_contexts.get(address)
    }

    /// Metadata from the caches only.
    ///
    /// # Errors
    ///
    /// Returns a resolution error if the template can not be resolved and
    /// [`MetadataError::MissingMetadata`] if either part is not cached.
    pub fn get(&self, template: &AddressTemplate, scope: Scope) -> MetadataResult<Metadata> {
        let lookup = self.lookup_entries(template, scope)?;
        if lookup.description.is_none() {
            return Err(MetadataError::missing(
                MetadataKind::Description,
                template,
                &lookup.description_address,
            ));
        }
        if lookup.security_context.is_none() {
            return Err(MetadataError::missing(
                MetadataKind::SecurityContext,
                template,
                &lookup.security_address,
            ));
        }
        Ok(self.assemble(template, scope, lookup))
    }

    /// Metadata from the caches, with absent parts left empty.
    ///
    /// # Errors
    ///
    /// Returns a resolution error if the template can not be resolved.
    pub fn lookup(&self, template: &AddressTemplate, scope: Scope) -> MetadataResult<Metadata> {
        let lookup = self.lookup_entries(template, scope)?;
        Ok(self.assemble(template, scope, lookup))
    }

    /// Metadata from the caches, fetching whatever is missing.
    ///
    /// # Errors
    ///
    /// Returns resolution, dispatch and parse errors, or
    /// [`MetadataError::MissingMetadata`] if the fetched payload did not
    /// contain what was asked for. Optional scopes swallow dispatch and parse
    /// errors and return what is cached.
    pub async fn find(&self, template: &AddressTemplate, scope: Scope) -> MetadataResult<Metadata> {
        let lookup = self.lookup_entries(template, scope)?;
        if lookup.is_complete() {
            trace!(%template, %scope, "Metadata cache hit");
            return Ok(self.assemble(template, scope, lookup));
        }

        let plan = self.fetch_plan(&lookup, scope);
        if plan.is_empty() {
            return Err(MetadataError::NoFetchPlan {
                template: template.to_string(),
            });
        }
        debug!(%template, %scope, operations = plan.len(), "Fetching metadata");

        match self.fetch(plan).await {
            Ok(result) => self.merge(result),
            Err(e) if scope.is_optional() => {
                warn!(%template, error = %e, "Unable to fetch optional metadata");
            }
            Err(e) => return Err(e),
        }
        self.settle(template, scope)
    }

    /// Metadata for all templates of `request`, fetched with as few round
    /// trips as possible.
    ///
    /// Missing parts are fetched in composites of at most `batch_size`
    /// operations, executed concurrently. Operations for optional templates
    /// are sent one per composite and their failures are ignored.
    ///
    /// # Errors
    ///
    /// Returns the first resolution, dispatch or parse error of a required
    /// template, or [`MetadataError::MissingMetadata`] if a required template
    /// is still incomplete after fetching.
    pub async fn find_all(&self, request: &MetadataRequest) -> MetadataResult<MetadataResults> {
        let mut required: Vec<Operation> = Vec::new();
        let mut optional: Vec<Operation> = Vec::new();
        let mut unsatisfied = false;

        for (template, scope) in request.iter() {
            let lookup = match self.lookup_entries(template, scope) {
                Ok(lookup) => lookup,
                Err(e) if scope.is_optional() => {
                    warn!(%template, error = %e, "Skipping optional template");
                    continue;
                }
                Err(e) => return Err(e),
            };
            if lookup.is_complete() {
                continue;
            }
            unsatisfied = true;
            let pile = if scope.is_optional() {
                &mut optional
            } else {
                &mut required
            };
            for operation in self.fetch_plan(&lookup, scope) {
                if !pile.contains(&operation) {
                    pile.push(operation);
                }
            }
        }

        if unsatisfied {
            if required.is_empty() && optional.is_empty() {
                return Err(MetadataError::NoFetchPlan {
                    template: request
                        .iter()
                        .map(|(template, _)| template.to_string())
                        .collect::<Vec<_>>()
                        .join(", "),
                });
            }
            debug!(
                required = required.len(),
                optional = optional.len(),
                batch_size = self.config.batch_size,
                "Fetching metadata"
            );
            self.fetch_all(required, optional).await?;
        }

        let mut result = MetadataResults::default();
        for (template, scope) in request.iter() {
            let metadata = if scope.is_optional() {
                self.lookup(template, scope)
                    .unwrap_or_else(|_| Metadata::empty(template.clone(), scope, self.capabilities.clone()))
            } else {
                self.get(template, scope)?
            };
            result.insert(metadata);
        }
        Ok(result)
    }

    // ---- internals ----

    fn lookup_entries(&self, template: &AddressTemplate, scope: Scope) -> MetadataResult<Lookup> {
        let context = self.context.as_ref();
        let description_address = template.resolve(context, self.description_resolver.as_ref())?;
        let security_address = template.resolve(context, self.security_resolver.as_ref())?;

        // a flat entry does not satisfy a recursive lookup
        let description = self
            .descriptions
            .get(&description_address)
            .filter(|d| !scope.is_recursive() || d.is_recursive());
        let security_context = self
            .security_contexts
            .get(&security_address)
            .filter(|s| !scope.is_recursive() || s.is_recursive());

        Ok(Lookup {
            description_address,
            security_address,
            description,
            security_context,
        })
    }

    fn assemble(&self, template: &AddressTemplate, scope: Scope, lookup: Lookup) -> Metadata {
        Metadata::new(
            template.clone(),
            scope,
            lookup.description,
            lookup.security_context,
            self.capabilities.clone(),
        )
    }

    fn settle(&self, template: &AddressTemplate, scope: Scope) -> MetadataResult<Metadata> {
        if scope.is_optional() {
            self.lookup(template, scope)
        } else {
            self.get(template, scope)
        }
    }

    fn fetch_plan(&self, lookup: &Lookup, scope: Scope) -> Vec<Operation> {
        let description = &lookup.description_address;
        let security = &lookup.security_address;
        match (lookup.description.is_some(), lookup.security_context.is_some()) {
            (true, true) => Vec::new(),
            (false, false) if description == security => {
                vec![self.rrd(description, Some(COMBINED_DESCRIPTIONS), scope)]
            }
            (false, false) => vec![
                self.rrd(description, None, scope),
                self.rrd(security, Some(TRIM_DESCRIPTIONS), scope),
            ],
            (false, true) => vec![self.rrd(description, None, scope)],
            (true, false) => vec![self.rrd(security, Some(TRIM_DESCRIPTIONS), scope)],
        }
    }

    fn rrd(&self, address: &ResourceAddress, access_control: Option<&str>, scope: Scope) -> Operation {
        let mut builder = Operation::builder(address.clone(), READ_RESOURCE_DESCRIPTION_OPERATION);
        if let Some(access_control) = access_control {
            builder = builder.param(ACCESS_CONTROL, access_control);
        }
        builder = builder.param(OPERATIONS, true);
        if scope.is_recursive() {
            builder = builder.param(RECURSIVE_DEPTH, self.config.recursive_depth);
        }
        builder.param(LOCALE, self.config.locale.as_str()).build()
    }

    async fn fetch(&self, mut plan: Vec<Operation>) -> MetadataResult<RrdResult> {
        if plan.len() == 1 {
            if let Some(operation) = plan.pop() {
                let result = self.dispatcher.execute(&operation).await?;
                return rrd::parse_single(&operation, &result);
            }
        }
        self.fetch_composite(Composite::new(plan)).await
    }

    async fn fetch_composite(&self, composite: Composite) -> MetadataResult<RrdResult> {
        let result = self.dispatcher.execute_composite(&composite).await?;
        rrd::parse_composite(&result)
    }

    async fn fetch_all(&self, required: Vec<Operation>, optional: Vec<Operation>) -> MetadataResult<()> {
        let batch_size = self.config.batch_size.max(1);
        let required_calls = required
            .chunks(batch_size)
            .map(|pile| self.fetch_composite(Composite::new(pile.to_vec())));
        let optional_calls = optional.into_iter().map(|operation| async move {
            let cli = operation.as_cli();
            match self.fetch_composite(Composite::new(vec![operation])).await {
                Ok(result) => Some(result),
                Err(e) => {
                    warn!(operation = %cli, error = %e, "Ignoring failed optional rrd");
                    None
                }
            }
        });

        let (required_results, optional_results) =
            join(join_all(required_calls), join_all(optional_calls)).await;

        // all required piles must succeed before anything is cached
        let required_results = required_results.into_iter().collect::<MetadataResult<Vec<_>>>()?;
        for result in required_results.into_iter().chain(optional_results.into_iter().flatten()) {
            self.merge(result);
        }
        Ok(())
    }

    fn merge(&self, result: RrdResult) {
        let (descriptions, security_contexts) = result.into_parts();
        trace!(
            descriptions = descriptions.len(),
            security_contexts = security_contexts.len(),
            "Merging rrd result"
        );
        for (address, description) in descriptions {
            self.descriptions.insert(address, Arc::new(description));
        }
        for (address, security_context) in security_contexts {
            self.security_contexts.insert(address, Arc::new(security_context));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RegistryConfig::default();
        assert_eq!(config.description_cache_size, 250);
        assert_eq!(config.security_context_cache_size, 300);
        assert_eq!(config.batch_size, 3);
        assert_eq!(config.recursive_depth, 3);
        assert_eq!(config.locale, "en");
    }

    #[test]
    fn test_partial_config() {
        let config: RegistryConfig = serde_json::from_str(r#"{"batch_size": 5}"#).unwrap();
        assert_eq!(config.batch_size, 5);
        assert_eq!(config.description_cache_size, 250);
    }
}
