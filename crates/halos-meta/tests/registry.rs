//! Registry behaviour against a scripted dispatcher

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use halos_dmr::constants::{
    ACCESS_CONTROL, ATTRIBUTES, CHILDREN, COMBINED_DESCRIPTIONS, DEFAULT, DESCRIPTION, EXECUTE, LOCALE,
    MODEL_DESCRIPTION, OPERATIONS, READ, RECURSIVE_DEPTH, TRIM_DESCRIPTIONS, WRITE,
};
use halos_dmr::dispatch::into_result;
use halos_dmr::operation::step_key;
use halos_dmr::{
    Composite, CompositeResult, DispatchResult, Dispatcher, ModelNode, Operation, ResourceAddress, response,
};
use halos_meta::authorisation::registry_decision;
use halos_meta::{
    AccessControlProvider, AddressTemplate, Constraint, CoreStatementContext, MetadataError, MetadataKind,
    MetadataRegistry, MetadataRequest, Scope, StatementContextResolver, WildcardResolver,
};
use pretty_assertions::assert_eq;

#[derive(Debug, Clone, PartialEq)]
enum Call {
    Single(Operation),
    Composite(Vec<Operation>),
}

#[derive(Default)]
struct ScriptedDispatcher {
    calls: Mutex<Vec<Call>>,
    failing: Vec<ResourceAddress>,
}

impl ScriptedDispatcher {
    fn failing(addresses: &[&str]) -> Self {
        Self {
            calls: Mutex::default(),
            failing: addresses.iter().map(|a| ResourceAddress::parse(a)).collect(),
        }
    }

    fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn respond(&self, operation: &Operation) -> ModelNode {
        if self.failing.contains(operation.address()) {
            return response::failed(format!("WFLYCTL0030: No resource definition is registered for address {}", operation.address()));
        }
        response::success(payload(operation))
    }
}

/// A plausible rrd payload for `operation`
fn payload(operation: &Operation) -> ModelNode {
    let mut node = ModelNode::new();
    node.get(DESCRIPTION)
        .unwrap()
        .set(format!("Description of {}", operation.address()))
        .unwrap();
    node.get(ATTRIBUTES)
        .unwrap()
        .get("name")
        .unwrap()
        .get(DESCRIPTION)
        .unwrap()
        .set("The name")
        .unwrap();

    if operation.has_parameter(ACCESS_CONTROL) {
        let default = node.get(ACCESS_CONTROL).unwrap().get(DEFAULT).unwrap();
        default.get(READ).unwrap().set(true).unwrap();
        default.get(WRITE).unwrap().set(true).unwrap();
        let attribute = default.get(ATTRIBUTES).unwrap().get("name").unwrap();
        attribute.get(READ).unwrap().set(true).unwrap();
        attribute.get(WRITE).unwrap().set(false).unwrap();
        let add = default.get(OPERATIONS).unwrap().get("add").unwrap();
        add.get(EXECUTE).unwrap().set(true).unwrap();
    }

    if operation.has_parameter(RECURSIVE_DEPTH) {
        let child = node
            .get(CHILDREN)
            .unwrap()
            .get("child")
            .unwrap()
            .get(MODEL_DESCRIPTION)
            .unwrap()
            .get("*")
            .unwrap();
        child.get(DESCRIPTION).unwrap().set("A child").unwrap();
    }
    node
}

#[async_trait]
impl Dispatcher for ScriptedDispatcher {
    async fn execute(&self, operation: &Operation) -> DispatchResult<ModelNode> {
        self.calls.lock().unwrap().push(Call::Single(operation.clone()));
        into_result(self.respond(operation), &operation.as_cli())
    }

    async fn execute_composite(&self, composite: &Composite) -> DispatchResult<CompositeResult> {
        self.calls
            .lock()
            .unwrap()
            .push(Call::Composite(composite.steps().to_vec()));
        let mut steps = ModelNode::new();
        for (index, operation) in composite.iter().enumerate() {
            steps.get(&step_key(index))?.set(self.respond(operation))?;
        }
        Ok(CompositeResult::new(composite.clone(), steps))
    }
}

fn registry(dispatcher: &Arc<ScriptedDispatcher>) -> MetadataRegistry {
    MetadataRegistry::new(dispatcher.clone(), Arc::new(CoreStatementContext::new()))
}

fn template(s: &str) -> AddressTemplate {
    AddressTemplate::of(s)
}

#[tokio::test]
async fn get_fails_on_empty_cache() {
    let dispatcher = Arc::new(ScriptedDispatcher::default());
    let registry = registry(&dispatcher);

    let err = registry.get(&template("subsystem=io"), Scope::Normal).unwrap_err();
    assert!(matches!(
        err,
        MetadataError::MissingMetadata {
            kind: MetadataKind::Description,
            ..
        }
    ));
    assert!(dispatcher.calls().is_empty());

    let metadata = registry.lookup(&template("subsystem=io"), Scope::Normal).unwrap();
    assert!(metadata.is_empty());
}

#[tokio::test]
async fn find_issues_one_combined_rrd_and_caches() {
    let dispatcher = Arc::new(ScriptedDispatcher::default());
    let registry = registry(&dispatcher);
    let io = template("subsystem=io");

    let metadata = registry.find(&io, Scope::Normal).await.unwrap();
    assert!(metadata.is_complete());
    assert_eq!(metadata.description().unwrap().description(), Some("Description of /subsystem=*"));
    assert!(metadata.security_context().is_executable("add"));
    assert!(!metadata.security_context().is_writable_attribute("name"));

    let expected = Operation::builder(ResourceAddress::parse("/subsystem=*"), "read-resource-description")
        .param(ACCESS_CONTROL, COMBINED_DESCRIPTIONS)
        .param(OPERATIONS, true)
        .param(LOCALE, "en")
        .build();
    assert_eq!(dispatcher.calls(), vec![Call::Single(expected)]);

    // served from the cache, also for other resources of the same type
    registry.find(&io, Scope::Normal).await.unwrap();
    registry.find(&template("subsystem=logging"), Scope::Normal).await.unwrap();
    assert_eq!(dispatcher.calls().len(), 1);
    assert!(registry.get(&io, Scope::Normal).unwrap().is_complete());
}

#[tokio::test]
async fn recursive_scope_refetches_flat_entries() {
    let dispatcher = Arc::new(ScriptedDispatcher::default());
    let registry = registry(&dispatcher);
    let io = template("subsystem=io");

    registry.find(&io, Scope::Normal).await.unwrap();
    assert!(registry.get(&io, Scope::Recursive).is_err());

    let metadata = registry.find(&io, Scope::Recursive).await.unwrap();
    assert!(metadata.description().unwrap().is_recursive());

    let calls = dispatcher.calls();
    assert_eq!(calls.len(), 2);
    let Call::Single(operation) = &calls[1] else {
        panic!("expected a single operation, got {calls:?}");
    };
    assert_eq!(operation.parameter(RECURSIVE_DEPTH).unwrap().as_int().unwrap(), 3);

    // children are cached flat
    let child = registry
        .cached_description(&ResourceAddress::parse("/subsystem=*/child=*"))
        .unwrap();
    assert!(!child.is_recursive());
    assert!(!registry.cached_description(&ResourceAddress::parse("/subsystem=*")).unwrap().node().has(CHILDREN));

    // a recursive entry satisfies a normal lookup
    registry.find(&io, Scope::Normal).await.unwrap();
    assert_eq!(dispatcher.calls().len(), 2);
}

#[tokio::test]
async fn different_addresses_use_plain_and_trimmed_rrds() {
    let dispatcher = Arc::new(ScriptedDispatcher::default());
    let registry = registry(&dispatcher).with_resolvers(Arc::new(WildcardResolver), Arc::new(StatementContextResolver));

    let metadata = registry
        .find(&template("subsystem=io/worker=default"), Scope::Normal)
        .await
        .unwrap();
    assert!(metadata.is_complete());

    let calls = dispatcher.calls();
    let [Call::Composite(steps)] = calls.as_slice() else {
        panic!("expected one composite, got {calls:?}");
    };
    assert_eq!(steps.len(), 2);
    assert_eq!(steps[0].address().to_string(), "/subsystem=io/worker=*");
    assert!(!steps[0].has_parameter(ACCESS_CONTROL));
    assert_eq!(steps[1].address().to_string(), "/subsystem=io/worker=default");
    assert_eq!(steps[1].parameter(ACCESS_CONTROL).unwrap().as_str(), Some(TRIM_DESCRIPTIONS));

    // description is shared, the security context is not
    registry
        .find(&template("subsystem=io/worker=other"), Scope::Normal)
        .await
        .unwrap();
    let calls = dispatcher.calls();
    assert_eq!(calls.len(), 2);
    let Call::Single(operation) = &calls[1] else {
        panic!("expected a single operation, got {calls:?}");
    };
    assert_eq!(operation.address().to_string(), "/subsystem=io/worker=other");
    assert_eq!(operation.parameter(ACCESS_CONTROL).unwrap().as_str(), Some(TRIM_DESCRIPTIONS));
}

#[tokio::test]
async fn find_fails_for_required_and_swallows_optional() {
    let dispatcher = Arc::new(ScriptedDispatcher::failing(&["/subsystem=*"]));
    let registry = registry(&dispatcher);
    let io = template("subsystem=io");

    let err = registry.find(&io, Scope::Normal).await.unwrap_err();
    assert!(matches!(err, MetadataError::Dispatch(_)));
    assert!(err.to_string().contains("WFLYCTL0030"));

    let metadata = registry.find(&io, Scope::Optional).await.unwrap();
    assert!(metadata.is_empty());
    assert!(!metadata.security_context().is_writable());
}

#[tokio::test]
async fn find_reports_resolution_errors() {
    let dispatcher = Arc::new(ScriptedDispatcher::default());
    let registry = registry(&dispatcher);

    let err = registry
        .find(&template("{unknown}/subsystem=io"), Scope::Normal)
        .await
        .unwrap_err();
    assert!(matches!(err, MetadataError::UnknownPlaceholder { .. }));
    assert!(dispatcher.calls().is_empty());
}

#[tokio::test]
async fn find_all_batches_in_piles_of_three() {
    let dispatcher = Arc::new(ScriptedDispatcher::default());
    let registry = registry(&dispatcher);

    let request = (1..=7)
        .map(|i| (template(&format!("subsystem=s{i}/child{i}=x")), Scope::Normal))
        .collect::<MetadataRequest>();
    let result = registry.find_all(&request).await.unwrap();
    assert_eq!(result.len(), 7);
    assert!(result.iter().all(|metadata| metadata.is_complete()));

    let mut pile_sizes: Vec<usize> = dispatcher
        .calls()
        .iter()
        .map(|call| match call {
            Call::Composite(steps) => steps.len(),
            Call::Single(_) => 0,
        })
        .collect();
    pile_sizes.sort_unstable();
    assert_eq!(pile_sizes, vec![1, 3, 3]);

    // nothing left to fetch
    let again = registry.find_all(&request).await.unwrap();
    assert_eq!(again.len(), 7);
    assert_eq!(dispatcher.calls().len(), 3);
}

#[tokio::test]
async fn find_all_deduplicates_shared_addresses() {
    let dispatcher = Arc::new(ScriptedDispatcher::default());
    let registry = registry(&dispatcher);

    let request = MetadataRequest::new()
        .add(template("subsystem=io/worker=a"), Scope::Normal)
        .add(template("subsystem=io/worker=b"), Scope::Normal);
    registry.find_all(&request).await.unwrap();

    let calls = dispatcher.calls();
    let [Call::Composite(steps)] = calls.as_slice() else {
        panic!("expected one composite, got {calls:?}");
    };
    assert_eq!(steps.len(), 1);
}

#[tokio::test]
async fn find_all_isolates_optional_failures() {
    let dispatcher = Arc::new(ScriptedDispatcher::failing(&["/subsystem=mail/mail-session=*"]));
    let registry = registry(&dispatcher);

    let io = template("subsystem=io/worker=*");
    let mail = template("subsystem=mail/mail-session=default");
    let request = MetadataRequest::new()
        .add(io.clone(), Scope::Normal)
        .add(mail.clone(), Scope::Optional);
    let result = registry.find_all(&request).await.unwrap();

    assert!(result.get(&io).unwrap().is_complete());
    let optional = result.get(&mail).unwrap();
    assert!(optional.is_empty());
    assert_eq!(optional.scope(), Scope::Optional);

    // the optional operation travels alone
    let calls = dispatcher.calls();
    assert_eq!(calls.len(), 2);
    assert!(calls.iter().all(|call| matches!(call, Call::Composite(steps) if steps.len() == 1)));
}

#[tokio::test]
async fn find_all_fails_for_required_failures() {
    let dispatcher = Arc::new(ScriptedDispatcher::failing(&["/subsystem=mail/mail-session=*"]));
    let registry = registry(&dispatcher);

    let request = MetadataRequest::new()
        .add_str("subsystem=io/worker=*")
        .add_str("subsystem=mail/mail-session=default");
    let err = registry.find_all(&request).await.unwrap_err();
    assert!(matches!(err, MetadataError::FailedStep { .. }));
}

#[tokio::test]
async fn registry_backed_authorisation() {
    let dispatcher = Arc::new(ScriptedDispatcher::default());
    let registry = registry(&dispatcher);
    let worker = template("subsystem=io/worker=*");

    let decision = registry_decision(AccessControlProvider::Rbac, &registry);
    assert!(!decision.is_allowed(&Constraint::executable(worker.clone(), "add")));

    registry.find(&worker, Scope::Normal).await.unwrap();
    let decision = registry_decision(AccessControlProvider::Rbac, &registry);
    assert!(decision.is_allowed(&Constraint::executable(worker.clone(), "add")));
    assert!(decision.is_allowed(&Constraint::readable(worker.clone(), "name")));
    assert!(!decision.is_allowed(&Constraint::writable(worker, "name")));
}
