//! Parsing of `read-resource-description` responses into cache entries

use halos_dmr::constants::{
    ACCESS_CONTROL, ADDRESS, CHILDREN, DEFAULT, DESCRIPTION, EXCEPTIONS, HOST, MODEL_DESCRIPTION,
    RECURSIVE_DEPTH, RESULT, SERVER,
};
use halos_dmr::{CompositeResult, ModelNode, ModelValue, Operation, ResourceAddress, response};
use indexmap::IndexMap;
use indexmap::map::Entry;
use tracing::debug;

use crate::description::ResourceDescription;
use crate::error::{MetadataError, MetadataResult};
use crate::security::SecurityContext;

/// Descriptions and security contexts keyed by fully qualified address
#[derive(Debug, Default)]
pub struct RrdResult {
    descriptions: IndexMap<ResourceAddress, ResourceDescription>,
    security_contexts: IndexMap<ResourceAddress, SecurityContext>,
}

impl RrdResult {
    pub fn descriptions(&self) -> &IndexMap<ResourceAddress, ResourceDescription> {
        &self.descriptions
    }

    pub fn security_contexts(&self) -> &IndexMap<ResourceAddress, SecurityContext> {
        &self.security_contexts
    }

    /// `true` if nothing was found
    pub fn is_empty(&self) -> bool {
        self.descriptions.is_empty() && self.security_contexts.is_empty()
    }

    pub(crate) fn into_parts(
        self,
    ) -> (
        IndexMap<ResourceAddress, ResourceDescription>,
        IndexMap<ResourceAddress, SecurityContext>,
    ) {
        (self.descriptions, self.security_contexts)
    }
}

/// Parse the result of a single rrd operation
///
/// # Errors
///
/// Returns [`MetadataError::Dmr`] if addresses or child listings are malformed.
pub fn parse_single(operation: &Operation, result: &ModelNode) -> MetadataResult<RrdResult> {
    let mut parser = RrdParser::default();
    parser.parse_response(operation, result)?;
    Ok(parser.result)
}

/// Parse the step results of a composite made of rrd operations
///
/// # Errors
///
/// Returns [`MetadataError::FailedStep`] for the first failed step and
/// [`MetadataError::Dmr`] for malformed payloads.
pub fn parse_composite(result: &CompositeResult) -> MetadataResult<RrdResult> {
    let mut parser = RrdParser::default();
    for (index, operation, step) in result.iter() {
        if response::is_failure(step) {
            return Err(MetadataError::FailedStep {
                step: halos_dmr::operation::step_key(index),
                description: response::failure_description(step),
            });
        }
        if let Some(payload) = step.child(RESULT).filter(|r| r.is_defined()) {
            parser.parse_response(operation, payload)?;
        }
    }
    Ok(parser.result)
}

/// Prepend `host` and `server` to a result address when the server dropped them.
///
/// Wildcard rrds against running servers such as
/// `/host=master/server=one/interface=*` report addresses relative to the server.
pub fn make_fq_address(operation: &ResourceAddress, result: ResourceAddress) -> ResourceAddress {
    match (operation.segment(0), operation.segment(1)) {
        (Some((HOST, host)), Some((SERVER, server)))
            if operation.len() > 2 && operation.len() == result.len() + 2 =>
        {
            let resolved = ResourceAddress::root()
                .add(HOST, host)
                .add(SERVER, server)
                .append(&result);
            debug!(from = %result, to = %resolved, "Adjust result address");
            resolved
        }
        _ => result,
    }
}

#[derive(Default)]
struct RrdParser {
    result: RrdResult,
}

impl RrdParser {
    fn parse_response(&mut self, operation: &Operation, payload: &ModelNode) -> MetadataResult<()> {
        let recursive = operation
            .parameter(RECURSIVE_DEPTH)
            .is_some_and(|depth| depth.as_int_or(0) > 0);

        if let ModelValue::List(items) = payload.value() {
            // one element per resource matched by a wildcard
            for item in items {
                let Some(result) = item.child(RESULT).filter(|r| r.is_defined()) else {
                    continue;
                };
                let reported = match item.child(ADDRESS) {
                    Some(address) => ResourceAddress::try_from(address)?,
                    None => operation.address().clone(),
                };
                let address = make_fq_address(operation.address(), reported);
                self.parse(address, result, recursive)?;
            }
            Ok(())
        } else {
            self.parse(operation.address().clone(), payload, recursive)
        }
    }

    fn parse(&mut self, address: ResourceAddress, node: &ModelNode, recursive: bool) -> MetadataResult<()> {
        if node.has_defined(DESCRIPTION) {
            if let Entry::Vacant(entry) = self.result.descriptions.entry(address.clone()) {
                let mut flat = node.resolve();
                flat.remove(CHILDREN)?;
                entry.insert(ResourceDescription::new(flat, recursive));
            }
        }

        if let Some(access_control) = node.child(ACCESS_CONTROL).filter(|n| n.is_defined()) {
            if let Some(default) = access_control.child(DEFAULT).filter(|n| n.is_defined()) {
                self.result
                    .security_contexts
                    .entry(address.clone())
                    .or_insert_with(|| SecurityContext::new(default.clone(), recursive));
            }
            if let Some(exceptions) = access_control.child(EXCEPTIONS).filter(|n| n.is_defined()) {
                for exception in exceptions.as_property_list()? {
                    let value = exception.value();
                    let Some(exception_address) = value.child(ADDRESS).filter(|n| n.is_defined()) else {
                        continue;
                    };
                    let exception_address = ResourceAddress::try_from(exception_address)?;
                    self.result
                        .security_contexts
                        .entry(exception_address)
                        .or_insert_with(|| SecurityContext::new(value.clone(), false));
                }
            }
        }

        if let Some(children) = node.child(CHILDREN).filter(|n| n.is_defined()) {
            for child_type in children.as_property_list()? {
                let Some(descriptions) = child_type
                    .value()
                    .child(MODEL_DESCRIPTION)
                    .filter(|n| n.is_defined())
                else {
                    continue;
                };
                for child in descriptions.as_property_list()? {
                    let child_address = address.clone().add(child_type.name(), child.name());
                    self.parse(child_address, child.value(), false)?;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use halos_dmr::Composite;
    use halos_dmr::constants::{READ, READ_RESOURCE_DESCRIPTION_OPERATION, WRITE};
    use halos_dmr::operation::step_key;
    use pretty_assertions::assert_eq;

    fn rrd(address: &str, recursive: bool) -> Operation {
        let builder = Operation::builder(ResourceAddress::parse(address), READ_RESOURCE_DESCRIPTION_OPERATION);
        if recursive {
            builder.param(RECURSIVE_DEPTH, 3).build()
        } else {
            builder.build()
        }
    }

    fn description(text: &str) -> ModelNode {
        let mut node = ModelNode::new();
        node.get(DESCRIPTION).unwrap().set(text).unwrap();
        node.get(ACCESS_CONTROL)
            .unwrap()
            .get(DEFAULT)
            .unwrap()
            .get(READ)
            .unwrap()
            .set(true)
            .unwrap();
        node
    }

    #[test]
    fn test_single_with_children() {
        let mut io = description("IO subsystem");
        let worker = io
            .get(CHILDREN)
            .unwrap()
            .get("worker")
            .unwrap()
            .get(MODEL_DESCRIPTION)
            .unwrap()
            .get("*")
            .unwrap();
        worker.set(description("IO worker")).unwrap();

        let result = parse_single(&rrd("/subsystem=io", true), &io).unwrap();
        let io_address = ResourceAddress::parse("/subsystem=io");
        let worker_address = ResourceAddress::parse("/subsystem=io/worker=*");

        let io_description = &result.descriptions()[&io_address];
        assert!(io_description.is_recursive());
        assert!(!io_description.node().has(CHILDREN));
        assert!(!result.descriptions()[&worker_address].is_recursive());
        assert_eq!(result.descriptions()[&worker_address].description(), Some("IO worker"));
        assert!(result.security_contexts()[&io_address].is_recursive());
        assert!(!result.security_contexts()[&worker_address].is_recursive());
    }

    #[test]
    fn test_exceptions() {
        let mut node = description("Deployment");
        let exception = node
            .get(ACCESS_CONTROL)
            .unwrap()
            .get(EXCEPTIONS)
            .unwrap()
            .get("[(\"deployment\" => \"secret.war\")]")
            .unwrap();
        exception
            .get(ADDRESS)
            .unwrap()
            .set(ResourceAddress::parse("/deployment=secret.war").to_model_node())
            .unwrap();
        exception.get(READ).unwrap().set(false).unwrap();
        exception.get(WRITE).unwrap().set(false).unwrap();

        let result = parse_single(&rrd("/deployment=*", false), &node).unwrap();
        let secret = &result.security_contexts()[&ResourceAddress::parse("/deployment=secret.war")];
        assert!(!secret.is_readable());
        assert!(!secret.is_recursive());
        assert!(result.security_contexts()[&ResourceAddress::parse("/deployment=*")].is_readable());
    }

    #[test]
    fn test_list_result_with_fq_reconciliation() {
        let mut payload = ModelNode::new();
        let item = payload.add_empty().unwrap();
        item.get(ADDRESS)
            .unwrap()
            .set(ResourceAddress::parse("/interface=public").to_model_node())
            .unwrap();
        item.get(RESULT).unwrap().set(description("Interface")).unwrap();
        // skipped: undefined result
        payload.add_empty().unwrap().get(ADDRESS).unwrap();

        let operation = rrd("/host=master/server=one/interface=*", false);
        let result = parse_single(&operation, &payload).unwrap();
        let keys: Vec<String> = result.descriptions().keys().map(ToString::to_string).collect();
        assert_eq!(keys, vec!["/host=master/server=one/interface=public"]);
    }

    #[test]
    fn test_make_fq_address() {
        let operation = ResourceAddress::parse("/host=master/server=one/interface=*");
        assert_eq!(
            make_fq_address(&operation, ResourceAddress::parse("/interface=public")).to_string(),
            "/host=master/server=one/interface=public"
        );
        let worker = ResourceAddress::parse("/host=master/server=server-one/subsystem=io/worker=*");
        assert_eq!(
            make_fq_address(&worker, ResourceAddress::parse("/subsystem=io/worker=default")).to_string(),
            "/host=master/server=server-one/subsystem=io/worker=default"
        );
        // lengths do not match
        let full = ResourceAddress::parse("/host=master/server=one/interface=public");
        assert_eq!(make_fq_address(&operation, full.clone()), full);
        // not host and server
        let profile = ResourceAddress::parse("/profile=full/subsystem=io/worker=*");
        let relative = ResourceAddress::parse("/worker=default");
        assert_eq!(make_fq_address(&profile, relative.clone()), relative);
    }

    #[test]
    fn test_composite_recursive_flag_per_step() {
        let composite = Composite::new(vec![rrd("/subsystem=io", true), rrd("/subsystem=mail", false)]);
        let mut steps = ModelNode::new();
        steps.get(&step_key(0)).unwrap().set(response::success(description("IO"))).unwrap();
        steps.get(&step_key(1)).unwrap().set(response::success(description("Mail"))).unwrap();

        let result = parse_composite(&CompositeResult::new(composite, steps)).unwrap();
        assert!(result.descriptions()[&ResourceAddress::parse("/subsystem=io")].is_recursive());
        assert!(!result.descriptions()[&ResourceAddress::parse("/subsystem=mail")].is_recursive());
    }

    #[test]
    fn test_composite_failed_step() {
        let composite = Composite::new(vec![rrd("/subsystem=io", false), rrd("/subsystem=nope", false)]);
        let mut steps = ModelNode::new();
        steps.get(&step_key(0)).unwrap().set(response::success(description("IO"))).unwrap();
        steps
            .get(&step_key(1))
            .unwrap()
            .set(response::failed("WFLYCTL0030: No resource definition is registered"))
            .unwrap();

        let err = parse_composite(&CompositeResult::new(composite, steps)).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Failed step 'step-2' in composite rrd result: WFLYCTL0030: No resource definition is registered"
        );
    }
}
