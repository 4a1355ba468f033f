//! Helpers for management responses (`{outcome, result, failure-description}`)

use crate::constants::{FAILED, FAILURE_DESCRIPTION, OUTCOME, RESULT, SUCCESS};
use crate::model::ModelNode;

/// `true` if the response reports `outcome => "success"`
pub fn is_success(response: &ModelNode) -> bool {
    response.child(OUTCOME).and_then(ModelNode::as_str) == Some(SUCCESS)
}

/// `true` if the response reports `outcome => "failed"`
pub fn is_failure(response: &ModelNode) -> bool {
    response.child(OUTCOME).and_then(ModelNode::as_str) == Some(FAILED)
}

/// The failure description, rendered as text. Structured descriptions are
/// rendered in compact DMR form.
pub fn failure_description(response: &ModelNode) -> String {
    match response.child(FAILURE_DESCRIPTION) {
        Some(description) if description.is_defined() => description
            .as_string()
            .unwrap_or_else(|_| description.to_compact_string()),
        _ => "No failure description".to_string(),
    }
}

/// The `result` of a response, undefined if absent
pub fn result(response: &ModelNode) -> ModelNode {
    response.child(RESULT).cloned().unwrap_or_default()
}

/// A synthetic failed response `{outcome => "failed", failure-description => message}`
pub fn failed(message: impl Into<String>) -> ModelNode {
    [
        (OUTCOME.to_string(), ModelNode::from(FAILED)),
        (FAILURE_DESCRIPTION.to_string(), ModelNode::from(message.into())),
    ]
    .into_iter()
    .collect()
}

/// A successful response wrapping `result`
pub fn success(result: ModelNode) -> ModelNode {
    [
        (OUTCOME.to_string(), ModelNode::from(SUCCESS)),
        (RESULT.to_string(), result),
    ]
    .into_iter()
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failed_payload() {
        let response = failed("Connection refused");
        assert!(is_failure(&response));
        assert!(!is_success(&response));
        assert_eq!(failure_description(&response), "Connection refused");
        assert_eq!(response.keys().unwrap(), vec![OUTCOME, FAILURE_DESCRIPTION]);
    }

    #[test]
    fn test_success_payload() {
        let response = success(ModelNode::from(42));
        assert!(is_success(&response));
        assert_eq!(result(&response).as_int().unwrap(), 42);
        assert!(!result(&ModelNode::new()).is_defined());
    }

    #[test]
    fn test_structured_failure_description() {
        let mut structured = ModelNode::new();
        structured.get(OUTCOME).unwrap().set(FAILED).unwrap();
        structured
            .get(FAILURE_DESCRIPTION)
            .unwrap()
            .get("host-failure-descriptions")
            .unwrap()
            .set("boom")
            .unwrap();
        assert_eq!(
            failure_description(&structured),
            "{\"host-failure-descriptions\" => \"boom\"}"
        );
    }
}
