//! The axum router driven with `tower::ServiceExt::oneshot`

use std::sync::Arc;

use async_trait::async_trait;
use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use halos_dmr::{CONTENT_TYPE, ModelNode, Operation, ResourceAddress, response};
use halos_proxy::server::router;
use halos_proxy::{ConnectionFactory, Instance, InstanceDispatcher, InstanceInfo, ManagementConnection, ProxyError, ProxyResult};
use pretty_assertions::assert_eq;
use tower::ServiceExt;

struct NamedConnection(String);

#[async_trait]
impl ManagementConnection for NamedConnection {
    async fn execute(&self, operation: &Operation) -> ProxyResult<ModelNode> {
        if self.0 == "broken" {
            return Err(ProxyError::connection(&self.0, "Connection refused"));
        }
        Ok(response::success(ModelNode::from(format!("{}:{}", self.0, operation.name()))))
    }

    async fn close(&self) -> ProxyResult<()> {
        Ok(())
    }
}

struct NamedFactory;

#[async_trait]
impl ConnectionFactory for NamedFactory {
    async fn connect(&self, instance: &Instance) -> ProxyResult<Arc<dyn ManagementConnection>> {
        if instance.host == "n/a" {
            return Err(ProxyError::connection(instance, "failed to lookup address information"));
        }
        Ok(Arc::new(NamedConnection(instance.name.clone())))
    }
}

fn app() -> (Router, Arc<InstanceDispatcher>) {
    let dispatcher = Arc::new(InstanceDispatcher::new(Arc::new(NamedFactory)));
    (router(Arc::clone(&dispatcher)), dispatcher)
}

fn register_request(name: &str, host: &str) -> Request<Body> {
    let body = serde_json::json!({
        "name": name,
        "host": host,
        "port": 9990,
        "username": "admin",
        "password": "admin-secret"
    });
    Request::builder()
        .method("POST")
        .uri("/v1/instance")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn operation_request(uri: &str, body: impl Into<Body>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, CONTENT_TYPE)
        .body(body.into())
        .unwrap()
}

fn encoded_whoami() -> String {
    Operation::builder(ResourceAddress::root(), "whoami")
        .build()
        .to_model_node()
        .to_base64()
        .unwrap()
}

async fn body_text(response: axum::response::Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn register_created_then_not_modified() {
    let (app, dispatcher) = app();

    let response = app.clone().oneshot(register_request("wf0", "localhost")).await.unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = body_text(response).await;
    assert!(!body.contains("admin-secret"));
    let info: InstanceInfo = serde_json::from_str(&body).unwrap();
    assert_eq!(info.name, "wf0");

    let response = app.oneshot(register_request("wf0", "localhost")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_MODIFIED);
    assert_eq!(dispatcher.len(), 1);
}

#[tokio::test]
async fn register_unknown_host_is_a_server_error() {
    let (app, dispatcher) = app();
    let response = app.oneshot(register_request("wf9", "n/a")).await.unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_text(response).await;
    assert_eq!(body, "Unable to connect to instance wf9@n/a:9990");
    assert!(!body.contains("lookup"));
    assert!(dispatcher.is_empty());
}

#[tokio::test]
async fn register_rejects_unusable_names() {
    let (app, dispatcher) = app();
    for name in ["wf\n0", "wf\r0", "wf/0", ""] {
        let response = app.clone().oneshot(register_request(name, "localhost")).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{name:?}");
        assert!(body_text(response).await.starts_with("Invalid instance: "));
    }
    assert!(dispatcher.is_empty());
}

#[tokio::test]
async fn list_instances_without_passwords() {
    let (app, _) = app();
    app.clone().oneshot(register_request("wf1", "localhost")).await.unwrap();
    app.clone().oneshot(register_request("wf0", "localhost")).await.unwrap();

    let response = app
        .oneshot(Request::builder().uri("/v1/instance").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_text(response).await;
    assert!(!body.contains("password"));
    let infos: Vec<InstanceInfo> = serde_json::from_str(&body).unwrap();
    let names: Vec<&str> = infos.iter().map(|i| i.name.as_str()).collect();
    assert_eq!(names, vec!["wf0", "wf1"]);
}

#[tokio::test]
async fn unregister_known_and_unknown() {
    let (app, dispatcher) = app();
    app.clone().oneshot(register_request("wf0", "localhost")).await.unwrap();

    let delete = |name: &str| {
        Request::builder()
            .method("DELETE")
            .uri(format!("/v1/instance/{name}"))
            .body(Body::empty())
            .unwrap()
    };
    let response = app.clone().oneshot(delete("wf0")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert!(dispatcher.is_empty());

    let response = app.oneshot(delete("wf0")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_text(response).await, "No instance found for 'wf0'");
}

#[tokio::test]
async fn execute_single_returns_encoded_response() {
    let (app, _) = app();
    app.clone().oneshot(register_request("wf0", "localhost")).await.unwrap();

    let response = app
        .oneshot(operation_request("/v1/management/wf0", encoded_whoami()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], CONTENT_TYPE);

    let node = ModelNode::from_base64(&body_text(response).await).unwrap();
    let wf0 = node.child("wf0").unwrap();
    assert!(response::is_success(wf0));
    assert_eq!(response::result(wf0).as_str(), Some("wf0:whoami"));
}

#[tokio::test]
async fn execute_single_unknown_instance_is_not_found() {
    let (app, _) = app();
    let response = app
        .oneshot(operation_request("/v1/management/wf9", encoded_whoami()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_text(response).await, "Instance wf9 not found");
}

#[tokio::test]
async fn undecodable_operation_is_a_bad_request() {
    let (app, _) = app();
    app.clone().oneshot(register_request("wf0", "localhost")).await.unwrap();

    let response = app
        .clone()
        .oneshot(operation_request("/v1/management/wf0", "this is not dmr"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .oneshot(operation_request("/v1/management", "this is not dmr"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn broadcast_streams_one_event_per_instance() {
    let (app, _) = app();
    for name in ["wf0", "broken"] {
        app.clone().oneshot(register_request(name, "localhost")).await.unwrap();
    }

    let response = app
        .oneshot(operation_request("/v1/management", encoded_whoami()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(
        response.headers()[header::CONTENT_TYPE]
            .to_str()
            .unwrap()
            .starts_with("text/event-stream")
    );

    let body = body_text(response).await;
    assert!(!body.contains("event:"));
    let mut events: Vec<(String, ModelNode)> = body
        .split("\n\n")
        .filter_map(|chunk| chunk.lines().find_map(|line| line.strip_prefix("data:")))
        .map(|data| {
            let payload = ModelNode::from_base64(data.trim()).unwrap();
            let name = payload.keys().unwrap()[0].to_string();
            (name, payload)
        })
        .collect();
    events.sort_by(|a, b| a.0.cmp(&b.0));

    assert_eq!(events.len(), 2);
    let (name, payload) = &events[0];
    assert_eq!(name, "broken");
    assert!(response::is_failure(payload.child("broken").unwrap()));
    let (name, payload) = &events[1];
    assert_eq!(name, "wf0");
    assert_eq!(response::result(payload.child("wf0").unwrap()).as_str(), Some("wf0:whoami"));
}
