//! HTTP surface of the proxy
//!
//! ```text
//! POST   /v1/instance            register an instance (JSON)
//! GET    /v1/instance            list registered instances
//! DELETE /v1/instance/{name}     unregister an instance
//! POST   /v1/management          broadcast a base64 operation, answer with SSE
//!                                 (one event per instance, data is base64 of
//!                                 `{name => response}`)
//! POST   /v1/management/{name}   execute a base64 operation on one instance
//! ```

use std::convert::Infallible;
use std::future::Future;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{StatusCode, header};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, post};
use axum::{Json, Router};
use futures::{Stream, StreamExt, future};
use halos_dmr::{CONTENT_TYPE, ModelNode, Operation};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

use crate::dispatcher::{InstanceDispatcher, Registration};
use crate::error::{ProxyError, ProxyResult};
use crate::instance::{Instance, InstanceInfo};

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        (self.status_code(), self.sanitize()).into_response()
    }
}

/// Router serving the proxy endpoints
pub fn router(dispatcher: Arc<InstanceDispatcher>) -> Router {
    Router::new()
        .route("/v1/instance", post(register).get(instances))
        .route("/v1/instance/{name}", delete(unregister))
        .route("/v1/management", post(execute))
        .route("/v1/management/{name}", post(execute_single))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(dispatcher)
}

/// Serve the router on `listener` until `shutdown` completes
///
/// # Errors
///
/// Returns [`ProxyError::Io`] if the server fails.
pub async fn serve<F>(listener: TcpListener, dispatcher: Arc<InstanceDispatcher>, shutdown: F) -> ProxyResult<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    if let Ok(address) = listener.local_addr() {
        info!("Proxy listening on http://{address}");
    }
    axum::serve(listener, router(dispatcher))
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

async fn register(State(dispatcher): State<Arc<InstanceDispatcher>>, Json(instance): Json<Instance>) -> Response {
    let info = instance.info();
    match dispatcher.register(instance).await {
        Ok(Registration::Created) => (StatusCode::CREATED, Json(info)).into_response(),
        Ok(Registration::AlreadyRegistered) => StatusCode::NOT_MODIFIED.into_response(),
        Err(e) => e.into_response(),
    }
}

async fn instances(State(dispatcher): State<Arc<InstanceDispatcher>>) -> Json<Vec<InstanceInfo>> {
    Json(dispatcher.instances().iter().map(|i| i.info()).collect())
}

async fn unregister(State(dispatcher): State<Arc<InstanceDispatcher>>, Path(name): Path<String>) -> Response {
    match dispatcher.unregister(&name).await {
        Ok(true) => StatusCode::NO_CONTENT.into_response(),
        Ok(false) => (StatusCode::NOT_FOUND, format!("No instance found for '{name}'")).into_response(),
        Err(e) => e.into_response(),
    }
}

async fn execute(
    State(dispatcher): State<Arc<InstanceDispatcher>>,
    body: String,
) -> ProxyResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    let operation = decode(&body)?;
    debug!(operation = %operation.as_cli(), instances = dispatcher.len(), "Broadcasting operation");

    let events = dispatcher.execute_stream(operation).filter_map(|(name, response)| {
        let payload: ModelNode = std::iter::once((name.clone(), response)).collect();
        let event = match payload.to_base64() {
            Ok(data) => Some(Ok(Event::default().data(data))),
            Err(e) => {
                warn!(instance = %name, error = %e, "Unable to encode response");
                None
            }
        };
        future::ready(event)
    });
    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}

async fn execute_single(
    State(dispatcher): State<Arc<InstanceDispatcher>>,
    Path(name): Path<String>,
    body: String,
) -> ProxyResult<Response> {
    let operation = decode(&body)?;
    let result = dispatcher.execute_single(&name, &operation).await?;
    Ok(([(header::CONTENT_TYPE, CONTENT_TYPE)], result.to_base64()?).into_response())
}

fn decode(body: &str) -> ProxyResult<Operation> {
    let node = ModelNode::from_base64(body.trim())?;
    Ok(Operation::try_from(&node)?)
}
