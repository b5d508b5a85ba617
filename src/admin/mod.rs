//! Administrative HTTP API
//!
//! Lets an operator push a custom config to one agent and read registry
//! snapshots. The config push waits, bounded, for the agent's next status
//! report before responding; an expired wait is reported the same as an
//! acknowledged one (201 Created), since the push may still land later.
//!
//! Binding the router to a listener is the embedder's job, along with the
//! rest of process bootstrapping.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Deserializer};
use thiserror::Error;
use tracing::info;

use crate::agent::{AgentSnapshot, InstanceId};
use crate::protocol::AgentConfigMap;
use crate::push::push_custom_config;
use crate::registry::AgentStore;
use crate::session::SharedAgentRegistry;
use crate::{DEFAULT_ACK_TIMEOUT, DEFAULT_ADMIN_PORT};

/// Admin surface configuration
#[derive(Debug, Clone)]
pub struct AdminConfig {
    /// Address the embedder should bind the admin router on
    pub bind_addr: SocketAddr,
    /// Bounded wait applied to config pushes
    pub ack_timeout: Duration,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            bind_addr: std::env::var("DROVER_ADMIN_ADDR")
                .ok()
                .and_then(|addr| addr.parse().ok())
                .unwrap_or_else(|| SocketAddr::from(([127, 0, 0, 1], DEFAULT_ADMIN_PORT))),
            ack_timeout: DEFAULT_ACK_TIMEOUT,
        }
    }
}

/// Shared state for admin handlers
pub struct AdminState {
    /// Registry the handlers read and push through
    pub registry: SharedAgentRegistry,
    /// Bounded wait applied to config pushes
    pub ack_timeout: Duration,
}

impl AdminState {
    /// State over `registry` with the default acknowledgment wait
    pub fn new(registry: SharedAgentRegistry) -> Self {
        Self {
            registry,
            ack_timeout: DEFAULT_ACK_TIMEOUT,
        }
    }

    /// Override the acknowledgment wait
    pub fn with_ack_timeout(mut self, ack_timeout: Duration) -> Self {
        self.ack_timeout = ack_timeout;
        self
    }
}

/// Admin endpoint errors
#[derive(Debug, Error)]
pub enum AdminError {
    /// Request carried no instance id
    #[error("empty instance_id")]
    EmptyInstanceId,

    /// Instance id did not parse as a UUID
    #[error("error parsing instance_id")]
    BadInstanceId,

    /// Request carried no config body
    #[error("empty body")]
    EmptyBody,

    /// No agent known under the given identity
    #[error("cannot find agent by instance_id")]
    AgentNotFound,
}

impl IntoResponse for AdminError {
    fn into_response(self) -> Response {
        let status = match self {
            AdminError::EmptyInstanceId | AdminError::BadInstanceId | AdminError::EmptyBody => {
                StatusCode::BAD_REQUEST
            }
            AdminError::AgentNotFound => StatusCode::NOT_FOUND,
        };

        (status, Json(serde_json::json!({"error": self.to_string()}))).into_response()
    }
}

/// Request to stage a custom config for one agent
#[derive(Debug, Clone, Deserialize)]
pub struct SetConfigRequest {
    /// Target agent identity (UUID string)
    pub instance_id: String,
    /// Opaque config body, base64-encoded in transit
    #[serde(default, deserialize_with = "base64_body")]
    pub body: Vec<u8>,
    /// Content type label for the body
    #[serde(default)]
    pub content_type: String,
}

fn base64_body<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
where
    D: Deserializer<'de>,
{
    let encoded = String::deserialize(deserializer)?;
    BASE64
        .decode(encoded.as_bytes())
        .map_err(serde::de::Error::custom)
}

/// Build the admin router
///
/// Routes:
/// - `POST /api/agents/config`: stage a custom config, wait bounded for
///   acknowledgment
/// - `GET /api/agents`: read-only snapshot of every agent
/// - `GET /api/agents/{instance_id}`: read-only snapshot of one agent
pub fn admin_router(state: Arc<AdminState>) -> Router {
    Router::new()
        .route("/api/agents", get(list_agents_handler))
        .route("/api/agents/config", post(set_config_handler))
        .route("/api/agents/{instance_id}", get(get_agent_handler))
        .with_state(state)
}

async fn list_agents_handler(
    State(state): State<Arc<AdminState>>,
) -> Json<HashMap<InstanceId, AgentSnapshot>> {
    Json(state.registry.all_agents_readonly_clone())
}

async fn get_agent_handler(
    State(state): State<Arc<AdminState>>,
    Path(instance_id): Path<String>,
) -> Result<Json<AgentSnapshot>, AdminError> {
    let id: InstanceId = instance_id
        .parse()
        .map_err(|_| AdminError::BadInstanceId)?;
    state
        .registry
        .agent_readonly_clone(&id)
        .map(Json)
        .ok_or(AdminError::AgentNotFound)
}

async fn set_config_handler(
    State(state): State<Arc<AdminState>>,
    Json(request): Json<SetConfigRequest>,
) -> Result<StatusCode, AdminError> {
    if request.instance_id.is_empty() {
        return Err(AdminError::EmptyInstanceId);
    }
    if request.body.is_empty() {
        return Err(AdminError::EmptyBody);
    }
    let id: InstanceId = request
        .instance_id
        .parse()
        .map_err(|_| AdminError::BadInstanceId)?;

    // Unknown identities are rejected here; past this point absence is
    // absorbed by the registry and only shows up as an expired wait.
    if state.registry.agent_readonly_clone(&id).is_none() {
        return Err(AdminError::AgentNotFound);
    }

    let config = AgentConfigMap::single(request.body, request.content_type);
    let outcome =
        push_custom_config(state.registry.as_ref(), &id, config, state.ack_timeout).await;
    info!(instance = %id, ?outcome, "Custom config staged");

    Ok(StatusCode::CREATED)
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use axum::body::Body;
    use axum::http::Request;
    use base64::Engine as _;
    use tower::ServiceExt;

    use super::*;
    use crate::protocol::StatusReport;
    use crate::session::{handle_status_report, new_registry};
    use crate::transport::Connection;
    use crate::DEFAULT_COMMAND_CAPACITY;

    fn test_state(ack_timeout: Duration) -> (Arc<AdminState>, SharedAgentRegistry) {
        let registry = new_registry();
        let state = Arc::new(AdminState::new(registry.clone()).with_ack_timeout(ack_timeout));
        (state, registry)
    }

    fn register_test_agent(registry: &SharedAgentRegistry) -> (InstanceId, Connection) {
        let (conn, rx) = Connection::channel(DEFAULT_COMMAND_CAPACITY);
        // Engine end outlives the test via a drain task so pushes never
        // observe a closed channel.
        tokio::spawn(async move {
            let mut rx = rx;
            while rx.recv().await.is_some() {}
        });
        let id = InstanceId::random();
        handle_status_report(registry, &conn, id, StatusReport::default());
        (id, conn)
    }

    fn set_config_request(instance_id: &str, body: &[u8]) -> Request<Body> {
        let payload = serde_json::json!({
            "instance_id": instance_id,
            "body": BASE64.encode(body),
            "content_type": "",
        });
        Request::builder()
            .method("POST")
            .uri("/api/agents/config")
            .header("content-type", "application/json")
            .body(Body::from(payload.to_string()))
            .unwrap()
    }

    /// Integration test: config push acknowledged by a later status report
    ///
    /// The admin wait must unblock when the agent's report arrives, well
    /// before the acknowledgment timeout, and still answer 201.
    #[tokio::test]
    async fn integration_set_config_unblocks_on_status_report() {
        let (state, registry) = test_state(Duration::from_secs(5));
        let (id, conn) = register_test_agent(&registry);

        let reporter = {
            let registry = registry.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(100)).await;
                handle_status_report(&registry, &conn, id, StatusReport::default());
            })
        };

        let router = admin_router(state);
        let started = Instant::now();
        let response = router
            .oneshot(set_config_request(&id.to_string(), b"FooBar"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::CREATED);
        assert!(
            started.elapsed() < Duration::from_secs(2),
            "wait must end on the report, not the timeout"
        );
        reporter.await.unwrap();

        // The staged config is visible in the agent's snapshot
        let snapshot = registry.agent_readonly_clone(&id).unwrap();
        let staged = snapshot.custom_config.unwrap();
        assert_eq!(staged.config_map[""].body, b"FooBar");
    }

    /// Integration test: no status report before the timeout still answers 201
    #[tokio::test]
    async fn integration_set_config_timeout_still_created() {
        let (state, registry) = test_state(Duration::from_millis(200));
        let (id, _conn) = register_test_agent(&registry);

        let router = admin_router(state);
        let started = Instant::now();
        let response = router
            .oneshot(set_config_request(&id.to_string(), b"FooBar"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::CREATED);
        assert!(started.elapsed() >= Duration::from_millis(200));
    }

    /// Integration test: empty instance id is rejected before any wait
    #[tokio::test]
    async fn integration_set_config_empty_instance_id() {
        let (state, _registry) = test_state(Duration::from_secs(5));
        let router = admin_router(state);

        let started = Instant::now();
        let response = router
            .oneshot(set_config_request("", b"FooBar"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    /// Integration test: malformed instance id is rejected
    #[tokio::test]
    async fn integration_set_config_unparsable_instance_id() {
        let (state, _registry) = test_state(Duration::from_secs(5));
        let router = admin_router(state);

        let response = router
            .oneshot(set_config_request("not-a-uuid", b"FooBar"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    /// Integration test: empty body is rejected
    #[tokio::test]
    async fn integration_set_config_empty_body() {
        let (state, registry) = test_state(Duration::from_secs(5));
        let (id, _conn) = register_test_agent(&registry);
        let router = admin_router(state);

        let response = router
            .oneshot(set_config_request(&id.to_string(), b""))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    /// Integration test: well-formed but never-registered id answers 404
    #[tokio::test]
    async fn integration_set_config_unknown_instance_id() {
        let (state, _registry) = test_state(Duration::from_secs(5));
        let router = admin_router(state);

        let started = Instant::now();
        let response = router
            .oneshot(set_config_request(&InstanceId::random().to_string(), b"FooBar"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(
            started.elapsed() < Duration::from_secs(1),
            "rejected without entering the bounded wait"
        );
    }

    /// Integration test: the config endpoint only accepts POST
    #[tokio::test]
    async fn integration_set_config_method_restricted() {
        let (state, _registry) = test_state(Duration::from_secs(5));
        let router = admin_router(state);

        let request = Request::builder()
            .method("PUT")
            .uri("/api/agents/config")
            .header("content-type", "application/json")
            .body(Body::from("{}"))
            .unwrap();
        let response = router.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    /// Integration test: agent listing returns every snapshot
    #[tokio::test]
    async fn integration_list_agents() {
        let (state, registry) = test_state(Duration::from_secs(5));
        let (first, _c1) = register_test_agent(&registry);
        let (second, _c2) = register_test_agent(&registry);

        let router = admin_router(state);
        let request = Request::builder()
            .method("GET")
            .uri("/api/agents")
            .body(Body::empty())
            .unwrap();
        let response = router.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), 1024 * 1024)
            .await
            .unwrap();
        let agents: serde_json::Value = serde_json::from_slice(&body).unwrap();
        let agents = agents.as_object().unwrap();
        assert_eq!(agents.len(), 2);
        assert!(agents.contains_key(&first.to_string()));
        assert!(agents.contains_key(&second.to_string()));
    }

    /// Integration test: single-agent snapshot endpoint
    #[tokio::test]
    async fn integration_get_agent() {
        let (state, registry) = test_state(Duration::from_secs(5));
        let (id, _conn) = register_test_agent(&registry);
        let router = admin_router(state);

        let request = Request::builder()
            .method("GET")
            .uri(format!("/api/agents/{}", id))
            .body(Body::empty())
            .unwrap();
        let response = router.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), 1024 * 1024)
            .await
            .unwrap();
        let snapshot: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(snapshot["instance_id"], id.to_string());

        // Unknown identity
        let request = Request::builder()
            .method("GET")
            .uri(format!("/api/agents/{}", InstanceId::random()))
            .body(Body::empty())
            .unwrap();
        let response = router.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        // Malformed identity
        let request = Request::builder()
            .method("GET")
            .uri("/api/agents/not-a-uuid")
            .body(Body::empty())
            .unwrap();
        let response = router.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_admin_config_defaults() {
        let config = AdminConfig::default();
        assert_eq!(config.bind_addr.port(), DEFAULT_ADMIN_PORT);
        assert_eq!(config.ack_timeout, DEFAULT_ACK_TIMEOUT);
    }
}
