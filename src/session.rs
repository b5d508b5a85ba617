//! Call-in points for the wire-level protocol engine
//!
//! The engine frames and transports messages; when a session produces a
//! status report or goes away, it drives the registry through these entry
//! points. A session's inbound stream is processed sequentially by the
//! engine, which totally orders operations on that connection's agents.

use std::sync::Arc;

use tracing::debug;

use crate::agent::{Agent, InstanceId};
use crate::protocol::StatusReport;
use crate::registry::{AgentStore, InMemoryStore};
use crate::transport::Connection;

/// Store specialization used by the shipped session layer
pub type AgentRegistry = InMemoryStore<InstanceId, Agent>;

/// Registry shared between session tasks and the admin surface
pub type SharedAgentRegistry = Arc<AgentRegistry>;

/// Create a registry that builds [`Agent`] instances on first contact
pub fn new_registry() -> SharedAgentRegistry {
    Arc::new(InMemoryStore::new(Agent::connect))
}

/// Absorb one status report arriving on `conn` for `instance_id`
///
/// First contact for an identity registers it on the connection; subsequent
/// reports update the existing instance in place. Processing also releases
/// any caller waiting on config acknowledgment for this agent.
pub fn handle_status_report(
    registry: &AgentRegistry,
    conn: &Connection,
    instance_id: InstanceId,
    report: StatusReport,
) {
    let agent = registry.find_or_create_agent(instance_id, conn);
    agent.lock().process_status_report(report);
    debug!(instance = %instance_id, connection = %conn.id(), "Status report processed");
}

/// Drop every agent associated with a closed session
pub fn handle_disconnect(registry: &AgentRegistry, conn: &Connection) {
    registry.remove_connection(conn);
}
