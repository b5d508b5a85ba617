//! Drover: server-side registry for remotely-managed agents
//!
//! Drover tracks agents connected over a management protocol and lets an
//! administrative caller push a configuration change to a specific agent,
//! then wait, bounded by a timeout, for proof of delivery via the agent's
//! next status report.
//!
//! The wire-level protocol engine that frames and transports messages is an
//! external collaborator: it creates [`transport::Connection`] handles as
//! sessions are established, drives the registry through the entry points in
//! [`session`], and drains each connection's outbound command channel. The
//! registry itself is in-memory and process-lifetime only.

#![deny(missing_docs)]

/// Administrative HTTP API (config push with bounded acknowledgment wait)
pub mod admin;
/// Concrete managed-agent instance and its read-only snapshot
pub mod agent;
/// Wire-facing value types exchanged with managed agents
pub mod protocol;
/// Config-delivery synchronizer (request/acknowledge with bounded wait)
pub mod push;
/// Agent capability contracts and the generic in-memory store
pub mod registry;
/// Call-in points for the wire-level protocol engine
pub mod session;
/// Connection handles binding agents to live transport sessions
pub mod transport;

pub use session::{new_registry, AgentRegistry, SharedAgentRegistry};

use std::time::Duration;

/// Bounded wait for a config acknowledgment via the agent's next status report
pub const DEFAULT_ACK_TIMEOUT: Duration = Duration::from_secs(5);

/// Capacity of a connection's outbound command channel
pub const DEFAULT_COMMAND_CAPACITY: usize = 32;

/// Default port for the administrative HTTP API
pub const DEFAULT_ADMIN_PORT: u16 = 4321;
