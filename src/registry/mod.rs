//! Agent capability contracts and the store that tracks managed agents
//!
//! Capabilities are modeled as independently-testable contract fragments
//! rather than one monolithic agent interface: every managed agent
//! implements [`AgentCore`], while custom-config delivery and offer hashing
//! are opt-in. A store operates correctly against agents that only satisfy
//! the base contract.

mod memory;

pub use memory::InMemoryStore;

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::oneshot;

use crate::protocol::{AgentConfigMap, ConnectionSettingsOffers};
use crate::transport::Connection;

/// Single-use acknowledgment signal handed to [`CustomConfig::set_custom_config`]
///
/// Written at most once, by whichever flow processes the agent's next status
/// report; read at most once by the waiting caller. Dropping the receiver
/// abandons the wait without leaking the sender.
pub type StatusNotifier = oneshot::Sender<()>;

/// A live agent instance behind its own lock
///
/// Instances carry finer-grained exclusion than the store's maps so that a
/// status-report-triggered notify cannot race a concurrent config push.
pub type SharedAgent<A> = Arc<Mutex<A>>;

/// Base contract every managed agent instance implements
pub trait AgentCore: Send + 'static {
    /// Immutable point-in-time copy of the agent's externally visible state
    type Snapshot: Clone + Send + 'static;

    /// Deliver a connection-settings offer to the agent
    ///
    /// Fire-and-forget from the store's perspective; the effect (e.g.,
    /// scheduling a TLS certificate rotation) is implementation-defined.
    fn offer_connection_settings(&mut self, offers: ConnectionSettingsOffers);

    /// Produce a read-only clone safe to share outside the store's locking
    fn readonly_clone(&self) -> Self::Snapshot;

    /// Expose the custom-config capability, when this agent supports it
    ///
    /// The default declines. Stores treat a declined capability the same as
    /// an unknown identity for notification purposes.
    fn custom_config(&mut self) -> Option<&mut dyn CustomConfig> {
        None
    }
}

/// Optional capability: accept a custom configuration with delivery notification
pub trait CustomConfig {
    /// Stage `config` as the agent's desired configuration
    ///
    /// Last write wins. When `notify` is given, it is signaled exactly once
    /// when the agent's next status report is processed. Must not block;
    /// delivery confirmation is asynchronous.
    fn set_custom_config(&mut self, config: AgentConfigMap, notify: Option<StatusNotifier>);
}

/// Optional capability: stabilize offer hashes before offers are sent
///
/// A store whose agents never need recognizable repeat offers may simply not
/// implement this.
pub trait OfferHashing {
    /// Compute a stable content hash on `offers` in place
    ///
    /// Idempotent: two calls over identical content yield identical hashes.
    fn ensure_offers_hash(&self, offers: &mut ConnectionSettingsOffers);
}

/// Store contract for managing agents and their connections
///
/// Generic over the application-chosen identity (anything usable as a map
/// key) and agent type. Operations are local and prompt: none blocks on
/// network I/O, none retries, and absence of a target is a normal,
/// silently-handled outcome rather than an error.
pub trait AgentStore: Send + Sync {
    /// Identity naming one logical agent across reconnects
    type Id: Clone + Eq + Hash + Send;
    /// Concrete agent type held by this store
    type Agent: AgentCore;

    /// Remove `conn`'s association and every agent instance on it
    ///
    /// Identities multiplexed over the connection are removed together.
    /// Removing an untracked connection is a no-op.
    fn remove_connection(&self, conn: &Connection);

    /// Look up the live agent for `id` without mutating anything
    fn find_agent(&self, id: &Self::Id) -> Option<SharedAgent<Self::Agent>>;

    /// Return the existing agent for `id` or atomically create one on `conn`
    ///
    /// Never creates two instances for the same identity, also under
    /// concurrent calls.
    fn find_or_create_agent(&self, id: Self::Id, conn: &Connection) -> SharedAgent<Self::Agent>;

    /// Read-only clone of one agent, or `None` when unknown
    fn agent_readonly_clone(&self, id: &Self::Id) -> Option<<Self::Agent as AgentCore>::Snapshot>;

    /// Read-only clones of all agents keyed by identity
    ///
    /// No instance is observed mid-mutation; insertion order is irrelevant.
    fn all_agents_readonly_clone(&self) -> HashMap<Self::Id, <Self::Agent as AgentCore>::Snapshot>;

    /// Offer connection settings to `id`, dropping the call when unknown
    ///
    /// The agent may have disconnected between the caller's decision and
    /// this call; that is not an error.
    fn offer_agent_connection_settings(&self, id: &Self::Id, offers: ConnectionSettingsOffers);

    /// Stage a custom config for `id`, dropping the call when the identity
    /// is unknown or the agent lacks the capability
    ///
    /// In both drop cases the notifier is never signaled: a waiting caller
    /// observes its timeout rather than an explicit error.
    fn set_custom_config_for_agent(
        &self,
        id: &Self::Id,
        config: AgentConfigMap,
        notify: Option<StatusNotifier>,
    );
}
