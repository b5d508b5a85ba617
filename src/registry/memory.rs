//! Generic in-memory agent store
//!
//! Thread-safe store over the identity -> instance and connection ->
//! identities maps. A single lock serializes map mutation so
//! `find_or_create_agent` is atomic and full snapshots are consistent;
//! individual instances carry their own lock (see
//! [`SharedAgent`](super::SharedAgent)) for their fields.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::protocol::{AgentConfigMap, ConnectionSettings, ConnectionSettingsOffers};
use crate::registry::{AgentCore, AgentStore, OfferHashing, SharedAgent, StatusNotifier};
use crate::transport::{Connection, ConnectionId};

/// In-memory implementation of [`AgentStore`]
///
/// `factory` builds an instance when an identity is seen for the first time;
/// everything else about the agent type stays opaque to the store.
pub struct InMemoryStore<Id, A> {
    inner: RwLock<Inner<Id, A>>,
    factory: fn(Id, &Connection) -> A,
}

struct Inner<Id, A> {
    agents: HashMap<Id, SharedAgent<A>>,
    by_connection: HashMap<ConnectionId, HashSet<Id>>,
}

impl<Id, A> InMemoryStore<Id, A>
where
    Id: Clone + Eq + Hash + Send + fmt::Debug,
    A: AgentCore,
{
    /// Create an empty store around an agent factory
    pub fn new(factory: fn(Id, &Connection) -> A) -> Self {
        Self {
            inner: RwLock::new(Inner {
                agents: HashMap::new(),
                by_connection: HashMap::new(),
            }),
            factory,
        }
    }

    /// Number of live agent instances
    pub fn len(&self) -> usize {
        self.inner.read().agents.len()
    }

    /// Check whether the store holds no agents
    pub fn is_empty(&self) -> bool {
        self.inner.read().agents.is_empty()
    }
}

impl<Id, A> AgentStore for InMemoryStore<Id, A>
where
    Id: Clone + Eq + Hash + Send + Sync + fmt::Debug,
    A: AgentCore,
{
    type Id = Id;
    type Agent = A;

    fn remove_connection(&self, conn: &Connection) {
        let mut inner = self.inner.write();
        let Some(ids) = inner.by_connection.remove(&conn.id()) else {
            debug!(connection = %conn.id(), "Remove for untracked connection ignored");
            return;
        };
        for id in &ids {
            inner.agents.remove(id);
            info!(connection = %conn.id(), instance = ?id, "Agent removed");
        }
        debug!(connection = %conn.id(), agents = ids.len(), "Connection dissociated");
    }

    fn find_agent(&self, id: &Id) -> Option<SharedAgent<A>> {
        self.inner.read().agents.get(id).cloned()
    }

    fn find_or_create_agent(&self, id: Id, conn: &Connection) -> SharedAgent<A> {
        let mut inner = self.inner.write();
        if let Some(agent) = inner.agents.get(&id) {
            return agent.clone();
        }

        let agent = Arc::new(Mutex::new((self.factory)(id.clone(), conn)));
        inner.agents.insert(id.clone(), agent.clone());
        inner
            .by_connection
            .entry(conn.id())
            .or_default()
            .insert(id.clone());
        info!(connection = %conn.id(), instance = ?id, "Agent registered");
        agent
    }

    fn agent_readonly_clone(&self, id: &Id) -> Option<A::Snapshot> {
        self.inner
            .read()
            .agents
            .get(id)
            .map(|agent| agent.lock().readonly_clone())
    }

    fn all_agents_readonly_clone(&self) -> HashMap<Id, A::Snapshot> {
        let inner = self.inner.read();
        inner
            .agents
            .iter()
            .map(|(id, agent)| (id.clone(), agent.lock().readonly_clone()))
            .collect()
    }

    fn offer_agent_connection_settings(&self, id: &Id, mut offers: ConnectionSettingsOffers) {
        let Some(agent) = self.find_agent(id) else {
            debug!(instance = ?id, "Connection-settings offer dropped for unknown agent");
            return;
        };
        self.ensure_offers_hash(&mut offers);
        agent.lock().offer_connection_settings(offers);
    }

    fn set_custom_config_for_agent(
        &self,
        id: &Id,
        config: AgentConfigMap,
        notify: Option<StatusNotifier>,
    ) {
        let Some(agent) = self.find_agent(id) else {
            debug!(instance = ?id, "Custom config dropped for unknown agent");
            return;
        };
        let mut agent = agent.lock();
        match agent.custom_config() {
            Some(custom) => custom.set_custom_config(config, notify),
            None => {
                debug!(instance = ?id, "Custom config dropped: agent lacks the capability");
            }
        }
    }
}

impl<Id, A> OfferHashing for InMemoryStore<Id, A>
where
    Id: Clone + Eq + Hash + Send + Sync + fmt::Debug,
    A: AgentCore,
{
    fn ensure_offers_hash(&self, offers: &mut ConnectionSettingsOffers) {
        offers.hash = hash_offers(offers);
    }
}

/// SHA-256 over a deterministic field encoding (tag and length framing), so
/// the hash is stable across processes and independent of any serializer.
fn hash_offers(offers: &ConnectionSettingsOffers) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hash_settings(&mut hasher, offers.management.as_ref());
    for (name, settings) in &offers.other {
        hash_bytes(&mut hasher, name.as_bytes());
        hash_settings(&mut hasher, Some(settings));
    }
    hasher.finalize().to_vec()
}

fn hash_bytes(hasher: &mut Sha256, bytes: &[u8]) {
    hasher.update((bytes.len() as u64).to_be_bytes());
    hasher.update(bytes);
}

fn hash_settings(hasher: &mut Sha256, settings: Option<&ConnectionSettings>) {
    let Some(settings) = settings else {
        hasher.update([0u8]);
        return;
    };
    hasher.update([1u8]);
    hash_bytes(hasher, settings.destination_endpoint.as_bytes());
    for (key, value) in &settings.headers {
        hash_bytes(hasher, key.as_bytes());
        hash_bytes(hasher, value.as_bytes());
    }
    match &settings.certificate {
        None => hasher.update([0u8]),
        Some(cert) => {
            hasher.update([1u8]);
            hash_bytes(hasher, &cert.cert_pem);
            hash_bytes(hasher, &cert.key_pem);
            hash_bytes(hasher, &cert.ca_pem);
        }
    }
}
