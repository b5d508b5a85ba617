//! Wire-facing value types exchanged with managed agents
//!
//! These types are shared between the registry and the wire-level protocol
//! engine that frames and transports messages. The engine owns framing and
//! transport; drover only produces and consumes the values.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Certificate material offered to an agent (e.g., for TLS cert rotation)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TlsCertificate {
    /// Certificate in PEM format
    pub cert_pem: Vec<u8>,
    /// Private key in PEM format
    pub key_pem: Vec<u8>,
    /// CA certificate in PEM format (for verifying the peer)
    pub ca_pem: Vec<u8>,
}

/// Settings an agent should use for one of its server connections
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionSettings {
    /// Endpoint the agent should connect to
    pub destination_endpoint: String,
    /// Headers to include when connecting
    pub headers: BTreeMap<String, String>,
    /// Certificate material to present, when rotating
    pub certificate: Option<TlsCertificate>,
}

/// A set of connection settings proposed to an agent
///
/// `hash` is a stable content hash over the offered settings so repeated
/// identical offers are recognizable as identical by the agent and in audit
/// logs. Stores that implement
/// [`OfferHashing`](crate::registry::OfferHashing) fill it in before the
/// offer is sent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionSettingsOffers {
    /// Stable content hash over the offered settings (empty until ensured)
    pub hash: Vec<u8>,
    /// Settings for the management connection itself
    pub management: Option<ConnectionSettings>,
    /// Settings for named auxiliary connections (metrics, logs, ...)
    pub other: BTreeMap<String, ConnectionSettings>,
}

/// One logical configuration file pushed to an agent
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentConfigFile {
    /// Raw file body
    pub body: Vec<u8>,
    /// Content type label (empty when unspecified)
    pub content_type: String,
}

/// Configuration for an agent as a named set of files
///
/// The empty string names "the" default file. Applied atomically per agent:
/// a single current desired-config value, last write wins.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentConfigMap {
    /// Config files keyed by logical name
    pub config_map: BTreeMap<String, AgentConfigFile>,
}

impl AgentConfigMap {
    /// Build a map holding a single default (empty-named) file
    pub fn single(body: Vec<u8>, content_type: impl Into<String>) -> Self {
        let mut config_map = BTreeMap::new();
        config_map.insert(
            String::new(),
            AgentConfigFile {
                body,
                content_type: content_type.into(),
            },
        );
        Self { config_map }
    }
}

/// Attributes an agent reports about itself
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentDescription {
    /// Attributes that identify the agent (service name, instance id, ...)
    pub identifying_attributes: BTreeMap<String, String>,
    /// Attributes that describe but do not identify (os, arch, ...)
    pub non_identifying_attributes: BTreeMap<String, String>,
}

/// Periodic message from an agent describing its current state
///
/// The config-delivery synchronizer uses the next processed status report as
/// its acknowledgment proxy: whichever report arrives first after a config
/// push releases the waiting caller.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusReport {
    /// Updated agent self-description, when it changed
    pub description: Option<AgentDescription>,
    /// Config the agent is currently running, when reported
    pub effective_config: Option<AgentConfigMap>,
}

/// Directive pushed from the server to an agent over its connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentCommand {
    /// Propose new connection settings (e.g., certificate rotation)
    OfferConnectionSettings(ConnectionSettingsOffers),
    /// Apply a desired configuration
    ApplyConfig(AgentConfigMap),
}
