//! Server-side representation of one managed agent
//!
//! An [`Agent`] is the mutable last-known state of one remote agent, owned
//! exclusively by the registry: created on first contact for an identity,
//! updated in place on subsequent contact, removed when its owning
//! connection is torn down. External callers only ever receive
//! [`AgentSnapshot`]s, never the live instance.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::protocol::{
    AgentCommand, AgentConfigMap, AgentDescription, ConnectionSettingsOffers, StatusReport,
};
use crate::registry::{AgentCore, CustomConfig, StatusNotifier};
use crate::transport::Connection;

/// Identity of one logical managed agent, stable across reconnects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstanceId(Uuid);

impl InstanceId {
    /// Mint a fresh random identity
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Error parsing an instance id from its string form
#[derive(Debug, Error)]
#[error("invalid instance id: {0}")]
pub struct InvalidInstanceId(#[from] uuid::Error);

impl FromStr for InstanceId {
    type Err = InvalidInstanceId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Mutable server-side state of one managed agent
#[derive(Debug)]
pub struct Agent {
    instance_id: InstanceId,
    conn: Connection,
    description: Option<AgentDescription>,
    effective_config: Option<AgentConfigMap>,
    custom_config: Option<AgentConfigMap>,
    pending_status_ack: Option<StatusNotifier>,
}

/// Immutable point-in-time copy of an agent's externally visible state
///
/// Safe to hand outside the registry's locking discipline; carries no handle
/// back into the live instance.
#[derive(Debug, Clone, Serialize)]
pub struct AgentSnapshot {
    /// Identity of the agent this state was copied from
    pub instance_id: InstanceId,
    /// Last reported self-description
    pub description: Option<AgentDescription>,
    /// Last reported effective configuration
    pub effective_config: Option<AgentConfigMap>,
    /// Currently staged desired configuration, if any
    pub custom_config: Option<AgentConfigMap>,
}

impl Agent {
    /// Create the instance for `instance_id` on first contact over `conn`
    pub fn connect(instance_id: InstanceId, conn: &Connection) -> Self {
        Self {
            instance_id,
            conn: conn.clone(),
            description: None,
            effective_config: None,
            custom_config: None,
            pending_status_ack: None,
        }
    }

    /// Identity this instance represents
    pub fn instance_id(&self) -> InstanceId {
        self.instance_id
    }

    /// Absorb a status report from the agent
    ///
    /// Updates last-known state, releases a caller waiting on config
    /// acknowledgment, and re-offers the staged config while the agent's
    /// effective config has not caught up with it.
    pub fn process_status_report(&mut self, report: StatusReport) {
        if let Some(description) = report.description {
            self.description = Some(description);
        }
        if let Some(effective) = report.effective_config {
            self.effective_config = Some(effective);
        }

        if let Some(ack) = self.pending_status_ack.take() {
            if ack.send(()).is_err() {
                // Receiver timed out and went away; the token is spent either way
                debug!(instance = %self.instance_id, "Acknowledgment arrived after the waiter left");
            }
        }

        if let Some(desired) = &self.custom_config {
            if self.effective_config.as_ref() != Some(desired) {
                if let Err(e) = self
                    .conn
                    .try_command(AgentCommand::ApplyConfig(desired.clone()))
                {
                    warn!(instance = %self.instance_id, error = %e, "Failed to re-offer staged config");
                }
            }
        }
    }
}

impl AgentCore for Agent {
    type Snapshot = AgentSnapshot;

    fn offer_connection_settings(&mut self, offers: ConnectionSettingsOffers) {
        if let Err(e) = self
            .conn
            .try_command(AgentCommand::OfferConnectionSettings(offers))
        {
            warn!(instance = %self.instance_id, error = %e, "Failed to queue connection-settings offer");
        }
    }

    fn readonly_clone(&self) -> AgentSnapshot {
        AgentSnapshot {
            instance_id: self.instance_id,
            description: self.description.clone(),
            effective_config: self.effective_config.clone(),
            custom_config: self.custom_config.clone(),
        }
    }

    fn custom_config(&mut self) -> Option<&mut dyn CustomConfig> {
        Some(self)
    }
}

impl CustomConfig for Agent {
    fn set_custom_config(&mut self, config: AgentConfigMap, notify: Option<StatusNotifier>) {
        if let Err(e) = self
            .conn
            .try_command(AgentCommand::ApplyConfig(config.clone()))
        {
            warn!(instance = %self.instance_id, error = %e, "Failed to queue config push");
        }
        self.custom_config = Some(config);

        if self.pending_status_ack.is_some() {
            // The displaced waiter is released unacknowledged rather than
            // left pending forever.
            debug!(instance = %self.instance_id, "Pending acknowledgment displaced by newer config push");
        }
        self.pending_status_ack = notify;
    }
}
