//! Config-delivery synchronizer
//!
//! Layered on the store's custom-config capability: stage a config for one
//! agent, then wait (bounded) for proof of delivery via the agent's next
//! status report.

use std::time::Duration;

use tokio::sync::oneshot;
use tokio::time::{sleep_until, timeout_at, Instant};
use tracing::debug;

use crate::protocol::AgentConfigMap;
use crate::registry::AgentStore;

/// Terminal outcome of a bounded acknowledgment wait
///
/// `Unconfirmed` is not an error: the push may still take effect after the
/// wait ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckOutcome {
    /// A status report arrived from the agent before the wait ended
    Acknowledged,
    /// The wait ended without confirmation
    Unconfirmed,
}

/// Stage `config` for `id` and wait up to `wait` for acknowledgment
///
/// The acknowledgment signal is the agent's next processed status report: a
/// heuristic proxy for delivery, not a guaranteed causal link: a report
/// already in flight for unrelated reasons also satisfies the wait.
///
/// When the identity is unknown, the agent lacks the custom-config
/// capability, or a newer push displaces this one, no acknowledgment will
/// ever arrive; the full wait elapses and the outcome is `Unconfirmed`.
pub async fn push_custom_config<S>(
    store: &S,
    id: &S::Id,
    config: AgentConfigMap,
    wait: Duration,
) -> AckOutcome
where
    S: AgentStore,
{
    let (notify, acked) = oneshot::channel();
    let deadline = Instant::now() + wait;
    store.set_custom_config_for_agent(id, config, Some(notify));

    match timeout_at(deadline, acked).await {
        Ok(Ok(())) => AckOutcome::Acknowledged,
        Ok(Err(_)) => {
            // Notifier discarded without firing; the wait stays bounded and
            // uniform so callers cannot distinguish the drop reasons.
            debug!("Acknowledgment notifier discarded; holding the bounded wait");
            sleep_until(deadline).await;
            AckOutcome::Unconfirmed
        }
        Err(_) => AckOutcome::Unconfirmed,
    }
}
