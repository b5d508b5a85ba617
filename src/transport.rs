//! Connection handles binding agents to live transport sessions
//!
//! A [`Connection`] is an opaque handle to one live session between the
//! server and an agent, created by the wire-level protocol engine when a
//! session is established. The registry never opens or closes sessions; it
//! only associates agent identities with handles and dissociates them when
//! the engine reports the session gone. One session may multiplex traffic
//! for several agent identities.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::mpsc;

use crate::protocol::AgentCommand;

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Opaque, comparable key for one transport session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Handle to a live transport session carrying one or more agents' traffic
#[derive(Debug, Clone)]
pub struct Connection {
    id: ConnectionId,
    command_tx: mpsc::Sender<AgentCommand>,
}

impl Connection {
    /// Wrap the session's outbound command channel in a handle
    ///
    /// Called by the protocol engine when a session is established. The
    /// engine drains the paired receiver and owns actual transmission.
    pub fn new(command_tx: mpsc::Sender<AgentCommand>) -> Self {
        Self {
            id: ConnectionId(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed)),
            command_tx,
        }
    }

    /// Create a handle together with the engine's end of the channel
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<AgentCommand>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self::new(tx), rx)
    }

    /// Stable key for this session
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Queue a directive for transmission without blocking
    ///
    /// Transmission itself is the engine's job. A full queue or a closed
    /// session surfaces as a [`SendError`] the caller absorbs.
    pub fn try_command(&self, command: AgentCommand) -> Result<(), SendError> {
        self.command_tx.try_send(command).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => SendError::ChannelFull,
            mpsc::error::TrySendError::Closed(_) => SendError::ChannelClosed,
        })
    }
}

/// Error queueing a directive to an agent
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendError {
    /// The session's channel is closed (disconnected)
    ChannelClosed,
    /// The session's outbound queue is full
    ChannelFull,
}

impl fmt::Display for SendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SendError::ChannelClosed => write!(f, "agent channel closed"),
            SendError::ChannelFull => write!(f, "agent channel full"),
        }
    }
}

impl std::error::Error for SendError {}
