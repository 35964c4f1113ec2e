//! Error types for the transport and the session

use std::time::Duration;

use solem_proto::CodecError;

use crate::attributes::AttributeRole;

/// Fault reported by the BLE transport.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("bluetooth error: {0}")]
    Bluetooth(#[from] btleplug::Error),
    #[error("no Bluetooth adapter found")]
    NoAdapter,
    #[error("invalid device address {0:?}")]
    InvalidAddress(String),
    #[error("device {0} not found")]
    DeviceNotFound(String),
    #[error("no attribute at handle 0x{0:04x}")]
    UnknownHandle(u16),
    #[error("notification stream closed")]
    Closed,
    #[error("{operation} timed out after {after:?}")]
    Timeout {
        operation: &'static str,
        after: Duration,
    },
    #[error("{0}")]
    Other(String),
}

impl TransportError {
    /// The link is gone and nothing more can be sent or received on it.
    pub fn is_link_lost(&self) -> bool {
        matches!(
            self,
            TransportError::Closed | TransportError::Bluetooth(btleplug::Error::NotConnected)
        )
    }
}

/// Which write of an operation failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Command,
    Commit,
    EnableNotifications,
    DisableNotifications,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::Command => write!(f, "command write"),
            Stage::Commit => write!(f, "commit write"),
            Stage::EnableNotifications => write!(f, "notification enable"),
            Stage::DisableNotifications => write!(f, "notification disable"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("failed to connect to {address} after {attempts} attempts: {source}")]
    ConnectionFailed {
        address: String,
        attempts: u32,
        #[source]
        source: TransportError,
    },
    #[error("protocol mismatch: {0} attribute not found")]
    ProtocolMismatch(AttributeRole),
    #[error(transparent)]
    InvalidArgument(#[from] CodecError),
    #[error("{stage} failed: {source}")]
    CommandFailed {
        stage: Stage,
        #[source]
        source: TransportError,
    },
    #[error("attribute discovery failed: {0}")]
    Discovery(#[source] TransportError),
    #[error("session is not connected")]
    NotConnected,
    #[error("session is already connected to {0}")]
    AlreadyConnected(String),
    #[error("attributes have not been resolved")]
    AttributesUnresolved,
}
