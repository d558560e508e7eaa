use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// Lifecycle of the logical connection. Owned by the transport task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// First connection attempt(s); sends are queued.
    Connecting,
    Open,
    /// A session was lost and a new one is being established.
    Reconnecting,
    /// Closed by the caller. Terminal.
    Closed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Connecting => "connecting",
            ConnectionState::Open => "open",
            ConnectionState::Reconnecting => "reconnecting",
            ConnectionState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// One inbound frame, untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawMessage {
    Text(String),
    Binary(Vec<u8>),
}

impl RawMessage {
    pub fn len(&self) -> usize {
        match self {
            RawMessage::Text(text) => text.len(),
            RawMessage::Binary(bytes) => bytes.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<&str> for RawMessage {
    fn from(text: &str) -> Self {
        RawMessage::Text(text.to_string())
    }
}

impl From<String> for RawMessage {
    fn from(text: String) -> Self {
        RawMessage::Text(text)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("failed to connect to {url}: {reason}")]
    ConnectFailed { url: String, reason: String },

    #[error("connection lost: {0}")]
    Lost(String),

    #[error("server closed the connection: {0}")]
    RemoteClosed(String),

    #[error("no frame received for {0:?}")]
    Inactive(Duration),

    #[error("send failed: {0}")]
    SendFailed(String),

    #[error("cannot send while {0}")]
    NotOpen(ConnectionState),
}

/// Everything the transport reports, in the order it happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    State(ConnectionState),
    Message(RawMessage),
    Error(TransportError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        assert_eq!(
            TransportError::RemoteClosed("bye".into()).to_string(),
            "server closed the connection: bye"
        );
        assert_eq!(
            TransportError::NotOpen(ConnectionState::Reconnecting).to_string(),
            "cannot send while reconnecting"
        );
    }

    #[test]
    fn test_raw_message_len() {
        assert_eq!(RawMessage::from("{}").len(), 2);
        assert!(RawMessage::Binary(Vec::new()).is_empty());
    }
}
