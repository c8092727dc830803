use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use serde::Serialize;

/// Connection lifecycle.
///
/// ```text
///  Disconnected ──connect──► Connecting ──open ok──► Connected
///       ▲                        │                      │
///       └────────open failed─────┘                      │
///       ├──────────read error / end of stream───────────┤
///       └─────────── Disconnecting ◄──disconnect────────┘
/// ```
///
/// `Connected` always means a read loop is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum ConnectionState {
    Disconnected = 0,
    Connecting = 1,
    Connected = 2,
    Disconnecting = 3,
}

impl ConnectionState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => ConnectionState::Connecting,
            2 => ConnectionState::Connected,
            3 => ConnectionState::Disconnecting,
            _ => ConnectionState::Disconnected,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Disconnecting => "disconnecting",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Connection state shared with the read loop thread.
#[derive(Debug, Clone)]
pub(crate) struct StateCell {
    inner: Arc<AtomicU8>,
}

impl StateCell {
    pub(crate) fn new() -> Self {
        Self {
            inner: Arc::new(AtomicU8::new(ConnectionState::Disconnected as u8)),
        }
    }

    pub(crate) fn get(&self) -> ConnectionState {
        ConnectionState::from_u8(self.inner.load(Ordering::SeqCst))
    }

    pub(crate) fn set(&self, state: ConnectionState) {
        self.inner.store(state as u8, Ordering::SeqCst);
    }

    /// Move `from → to`; returns false if the current state was not `from`.
    pub(crate) fn transition(&self, from: ConnectionState, to: ConnectionState) -> bool {
        self.inner
            .compare_exchange(from as u8, to as u8, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_disconnected() {
        assert_eq!(StateCell::new().get(), ConnectionState::Disconnected);
    }

    #[test]
    fn transition_requires_expected_state() {
        let cell = StateCell::new();
        assert!(cell.transition(ConnectionState::Disconnected, ConnectionState::Connecting));
        assert!(!cell.transition(ConnectionState::Disconnected, ConnectionState::Connecting));
        assert_eq!(cell.get(), ConnectionState::Connecting);
    }

    #[test]
    fn clones_share_state() {
        let cell = StateCell::new();
        let reader_side = cell.clone();
        reader_side.set(ConnectionState::Connected);
        assert_eq!(cell.get(), ConnectionState::Connected);
        assert_eq!(cell.get().to_string(), "connected");
    }
}
