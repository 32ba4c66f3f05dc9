//! I/O traits for session operations
//!
//! These traits abstract the network send path, enabling the session and
//! presence logic to be tested without a socket.

use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::core::protocol::PlayerMessage;

// =============================================================================
// CONNECTION STATUS
// =============================================================================

/// Connection status shared between the connection thread and the main loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum ConnectionStatus {
    /// Resolving the endpoint or handshaking
    Connecting,
    /// Handshake done, frames flow both ways
    Open,
    /// Close requested, waiting for the socket to go away
    Closing,
    /// No socket
    Closed,
    /// Lost the socket, waiting out the backoff delay
    Reconnecting,
    /// Gave up after the attempt ceiling
    Failed,
}

impl ConnectionStatus {
    pub fn is_open(self) -> bool {
        self == ConnectionStatus::Open
    }
}

// =============================================================================
// I/O TRAITS
// =============================================================================

/// Outbound path to the host
pub trait MessageSender {
    /// Liveness check. The socket can close at any moment, so callers check
    /// right before sending and still handle a `false` from `send`.
    fn is_open(&self) -> bool;

    /// Hand a message to the transport. Returns true if accepted for
    /// transmission.
    fn send(&self, message: PlayerMessage) -> bool;
}

// =============================================================================
// MOCK IMPLEMENTATIONS FOR TESTING
// =============================================================================


// =============================================================================
// TESTS
// =============================================================================
