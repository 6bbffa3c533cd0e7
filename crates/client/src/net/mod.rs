//! Phase handlers and the driver that sequences them.
//!
//! Login -> Configuration -> Play, and back to Configuration whenever the
//! server asks. Each handler runs until its phase ends and reports how.

pub mod common;
pub mod configuration;
pub mod connection;
pub mod driver;
pub mod login;
pub mod play;

use std::fmt;

/// Why a session ended without a protocol error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisconnectReason {
    /// The server sent a disconnect packet.
    Server(String),
    /// The inbound stream ended.
    TransportClosed,
}

impl fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DisconnectReason::Server(reason) => write!(f, "disconnected by server: {}", reason),
            DisconnectReason::TransportClosed => f.write_str("connection closed"),
        }
    }
}

/// How a phase handler finished.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PhaseExit {
    /// Move on to the next phase (already transitioned).
    Advance,
    Disconnected(DisconnectReason),
}
