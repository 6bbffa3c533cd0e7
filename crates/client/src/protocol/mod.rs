//! The decoded packet model and the phase state machine it is checked against.

pub mod packets;
pub mod phase;

/// Protocol version advertised in the handshake.
pub const PROTOCOL_VERSION: i32 = 774;
/// Game version string advertised alongside known packs.
pub const VERSION_NAME: &str = "1.21.11";
