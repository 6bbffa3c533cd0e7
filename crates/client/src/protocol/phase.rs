//! Connection phases and the legal moves between them.
//!
//! Handshake -> Login -> Configuration -> Play, with Play able to drop back
//! into Configuration when the server asks for it. Any phase may end in
//! Disconnected, which is terminal.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionPhase {
    Handshake,
    Login,
    Configuration,
    Play,
    Disconnected,
}

impl ConnectionPhase {
    pub fn can_transition_to(self, next: ConnectionPhase) -> bool {
        use ConnectionPhase::*;
        matches!(
            (self, next),
            (Handshake, Login)
                | (Login, Configuration)
                | (Configuration, Play)
                | (Play, Configuration)
                | (Handshake | Login | Configuration | Play, Disconnected)
        )
    }

    /// Whether packets from the server are expected at all in this phase.
    pub fn receives_packets(self) -> bool {
        matches!(
            self,
            ConnectionPhase::Login | ConnectionPhase::Configuration | ConnectionPhase::Play
        )
    }
}

impl fmt::Display for ConnectionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionPhase::Handshake => "handshake",
            ConnectionPhase::Login => "login",
            ConnectionPhase::Configuration => "configuration",
            ConnectionPhase::Play => "play",
            ConnectionPhase::Disconnected => "disconnected",
        };
        f.write_str(name)
    }
}
