//! Client side of a Minecraft-style connection.
//!
//! Drives an already-decoded packet stream through the login, configuration
//! and play phases and feeds the play phase into the world mirror from
//! `ultimate-mirror`. The byte-level codec and the socket live outside this
//! crate; a [`net::connection::Connection`] is just a pair of channels.

pub mod block;
pub mod config;
pub mod demo;
pub mod net;
pub mod protocol;
pub mod session;
pub mod stats;
