//! Client-side mirror of a remote, authoritative voxel world.
//!
//! The server owns the world; this crate keeps the part of it the player can
//! see. Everything here is synchronous and protocol-agnostic: decoded world
//! data goes in, lookups and outbound hints (prediction sequence numbers,
//! desired chunks per tick) come out.
//!
//! - [`cache`]: ring-buffer chunk storage addressed by wrapped coordinates.
//! - [`light`]: bounded per-tick drain of deferred lighting work.
//! - [`prediction`]: speculative block edits and their reconciliation.
//! - [`pacing`]: per-chunk processing cost estimate fed back to the server.
//! - [`level`]: the single-writer facade tying the above together.

pub mod cache;
pub mod level;
pub mod light;
pub mod pacing;
pub mod prediction;
pub mod world;
