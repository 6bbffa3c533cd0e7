//! World data model: block ids, positions, sections and chunk columns.
//!
//! This is the spatial substrate the mirror stores. Which chunks exist on the
//! client, and for how long, is decided by [`crate::cache`], not here.

pub mod block;
pub mod chunk;
pub mod position;
