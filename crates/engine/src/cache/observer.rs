use crate::light::LightData;
use crate::world::chunk::Chunk;
use crate::world::position::{ChunkPos, SectionPos};

/// Hooks into the collaborators that shadow the cache: the light engine, the
/// section renderer and entity ticking.
///
/// Every method has a no-op default so collaborators only implement what they
/// care about. Calls happen on the logic thread, except `on_light_data`, which
/// runs wherever the light queue is drained.
pub trait ChunkObserver: Send + Sync {
    /// A chunk was inserted or refreshed from packet data.
    fn on_chunk_loaded(&self, _pos: ChunkPos) {}

    /// A chunk left the cache. Its block entities have already been released;
    /// the collaborator should disable its light region and stop ticking
    /// entities in the column.
    fn on_chunk_unloaded(&self, _chunk: &Chunk) {}

    /// A section that was known to be all air now holds blocks.
    fn on_section_becoming_non_empty(&self, _section: SectionPos) {}

    /// Deferred light data for a column is being applied.
    fn on_light_data(&self, _pos: ChunkPos, _light: &LightData) {}
}

/// Observer that ignores every notification.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl ChunkObserver for NoopObserver {}
