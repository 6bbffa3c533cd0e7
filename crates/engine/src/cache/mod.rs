//! The chunk view cache: which chunks are materialized on the client.
//!
//! Storage is a ring buffer sized by the view radius (see [`ChunkStorage`]),
//! so memory is O(window²) no matter where the player is. "In range" is a
//! pure function of the centre, the radius and the requested coordinate;
//! moving the centre never touches storage.
//!
//! Threading: the logic thread is the only writer. Renderer and light passes
//! read from their own threads through `&self`; slot and storage publication
//! is lock-free (`arc_swap`), so readers never block the writer.

mod empty_sections;
mod observer;
mod storage;

use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::world::block::BiomeId;
use crate::world::chunk::{BIOME_CELLS, Chunk, ChunkPayload, DimensionHeight};
use crate::world::position::{ChunkPos, SectionPos};

pub use empty_sections::EmptySectionSet;
pub use observer::{ChunkObserver, NoopObserver};
use storage::ChunkStorage;

/// Smallest server view distance the cache sizes itself for.
pub const MIN_VIEW_DISTANCE: u32 = 2;
/// Extra ring of chunks kept beyond the server's view distance, so chunks in
/// flight while the player moves still have somewhere to land.
pub const VIEW_DISTANCE_MARGIN: u32 = 3;

/// Ring-buffer storage radius for a server view distance.
pub const fn storage_radius(view_distance: u32) -> u32 {
    let clamped = if view_distance < MIN_VIEW_DISTANCE {
        MIN_VIEW_DISTANCE
    } else {
        view_distance
    };
    clamped + VIEW_DISTANCE_MARGIN
}

pub struct ChunkCache {
    storage: ArcSwap<ChunkStorage>,
    empty_sections: EmptySectionSet,
    placeholder: Arc<Chunk>,
    height: DimensionHeight,
    observer: Arc<dyn ChunkObserver>,
}

impl ChunkCache {
    pub fn new(view_distance: u32, height: DimensionHeight, observer: Arc<dyn ChunkObserver>) -> Self {
        Self {
            storage: ArcSwap::from_pointee(ChunkStorage::new(
                storage_radius(view_distance),
                ChunkPos::new(0, 0),
            )),
            empty_sections: EmptySectionSet::new(),
            placeholder: Arc::new(Chunk::placeholder(height)),
            height,
            observer,
        }
    }

    pub fn height(&self) -> DimensionHeight {
        self.height
    }

    /// Current storage radius (server view distance plus margin).
    pub fn chunk_radius(&self) -> u32 {
        self.storage.load().chunk_radius()
    }

    pub fn view_center(&self) -> ChunkPos {
        self.storage.load().center()
    }

    pub fn in_range(&self, pos: ChunkPos) -> bool {
        self.storage.load().in_range(pos)
    }

    /// Authoritative lookup: the chunk at `pos`, or `None` if it is outside
    /// the window, not loaded, or its slot holds a different coordinate.
    pub fn get_chunk(&self, pos: ChunkPos) -> Option<Arc<Chunk>> {
        let storage = self.storage.load();
        if !storage.in_range(pos) {
            return None;
        }
        storage
            .load(storage.index(pos))
            .filter(|chunk| chunk.pos() == pos)
    }

    /// Render lookup: like [`ChunkCache::get_chunk`] but misses return the
    /// shared all-air placeholder.
    pub fn get_chunk_or_empty(&self, pos: ChunkPos) -> Arc<Chunk> {
        self.get_chunk(pos)
            .unwrap_or_else(|| Arc::clone(&self.placeholder))
    }

    pub fn has_chunk(&self, pos: ChunkPos) -> bool {
        self.get_chunk(pos).is_some()
    }

    /// Publish an already-built chunk into its slot. Whatever occupied the
    /// slot before is unloaded. Returns the published chunk, or `None` when
    /// the chunk lies outside the window.
    pub fn insert_or_replace(&self, chunk: Chunk) -> Option<Arc<Chunk>> {
        let pos = chunk.pos();
        let storage = self.storage.load();
        if !storage.in_range(pos) {
            tracing::warn!("Ignoring chunk since it's not in the view range: {}, {}", pos.x, pos.z);
            return None;
        }
        let chunk = Arc::new(chunk);
        self.install(&storage, pos, Arc::clone(&chunk));
        self.refresh_empty_sections(&chunk);
        self.observer.on_chunk_loaded(pos);
        Some(chunk)
    }

    /// Apply a chunk-data packet. A resident chunk with the same coordinate is
    /// rewritten in place; otherwise a fresh chunk replaces the slot occupant.
    pub fn replace_with_packet_data(&self, pos: ChunkPos, payload: ChunkPayload) -> Option<Arc<Chunk>> {
        let storage = self.storage.load();
        if !storage.in_range(pos) {
            tracing::warn!("Ignoring chunk since it's not in the view range: {}, {}", pos.x, pos.z);
            return None;
        }
        let index = storage.index(pos);
        let chunk = match storage.load(index) {
            Some(resident) if resident.pos() == pos => {
                resident.replace_with_packet_data(payload);
                resident
            }
            _ => {
                let fresh = Arc::new(Chunk::from_payload(pos, self.height, payload));
                self.install(&storage, pos, Arc::clone(&fresh));
                fresh
            }
        };
        self.refresh_empty_sections(&chunk);
        self.observer.on_chunk_loaded(pos);
        Some(chunk)
    }

    /// Patch the biomes of a resident chunk.
    pub fn replace_biomes(&self, pos: ChunkPos, biomes: &[[BiomeId; BIOME_CELLS]]) {
        let storage = self.storage.load();
        if !storage.in_range(pos) {
            tracing::warn!("Ignoring chunk since it's not in the view range: {}, {}", pos.x, pos.z);
            return;
        }
        match storage.load(storage.index(pos)) {
            Some(chunk) if chunk.pos() == pos => {
                chunk.replace_biomes(biomes);
                self.refresh_empty_sections(&chunk);
            }
            _ => tracing::warn!("Ignoring chunk since it's not present: {}, {}", pos.x, pos.z),
        }
    }

    /// Remove the chunk at `pos`, but only if it is still the slot occupant.
    /// Returns whether a chunk was removed.
    pub fn drop_chunk(&self, pos: ChunkPos) -> bool {
        let storage = self.storage.load();
        if !storage.in_range(pos) {
            tracing::warn!("Ignoring chunk unload since it's not in the view range: {}, {}", pos.x, pos.z);
            return false;
        }
        let index = storage.index(pos);
        let Some(chunk) = storage.load(index).filter(|chunk| chunk.pos() == pos) else {
            tracing::debug!("Chunk unload for {}, {} found no matching occupant", pos.x, pos.z);
            return false;
        };
        if !storage.compare_and_clear(index, &chunk) {
            return false;
        }
        self.retire(&chunk);
        true
    }

    pub fn update_view_center(&self, center: ChunkPos) {
        self.storage.load().set_center(center);
    }

    /// Resize the window for a new server view distance. Chunks still in
    /// range migrate to the new ring; the rest are unloaded. Returns whether
    /// the storage radius actually changed.
    pub fn update_view_radius(&self, view_distance: u32) -> bool {
        let old = self.storage.load_full();
        let radius = storage_radius(view_distance);
        if old.chunk_radius() == radius {
            return false;
        }

        let resized = ChunkStorage::new(radius, old.center());
        let mut discarded = Vec::new();
        for chunk in old.occupants() {
            let pos = chunk.pos();
            if resized.in_range(pos) {
                resized.swap(resized.index(pos), Some(chunk));
            } else {
                discarded.push(chunk);
            }
        }
        tracing::debug!(
            "Chunk cache radius {} -> {}: kept {}, discarded {}",
            old.chunk_radius(),
            radius,
            resized.chunk_count(),
            discarded.len()
        );
        self.storage.store(Arc::new(resized));

        for chunk in &discarded {
            self.retire(chunk);
        }
        true
    }

    /// Keep the empty-section set current after a single block edit.
    pub fn on_section_emptiness_changed(&self, section: SectionPos, empty: bool) {
        if !self.in_range(section.chunk()) {
            return;
        }
        if empty {
            self.empty_sections.insert(section);
        } else if self.empty_sections.remove(section) {
            self.observer.on_section_becoming_non_empty(section);
        }
    }

    pub fn is_section_empty(&self, section: SectionPos) -> bool {
        self.empty_sections.contains(section)
    }

    pub fn empty_sections(&self) -> &EmptySectionSet {
        &self.empty_sections
    }

    pub fn observer(&self) -> &Arc<dyn ChunkObserver> {
        &self.observer
    }

    pub fn loaded_chunk_count(&self) -> usize {
        self.storage.load().chunk_count()
    }

    /// Number of slots in the ring.
    pub fn capacity(&self) -> usize {
        self.storage.load().capacity()
    }

    /// Chunks reachable through [`ChunkCache::get_chunk`] right now.
    pub fn loaded_chunks(&self) -> Vec<Arc<Chunk>> {
        let storage = self.storage.load();
        storage
            .occupants()
            .filter(|chunk| storage.in_range(chunk.pos()))
            .collect()
    }

    pub fn debug_summary(&self) -> String {
        format!("Client Chunk Cache: {}, {}", self.capacity(), self.loaded_chunk_count())
    }

    /// Unload everything. Used on session reset.
    pub fn clear(&self) {
        let storage = self.storage.load();
        for index in 0..storage.capacity() {
            if let Some(chunk) = storage.swap(index, None) {
                self.retire(&chunk);
            }
        }
        self.empty_sections.clear();
    }

    /// Swap `chunk` into its slot and unload the previous occupant, whether it
    /// was the same coordinate or an alias.
    fn install(&self, storage: &ChunkStorage, pos: ChunkPos, chunk: Arc<Chunk>) {
        let index = storage.index(pos);
        if let Some(previous) = storage.swap(index, Some(Arc::clone(&chunk))) {
            if !Arc::ptr_eq(&previous, &chunk) {
                self.retire(&previous);
            }
        }
    }

    fn retire(&self, chunk: &Arc<Chunk>) {
        if !chunk.unload() {
            return;
        }
        self.drop_empty_sections(chunk);
        self.observer.on_chunk_unloaded(chunk);
    }

    fn refresh_empty_sections(&self, chunk: &Chunk) {
        let pos = chunk.pos();
        for (section_y, empty) in chunk.section_emptiness() {
            let section = SectionPos::of(pos, section_y);
            if empty {
                self.empty_sections.insert(section);
            } else if self.empty_sections.remove(section) {
                self.observer.on_section_becoming_non_empty(section);
            }
        }
    }

    fn drop_empty_sections(&self, chunk: &Chunk) {
        let pos = chunk.pos();
        for index in 0..chunk.section_count() {
            self.empty_sections
                .remove(SectionPos::of(pos, chunk.height().section_y(index)));
        }
    }
}

impl std::fmt::Debug for ChunkCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChunkCache")
            .field("chunk_radius", &self.chunk_radius())
            .field("view_center", &self.view_center())
            .field("loaded", &self.loaded_chunk_count())
            .finish()
    }
}
