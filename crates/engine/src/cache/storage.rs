use std::sync::Arc;
use std::sync::atomic::{AtomicI32, AtomicUsize, Ordering};

use arc_swap::ArcSwapOption;

use crate::world::chunk::Chunk;
use crate::world::position::ChunkPos;

/// Fixed-size ring of chunk slots addressed by wrapped chunk coordinates.
///
/// `(x, z)` lands in slot `floor_mod(z, range) * range + floor_mod(x, range)`,
/// so two coordinates `range` apart share a slot. A slot may therefore hold a
/// chunk for a coordinate other than the one being asked about, and every
/// reader must compare `chunk.pos()` with the coordinate it wanted.
///
/// Slots are published with atomic pointer swaps and the view centre lives in
/// atomics, so readers on other threads never block and never see a torn
/// chunk reference.
pub(crate) struct ChunkStorage {
    chunk_radius: u32,
    view_range: u32,
    view_center_x: AtomicI32,
    view_center_z: AtomicI32,
    slots: Box<[ArcSwapOption<Chunk>]>,
    chunk_count: AtomicUsize,
}

impl ChunkStorage {
    pub(crate) fn new(chunk_radius: u32, center: ChunkPos) -> Self {
        let view_range = chunk_radius * 2 + 1;
        let slots = (0..view_range * view_range)
            .map(|_| ArcSwapOption::empty())
            .collect();
        Self {
            chunk_radius,
            view_range,
            view_center_x: AtomicI32::new(center.x),
            view_center_z: AtomicI32::new(center.z),
            slots,
            chunk_count: AtomicUsize::new(0),
        }
    }

    pub(crate) fn chunk_radius(&self) -> u32 {
        self.chunk_radius
    }

    pub(crate) fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub(crate) fn chunk_count(&self) -> usize {
        self.chunk_count.load(Ordering::Acquire)
    }

    pub(crate) fn index(&self, pos: ChunkPos) -> usize {
        let range = self.view_range as i32;
        (pos.z.rem_euclid(range) * range + pos.x.rem_euclid(range)) as usize
    }

    pub(crate) fn center(&self) -> ChunkPos {
        ChunkPos::new(
            self.view_center_x.load(Ordering::Acquire),
            self.view_center_z.load(Ordering::Acquire),
        )
    }

    pub(crate) fn set_center(&self, center: ChunkPos) {
        self.view_center_x.store(center.x, Ordering::Release);
        self.view_center_z.store(center.z, Ordering::Release);
    }

    pub(crate) fn in_range(&self, pos: ChunkPos) -> bool {
        self.center().chebyshev_distance(pos) <= self.chunk_radius
    }

    pub(crate) fn load(&self, index: usize) -> Option<Arc<Chunk>> {
        self.slots[index].load_full()
    }

    /// Publish `chunk` into the slot and hand back whatever was there.
    pub(crate) fn swap(&self, index: usize, chunk: Option<Arc<Chunk>>) -> Option<Arc<Chunk>> {
        let incoming = chunk.is_some();
        let previous = self.slots[index].swap(chunk);
        if previous.is_some() {
            self.chunk_count.fetch_sub(1, Ordering::AcqRel);
        }
        if incoming {
            self.chunk_count.fetch_add(1, Ordering::AcqRel);
        }
        previous
    }

    /// Empty the slot only if it still holds exactly `expected`.
    pub(crate) fn compare_and_clear(&self, index: usize, expected: &Arc<Chunk>) -> bool {
        let current = Some(Arc::clone(expected));
        let previous = self.slots[index].compare_and_swap(&current, None::<Arc<Chunk>>);
        let cleared = matches!(&*previous, Some(chunk) if Arc::ptr_eq(chunk, expected));
        if cleared {
            self.chunk_count.fetch_sub(1, Ordering::AcqRel);
        }
        cleared
    }

    /// Every chunk currently held, including stale aliases.
    pub(crate) fn occupants(&self) -> impl Iterator<Item = Arc<Chunk>> + '_ {
        self.slots.iter().filter_map(|slot| slot.load_full())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::chunk::DimensionHeight;

    fn chunk(x: i32, z: i32) -> Arc<Chunk> {
        Arc::new(Chunk::new(ChunkPos::new(x, z), DimensionHeight::NETHER))
    }

    #[test]
    fn index_wraps_negative_coordinates() {
        let storage = ChunkStorage::new(3, ChunkPos::new(0, 0));
        assert_eq!(storage.index(ChunkPos::new(0, 0)), 0);
        assert_eq!(storage.index(ChunkPos::new(-1, 0)), 6);
        assert_eq!(storage.index(ChunkPos::new(0, -1)), 42);
        assert_eq!(storage.index(ChunkPos::new(7, 7)), 0);
        assert_eq!(storage.index(ChunkPos::new(-7, 14)), 0);
    }

    #[test]
    fn every_in_range_coordinate_gets_its_own_slot() {
        let storage = ChunkStorage::new(3, ChunkPos::new(-11, 40));
        let mut seen = std::collections::HashSet::new();
        for x in -14..=-8 {
            for z in 37..=43 {
                assert!(storage.in_range(ChunkPos::new(x, z)));
                assert!(seen.insert(storage.index(ChunkPos::new(x, z))));
            }
        }
        assert_eq!(seen.len(), storage.capacity());
    }

    #[test]
    fn swap_tracks_occupancy() {
        let storage = ChunkStorage::new(2, ChunkPos::new(0, 0));
        assert!(storage.swap(0, Some(chunk(0, 0))).is_none());
        assert_eq!(storage.chunk_count(), 1);
        assert!(storage.swap(0, Some(chunk(5, 5))).is_some());
        assert_eq!(storage.chunk_count(), 1);
        assert!(storage.swap(0, None).is_some());
        assert_eq!(storage.chunk_count(), 0);
    }

    #[test]
    fn compare_and_clear_ignores_replaced_occupant() {
        let storage = ChunkStorage::new(2, ChunkPos::new(0, 0));
        let stale = chunk(0, 0);
        let fresh = chunk(0, 0);
        storage.swap(0, Some(Arc::clone(&stale)));
        storage.swap(0, Some(Arc::clone(&fresh)));

        assert!(!storage.compare_and_clear(0, &stale));
        assert!(Arc::ptr_eq(&storage.load(0).unwrap(), &fresh));
        assert!(storage.compare_and_clear(0, &fresh));
        assert!(storage.load(0).is_none());
        assert_eq!(storage.chunk_count(), 0);
    }

    #[test]
    fn window_is_chebyshev_around_center() {
        let storage = ChunkStorage::new(3, ChunkPos::new(0, 0));
        assert!(storage.in_range(ChunkPos::new(3, -3)));
        assert!(!storage.in_range(ChunkPos::new(5, 5)));
        storage.set_center(ChunkPos::new(4, 4));
        assert!(storage.in_range(ChunkPos::new(5, 5)));
        assert!(!storage.in_range(ChunkPos::new(0, 0)));
    }
}
