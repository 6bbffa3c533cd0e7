use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use dashmap::DashMap;

use super::block::{BiomeId, BlockEntityKind, BlockId};
use super::position::{BlockPos, ChunkPos, LocalBlockPos};

/// Number of blocks along each axis of a chunk section.
pub const SECTION_SIZE: usize = 16;
/// Total block count in one section.
const SECTION_VOLUME: usize = SECTION_SIZE * SECTION_SIZE * SECTION_SIZE;
/// Biomes are stored at 4x4x4 resolution per section.
pub const BIOME_CELLS: usize = 64;

/// Vertical extent of a dimension, in blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DimensionHeight {
    pub min_y: i32,
    pub height: u32,
}

impl DimensionHeight {
    pub const OVERWORLD: DimensionHeight = DimensionHeight { min_y: -64, height: 384 };
    pub const NETHER: DimensionHeight = DimensionHeight { min_y: 0, height: 256 };

    pub const fn new(min_y: i32, height: u32) -> Self {
        Self { min_y, height }
    }

    pub const fn section_count(&self) -> usize {
        (self.height as usize) / SECTION_SIZE
    }

    pub const fn min_section(&self) -> i32 {
        self.min_y >> 4
    }

    /// Section y for a section index (0 = lowest section).
    pub const fn section_y(&self, index: usize) -> i32 {
        self.min_section() + index as i32
    }

    /// Section index for a section y, if the section lies inside the dimension.
    pub fn section_index(&self, section_y: i32) -> Option<usize> {
        let index = section_y.checked_sub(self.min_section())?;
        usize::try_from(index)
            .ok()
            .filter(|&i| i < self.section_count())
    }
}

/// A 16x16x16 cube of blocks plus its 4x4x4 biome grid.
///
/// Stored as a flat array in YZX order. The non-air count is kept up to date
/// on every write so emptiness checks never scan the array.
#[derive(Clone)]
pub struct ChunkSection {
    blocks: Box<[BlockId; SECTION_VOLUME]>,
    non_air: u16,
    biomes: [BiomeId; BIOME_CELLS],
}

impl ChunkSection {
    pub fn new_filled(block: BlockId) -> Self {
        Self {
            blocks: Box::new([block; SECTION_VOLUME]),
            non_air: if block.is_air() { 0 } else { SECTION_VOLUME as u16 },
            biomes: [BiomeId::default(); BIOME_CELLS],
        }
    }

    pub fn new_empty() -> Self {
        Self::new_filled(BlockId::AIR)
    }

    #[inline]
    const fn index(x: u8, y: u8, z: u8) -> usize {
        (y as usize) * SECTION_SIZE * SECTION_SIZE + (z as usize) * SECTION_SIZE + (x as usize)
    }

    #[inline]
    pub fn get(&self, x: u8, y: u8, z: u8) -> BlockId {
        self.blocks[Self::index(x, y, z)]
    }

    /// Write a block and return the one it replaced.
    #[inline]
    pub fn set(&mut self, x: u8, y: u8, z: u8, block: BlockId) -> BlockId {
        let slot = &mut self.blocks[Self::index(x, y, z)];
        let previous = std::mem::replace(slot, block);
        match (previous.is_air(), block.is_air()) {
            (true, false) => self.non_air += 1,
            (false, true) => self.non_air -= 1,
            _ => {}
        }
        previous
    }

    pub fn has_only_air(&self) -> bool {
        self.non_air == 0
    }

    pub fn non_air_count(&self) -> u16 {
        self.non_air
    }

    /// Biome at quarter resolution (each argument in 0..4).
    pub fn biome(&self, qx: u8, qy: u8, qz: u8) -> BiomeId {
        self.biomes[(qy as usize) * 16 + (qz as usize) * 4 + (qx as usize)]
    }

    pub fn set_biomes(&mut self, biomes: [BiomeId; BIOME_CELLS]) {
        self.biomes = biomes;
    }
}

impl Default for ChunkSection {
    fn default() -> Self {
        Self::new_empty()
    }
}

/// Decoded chunk contents as delivered by a chunk-data packet.
///
/// `sections` is ordered bottom-up; missing trailing sections are air.
#[derive(Clone, Default)]
pub struct ChunkPayload {
    pub sections: Vec<ChunkSection>,
    pub block_entities: Vec<(BlockPos, BlockEntityKind)>,
}

impl std::fmt::Debug for ChunkPayload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChunkPayload")
            .field("sections", &self.sections.len())
            .field("block_entities", &self.block_entities.len())
            .finish()
    }
}

/// What a single block write did to its chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockChange {
    pub previous: BlockId,
    /// `Some(now_empty)` when the section flipped between empty and non-empty.
    pub emptiness_changed: Option<bool>,
}

/// A full-height column of chunk sections.
///
/// Chunks are shared between the logic thread (the only writer) and reader
/// passes on other threads, so every section sits behind its own lock and is
/// only held for the duration of a single read or write.
pub struct Chunk {
    pos: ChunkPos,
    height: DimensionHeight,
    sections: Box<[RwLock<ChunkSection>]>,
    block_entities: DashMap<BlockPos, BlockEntityKind>,
    loaded: AtomicBool,
    placeholder: bool,
}

impl Chunk {
    /// An all-air chunk at `pos`.
    pub fn new(pos: ChunkPos, height: DimensionHeight) -> Self {
        let sections = (0..height.section_count())
            .map(|_| RwLock::new(ChunkSection::new_empty()))
            .collect();
        Self {
            pos,
            height,
            sections,
            block_entities: DashMap::new(),
            loaded: AtomicBool::new(true),
            placeholder: false,
        }
    }

    /// The shared stand-in returned for render lookups that miss. Reads as
    /// air everywhere and ignores writes.
    pub fn placeholder(height: DimensionHeight) -> Self {
        Self {
            placeholder: true,
            ..Self::new(ChunkPos::new(0, 0), height)
        }
    }

    pub fn from_payload(pos: ChunkPos, height: DimensionHeight, payload: ChunkPayload) -> Self {
        let chunk = Self::new(pos, height);
        chunk.replace_with_packet_data(payload);
        chunk
    }

    pub fn pos(&self) -> ChunkPos {
        self.pos
    }

    pub fn height(&self) -> DimensionHeight {
        self.height
    }

    pub fn is_placeholder(&self) -> bool {
        self.placeholder
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded.load(Ordering::Acquire)
    }

    pub fn section_count(&self) -> usize {
        self.sections.len()
    }

    fn read_section(&self, index: usize) -> RwLockReadGuard<'_, ChunkSection> {
        self.sections[index]
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn write_section(&self, index: usize) -> RwLockWriteGuard<'_, ChunkSection> {
        self.sections[index]
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get_block(&self, pos: LocalBlockPos) -> BlockId {
        match self.height.section_index(pos.section_y()) {
            Some(index) => self
                .read_section(index)
                .get(pos.x, pos.section_local_y(), pos.z),
            None => BlockId::AIR,
        }
    }

    /// Write a block. Returns `None` when the position is outside the
    /// dimension's height or this is the placeholder chunk.
    pub fn set_block(&self, pos: LocalBlockPos, block: BlockId) -> Option<BlockChange> {
        if self.placeholder {
            return None;
        }
        let index = self.height.section_index(pos.section_y())?;
        let mut section = self.write_section(index);
        let was_empty = section.has_only_air();
        let previous = section.set(pos.x, pos.section_local_y(), pos.z, block);
        let now_empty = section.has_only_air();
        Some(BlockChange {
            previous,
            emptiness_changed: (was_empty != now_empty).then_some(now_empty),
        })
    }

    pub fn is_section_empty(&self, index: usize) -> bool {
        self.read_section(index).has_only_air()
    }

    /// `(section_y, is_empty)` for every section, bottom-up.
    pub fn section_emptiness(&self) -> Vec<(i32, bool)> {
        (0..self.sections.len())
            .map(|i| (self.height.section_y(i), self.is_section_empty(i)))
            .collect()
    }

    /// Overwrite the whole column with freshly received data.
    pub fn replace_with_packet_data(&self, payload: ChunkPayload) {
        if self.placeholder {
            return;
        }
        let ChunkPayload { sections, block_entities } = payload;
        if sections.len() > self.sections.len() {
            tracing::debug!(
                "Chunk {:?}: payload carries {} sections, dimension holds {}",
                self.pos,
                sections.len(),
                self.sections.len()
            );
        }
        let mut incoming = sections.into_iter();
        for index in 0..self.sections.len() {
            let section = incoming.next().unwrap_or_default();
            *self.write_section(index) = section;
        }

        self.block_entities.clear();
        for (pos, kind) in block_entities {
            if pos.chunk() == self.pos {
                self.block_entities.insert(pos, kind);
            }
        }
    }

    /// Replace the biome grid of every section, bottom-up. Sections past the
    /// end of `biomes` keep their current biomes.
    pub fn replace_biomes(&self, biomes: &[[BiomeId; BIOME_CELLS]]) {
        if self.placeholder {
            return;
        }
        for (index, grid) in biomes.iter().enumerate().take(self.sections.len()) {
            self.write_section(index).set_biomes(*grid);
        }
    }

    pub fn biome(&self, section_index: usize, qx: u8, qy: u8, qz: u8) -> BiomeId {
        self.read_section(section_index).biome(qx, qy, qz)
    }

    pub fn block_entity(&self, pos: BlockPos) -> Option<BlockEntityKind> {
        self.block_entities.get(&pos).map(|entry| *entry)
    }

    pub fn block_entity_count(&self) -> usize {
        self.block_entities.len()
    }

    /// Release everything the chunk holds on behalf of the level. Returns
    /// `false` if the chunk had already been unloaded.
    pub fn unload(&self) -> bool {
        if !self.loaded.swap(false, Ordering::AcqRel) {
            return false;
        }
        self.block_entities.clear();
        true
    }
}

impl std::fmt::Debug for Chunk {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Chunk")
            .field("pos", &self.pos)
            .field("sections", &self.sections.len())
            .field("loaded", &self.is_loaded())
            .field("placeholder", &self.placeholder)
            .finish()
    }
}
