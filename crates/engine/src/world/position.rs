/// Absolute block position in the world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockPos {
    pub x: i64,
    pub y: i64,
    pub z: i64,
}

impl BlockPos {
    pub const fn new(x: i64, y: i64, z: i64) -> Self {
        Self { x, y, z }
    }

    /// The chunk column this block belongs to.
    pub const fn chunk(&self) -> ChunkPos {
        ChunkPos {
            x: (self.x >> 4) as i32,
            z: (self.z >> 4) as i32,
        }
    }

    /// The 16-block section this block belongs to.
    pub const fn section(&self) -> SectionPos {
        SectionPos {
            x: (self.x >> 4) as i32,
            y: (self.y >> 4) as i32,
            z: (self.z >> 4) as i32,
        }
    }

    /// Position within the chunk (0..16 on x/z, absolute y).
    pub const fn local(&self) -> LocalBlockPos {
        LocalBlockPos {
            x: (self.x & 0xF) as u8,
            y: self.y,
            z: (self.z & 0xF) as u8,
        }
    }

    /// Centre of the block's bottom face, where a player standing on it would be.
    pub fn bottom_center(&self) -> Vec3 {
        Vec3::new(self.x as f64 + 0.5, self.y as f64, self.z as f64 + 0.5)
    }
}

/// Chunk column position (each chunk is 16x16 blocks horizontally).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChunkPos {
    pub x: i32,
    pub z: i32,
}

impl ChunkPos {
    pub const fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    pub const fn block_origin(&self, y: i64) -> BlockPos {
        BlockPos::new((self.x as i64) << 4, y, (self.z as i64) << 4)
    }

    /// Chebyshev distance in chunks. This is the metric view windows use.
    pub fn chebyshev_distance(&self, other: ChunkPos) -> u32 {
        let dx = (self.x as i64 - other.x as i64).unsigned_abs();
        let dz = (self.z as i64 - other.z as i64).unsigned_abs();
        dx.max(dz) as u32
    }
}

/// A 16x16x16 section address: chunk column plus section y.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SectionPos {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl SectionPos {
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    pub const fn of(chunk: ChunkPos, y: i32) -> Self {
        Self::new(chunk.x, y, chunk.z)
    }

    pub const fn chunk(&self) -> ChunkPos {
        ChunkPos::new(self.x, self.z)
    }

    /// Pack into a single key: 22 bits x, 22 bits z, 20 bits y.
    pub const fn as_key(&self) -> i64 {
        ((self.x as i64 & 0x3F_FFFF) << 42)
            | ((self.z as i64 & 0x3F_FFFF) << 20)
            | (self.y as i64 & 0xF_FFFF)
    }

    /// Inverse of [`SectionPos::as_key`]; each field is sign-extended.
    pub const fn from_key(key: i64) -> Self {
        Self {
            x: (key >> 42) as i32,
            y: ((key << 44) >> 44) as i32,
            z: ((key << 22) >> 42) as i32,
        }
    }
}

/// Block position local to a chunk (x, z in 0..16).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalBlockPos {
    pub x: u8,
    pub y: i64,
    pub z: u8,
}

impl LocalBlockPos {
    pub const fn section_y(&self) -> i32 {
        (self.y >> 4) as i32
    }

    pub const fn section_local_y(&self) -> u8 {
        (self.y.rem_euclid(16)) as u8
    }
}

/// A point in continuous world space (player positions).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn section_key_round_trips_negative_coordinates() {
        for pos in [
            SectionPos::new(0, 0, 0),
            SectionPos::new(-1, -4, -1),
            SectionPos::new(1_875_000, 19, -1_875_000),
            SectionPos::new(-30, -64 >> 4, 12),
        ] {
            assert_eq!(SectionPos::from_key(pos.as_key()), pos);
        }
    }

    #[test]
    fn section_keys_are_distinct_per_axis() {
        let a = SectionPos::new(1, 0, 0).as_key();
        let b = SectionPos::new(0, 1, 0).as_key();
        let c = SectionPos::new(0, 0, 1).as_key();
        assert_ne!(a, b);
        assert_ne!(b, c);
        assert_ne!(a, c);
    }

    #[test]
    fn negative_blocks_map_to_negative_chunks() {
        let pos = BlockPos::new(-1, -65, -17);
        assert_eq!(pos.chunk(), ChunkPos::new(-1, -2));
        assert_eq!(pos.section(), SectionPos::new(-1, -5, -2));
        assert_eq!(pos.local().x, 15);
        assert_eq!(pos.local().z, 15);
        assert_eq!(pos.bottom_center(), Vec3::new(-0.5, -65.0, -16.5));
    }

    #[test]
    fn chebyshev_distance_takes_larger_axis() {
        let a = ChunkPos::new(0, 0);
        assert_eq!(a.chebyshev_distance(ChunkPos::new(3, -5)), 5);
        assert_eq!(a.chebyshev_distance(ChunkPos::new(-2, 1)), 2);
    }
}
