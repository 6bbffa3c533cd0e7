/// Opaque block state identifier, as received from the server.
///
/// The mirror stores these without interpreting them. The one semantic it
/// relies on is that `BlockId::AIR` (0) is empty: a section holding nothing
/// but air is reported as an empty section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct BlockId(pub u16);

impl BlockId {
    /// The universal "empty" block.
    pub const AIR: BlockId = BlockId(0);

    pub const fn new(id: u16) -> Self {
        Self(id)
    }

    pub const fn is_air(self) -> bool {
        self.0 == Self::AIR.0
    }
}

/// Opaque biome identifier (index into the server's biome registry).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct BiomeId(pub u16);

/// Opaque block entity kind (index into the server's block entity registry).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockEntityKind(pub u16);
