//! Block state ids the demo world and tests are built from.
//!
//! The mirror never interprets block ids beyond air; these values match the
//! vanilla 1.21 protocol so scripted traffic looks like the real thing.

use ultimate_mirror::world::block::BlockId;

pub const AIR: BlockId = BlockId::AIR;
pub const STONE: BlockId = BlockId(1);
pub const GRASS_BLOCK: BlockId = BlockId(9); // snowy=false
pub const DIRT: BlockId = BlockId(10);
pub const BEDROCK: BlockId = BlockId(85);
pub const OAK_PLANKS: BlockId = BlockId(15);
