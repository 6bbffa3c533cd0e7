//! Decoded packets, grouped by the phase that carries them.
//!
//! These are the messages the external codec produces and consumes. Only the
//! fields the client acts on are modelled.

use indexmap::IndexMap;
use ultimate_mirror::light::LightData;
use ultimate_mirror::prediction::Sequence;
use ultimate_mirror::world::block::{BiomeId, BlockId};
use ultimate_mirror::world::chunk::{BIOME_CELLS, ChunkPayload};
use ultimate_mirror::world::position::{BlockPos, ChunkPos, Vec3};
use uuid::Uuid;

use super::phase::ConnectionPhase;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameProfile {
    pub uuid: Uuid,
    pub name: String,
}

/// One entry of a registry. `data` is absent when both sides share the
/// entry through a known pack and the client uses its local copy.
#[derive(Debug, Clone, PartialEq)]
pub struct RegistryEntry {
    pub id: String,
    pub data: Option<serde_json::Value>,
}

impl RegistryEntry {
    pub fn known(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            data: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KnownPack {
    pub namespace: String,
    pub id: String,
    pub version: String,
}

/// `tag name -> registry ids`, per registry.
pub type TagMap = IndexMap<String, Vec<(String, Vec<u32>)>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientIntention {
    Status,
    Login,
}

// ── Clientbound ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum ClientboundLoginPacket {
    LoginCompression { threshold: i32 },
    CookieRequest { key: String },
    CustomQuery { transaction_id: u32, identifier: String },
    LoginFinished { profile: GameProfile },
    LoginDisconnect { reason: String },
}

/// Packets shared by the configuration and play phases.
#[derive(Debug, Clone, PartialEq)]
pub enum CommonPacket {
    KeepAlive { id: u64 },
    Ping { id: u32 },
    CookieRequest { key: String },
    StoreCookie { key: String, payload: Vec<u8> },
    CustomPayload { channel: String, data: Vec<u8> },
    Disconnect { reason: String },
}

#[derive(Debug, Clone, PartialEq)]
pub enum ClientboundConfigPacket {
    Common(CommonPacket),
    RegistryData { registry_id: String, entries: Vec<RegistryEntry> },
    UpdateEnabledFeatures { features: Vec<String> },
    UpdateTags { tags: TagMap },
    SelectKnownPacks { known_packs: Vec<KnownPack> },
    ResetChat,
    FinishConfiguration,
}

#[derive(Debug, Clone, PartialEq)]
pub struct JoinGame {
    pub entity_id: i32,
    pub dimension_type: String,
    pub dimension: String,
    pub view_distance: u32,
    pub simulation_distance: u32,
}

#[derive(Debug, Clone)]
pub enum ClientboundGamePacket {
    Common(CommonPacket),
    Login(JoinGame),
    Respawn { dimension_type: String, dimension: String },
    LevelChunkWithLight { pos: ChunkPos, payload: ChunkPayload, light: LightData },
    ForgetLevelChunk { pos: ChunkPos },
    ChunksBiomes { chunks: Vec<(ChunkPos, Vec<[BiomeId; BIOME_CELLS]>)> },
    BlockUpdate { pos: BlockPos, state: BlockId },
    SectionBlocksUpdate { changes: Vec<(BlockPos, BlockId)> },
    BlockChangedAck { sequence: Sequence },
    LightUpdate { pos: ChunkPos, light: LightData },
    ChunkBatchStart,
    ChunkBatchFinished { batch_size: u32 },
    SetChunkCacheCenter { pos: ChunkPos },
    SetChunkCacheRadius { radius: u32 },
    PlayerPosition { teleport_id: u32, pos: Vec3 },
    PlayerInfoUpdate { players: Vec<GameProfile> },
    StartConfiguration,
}

/// A decoded packet from the server, tagged with its phase.
#[derive(Debug, Clone)]
pub enum Clientbound {
    Login(ClientboundLoginPacket),
    Config(ClientboundConfigPacket),
    Game(ClientboundGamePacket),
}

impl Clientbound {
    /// The phase whose packet table this packet belongs to.
    pub fn phase(&self) -> ConnectionPhase {
        match self {
            Clientbound::Login(_) => ConnectionPhase::Login,
            Clientbound::Config(_) => ConnectionPhase::Configuration,
            Clientbound::Game(_) => ConnectionPhase::Play,
        }
    }
}

impl From<ClientboundLoginPacket> for Clientbound {
    fn from(packet: ClientboundLoginPacket) -> Self {
        Clientbound::Login(packet)
    }
}

impl From<ClientboundConfigPacket> for Clientbound {
    fn from(packet: ClientboundConfigPacket) -> Self {
        Clientbound::Config(packet)
    }
}

impl From<ClientboundGamePacket> for Clientbound {
    fn from(packet: ClientboundGamePacket) -> Self {
        Clientbound::Game(packet)
    }
}

// ── Serverbound ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockAction {
    StartDestroyBlock,
    UseItemOn,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ServerboundPacket {
    Intention { protocol_version: i32, host: String, port: u16, intention: ClientIntention },
    Hello { name: String, profile_id: Uuid },
    CookieResponse { key: String, payload: Option<Vec<u8>> },
    CustomQueryAnswer { transaction_id: u32, data: Option<Vec<u8>> },
    LoginAcknowledged,
    ClientInformation { view_distance: u32 },
    CustomPayload { channel: String, data: Vec<u8> },
    SelectKnownPacks { known_packs: Vec<KnownPack> },
    KeepAlive { id: u64 },
    Pong { id: u32 },
    FinishConfiguration,
    ConfigurationAcknowledged,
    AcceptTeleportation { teleport_id: u32 },
    ChunkBatchReceived { desired_chunks_per_tick: f32 },
    PlayerAction { action: BlockAction, pos: BlockPos, state: BlockId, sequence: Sequence },
}
