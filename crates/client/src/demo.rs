//! A scripted in-process server for `--demo` and the driver tests.
//!
//! Speaks the decoded packet model over a [`RemoteEnd`] and plays the part of
//! the player through the input channel, so a whole session runs without a
//! socket: login, configuration, a flat world streamed in one batch, a few
//! predicted edits (one of them rejected), a window change, then disconnect.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::{Context, Result, bail};
use tokio::sync::mpsc;
use ultimate_mirror::cache::ChunkObserver;
use ultimate_mirror::light::{LightData, SectionLight};
use ultimate_mirror::world::block::BlockId;
use ultimate_mirror::world::chunk::{Chunk, ChunkPayload, ChunkSection, DimensionHeight, SECTION_SIZE};
use ultimate_mirror::world::position::{BlockPos, ChunkPos, SectionPos};

use crate::block;
use crate::config::ClientConfig;
use crate::net::connection::{Connection, DEFAULT_BUFFER, RemoteEnd};
use crate::net::driver::{Driver, SessionEnd};
use crate::net::play::LocalAction;
use crate::protocol::packets::{
    ClientboundConfigPacket, ClientboundGamePacket, ClientboundLoginPacket, CommonPacket, GameProfile,
    JoinGame, KnownPack, RegistryEntry, ServerboundPacket,
};
use crate::protocol::VERSION_NAME;
use crate::session::{BRAND_CHANNEL, DIMENSION_TYPE_REGISTRY, offline_uuid};

pub const DEMO_VIEW_DISTANCE: u32 = 4;
pub const DEMO_DIMENSION_TYPE: &str = "minecraft:overworld";
pub const DEMO_DIMENSION: &str = "minecraft:overworld";

/// World y of the grass layer in the flat demo world.
pub const SURFACE_Y: i64 = DimensionHeight::OVERWORLD.min_y as i64 + 4;

/// Bedrock, three layers of stone and grass in the bottom section.
pub fn flat_chunk_payload() -> ChunkPayload {
    let mut floor = ChunkSection::new_empty();
    for x in 0..SECTION_SIZE as u8 {
        for z in 0..SECTION_SIZE as u8 {
            floor.set(x, 0, z, block::BEDROCK);
            for y in 1..=3 {
                floor.set(x, y, z, block::STONE);
            }
            floor.set(x, 4, z, block::GRASS_BLOCK);
        }
    }
    ChunkPayload {
        sections: vec![floor],
        block_entities: Vec::new(),
    }
}

/// Full sky light over the floor section.
pub fn flat_light() -> LightData {
    LightData {
        sections: vec![SectionLight {
            section_y: DimensionHeight::OVERWORLD.min_section(),
            sky: Some(vec![0xff; 2048]),
            block: None,
        }],
    }
}

pub fn registries() -> Vec<(String, Vec<RegistryEntry>)> {
    vec![
        (
            DIMENSION_TYPE_REGISTRY.to_string(),
            ["minecraft:overworld", "minecraft:overworld_caves", "minecraft:the_end", "minecraft:the_nether"]
                .into_iter()
                .map(RegistryEntry::known)
                .collect(),
        ),
        (
            "minecraft:worldgen/biome".to_string(),
            ["minecraft:plains", "minecraft:the_void"]
                .into_iter()
                .map(RegistryEntry::known)
                .collect(),
        ),
    ]
}

fn core_pack() -> KnownPack {
    KnownPack {
        namespace: "minecraft".into(),
        id: "core".into(),
        version: VERSION_NAME.into(),
    }
}

/// Send a block edit as the player and wait for the client to report it.
async fn player_edit(
    remote: &mut RemoteEnd,
    player: &mpsc::Sender<LocalAction>,
    action: LocalAction,
) -> Result<ServerboundPacket> {
    player
        .send(action)
        .await
        .map_err(|_| anyhow::anyhow!("Client stopped reading player input"))?;
    remote
        .expect(|p| matches!(p, ServerboundPacket::PlayerAction { .. }))
        .await
}

/// Play the server side of a full session.
pub async fn scripted_server(mut remote: RemoteEnd, player: mpsc::Sender<LocalAction>) -> Result<()> {
    // ── Login ───────────────────────────────────────────────────────────
    remote.expect(|p| matches!(p, ServerboundPacket::Intention { .. })).await?;
    let ServerboundPacket::Hello { name, .. } =
        remote.expect(|p| matches!(p, ServerboundPacket::Hello { .. })).await?
    else {
        bail!("expected Hello");
    };
    remote
        .send(ClientboundLoginPacket::CustomQuery {
            transaction_id: 1,
            identifier: "velocity:player_info".into(),
        })
        .await?;
    remote
        .send(ClientboundLoginPacket::LoginFinished {
            profile: GameProfile {
                uuid: offline_uuid(&name),
                name,
            },
        })
        .await?;
    remote.expect(|p| *p == ServerboundPacket::LoginAcknowledged).await?;

    // ── Configuration ───────────────────────────────────────────────────
    remote
        .send(ClientboundConfigPacket::SelectKnownPacks { known_packs: vec![core_pack()] })
        .await?;
    remote.expect(|p| matches!(p, ServerboundPacket::SelectKnownPacks { .. })).await?;
    for (registry_id, entries) in registries() {
        remote
            .send(ClientboundConfigPacket::RegistryData { registry_id, entries })
            .await?;
    }
    remote
        .send(ClientboundConfigPacket::UpdateEnabledFeatures {
            features: vec!["minecraft:vanilla".into()],
        })
        .await?;
    remote
        .send(ClientboundConfigPacket::Common(CommonPacket::CustomPayload {
            channel: BRAND_CHANNEL.into(),
            data: b"ultimate-demo".to_vec(),
        }))
        .await?;
    remote.send(ClientboundConfigPacket::FinishConfiguration).await?;
    remote.expect(|p| *p == ServerboundPacket::FinishConfiguration).await?;

    // ── Play: join and stream the world ─────────────────────────────────
    remote
        .send(ClientboundGamePacket::Login(JoinGame {
            entity_id: 1,
            dimension_type: DEMO_DIMENSION_TYPE.into(),
            dimension: DEMO_DIMENSION.into(),
            view_distance: DEMO_VIEW_DISTANCE,
            simulation_distance: DEMO_VIEW_DISTANCE,
        }))
        .await?;
    remote
        .send(ClientboundGamePacket::PlayerPosition {
            teleport_id: 1,
            pos: BlockPos::new(8, SURFACE_Y + 1, 8).bottom_center(),
        })
        .await?;
    remote
        .send(ClientboundGamePacket::SetChunkCacheCenter { pos: ChunkPos::new(0, 0) })
        .await?;

    let radius = DEMO_VIEW_DISTANCE as i32;
    remote.send(ClientboundGamePacket::ChunkBatchStart).await?;
    let mut batch_size = 0;
    for x in -radius..=radius {
        for z in -radius..=radius {
            remote
                .send(ClientboundGamePacket::LevelChunkWithLight {
                    pos: ChunkPos::new(x, z),
                    payload: flat_chunk_payload(),
                    light: flat_light(),
                })
                .await?;
            batch_size += 1;
        }
    }
    remote
        .send(ClientboundGamePacket::ChunkBatchFinished { batch_size })
        .await?;
    remote
        .expect(|p| matches!(p, ServerboundPacket::ChunkBatchReceived { .. }))
        .await?;

    // Far outside the window: the client drops it.
    remote
        .send(ClientboundGamePacket::LevelChunkWithLight {
            pos: ChunkPos::new(40, 40),
            payload: flat_chunk_payload(),
            light: LightData::default(),
        })
        .await?;

    // ── Play: predicted edits ───────────────────────────────────────────
    let grass = BlockPos::new(8, SURFACE_Y, 8);
    let ServerboundPacket::PlayerAction { sequence, .. } =
        player_edit(&mut remote, &player, LocalAction::Break { pos: grass }).await?
    else {
        bail!("expected PlayerAction");
    };
    remote
        .send(ClientboundGamePacket::BlockUpdate { pos: grass, state: BlockId::AIR })
        .await?;
    remote.send(ClientboundGamePacket::BlockChangedAck { sequence }).await?;

    // Accepted placement, with a stale update in flight ahead of the real one.
    let planks = BlockPos::new(8, SURFACE_Y + 1, 9);
    let ServerboundPacket::PlayerAction { sequence, .. } = player_edit(
        &mut remote,
        &player,
        LocalAction::Place { pos: planks, state: block::OAK_PLANKS },
    )
    .await?
    else {
        bail!("expected PlayerAction");
    };
    remote
        .send(ClientboundGamePacket::BlockUpdate { pos: planks, state: BlockId::AIR })
        .await?;
    remote
        .send(ClientboundGamePacket::BlockUpdate { pos: planks, state: block::OAK_PLANKS })
        .await?;
    remote.send(ClientboundGamePacket::BlockChangedAck { sequence }).await?;

    // Rejected placement: acked without an update, so the client rolls back.
    let rejected = BlockPos::new(9, SURFACE_Y + 1, 9);
    let ServerboundPacket::PlayerAction { sequence, .. } = player_edit(
        &mut remote,
        &player,
        LocalAction::Place { pos: rejected, state: block::STONE },
    )
    .await?
    else {
        bail!("expected PlayerAction");
    };
    remote.send(ClientboundGamePacket::BlockChangedAck { sequence }).await?;

    // ── Play: move the window and shrink it ─────────────────────────────
    remote
        .send(ClientboundGamePacket::SetChunkCacheCenter { pos: ChunkPos::new(3, 0) })
        .await?;
    remote
        .send(ClientboundGamePacket::SetChunkCacheRadius { radius: 2 })
        .await?;
    remote
        .send(ClientboundGamePacket::ForgetLevelChunk { pos: ChunkPos::new(4, 4) })
        .await?;

    remote
        .send(ClientboundGamePacket::Common(CommonPacket::Disconnect {
            reason: "Demo finished".into(),
        }))
        .await?;
    Ok(())
}

/// Counts what the cache reports to its collaborators.
#[derive(Debug, Default)]
pub struct CountingObserver {
    pub loaded: AtomicUsize,
    pub unloaded: AtomicUsize,
    pub lit: AtomicUsize,
    pub sections_filled: AtomicUsize,
}

impl ChunkObserver for CountingObserver {
    fn on_chunk_loaded(&self, _pos: ChunkPos) {
        self.loaded.fetch_add(1, Ordering::Relaxed);
    }

    fn on_chunk_unloaded(&self, chunk: &Chunk) {
        tracing::trace!("Unloaded {:?}", chunk.pos());
        self.unloaded.fetch_add(1, Ordering::Relaxed);
    }

    fn on_section_becoming_non_empty(&self, _section: SectionPos) {
        self.sections_filled.fetch_add(1, Ordering::Relaxed);
    }

    fn on_light_data(&self, _pos: ChunkPos, _light: &LightData) {
        self.lit.fetch_add(1, Ordering::Relaxed);
    }
}

/// Run a full session against [`scripted_server`].
pub async fn run_demo(config: ClientConfig) -> Result<SessionEnd> {
    let (conn, remote) = Connection::pair(DEFAULT_BUFFER);
    let (player, input) = mpsc::channel(16);
    let server = tokio::spawn(scripted_server(remote, player));

    let observer = Arc::new(CountingObserver::default());
    let mut driver = Driver::new(conn, config, observer.clone(), input);
    let end = driver.run().await?;
    server.await.context("demo server task failed")??;

    tracing::info!(
        "Observer saw {} loads, {} unloads, {} light columns",
        observer.loaded.load(Ordering::Relaxed),
        observer.unloaded.load(Ordering::Relaxed),
        observer.lit.load(Ordering::Relaxed)
    );
    Ok(end)
}
