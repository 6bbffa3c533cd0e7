//! The play phase: world packets into the mirror, local actions out as
//! predicted edits, and a fixed-rate tick for deferred light work.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Result, bail};
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use ultimate_mirror::cache::ChunkObserver;
use ultimate_mirror::level::ClientLevel;
use ultimate_mirror::pacing::ChunkBatchPacer;
use ultimate_mirror::world::block::BlockId;
use ultimate_mirror::world::position::BlockPos;

use super::common::handle_common;
use super::connection::Connection;
use super::{DisconnectReason, PhaseExit};
use crate::config::ClientConfig;
use crate::protocol::packets::{BlockAction, Clientbound, ClientboundGamePacket, ServerboundPacket};
use crate::protocol::phase::ConnectionPhase;
use crate::session::SessionCookie;
use crate::stats::{ClientStats, StatsSnapshot};

/// A block edit requested by the player.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalAction {
    Break { pos: BlockPos },
    Place { pos: BlockPos, state: BlockId },
}

/// Everything play needs that outlives a single packet. The level goes away
/// on every hard reset; the pacer stays for the whole connection.
pub struct PlayState {
    level: Option<ClientLevel>,
    dimension: Option<String>,
    view_distance: u32,
    pacer: ChunkBatchPacer,
    stats: Arc<ClientStats>,
    observer: Arc<dyn ChunkObserver>,
}

impl PlayState {
    pub fn new(pacer: ChunkBatchPacer, stats: Arc<ClientStats>, observer: Arc<dyn ChunkObserver>) -> Self {
        Self {
            level: None,
            dimension: None,
            view_distance: 0,
            pacer,
            stats,
            observer,
        }
    }

    pub fn level(&self) -> Option<&ClientLevel> {
        self.level.as_ref()
    }

    pub fn pacer(&self) -> &ChunkBatchPacer {
        &self.pacer
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        self.stats.snapshot(self.level.as_ref(), &self.pacer)
    }

    /// Enter `dimension`, replacing any current level.
    fn join(
        &mut self,
        session: &SessionCookie,
        dimension_type: &str,
        dimension: String,
        view_distance: u32,
    ) -> Result<()> {
        let Some(height) = session.dimension_height(dimension_type) else {
            bail!("Dimension type {} is not in the received registries", dimension_type);
        };
        self.reset();
        tracing::info!(
            "Entering {} ({}): min_y {}, height {}, view distance {}",
            dimension,
            dimension_type,
            height.min_y,
            height.height,
            view_distance
        );
        self.level = Some(ClientLevel::new(view_distance, height, Arc::clone(&self.observer)));
        self.dimension = Some(dimension);
        self.view_distance = view_distance;
        Ok(())
    }

    /// Session reset: unload every chunk and abandon open predictions. The
    /// pacer is left alone.
    pub fn reset(&mut self) {
        if let Some(mut level) = self.level.take() {
            level.reset();
        }
        if let Some(dimension) = self.dimension.take() {
            tracing::debug!("Left {}", dimension);
        }
    }

    fn tick(&mut self) {
        if let Some(level) = self.level.as_mut() {
            let ran = level.tick();
            if ran > 0 {
                self.stats.light_updates_drained(ran as u64);
            }
        }
    }
}

pub async fn handle_play(
    conn: &mut Connection,
    config: &ClientConfig,
    session: &mut SessionCookie,
    play: &mut PlayState,
    input: &mut mpsc::Receiver<LocalAction>,
) -> Result<PhaseExit> {
    let mut tick = tokio::time::interval(Duration::from_millis(config.tick_interval_ms.max(1)));
    tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut input_open = true;

    loop {
        tokio::select! {
            _ = tick.tick() => play.tick(),
            action = input.recv(), if input_open => match action {
                Some(action) => apply_local_action(conn, play, action).await?,
                None => {
                    tracing::debug!("Input channel closed");
                    input_open = false;
                }
            },
            packet = conn.recv() => {
                let Some(packet) = packet? else {
                    return Ok(PhaseExit::Disconnected(DisconnectReason::TransportClosed));
                };
                let packet = match packet {
                    Clientbound::Game(packet) => packet,
                    other => bail!("Expected a play packet, got: {:?}", other),
                };
                if let Some(exit) = handle_game_packet(conn, session, play, packet).await? {
                    return Ok(exit);
                }
            }
        }
    }
}

/// Apply a player edit at once and tell the server, stamped with the
/// prediction sequence it was made under.
async fn apply_local_action(conn: &Connection, play: &mut PlayState, action: LocalAction) -> Result<()> {
    let Some(level) = play.level.as_mut() else {
        tracing::debug!("Dropping {:?}: not in a level", action);
        return Ok(());
    };
    let (kind, pos, state) = match action {
        LocalAction::Break { pos } => (BlockAction::StartDestroyBlock, pos, BlockId::AIR),
        LocalAction::Place { pos, state } => (BlockAction::UseItemOn, pos, state),
    };
    let sequence = {
        let mut scope = level.start_predicting();
        scope.apply_local_edit(pos, state);
        scope.sequence()
    };
    play.stats.prediction_issued();
    conn.send(ServerboundPacket::PlayerAction {
        action: kind,
        pos,
        state,
        sequence,
    })
    .await
}

fn joined<'a>(level: &'a mut Option<ClientLevel>, what: &str) -> Option<&'a mut ClientLevel> {
    if level.is_none() {
        tracing::warn!("Ignoring {} before joining a level", what);
    }
    level.as_mut()
}

async fn handle_game_packet(
    conn: &mut Connection,
    session: &mut SessionCookie,
    play: &mut PlayState,
    packet: ClientboundGamePacket,
) -> Result<Option<PhaseExit>> {
    match packet {
        ClientboundGamePacket::Common(common) => {
            if let Some(reason) = handle_common(conn, session, common).await? {
                return Ok(Some(PhaseExit::Disconnected(reason)));
            }
        }
        ClientboundGamePacket::Login(join) => {
            tracing::info!("{} joined as entity {}", session.profile.name, join.entity_id);
            play.join(session, &join.dimension_type, join.dimension, join.view_distance)?;
        }
        ClientboundGamePacket::Respawn { dimension_type, dimension } => {
            // Same dimension or not, the old world and its open predictions go.
            let view_distance = play.view_distance;
            play.join(session, &dimension_type, dimension, view_distance)?;
        }
        ClientboundGamePacket::LevelChunkWithLight { pos, payload, light } => {
            if let Some(level) = joined(&mut play.level, "chunk data") {
                if level.cache().replace_with_packet_data(pos, payload).is_some() {
                    level.enqueue_light_data(pos, light);
                    play.stats.chunk_received();
                } else {
                    play.stats.chunk_ignored();
                }
            }
        }
        ClientboundGamePacket::ForgetLevelChunk { pos } => {
            if let Some(level) = joined(&mut play.level, "chunk unload") {
                if level.cache().drop_chunk(pos) {
                    play.stats.chunk_dropped();
                }
            }
        }
        ClientboundGamePacket::ChunksBiomes { chunks } => {
            if let Some(level) = joined(&mut play.level, "biome update") {
                for (pos, biomes) in &chunks {
                    level.cache().replace_biomes(*pos, biomes);
                }
            }
        }
        ClientboundGamePacket::BlockUpdate { pos, state } => {
            if let Some(level) = joined(&mut play.level, "block update") {
                level.set_server_verified_block_state(pos, state, None);
                play.stats.block_updates(1);
            }
        }
        ClientboundGamePacket::SectionBlocksUpdate { changes } => {
            if let Some(level) = joined(&mut play.level, "section update") {
                level.apply_section_update(&changes, None);
                play.stats.block_updates(changes.len() as u64);
            }
        }
        ClientboundGamePacket::BlockChangedAck { sequence } => {
            if let Some(level) = joined(&mut play.level, "block ack") {
                let corrections = level.handle_block_changed_ack(sequence);
                for correction in &corrections {
                    tracing::debug!(
                        "Server kept {:?} at ({}, {}, {})",
                        correction.server_state,
                        correction.pos.x,
                        correction.pos.y,
                        correction.pos.z
                    );
                }
                play.stats.ack_received(corrections.len() as u64);
            }
        }
        ClientboundGamePacket::LightUpdate { pos, light } => {
            if let Some(level) = joined(&mut play.level, "light update") {
                level.enqueue_light_data(pos, light);
            }
        }
        ClientboundGamePacket::ChunkBatchStart => {
            play.pacer.on_batch_start();
        }
        ClientboundGamePacket::ChunkBatchFinished { batch_size } => {
            play.pacer.on_batch_finished(batch_size);
            play.stats.batch_finished();
            let desired_chunks_per_tick = play.pacer.desired_chunks_per_tick();
            tracing::debug!(
                "Batch of {} done, asking for {:.2} chunks per tick",
                batch_size,
                desired_chunks_per_tick
            );
            conn.send(ServerboundPacket::ChunkBatchReceived { desired_chunks_per_tick }).await?;
        }
        ClientboundGamePacket::SetChunkCacheCenter { pos } => {
            if let Some(level) = joined(&mut play.level, "view center") {
                level.cache().update_view_center(pos);
            }
        }
        ClientboundGamePacket::SetChunkCacheRadius { radius } => {
            play.view_distance = radius;
            if let Some(level) = joined(&mut play.level, "view radius") {
                level.cache().update_view_radius(radius);
            }
        }
        ClientboundGamePacket::PlayerPosition { teleport_id, pos } => {
            if let Some(level) = play.level.as_mut() {
                level.set_player_position(pos);
            }
            conn.send(ServerboundPacket::AcceptTeleportation { teleport_id }).await?;
        }
        ClientboundGamePacket::PlayerInfoUpdate { players } => {
            for profile in players {
                session.seen_players.insert(profile.uuid, profile.name);
            }
        }
        ClientboundGamePacket::StartConfiguration => {
            tracing::info!("Server requested reconfiguration");
            play.reset();
            conn.send(ServerboundPacket::ConfigurationAcknowledged).await?;
            conn.transition(ConnectionPhase::Configuration)?;
            return Ok(Some(PhaseExit::Advance));
        }
    }
    Ok(None)
}
