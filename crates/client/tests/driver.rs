//! Whole-session tests: the driver on one side of an in-memory connection,
//! the test playing the server on the other.

use std::sync::Arc;
use std::sync::atomic::Ordering;

use anyhow::Result;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use ultimate_client::block;
use ultimate_client::config::ClientConfig;
use ultimate_client::demo::{self, CountingObserver, flat_chunk_payload};
use ultimate_client::net::DisconnectReason;
use ultimate_client::net::connection::{Connection, RemoteEnd};
use ultimate_client::net::driver::{Driver, SessionEnd};
use ultimate_client::net::play::LocalAction;
use ultimate_client::protocol::packets::{
    BlockAction, ClientboundConfigPacket, ClientboundGamePacket, ClientboundLoginPacket, CommonPacket,
    GameProfile, JoinGame, ServerboundPacket,
};
use ultimate_client::protocol::phase::ConnectionPhase;
use ultimate_client::session::offline_uuid;
use ultimate_mirror::light::LightData;
use ultimate_mirror::prediction::Sequence;
use ultimate_mirror::world::block::BlockId;
use ultimate_mirror::world::position::{BlockPos, ChunkPos};

struct Harness {
    remote: RemoteEnd,
    player: mpsc::Sender<LocalAction>,
    observer: Arc<CountingObserver>,
    driver: JoinHandle<(Driver, Result<SessionEnd>)>,
}

fn start() -> Harness {
    let (conn, remote) = Connection::pair(256);
    let (player, input) = mpsc::channel(8);
    let observer = Arc::new(CountingObserver::default());
    let config = ClientConfig {
        username: "Tester".into(),
        tick_interval_ms: 5,
        ..ClientConfig::default()
    };
    let mut driver = Driver::new(conn, config, observer.clone(), input);
    let driver = tokio::spawn(async move {
        let result = driver.run().await;
        (driver, result)
    });
    Harness {
        remote,
        player,
        observer,
        driver,
    }
}

async fn login(remote: &mut RemoteEnd) {
    let hello = remote
        .expect(|p| matches!(p, ServerboundPacket::Hello { .. }))
        .await
        .unwrap();
    let ServerboundPacket::Hello { name, profile_id } = hello else {
        unreachable!()
    };
    assert_eq!(profile_id, offline_uuid(&name));
    remote
        .send(ClientboundLoginPacket::LoginFinished {
            profile: GameProfile { uuid: profile_id, name },
        })
        .await
        .unwrap();
    remote
        .expect(|p| *p == ServerboundPacket::LoginAcknowledged)
        .await
        .unwrap();
}

async fn configure(remote: &mut RemoteEnd) {
    for (registry_id, entries) in demo::registries() {
        remote
            .send(ClientboundConfigPacket::RegistryData { registry_id, entries })
            .await
            .unwrap();
    }
    remote.send(ClientboundConfigPacket::FinishConfiguration).await.unwrap();
    remote
        .expect(|p| *p == ServerboundPacket::FinishConfiguration)
        .await
        .unwrap();
}

async fn join(remote: &RemoteEnd, dimension_type: &str, dimension: &str) {
    remote
        .send(ClientboundGamePacket::Login(JoinGame {
            entity_id: 7,
            dimension_type: dimension_type.into(),
            dimension: dimension.into(),
            view_distance: 4,
            simulation_distance: 4,
        }))
        .await
        .unwrap();
}

async fn send_chunk(remote: &RemoteEnd, x: i32, z: i32) {
    remote
        .send(ClientboundGamePacket::LevelChunkWithLight {
            pos: ChunkPos::new(x, z),
            payload: flat_chunk_payload(),
            light: LightData::default(),
        })
        .await
        .unwrap();
}

/// Round-trip a ping so everything sent before it has been handled.
async fn sync(remote: &mut RemoteEnd, id: u32) {
    remote
        .send(ClientboundGamePacket::Common(CommonPacket::Ping { id }))
        .await
        .unwrap();
    remote
        .expect(|p| *p == ServerboundPacket::Pong { id })
        .await
        .unwrap();
}

async fn disconnect(remote: &RemoteEnd) {
    remote
        .send(ClientboundGamePacket::Common(CommonPacket::Disconnect {
            reason: "bye".into(),
        }))
        .await
        .unwrap();
}

// ---------------------------------------------------------------------------
// Full scripted session
// ---------------------------------------------------------------------------

#[tokio::test]
async fn demo_session_reports_expected_counters() {
    let config = ClientConfig {
        tick_interval_ms: 5,
        ..ClientConfig::default()
    };
    let end = demo::run_demo(config).await.unwrap();

    assert_eq!(end.reason, DisconnectReason::Server("Demo finished".into()));
    let stats = end.stats;
    assert_eq!(stats.chunks_received, 81);
    assert_eq!(stats.chunks_ignored, 1);
    assert_eq!(stats.chunks_dropped, 1);
    assert_eq!(stats.batches_finished, 1);
    assert_eq!(stats.predictions_issued, 3);
    assert_eq!(stats.acks_received, 3);
    assert_eq!(stats.corrections, 1);
    assert_eq!(stats.block_updates, 3);
    assert_eq!(stats.cache_capacity, 121);
    // 81 streamed, 18 left the window on shrink, 1 forgotten.
    assert_eq!(stats.chunks_loaded, 62);
}

#[tokio::test]
async fn scripted_session_records_session_and_unloads_everything() {
    let Harness {
        remote,
        player,
        observer,
        driver,
    } = start();
    let server = tokio::spawn(demo::scripted_server(remote, player));

    let (driver, result) = driver.await.unwrap();
    server.await.unwrap().unwrap();
    result.unwrap();

    assert_eq!(driver.phase(), ConnectionPhase::Disconnected);
    let session = driver.session();
    assert_eq!(session.server_brand.as_deref(), Some("ultimate-demo"));
    assert_eq!(session.known_packs.len(), 1);
    assert_eq!(session.enabled_features, vec!["minecraft:vanilla".to_string()]);
    assert_eq!(session.registries.len(), 2);
    assert!(driver.play().level().is_none());

    assert_eq!(observer.loaded.load(Ordering::Relaxed), 81);
    assert_eq!(observer.unloaded.load(Ordering::Relaxed), 81);
}

// ---------------------------------------------------------------------------
// Phases
// ---------------------------------------------------------------------------

#[tokio::test]
async fn closed_transport_ends_session_cleanly() {
    let mut h = start();
    login(&mut h.remote).await;
    // Let the client finish its opening configuration packets first.
    h.remote
        .expect(|p| matches!(p, ServerboundPacket::CustomPayload { .. }))
        .await
        .unwrap();
    drop(h.remote);

    let (driver, result) = h.driver.await.unwrap();
    assert_eq!(result.unwrap().reason, DisconnectReason::TransportClosed);
    assert_eq!(driver.phase(), ConnectionPhase::Disconnected);
}

#[tokio::test]
async fn login_disconnect_is_reported() {
    let mut h = start();
    h.remote
        .expect(|p| matches!(p, ServerboundPacket::Hello { .. }))
        .await
        .unwrap();
    h.remote
        .send(ClientboundLoginPacket::LoginDisconnect {
            reason: "whitelist".into(),
        })
        .await
        .unwrap();

    let (_, result) = h.driver.await.unwrap();
    assert_eq!(result.unwrap().reason, DisconnectReason::Server("whitelist".into()));
}

#[tokio::test]
async fn play_packet_during_configuration_is_a_protocol_error() {
    let mut h = start();
    login(&mut h.remote).await;
    h.remote.send(ClientboundGamePacket::ChunkBatchStart).await.unwrap();

    let (driver, result) = h.driver.await.unwrap();
    assert!(result.is_err());
    assert_eq!(driver.phase(), ConnectionPhase::Disconnected);
}

#[tokio::test]
async fn join_into_unknown_dimension_type_fails() {
    let mut h = start();
    login(&mut h.remote).await;
    configure(&mut h.remote).await;
    join(&h.remote, "custom:floating_islands", "custom:sky").await;

    let (_, result) = h.driver.await.unwrap();
    let error = result.unwrap_err().to_string();
    assert!(error.contains("custom:floating_islands"), "{}", error);
}

#[tokio::test]
async fn reconfiguration_discards_world_but_keeps_session() {
    let mut h = start();
    login(&mut h.remote).await;
    configure(&mut h.remote).await;
    join(&h.remote, "minecraft:overworld", "minecraft:overworld").await;
    send_chunk(&h.remote, 0, 0).await;
    h.remote
        .send(ClientboundGamePacket::Common(CommonPacket::StoreCookie {
            key: "demo:token".into(),
            payload: vec![1, 2, 3],
        }))
        .await
        .unwrap();

    h.remote.send(ClientboundGamePacket::StartConfiguration).await.unwrap();
    h.remote
        .expect(|p| *p == ServerboundPacket::ConfigurationAcknowledged)
        .await
        .unwrap();
    assert_eq!(h.observer.unloaded.load(Ordering::Relaxed), 1);

    h.remote
        .send(ClientboundConfigPacket::Common(CommonPacket::CookieRequest {
            key: "demo:token".into(),
        }))
        .await
        .unwrap();
    let response = h
        .remote
        .expect(|p| matches!(p, ServerboundPacket::CookieResponse { .. }))
        .await
        .unwrap();
    assert_eq!(
        response,
        ServerboundPacket::CookieResponse {
            key: "demo:token".into(),
            payload: Some(vec![1, 2, 3]),
        }
    );

    h.remote.send(ClientboundConfigPacket::FinishConfiguration).await.unwrap();
    h.remote
        .expect(|p| *p == ServerboundPacket::FinishConfiguration)
        .await
        .unwrap();
    join(&h.remote, "minecraft:overworld", "minecraft:overworld").await;
    disconnect(&h.remote).await;

    let (driver, result) = h.driver.await.unwrap();
    assert_eq!(result.unwrap().reason, DisconnectReason::Server("bye".into()));
    assert_eq!(driver.session().registries.len(), 2);
    assert!(driver.session().server_cookies.contains_key("demo:token"));
}

// ---------------------------------------------------------------------------
// Play
// ---------------------------------------------------------------------------

#[tokio::test]
async fn every_respawn_resets_level_but_not_pacer() {
    let mut h = start();
    login(&mut h.remote).await;
    configure(&mut h.remote).await;
    join(&h.remote, "minecraft:overworld", "minecraft:overworld").await;

    h.remote.send(ClientboundGamePacket::ChunkBatchStart).await.unwrap();
    send_chunk(&h.remote, 0, 0).await;
    h.remote
        .send(ClientboundGamePacket::ChunkBatchFinished { batch_size: 1 })
        .await
        .unwrap();
    let received = h
        .remote
        .expect(|p| matches!(p, ServerboundPacket::ChunkBatchReceived { .. }))
        .await
        .unwrap();
    let ServerboundPacket::ChunkBatchReceived { desired_chunks_per_tick } = received else {
        unreachable!()
    };
    assert!(desired_chunks_per_tick > 0.0);

    h.remote
        .send(ClientboundGamePacket::Respawn {
            dimension_type: "minecraft:the_nether".into(),
            dimension: "minecraft:the_nether".into(),
        })
        .await
        .unwrap();
    send_chunk(&h.remote, 0, 0).await;
    sync(&mut h.remote, 1).await;
    assert_eq!(h.observer.unloaded.load(Ordering::Relaxed), 1);

    // Same dimension: still a fresh level.
    h.remote
        .send(ClientboundGamePacket::Respawn {
            dimension_type: "minecraft:the_nether".into(),
            dimension: "minecraft:the_nether".into(),
        })
        .await
        .unwrap();
    sync(&mut h.remote, 2).await;
    assert_eq!(h.observer.unloaded.load(Ordering::Relaxed), 2);
    disconnect(&h.remote).await;

    let (driver, result) = h.driver.await.unwrap();
    let end = result.unwrap();
    assert_eq!(end.stats.chunks_received, 2);
    assert_eq!(end.stats.chunks_loaded, 0);
    assert_eq!(driver.play().pacer().samples_weight(), 2);
}

#[tokio::test]
async fn respawn_abandons_open_predictions() {
    let mut h = start();
    login(&mut h.remote).await;
    configure(&mut h.remote).await;
    join(&h.remote, "minecraft:overworld", "minecraft:overworld").await;
    send_chunk(&h.remote, 0, 0).await;
    sync(&mut h.remote, 1).await;

    let pos = BlockPos::new(3, demo::SURFACE_Y, 3);
    h.player.send(LocalAction::Break { pos }).await.unwrap();
    let action = h
        .remote
        .expect(|p| matches!(p, ServerboundPacket::PlayerAction { .. }))
        .await
        .unwrap();
    let ServerboundPacket::PlayerAction { sequence, .. } = action else {
        unreachable!()
    };

    h.remote
        .send(ClientboundGamePacket::Respawn {
            dimension_type: "minecraft:overworld".into(),
            dimension: "minecraft:overworld".into(),
        })
        .await
        .unwrap();
    // The ack for the edit lands after the respawn and has nothing to settle.
    h.remote
        .send(ClientboundGamePacket::BlockChangedAck { sequence })
        .await
        .unwrap();
    disconnect(&h.remote).await;

    let (_, result) = h.driver.await.unwrap();
    let stats = result.unwrap().stats;
    assert_eq!(stats.chunks_loaded, 0);
    assert_eq!(stats.acks_received, 1);
    assert_eq!(stats.corrections, 0);
    assert_eq!(h.observer.unloaded.load(Ordering::Relaxed), 1);
}

#[tokio::test]
async fn local_edit_is_sent_with_its_sequence() {
    let mut h = start();
    login(&mut h.remote).await;
    configure(&mut h.remote).await;
    join(&h.remote, "minecraft:overworld", "minecraft:overworld").await;
    send_chunk(&h.remote, 0, 0).await;
    sync(&mut h.remote, 1).await;

    let pos = BlockPos::new(3, demo::SURFACE_Y, 3);
    h.player.send(LocalAction::Break { pos }).await.unwrap();
    let action = h
        .remote
        .expect(|p| matches!(p, ServerboundPacket::PlayerAction { .. }))
        .await
        .unwrap();
    assert_eq!(
        action,
        ServerboundPacket::PlayerAction {
            action: BlockAction::StartDestroyBlock,
            pos,
            state: BlockId::AIR,
            sequence: Sequence(1),
        }
    );

    h.player
        .send(LocalAction::Place { pos, state: block::DIRT })
        .await
        .unwrap();
    let action = h
        .remote
        .expect(|p| matches!(p, ServerboundPacket::PlayerAction { .. }))
        .await
        .unwrap();
    let ServerboundPacket::PlayerAction { sequence, .. } = action else {
        unreachable!()
    };
    assert_eq!(sequence, Sequence(2));

    // The server only confirms the break; the placement rolls back to air.
    h.remote
        .send(ClientboundGamePacket::BlockUpdate { pos, state: BlockId::AIR })
        .await
        .unwrap();
    h.remote
        .send(ClientboundGamePacket::BlockChangedAck { sequence: Sequence(2) })
        .await
        .unwrap();
    disconnect(&h.remote).await;

    let (_, result) = h.driver.await.unwrap();
    let stats = result.unwrap().stats;
    assert_eq!(stats.predictions_issued, 2);
    assert_eq!(stats.corrections, 1);
}

#[tokio::test]
async fn keep_alive_and_teleport_are_answered() {
    let mut h = start();
    login(&mut h.remote).await;
    configure(&mut h.remote).await;
    join(&h.remote, "minecraft:overworld", "minecraft:overworld").await;

    h.remote
        .send(ClientboundGamePacket::Common(CommonPacket::KeepAlive { id: 99 }))
        .await
        .unwrap();
    h.remote
        .expect(|p| *p == ServerboundPacket::KeepAlive { id: 99 })
        .await
        .unwrap();
    h.remote
        .send(ClientboundGamePacket::PlayerPosition {
            teleport_id: 5,
            pos: ultimate_mirror::world::position::Vec3::new(0.5, 80.0, 0.5),
        })
        .await
        .unwrap();
    h.remote
        .expect(|p| *p == ServerboundPacket::AcceptTeleportation { teleport_id: 5 })
        .await
        .unwrap();
    disconnect(&h.remote).await;
    let (_, result) = h.driver.await.unwrap();
    result.unwrap();
}
