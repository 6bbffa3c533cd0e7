use std::sync::Arc;

use anyhow::Result;
use tokio::sync::mpsc;
use ultimate_mirror::cache::ChunkObserver;
use ultimate_mirror::pacing::ChunkBatchPacer;

use super::configuration::handle_configuration;
use super::connection::Connection;
use super::login::handle_login;
use super::play::{LocalAction, PlayState, handle_play};
use super::{DisconnectReason, PhaseExit};
use crate::config::ClientConfig;
use crate::protocol::phase::ConnectionPhase;
use crate::session::SessionCookie;
use crate::stats::{ClientStats, StatsSnapshot};

/// How a session ended, with the counters as they stood just before the
/// world was torn down.
#[derive(Debug, Clone)]
pub struct SessionEnd {
    pub reason: DisconnectReason,
    pub stats: StatsSnapshot,
}

/// Runs one connection through its phases until it ends.
pub struct Driver {
    conn: Connection,
    config: ClientConfig,
    session: SessionCookie,
    play: PlayState,
    stats: Arc<ClientStats>,
    input: mpsc::Receiver<LocalAction>,
}

impl Driver {
    pub fn new(
        conn: Connection,
        config: ClientConfig,
        observer: Arc<dyn ChunkObserver>,
        input: mpsc::Receiver<LocalAction>,
    ) -> Self {
        let stats = Arc::new(ClientStats::new());
        let pacer = ChunkBatchPacer::with_target(config.target_nanos_per_tick);
        Self {
            conn,
            session: SessionCookie::offline(&config.username),
            play: PlayState::new(pacer, Arc::clone(&stats), observer),
            stats,
            config,
            input,
        }
    }

    pub fn phase(&self) -> ConnectionPhase {
        self.conn.phase()
    }

    pub fn session(&self) -> &SessionCookie {
        &self.session
    }

    pub fn play(&self) -> &PlayState {
        &self.play
    }

    pub fn stats(&self) -> Arc<ClientStats> {
        Arc::clone(&self.stats)
    }

    /// Drive the connection to its end. Protocol violations come back as
    /// `Err`; either way the world is reset and the phase is `Disconnected`.
    pub async fn run(&mut self) -> Result<SessionEnd> {
        let result = self.run_phases().await;
        let stats = self.play.snapshot();
        self.play.reset();
        if self.conn.phase() != ConnectionPhase::Disconnected {
            self.conn.transition(ConnectionPhase::Disconnected)?;
        }
        let reason = result?;
        tracing::info!("Session ended: {}", reason);
        Ok(SessionEnd { reason, stats })
    }

    async fn run_phases(&mut self) -> Result<DisconnectReason> {
        if let PhaseExit::Disconnected(reason) =
            handle_login(&mut self.conn, &self.config, &mut self.session).await?
        {
            return Ok(reason);
        }
        loop {
            if let PhaseExit::Disconnected(reason) =
                handle_configuration(&mut self.conn, &self.config, &mut self.session).await?
            {
                return Ok(reason);
            }
            if let PhaseExit::Disconnected(reason) = handle_play(
                &mut self.conn,
                &self.config,
                &mut self.session,
                &mut self.play,
                &mut self.input,
            )
            .await?
            {
                return Ok(reason);
            }
        }
    }
}
