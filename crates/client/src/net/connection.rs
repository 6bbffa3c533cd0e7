//! The client's end of a decoded packet stream.
//!
//! The network task owns the socket and the codec; this side only sees
//! [`Clientbound`] values coming in and [`ServerboundPacket`] values going
//! out, plus the phase the stream is in.

use anyhow::{Result, anyhow, bail};
use tokio::sync::mpsc;

use crate::protocol::packets::{Clientbound, ServerboundPacket};
use crate::protocol::phase::ConnectionPhase;

/// Channel depth used by [`Connection::pair`].
pub const DEFAULT_BUFFER: usize = 1024;

pub struct Connection {
    inbound: mpsc::Receiver<Clientbound>,
    outbound: mpsc::Sender<ServerboundPacket>,
    phase: ConnectionPhase,
}

impl Connection {
    pub fn new(inbound: mpsc::Receiver<Clientbound>, outbound: mpsc::Sender<ServerboundPacket>) -> Self {
        Self {
            inbound,
            outbound,
            phase: ConnectionPhase::Handshake,
        }
    }

    /// An in-memory connection and the remote end that feeds it.
    pub fn pair(buffer: usize) -> (Connection, RemoteEnd) {
        let (to_client, inbound) = mpsc::channel(buffer);
        let (outbound, from_client) = mpsc::channel(buffer);
        (
            Connection::new(inbound, outbound),
            RemoteEnd {
                tx: to_client,
                rx: from_client,
            },
        )
    }

    pub fn phase(&self) -> ConnectionPhase {
        self.phase
    }

    pub fn transition(&mut self, next: ConnectionPhase) -> Result<()> {
        if !self.phase.can_transition_to(next) {
            bail!("Illegal phase transition {} -> {}", self.phase, next);
        }
        tracing::debug!("Connection phase {} -> {}", self.phase, next);
        self.phase = next;
        Ok(())
    }

    pub async fn send(&self, packet: ServerboundPacket) -> Result<()> {
        self.outbound
            .send(packet)
            .await
            .map_err(|_| anyhow!("Outbound channel closed during {}", self.phase))
    }

    /// Next packet from the server, or `None` once the transport has closed.
    /// A packet from another phase's table is a protocol violation.
    pub async fn recv(&mut self) -> Result<Option<Clientbound>> {
        let Some(packet) = self.inbound.recv().await else {
            return Ok(None);
        };
        if !self.phase.receives_packets() || packet.phase() != self.phase {
            bail!("Received {} packet during {}: {:?}", packet.phase(), self.phase, packet);
        }
        Ok(Some(packet))
    }
}

/// The far side of an in-memory [`Connection`]: what a network task (or a
/// scripted test server) holds.
pub struct RemoteEnd {
    tx: mpsc::Sender<Clientbound>,
    rx: mpsc::Receiver<ServerboundPacket>,
}

impl RemoteEnd {
    pub async fn send(&self, packet: impl Into<Clientbound>) -> Result<()> {
        self.tx
            .send(packet.into())
            .await
            .map_err(|_| anyhow!("Client side of the connection is gone"))
    }

    pub async fn recv(&mut self) -> Option<ServerboundPacket> {
        self.rx.recv().await
    }

    /// Skip client packets until one satisfies `wanted`.
    pub async fn expect<F>(&mut self, mut wanted: F) -> Result<ServerboundPacket>
    where
        F: FnMut(&ServerboundPacket) -> bool,
    {
        while let Some(packet) = self.rx.recv().await {
            if wanted(&packet) {
                return Ok(packet);
            }
            tracing::trace!("Remote skipping {:?}", packet);
        }
        Err(anyhow!("Client closed the connection"))
    }
}
