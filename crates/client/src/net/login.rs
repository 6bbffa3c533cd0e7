use anyhow::{Result, bail};

use super::connection::Connection;
use super::{DisconnectReason, PhaseExit};
use crate::config::ClientConfig;
use crate::protocol::packets::{Clientbound, ClientboundLoginPacket, ClientIntention, ServerboundPacket};
use crate::protocol::phase::ConnectionPhase;
use crate::protocol::PROTOCOL_VERSION;
use crate::session::SessionCookie;

/// Handshake and login. Ends in configuration once the server accepts the
/// profile. Offline mode only: no encryption request is expected.
pub async fn handle_login(
    conn: &mut Connection,
    config: &ClientConfig,
    session: &mut SessionCookie,
) -> Result<PhaseExit> {
    let (host, port) = config.host_and_port();
    conn.send(ServerboundPacket::Intention {
        protocol_version: PROTOCOL_VERSION,
        host,
        port,
        intention: ClientIntention::Login,
    })
    .await?;
    conn.transition(ConnectionPhase::Login)?;

    conn.send(ServerboundPacket::Hello {
        name: session.profile.name.clone(),
        profile_id: session.profile.uuid,
    })
    .await?;

    loop {
        let Some(packet) = conn.recv().await? else {
            return Ok(PhaseExit::Disconnected(DisconnectReason::TransportClosed));
        };
        let packet = match packet {
            Clientbound::Login(packet) => packet,
            other => bail!("Expected a login packet, got: {:?}", other),
        };
        match packet {
            ClientboundLoginPacket::LoginCompression { threshold } => {
                tracing::debug!("Compression threshold {}", threshold);
                session.compression_threshold = (threshold >= 0).then_some(threshold);
            }
            ClientboundLoginPacket::CookieRequest { key } => {
                let payload = session.server_cookies.get(&key).cloned();
                conn.send(ServerboundPacket::CookieResponse { key, payload }).await?;
            }
            ClientboundLoginPacket::CustomQuery { transaction_id, identifier } => {
                tracing::debug!("Declining login query {} on {}", transaction_id, identifier);
                conn.send(ServerboundPacket::CustomQueryAnswer {
                    transaction_id,
                    data: None,
                })
                .await?;
            }
            ClientboundLoginPacket::LoginFinished { profile } => {
                tracing::info!("Login: {} (uuid: {})", profile.name, profile.uuid);
                session.profile = profile;
                conn.send(ServerboundPacket::LoginAcknowledged).await?;
                conn.transition(ConnectionPhase::Configuration)?;
                return Ok(PhaseExit::Advance);
            }
            ClientboundLoginPacket::LoginDisconnect { reason } => {
                return Ok(PhaseExit::Disconnected(DisconnectReason::Server(reason)));
            }
        }
    }
}
