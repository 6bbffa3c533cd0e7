//! Packets handled the same way in configuration and play.

use anyhow::Result;

use super::DisconnectReason;
use super::connection::Connection;
use crate::protocol::packets::{CommonPacket, ServerboundPacket};
use crate::session::{BRAND_CHANNEL, SessionCookie};

/// Answer a shared packet. Returns the reason if it ended the session.
pub async fn handle_common(
    conn: &Connection,
    session: &mut SessionCookie,
    packet: CommonPacket,
) -> Result<Option<DisconnectReason>> {
    match packet {
        CommonPacket::KeepAlive { id } => {
            conn.send(ServerboundPacket::KeepAlive { id }).await?;
        }
        CommonPacket::Ping { id } => {
            conn.send(ServerboundPacket::Pong { id }).await?;
        }
        CommonPacket::CookieRequest { key } => {
            let payload = session.server_cookies.get(&key).cloned();
            conn.send(ServerboundPacket::CookieResponse { key, payload }).await?;
        }
        CommonPacket::StoreCookie { key, payload } => {
            tracing::debug!("Server stored cookie {} ({} bytes)", key, payload.len());
            session.server_cookies.insert(key, payload);
        }
        CommonPacket::CustomPayload { channel, data } => {
            if channel == BRAND_CHANNEL {
                let brand = String::from_utf8_lossy(&data).into_owned();
                tracing::info!("Server brand: {}", brand);
                session.server_brand = Some(brand);
            } else {
                tracing::debug!("Ignoring custom payload on {} ({} bytes)", channel, data.len());
            }
        }
        CommonPacket::Disconnect { reason } => {
            return Ok(Some(DisconnectReason::Server(reason)));
        }
    }
    Ok(None)
}
