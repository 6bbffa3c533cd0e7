use anyhow::{Result, bail};

use super::common::handle_common;
use super::connection::Connection;
use super::{DisconnectReason, PhaseExit};
use crate::config::ClientConfig;
use crate::protocol::packets::{Clientbound, ClientboundConfigPacket, KnownPack, ServerboundPacket};
use crate::protocol::phase::ConnectionPhase;
use crate::session::{BRAND_CHANNEL, SessionCookie};

/// Packs this client ships locally: `(namespace, id)`.
const LOCAL_PACKS: &[(&str, &str)] = &[("minecraft", "core")];

/// Run one configuration phase, either right after login or when the server
/// pulls a playing client back. Ends in play once the server finishes.
pub async fn handle_configuration(
    conn: &mut Connection,
    config: &ClientConfig,
    session: &mut SessionCookie,
) -> Result<PhaseExit> {
    conn.send(ServerboundPacket::ClientInformation {
        view_distance: config.view_distance,
    })
    .await?;
    conn.send(ServerboundPacket::CustomPayload {
        channel: BRAND_CHANNEL.into(),
        data: config.brand.as_bytes().to_vec(),
    })
    .await?;

    loop {
        let Some(packet) = conn.recv().await? else {
            return Ok(PhaseExit::Disconnected(DisconnectReason::TransportClosed));
        };
        let packet = match packet {
            Clientbound::Config(packet) => packet,
            other => bail!("Expected a configuration packet, got: {:?}", other),
        };
        match packet {
            ClientboundConfigPacket::Common(common) => {
                if let Some(reason) = handle_common(conn, session, common).await? {
                    return Ok(PhaseExit::Disconnected(reason));
                }
            }
            ClientboundConfigPacket::RegistryData { registry_id, entries } => {
                tracing::debug!("Registry {}: {} entries", registry_id, entries.len());
                session.registries.insert(registry_id, entries);
            }
            ClientboundConfigPacket::UpdateEnabledFeatures { features } => {
                tracing::debug!("Enabled features: {:?}", features);
                session.enabled_features = features;
            }
            ClientboundConfigPacket::UpdateTags { tags } => {
                for (registry_id, registry_tags) in tags {
                    session.tags.insert(registry_id, registry_tags);
                }
            }
            ClientboundConfigPacket::SelectKnownPacks { known_packs } => {
                let shared = select_known_packs(known_packs);
                tracing::debug!("Sharing {} known packs with the server", shared.len());
                session.known_packs = shared.clone();
                conn.send(ServerboundPacket::SelectKnownPacks { known_packs: shared }).await?;
            }
            ClientboundConfigPacket::ResetChat => {
                session.chat_session = None;
            }
            ClientboundConfigPacket::FinishConfiguration => {
                tracing::debug!(
                    "Configuration finished: {} registries, brand {:?}",
                    session.registries.len(),
                    session.server_brand
                );
                conn.send(ServerboundPacket::FinishConfiguration).await?;
                conn.transition(ConnectionPhase::Play)?;
                return Ok(PhaseExit::Advance);
            }
        }
    }
}

/// The subset of the server's packs this client also has.
fn select_known_packs(offered: Vec<KnownPack>) -> Vec<KnownPack> {
    offered
        .into_iter()
        .filter(|pack| {
            LOCAL_PACKS
                .iter()
                .any(|(namespace, id)| pack.namespace == *namespace && pack.id == *id)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pack(namespace: &str, id: &str) -> KnownPack {
        KnownPack {
            namespace: namespace.into(),
            id: id.into(),
            version: "1.21.11".into(),
        }
    }

    #[test]
    fn only_local_packs_are_echoed() {
        let shared = select_known_packs(vec![pack("minecraft", "core"), pack("server", "extras")]);
        assert_eq!(shared, vec![pack("minecraft", "core")]);
    }
}
