//! State handed from one phase to the next.
//!
//! The session cookie outlives any single phase: login fills in the profile,
//! configuration the registries and packs, and play reads them back. It
//! survives a return to configuration; only the connection ending drops it.

use std::collections::HashMap;

use indexmap::IndexMap;
use serde::Deserialize;
use ultimate_mirror::world::chunk::DimensionHeight;
use uuid::Uuid;

use crate::protocol::packets::{GameProfile, KnownPack, RegistryEntry, TagMap};

pub const DIMENSION_TYPE_REGISTRY: &str = "minecraft:dimension_type";
pub const BRAND_CHANNEL: &str = "minecraft:brand";

#[derive(Debug, Clone)]
pub struct SessionCookie {
    pub profile: GameProfile,
    /// Registries in the order received; entry ids are their positions.
    pub registries: IndexMap<String, Vec<RegistryEntry>>,
    /// Tags per registry, replaced wholesale on each update.
    pub tags: TagMap,
    pub enabled_features: Vec<String>,
    pub server_brand: Option<String>,
    pub server_cookies: HashMap<String, Vec<u8>>,
    pub seen_players: IndexMap<Uuid, String>,
    /// Opaque chat session id; signing is handled elsewhere.
    pub chat_session: Option<Uuid>,
    pub known_packs: Vec<KnownPack>,
    pub compression_threshold: Option<i32>,
}

impl SessionCookie {
    pub fn offline(name: &str) -> Self {
        Self {
            profile: GameProfile {
                uuid: offline_uuid(name),
                name: name.to_string(),
            },
            registries: IndexMap::new(),
            tags: IndexMap::new(),
            enabled_features: Vec::new(),
            server_brand: None,
            server_cookies: HashMap::new(),
            seen_players: IndexMap::new(),
            chat_session: None,
            known_packs: Vec::new(),
            compression_threshold: None,
        }
    }

    pub fn registry(&self, registry_id: &str) -> Option<&[RegistryEntry]> {
        self.registries.get(registry_id).map(Vec::as_slice)
    }

    /// Network id of `entry` within `registry_id`.
    pub fn registry_index(&self, registry_id: &str, entry: &str) -> Option<usize> {
        self.registry(registry_id)?
            .iter()
            .position(|candidate| candidate.id == entry)
    }

    /// Vertical extent of a dimension type from the received registries.
    /// Entries without inline data fall back to the vanilla values shipped
    /// with the shared core pack.
    pub fn dimension_height(&self, dimension_type: &str) -> Option<DimensionHeight> {
        let entry = self
            .registry(DIMENSION_TYPE_REGISTRY)?
            .iter()
            .find(|entry| entry.id == dimension_type)?;
        match &entry.data {
            Some(data) => {
                let parsed = DimensionTypeData::deserialize(data).ok()?;
                Some(DimensionHeight::new(parsed.min_y, parsed.height))
            }
            None => vanilla_dimension_height(dimension_type),
        }
    }
}

#[derive(Debug, Deserialize)]
struct DimensionTypeData {
    min_y: i32,
    height: u32,
}

fn vanilla_dimension_height(dimension_type: &str) -> Option<DimensionHeight> {
    match dimension_type {
        "minecraft:overworld" | "minecraft:overworld_caves" => Some(DimensionHeight::OVERWORLD),
        "minecraft:the_nether" | "minecraft:the_end" => Some(DimensionHeight::new(0, 256)),
        _ => None,
    }
}

/// Generate an offline-mode UUID from a player name.
pub fn offline_uuid(name: &str) -> Uuid {
    Uuid::new_v3(&Uuid::NAMESPACE_URL, format!("OfflinePlayer:{}", name).as_bytes())
}
