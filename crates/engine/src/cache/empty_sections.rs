use dashmap::DashSet;

use crate::world::position::SectionPos;

/// Sections known to contain only air, keyed by [`SectionPos::as_key`].
///
/// Written by the logic thread, read concurrently by the renderer and light
/// engine to skip trivial sections.
#[derive(Debug, Default)]
pub struct EmptySectionSet {
    keys: DashSet<i64>,
}

impl EmptySectionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if the section was not already recorded.
    pub fn insert(&self, section: SectionPos) -> bool {
        self.keys.insert(section.as_key())
    }

    /// Returns `true` if the section was recorded.
    pub fn remove(&self, section: SectionPos) -> bool {
        self.keys.remove(&section.as_key()).is_some()
    }

    pub fn contains(&self, section: SectionPos) -> bool {
        self.keys.contains(&section.as_key())
    }

    pub fn contains_key(&self, key: i64) -> bool {
        self.keys.contains(&key)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn clear(&self) {
        self.keys.clear();
    }

    /// Point-in-time copy of the set.
    pub fn snapshot(&self) -> Vec<SectionPos> {
        self.keys.iter().map(|key| SectionPos::from_key(*key)).collect()
    }
}
