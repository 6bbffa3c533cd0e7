//! The client's view of the current dimension.
//!
//! `ClientLevel` is owned by the logic thread and is the only thing that
//! mutates the chunk cache, the prediction tracker and the light queue. Other
//! threads get at the world through [`ClientLevel::cache`].

use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use crate::cache::{ChunkCache, ChunkObserver};
use crate::light::{LightData, LightUpdateQueue};
use crate::prediction::{Overwrite, PredictionTracker, Reconciliation, Sequence};
use crate::world::block::BlockId;
use crate::world::chunk::DimensionHeight;
use crate::world::position::{BlockPos, ChunkPos, Vec3};

pub struct ClientLevel {
    cache: Arc<ChunkCache>,
    predictions: PredictionTracker,
    light_updates: LightUpdateQueue,
    player_pos: Option<Vec3>,
}

impl ClientLevel {
    pub fn new(view_distance: u32, height: DimensionHeight, observer: Arc<dyn ChunkObserver>) -> Self {
        Self {
            cache: Arc::new(ChunkCache::new(view_distance, height, observer)),
            predictions: PredictionTracker::new(),
            light_updates: LightUpdateQueue::new(),
            player_pos: None,
        }
    }

    /// Shared handle for reader passes on other threads.
    pub fn cache(&self) -> &Arc<ChunkCache> {
        &self.cache
    }

    pub fn predictions(&self) -> &PredictionTracker {
        &self.predictions
    }

    pub fn light_updates(&self) -> &LightUpdateQueue {
        &self.light_updates
    }

    pub fn set_player_position(&mut self, pos: Vec3) {
        self.player_pos = Some(pos);
    }

    pub fn player_position(&self) -> Option<Vec3> {
        self.player_pos
    }

    /// Block at `pos`; air when the chunk is not loaded.
    pub fn get_block(&self, pos: BlockPos) -> BlockId {
        match self.cache.get_chunk(pos.chunk()) {
            Some(chunk) => chunk.get_block(pos.local()),
            None => BlockId::AIR,
        }
    }

    /// Write a block. While a prediction scope is open the pre-edit state is
    /// remembered as the server's. Returns whether the block changed.
    pub fn set_block(&mut self, pos: BlockPos, state: BlockId) -> bool {
        let Some(previous) = self.write_block(pos, state) else {
            return false;
        };
        if self.predictions.is_predicting() {
            self.predictions
                .retain_known_server_state(pos, previous, self.player_pos);
        }
        true
    }

    /// Open a prediction scope. Edits made through the scope (or any nested
    /// scope) are speculative until the returned sequence is acknowledged.
    pub fn start_predicting(&mut self) -> PredictionScope<'_> {
        let sequence = self.predictions.begin();
        PredictionScope {
            level: self,
            sequence,
        }
    }

    /// Apply a server block update, unless a newer local prediction owns the
    /// position (see [`PredictionTracker::on_authoritative_overwrite`]).
    pub fn set_server_verified_block_state(
        &mut self,
        pos: BlockPos,
        state: BlockId,
        reflects: Option<Sequence>,
    ) -> Overwrite {
        let outcome = self.predictions.on_authoritative_overwrite(pos, state, reflects);
        if outcome == Overwrite::Apply {
            self.write_block(pos, state);
        }
        outcome
    }

    /// Apply a multi-block section update.
    pub fn apply_section_update(&mut self, changes: &[(BlockPos, BlockId)], reflects: Option<Sequence>) -> usize {
        changes
            .iter()
            .filter(|(pos, state)| self.set_server_verified_block_state(*pos, *state, reflects) == Overwrite::Apply)
            .count()
    }

    /// Retire predictions up to `sequence` and restore the server's state
    /// where the prediction turned out wrong.
    pub fn handle_block_changed_ack(&mut self, sequence: Sequence) -> Vec<Reconciliation> {
        let mut corrections = Vec::new();
        for (pos, record) in self.predictions.on_ack(sequence) {
            if self.get_block(pos) == record.server_state {
                continue;
            }
            tracing::debug!(
                "Prediction at ({}, {}, {}) corrected to {:?} on ack {}",
                pos.x,
                pos.y,
                pos.z,
                record.server_state,
                sequence.0
            );
            self.write_block(pos, record.server_state);
            corrections.push(Reconciliation {
                pos,
                server_state: record.server_state,
                player_pos: record.player_pos,
            });
        }
        corrections
    }

    pub fn queue_light_update<F>(&mut self, update: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.light_updates.enqueue(update);
    }

    /// Defer handing a column's light data to the light engine.
    pub fn enqueue_light_data(&mut self, pos: ChunkPos, data: LightData) {
        let observer = Arc::clone(self.cache.observer());
        self.light_updates
            .enqueue(move || observer.on_light_data(pos, &data));
    }

    /// Per-tick work. Returns how many light updates ran.
    pub fn tick(&mut self) -> usize {
        self.light_updates.poll_light_updates()
    }

    /// Session reset: unload every chunk, abandon open predictions and drop
    /// pending light work.
    pub fn reset(&mut self) {
        self.cache.clear();
        self.predictions.reset();
        self.light_updates.clear();
    }

    /// Write without prediction bookkeeping. Returns the previous block, or
    /// `None` if nothing changed.
    fn write_block(&mut self, pos: BlockPos, state: BlockId) -> Option<BlockId> {
        let Some(chunk) = self.cache.get_chunk(pos.chunk()) else {
            tracing::debug!("Block write at ({}, {}, {}) outside loaded chunks", pos.x, pos.y, pos.z);
            return None;
        };
        let change = chunk.set_block(pos.local(), state)?;
        if let Some(empty) = change.emptiness_changed {
            self.cache.on_section_emptiness_changed(pos.section(), empty);
        }
        (change.previous != state).then_some(change.previous)
    }
}

impl std::fmt::Debug for ClientLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientLevel")
            .field("cache", &self.cache)
            .field("predictions", &self.predictions.open_records())
            .field("light_updates", &self.light_updates.len())
            .finish()
    }
}

/// An open prediction scope. Dropping it closes the scope, including when the
/// action unwinds part-way.
pub struct PredictionScope<'a> {
    level: &'a mut ClientLevel,
    sequence: Sequence,
}

impl PredictionScope<'_> {
    /// The sequence number to stamp on the outbound action.
    pub fn sequence(&self) -> Sequence {
        self.sequence
    }

    /// Apply an edit locally and remember what the server had.
    pub fn apply_local_edit(&mut self, pos: BlockPos, state: BlockId) -> bool {
        self.level.set_block(pos, state)
    }
}

impl Deref for PredictionScope<'_> {
    type Target = ClientLevel;

    fn deref(&self) -> &ClientLevel {
        self.level
    }
}

impl DerefMut for PredictionScope<'_> {
    fn deref_mut(&mut self) -> &mut ClientLevel {
        self.level
    }
}

impl Drop for PredictionScope<'_> {
    fn drop(&mut self) {
        self.level.predictions.end();
    }
}
