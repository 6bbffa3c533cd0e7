//! Speculative block edits and their reconciliation.
//!
//! A local action (breaking or placing a block) is applied to the mirror at
//! once and stamped with a sequence number that travels to the server with
//! the action. For every position touched while predicting, the tracker keeps
//! the last state the server vouched for. Server block updates for such a
//! position only refresh that remembered state; the local edit stays visible.
//! When the server acknowledges sequence `n`, every record at or below `n` is
//! retired and the remembered server state becomes the truth again.
//!
//! Anything the server has acknowledged is authoritative; anything still
//! outstanding may be overridden locally.

use std::collections::HashMap;

use crate::world::block::BlockId;
use crate::world::position::{BlockPos, Vec3};

/// Prediction sequence number, correlating a local action with its ack.
///
/// Ordering is plain integer ordering: a connection is assumed never to issue
/// more than `u32::MAX` predictions, so the counter stops there instead of
/// wrapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Sequence(pub u32);

/// Open speculation on one block position.
#[derive(Debug, Clone, PartialEq)]
pub struct PredictionRecord {
    /// Newest sequence under which the position was edited locally.
    pub sequence: Sequence,
    /// Latest state the server is known to hold for the position.
    pub server_state: BlockId,
    /// Where the player stood when the position was first predicted.
    pub player_pos: Option<Vec3>,
}

/// A retired record whose server state differs from the local block.
#[derive(Debug, Clone, PartialEq)]
pub struct Reconciliation {
    pub pos: BlockPos,
    pub server_state: BlockId,
    pub player_pos: Option<Vec3>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PredictionState {
    Idle,
    Predicting,
}

/// What to do with a server block update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Overwrite {
    /// Write the server state to the level now.
    Apply,
    /// A newer local prediction owns the position; the server state was
    /// remembered and will be restored on ack if still different.
    Defer,
}

#[derive(Debug)]
pub struct PredictionTracker {
    issued: u32,
    depth: u32,
    last_acked: Sequence,
    records: HashMap<BlockPos, PredictionRecord>,
}

impl PredictionTracker {
    pub fn new() -> Self {
        Self {
            issued: 0,
            depth: 0,
            last_acked: Sequence(0),
            records: HashMap::new(),
        }
    }

    /// Enter (or nest into) a predicting scope and issue its sequence number.
    pub fn begin(&mut self) -> Sequence {
        self.issued = self.issued.saturating_add(1);
        let sequence = Sequence(self.issued);
        self.depth += 1;
        sequence
    }

    /// Leave the innermost predicting scope.
    pub fn end(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    pub fn is_predicting(&self) -> bool {
        self.depth > 0
    }

    pub fn depth(&self) -> u32 {
        self.depth
    }

    /// The most recently issued sequence (0 before the first scope).
    pub fn current_sequence(&self) -> Sequence {
        Sequence(self.issued)
    }

    pub fn last_acked(&self) -> Sequence {
        self.last_acked
    }

    /// `Idle` only once every scope has closed and every issued sequence has
    /// been acknowledged.
    pub fn state(&self) -> PredictionState {
        if self.depth > 0 || !self.records.is_empty() || self.last_acked < self.current_sequence() {
            PredictionState::Predicting
        } else {
            PredictionState::Idle
        }
    }

    /// Remember `server_state` for a position edited while predicting. A
    /// position already under speculation keeps its remembered server state
    /// and only moves to the current sequence.
    pub fn retain_known_server_state(
        &mut self,
        pos: BlockPos,
        server_state: BlockId,
        player_pos: Option<Vec3>,
    ) {
        let sequence = self.current_sequence();
        self.records
            .entry(pos)
            .and_modify(|record| record.sequence = sequence)
            .or_insert(PredictionRecord {
                sequence,
                server_state,
                player_pos,
            });
    }

    /// Decide how a server block update for `pos` lands. `reflects` is the
    /// newest sequence the server's state accounts for; without one, the last
    /// acknowledged sequence is assumed. Ties go to the server.
    pub fn on_authoritative_overwrite(
        &mut self,
        pos: BlockPos,
        state: BlockId,
        reflects: Option<Sequence>,
    ) -> Overwrite {
        let reflects = reflects.unwrap_or(self.last_acked);
        match self.records.get_mut(&pos) {
            Some(record) => {
                record.server_state = state;
                if record.sequence > reflects {
                    Overwrite::Defer
                } else {
                    Overwrite::Apply
                }
            }
            None => Overwrite::Apply,
        }
    }

    /// Retire every record at or below `sequence`. Acknowledging an already
    /// retired sequence is a no-op.
    pub fn on_ack(&mut self, sequence: Sequence) -> Vec<(BlockPos, PredictionRecord)> {
        let issued = self.current_sequence();
        let sequence = if sequence > issued {
            tracing::debug!("Ack for sequence {} beyond last issued {}", sequence.0, issued.0);
            issued
        } else {
            sequence
        };
        self.last_acked = self.last_acked.max(sequence);

        let retired: Vec<BlockPos> = self
            .records
            .iter()
            .filter(|(_, record)| record.sequence <= sequence)
            .map(|(pos, _)| *pos)
            .collect();
        retired
            .into_iter()
            .filter_map(|pos| self.records.remove(&pos).map(|record| (pos, record)))
            .collect()
    }

    pub fn record(&self, pos: BlockPos) -> Option<&PredictionRecord> {
        self.records.get(&pos)
    }

    pub fn open_records(&self) -> usize {
        self.records.len()
    }

    /// Abandon all open speculation without replaying it. Sequences issued so
    /// far count as settled; the counter keeps running.
    pub fn reset(&mut self) {
        self.records.clear();
        self.last_acked = self.current_sequence();
    }
}

impl Default for PredictionTracker {
    fn default() -> Self {
        Self::new()
    }
}
