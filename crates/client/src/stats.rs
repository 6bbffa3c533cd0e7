//! Lock-free session counters.
//!
//! The play loop bumps these with relaxed atomics; anything wanting a report
//! takes a [`StatsSnapshot`] at its own pace.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering::Relaxed};
use std::time::Instant;
use ultimate_mirror::level::ClientLevel;
use ultimate_mirror::pacing::ChunkBatchPacer;

pub struct ClientStats {
    chunks_received: AtomicU64,
    chunks_ignored: AtomicU64,
    chunks_dropped: AtomicU64,
    block_updates: AtomicU64,
    predictions_issued: AtomicU64,
    acks_received: AtomicU64,
    corrections: AtomicU64,
    light_updates_drained: AtomicU64,
    batches_finished: AtomicU64,
    started_at: Instant,
}

impl ClientStats {
    pub fn new() -> Self {
        Self {
            chunks_received: AtomicU64::new(0),
            chunks_ignored: AtomicU64::new(0),
            chunks_dropped: AtomicU64::new(0),
            block_updates: AtomicU64::new(0),
            predictions_issued: AtomicU64::new(0),
            acks_received: AtomicU64::new(0),
            corrections: AtomicU64::new(0),
            light_updates_drained: AtomicU64::new(0),
            batches_finished: AtomicU64::new(0),
            started_at: Instant::now(),
        }
    }

    pub fn chunk_received(&self) {
        self.chunks_received.fetch_add(1, Relaxed);
    }

    /// A chunk arrived for a coordinate outside the view window.
    pub fn chunk_ignored(&self) {
        self.chunks_ignored.fetch_add(1, Relaxed);
    }

    pub fn chunk_dropped(&self) {
        self.chunks_dropped.fetch_add(1, Relaxed);
    }

    pub fn block_updates(&self, count: u64) {
        self.block_updates.fetch_add(count, Relaxed);
    }

    pub fn prediction_issued(&self) {
        self.predictions_issued.fetch_add(1, Relaxed);
    }

    pub fn ack_received(&self, corrections: u64) {
        self.acks_received.fetch_add(1, Relaxed);
        self.corrections.fetch_add(corrections, Relaxed);
    }

    pub fn light_updates_drained(&self, count: u64) {
        self.light_updates_drained.fetch_add(count, Relaxed);
    }

    pub fn batch_finished(&self) {
        self.batches_finished.fetch_add(1, Relaxed);
    }

    pub fn snapshot(&self, level: Option<&ClientLevel>, pacer: &ChunkBatchPacer) -> StatsSnapshot {
        let cache = level.map(|level| level.cache());
        StatsSnapshot {
            uptime_secs: self.started_at.elapsed().as_secs_f64(),
            chunks_received: self.chunks_received.load(Relaxed),
            chunks_ignored: self.chunks_ignored.load(Relaxed),
            chunks_dropped: self.chunks_dropped.load(Relaxed),
            block_updates: self.block_updates.load(Relaxed),
            predictions_issued: self.predictions_issued.load(Relaxed),
            acks_received: self.acks_received.load(Relaxed),
            corrections: self.corrections.load(Relaxed),
            light_updates_drained: self.light_updates_drained.load(Relaxed),
            batches_finished: self.batches_finished.load(Relaxed),
            cache_capacity: cache.map_or(0, |cache| cache.capacity() as u64),
            chunks_loaded: cache.map_or(0, |cache| cache.loaded_chunk_count() as u64),
            empty_sections: cache.map_or(0, |cache| cache.empty_sections().len() as u64),
            nanos_per_chunk: pacer.nanos_per_chunk(),
            desired_chunks_per_tick: pacer.desired_chunks_per_tick(),
        }
    }
}

impl Default for ClientStats {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StatsSnapshot {
    pub uptime_secs: f64,
    pub chunks_received: u64,
    pub chunks_ignored: u64,
    pub chunks_dropped: u64,
    pub block_updates: u64,
    pub predictions_issued: u64,
    pub acks_received: u64,
    pub corrections: u64,
    pub light_updates_drained: u64,
    pub batches_finished: u64,
    pub cache_capacity: u64,
    pub chunks_loaded: u64,
    pub empty_sections: u64,
    pub nanos_per_chunk: f64,
    pub desired_chunks_per_tick: f32,
}
