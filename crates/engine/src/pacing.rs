//! Chunk batch pacing.
//!
//! The server streams chunks in batches bracketed by start/finish markers.
//! Timing how long the client takes to absorb each batch gives a per-chunk
//! cost estimate; the client reports `target / estimate` back so the server
//! never streams faster than the client can process. Network latency does not
//! enter the estimate, only client-side processing time.

use std::time::Instant;

/// Starting per-chunk cost estimate, in nanoseconds.
pub const INITIAL_NANOS_PER_CHUNK: f64 = 2_000_000.0;
/// Ceiling on the weight of the running estimate (about a 50-sample window).
pub const MAX_OLD_SAMPLES_WEIGHT: u32 = 49;
/// A single batch may move the estimate by at most this factor.
pub const CLAMP_COEFFICIENT: f64 = 3.0;
/// Processing budget per client tick that the advertised rate aims for.
pub const DEFAULT_TARGET_NANOS_PER_TICK: f64 = 7_000_000.0;

/// Running estimate of the client's per-chunk processing cost.
///
/// Lives for the whole connection: it measures the machine, not the session,
/// so respawns and re-configuration leave it alone.
#[derive(Debug, Clone)]
pub struct ChunkBatchPacer {
    aggregated_nanos_per_chunk: f64,
    old_samples_weight: u32,
    batch_started_at: Instant,
    target_nanos_per_tick: f64,
}

impl ChunkBatchPacer {
    pub fn new() -> Self {
        Self::with_target(DEFAULT_TARGET_NANOS_PER_TICK)
    }

    pub fn with_target(target_nanos_per_tick: f64) -> Self {
        Self {
            aggregated_nanos_per_chunk: INITIAL_NANOS_PER_CHUNK,
            old_samples_weight: 1,
            batch_started_at: Instant::now(),
            target_nanos_per_tick,
        }
    }

    pub fn on_batch_start(&mut self) {
        self.on_batch_start_at(Instant::now());
    }

    pub fn on_batch_start_at(&mut self, now: Instant) {
        self.batch_started_at = now;
    }

    pub fn on_batch_finished(&mut self, batch_size: u32) {
        self.on_batch_finished_at(batch_size, Instant::now());
    }

    /// Fold the batch that started at the last `on_batch_start` into the
    /// estimate. Empty batches carry no timing information and are skipped.
    pub fn on_batch_finished_at(&mut self, batch_size: u32, now: Instant) {
        if batch_size == 0 {
            return;
        }
        let elapsed = now.saturating_duration_since(self.batch_started_at).as_nanos() as f64;
        self.fold_sample(elapsed / f64::from(batch_size));
    }

    fn fold_sample(&mut self, nanos_per_chunk: f64) {
        let current = self.aggregated_nanos_per_chunk;
        let clamped = nanos_per_chunk.clamp(current / CLAMP_COEFFICIENT, current * CLAMP_COEFFICIENT);
        let weight = f64::from(self.old_samples_weight);
        self.aggregated_nanos_per_chunk = (current * weight + clamped) / (weight + 1.0);
        self.old_samples_weight = (self.old_samples_weight + 1).min(MAX_OLD_SAMPLES_WEIGHT);
    }

    /// Chunks per tick the server should aim for.
    pub fn desired_chunks_per_tick(&self) -> f32 {
        (self.target_nanos_per_tick / self.aggregated_nanos_per_chunk) as f32
    }

    pub fn nanos_per_chunk(&self) -> f64 {
        self.aggregated_nanos_per_chunk
    }

    pub fn samples_weight(&self) -> u32 {
        self.old_samples_weight
    }
}

impl Default for ChunkBatchPacer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn run_batch(pacer: &mut ChunkBatchPacer, size: u32, elapsed: Duration) {
        let start = Instant::now();
        pacer.on_batch_start_at(start);
        pacer.on_batch_finished_at(size, start + elapsed);
    }

    #[test]
    fn empty_batch_contributes_nothing() {
        let mut pacer = ChunkBatchPacer::new();
        run_batch(&mut pacer, 0, Duration::from_secs(5));
        assert_eq!(pacer.nanos_per_chunk(), INITIAL_NANOS_PER_CHUNK);
        assert_eq!(pacer.samples_weight(), 1);
    }

    #[test]
    fn first_sample_averages_with_initial_estimate() {
        let mut pacer = ChunkBatchPacer::new();
        // 4 ms per chunk, within the 3x clamp of 2 ms.
        run_batch(&mut pacer, 10, Duration::from_millis(40));
        assert!((pacer.nanos_per_chunk() - 3_000_000.0).abs() < 1.0);
        assert_eq!(pacer.samples_weight(), 2);
    }

    #[test]
    fn outlier_is_clamped_to_three_times_the_estimate() {
        let mut pacer = ChunkBatchPacer::new();
        // 1 s per chunk would be 500x the estimate; it counts as 6 ms.
        run_batch(&mut pacer, 1, Duration::from_secs(1));
        assert!((pacer.nanos_per_chunk() - 4_000_000.0).abs() < 1.0);
    }

    #[test]
    fn fast_outlier_is_clamped_to_a_third() {
        let mut pacer = ChunkBatchPacer::new();
        run_batch(&mut pacer, 100, Duration::from_nanos(100));
        let expected = (INITIAL_NANOS_PER_CHUNK + INITIAL_NANOS_PER_CHUNK / 3.0) / 2.0;
        assert!((pacer.nanos_per_chunk() - expected).abs() < 1.0);
    }

    #[test]
    fn weight_saturates() {
        let mut pacer = ChunkBatchPacer::new();
        for _ in 0..100 {
            run_batch(&mut pacer, 1, Duration::from_millis(2));
        }
        assert_eq!(pacer.samples_weight(), MAX_OLD_SAMPLES_WEIGHT);
    }

    #[test]
    fn desired_rate_uses_target() {
        let pacer = ChunkBatchPacer::with_target(14_000_000.0);
        assert!((pacer.desired_chunks_per_tick() - 7.0).abs() < f32::EPSILON);
        assert!((ChunkBatchPacer::new().desired_chunks_per_tick() - 3.5).abs() < f32::EPSILON);
    }

    #[test]
    fn steady_batches_converge_without_jumps() {
        let mut pacer = ChunkBatchPacer::new();
        // True cost 20 ms per chunk, ten times the cold estimate.
        let mut previous = pacer.nanos_per_chunk();
        for _ in 0..200 {
            run_batch(&mut pacer, 100, Duration::from_secs(2));
            let current = pacer.nanos_per_chunk();
            assert!(current <= previous * CLAMP_COEFFICIENT);
            assert!(current >= previous);
            previous = current;
        }
        assert!((pacer.nanos_per_chunk() - 20_000_000.0).abs() < 200_000.0);
    }

    #[test]
    fn matching_cost_holds_estimate() {
        let mut pacer = ChunkBatchPacer::new();
        for _ in 0..5 {
            run_batch(&mut pacer, 100, Duration::from_millis(200));
        }
        assert!((pacer.nanos_per_chunk() - INITIAL_NANOS_PER_CHUNK).abs() < 1.0);
        assert_eq!(pacer.samples_weight(), 6);
    }
}
