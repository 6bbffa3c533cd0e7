//! Deferred lighting work.
//!
//! Newly arrived chunk and light data is expensive to integrate, so it is
//! queued and drained a little every tick instead of all at once.

use std::collections::VecDeque;

/// Minimum number of updates run per tick while the queue is non-empty.
pub const MIN_UPDATES_PER_TICK: usize = 10;
/// Backlog at which a single tick drains the whole queue.
pub const BACKLOG_HIGH_WATER: usize = 1000;

/// Light arrays for one section (2048 bytes each when present).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SectionLight {
    pub section_y: i32,
    pub sky: Option<Vec<u8>>,
    pub block: Option<Vec<u8>>,
}

/// Decoded light data for a chunk column.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LightData {
    pub sections: Vec<SectionLight>,
}

pub type LightUpdate = Box<dyn FnOnce() + Send + 'static>;

/// FIFO of pending light updates.
#[derive(Default)]
pub struct LightUpdateQueue {
    pending: VecDeque<LightUpdate>,
}

impl LightUpdateQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue<F>(&mut self, update: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.pending.push_back(Box::new(update));
    }

    /// How many updates the next poll will run for a given backlog.
    pub fn drain_budget(backlog: usize) -> usize {
        if backlog < BACKLOG_HIGH_WATER {
            MIN_UPDATES_PER_TICK.max(backlog / 10)
        } else {
            backlog
        }
    }

    /// Run this tick's share of the backlog. Returns how many updates ran.
    pub fn poll_light_updates(&mut self) -> usize {
        let budget = Self::drain_budget(self.pending.len());
        let mut ran = 0;
        while ran < budget {
            let Some(update) = self.pending.pop_front() else {
                break;
            };
            update();
            ran += 1;
        }
        ran
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Drop every pending update without running it.
    pub fn clear(&mut self) {
        self.pending.clear();
    }
}

impl std::fmt::Debug for LightUpdateQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LightUpdateQueue")
            .field("pending", &self.pending.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn fill(queue: &mut LightUpdateQueue, n: usize, counter: &Arc<AtomicUsize>) {
        for _ in 0..n {
            let counter = Arc::clone(counter);
            queue.enqueue(move || {
                counter.fetch_add(1, Ordering::Relaxed);
            });
        }
    }

    #[test]
    fn budget_is_floor_bounded_and_scales() {
        assert_eq!(LightUpdateQueue::drain_budget(0), 10);
        assert_eq!(LightUpdateQueue::drain_budget(5), 10);
        assert_eq!(LightUpdateQueue::drain_budget(250), 25);
        assert_eq!(LightUpdateQueue::drain_budget(999), 99);
        assert_eq!(LightUpdateQueue::drain_budget(1000), 1000);
        assert_eq!(LightUpdateQueue::drain_budget(5000), 5000);
    }

    #[test]
    fn small_backlog_drains_ten_per_tick() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut queue = LightUpdateQueue::new();
        fill(&mut queue, 25, &counter);
        assert_eq!(queue.poll_light_updates(), 10);
        assert_eq!(queue.poll_light_updates(), 10);
        assert_eq!(queue.poll_light_updates(), 5);
        assert_eq!(queue.poll_light_updates(), 0);
        assert_eq!(counter.load(Ordering::Relaxed), 25);
    }

    #[test]
    fn large_backlog_drains_in_one_tick() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut queue = LightUpdateQueue::new();
        fill(&mut queue, 1500, &counter);
        assert_eq!(queue.poll_light_updates(), 1500);
        assert!(queue.is_empty());
    }

    #[test]
    fn medium_backlog_drains_a_tenth() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut queue = LightUpdateQueue::new();
        fill(&mut queue, 600, &counter);
        assert_eq!(queue.poll_light_updates(), 60);
        assert_eq!(queue.len(), 540);
        assert_eq!(queue.poll_light_updates(), 54);
    }

    #[test]
    fn updates_run_in_order() {
        let log = Arc::new(std::sync::Mutex::new(Vec::new()));
        let mut queue = LightUpdateQueue::new();
        for i in 0..3 {
            let log = Arc::clone(&log);
            queue.enqueue(move || log.lock().unwrap().push(i));
        }
        queue.poll_light_updates();
        assert_eq!(*log.lock().unwrap(), vec![0, 1, 2]);
    }
}
