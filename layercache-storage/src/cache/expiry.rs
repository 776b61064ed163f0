//! Hard-expiry timer queue.
//!
//! Keys cached under a hard-TTL policy are scheduled here and deleted from
//! every tier when their deadline passes. Rescheduling a key supersedes the
//! previous timer; superseded heap entries are skipped lazily.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::sync::{Mutex, MutexGuard};
use std::time::Instant;

use layercache_core::{CacheError, CacheResult};

#[derive(Debug, Default)]
struct ScheduleState {
    heap: BinaryHeap<Reverse<(Instant, u64, String)>>,
    /// Current generation per scheduled key.
    live: HashMap<String, u64>,
    next_generation: u64,
}

/// Min-heap of pending hard expiries.
#[derive(Debug, Default)]
pub struct ExpiryScheduler {
    state: Mutex<ScheduleState>,
}

impl ExpiryScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> CacheResult<MutexGuard<'_, ScheduleState>> {
        self.state.lock().map_err(|_| CacheError::LockPoisoned)
    }

    /// Schedule `key` to expire at `fire_at`, replacing any earlier timer.
    pub fn schedule(&self, key: &str, fire_at: Instant) -> CacheResult<()> {
        let mut state = self.lock()?;
        state.next_generation += 1;
        let generation = state.next_generation;
        state.live.insert(key.to_string(), generation);
        state.heap.push(Reverse((fire_at, generation, key.to_string())));
        Ok(())
    }

    /// Cancel the timer for `key`. Returns whether one was pending.
    pub fn cancel(&self, key: &str) -> CacheResult<bool> {
        Ok(self.lock()?.live.remove(key).is_some())
    }

    /// Remove and return every key whose deadline is at or before `now`.
    pub fn take_due(&self, now: Instant) -> CacheResult<Vec<String>> {
        let mut state = self.lock()?;
        let mut due = Vec::new();

        while let Some(fire_at) = state.heap.peek().map(|Reverse((at, _, _))| *at) {
            if fire_at > now {
                break;
            }
            let Some(Reverse((_, generation, key))) = state.heap.pop() else {
                break;
            };
            if state.live.get(&key) == Some(&generation) {
                state.live.remove(&key);
                due.push(key);
            }
        }
        Ok(due)
    }

    /// Earliest pending deadline, ignoring cancelled timers.
    pub fn next_deadline(&self) -> CacheResult<Option<Instant>> {
        let state = self.lock()?;
        Ok(state
            .heap
            .iter()
            .filter(|Reverse((_, generation, key))| state.live.get(key) == Some(generation))
            .map(|Reverse((fire_at, _, _))| *fire_at)
            .min())
    }

    /// Number of live timers.
    pub fn len(&self) -> CacheResult<usize> {
        Ok(self.lock()?.live.len())
    }

    pub fn is_empty(&self) -> CacheResult<bool> {
        Ok(self.len()? == 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_take_due_in_deadline_order() {
        let scheduler = ExpiryScheduler::new();
        let now = Instant::now();
        scheduler.schedule("late", now + Duration::from_secs(10)).unwrap();
        scheduler.schedule("b", now + Duration::from_millis(2)).unwrap();
        scheduler.schedule("a", now + Duration::from_millis(1)).unwrap();

        let due = scheduler.take_due(now + Duration::from_secs(1)).unwrap();
        assert_eq!(due, vec!["a", "b"]);
        assert_eq!(scheduler.len().unwrap(), 1);
    }

    #[test]
    fn test_cancel() {
        let scheduler = ExpiryScheduler::new();
        let now = Instant::now();
        scheduler.schedule("a", now).unwrap();

        assert!(scheduler.cancel("a").unwrap());
        assert!(!scheduler.cancel("a").unwrap());
        assert!(scheduler.take_due(now + Duration::from_secs(1)).unwrap().is_empty());
        assert_eq!(scheduler.next_deadline().unwrap(), None);
    }

    #[test]
    fn test_reschedule_supersedes_earlier_timer() {
        let scheduler = ExpiryScheduler::new();
        let now = Instant::now();
        scheduler.schedule("a", now + Duration::from_millis(1)).unwrap();
        scheduler.schedule("a", now + Duration::from_secs(60)).unwrap();

        assert!(scheduler.take_due(now + Duration::from_secs(1)).unwrap().is_empty());
        assert_eq!(
            scheduler.next_deadline().unwrap(),
            Some(now + Duration::from_secs(60))
        );
        assert_eq!(scheduler.len().unwrap(), 1);
    }

    #[test]
    fn test_empty() {
        let scheduler = ExpiryScheduler::new();
        assert!(scheduler.is_empty().unwrap());
        assert!(scheduler.take_due(Instant::now()).unwrap().is_empty());
    }
}
