//! Per-slot rate limiting of emitted results.
//!
//! Each slot emits at most once per interval. A value that arrives too soon
//! is held, replacing any older held value, and released by [`EmissionThrottle::due`]
//! once the interval has passed. The first value of an episode is held too,
//! so a burst at the start of a search collapses into its latest value.

use std::time::Duration;

use smallvec::SmallVec;
use tokio::time::Instant;

#[derive(Debug)]
struct ThrottleSlot<T> {
    /// Start of the current interval: the last emission, or the first held
    /// value of the episode.
    since: Option<Instant>,
    pending: Option<T>,
}

impl<T> Default for ThrottleSlot<T> {
    fn default() -> Self {
        Self {
            since: None,
            pending: None,
        }
    }
}

#[derive(Debug)]
pub struct EmissionThrottle<T> {
    interval: Duration,
    slots: SmallVec<[ThrottleSlot<T>; 4]>,
}

impl<T> EmissionThrottle<T> {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            slots: SmallVec::new(),
        }
    }

    /// Offer a value for 1-based `slot`. Returns it when it may be emitted
    /// right away; otherwise it is held.
    pub fn offer(&mut self, slot: u32, value: T, now: Instant) -> Option<T> {
        let interval = self.interval;
        let entry = self.entry(slot);
        match entry.since {
            Some(since) if now.duration_since(since) >= interval => {
                entry.since = Some(now);
                entry.pending = None;
                Some(value)
            }
            Some(_) => {
                entry.pending = Some(value);
                None
            }
            None => {
                entry.since = Some(now);
                entry.pending = Some(value);
                None
            }
        }
    }

    /// Held values whose interval has elapsed, by slot.
    pub fn due(&mut self, now: Instant) -> Vec<(u32, T)> {
        let interval = self.interval;
        let mut ready = Vec::new();
        for (i, entry) in self.slots.iter_mut().enumerate() {
            let elapsed = entry
                .since
                .is_some_and(|since| now.duration_since(since) >= interval);
            if !elapsed {
                continue;
            }
            if let Some(value) = entry.pending.take() {
                entry.since = Some(now);
                ready.push((i as u32 + 1, value));
            }
        }
        ready
    }

    pub fn has_pending(&self) -> bool {
        self.slots.iter().any(|entry| entry.pending.is_some())
    }

    /// Drop held values and timing, as at the start of a new episode.
    pub fn reset(&mut self) {
        self.slots.clear();
    }

    fn entry(&mut self, slot: u32) -> &mut ThrottleSlot<T> {
        let index = slot.saturating_sub(1) as usize;
        if self.slots.len() <= index {
            self.slots.resize_with(index + 1, ThrottleSlot::default);
        }
        &mut self.slots[index]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const INTERVAL: Duration = Duration::from_millis(100);

    #[tokio::test(start_paused = true)]
    async fn test_burst_collapses_to_latest() {
        let mut throttle = EmissionThrottle::new(INTERVAL);
        let t0 = Instant::now();

        assert_eq!(throttle.offer(1, "first", t0), None);
        assert_eq!(throttle.offer(1, "second", t0 + Duration::from_millis(40)), None);
        assert!(throttle.due(t0 + Duration::from_millis(99)).is_empty());
        assert_eq!(throttle.due(t0 + INTERVAL), vec![(1, "second")]);
        assert!(throttle.due(t0 + Duration::from_millis(500)).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_emits_immediately_after_quiet_interval() {
        let mut throttle = EmissionThrottle::new(INTERVAL);
        let t0 = Instant::now();
        throttle.offer(1, 1, t0);
        assert_eq!(throttle.due(t0 + INTERVAL), vec![(1, 1)]);

        let later = t0 + Duration::from_millis(250);
        assert_eq!(throttle.offer(1, 2, later), Some(2));
        assert_eq!(throttle.offer(1, 3, later + Duration::from_millis(10)), None);
        assert_eq!(throttle.due(later + INTERVAL), vec![(1, 3)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slots_are_independent() {
        let mut throttle = EmissionThrottle::new(INTERVAL);
        let t0 = Instant::now();
        throttle.offer(1, "a", t0);
        throttle.offer(3, "c", t0 + Duration::from_millis(50));

        assert_eq!(throttle.due(t0 + INTERVAL), vec![(1, "a")]);
        assert_eq!(
            throttle.due(t0 + Duration::from_millis(150)),
            vec![(3, "c")]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_drops_pending() {
        let mut throttle = EmissionThrottle::new(INTERVAL);
        let t0 = Instant::now();
        throttle.offer(1, "stale", t0);
        assert!(throttle.has_pending());
        throttle.reset();
        assert!(!throttle.has_pending());
        assert!(throttle.due(t0 + INTERVAL).is_empty());
    }
}
