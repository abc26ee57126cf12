//! Logical time for the draw sequence.
//!
//! Every continuation (draw completion, reveal frames) is expressed as a
//! point on a [`Clock`]. Production code uses [`SystemClock`]; tests drive a
//! [`ManualClock`] so nothing ever sleeps.

use std::cell::Cell;
use std::rc::Rc;
use std::time::{Duration, Instant};

/// Monotonic time source measured from an arbitrary origin.
pub trait Clock {
    fn now(&self) -> Duration;
}

#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// Hand-advanced clock. Clones share the same time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Rc<Cell<Duration>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, by: Duration) {
        self.now.set(self.now.get() + by);
    }

    pub fn set(&self, to: Duration) {
        self.now.set(to);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        self.now.get()
    }
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now(&self) -> Duration {
        (**self).now()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimerId(u64);

#[derive(Debug, Clone, PartialEq)]
pub struct Scheduled<T> {
    pub id: TimerId,
    pub due: Duration,
    pub task: T,
}

/// Ordered queue of tasks waiting for a point in time. Tasks due at the same
/// instant fire in the order they were scheduled.
#[derive(Debug, Clone)]
pub struct Timeline<T> {
    entries: Vec<Scheduled<T>>,
    next_id: u64,
}

impl<T> Default for Timeline<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            next_id: 0,
        }
    }
}

impl<T> Timeline<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, due: Duration, task: T) -> TimerId {
        let id = TimerId(self.next_id);
        self.next_id += 1;
        let pos = self.entries.partition_point(|e| e.due <= due);
        self.entries.insert(pos, Scheduled { id, due, task });
        id
    }

    /// Remove and return every task due at or before `now`, earliest first.
    pub fn drain_due(&mut self, now: Duration) -> Vec<T> {
        let split = self.entries.partition_point(|e| e.due <= now);
        self.entries.drain(..split).map(|e| e.task).collect()
    }

    pub fn pending(&self) -> &[Scheduled<T>] {
        &self.entries
    }

    pub fn next_due(&self) -> Option<Duration> {
        self.entries.first().map(|e| e.due)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn manual_clock_clones_share_time() {
        let a = ManualClock::new();
        let b = a.clone();
        a.advance(ms(250));
        assert_eq!(b.now(), ms(250));
        b.set(ms(10));
        assert_eq!(a.now(), ms(10));
    }

    #[test]
    fn system_clock_is_monotonic() {
        let c = SystemClock::new();
        let t1 = c.now();
        let t2 = c.now();
        assert!(t2 >= t1);
    }

    #[test]
    fn drain_due_returns_in_time_order() {
        let mut tl = Timeline::new();
        tl.schedule(ms(300), "c");
        tl.schedule(ms(100), "a");
        tl.schedule(ms(200), "b");
        assert_eq!(tl.next_due(), Some(ms(100)));

        assert!(tl.drain_due(ms(99)).is_empty());
        assert_eq!(tl.drain_due(ms(200)), vec!["a", "b"]);
        assert_eq!(tl.len(), 1);
        assert_eq!(tl.drain_due(ms(1_000)), vec!["c"]);
        assert!(tl.is_empty());
    }

    #[test]
    fn equal_due_times_keep_schedule_order() {
        let mut tl = Timeline::new();
        let first = tl.schedule(ms(50), 1);
        let second = tl.schedule(ms(50), 2);
        assert!(first < second);
        assert_eq!(tl.pending()[0].id, first);
        assert_eq!(tl.drain_due(ms(50)), vec![1, 2]);
    }
}
