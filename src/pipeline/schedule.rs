// Cancellable timer primitives, driven by whoever owns the clock.
//
// Nothing here sleeps or spawns: the host polls with the current time and gets
// back whatever became due. Cancelling is synchronous, once `cancel_all`
// returns nothing queued before it can come out of a later poll.

use std::collections::VecDeque;
use std::time::Duration;

pub trait Cancellable {
    fn cancel_all(&mut self);
    fn has_pending(&self) -> bool;
}

/// Repeating tick source. Tick `k` (0-based) is due at `origin + interval * (k + 1)`,
/// so the first firing lands one interval after arming.
#[derive(Clone, Debug)]
pub struct RepeatingTick {
    origin: Duration,
    interval: Duration,
    fired: u32,
    armed: bool,
}

impl RepeatingTick {
    pub fn arm(origin: Duration, interval: Duration) -> Self {
        Self {
            origin,
            // a zero interval would make every poll infinitely overdue
            interval: interval.max(Duration::from_micros(1)),
            fired: 0,
            armed: true,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    // saturates instead of overflowing for absurdly long intervals
    pub fn next_due(&self) -> Option<Duration> {
        self.armed.then(|| {
            self.interval
                .checked_mul(self.fired.saturating_add(1))
                .and_then(|offset| self.origin.checked_add(offset))
                .unwrap_or(Duration::MAX)
        })
    }

    /// True when a tick came due since the last poll. Ticks missed while the
    /// host was stalled collapse into this one; the grid stays anchored to
    /// `origin`, so the next tick is still on time.
    pub fn poll(&mut self, now: Duration) -> bool {
        if !self.armed || now < self.origin {
            return false;
        }
        // computed from the origin each time so rounding never accumulates
        let elapsed = (now - self.origin).as_nanos() / self.interval.as_nanos();
        let due = u32::try_from(elapsed).unwrap_or(u32::MAX);
        if due > self.fired {
            self.fired = due;
            true
        } else {
            false
        }
    }
}

impl Cancellable for RepeatingTick {
    fn cancel_all(&mut self) {
        self.armed = false;
    }

    fn has_pending(&self) -> bool {
        self.armed
    }
}

/// A batch of delayed one-shot tasks, kept sorted by due time (FIFO among equals).
#[derive(Clone, Debug)]
pub struct OneShotQueue<T> {
    tasks: VecDeque<(Duration, T)>,
}

impl<T> Default for OneShotQueue<T> {
    fn default() -> Self {
        Self { tasks: VecDeque::new() }
    }
}

impl<T> OneShotQueue<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, due: Duration, task: T) {
        // insert after anything due at the same time
        let at = self.tasks.partition_point(|(d, _)| *d <= due);
        self.tasks.insert(at, (due, task));
    }

    pub fn next_due(&self) -> Option<Duration> {
        self.tasks.front().map(|(d, _)| *d)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn drain_due(&mut self, now: Duration) -> Vec<T> {
        let n = self.tasks.partition_point(|(d, _)| *d <= now);
        self.tasks.drain(..n).map(|(_, t)| t).collect()
    }
}

impl<T> Cancellable for OneShotQueue<T> {
    fn cancel_all(&mut self) {
        self.tasks.clear();
    }

    fn has_pending(&self) -> bool {
        !self.tasks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn first_tick_is_one_interval_after_arming() {
        let mut t = RepeatingTick::arm(ms(1000), ms(100));
        assert!(!t.poll(ms(1099)));
        assert!(t.poll(ms(1100)));
        assert!(!t.poll(ms(1150)));
        assert_eq!(t.next_due(), Some(ms(1200)));
    }

    #[test]
    fn stalled_host_gets_one_tick_not_a_burst() {
        let mut t = RepeatingTick::arm(ms(0), ms(100));
        assert!(t.poll(ms(450)));
        assert!(!t.poll(ms(450)));
        assert_eq!(t.next_due(), Some(ms(500)));
        assert!(t.poll(ms(500)));
        assert!(!t.poll(ms(599)));
    }

    #[test]
    fn huge_interval_saturates_next_due() {
        let mut t = RepeatingTick::arm(ms(5), Duration::MAX);
        assert_eq!(t.next_due(), Some(Duration::MAX));
        assert!(!t.poll(Duration::from_secs(1_000_000_000)));
    }

    #[test]
    fn cancelled_tick_never_fires() {
        let mut t = RepeatingTick::arm(ms(0), ms(10));
        t.cancel_all();
        assert!(!t.has_pending());
        assert!(!t.poll(ms(1000)));
        assert_eq!(t.next_due(), None);
    }

    #[test]
    fn queue_drains_in_due_order() {
        let mut q = OneShotQueue::new();
        q.schedule(ms(800), "c");
        q.schedule(ms(0), "a");
        q.schedule(ms(250), "b");
        assert_eq!(q.drain_due(ms(0)), vec!["a"]);
        assert_eq!(q.drain_due(ms(900)), vec!["b", "c"]);
        assert!(q.is_empty());
    }

    #[test]
    fn equal_due_times_keep_insertion_order() {
        let mut q = OneShotQueue::new();
        q.schedule(ms(5), 1);
        q.schedule(ms(5), 2);
        q.schedule(ms(5), 3);
        assert_eq!(q.drain_due(ms(5)), vec![1, 2, 3]);
    }

    #[test]
    fn cancel_clears_everything_pending() {
        let mut q = OneShotQueue::new();
        q.schedule(ms(5), 1);
        q.schedule(ms(50), 2);
        q.cancel_all();
        assert!(!q.has_pending());
        assert!(q.drain_due(ms(1000)).is_empty());
    }
}
