//! Periodic job scheduling driven by the tick clock

use std::time::{Duration, Instant};

/// Decides whether a periodic job should run on this tick.
pub trait Scheduler: Send {
    fn due(&mut self, now: Instant) -> bool;
}

/// Fires every `every`, the first time one full interval after it was first
/// consulted. A zero interval never fires.
#[derive(Debug, Clone)]
pub struct IntervalScheduler {
    every: Duration,
    next: Option<Instant>,
}

impl IntervalScheduler {
    pub fn new(every: Duration) -> Self {
        Self { every, next: None }
    }
}

impl Scheduler for IntervalScheduler {
    fn due(&mut self, now: Instant) -> bool {
        if self.every.is_zero() {
            return false;
        }
        match self.next {
            None => {
                self.next = Some(now + self.every);
                false
            }
            Some(next) if now >= next => {
                // Re-arm from now so a stalled loop does not fire in bursts
                self.next = Some(now + self.every);
                true
            }
            Some(_) => false,
        }
    }
}
