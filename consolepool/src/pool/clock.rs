//! Lock-free last-access timestamps.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Last-access time stored as nanoseconds since creation.
///
/// Every [`touch`](AccessClock::touch) yields a strictly larger value than
/// the one before it, even when two touches land in the same clock tick.
#[derive(Debug)]
pub(crate) struct AccessClock {
    started: Instant,
    last: AtomicU64,
}

impl AccessClock {
    pub(crate) fn new() -> Self {
        Self {
            started: Instant::now(),
            last: AtomicU64::new(0),
        }
    }

    fn now_nanos(&self) -> u64 {
        u64::try_from(self.started.elapsed().as_nanos()).unwrap_or(u64::MAX)
    }

    /// Record an access and return its timestamp.
    pub(crate) fn touch(&self) -> u64 {
        let now = self.now_nanos();
        let mut prev = self.last.load(Ordering::Acquire);
        loop {
            let next = now.max(prev.saturating_add(1));
            match self
                .last
                .compare_exchange_weak(prev, next, Ordering::AcqRel, Ordering::Acquire)
            {
                Ok(_) => return next,
                Err(actual) => prev = actual,
            }
        }
    }

    /// Raw timestamp of the last access.
    pub(crate) fn last_nanos(&self) -> u64 {
        self.last.load(Ordering::Acquire)
    }

    /// Time of the last access.
    pub(crate) fn last_accessed(&self) -> Instant {
        self.started + Duration::from_nanos(self.last_nanos())
    }

    /// Time since the last access.
    pub(crate) fn idle_for(&self) -> Duration {
        Duration::from_nanos(self.now_nanos().saturating_sub(self.last_nanos()))
    }

    /// Time since creation.
    pub(crate) fn uptime(&self) -> Duration {
        self.started.elapsed()
    }
}
