//! Human-readable order numbers derived from the wall clock

use std::sync::{
    Mutex, PoisonError,
    atomic::{AtomicI64, Ordering},
};

use chrono::Utc;
use common::config::OrderNumberStrategy;

/// Consecutive taken numbers tolerated for one order before giving up.
///
/// Numbers handed out by one generator never repeat, so only numbers
/// claimed by another process can use these up.
pub const MAX_ATTEMPTS: u32 = 8;

/// Second the suffix counter belongs to, and the next suffix in it
#[derive(Default)]
struct SuffixCounter {
    second: i64,
    next: u64,
}

pub struct OrderNumberGenerator {
    strategy: OrderNumberStrategy,
    last: AtomicI64,
    suffixes: Mutex<SuffixCounter>,
    clock: fn() -> i64,
}

fn unix_seconds() -> i64 {
    Utc::now().timestamp()
}

impl OrderNumberGenerator {
    pub fn new(strategy: OrderNumberStrategy) -> Self {
        Self::with_clock(strategy, unix_seconds)
    }

    pub fn with_clock(strategy: OrderNumberStrategy, clock: fn() -> i64) -> Self {
        Self {
            strategy,
            last: AtomicI64::new(0),
            suffixes: Mutex::new(SuffixCounter::default()),
            clock,
        }
    }

    pub fn strategy(&self) -> OrderNumberStrategy {
        self.strategy
    }

    /// Numbers to try, in order, for a single new order.
    ///
    /// `suffix` yields `ORD-<secs>` for the first order of a second and
    /// `ORD-<secs>-<n>` after it, with `n` counting up for as long as the
    /// second lasts. `monotonic` reserves a fresh second from a process-wide
    /// clock that never repeats or goes backwards. Every attempt takes a
    /// number no earlier call has seen.
    pub fn candidates(&self) -> impl Iterator<Item = String> + '_ {
        (0..MAX_ATTEMPTS).map(move |_| match self.strategy {
            OrderNumberStrategy::Suffix => {
                let (second, suffix) = self.next_suffix();
                match suffix {
                    0 => format!("ORD-{second}"),
                    n => format!("ORD-{second}-{n}"),
                }
            }
            OrderNumberStrategy::Monotonic => format!("ORD-{}", self.reserve()),
        })
    }

    fn next_suffix(&self) -> (i64, u64) {
        let now = (self.clock)();
        let mut counter = self.suffixes.lock().unwrap_or_else(PoisonError::into_inner);
        if counter.second != now {
            *counter = SuffixCounter {
                second: now,
                next: 0,
            };
        }
        let suffix = counter.next;
        counter.next += 1;
        (now, suffix)
    }

    fn reserve(&self) -> i64 {
        let now = (self.clock)();
        let previous = self
            .last
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
                Some(now.max(last + 1))
            })
            .unwrap_or_else(|last| last);
        now.max(previous + 1)
    }
}
