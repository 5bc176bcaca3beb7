//! Wall-clock access for cache expiry
//!
//! Expiry decisions read time through the `Clock` trait so tests can move
//! time by hand. Nothing here feeds the scoring path.

use chrono::Utc;
use std::sync::atomic::{AtomicI64, Ordering};

/// Current Unix time in milliseconds
pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// Source of wall-clock time for expiry decisions
pub trait Clock: Send + Sync + std::fmt::Debug {
    /// Unix time in milliseconds
    fn now_ms(&self) -> i64;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        now_ms()
    }
}

/// Manually advanced clock for expiry tests
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    pub fn new(start_ms: i64) -> Self {
        Self {
            now: AtomicI64::new(start_ms),
        }
    }

    pub fn advance_ms(&self, delta: i64) {
        self.now.fetch_add(delta, Ordering::SeqCst);
    }

    pub fn set_ms(&self, value: i64) {
        self.now.store(value, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}
