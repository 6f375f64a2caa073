// src/pipeline/clock.rs
//
// Time source for alert debounce and idle eviction. Injected at engine
// construction; replays drive it from recorded frame timestamps.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

pub trait Clock {
    /// Milliseconds since an arbitrary, fixed origin. Must not go backwards.
    fn now_ms(&self) -> f64;
}

/// Externally driven clock. Clones share the same time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    bits: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new(start_ms: f64) -> Self {
        Self {
            bits: Arc::new(AtomicU64::new(start_ms.to_bits())),
        }
    }

    pub fn set_ms(&self, now_ms: f64) {
        self.bits.store(now_ms.to_bits(), Ordering::Relaxed);
    }

    pub fn advance_ms(&self, delta_ms: f64) {
        self.set_ms(self.now_ms() + delta_ms);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> f64 {
        f64::from_bits(self.bits.load(Ordering::Relaxed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_is_shared_between_clones() {
        let clock = ManualClock::new(100.0);
        let handle = clock.clone();
        handle.advance_ms(40.0);
        assert_eq!(clock.now_ms(), 140.0);
        clock.set_ms(1000.0);
        assert_eq!(handle.now_ms(), 1000.0);
    }
}
