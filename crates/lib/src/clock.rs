//! Time source for mutation timestamps.
//!
//! Production code uses [`SystemClock`]. Tests inject a [`FixedClock`] so
//! ledger timestamps are predictable.
//!
//! ```
//! use orderly::{Clock, SystemClock};
//!
//! let clock = SystemClock;
//! assert!(clock.now_millis() > 0);
//! ```

use std::fmt::Debug;
use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{DateTime, Utc};

#[cfg(any(test, feature = "testing"))]
use std::sync::Mutex;

/// A source of wall-clock time.
pub trait Clock: Send + Sync + Debug {
    /// Milliseconds since the Unix epoch.
    fn now_millis(&self) -> u64;

    /// The current time as a UTC timestamp.
    fn now_utc(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.now_millis() as i64).unwrap_or_default()
    }
}

/// Real system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }
}

/// Controllable clock for tests.
///
/// Every reading advances the clock by `step` milliseconds (1 by default),
/// so consecutive timestamps are strictly increasing.
///
/// ```
/// use orderly::{Clock, FixedClock};
///
/// let clock = FixedClock::new(1_000);
/// assert_eq!(clock.now_millis(), 1_000);
/// assert_eq!(clock.now_millis(), 1_001);
///
/// clock.advance(500);
/// assert_eq!(clock.get(), 1_502);
/// ```
#[cfg(any(test, feature = "testing"))]
#[derive(Debug)]
pub struct FixedClock {
    millis: Mutex<u64>,
    step: u64,
}

#[cfg(any(test, feature = "testing"))]
impl FixedClock {
    /// A clock starting at `millis`.
    pub fn new(millis: u64) -> Self {
        Self {
            millis: Mutex::new(millis),
            step: 1,
        }
    }

    /// A clock that does not move unless told to.
    pub fn frozen(millis: u64) -> Self {
        Self {
            millis: Mutex::new(millis),
            step: 0,
        }
    }

    pub fn advance(&self, ms: u64) {
        *self.millis.lock().unwrap() += ms;
    }

    pub fn set(&self, ms: u64) {
        *self.millis.lock().unwrap() = ms;
    }

    /// The current value, without advancing.
    pub fn get(&self) -> u64 {
        *self.millis.lock().unwrap()
    }
}

#[cfg(any(test, feature = "testing"))]
impl Default for FixedClock {
    fn default() -> Self {
        // 2025-01-01 00:00:00 UTC
        Self::new(1_735_689_600_000)
    }
}

#[cfg(any(test, feature = "testing"))]
impl Clock for FixedClock {
    fn now_millis(&self) -> u64 {
        let mut millis = self.millis.lock().unwrap();
        let now = *millis;
        *millis += self.step;
        now
    }
}
