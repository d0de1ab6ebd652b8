//! Manually driven clock for tests and simulations.

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use crate::domain::foundation::Timestamp;
use crate::ports::Clock;

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<Timestamp>,
}

impl ManualClock {
    pub fn starting_at(start: Timestamp) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    /// Move time forward.
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        *now = now.plus(by);
    }

    /// Jump to an arbitrary point in time.
    pub fn set(&self, to: Timestamp) {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner) = to;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::starting_at(Timestamp::now())
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advance_moves_time_forward() {
        let clock = ManualClock::starting_at(Timestamp::from_unix_secs(1_000));
        clock.advance(Duration::from_secs(30));
        assert_eq!(clock.now(), Timestamp::from_unix_secs(1_030));
    }

    #[test]
    fn set_jumps_to_time() {
        let clock = ManualClock::starting_at(Timestamp::from_unix_secs(1_000));
        clock.set(Timestamp::from_unix_secs(5));
        assert_eq!(clock.now().as_unix_secs(), 5);
    }
}
