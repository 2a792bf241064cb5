//! Session runtime settings.

use std::time::Duration;

use crate::game::constants::{HINT_READ_DELAY, MIN_GUESS_SECONDS};

/// Runtime settings shared by every session actor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionTiming {
    /// Pause between a hint and the next betting round (default: 5s)
    pub hint_read_delay: Duration,

    /// Attempts per action before a store conflict is reported (default: 3)
    pub max_write_attempts: u32,

    /// Actor inbox capacity (default: 100)
    pub inbox_capacity: usize,

    /// Change feed buffer per subscriber (default: 256)
    pub feed_capacity: usize,

    /// Shortest guessing phase accepted at session creation (default: 30s)
    pub min_guess_seconds: u64,
}

impl Default for SessionTiming {
    fn default() -> Self {
        Self {
            hint_read_delay: HINT_READ_DELAY,
            max_write_attempts: 3,
            inbox_capacity: 100,
            feed_capacity: 256,
            min_guess_seconds: MIN_GUESS_SECONDS,
        }
    }
}

impl SessionTiming {
    /// Settings for simulations and tests: short guessing phases allowed.
    pub fn fast() -> Self {
        Self {
            hint_read_delay: Duration::from_secs(1),
            min_guess_seconds: 1,
            ..Self::default()
        }
    }
}
