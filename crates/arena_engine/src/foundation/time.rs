//! Time management utilities
//!
//! The simulation runs on a fixed tick decoupled from the frame rate. The
//! [`Clock`] measures wall-clock seconds since start, and the
//! [`TickAccumulator`] turns those into a whole number of simulation ticks.

use std::time::Instant;

/// Monotonic wall clock reporting seconds since creation
pub struct Clock {
    start: Instant,
}

impl Default for Clock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock {
    /// Create a new clock starting at zero
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Seconds elapsed since the clock was created
    pub fn now(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }
}

/// Fixed-timestep accumulator
///
/// Each frame reports the current time; the accumulator answers how many
/// fixed ticks have become due since the last call.
#[derive(Debug, Clone)]
pub struct TickAccumulator {
    tick_duration: f64,
    next_tick_time: f64,
    tick_count: u64,
    max_ticks_per_frame: u32,
}

impl TickAccumulator {
    /// Create an accumulator whose first tick is due at `start_time`
    pub fn new(tick_duration: f64, start_time: f64) -> Self {
        Self {
            tick_duration,
            next_tick_time: start_time,
            tick_count: 0,
            max_ticks_per_frame: 8,
        }
    }

    /// Limit how many ticks a single frame may run before the schedule is
    /// pulled forward to `now`
    pub fn with_max_ticks_per_frame(mut self, max_ticks: u32) -> Self {
        self.max_ticks_per_frame = max_ticks.max(1);
        self
    }

    /// Number of ticks due at `now`; advances the schedule past them
    pub fn advance(&mut self, now: f64) -> u32 {
        let mut due = 0;
        while now >= self.next_tick_time {
            if due == self.max_ticks_per_frame {
                log::debug!(
                    "Tick schedule fell behind by {:.3}s, skipping ahead",
                    now - self.next_tick_time
                );
                self.next_tick_time = now + self.tick_duration;
                break;
            }
            self.next_tick_time += self.tick_duration;
            self.tick_count += 1;
            due += 1;
        }
        due
    }

    /// Duration of a single tick in seconds
    pub fn tick_duration(&self) -> f64 {
        self.tick_duration
    }

    /// Total ticks run so far
    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    /// Time the next tick becomes due
    pub fn next_tick_time(&self) -> f64 {
        self.next_tick_time
    }

    /// Restart the schedule at `now`
    pub fn reset(&mut self, now: f64) {
        self.next_tick_time = now;
        self.tick_count = 0;
    }
}
