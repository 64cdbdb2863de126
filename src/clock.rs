//! Frame timing consumed by system variables (`t`, `dt`, `frame`, ...).
//!
//! The host owns the frame loop, so the clock is installed from outside with
//! [`set_clock`]. Until then a [`WallClock`] running at a nominal frame rate is
//! used.

use std::sync::{Arc, PoisonError, RwLock};
use std::time::Instant;

use once_cell::sync::Lazy;

/// Source of frame timing.
pub trait FrameClock: Send + Sync {
    /// Seconds since the clock started.
    fn time(&self) -> f64;
    /// Duration of the last frame in seconds.
    fn delta_time(&self) -> f64;
    /// Frames elapsed since the clock started.
    fn frame_count(&self) -> u64;
    /// Time at the last fixed-step update.
    fn fixed_time(&self) -> f64;
    /// Interval between fixed-step updates.
    fn fixed_delta_time(&self) -> f64;
}

static CLOCK: Lazy<RwLock<Arc<dyn FrameClock>>> = Lazy::new(|| {
    let clock: Arc<dyn FrameClock> = Arc::new(WallClock::default());
    RwLock::new(clock)
});

/// Replaces the process-wide clock.
pub fn set_clock(clock: Arc<dyn FrameClock>) {
    *CLOCK.write().unwrap_or_else(PoisonError::into_inner) = clock;
}

/// The currently installed clock.
pub fn clock() -> Arc<dyn FrameClock> {
    CLOCK.read().unwrap_or_else(PoisonError::into_inner).clone()
}

/// Derives frame timing from real elapsed time and a nominal frame rate.
#[derive(Clone, Debug)]
pub struct WallClock {
    start: Instant,
    delta_time: f64,
    fixed_delta_time: f64,
}

impl WallClock {
    pub fn new(frame_rate: f64, fixed_delta_time: f64) -> Self {
        Self {
            start: Instant::now(),
            delta_time: 1.0 / frame_rate,
            fixed_delta_time,
        }
    }
}

impl Default for WallClock {
    fn default() -> Self {
        Self::new(60.0, 0.02)
    }
}

impl FrameClock for WallClock {
    fn time(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }

    fn delta_time(&self) -> f64 {
        self.delta_time
    }

    fn frame_count(&self) -> u64 {
        (self.time() / self.delta_time) as u64
    }

    fn fixed_time(&self) -> f64 {
        (self.time() / self.fixed_delta_time).floor() * self.fixed_delta_time
    }

    fn fixed_delta_time(&self) -> f64 {
        self.fixed_delta_time
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
struct FrameState {
    time: f64,
    delta_time: f64,
    frame_count: u64,
    fixed_time: f64,
}

/// A clock advanced explicitly by the host, one frame at a time.
#[derive(Debug)]
pub struct ManualClock {
    state: RwLock<FrameState>,
    fixed_delta_time: f64,
}

impl ManualClock {
    pub fn new(fixed_delta_time: f64) -> Self {
        Self {
            state: RwLock::new(FrameState::default()),
            fixed_delta_time,
        }
    }

    /// Ends a frame that lasted `delta_time` seconds.
    pub fn advance(&self, delta_time: f64) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state.time += delta_time;
        state.delta_time = delta_time;
        state.frame_count += 1;
        if self.fixed_delta_time > 0.0 {
            while state.fixed_time + self.fixed_delta_time <= state.time {
                state.fixed_time += self.fixed_delta_time;
            }
        }
    }

    fn snapshot(&self) -> FrameState {
        *self.state.read().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(0.02)
    }
}

impl FrameClock for ManualClock {
    fn time(&self) -> f64 {
        self.snapshot().time
    }

    fn delta_time(&self) -> f64 {
        self.snapshot().delta_time
    }

    fn frame_count(&self) -> u64 {
        self.snapshot().frame_count
    }

    fn fixed_time(&self) -> f64 {
        self.snapshot().fixed_time
    }

    fn fixed_delta_time(&self) -> f64 {
        self.fixed_delta_time
    }
}
