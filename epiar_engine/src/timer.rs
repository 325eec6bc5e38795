use std::cell::Cell;
use std::rc::Rc;
use std::time::{Duration, Instant};

/// Source of millisecond ticks for the frame timer.
pub trait TickSource {
    fn now_ms(&self) -> u64;
}

/// Wall clock measured from the moment the source was created.
#[derive(Debug)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        SystemClock {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl TickSource for SystemClock {
    fn now_ms(&self) -> u64 {
        self.origin.elapsed().as_millis() as u64
    }
}

/// Hand-driven clock. Clones share the same counter, so a test can keep one
/// copy and give the other to the timer.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Rc<Cell<u64>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, ms: u64) {
        self.now.set(self.now.get() + ms);
    }

    pub fn set(&self, ms: u64) {
        self.now.set(ms);
    }
}

impl TickSource for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now.get()
    }
}

/// Per-frame timing: the tick at which the last loop finished and how long
/// that loop took.
pub struct Timer {
    clock: Box<dyn TickSource>,
    last_loop_tick: u64,
    last_loop_length: u64,
    ticks_per_frame: u64,
}

impl Timer {
    pub fn new(clock: Box<dyn TickSource>, ticks_per_frame: u64) -> Self {
        let now = clock.now_ms();
        Timer {
            clock,
            last_loop_tick: now,
            last_loop_length: 25,
            ticks_per_frame,
        }
    }

    pub fn update(&mut self) {
        let now = self.clock.now_ms();
        self.last_loop_length = now.saturating_sub(self.last_loop_tick);
        self.last_loop_tick = now;
    }

    /// Tick recorded by the most recent `update`.
    pub fn ticks(&self) -> u64 {
        self.last_loop_tick
    }

    /// Length of the last loop in seconds.
    pub fn delta(&self) -> f32 {
        self.last_loop_length as f32 / 1000.0
    }

    /// Time left in the current frame before the fps cap is reached.
    pub fn frame_budget(&self) -> Duration {
        let elapsed = self.clock.now_ms().saturating_sub(self.last_loop_tick);
        Duration::from_millis(self.ticks_per_frame.saturating_sub(elapsed))
    }
}

impl std::fmt::Debug for Timer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Timer")
            .field("last_loop_tick", &self.last_loop_tick)
            .field("last_loop_length", &self.last_loop_length)
            .field("ticks_per_frame", &self.ticks_per_frame)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_measures_loop_length() {
        let clock = ManualClock::new();
        clock.set(100);
        let mut timer = Timer::new(Box::new(clock.clone()), 20);
        clock.advance(40);
        timer.update();
        assert_eq!(timer.ticks(), 140);
        assert!((timer.delta() - 0.04).abs() < f32::EPSILON);
    }

    #[test]
    fn frame_budget_shrinks_as_time_passes() {
        let clock = ManualClock::new();
        let mut timer = Timer::new(Box::new(clock.clone()), 20);
        timer.update();
        clock.advance(5);
        assert_eq!(timer.frame_budget(), Duration::from_millis(15));
        clock.advance(50);
        assert_eq!(timer.frame_budget(), Duration::ZERO);
    }
}
