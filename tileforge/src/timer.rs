//! Countdown timers measured in simulated seconds.
//!
//! A timer stores only its end time; every query takes the current world
//! clock (`World::time()`), so timers never drift from the simulation.

/// Simulation-time timer. An unset timer is neither active nor elapsed.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Timer {
    end: Option<f64>,
    duration: f64,
}

impl Timer {
    /// Create a timer that ends `seconds` after `now`.
    pub fn new(now: f64, seconds: f64) -> Self {
        let mut t = Self::default();
        t.set(now, seconds);
        t
    }

    pub fn set(&mut self, now: f64, seconds: f64) {
        self.end = Some(now + seconds);
        self.duration = seconds;
    }

    pub fn unset(&mut self) {
        self.end = None;
    }

    pub fn is_set(&self) -> bool {
        self.end.is_some()
    }

    /// Set and not yet elapsed.
    pub fn active(&self, now: f64) -> bool {
        matches!(self.end, Some(end) if now < end)
    }

    /// Set and the end time has been reached.
    pub fn elapsed(&self, now: f64) -> bool {
        matches!(self.end, Some(end) if now >= end)
    }

    /// Seconds relative to the end time (negative while active), 0 if unset.
    pub fn get(&self, now: f64) -> f64 {
        self.end.map_or(0.0, |end| now - end)
    }

    /// Fraction of the duration that has passed, clamped to `[0, 1]`.
    pub fn percent(&self, now: f64) -> f32 {
        match self.end {
            Some(end) if self.duration > 0.0 => {
                (1.0 - (end - now) / self.duration).clamp(0.0, 1.0) as f32
            }
            Some(end) => {
                if now >= end {
                    1.0
                } else {
                    0.0
                }
            }
            None => 0.0,
        }
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }
}
