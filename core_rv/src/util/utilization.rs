use crate::util::moving_sum::MovingSum;
use crate::util::CrossPlatformInstant;
use core::time::Duration;

/// Tracks what fraction of time a task spends working rather than sleeping
///
/// Call [`UtilizationMonitor::start`] when the task wakes and [`UtilizationMonitor::stop`]
/// before it sleeps.
#[derive(Copy, Clone)]
pub struct UtilizationMonitor<const C: usize, I> {
    last_start: I,
    last_stop: I,
    active_durations: MovingSum<Duration, C>,
    inactive_durations: MovingSum<Duration, C>,
}

impl<const C: usize, I: CrossPlatformInstant + Default> Default for UtilizationMonitor<C, I> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const C: usize, I: CrossPlatformInstant + Default> UtilizationMonitor<C, I> {
    pub fn new() -> Self {
        Self {
            last_start: I::default(),
            last_stop: I::default(),
            active_durations: MovingSum::new(),
            inactive_durations: MovingSum::new(),
        }
    }

    pub fn start(&mut self) {
        let now = I::default();
        if let Some(t) = now.checked_duration_since(self.last_stop) {
            self.inactive_durations.add(t)
        }
        self.last_start = now;
    }

    pub fn stop(&mut self) {
        let now = I::default();
        if let Some(t) = now.checked_duration_since(self.last_start) {
            self.active_durations.add(t)
        }
        self.last_stop = now;
    }

    /// Fraction of time active, 0.0 before anything was measured
    pub fn utilization(&self) -> f32 {
        let total = self.active_durations.sum() + self.inactive_durations.sum();
        if total.is_zero() {
            0.0
        } else {
            self.active_durations.sum().as_secs_f32() / total.as_secs_f32()
        }
    }
}
