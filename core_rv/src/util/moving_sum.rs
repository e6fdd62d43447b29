use core::ops::{Add, Sub};
use core::time::Duration;

/// Values that can be summed in a [`MovingSum`]
pub trait Number: Copy + Add<Output = Self> + Sub<Output = Self> {
    const ZERO: Self;
}

impl Number for Duration {
    const ZERO: Self = Self::ZERO;
}

/// Running total of the last `COUNT` values added, kept in a ring buffer
#[derive(Copy, Clone, Debug)]
pub struct MovingSum<T, const COUNT: usize> {
    measurements: [Option<T>; COUNT],
    idx: usize,
    sum: T,
}

impl<T: Number, const COUNT: usize> Default for MovingSum<T, COUNT> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Number, const COUNT: usize> MovingSum<T, COUNT> {
    pub fn new() -> Self {
        Self {
            measurements: [None; COUNT],
            idx: 0,
            sum: T::ZERO,
        }
    }

    pub fn add(&mut self, new: T) {
        if let Some(oldest) = self.measurements[self.idx] {
            self.sum = self.sum - oldest;
        }
        self.measurements[self.idx] = Some(new);
        self.sum = self.sum + new;
        self.idx = (self.idx + 1) % COUNT;
    }

    pub fn sum(&self) -> T {
        self.sum
    }
}
