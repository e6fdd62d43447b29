use core::time::Duration;

pub mod moving_sum;
pub mod utilization;

/// A monotonic clock the robot tasks can be run against
///
/// `Default` must return the current time.
pub trait CrossPlatformInstant: Copy {
    fn elapsed(&self) -> Duration;

    fn checked_duration_since(&self, other: Self) -> Option<Duration>;

    /// Wait for the given duration on this clock
    async fn sleep(duration: Duration);
}

/// [`CrossPlatformInstant`] backed by the tokio clock, so that paused test time applies to it
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct TokioInstant(tokio::time::Instant);

impl Default for TokioInstant {
    fn default() -> Self {
        Self(tokio::time::Instant::now())
    }
}

impl CrossPlatformInstant for TokioInstant {
    fn elapsed(&self) -> Duration {
        self.0.elapsed()
    }

    fn checked_duration_since(&self, other: Self) -> Option<Duration> {
        self.0.checked_duration_since(other.0)
    }

    async fn sleep(duration: Duration) {
        tokio::time::sleep(duration).await
    }
}
