//! HC-SR04 echo timing and distance conversion

use crate::constants::{
    HALF_SPEED_OF_SOUND_CM_PER_S, ULTRASONIC_ECHO_TIMEOUT, ULTRASONIC_MAX_CM, ULTRASONIC_MIN_CM,
};
use std::time::{Duration, Instant};

/// Convert the length of an echo pulse into a distance in cm
///
/// Returns `None` when the result is outside the range the sensor measures reliably, or when
/// the echo lasted at least the full [`ULTRASONIC_ECHO_TIMEOUT`].
pub fn echo_to_distance(echo: Duration) -> Option<f32> {
    if echo >= ULTRASONIC_ECHO_TIMEOUT {
        return None;
    }
    let cm = echo.as_secs_f32() * HALF_SPEED_OF_SOUND_CM_PER_S;
    let cm = (cm * 100.0).round() / 100.0;
    (ULTRASONIC_MIN_CM..=ULTRASONIC_MAX_CM)
        .contains(&cm)
        .then_some(cm)
}

/// Busy-wait for one echo pulse and measure how long it stayed high
///
/// Waits for the echo to rise and then to fall, giving each edge up to `timeout`. A missed
/// edge gives `Ok(None)`.
pub fn time_echo<E>(
    mut echo_is_high: impl FnMut() -> Result<bool, E>,
    timeout: Duration,
) -> Result<Option<Duration>, E> {
    let waiting = Instant::now();
    while !echo_is_high()? {
        if waiting.elapsed() >= timeout {
            return Ok(None);
        }
    }
    let pulse_start = Instant::now();
    while echo_is_high()? {
        if pulse_start.elapsed() >= timeout {
            return Ok(None);
        }
    }
    Ok(Some(pulse_start.elapsed()))
}
