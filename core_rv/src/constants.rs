use core::time::Duration;

/// Port the control server listens on unless configured otherwise
pub const HTTP_PORT: u16 = 8000;

/// How many motor requests may wait for the motors task before senders block
pub const MOTOR_REQUEST_QUEUE: usize = 16;

/// Half the speed of sound, in cm/s
///
/// An echo travels to the obstacle and back, so its duration times this is the distance
pub const HALF_SPEED_OF_SOUND_CM_PER_S: f32 = 17150.0;
/// Closest distance, in cm, an HC-SR04 reports reliably
pub const ULTRASONIC_MIN_CM: f32 = 2.0;
/// Farthest distance, in cm, an HC-SR04 reports reliably
pub const ULTRASONIC_MAX_CM: f32 = 400.0;
/// Longest wait for either edge of an echo pulse
pub const ULTRASONIC_ECHO_TIMEOUT: Duration = Duration::from_millis(50);

pub const SERVO_CENTER_DEGREES: u16 = 90;
pub const SERVO_MAX_DEGREES: u16 = 180;
/// PCA9685 boards drive servos at 50 Hz, a 20 ms period
pub const SERVO_PERIOD_US: u32 = 20_000;
