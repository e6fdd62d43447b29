use crate::avoidance::AvoidancePolicy;
use crate::constants::{HTTP_PORT, SERVO_MAX_DEGREES, SERVO_PERIOD_US};
use crate::drive::{Speeds, TurnStyle};
use core::fmt::{Display, Formatter};
use core::time::Duration;
use serde::{Deserialize, Serialize};

/// Options for the rover, read once at startup
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoverSettings {
    /// Options for the control server
    pub http: HttpSettings,
    /// Which pins each device is wired to
    pub pins: PinSettings,
    /// Options for the motors
    pub drive: DriveSettings,
    /// Options for infrared and ultrasonic polling
    pub sensors: SensorSettings,
    /// Options for the obstacle monitor
    pub avoidance: AvoidanceSettings,
    /// Options for the servo sweep
    pub radar: RadarSettings,
    /// Options for the video feed
    pub camera: CameraSettings,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpSettings {
    /// Address and port to listen on
    pub bind: String,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            bind: format!("0.0.0.0:{HTTP_PORT}"),
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UltrasonicPins {
    pub trigger: u8,
    pub echo: u8,
}

/// BCM pin numbers
///
/// A sensor without a pin is reported as not installed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PinSettings {
    pub in1: u8,
    pub in2: u8,
    pub in3: u8,
    pub in4: u8,
    /// Enable pin for channel A, carries the PWM signal
    pub ena: u8,
    /// Enable pin for channel B, carries the PWM signal
    pub enb: u8,
    pub ir_left: Option<u8>,
    pub ir_right: Option<u8>,
    /// Mounted on the radar servo
    pub us_front: Option<UltrasonicPins>,
    pub us_left: Option<UltrasonicPins>,
    pub us_right: Option<UltrasonicPins>,
    /// PCA9685 channel of the radar servo
    pub servo_channel: u8,
}

impl Default for PinSettings {
    fn default() -> Self {
        Self {
            in1: 26,
            in2: 19,
            in3: 13,
            in4: 6,
            ena: 12,
            enb: 5,
            ir_left: Some(20),
            ir_right: Some(21),
            us_front: Some(UltrasonicPins {
                trigger: 25,
                echo: 24,
            }),
            us_left: None,
            us_right: None,
            servo_channel: 0,
        }
    }
}

impl PinSettings {
    /// Every GPIO pin in use
    pub fn gpio_pins(&self) -> Vec<u8> {
        let mut pins = vec![self.in1, self.in2, self.in3, self.in4, self.ena, self.enb];
        pins.extend(self.ir_left);
        pins.extend(self.ir_right);
        for us in [self.us_front, self.us_left, self.us_right]
            .into_iter()
            .flatten()
        {
            pins.push(us.trigger);
            pins.push(us.echo);
        }
        pins
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriveSettings {
    /// Software PWM frequency on the enable pins
    pub pwm_frequency_hz: f64,
    /// Starting duty cycle for forward and backward, in percent
    pub linear_speed: u8,
    /// Starting duty cycle for turns, in percent
    pub turn_speed: u8,
    pub turn_style: TurnStyle,
}

impl Default for DriveSettings {
    fn default() -> Self {
        Self {
            pwm_frequency_hz: 100.0,
            linear_speed: 20,
            turn_speed: 20,
            turn_style: TurnStyle::Pivot,
        }
    }
}

impl DriveSettings {
    pub fn speeds(&self) -> Speeds {
        Speeds {
            linear: self.linear_speed,
            turn: self.turn_speed,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorSettings {
    /// Most infrared modules pull their output low when they see something
    pub ir_active_low: bool,
    /// Time between sensor readings
    pub poll_interval_ms: u64,
}

impl Default for SensorSettings {
    fn default() -> Self {
        Self {
            ir_active_low: true,
            poll_interval_ms: 20,
        }
    }
}

impl SensorSettings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Whether an infrared pin at this level means an obstacle
    pub fn ir_detects(&self, pin_high: bool) -> bool {
        pin_high != self.ir_active_low
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AvoidanceSettings {
    pub enabled: bool,
    pub policy: AvoidancePolicy,
    /// Ultrasonic readings closer than this count as obstacles
    pub threshold_cm: f32,
    pub poll_interval_ms: u64,
    /// Time stopped before turning away
    pub pause_ms: u64,
    /// Time spent turning away
    pub turn_ms: u64,
}

impl Default for AvoidanceSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            policy: AvoidancePolicy::Steer,
            threshold_cm: 20.0,
            poll_interval_ms: 50,
            pause_ms: 50,
            turn_ms: 300,
        }
    }
}

impl AvoidanceSettings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn pause(&self) -> Duration {
        Duration::from_millis(self.pause_ms)
    }

    pub fn turn(&self) -> Duration {
        Duration::from_millis(self.turn_ms)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RadarSettings {
    /// Start sweeping as soon as the rover starts
    pub start_on_boot: bool,
    pub step_degrees: u16,
    /// Time for the servo to reach each angle before measuring
    pub servo_delay_ms: u64,
    /// Time for the servo to center before the first sweep
    pub settle_ms: u64,
    /// Rest between full sweeps
    pub sweep_pause_ms: u64,
    /// Pulse width at 0 degrees
    pub min_pulse_us: u32,
    /// Pulse width at 180 degrees
    pub max_pulse_us: u32,
}

impl Default for RadarSettings {
    fn default() -> Self {
        Self {
            start_on_boot: true,
            step_degrees: 5,
            servo_delay_ms: 30,
            settle_ms: 1000,
            sweep_pause_ms: 500,
            min_pulse_us: 500,
            max_pulse_us: 2500,
        }
    }
}

impl RadarSettings {
    pub fn servo_delay(&self) -> Duration {
        Duration::from_millis(self.servo_delay_ms)
    }

    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    pub fn sweep_pause(&self) -> Duration {
        Duration::from_millis(self.sweep_pause_ms)
    }

    /// Pulse width, in microseconds, that points the servo at `degrees`
    pub fn pulse_width_us(&self, degrees: u16) -> u32 {
        let degrees = degrees.min(SERVO_MAX_DEGREES) as u32;
        let span = self.max_pulse_us - self.min_pulse_us;
        self.min_pulse_us + span * degrees / SERVO_MAX_DEGREES as u32
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraSettings {
    /// Serve `/video_feed`
    pub enabled: bool,
    /// Index of the video device, 0 for `/dev/video0`
    pub device: usize,
    pub width: u32,
    pub height: u32,
    /// Time between frames sent to viewers
    pub frame_interval_ms: u64,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            device: 0,
            width: 640,
            height: 480,
            frame_interval_ms: 100,
        }
    }
}

impl CameraSettings {
    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms)
    }
}

/// A problem with [`RoverSettings`] that would make the rover misbehave
#[derive(Clone, Debug, PartialEq)]
pub enum SettingsError {
    SpeedOutOfRange { name: &'static str, value: u8 },
    NotPositive(&'static str),
    RadarStep(u16),
    PulseRange { min_us: u32, max_us: u32 },
    PinReused(u8),
}

impl Display for SettingsError {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        match self {
            SettingsError::SpeedOutOfRange { name, value } => {
                write!(f, "{name} must be between 0 and 100, got {value}")
            }
            SettingsError::NotPositive(name) => write!(f, "{name} must be greater than zero"),
            SettingsError::RadarStep(step) => {
                write!(f, "radar step must be between 1 and 180 degrees, got {step}")
            }
            SettingsError::PulseRange { min_us, max_us } => write!(
                f,
                "servo pulse range {min_us}..{max_us} us must be increasing and within {SERVO_PERIOD_US} us"
            ),
            SettingsError::PinReused(pin) => write!(f, "BCM pin {pin} is assigned more than once"),
        }
    }
}

impl std::error::Error for SettingsError {}

impl RoverSettings {
    pub fn validate(&self) -> Result<(), SettingsError> {
        for (name, value) in [
            ("drive.linear_speed", self.drive.linear_speed),
            ("drive.turn_speed", self.drive.turn_speed),
        ] {
            if value > 100 {
                return Err(SettingsError::SpeedOutOfRange { name, value });
            }
        }
        if !(self.drive.pwm_frequency_hz > 0.0) {
            return Err(SettingsError::NotPositive("drive.pwm_frequency_hz"));
        }
        if !(self.avoidance.threshold_cm > 0.0) {
            return Err(SettingsError::NotPositive("avoidance.threshold_cm"));
        }
        for (name, value) in [
            ("sensors.poll_interval_ms", self.sensors.poll_interval_ms),
            ("avoidance.poll_interval_ms", self.avoidance.poll_interval_ms),
        ] {
            if value == 0 {
                return Err(SettingsError::NotPositive(name));
            }
        }
        if !(1..=SERVO_MAX_DEGREES).contains(&self.radar.step_degrees) {
            return Err(SettingsError::RadarStep(self.radar.step_degrees));
        }
        if self.radar.min_pulse_us >= self.radar.max_pulse_us
            || self.radar.max_pulse_us > SERVO_PERIOD_US
        {
            return Err(SettingsError::PulseRange {
                min_us: self.radar.min_pulse_us,
                max_us: self.radar.max_pulse_us,
            });
        }
        if self.camera.enabled {
            for (name, value) in [
                ("camera.width", self.camera.width as u64),
                ("camera.height", self.camera.height as u64),
                ("camera.frame_interval_ms", self.camera.frame_interval_ms),
            ] {
                if value == 0 {
                    return Err(SettingsError::NotPositive(name));
                }
            }
        }
        let mut pins = self.pins.gpio_pins();
        pins.sort_unstable();
        if let Some(pair) = pins.windows(2).find(|pair| pair[0] == pair[1]) {
            return Err(SettingsError::PinReused(pair[0]));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert_eq!(RoverSettings::default().validate(), Ok(()));
    }

    #[test]
    fn default_wiring() {
        let pins = PinSettings::default();
        assert_eq!(
            pins.gpio_pins(),
            vec![26, 19, 13, 6, 12, 5, 20, 21, 25, 24]
        );
    }

    #[test]
    fn partial_json_uses_defaults() {
        let settings: RoverSettings =
            serde_json::from_str(r#"{"drive": {"linear_speed": 45}, "radar": {"start_on_boot": false}}"#)
                .unwrap();
        assert_eq!(settings.drive.linear_speed, 45);
        assert_eq!(settings.drive.turn_speed, 20);
        assert!(!settings.radar.start_on_boot);
        assert_eq!(settings.radar.step_degrees, 5);
        assert_eq!(settings.pins, PinSettings::default());
    }

    #[test]
    fn rejects_bad_values() {
        let mut settings = RoverSettings::default();
        settings.drive.turn_speed = 101;
        assert_eq!(
            settings.validate(),
            Err(SettingsError::SpeedOutOfRange {
                name: "drive.turn_speed",
                value: 101
            })
        );

        let mut settings = RoverSettings::default();
        settings.radar.step_degrees = 0;
        assert_eq!(settings.validate(), Err(SettingsError::RadarStep(0)));

        let mut settings = RoverSettings::default();
        settings.pins.ir_right = Some(26);
        assert_eq!(settings.validate(), Err(SettingsError::PinReused(26)));

        let mut settings = RoverSettings::default();
        settings.camera.frame_interval_ms = 0;
        assert_eq!(
            settings.validate(),
            Err(SettingsError::NotPositive("camera.frame_interval_ms"))
        );
        settings.camera.enabled = false;
        assert_eq!(settings.validate(), Ok(()));
    }

    #[test]
    fn infrared_polarity() {
        let active_low = SensorSettings::default();
        assert!(active_low.ir_detects(false));
        assert!(!active_low.ir_detects(true));
        let active_high = SensorSettings {
            ir_active_low: false,
            ..Default::default()
        };
        assert!(active_high.ir_detects(true));
    }

    #[test]
    fn servo_pulse_widths() {
        let radar = RadarSettings::default();
        assert_eq!(radar.pulse_width_us(0), 500);
        assert_eq!(radar.pulse_width_us(90), 1500);
        assert_eq!(radar.pulse_width_us(180), 2500);
        assert_eq!(radar.pulse_width_us(270), 2500);
    }
}
