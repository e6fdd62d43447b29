use crate::avoidance::{Obstacle, StopReason};
use crate::drive::DriveCommand;
use crate::radar::RadarPoint;
use core::fmt::{Display, Formatter};
use serde::{Deserialize, Serialize};

pub mod settings;

/// The tasks that report utilization, in the order of [`crate::driving::data::SharedRoverData::utilization`]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Task {
    Motors,
    Peripherals,
    Obstacles,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Left,
    Right,
}

/// Where an ultrasonic sensor points
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UltrasonicPosition {
    /// Mounted on the radar servo
    Front,
    Left,
    Right,
}

/// One sensor's result for one polling cycle
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "value", rename_all = "snake_case")]
pub enum Reading<T> {
    /// No pin is configured for this sensor
    #[default]
    NotInstalled,
    /// The hardware reported an error
    Failed(String),
    Ok(T),
}

impl<T> Reading<T> {
    pub fn from_result<E: core::fmt::Debug>(result: Result<T, E>) -> Self {
        match result {
            Ok(x) => Reading::Ok(x),
            Err(e) => Reading::Failed(format!("{e:?}")),
        }
    }

    pub fn ok(&self) -> Option<&T> {
        match self {
            Reading::Ok(x) => Some(x),
            _ => None,
        }
    }
}

/// Everything the peripherals task measured in one cycle
///
/// - infrared: `true` means an obstacle is detected
/// - ultrasonic: `Ok(None)` means the sensor works but nothing is in range
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SensorData {
    pub ir_left: Reading<bool>,
    pub ir_right: Reading<bool>,
    pub us_front: Reading<Option<f32>>,
    pub us_left: Reading<Option<f32>>,
    pub us_right: Reading<Option<f32>>,
}

impl SensorData {
    pub fn infrared(&self, side: Side) -> &Reading<bool> {
        match side {
            Side::Left => &self.ir_left,
            Side::Right => &self.ir_right,
        }
    }

    pub fn ultrasonic(&self, position: UltrasonicPosition) -> &Reading<Option<f32>> {
        match position {
            UltrasonicPosition::Front => &self.us_front,
            UltrasonicPosition::Left => &self.us_left,
            UltrasonicPosition::Right => &self.us_right,
        }
    }

    /// Whether the infrared sensor on this side is reporting an obstacle
    pub fn infrared_tripped(&self, side: Side) -> bool {
        self.infrared(side).ok() == Some(&true)
    }

    /// The distance measured by this ultrasonic sensor, if it measured one
    pub fn distance(&self, position: UltrasonicPosition) -> Option<f32> {
        self.ultrasonic(position).ok().copied().flatten()
    }

    /// One line describing every installed sensor, like `IR L: DETECTED | IR R: Clear | US F: 12.5cm`
    pub fn summary(&self) -> String {
        let mut parts = vec![];
        for (label, reading) in [("IR L", &self.ir_left), ("IR R", &self.ir_right)] {
            match reading {
                Reading::NotInstalled => {}
                Reading::Failed(_) => parts.push(format!("{label}: ERR")),
                Reading::Ok(true) => parts.push(format!("{label}: DETECTED")),
                Reading::Ok(false) => parts.push(format!("{label}: Clear")),
            }
        }
        for (label, reading) in [
            ("US F", &self.us_front),
            ("US L", &self.us_left),
            ("US R", &self.us_right),
        ] {
            match reading {
                Reading::NotInstalled => {}
                Reading::Failed(_) => parts.push(format!("{label}: ERR")),
                Reading::Ok(Some(cm)) => parts.push(format!("{label}: {cm}cm")),
                Reading::Ok(None) => parts.push(format!("{label}: --")),
            }
        }
        if parts.is_empty() {
            "No sensors installed".to_string()
        } else {
            parts.join(" | ")
        }
    }
}

/// What the rover is doing and who decided it
#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DriveState {
    #[default]
    Stopped,
    /// Commanded over HTTP
    Manual { command: DriveCommand, speed: u8 },
    /// The obstacle monitor stopped the rover
    AutoStop { reason: StopReason },
    /// The obstacle monitor turned away from an obstacle
    AutoAvoid {
        obstacle: Obstacle,
        command: DriveCommand,
        speed: u8,
    },
}

impl DriveState {
    pub fn manual(command: DriveCommand, speed: u8) -> Self {
        match command {
            DriveCommand::Stop => DriveState::Stopped,
            command => DriveState::Manual { command, speed },
        }
    }

    /// Whether the obstacle monitor should be watching while in this state
    pub fn arms_monitor(&self) -> bool {
        match self {
            DriveState::Stopped | DriveState::AutoStop { .. } => false,
            DriveState::Manual { command, .. } => *command != DriveCommand::Stop,
            DriveState::AutoAvoid { .. } => true,
        }
    }
}

impl Display for DriveState {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        match self {
            DriveState::Stopped => write!(f, "Stopped"),
            DriveState::Manual {
                command: DriveCommand::Stop,
                ..
            } => write!(f, "Stopped"),
            DriveState::Manual { command, speed } => write!(f, "{command} (Speed: {speed}%)"),
            DriveState::AutoStop { reason } => write!(f, "AUTO STOP: {reason}"),
            DriveState::AutoAvoid {
                obstacle,
                command,
                speed,
            } => {
                let turned = match command {
                    DriveCommand::Left => "Left",
                    DriveCommand::Right => "Right",
                    _ => "Away",
                };
                write!(
                    f,
                    "AUTO AVOID: Obstacle {}. Turned {turned} ({speed}%)",
                    obstacle.direction
                )
            }
        }
    }
}

/// Who asked the motors task to drive
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CommandOrigin {
    Manual,
    /// The obstacle monitor, acting on the manual command with this epoch
    Monitor { epoch: u32 },
}

/// Requests handled, in order, by the motors task
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum MotorRequest {
    Drive {
        command: DriveCommand,
        origin: CommandOrigin,
        /// Published when the command is applied
        state: Option<DriveState>,
    },
    /// Linear or turn speed changed; re-apply the duty cycle of the current command
    SpeedsChanged,
}

/// Snapshot served by `GET /status`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RoverStatus {
    pub state: String,
    pub drive_state: DriveState,
    pub is_moving: bool,
    pub sensor_status: String,
    pub sensors: SensorData,
    pub is_radar_running: bool,
    pub linear_speed: u8,
    pub turn_speed: u8,
    /// Fraction of time each task spends awake, in [`Task`] order
    pub utilization: [f32; 3],
}

/// Snapshot served by `GET /radar_data`
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RadarData {
    /// The last completed sweep
    pub data: Vec<RadarPoint>,
    pub current_angle: u16,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::avoidance::ObstacleDirection;

    #[test]
    fn manual_state_strings() {
        assert_eq!(
            DriveState::manual(DriveCommand::Forward, 20).to_string(),
            "Moving Forward (Speed: 20%)"
        );
        assert_eq!(
            DriveState::manual(DriveCommand::Left, 35).to_string(),
            "Turning Left (Speed: 35%)"
        );
        assert_eq!(
            DriveState::manual(DriveCommand::Stop, 35).to_string(),
            "Stopped"
        );
        assert_eq!(
            DriveState::manual(DriveCommand::Stop, 35),
            DriveState::Stopped
        );
    }

    #[test]
    fn automatic_state_strings() {
        assert_eq!(
            DriveState::AutoStop {
                reason: StopReason::BothSides
            }
            .to_string(),
            "AUTO STOP: Obstacle on Both Sides"
        );
        assert_eq!(
            DriveState::AutoStop {
                reason: StopReason::Blocked(Obstacle {
                    direction: ObstacleDirection::Front,
                    distance_cm: Some(12.5),
                })
            }
            .to_string(),
            "AUTO STOP: Obstacle Front (12.5cm)"
        );
        assert_eq!(
            DriveState::AutoAvoid {
                obstacle: Obstacle {
                    direction: ObstacleDirection::Left,
                    distance_cm: None,
                },
                command: DriveCommand::Right,
                speed: 20,
            }
            .to_string(),
            "AUTO AVOID: Obstacle Left. Turned Right (20%)"
        );
    }

    #[test]
    fn arming() {
        assert!(DriveState::manual(DriveCommand::Backward, 20).arms_monitor());
        assert!(!DriveState::Stopped.arms_monitor());
        assert!(!DriveState::AutoStop {
            reason: StopReason::BothSides
        }
        .arms_monitor());
    }

    #[test]
    fn summary_skips_missing_sensors() {
        let sensors = SensorData {
            ir_left: Reading::Ok(true),
            ir_right: Reading::Ok(false),
            us_front: Reading::Ok(Some(12.5)),
            us_left: Reading::Ok(None),
            us_right: Reading::NotInstalled,
        };
        assert_eq!(
            sensors.summary(),
            "IR L: DETECTED | IR R: Clear | US F: 12.5cm | US L: --"
        );
        let failed = SensorData {
            ir_left: Reading::Failed("gpio".into()),
            ..Default::default()
        };
        assert_eq!(failed.summary(), "IR L: ERR");
        assert_eq!(SensorData::default().summary(), "No sensors installed");
    }

    #[test]
    fn reading_json_shape() {
        let json = serde_json::to_value(Reading::Ok(Some(3.5f32))).unwrap();
        assert_eq!(json, serde_json::json!({"status": "ok", "value": 3.5}));
        let json = serde_json::to_value(Reading::<bool>::NotInstalled).unwrap();
        assert_eq!(json, serde_json::json!({"status": "not_installed"}));
    }
}
