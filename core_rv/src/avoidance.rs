//! Deciding what to do about obstacles reported by the sensors

use crate::drive::DriveCommand;
use crate::messages::settings::AvoidanceSettings;
use crate::messages::{SensorData, Side, UltrasonicPosition};
use core::fmt::{Display, Formatter};
use serde::{Deserialize, Serialize};

/// How the obstacle monitor reacts to obstacles while moving
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AvoidancePolicy {
    /// Stop for obstacles ahead, turn away from obstacles on one side
    #[default]
    Steer,
    /// Stop for any obstacle
    StopOnAny,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObstacleDirection {
    Front,
    Left,
    Right,
}

impl Display for ObstacleDirection {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        match self {
            ObstacleDirection::Front => write!(f, "Front"),
            ObstacleDirection::Left => write!(f, "Left"),
            ObstacleDirection::Right => write!(f, "Right"),
        }
    }
}

/// Something one of the sensors detected
///
/// `distance_cm` is only known for ultrasonic detections.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Obstacle {
    pub direction: ObstacleDirection,
    pub distance_cm: Option<f32>,
}

impl Display for Obstacle {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        write!(f, "Obstacle {}", self.direction)?;
        if let Some(cm) = self.distance_cm {
            write!(f, " ({cm}cm)")?;
        }
        Ok(())
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Both infrared sensors tripped at once
    BothSides,
    Blocked(Obstacle),
}

impl Display for StopReason {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        match self {
            StopReason::BothSides => write!(f, "Obstacle on Both Sides"),
            StopReason::Blocked(obstacle) => write!(f, "{obstacle}"),
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub enum AvoidanceAction {
    Continue,
    Stop(StopReason),
    /// Turn with `command` to get away from `obstacle`
    Steer {
        command: DriveCommand,
        obstacle: Obstacle,
    },
}

impl Display for AvoidanceAction {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        match self {
            AvoidanceAction::Continue => write!(f, "Continue"),
            AvoidanceAction::Stop(reason) => write!(f, "Stop ({reason})"),
            AvoidanceAction::Steer { command, obstacle } => {
                write!(f, "Turn {command:?} ({obstacle})")
            }
        }
    }
}

fn close_ultrasonic(
    sensors: &SensorData,
    position: UltrasonicPosition,
    direction: ObstacleDirection,
    threshold_cm: f32,
) -> Option<Obstacle> {
    sensors
        .distance(position)
        .filter(|cm| *cm < threshold_cm)
        .map(|cm| Obstacle {
            direction,
            distance_cm: Some(cm),
        })
}

fn side_obstacle(sensors: &SensorData, side: Side, threshold_cm: f32) -> Option<Obstacle> {
    let (position, direction) = match side {
        Side::Left => (UltrasonicPosition::Left, ObstacleDirection::Left),
        Side::Right => (UltrasonicPosition::Right, ObstacleDirection::Right),
    };
    close_ultrasonic(sensors, position, direction, threshold_cm).or_else(|| {
        sensors.infrared_tripped(side).then_some(Obstacle {
            direction,
            distance_cm: None,
        })
    })
}

/// Choose a reaction to the latest sensor readings
///
/// Sensors that are missing or failed are treated as seeing nothing.
pub fn decide(sensors: &SensorData, settings: &AvoidanceSettings) -> AvoidanceAction {
    let threshold = settings.threshold_cm;
    if let Some(front) = close_ultrasonic(
        sensors,
        UltrasonicPosition::Front,
        ObstacleDirection::Front,
        threshold,
    ) {
        return AvoidanceAction::Stop(StopReason::Blocked(front));
    }
    if sensors.infrared_tripped(Side::Left) && sensors.infrared_tripped(Side::Right) {
        return AvoidanceAction::Stop(StopReason::BothSides);
    }
    let left = side_obstacle(sensors, Side::Left, threshold);
    let right = side_obstacle(sensors, Side::Right, threshold);
    match (settings.policy, left, right) {
        (AvoidancePolicy::StopOnAny, Some(obstacle), _)
        | (AvoidancePolicy::StopOnAny, None, Some(obstacle)) => {
            AvoidanceAction::Stop(StopReason::Blocked(obstacle))
        }
        (AvoidancePolicy::Steer, Some(obstacle), _) => AvoidanceAction::Steer {
            command: DriveCommand::Right,
            obstacle,
        },
        (AvoidancePolicy::Steer, None, Some(obstacle)) => AvoidanceAction::Steer {
            command: DriveCommand::Left,
            obstacle,
        },
        (_, None, None) => AvoidanceAction::Continue,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::Reading;

    fn steer() -> AvoidanceSettings {
        AvoidanceSettings::default()
    }

    fn stop_on_any() -> AvoidanceSettings {
        AvoidanceSettings {
            policy: AvoidancePolicy::StopOnAny,
            ..Default::default()
        }
    }

    fn ir(left: bool, right: bool) -> SensorData {
        SensorData {
            ir_left: Reading::Ok(left),
            ir_right: Reading::Ok(right),
            ..Default::default()
        }
    }

    #[test]
    fn clear_path_continues() {
        assert_eq!(decide(&ir(false, false), &steer()), AvoidanceAction::Continue);
        let far = SensorData {
            us_front: Reading::Ok(Some(150.0)),
            us_left: Reading::Ok(None),
            ..ir(false, false)
        };
        assert_eq!(decide(&far, &steer()), AvoidanceAction::Continue);
    }

    #[test]
    fn close_front_stops() {
        let sensors = SensorData {
            us_front: Reading::Ok(Some(12.5)),
            ..ir(true, false)
        };
        assert_eq!(
            decide(&sensors, &steer()),
            AvoidanceAction::Stop(StopReason::Blocked(Obstacle {
                direction: ObstacleDirection::Front,
                distance_cm: Some(12.5),
            }))
        );
    }

    #[test]
    fn both_infrared_stops() {
        assert_eq!(
            decide(&ir(true, true), &steer()),
            AvoidanceAction::Stop(StopReason::BothSides)
        );
        assert_eq!(
            decide(&ir(true, true), &stop_on_any()),
            AvoidanceAction::Stop(StopReason::BothSides)
        );
    }

    #[test]
    fn steers_away_from_one_side() {
        assert_eq!(
            decide(&ir(true, false), &steer()),
            AvoidanceAction::Steer {
                command: DriveCommand::Right,
                obstacle: Obstacle {
                    direction: ObstacleDirection::Left,
                    distance_cm: None,
                },
            }
        );
        let right_close = SensorData {
            us_right: Reading::Ok(Some(8.0)),
            ..ir(false, false)
        };
        assert_eq!(
            decide(&right_close, &steer()),
            AvoidanceAction::Steer {
                command: DriveCommand::Left,
                obstacle: Obstacle {
                    direction: ObstacleDirection::Right,
                    distance_cm: Some(8.0),
                },
            }
        );
    }

    #[test]
    fn stop_on_any_never_steers() {
        assert_eq!(
            decide(&ir(false, true), &stop_on_any()),
            AvoidanceAction::Stop(StopReason::Blocked(Obstacle {
                direction: ObstacleDirection::Right,
                distance_cm: None,
            }))
        );
    }

    #[test]
    fn threshold_is_exclusive() {
        let at_threshold = SensorData {
            us_front: Reading::Ok(Some(20.0)),
            ..Default::default()
        };
        assert_eq!(decide(&at_threshold, &steer()), AvoidanceAction::Continue);
    }

    #[test]
    fn action_descriptions() {
        assert_eq!(
            decide(&ir(true, false), &steer()).to_string(),
            "Turn Right (Obstacle Left)"
        );
        assert_eq!(
            decide(&ir(true, true), &steer()).to_string(),
            "Stop (Obstacle on Both Sides)"
        );
    }

    #[test]
    fn failed_sensors_are_ignored() {
        let sensors = SensorData {
            ir_left: Reading::Failed("gpio".into()),
            ir_right: Reading::Ok(true),
            us_front: Reading::Failed("timeout".into()),
            ..Default::default()
        };
        assert!(matches!(
            decide(&sensors, &steer()),
            AvoidanceAction::Steer {
                command: DriveCommand::Left,
                ..
            }
        ));
    }
}
