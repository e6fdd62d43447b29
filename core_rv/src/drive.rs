//! H-bridge (L298N style) drive commands
//!
//! The rover has two motor channels. `IN1`/`IN2` set the direction of channel A and
//! `IN3`/`IN4` the direction of channel B, while the two enable pins carry a PWM duty cycle
//! that sets the speed of both channels at once.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// A movement the rover can be told to make
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriveCommand {
    #[default]
    Stop,
    Forward,
    Backward,
    Left,
    Right,
}

/// How the rover turns in place
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnStyle {
    /// Only the channel on the outside of the turn drives; the other is idle
    #[default]
    Pivot,
    /// Both channels drive in opposite directions
    Spin,
}

/// Levels of the four H-bridge direction inputs, in order `IN1`, `IN2`, `IN3`, `IN4`
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HBridgeLevels(pub [bool; 4]);

impl HBridgeLevels {
    pub const ALL_LOW: Self = Self([false; 4]);

    pub fn is_all_low(&self) -> bool {
        self.0.iter().all(|high| !high)
    }
}

/// PWM duty cycles, in percent, used for the two kinds of movement
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Speeds {
    /// Used for [`DriveCommand::Forward`] and [`DriveCommand::Backward`]
    pub linear: u8,
    /// Used for [`DriveCommand::Left`] and [`DriveCommand::Right`]
    pub turn: u8,
}

/// Clamp a requested duty cycle into `0..=100`
pub fn clamp_percent(requested: i64) -> u8 {
    requested.clamp(0, 100) as u8
}

impl DriveCommand {
    /// All commands in order
    pub fn get_all() -> [DriveCommand; 5] {
        [
            DriveCommand::Stop,
            DriveCommand::Forward,
            DriveCommand::Backward,
            DriveCommand::Left,
            DriveCommand::Right,
        ]
    }

    /// Direction pin levels that produce this command
    pub fn levels(&self, style: TurnStyle) -> HBridgeLevels {
        let levels = match (self, style) {
            (DriveCommand::Stop, _) => [false, false, false, false],
            (DriveCommand::Forward, _) => [true, false, false, true],
            (DriveCommand::Backward, _) => [false, true, true, false],
            (DriveCommand::Left, TurnStyle::Pivot) => [true, false, false, false],
            (DriveCommand::Right, TurnStyle::Pivot) => [false, false, false, true],
            (DriveCommand::Left, TurnStyle::Spin) => [false, true, false, true],
            (DriveCommand::Right, TurnStyle::Spin) => [true, false, true, false],
        };
        HBridgeLevels(levels)
    }

    /// Duty cycle, in percent, for the enable pins while this command is active
    pub fn duty_cycle(&self, speeds: Speeds) -> u8 {
        match self {
            DriveCommand::Stop => 0,
            DriveCommand::Forward | DriveCommand::Backward => speeds.linear,
            DriveCommand::Left | DriveCommand::Right => speeds.turn,
        }
    }

    /// Path segment of the control route for this command
    pub fn route(&self) -> &'static str {
        match self {
            DriveCommand::Stop => "stop",
            DriveCommand::Forward => "forward",
            DriveCommand::Backward => "backward",
            DriveCommand::Left => "left",
            DriveCommand::Right => "right",
        }
    }
}

impl Display for DriveCommand {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            DriveCommand::Stop => write!(f, "Stopped"),
            DriveCommand::Forward => write!(f, "Moving Forward"),
            DriveCommand::Backward => write!(f, "Moving Backward"),
            DriveCommand::Left => write!(f, "Turning Left"),
            DriveCommand::Right => write!(f, "Turning Right"),
        }
    }
}
