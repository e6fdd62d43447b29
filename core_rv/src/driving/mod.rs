//! The rover's concurrent tasks and the data they share
//!
//! Each task owns its hardware outright. They only communicate through
//! [`data::SharedRoverData`], which HTTP handlers also use.

pub mod data;
#[cfg(test)]
mod mock;
pub mod motors;
pub mod obstacles;
pub mod peripherals;

use crate::driving::motors::RobotMotorsBehavior;
use crate::driving::peripherals::RobotPeripheralsBehavior;
use crate::util::CrossPlatformInstant;

/// Ties together the hardware a rover backend provides
pub trait RobotBehavior: 'static {
    type Instant: CrossPlatformInstant + Default;

    type Motors: RobotMotorsBehavior;
    type Peripherals: RobotPeripheralsBehavior;
}
