//! Contains the robot logic shared by every rover backend
//!
//! Nothing here touches hardware directly; the tasks in [`driving`] are generic over the
//! behavior traits that `server_rv` implements for the Raspberry Pi and for simulation

pub mod avoidance;
pub mod constants;
pub mod drive;
pub mod driving;
pub mod messages;
pub mod radar;
pub mod ultrasonic;
mod util;

pub use util::*;
