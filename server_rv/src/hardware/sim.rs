//! A rover that exists only in memory
//!
//! Tests and `--simulate` use it to run the real tasks without a Raspberry Pi. Motor outputs
//! and servo angles are recorded, and sensor readings come from whatever the world is set to.
//! Its camera sends the same gray frame over and over.

use crate::camera::CameraFeed;
use crate::diagnostics::ServoBank;
use axum::body::Bytes;
use core_rv::constants::SERVO_CENTER_DEGREES;
use core_rv::drive::HBridgeLevels;
use core_rv::driving::motors::RobotMotorsBehavior;
use core_rv::driving::peripherals::RobotPeripheralsBehavior;
use core_rv::driving::RobotBehavior;
use core_rv::messages::settings::{CameraSettings, RoverSettings};
use core_rv::messages::{Side, UltrasonicPosition};
use core_rv::TokioInstant;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::thread;

const PLACEHOLDER_FRAME: &[u8] = include_bytes!("placeholder.jpg");
const SERVO_CHANNELS: usize = 16;

#[derive(Clone, Debug)]
pub struct SimState {
    pub levels: HBridgeLevels,
    pub duty: u8,
    pub servo_angle: u16,
    /// Angles set through [`ServoBank`], by driver channel
    pub channel_angles: [Option<u16>; SERVO_CHANNELS],
    /// Obstacles in front of the left and right infrared sensors
    pub infrared: [bool; 2],
    /// What the front, left, and right ultrasonic sensors see, in cm
    pub distances: [Option<f32>; 3],
    /// Readings of the front ultrasonic sensor fail while set
    pub front_fails: bool,
    ir_active_low: bool,
}

/// Handle to a simulated rover's surroundings and outputs
#[derive(Clone)]
pub struct SimWorld(Arc<RwLock<SimState>>);

impl SimWorld {
    pub fn new(settings: &RoverSettings) -> Self {
        Self(Arc::new(RwLock::new(SimState {
            levels: HBridgeLevels::ALL_LOW,
            duty: 0,
            servo_angle: SERVO_CENTER_DEGREES,
            channel_angles: [None; SERVO_CHANNELS],
            infrared: [false; 2],
            distances: [Some(100.0), None, None],
            front_fails: false,
            ir_active_low: settings.sensors.ir_active_low,
        })))
    }

    fn read(&self) -> RwLockReadGuard<'_, SimState> {
        self.0.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, SimState> {
        self.0.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn state(&self) -> SimState {
        self.read().clone()
    }

    pub fn set_infrared(&self, side: Side, obstacle: bool) {
        self.write().infrared[side as usize] = obstacle;
    }

    pub fn set_distance(&self, position: UltrasonicPosition, cm: Option<f32>) {
        self.write().distances[position as usize] = cm;
    }

    pub fn set_front_fails(&self, fails: bool) {
        self.write().front_fails = fails;
    }

    pub fn motors(&self) -> SimMotors {
        SimMotors(self.clone())
    }

    pub fn peripherals(&self) -> SimPeripherals {
        SimPeripherals(self.clone())
    }

    /// A camera that sends a placeholder frame every `frame_interval`, or none if disabled
    pub fn camera(&self, settings: &CameraSettings) -> std::io::Result<Option<CameraFeed>> {
        if !settings.enabled {
            return Ok(None);
        }
        let (frames, feed) = CameraFeed::channel();
        let interval = settings.frame_interval();
        thread::Builder::new()
            .name("camera".into())
            .spawn(move || {
                while !frames.is_closed() {
                    frames.send_replace(Some(Bytes::from_static(PLACEHOLDER_FRAME)));
                    thread::sleep(interval);
                }
            })?;
        Ok(Some(feed))
    }
}

#[derive(Debug)]
pub enum SimError {
    EchoLost,
    NoSuchChannel(u8),
}

pub struct SimRover;

impl RobotBehavior for SimRover {
    type Instant = TokioInstant;

    type Motors = SimMotors;
    type Peripherals = SimPeripherals;
}

pub struct SimMotors(SimWorld);

impl RobotMotorsBehavior for SimMotors {
    type Error = SimError;

    async fn set_direction(&mut self, levels: HBridgeLevels) -> Result<(), Self::Error> {
        self.0.write().levels = levels;
        Ok(())
    }

    async fn set_duty_cycle(&mut self, percent: u8) -> Result<(), Self::Error> {
        self.0.write().duty = percent;
        Ok(())
    }
}

pub struct SimPeripherals(SimWorld);

impl RobotPeripheralsBehavior for SimPeripherals {
    type Error = SimError;

    async fn infrared_level(&mut self, side: Side) -> Result<bool, Self::Error> {
        let state = self.0.read();
        let obstacle = state.infrared[side as usize];
        Ok(obstacle != state.ir_active_low)
    }

    async fn ultrasonic_distance(
        &mut self,
        position: UltrasonicPosition,
    ) -> Result<Option<f32>, Self::Error> {
        let state = self.0.read();
        if position == UltrasonicPosition::Front && state.front_fails {
            return Err(SimError::EchoLost);
        }
        Ok(state.distances[position as usize])
    }

    async fn set_servo_angle(&mut self, degrees: u16) -> Result<(), Self::Error> {
        self.0.write().servo_angle = degrees;
        Ok(())
    }
}

impl ServoBank for SimPeripherals {
    type Error = SimError;

    async fn set_channel_angle(&mut self, channel: u8, degrees: u16) -> Result<(), Self::Error> {
        let mut state = self.0.write();
        let angle = state
            .channel_angles
            .get_mut(channel as usize)
            .ok_or(SimError::NoSuchChannel(channel))?;
        *angle = Some(degrees);
        Ok(())
    }
}
