//! In-memory hardware for exercising the tasks

use crate::drive::HBridgeLevels;
use crate::driving::data::SharedRoverData;
use crate::driving::motors::{MotorsData, RobotMotorsBehavior};
use crate::driving::obstacles::obstacle_monitor_task;
use crate::driving::peripherals::{peripherals_task, RobotPeripheralsBehavior};
use crate::driving::RobotBehavior;
use crate::messages::{Side, UltrasonicPosition};
use crate::TokioInstant;
use core::time::Duration;
use std::future::Future;
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct WorldState {
    levels: Vec<HBridgeLevels>,
    duty: u8,
    servo: Option<u16>,
    /// Obstacle seen by the left and right infrared sensors
    infrared: [bool; 2],
    front_distance: Option<f32>,
    ultrasonic_fails: bool,
}

/// Shared between the test and the mock hardware handed to the tasks
#[derive(Clone, Default)]
pub struct MockWorld(Arc<Mutex<WorldState>>);

impl MockWorld {
    pub fn motors(&self) -> MockMotors {
        MockMotors(self.clone())
    }

    pub fn peripherals(&self) -> MockPeripherals {
        MockPeripherals(self.clone())
    }

    pub fn set_infrared(&self, side: Side, obstacle: bool) {
        self.0.lock().unwrap().infrared[side as usize] = obstacle;
    }

    pub fn set_front_distance(&self, cm: Option<f32>) {
        self.0.lock().unwrap().front_distance = cm;
    }

    pub fn fail_ultrasonic(&self, fail: bool) {
        self.0.lock().unwrap().ultrasonic_fails = fail;
    }

    pub fn levels(&self) -> HBridgeLevels {
        self.0
            .lock()
            .unwrap()
            .levels
            .last()
            .copied()
            .unwrap_or_default()
    }

    pub fn level_history(&self) -> Vec<HBridgeLevels> {
        self.0.lock().unwrap().levels.clone()
    }

    pub fn duty(&self) -> u8 {
        self.0.lock().unwrap().duty
    }

    pub fn servo(&self) -> Option<u16> {
        self.0.lock().unwrap().servo
    }
}

pub struct MockRover;

impl RobotBehavior for MockRover {
    type Instant = TokioInstant;

    type Motors = MockMotors;
    type Peripherals = MockPeripherals;
}

pub struct MockMotors(MockWorld);

impl RobotMotorsBehavior for MockMotors {
    type Error = ();

    async fn set_direction(&mut self, levels: HBridgeLevels) -> Result<(), ()> {
        self.0 .0.lock().unwrap().levels.push(levels);
        Ok(())
    }

    async fn set_duty_cycle(&mut self, percent: u8) -> Result<(), ()> {
        self.0 .0.lock().unwrap().duty = percent;
        Ok(())
    }
}

pub struct MockPeripherals(MockWorld);

impl RobotPeripheralsBehavior for MockPeripherals {
    type Error = &'static str;

    async fn infrared_level(&mut self, side: Side) -> Result<bool, Self::Error> {
        // active low
        Ok(!self.0 .0.lock().unwrap().infrared[side as usize])
    }

    async fn ultrasonic_distance(
        &mut self,
        position: UltrasonicPosition,
    ) -> Result<Option<f32>, Self::Error> {
        let world = self.0 .0.lock().unwrap();
        match position {
            _ if world.ultrasonic_fails => Err("no echo pin"),
            UltrasonicPosition::Front => Ok(world.front_distance),
            _ => Ok(None),
        }
    }

    async fn set_servo_angle(&mut self, degrees: u16) -> Result<(), Self::Error> {
        self.0 .0.lock().unwrap().servo = Some(degrees);
        Ok(())
    }
}

/// Applies motor requests the same way the motors task does, but polls the queue
///
/// A task parked on the request queue keeps tokio's paused clock from advancing.
async fn poll_motor_requests(data: &SharedRoverData, motors: MockMotors) -> ! {
    let mut motors = MotorsData::new(data, motors).await;
    loop {
        while let Ok(request) = data.motor_requests.try_receive() {
            motors.handle(data, request).await;
        }
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
}

/// Run the rover's tasks alongside `scenario` until it finishes
pub async fn with_rover(
    data: &SharedRoverData,
    world: &MockWorld,
    scenario: impl Future<Output = ()>,
) {
    tokio::select! {
        _ = poll_motor_requests(data, world.motors()) => {}
        _ = peripherals_task::<MockRover>(data, world.peripherals()) => {}
        _ = obstacle_monitor_task::<MockRover>(data) => {}
        _ = scenario => {}
    }
}
