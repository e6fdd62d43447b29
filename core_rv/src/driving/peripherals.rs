use crate::driving::data::SharedRoverData;
use crate::driving::RobotBehavior;
use crate::messages::settings::RoverSettings;
use crate::messages::{Reading, SensorData, Side, Task, UltrasonicPosition};
use crate::radar::{RadarAction, RadarSweep};
use crate::util::utilization::UtilizationMonitor;
use crate::util::CrossPlatformInstant;
use core::fmt::Debug;
use core::sync::atomic::Ordering;
use log::{error, info, warn};

/// Functionality that rovers with sensors and a radar servo must support
pub trait RobotPeripheralsBehavior {
    type Error: Debug;

    /// Raw level of an infrared sensor's output pin, `true` for high
    async fn infrared_level(&mut self, side: Side) -> Result<bool, Self::Error>;

    /// Trigger an ultrasonic sensor and time its echo
    ///
    /// - Ok(None) indicates that the sensor is working, but nothing was in range
    /// - Ok(x) indicates an object x cm in front of the sensor
    async fn ultrasonic_distance(
        &mut self,
        position: UltrasonicPosition,
    ) -> Result<Option<f32>, Self::Error>;

    /// Point the radar servo, 0 to 180 degrees
    async fn set_servo_angle(&mut self, degrees: u16) -> Result<(), Self::Error>;
}

async fn read_infrared<P: RobotPeripheralsBehavior>(
    peripherals: &mut P,
    settings: &RoverSettings,
    side: Side,
) -> Reading<bool> {
    let installed = match side {
        Side::Left => settings.pins.ir_left.is_some(),
        Side::Right => settings.pins.ir_right.is_some(),
    };
    if !installed {
        return Reading::NotInstalled;
    }
    match peripherals.infrared_level(side).await {
        Ok(high) => Reading::Ok(settings.sensors.ir_detects(high)),
        Err(e) => Reading::Failed(format!("{e:?}")),
    }
}

async fn read_ultrasonic<P: RobotPeripheralsBehavior>(
    peripherals: &mut P,
    settings: &RoverSettings,
    position: UltrasonicPosition,
) -> Reading<Option<f32>> {
    let pins = &settings.pins;
    let installed = match position {
        UltrasonicPosition::Front => pins.us_front.is_some(),
        UltrasonicPosition::Left => pins.us_left.is_some(),
        UltrasonicPosition::Right => pins.us_right.is_some(),
    };
    if !installed {
        return Reading::NotInstalled;
    }
    Reading::from_result(peripherals.ultrasonic_distance(position).await)
}

/// Read every installed sensor once
///
/// `front` is used instead of triggering the front ultrasonic sensor again, if given.
pub async fn read_sensors<P: RobotPeripheralsBehavior>(
    peripherals: &mut P,
    settings: &RoverSettings,
    front: Option<Reading<Option<f32>>>,
) -> SensorData {
    let us_front = match front {
        Some(reading) => reading,
        None => read_ultrasonic(peripherals, settings, UltrasonicPosition::Front).await,
    };
    SensorData {
        ir_left: read_infrared(peripherals, settings, Side::Left).await,
        ir_right: read_infrared(peripherals, settings, Side::Right).await,
        us_front,
        us_left: read_ultrasonic(peripherals, settings, UltrasonicPosition::Left).await,
        us_right: read_ultrasonic(peripherals, settings, UltrasonicPosition::Right).await,
    }
}

async fn aim<P: RobotPeripheralsBehavior>(
    data: &SharedRoverData,
    peripherals: &mut P,
    degrees: u16,
) {
    match peripherals.set_servo_angle(degrees).await {
        Ok(()) => data.radar_angle.store(degrees, Ordering::Relaxed),
        Err(e) => error!("Failed to move radar servo to {degrees}: {e:?}"),
    }
}

fn newly_failed<T>(before: &Reading<T>, now: &Reading<T>) -> Option<String> {
    match (before, now) {
        (Reading::Failed(_), _) => None,
        (_, Reading::Failed(e)) => Some(e.clone()),
        _ => None,
    }
}

/// The "main" method for the peripherals task
///
/// Owns every sensor and the radar servo, so that the radar sweep and the obstacle monitor
/// never trigger the front ultrasonic sensor at the same time.
pub async fn peripherals_task<R: RobotBehavior>(
    data: &SharedRoverData,
    mut peripherals: R::Peripherals,
) -> ! {
    let settings = &data.settings;
    let sensors_sender = data.sensors.sender();
    let mut radar: RadarSweep<R::Instant> = RadarSweep::new(settings.radar.clone());
    let mut last = SensorData::default();

    let mut utilization_monitor: UtilizationMonitor<50, R::Instant> = UtilizationMonitor::new();
    utilization_monitor.start();
    info!("Peripherals task started");

    loop {
        let mut front = None;
        let generation = data.radar_generation.load(Ordering::SeqCst);
        match radar.next_action(data.radar_running.load(Ordering::SeqCst), generation) {
            RadarAction::Idle | RadarAction::Hold => {}
            RadarAction::Park => aim(data, &mut peripherals, radar.park_angle()).await,
            RadarAction::Aim(angle) => {
                aim(data, &mut peripherals, angle).await;
                utilization_monitor.stop();
                R::Instant::sleep(settings.radar.servo_delay()).await;
                utilization_monitor.start();

                let reading =
                    read_ultrasonic(&mut peripherals, settings, UltrasonicPosition::Front).await;
                let distance = reading.ok().copied().flatten();
                if let Some(scan) = radar.record(angle, distance) {
                    // not if the radar was stopped or restarted while measuring
                    if data.radar_running.load(Ordering::SeqCst)
                        && data.radar_generation.load(Ordering::SeqCst) == generation
                    {
                        data.radar_scan.sender().send(scan);
                    }
                }
                front = Some(reading);
            }
        }
        // while sweeping, the servo delay paces the loop
        let swept = front.is_some();

        let sensors = read_sensors(&mut peripherals, settings, front).await;

        for (name, failure) in [
            ("left infrared", newly_failed(&last.ir_left, &sensors.ir_left)),
            ("right infrared", newly_failed(&last.ir_right, &sensors.ir_right)),
            ("front ultrasonic", newly_failed(&last.us_front, &sensors.us_front)),
            ("left ultrasonic", newly_failed(&last.us_left, &sensors.us_left)),
            ("right ultrasonic", newly_failed(&last.us_right, &sensors.us_right)),
        ] {
            if let Some(e) = failure {
                warn!("Failed to read {name} sensor: {e}");
            }
        }
        last = sensors.clone();
        sensors_sender.send(sensors);

        data.utilization[Task::Peripherals as usize]
            .store(utilization_monitor.utilization(), Ordering::Relaxed);
        if !swept {
            utilization_monitor.stop();
            R::Instant::sleep(settings.sensors.poll_interval()).await;
            utilization_monitor.start();
        }
    }
}
