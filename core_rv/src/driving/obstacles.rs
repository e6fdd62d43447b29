use crate::avoidance::{decide, AvoidanceAction, Obstacle};
use crate::drive::DriveCommand;
use crate::driving::data::SharedRoverData;
use crate::driving::RobotBehavior;
use crate::messages::{DriveState, Task};
use crate::util::utilization::UtilizationMonitor;
use crate::util::CrossPlatformInstant;
use core::sync::atomic::Ordering;
use core::time::Duration;
use log::info;

/// Turn away from an obstacle, then resume driving forward
///
/// Gives up as soon as a manual command arrives.
async fn avoid<R: RobotBehavior>(
    data: &SharedRoverData,
    epoch: u32,
    command: DriveCommand,
    obstacle: Obstacle,
) {
    let settings = &data.settings.avoidance;
    let state = DriveState::AutoAvoid {
        obstacle,
        command,
        speed: command.duty_cycle(data.speeds()),
    };
    let steps = [
        (DriveCommand::Stop, None, settings.pause()),
        (command, Some(state), settings.turn()),
        (DriveCommand::Stop, None, Duration::ZERO),
        (DriveCommand::Forward, None, Duration::ZERO),
    ];
    for (command, state, hold) in steps {
        if !data.monitor_drive(epoch, command, state).await {
            info!("Avoidance interrupted by a manual command");
            return;
        }
        if !hold.is_zero() {
            R::Instant::sleep(hold).await;
        }
    }
}

/// The "main" method for the obstacle monitor task
///
/// While the rover is moving under manual control, watches each new sensor reading and stops
/// or steers when something is in the way.
pub async fn obstacle_monitor_task<R: RobotBehavior>(data: &SharedRoverData) -> ! {
    let settings = &data.settings.avoidance;
    let mut sensors_watch = data
        .sensors
        .receiver()
        .expect("the obstacle monitor is the only sensors receiver");

    let mut utilization_monitor: UtilizationMonitor<50, R::Instant> = UtilizationMonitor::new();
    info!("Obstacle monitor started, policy {:?}", settings.policy);

    loop {
        utilization_monitor.stop();
        R::Instant::sleep(settings.poll_interval()).await;
        utilization_monitor.start();

        let Some(sensors) = sensors_watch.try_changed() else {
            continue;
        };
        if !settings.enabled || !data.monitor_armed.load(Ordering::SeqCst) {
            continue;
        }
        let epoch = data.manual_epoch.load(Ordering::SeqCst);
        match decide(&sensors, settings) {
            AvoidanceAction::Continue => {}
            AvoidanceAction::Stop(reason) => {
                info!("Stopping: {reason}");
                data.monitor_drive(epoch, DriveCommand::Stop, Some(DriveState::AutoStop { reason }))
                    .await;
            }
            AvoidanceAction::Steer { command, obstacle } => {
                info!("Avoiding: {obstacle}, turning {command:?}");
                avoid::<R>(data, epoch, command, obstacle).await;
                // readings from before and during the turn are stale now
                sensors_watch.try_changed();
            }
        }

        data.utilization[Task::Obstacles as usize]
            .store(utilization_monitor.utilization(), Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drive::HBridgeLevels;
    use crate::driving::mock::{with_rover, MockWorld};
    use crate::messages::settings::RoverSettings;
    use crate::messages::Side;
    use tokio::time::sleep;

    const FORWARD: HBridgeLevels = HBridgeLevels([true, false, false, true]);
    const PIVOT_RIGHT: HBridgeLevels = HBridgeLevels([false, false, false, true]);

    #[tokio::test(start_paused = true)]
    async fn steers_around_a_side_obstacle_and_resumes() {
        let world = MockWorld::default();
        world.set_infrared(Side::Left, true);
        let data = &SharedRoverData::new(RoverSettings::default());
        with_rover(data, &world, async {
            data.manual_command(DriveCommand::Forward).await;
            sleep(Duration::from_millis(200)).await;
            assert_eq!(world.levels(), PIVOT_RIGHT);
            world.set_infrared(Side::Left, false);
            sleep(Duration::from_millis(400)).await;
            assert_eq!(world.levels(), FORWARD);
            assert_eq!(
                data.status().state,
                "AUTO AVOID: Obstacle Left. Turned Right (20%)"
            );
            assert!(data.status().is_moving);
        })
        .await;
        let history = world.level_history();
        let turn = history.iter().position(|l| *l == PIVOT_RIGHT).unwrap();
        assert!(history[turn - 1].is_all_low());
        assert!(history[turn + 1].is_all_low());
        assert_eq!(history[turn + 2], FORWARD);
    }

    #[tokio::test(start_paused = true)]
    async fn stops_for_obstacles_on_both_sides() {
        let world = MockWorld::default();
        let data = &SharedRoverData::new(RoverSettings::default());
        with_rover(data, &world, async {
            data.manual_command(DriveCommand::Forward).await;
            sleep(Duration::from_millis(100)).await;
            assert_eq!(world.levels(), FORWARD);
            world.set_infrared(Side::Left, true);
            world.set_infrared(Side::Right, true);
            sleep(Duration::from_millis(150)).await;
            assert!(world.levels().is_all_low());
            assert_eq!(world.duty(), 0);
            let status = data.status();
            assert_eq!(status.state, "AUTO STOP: Obstacle on Both Sides");
            assert!(!status.is_moving);
        })
        .await;
    }

    #[tokio::test(start_paused = true)]
    async fn manual_stop_wins_over_a_maneuver() {
        let world = MockWorld::default();
        world.set_infrared(Side::Right, true);
        let data = &SharedRoverData::new(RoverSettings::default());
        with_rover(data, &world, async {
            data.manual_command(DriveCommand::Forward).await;
            sleep(Duration::from_millis(200)).await;
            assert!(matches!(data.drive_state(), DriveState::AutoAvoid { .. }));
            data.manual_command(DriveCommand::Stop).await;
            sleep(Duration::from_millis(600)).await;
            assert!(world.levels().is_all_low());
            assert_eq!(data.status().state, "Stopped");
        })
        .await;
        assert_ne!(world.level_history().last(), Some(&FORWARD));
    }

    #[tokio::test(start_paused = true)]
    async fn ignores_obstacles_while_stopped_or_disabled() {
        let world = MockWorld::default();
        world.set_infrared(Side::Left, true);
        let data = &SharedRoverData::new(RoverSettings::default());
        with_rover(data, &world, async {
            sleep(Duration::from_millis(300)).await;
        })
        .await;
        assert!(world.level_history().iter().all(|l| l.is_all_low()));

        let mut settings = RoverSettings::default();
        settings.avoidance.enabled = false;
        let world = MockWorld::default();
        world.set_infrared(Side::Left, true);
        let data = &SharedRoverData::new(settings);
        with_rover(data, &world, async {
            data.manual_command(DriveCommand::Forward).await;
            sleep(Duration::from_millis(300)).await;
            assert_eq!(world.levels(), FORWARD);
        })
        .await;
    }

    #[tokio::test(start_paused = true)]
    async fn speed_changes_apply_immediately() {
        let world = MockWorld::default();
        let data = &SharedRoverData::new(RoverSettings::default());
        with_rover(data, &world, async {
            data.manual_command(DriveCommand::Left).await;
            sleep(Duration::from_millis(10)).await;
            assert_eq!(world.duty(), 20);
            data.set_turn_speed(65).await;
            sleep(Duration::from_millis(10)).await;
            assert_eq!(world.duty(), 65);
            assert_eq!(data.status().state, "Turning Left (Speed: 65%)");
            data.set_linear_speed(90).await;
            sleep(Duration::from_millis(10)).await;
            assert_eq!(world.duty(), 65);
        })
        .await;
    }
}
