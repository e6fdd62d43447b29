use crate::drive::{DriveCommand, HBridgeLevels, Speeds, TurnStyle};
use crate::driving::data::SharedRoverData;
use crate::driving::RobotBehavior;
use crate::messages::{CommandOrigin, DriveState, MotorRequest, Task};
use crate::util::utilization::UtilizationMonitor;
use core::fmt::Debug;
use core::sync::atomic::Ordering;
use log::{debug, error, info};

/// Functionality that rovers with an H-bridge motor driver must support
pub trait RobotMotorsBehavior {
    type Error: Debug;

    /// Set the four direction inputs
    async fn set_direction(&mut self, levels: HBridgeLevels) -> Result<(), Self::Error>;

    /// Set the PWM duty cycle of both enable pins
    ///
    /// - 0 <= percent <= 100
    async fn set_duty_cycle(&mut self, percent: u8) -> Result<(), Self::Error>;
}

pub(crate) struct MotorsData<M: RobotMotorsBehavior> {
    motors: M,
    turn_style: TurnStyle,
    current: DriveCommand,
}

impl<M: RobotMotorsBehavior> MotorsData<M> {
    /// Take over the motors, stopping them
    pub(crate) async fn new(data: &SharedRoverData, motors: M) -> Self {
        let mut motors_data = Self {
            motors,
            turn_style: data.settings.drive.turn_style,
            current: DriveCommand::Stop,
        };
        motors_data
            .apply(DriveCommand::Stop, data.speeds())
            .await;
        motors_data
    }

    async fn set_duty_cycle(&mut self, percent: u8) {
        if let Err(e) = self.motors.set_duty_cycle(percent).await {
            error!("Failed to set motor duty cycle to {percent}%: {e:?}");
        }
    }

    /// Duty cycle first, then direction
    async fn apply(&mut self, command: DriveCommand, speeds: Speeds) {
        self.set_duty_cycle(command.duty_cycle(speeds)).await;
        let levels = command.levels(self.turn_style);
        if let Err(e) = self.motors.set_direction(levels).await {
            error!("Failed to set motor direction for {command:?}: {e:?}");
        }
        self.current = command;
    }

    pub(crate) async fn handle(&mut self, data: &SharedRoverData, request: MotorRequest) {
        match request {
            MotorRequest::Drive {
                command,
                origin,
                state,
            } => {
                if let CommandOrigin::Monitor { epoch } = origin {
                    let current_epoch = data.manual_epoch.load(Ordering::SeqCst);
                    if epoch != current_epoch {
                        debug!(
                            "Dropping obstacle monitor {command:?} from epoch {epoch}, now {current_epoch}"
                        );
                        return;
                    }
                }
                self.apply(command, data.speeds()).await;
                if let Some(state) = state {
                    data.set_drive_state(state);
                }
            }
            MotorRequest::SpeedsChanged => {
                let duty = self.current.duty_cycle(data.speeds());
                self.set_duty_cycle(duty).await;
                if let DriveState::Manual { command, .. } = data.drive_state() {
                    if command == self.current {
                        data.set_drive_state(DriveState::manual(command, duty));
                    }
                }
            }
        }
    }
}

/// The "main" method for the motors task
pub async fn motors_task<R: RobotBehavior>(data: &SharedRoverData, motors: R::Motors) -> ! {
    let mut motors_data = MotorsData::new(data, motors).await;
    info!("Motors task started");

    let mut utilization_monitor: UtilizationMonitor<50, R::Instant> = UtilizationMonitor::new();

    loop {
        utilization_monitor.stop();
        let request = data.motor_requests.receive().await;
        utilization_monitor.start();

        motors_data.handle(data, request).await;

        data.utilization[Task::Motors as usize]
            .store(utilization_monitor.utilization(), Ordering::Relaxed);
    }
}
