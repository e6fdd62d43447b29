use crate::constants::{MOTOR_REQUEST_QUEUE, SERVO_CENTER_DEGREES};
use crate::drive::{clamp_percent, DriveCommand, Speeds};
use crate::messages::settings::RoverSettings;
use crate::messages::{
    CommandOrigin, DriveState, MotorRequest, RadarData, RoverStatus, SensorData,
};
use crate::radar::RadarPoint;
use core::sync::atomic::Ordering;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use embassy_sync::mutex::Mutex;
use embassy_sync::watch::Watch;
use log::info;
use portable_atomic::{AtomicBool, AtomicF32, AtomicU16, AtomicU32, AtomicU8};

/// Each rover should have exactly one, shared by its tasks and the HTTP handlers
pub struct SharedRoverData {
    /// Options the rover was started with
    pub settings: RoverSettings,

    //
    // ------------------- INTER TASK DATA -------------------
    //
    /// Requests for the motors task, applied in the order they were sent
    pub motor_requests: Channel<CriticalSectionRawMutex, MotorRequest, MOTOR_REQUEST_QUEUE>,
    /// Information gathered by the peripherals task is posted here for the obstacle monitor
    pub sensors: Watch<CriticalSectionRawMutex, SensorData, 2>,
    /// What the rover is currently doing
    pub drive_state: Watch<CriticalSectionRawMutex, DriveState, 2>,
    /// The last complete radar sweep, empty while the radar is stopped
    pub radar_scan: Watch<CriticalSectionRawMutex, Vec<RadarPoint>, 2>,
    /// Utilization percentage for the three tasks
    pub utilization: [AtomicF32; 3],

    //
    // ------------------- FLAGS -------------------
    //
    /// Whether the radar should be sweeping
    pub radar_running: AtomicBool,
    /// Incremented whenever the radar is started or stopped, so that a stop and start in quick
    /// succession still restarts the sweep
    pub radar_generation: AtomicU32,
    /// Where the radar servo was last pointed
    pub radar_angle: AtomicU16,
    /// Whether the obstacle monitor should act on sensor readings
    pub monitor_armed: AtomicBool,
    pub linear_speed: AtomicU8,
    pub turn_speed: AtomicU8,
    /// Incremented for every manual command, so that stale obstacle monitor requests can be
    /// recognized and dropped
    pub manual_epoch: AtomicU32,

    manual_lock: Mutex<CriticalSectionRawMutex, ()>,
}

impl SharedRoverData {
    pub fn new(settings: RoverSettings) -> Self {
        let speeds = settings.drive.speeds();
        Self {
            motor_requests: Channel::new(),
            sensors: Watch::new(),
            drive_state: Watch::new_with(DriveState::Stopped),
            radar_scan: Watch::new_with(vec![]),
            utilization: core::array::from_fn(|_| AtomicF32::new(0.0)),

            radar_running: AtomicBool::new(false),
            radar_generation: AtomicU32::new(0),
            radar_angle: AtomicU16::new(SERVO_CENTER_DEGREES),
            monitor_armed: AtomicBool::new(false),
            linear_speed: AtomicU8::new(speeds.linear),
            turn_speed: AtomicU8::new(speeds.turn),
            manual_epoch: AtomicU32::new(0),

            manual_lock: Mutex::new(()),
            settings,
        }
    }

    pub fn speeds(&self) -> Speeds {
        Speeds {
            linear: self.linear_speed.load(Ordering::Relaxed),
            turn: self.turn_speed.load(Ordering::Relaxed),
        }
    }

    pub fn drive_state(&self) -> DriveState {
        self.drive_state.try_get().unwrap_or_default()
    }

    pub fn latest_sensors(&self) -> SensorData {
        self.sensors.try_get().unwrap_or_default()
    }

    /// Publish a new drive state, arming or disarming the obstacle monitor to match
    pub fn set_drive_state(&self, state: DriveState) {
        self.drive_state.sender().send(state);
        self.monitor_armed
            .store(state.arms_monitor(), Ordering::SeqCst);
    }

    /// Drive as a user asked
    ///
    /// Any obstacle monitor request issued before this is dropped by the motors task.
    pub async fn manual_command(&self, command: DriveCommand) -> DriveState {
        let _guard = self.manual_lock.lock().await;
        self.manual_epoch.fetch_add(1, Ordering::SeqCst);
        let state = DriveState::manual(command, command.duty_cycle(self.speeds()));
        info!("Manual command: {state}");
        self.set_drive_state(state);
        self.motor_requests
            .send(MotorRequest::Drive {
                command,
                origin: CommandOrigin::Manual,
                state: Some(state),
            })
            .await;
        state
    }

    /// Drive on behalf of the obstacle monitor
    ///
    /// Returns false, without sending anything, if a manual command arrived after `epoch`.
    pub async fn monitor_drive(
        &self,
        epoch: u32,
        command: DriveCommand,
        state: Option<DriveState>,
    ) -> bool {
        if self.manual_epoch.load(Ordering::SeqCst) != epoch {
            return false;
        }
        self.motor_requests
            .send(MotorRequest::Drive {
                command,
                origin: CommandOrigin::Monitor { epoch },
                state,
            })
            .await;
        true
    }

    /// Clamp and store the forward/backward duty cycle, returning the stored value
    pub async fn set_linear_speed(&self, requested: i64) -> u8 {
        let speed = clamp_percent(requested);
        self.linear_speed.store(speed, Ordering::Relaxed);
        self.motor_requests.send(MotorRequest::SpeedsChanged).await;
        speed
    }

    /// Clamp and store the turning duty cycle, returning the stored value
    pub async fn set_turn_speed(&self, requested: i64) -> u8 {
        let speed = clamp_percent(requested);
        self.turn_speed.store(speed, Ordering::Relaxed);
        self.motor_requests.send(MotorRequest::SpeedsChanged).await;
        speed
    }

    /// Returns false if the radar was already running
    pub fn start_radar(&self) -> bool {
        let started = !self.radar_running.swap(true, Ordering::SeqCst);
        if started {
            self.radar_generation.fetch_add(1, Ordering::SeqCst);
            info!("Radar started");
        }
        started
    }

    /// Stop sweeping and forget the last scan
    pub fn stop_radar(&self) {
        if self.radar_running.swap(false, Ordering::SeqCst) {
            self.radar_generation.fetch_add(1, Ordering::SeqCst);
            info!("Radar stopped");
        }
        self.radar_scan.sender().send(vec![]);
        self.radar_angle
            .store(SERVO_CENTER_DEGREES, Ordering::Relaxed);
    }

    pub fn radar_data(&self) -> RadarData {
        RadarData {
            data: self.radar_scan.try_get().unwrap_or_default(),
            current_angle: self.radar_angle.load(Ordering::Relaxed),
        }
    }

    pub fn status(&self) -> RoverStatus {
        let drive_state = self.drive_state();
        let sensors = self.latest_sensors();
        let speeds = self.speeds();
        RoverStatus {
            state: drive_state.to_string(),
            drive_state,
            is_moving: self.monitor_armed.load(Ordering::SeqCst),
            sensor_status: sensors.summary(),
            sensors,
            is_radar_running: self.radar_running.load(Ordering::SeqCst),
            linear_speed: speeds.linear,
            turn_speed: speeds.turn,
            utilization: core::array::from_fn(|i| self.utilization[i].load(Ordering::Relaxed)),
        }
    }
}
