//! Bench checks for the sensors and the servos

use core_rv::avoidance::decide;
use core_rv::constants::{SERVO_CENTER_DEGREES, SERVO_MAX_DEGREES};
use core_rv::driving::peripherals::{read_sensors, RobotPeripheralsBehavior};
use core_rv::messages::settings::RoverSettings;
use core::fmt::Debug;
use log::{error, info};
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

const SENSOR_CHECK_INTERVAL: Duration = Duration::from_millis(100);
const SERVO_SWEEP_STEP: Duration = Duration::from_millis(10);

/// Print every sensor reading, and what the obstacle monitor would do about it, until Ctrl-C
pub async fn sensor_check<P: RobotPeripheralsBehavior>(
    mut peripherals: P,
    settings: &RoverSettings,
) -> anyhow::Result<()> {
    info!("Checking sensors, press Ctrl-C to stop");
    let check = async {
        loop {
            let sensors = read_sensors(&mut peripherals, settings, None).await;
            let action = decide(&sensors, &settings.avoidance);
            println!("{} => {action}", sensors.summary());
            sleep(SENSOR_CHECK_INTERVAL).await;
        }
    };
    tokio::select! {
        _ = check => {}
        result = tokio::signal::ctrl_c() => result?,
    }
    Ok(())
}

/// Servos addressed by their channel on the servo driver
pub trait ServoBank {
    type Error: Debug;

    async fn set_channel_angle(&mut self, channel: u8, degrees: u16) -> Result<(), Self::Error>;
}

/// Swing the servos on `channels` together, end to end one degree at a time, until Ctrl-C, then
/// center them
pub async fn servo_sweep<S: ServoBank>(servos: S, channels: &[u8]) -> anyhow::Result<()> {
    info!("Sweeping servo channels {channels:?}, press Ctrl-C to stop");
    sweep_until(servos, channels, tokio::signal::ctrl_c()).await
}

async fn sweep_until<S: ServoBank>(
    mut servos: S,
    channels: &[u8],
    stop: impl Future<Output = std::io::Result<()>>,
) -> anyhow::Result<()> {
    let sweep = async {
        let angles = (0..=SERVO_MAX_DEGREES).chain((0..=SERVO_MAX_DEGREES).rev());
        for angle in angles.cycle() {
            for &channel in channels {
                if let Err(e) = servos.set_channel_angle(channel, angle).await {
                    error!("Failed to move servo {channel} to {angle}: {e:?}");
                }
            }
            sleep(SERVO_SWEEP_STEP).await;
        }
    };
    tokio::select! {
        _ = sweep => {}
        result = stop => result?,
    }
    for &channel in channels {
        if let Err(e) = servos
            .set_channel_angle(channel, SERVO_CENTER_DEGREES)
            .await
        {
            anyhow::bail!("failed to center servo {channel}: {e:?}");
        }
    }
    info!("Servos centered");
    Ok(())
}
