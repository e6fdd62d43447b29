//! Rover backends and the threads that run their tasks

#[cfg(feature = "rpi")]
pub mod rpi;
pub mod sim;

use core_rv::driving::data::SharedRoverData;
use core_rv::driving::motors::motors_task;
use core_rv::driving::obstacles::obstacle_monitor_task;
use core_rv::driving::peripherals::peripherals_task;
use core_rv::driving::RobotBehavior;
use std::sync::Arc;
use std::thread;
use tokio::runtime::Runtime;

fn task_runtime() -> std::io::Result<Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
}

/// Run each robot task on its own thread, so that blocking sensor reads never delay the motors
pub fn spawn_tasks<R: RobotBehavior>(
    data: Arc<SharedRoverData>,
    motors: R::Motors,
    peripherals: R::Peripherals,
) -> std::io::Result<()>
where
    R::Motors: Send,
    R::Peripherals: Send,
{
    let runtime = task_runtime()?;
    let motors_data = data.clone();
    thread::Builder::new()
        .name("motors".into())
        .spawn(move || {
            runtime.block_on(motors_task::<R>(&motors_data, motors));
        })?;

    let runtime = task_runtime()?;
    let peripherals_data = data.clone();
    thread::Builder::new()
        .name("peripherals".into())
        .spawn(move || {
            runtime.block_on(peripherals_task::<R>(&peripherals_data, peripherals));
        })?;

    let runtime = task_runtime()?;
    thread::Builder::new()
        .name("obstacles".into())
        .spawn(move || {
            runtime.block_on(obstacle_monitor_task::<R>(&data));
        })?;

    Ok(())
}
