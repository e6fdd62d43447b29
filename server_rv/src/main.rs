use anyhow::Context;
use clap::{Parser, Subcommand};
use core_rv::drive::DriveCommand;
use core_rv::driving::data::SharedRoverData;
use core_rv::driving::RobotBehavior;
use core_rv::messages::settings::RoverSettings;
use log::{info, warn};
use server_rv::camera::CameraFeed;
use server_rv::config::load_settings;
use server_rv::diagnostics::{sensor_check, servo_sweep, ServoBank};
use server_rv::hardware::sim::{SimRover, SimWorld};
use server_rv::hardware::spawn_tasks;
use server_rv::http::router;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Control server for a Raspberry Pi rover
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// TOML settings file; defaults are used for anything missing
    #[arg(long, short)]
    config: Option<PathBuf>,
    /// Use an in-memory rover instead of the GPIO pins
    #[arg(long)]
    simulate: bool,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Default, Subcommand)]
enum Command {
    /// Run the rover and its control API
    #[default]
    Serve,
    /// Print sensor readings and avoidance decisions every 100 ms
    SensorCheck,
    /// Sweep servos back and forth together
    ServoSweep {
        /// Servo driver channel to sweep; repeat for more than one
        #[arg(long = "channel", default_values_t = [0u8, 3])]
        channels: Vec<u8>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    let cli = Cli::parse();
    let settings = load_settings(cli.config.as_deref())?;
    let command = cli.command.unwrap_or_default();

    if cli.simulate {
        info!("Using simulated hardware");
        let world = SimWorld::new(&settings);
        let camera = match command {
            Command::Serve => world
                .camera(&settings.camera)
                .context("failed to start simulated camera")?,
            _ => None,
        };
        run::<SimRover>(command, settings, world.motors(), world.peripherals(), camera).await
    } else {
        run_hardware(command, settings).await
    }
}

#[cfg(feature = "rpi")]
async fn run_hardware(command: Command, settings: RoverSettings) -> anyhow::Result<()> {
    use server_rv::hardware::rpi::{self, RpiRover};

    let (motors, peripherals) =
        rpi::open(&settings).context("failed to open Raspberry Pi hardware")?;
    let camera = match command {
        Command::Serve => rpi::camera(&settings.camera),
        _ => None,
    };
    run::<RpiRover>(command, settings, motors, peripherals, camera).await
}

#[cfg(not(feature = "rpi"))]
async fn run_hardware(_command: Command, _settings: RoverSettings) -> anyhow::Result<()> {
    anyhow::bail!("built without the `rpi` feature; pass --simulate to use a simulated rover")
}

async fn run<R: RobotBehavior>(
    command: Command,
    settings: RoverSettings,
    motors: R::Motors,
    peripherals: R::Peripherals,
    camera: Option<CameraFeed>,
) -> anyhow::Result<()>
where
    R::Motors: Send,
    R::Peripherals: Send + ServoBank,
{
    match command {
        Command::Serve => serve::<R>(settings, motors, peripherals, camera).await,
        Command::SensorCheck => sensor_check(peripherals, &settings).await,
        Command::ServoSweep { channels } => servo_sweep(peripherals, &channels).await,
    }
}

async fn serve<R: RobotBehavior>(
    settings: RoverSettings,
    motors: R::Motors,
    peripherals: R::Peripherals,
    camera: Option<CameraFeed>,
) -> anyhow::Result<()>
where
    R::Motors: Send,
    R::Peripherals: Send,
{
    let bind = settings.http.bind.clone();
    let start_radar = settings.radar.start_on_boot;
    let data = Arc::new(SharedRoverData::new(settings));
    spawn_tasks::<R>(data.clone(), motors, peripherals).context("failed to start rover tasks")?;
    if start_radar {
        data.start_radar();
    }

    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .with_context(|| format!("failed to listen on {bind}"))?;
    info!("Rover control listening on http://{bind}");
    axum::serve(listener, router(data.clone(), camera))
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Failed to wait for Ctrl-C: {e}");
            }
        })
        .await?;

    info!("Shutting down, stopping motors");
    data.stop_radar();
    data.manual_command(DriveCommand::Stop).await;
    // give the motors and peripherals tasks a moment to apply it
    tokio::time::sleep(Duration::from_millis(100)).await;
    Ok(())
}
