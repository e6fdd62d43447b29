//! Raspberry Pi backend: L298N motor driver, infrared and HC-SR04 sensors on GPIO, the radar
//! servo on a PCA9685 board over I2C, and a V4L2 camera

use crate::camera::CameraFeed;
use crate::diagnostics::ServoBank;
use axum::body::Bytes;
use core_rv::constants::{SERVO_PERIOD_US, ULTRASONIC_ECHO_TIMEOUT};
use core_rv::drive::HBridgeLevels;
use core_rv::driving::motors::RobotMotorsBehavior;
use core_rv::driving::peripherals::RobotPeripheralsBehavior;
use core_rv::driving::RobotBehavior;
use core_rv::messages::settings::{CameraSettings, RadarSettings, RoverSettings, UltrasonicPins};
use core_rv::messages::{Side, UltrasonicPosition};
use core_rv::ultrasonic::{echo_to_distance, time_echo};
use core_rv::TokioInstant;
use pwm_pca9685::{Address, Channel, Pca9685};
use rppal::gpio::{Gpio, InputPin, Level, OutputPin};
use rppal::i2c::I2c;
use log::{error, info, warn};
use std::fmt::{Display, Formatter};
use std::io;
use std::thread::{self, sleep};
use std::time::Duration;
use tokio::sync::watch;
use v4l::buffer::Type;
use v4l::io::mmap::Stream;
use v4l::io::traits::CaptureStream;
use v4l::video::Capture;
use v4l::{Device, FourCC};

/// Prescale that gives the PCA9685's 25 MHz oscillator a 50 Hz output
const SERVO_PRESCALE: u8 = 121;
const PCA9685_STEPS: u32 = 4096;
const CAMERA_BUFFERS: u32 = 4;

#[derive(Debug)]
pub enum RpiError {
    Gpio(rppal::gpio::Error),
    I2c(rppal::i2c::Error),
    Servo(pwm_pca9685::Error<rppal::i2c::Error>),
    NoSuchChannel(u8),
    NotInstalled,
}

impl Display for RpiError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            RpiError::Gpio(e) => write!(f, "GPIO error: {e}"),
            RpiError::I2c(e) => write!(f, "I2C error: {e}"),
            RpiError::Servo(e) => write!(f, "PCA9685 error: {e:?}"),
            RpiError::NoSuchChannel(c) => write!(f, "PCA9685 has no channel {c}"),
            RpiError::NotInstalled => write!(f, "sensor is not installed"),
        }
    }
}

impl std::error::Error for RpiError {}

impl From<rppal::gpio::Error> for RpiError {
    fn from(e: rppal::gpio::Error) -> Self {
        RpiError::Gpio(e)
    }
}

impl From<rppal::i2c::Error> for RpiError {
    fn from(e: rppal::i2c::Error) -> Self {
        RpiError::I2c(e)
    }
}

impl From<pwm_pca9685::Error<rppal::i2c::Error>> for RpiError {
    fn from(e: pwm_pca9685::Error<rppal::i2c::Error>) -> Self {
        RpiError::Servo(e)
    }
}

pub struct RpiRover;

impl RobotBehavior for RpiRover {
    type Instant = TokioInstant;

    type Motors = RpiMotors;
    type Peripherals = RpiPeripherals;
}

/// Open the GPIO pins and servo driver named in `settings`
pub fn open(settings: &RoverSettings) -> Result<(RpiMotors, RpiPeripherals), RpiError> {
    let gpio = Gpio::new()?;
    let motors = RpiMotors::new(&gpio, settings)?;
    let servo = Servo::new(settings.pins.servo_channel, settings.radar.clone())?;
    let peripherals = RpiPeripherals::new(&gpio, settings, servo)?;
    Ok((motors, peripherals))
}

pub struct RpiMotors {
    /// IN1 to IN4
    direction: [OutputPin; 4],
    /// ENA and ENB
    enable: [OutputPin; 2],
    pwm_frequency_hz: f64,
}

impl RpiMotors {
    pub fn new(gpio: &Gpio, settings: &RoverSettings) -> Result<Self, RpiError> {
        let pins = &settings.pins;
        let output =
            |pin: u8| -> Result<OutputPin, RpiError> { Ok(gpio.get(pin)?.into_output_low()) };
        Ok(Self {
            direction: [
                output(pins.in1)?,
                output(pins.in2)?,
                output(pins.in3)?,
                output(pins.in4)?,
            ],
            enable: [output(pins.ena)?, output(pins.enb)?],
            pwm_frequency_hz: settings.drive.pwm_frequency_hz,
        })
    }
}

impl RobotMotorsBehavior for RpiMotors {
    type Error = RpiError;

    async fn set_direction(&mut self, levels: HBridgeLevels) -> Result<(), Self::Error> {
        for (pin, high) in self.direction.iter_mut().zip(levels.0) {
            pin.write(Level::from(high));
        }
        Ok(())
    }

    async fn set_duty_cycle(&mut self, percent: u8) -> Result<(), Self::Error> {
        let duty = percent.min(100) as f64 / 100.0;
        for pin in &mut self.enable {
            pin.set_pwm_frequency(self.pwm_frequency_hz, duty)?;
        }
        Ok(())
    }
}

struct Ultrasonic {
    trigger: OutputPin,
    echo: InputPin,
}

impl Ultrasonic {
    fn new(gpio: &Gpio, pins: UltrasonicPins) -> Result<Self, RpiError> {
        Ok(Self {
            trigger: gpio.get(pins.trigger)?.into_output_low(),
            echo: gpio.get(pins.echo)?.into_input(),
        })
    }

    fn measure(&mut self) -> Option<f32> {
        self.trigger.set_low();
        sleep(Duration::from_micros(2));
        self.trigger.set_high();
        sleep(Duration::from_micros(10));
        self.trigger.set_low();
        let echo = &self.echo;
        let pulse = time_echo(|| Ok::<_, RpiError>(echo.is_high()), ULTRASONIC_ECHO_TIMEOUT);
        pulse.ok().flatten().and_then(echo_to_distance)
    }
}

/// Hobby servo on one PCA9685 channel
pub struct Servo {
    pca: Pca9685<I2c>,
    channel: Channel,
    radar: RadarSettings,
}

fn channel(number: u8) -> Result<Channel, RpiError> {
    Ok(match number {
        0 => Channel::C0,
        1 => Channel::C1,
        2 => Channel::C2,
        3 => Channel::C3,
        4 => Channel::C4,
        5 => Channel::C5,
        6 => Channel::C6,
        7 => Channel::C7,
        8 => Channel::C8,
        9 => Channel::C9,
        10 => Channel::C10,
        11 => Channel::C11,
        12 => Channel::C12,
        13 => Channel::C13,
        14 => Channel::C14,
        15 => Channel::C15,
        n => return Err(RpiError::NoSuchChannel(n)),
    })
}

impl Servo {
    pub fn new(channel_number: u8, radar: RadarSettings) -> Result<Self, RpiError> {
        let mut pca = Pca9685::new(I2c::new()?, Address::default())?;
        pca.set_prescale(SERVO_PRESCALE)?;
        pca.enable()?;
        Ok(Self {
            pca,
            channel: channel(channel_number)?,
            radar,
        })
    }

    pub fn set_angle(&mut self, degrees: u16) -> Result<(), RpiError> {
        self.set_channel_angle(self.channel, degrees)
    }

    fn set_channel_angle(&mut self, channel: Channel, degrees: u16) -> Result<(), RpiError> {
        let pulse_us = self.radar.pulse_width_us(degrees);
        let off = (pulse_us * PCA9685_STEPS / SERVO_PERIOD_US) as u16;
        self.pca.set_channel_on_off(channel, 0, off)?;
        Ok(())
    }
}

pub struct RpiPeripherals {
    /// Left and right
    infrared: [Option<InputPin>; 2],
    /// Front, left, and right
    ultrasonic: [Option<Ultrasonic>; 3],
    servo: Servo,
}

impl RpiPeripherals {
    pub fn new(gpio: &Gpio, settings: &RoverSettings, servo: Servo) -> Result<Self, RpiError> {
        let pins = &settings.pins;
        let input = |pin: Option<u8>| -> Result<Option<InputPin>, RpiError> {
            pin.map(|pin| -> Result<InputPin, RpiError> { Ok(gpio.get(pin)?.into_input()) })
                .transpose()
        };
        let ultrasonic = |pins: Option<UltrasonicPins>| -> Result<Option<Ultrasonic>, RpiError> {
            pins.map(|pins| Ultrasonic::new(gpio, pins)).transpose()
        };
        Ok(Self {
            infrared: [input(pins.ir_left)?, input(pins.ir_right)?],
            ultrasonic: [
                ultrasonic(pins.us_front)?,
                ultrasonic(pins.us_left)?,
                ultrasonic(pins.us_right)?,
            ],
            servo,
        })
    }
}

impl RobotPeripheralsBehavior for RpiPeripherals {
    type Error = RpiError;

    async fn infrared_level(&mut self, side: Side) -> Result<bool, Self::Error> {
        let pin = self.infrared[side as usize]
            .as_ref()
            .ok_or(RpiError::NotInstalled)?;
        Ok(pin.is_high())
    }

    async fn ultrasonic_distance(
        &mut self,
        position: UltrasonicPosition,
    ) -> Result<Option<f32>, Self::Error> {
        let sensor = self.ultrasonic[position as usize]
            .as_mut()
            .ok_or(RpiError::NotInstalled)?;
        Ok(sensor.measure())
    }

    async fn set_servo_angle(&mut self, degrees: u16) -> Result<(), Self::Error> {
        self.servo.set_angle(degrees)
    }
}

impl ServoBank for RpiPeripherals {
    type Error = RpiError;

    async fn set_channel_angle(&mut self, number: u8, degrees: u16) -> Result<(), Self::Error> {
        self.servo.set_channel_angle(channel(number)?, degrees)
    }
}

fn open_camera(settings: &CameraSettings) -> io::Result<Device> {
    let device = Device::new(settings.device)?;
    let mut format = device.format()?;
    format.width = settings.width;
    format.height = settings.height;
    format.fourcc = FourCC::new(b"MJPG");
    let format = device.set_format(&format)?;
    if format.fourcc.repr != *b"MJPG" {
        return Err(io::Error::new(
            io::ErrorKind::Unsupported,
            format!("camera offers {} instead of MJPEG", format.fourcc),
        ));
    }
    info!(
        "Camera {} streaming {}x{} MJPEG",
        settings.device, format.width, format.height
    );
    Ok(device)
}

fn capture(device: Device, frames: watch::Sender<Option<Bytes>>) {
    let mut stream = match Stream::with_buffers(&device, Type::VideoCapture, CAMERA_BUFFERS) {
        Ok(stream) => stream,
        Err(e) => {
            error!("Failed to start camera capture: {e}");
            return;
        }
    };
    while !frames.is_closed() {
        match stream.next() {
            Ok((buffer, meta)) => {
                let len = (meta.bytesused as usize).min(buffer.len());
                frames.send_replace(Some(Bytes::copy_from_slice(&buffer[..len])));
            }
            Err(e) => {
                error!("Camera capture stopped: {e}");
                return;
            }
        }
    }
}

/// Start capturing from the camera, or `None` if there is no usable camera
pub fn camera(settings: &CameraSettings) -> Option<CameraFeed> {
    if !settings.enabled {
        return None;
    }
    let device = match open_camera(settings) {
        Ok(device) => device,
        Err(e) => {
            warn!("Could not open camera {}: {e}. Continuing without video feed", settings.device);
            return None;
        }
    };
    let (frames, feed) = CameraFeed::channel();
    match thread::Builder::new()
        .name("camera".into())
        .spawn(move || capture(device, frames))
    {
        Ok(_) => Some(feed),
        Err(e) => {
            warn!("Failed to start camera thread: {e}");
            None
        }
    }
}
