//! Scheduling of the ultrasonic "radar" sweep
//!
//! The front ultrasonic sensor sits on a servo. A scan is one pass from 0 to 180 degrees and
//! back, measuring at every step. [`RadarSweep`] only decides where the servo should point and
//! when; the peripherals task moves the servo and takes the measurements.

use crate::constants::{SERVO_CENTER_DEGREES, SERVO_MAX_DEGREES};
use crate::messages::settings::RadarSettings;
use crate::util::CrossPlatformInstant;
use serde::{Deserialize, Serialize};

/// A measurement at one servo angle, serialized as `[angle, distance]`
///
/// A distance of `None` means nothing was in range.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RadarPoint(pub u16, pub Option<f32>);

/// Angles visited during one scan, both ends included on each pass
pub fn sweep_angles(step_degrees: u16) -> Vec<u16> {
    let step = step_degrees.max(1) as usize;
    let up = (0..=SERVO_MAX_DEGREES).step_by(step);
    let down = (0..=SERVO_MAX_DEGREES).rev().step_by(step);
    up.chain(down).collect()
}

/// What the peripherals task should do with the servo next
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RadarAction {
    /// The radar is off
    Idle,
    /// Center the servo
    Park,
    /// Leave the servo where it is
    Hold,
    /// Point the servo here, wait for it to arrive, then measure and call [`RadarSweep::record`]
    Aim(u16),
}

#[derive(Copy, Clone, Debug)]
enum Phase<I> {
    Stopped,
    Settling { since: I },
    Sweeping { index: usize },
    Resting { since: I },
}

pub struct RadarSweep<I> {
    settings: RadarSettings,
    angles: Vec<u16>,
    phase: Phase<I>,
    scan: Vec<RadarPoint>,
    /// Start/stop generation this sweep belongs to
    generation: u32,
}

impl<I: CrossPlatformInstant + Default> RadarSweep<I> {
    pub fn new(settings: RadarSettings) -> Self {
        Self {
            angles: sweep_angles(settings.step_degrees),
            settings,
            phase: Phase::Stopped,
            scan: vec![],
            generation: 0,
        }
    }

    pub fn is_stopped(&self) -> bool {
        matches!(self.phase, Phase::Stopped)
    }

    /// Advance the schedule
    ///
    /// `running` is whether the radar should be sweeping. `generation` changes every time the
    /// radar is started or stopped; any change starts over from a parked, settling servo, even
    /// if the radar was stopped and started again between two calls.
    pub fn next_action(&mut self, running: bool, generation: u32) -> RadarAction {
        if generation != self.generation {
            self.generation = generation;
            let was_stopped = self.is_stopped();
            self.phase = Phase::Stopped;
            self.scan.clear();
            if !running && !was_stopped {
                return RadarAction::Park;
            }
        }
        if !running {
            return if self.is_stopped() {
                RadarAction::Idle
            } else {
                self.phase = Phase::Stopped;
                self.scan.clear();
                RadarAction::Park
            };
        }
        match self.phase {
            Phase::Stopped => {
                self.phase = Phase::Settling {
                    since: I::default(),
                };
                RadarAction::Park
            }
            Phase::Settling { since } if since.elapsed() < self.settings.settle() => {
                RadarAction::Hold
            }
            Phase::Resting { since } if since.elapsed() < self.settings.sweep_pause() => {
                RadarAction::Hold
            }
            Phase::Settling { .. } | Phase::Resting { .. } => {
                self.phase = Phase::Sweeping { index: 0 };
                RadarAction::Aim(self.angles[0])
            }
            Phase::Sweeping { index } => RadarAction::Aim(self.angles[index]),
        }
    }

    /// Store the measurement taken after [`RadarAction::Aim`]
    ///
    /// Returns the finished scan after the last angle of a cycle.
    pub fn record(&mut self, angle: u16, distance: Option<f32>) -> Option<Vec<RadarPoint>> {
        let Phase::Sweeping { index } = self.phase else {
            return None;
        };
        self.scan.push(RadarPoint(angle, distance));
        if index + 1 < self.angles.len() {
            self.phase = Phase::Sweeping { index: index + 1 };
            None
        } else {
            self.phase = Phase::Resting {
                since: I::default(),
            };
            Some(core::mem::take(&mut self.scan))
        }
    }

    /// Where the servo rests when the radar is not sweeping
    pub fn park_angle(&self) -> u16 {
        SERVO_CENTER_DEGREES
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TokioInstant;
    use core::time::Duration;

    #[test]
    fn default_pattern() {
        let angles = sweep_angles(5);
        assert_eq!(angles.len(), 74);
        assert_eq!(&angles[..3], &[0, 5, 10]);
        assert_eq!(&angles[35..39], &[175, 180, 180, 175]);
        assert_eq!(angles.last(), Some(&0));
    }

    #[test]
    fn uneven_step() {
        let angles = sweep_angles(50);
        assert_eq!(angles, vec![0, 50, 100, 150, 180, 130, 80, 30]);
    }

    #[test]
    fn points_serialize_as_pairs() {
        let json = serde_json::to_string(&vec![RadarPoint(5, Some(31.5)), RadarPoint(10, None)])
            .unwrap();
        assert_eq!(json, "[[5,31.5],[10,null]]");
    }

    #[tokio::test(start_paused = true)]
    async fn settles_before_sweeping() {
        let mut radar: RadarSweep<TokioInstant> = RadarSweep::new(RadarSettings::default());
        assert_eq!(radar.next_action(false, 0), RadarAction::Idle);
        assert_eq!(radar.next_action(true, 0), RadarAction::Park);
        assert_eq!(radar.next_action(true, 0), RadarAction::Hold);
        tokio::time::advance(Duration::from_millis(999)).await;
        assert_eq!(radar.next_action(true, 0), RadarAction::Hold);
        tokio::time::advance(Duration::from_millis(1)).await;
        assert_eq!(radar.next_action(true, 0), RadarAction::Aim(0));
        // the same angle until it is measured
        assert_eq!(radar.next_action(true, 0), RadarAction::Aim(0));
        assert_eq!(radar.record(0, Some(50.0)), None);
        assert_eq!(radar.next_action(true, 0), RadarAction::Aim(5));
    }

    #[tokio::test(start_paused = true)]
    async fn full_cycle_produces_scan_then_rests() {
        let settings = RadarSettings {
            step_degrees: 90,
            ..Default::default()
        };
        let mut radar: RadarSweep<TokioInstant> = RadarSweep::new(settings);
        radar.next_action(true, 0);
        tokio::time::advance(Duration::from_secs(1)).await;

        let mut scan = None;
        for _ in 0..6 {
            let RadarAction::Aim(angle) = radar.next_action(true, 0) else {
                panic!("expected to aim");
            };
            scan = radar.record(angle, Some(angle as f32));
        }
        let scan = scan.expect("a finished scan");
        assert_eq!(
            scan.iter().map(|p| p.0).collect::<Vec<_>>(),
            vec![0, 90, 180, 180, 90, 0]
        );

        assert_eq!(radar.next_action(true, 0), RadarAction::Hold);
        tokio::time::advance(Duration::from_millis(500)).await;
        assert_eq!(radar.next_action(true, 0), RadarAction::Aim(0));
    }

    #[tokio::test(start_paused = true)]
    async fn stopping_parks_and_forgets() {
        let mut radar: RadarSweep<TokioInstant> = RadarSweep::new(RadarSettings::default());
        radar.next_action(true, 0);
        tokio::time::advance(Duration::from_secs(1)).await;
        radar.next_action(true, 0);
        radar.record(0, None);

        assert_eq!(radar.next_action(false, 0), RadarAction::Park);
        assert!(radar.is_stopped());
        assert_eq!(radar.record(5, None), None);
        assert_eq!(radar.next_action(false, 0), RadarAction::Idle);
        // restarting settles again and begins from 0
        assert_eq!(radar.next_action(true, 0), RadarAction::Park);
        tokio::time::advance(Duration::from_secs(1)).await;
        assert_eq!(radar.next_action(true, 0), RadarAction::Aim(0));
    }

    #[tokio::test(start_paused = true)]
    async fn quick_restart_parks_settles_and_drops_partial_scan() {
        let settings = RadarSettings {
            step_degrees: 90,
            ..Default::default()
        };
        let mut radar: RadarSweep<TokioInstant> = RadarSweep::new(settings);
        assert_eq!(radar.next_action(true, 1), RadarAction::Park);
        tokio::time::advance(Duration::from_secs(1)).await;
        assert_eq!(radar.next_action(true, 1), RadarAction::Aim(0));
        radar.record(0, Some(1.0));
        assert_eq!(radar.next_action(true, 1), RadarAction::Aim(90));
        radar.record(90, Some(1.0));

        // stopped and started again since the last step
        assert_eq!(radar.next_action(true, 3), RadarAction::Park);
        assert_eq!(radar.next_action(true, 3), RadarAction::Hold);
        tokio::time::advance(Duration::from_secs(1)).await;

        let mut scan = None;
        for _ in 0..6 {
            let RadarAction::Aim(angle) = radar.next_action(true, 3) else {
                panic!("expected to aim");
            };
            scan = radar.record(angle, Some(2.0));
        }
        let scan = scan.expect("a finished scan");
        assert_eq!(scan.len(), 6);
        assert!(scan.iter().all(|p| p.1 == Some(2.0)));
    }

    #[tokio::test(start_paused = true)]
    async fn stop_seen_through_generation_parks_once() {
        let mut radar: RadarSweep<TokioInstant> = RadarSweep::new(RadarSettings::default());
        radar.next_action(true, 1);
        assert_eq!(radar.next_action(false, 2), RadarAction::Park);
        assert_eq!(radar.next_action(false, 2), RadarAction::Idle);
        // a start and stop that both happened while idle
        assert_eq!(radar.next_action(false, 4), RadarAction::Idle);
    }
}
