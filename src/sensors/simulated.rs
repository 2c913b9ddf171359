use std::f64::consts::PI;
use std::time::Instant;

use crate::error::DriverError;
use crate::frame::{SideReading, Vec3};
use crate::sensors::ImuDevice;

/// Synthetic stand-in for a real sensor, used with `--simulate`.
///
/// Produces gentle sinusoidal motion around 1 g with a constant gyro offset so
/// calibration has a bias to find. Motion follows wall-clock time, so extra
/// readers (the calibration task) do not speed it up.
pub struct SimulatedImu {
    started: Instant,
    phase: f64,
    gyro_offset: Vec3,
}

impl SimulatedImu {
    pub fn new(phase: f64, gyro_offset: Vec3) -> Self {
        Self {
            started: Instant::now(),
            phase,
            gyro_offset,
        }
    }

    /// Reading at `t` seconds of simulated motion
    pub fn sample_at(&self, t: f64) -> SideReading {
        let accel = Vec3::new(
            (t * 2.0 * PI).sin() * 0.5,
            (t * 2.0 * PI).cos() * 0.3,
            9.81 + (t * PI).sin() * 0.1,
        );
        let mag = Vec3::new(0.2 * (t * 0.1).cos(), 0.2 * (t * 0.1).sin(), -0.4);
        let gyro = Vec3::new(
            (t * 0.5).sin() * 0.05,
            (t * 0.3).cos() * 0.03,
            (t * 1.0).sin() * 0.1,
        ) + self.gyro_offset;

        SideReading::new(accel, mag, gyro)
    }
}

impl ImuDevice for SimulatedImu {
    fn read_frame(&mut self) -> Result<SideReading, DriverError> {
        let t = self.started.elapsed().as_secs_f64() + self.phase;
        Ok(self.sample_at(t))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simulated_reads_are_never_zero_fill() {
        let mut imu = SimulatedImu::new(0.0, Vec3::new(0.5, -0.5, 0.1));
        for _ in 0..100 {
            let reading = imu.read_frame().unwrap();
            assert!(!reading.is_zero_fill());
            assert!(reading.accel.z > 9.0);
        }
    }

    #[test]
    fn test_read_count_does_not_advance_motion() {
        let offset = Vec3::new(0.8, -0.4, 0.2);
        let mut busy = SimulatedImu::new(0.25, offset);
        let mut idle = SimulatedImu::new(0.25, offset);

        for _ in 0..1000 {
            busy.read_frame().unwrap();
        }
        let a = busy.read_frame().unwrap();
        let b = idle.read_frame().unwrap();

        assert!((a.accel - b.accel).norm() < 0.05, "{:?} vs {:?}", a.accel, b.accel);
        assert!((a.gyro - b.gyro).norm() < 0.05, "{:?} vs {:?}", a.gyro, b.gyro);
    }

    #[test]
    fn test_sample_is_a_function_of_time() {
        let imu = SimulatedImu::new(0.0, Vec3::zeros());
        assert_eq!(imu.sample_at(1.5), imu.sample_at(1.5));
        assert_ne!(imu.sample_at(0.1).accel, imu.sample_at(0.35).accel);
    }
}
