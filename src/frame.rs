//! Shared data model: one timestamped 18-channel sample from a dual IMU rig.
//!
//! A side whose sensor is absent or whose read failed is carried as an
//! all-zero reading, never as a missing value. Consumers tell "zero" from
//! "missing" only through the connection-status flags.

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

pub type Vec3 = Vector3<f64>;

/// Number of numeric channels in a frame (two sides x accel/mag/gyro x 3 axes)
pub const CHANNEL_COUNT: usize = 18;

/// Capture header: `Time (ms)` followed by the 18 channels, L then R
pub const CAPTURE_HEADER: [&str; CHANNEL_COUNT + 1] = [
    "Time (ms)",
    "L_Accel_X",
    "L_Accel_Y",
    "L_Accel_Z",
    "L_Mag_X",
    "L_Mag_Y",
    "L_Mag_Z",
    "L_Gyro_X",
    "L_Gyro_Y",
    "L_Gyro_Z",
    "R_Accel_X",
    "R_Accel_Y",
    "R_Accel_Z",
    "R_Mag_X",
    "R_Mag_Y",
    "R_Mag_Z",
    "R_Gyro_X",
    "R_Gyro_Y",
    "R_Gyro_Z",
];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    L,
    R,
}

impl Side {
    pub const BOTH: [Side; 2] = [Side::L, Side::R];

    pub fn index(self) -> usize {
        match self {
            Side::L => 0,
            Side::R => 1,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Side::L => "L",
            Side::R => "R",
        }
    }
}

/// One sensor's accel + mag + gyro triples
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SideReading {
    pub accel: Vec3,
    pub mag: Vec3,
    pub gyro: Vec3,
}

impl SideReading {
    /// The zero-fill sentinel used for absent or failed reads
    pub fn zero_fill() -> Self {
        Self {
            accel: Vec3::zeros(),
            mag: Vec3::zeros(),
            gyro: Vec3::zeros(),
        }
    }

    pub fn new(accel: Vec3, mag: Vec3, gyro: Vec3) -> Self {
        Self { accel, mag, gyro }
    }

    pub fn is_zero_fill(&self) -> bool {
        *self == Self::zero_fill()
    }

    /// Subtract a gyroscope bias, leaving accel and mag untouched
    pub fn with_gyro_bias_removed(mut self, bias: &Vec3) -> Self {
        self.gyro -= bias;
        self
    }

    /// Flatten as accel, mag, gyro
    pub fn channels(&self) -> [f64; 9] {
        let mut out = [0.0; 9];
        out[0..3].copy_from_slice(self.accel.as_slice());
        out[3..6].copy_from_slice(self.mag.as_slice());
        out[6..9].copy_from_slice(self.gyro.as_slice());
        out
    }

    /// Inverse of [`SideReading::channels`]
    pub fn from_channels(values: &[f64; 9]) -> Self {
        Self {
            accel: Vec3::new(values[0], values[1], values[2]),
            mag: Vec3::new(values[3], values[4], values[5]),
            gyro: Vec3::new(values[6], values[7], values[8]),
        }
    }
}

impl Default for SideReading {
    fn default() -> Self {
        Self::zero_fill()
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Frame {
    pub timestamp_ms: f64,
    pub left: SideReading,
    pub right: SideReading,
}

impl Frame {
    pub fn new(timestamp_ms: f64, left: SideReading, right: SideReading) -> Self {
        Self {
            timestamp_ms,
            left,
            right,
        }
    }

    pub fn side(&self, side: Side) -> &SideReading {
        match side {
            Side::L => &self.left,
            Side::R => &self.right,
        }
    }

    /// All 18 channels in capture column order
    pub fn channels(&self) -> [f64; CHANNEL_COUNT] {
        let mut out = [0.0; CHANNEL_COUNT];
        out[..9].copy_from_slice(&self.left.channels());
        out[9..].copy_from_slice(&self.right.channels());
        out
    }

    /// Rebuild from a timestamp and 18 channels in capture column order
    pub fn from_channels(timestamp_ms: f64, channels: &[f64; CHANNEL_COUNT]) -> Self {
        let mut left = [0.0; 9];
        let mut right = [0.0; 9];
        left.copy_from_slice(&channels[..9]);
        right.copy_from_slice(&channels[9..]);
        Self {
            timestamp_ms,
            left: SideReading::from_channels(&left),
            right: SideReading::from_channels(&right),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_fill_sentinel() {
        assert!(SideReading::zero_fill().is_zero_fill());
        assert!(SideReading::default().is_zero_fill());

        let reading = SideReading::new(Vec3::new(0.0, 0.0, 9.8), Vec3::zeros(), Vec3::zeros());
        assert!(!reading.is_zero_fill());
    }

    #[test]
    fn test_channel_order_is_left_then_right() {
        let left = SideReading::new(
            Vec3::new(1.0, 2.0, 3.0),
            Vec3::new(4.0, 5.0, 6.0),
            Vec3::new(7.0, 8.0, 9.0),
        );
        let right = SideReading::new(
            Vec3::new(10.0, 11.0, 12.0),
            Vec3::new(13.0, 14.0, 15.0),
            Vec3::new(16.0, 17.0, 18.0),
        );
        let frame = Frame::new(42.0, left, right);

        let channels = frame.channels();
        for (i, value) in channels.iter().enumerate() {
            assert_eq!(*value, (i + 1) as f64);
        }
        assert_eq!(Frame::from_channels(42.0, &channels), frame);
    }

    #[test]
    fn test_side_channels_invert() {
        let reading = SideReading::new(
            Vec3::new(0.5, -1.5, 9.8),
            Vec3::new(0.2, 0.0, -0.4),
            Vec3::new(-0.01, 0.02, 0.3),
        );
        let channels: [f64; 9] = reading.channels();
        assert_eq!(SideReading::from_channels(&channels), reading);
    }

    #[test]
    fn test_gyro_bias_only_touches_gyro() {
        let reading = SideReading::new(
            Vec3::new(1.0, 1.0, 1.0),
            Vec3::new(2.0, 2.0, 2.0),
            Vec3::new(3.0, 3.0, 3.0),
        );
        let corrected = reading.with_gyro_bias_removed(&Vec3::new(1.0, -1.0, 0.5));

        assert_eq!(corrected.accel, reading.accel);
        assert_eq!(corrected.mag, reading.mag);
        assert_eq!(corrected.gyro, Vec3::new(2.0, 4.0, 2.5));
    }

    #[test]
    fn test_header_layout() {
        assert_eq!(CAPTURE_HEADER.len(), 19);
        assert_eq!(CAPTURE_HEADER[0], "Time (ms)");
        assert!(CAPTURE_HEADER[1].starts_with("L_Accel"));
        assert!(CAPTURE_HEADER[18].starts_with("R_Gyro"));
    }
}
