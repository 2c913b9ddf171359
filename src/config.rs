use std::fs;
use std::path::Path;
use std::time::Duration;

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::frame::Side;

/// Destination ports, one per node in a multi-node rig
pub const DEFAULT_PORTS: [u16; 5] = [11001, 11002, 11003, 11004, 11005];

/// Upper bound on initialization attempts for resilient deployments
pub const MAX_INIT_RETRIES: u32 = 10;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccelRange {
    G2,
    G4,
    G8,
    G16,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MagGain {
    Gauss4,
    Gauss8,
    Gauss12,
    Gauss16,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum GyroScale {
    Dps245,
    Dps500,
    Dps2000,
}

/// Full-scale range triple applied to a sensor once it is found
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensorRanges {
    pub accel: AccelRange,
    pub mag: MagGain,
    pub gyro: GyroScale,
}

impl Default for SensorRanges {
    fn default() -> Self {
        Self {
            accel: AccelRange::G4,
            mag: MagGain::Gauss12,
            gyro: GyroScale::Dps500,
        }
    }
}

/// Addresses and retry policy for one sensor port
#[derive(Clone, Debug, PartialEq)]
pub struct PortConfig {
    pub side: Side,
    pub xg_address: u8,
    pub mag_address: u8,
    pub ranges: SensorRanges,
    pub max_retries: u32,
    pub retry_backoff: Duration,
}

impl PortConfig {
    /// Legacy wiring: left at 0x6A/0x1C, right at 0x6B/0x1E
    pub fn for_side(side: Side) -> Self {
        let (xg_address, mag_address) = match side {
            Side::L => (0x6A, 0x1C),
            Side::R => (0x6B, 0x1E),
        };
        Self {
            side,
            xg_address,
            mag_address,
            ranges: SensorRanges::default(),
            max_retries: 3,
            retry_backoff: Duration::from_secs(1),
        }
    }

    pub fn with_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries.clamp(1, MAX_INIT_RETRIES);
        self
    }

    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }
}

/// Timing knobs shared by the acquisition loop and the calibration task
#[derive(Clone, Debug, PartialEq)]
pub struct AcquisitionConfig {
    pub period: Duration,
    pub calibration_duration: Duration,
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            period: Duration::from_millis(10),
            calibration_duration: Duration::from_secs(5),
        }
    }
}

/// Pick this node's destination port from a small-integer identity file.
///
/// Any misconfiguration (missing file, garbage, index out of range) falls
/// back to index 0.
pub fn select_port(ports: &[u16], identity_file: &Path) -> u16 {
    let fallback = ports.first().copied().unwrap_or(DEFAULT_PORTS[0]);

    let index = match fs::read_to_string(identity_file) {
        Ok(content) => match content.trim().parse::<usize>() {
            Ok(index) => index,
            Err(_) => {
                warn!(
                    "[CONFIG] Node id {:?} in {} is not a small integer, using index 0",
                    content.trim(),
                    identity_file.display()
                );
                0
            }
        },
        Err(e) => {
            warn!(
                "[CONFIG] Cannot read node id from {} ({}), using index 0",
                identity_file.display(),
                e
            );
            0
        }
    };

    match ports.get(index) {
        Some(port) => {
            info!("[CONFIG] Node {} streams to port {}", index, port);
            *port
        }
        None => {
            warn!(
                "[CONFIG] Node id {} outside {} configured ports, using index 0",
                index,
                ports.len()
            );
            fallback
        }
    }
}
