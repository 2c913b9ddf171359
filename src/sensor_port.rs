//! A possibly-absent physical sensor.
//!
//! Presence is decided once, at construction, by a bounded retry loop. After
//! that a port is either `Ready` for the rest of the process or `Absent` for
//! good; there is no re-discovery.

use std::sync::Mutex;
use std::thread::sleep;

use log::{info, warn};

use crate::config::PortConfig;
use crate::error::DriverError;
use crate::frame::{Side, SideReading};
use crate::sensors::ImuDevice;

pub enum PortState<D> {
    Ready(Mutex<D>),
    Absent,
}

pub struct SensorPort<D> {
    config: PortConfig,
    state: PortState<D>,
}

impl<D: ImuDevice> SensorPort<D> {
    /// Try `open` up to `max_retries` times with a fixed backoff in between.
    ///
    /// Exhausting the retries yields an `Absent` port. That is a valid,
    /// degraded state and not an error.
    pub fn initialize<F>(config: PortConfig, mut open: F) -> Self
    where
        F: FnMut(&PortConfig) -> Result<D, DriverError>,
    {
        for attempt in 1..=config.max_retries {
            match open(&config) {
                Ok(device) => {
                    info!(
                        "[PORT] {} sensor ready at 0x{:02X}/0x{:02X} (attempt {}/{})",
                        config.side.label(),
                        config.xg_address,
                        config.mag_address,
                        attempt,
                        config.max_retries
                    );
                    return Self {
                        config,
                        state: PortState::Ready(Mutex::new(device)),
                    };
                }
                Err(e) => {
                    warn!(
                        "[PORT] {} sensor 0x{:02X}/0x{:02X} init attempt {}/{} failed: {}",
                        config.side.label(),
                        config.xg_address,
                        config.mag_address,
                        attempt,
                        config.max_retries,
                        e
                    );
                    if attempt < config.max_retries {
                        sleep(config.retry_backoff);
                    }
                }
            }
        }

        warn!(
            "[PORT] {} sensor not found, continuing with zero-filled readings",
            config.side.label()
        );
        Self::absent(config)
    }

    /// A port that is known not to have a sensor
    pub fn absent(config: PortConfig) -> Self {
        Self {
            config,
            state: PortState::Absent,
        }
    }

    /// Wrap an already opened device
    pub fn ready(config: PortConfig, device: D) -> Self {
        Self {
            config,
            state: PortState::Ready(Mutex::new(device)),
        }
    }

    pub fn side(&self) -> Side {
        self.config.side
    }

    pub fn config(&self) -> &PortConfig {
        &self.config
    }

    pub fn state(&self) -> &PortState<D> {
        &self.state
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.state, PortState::Ready(_))
    }

    /// Read one sample.
    ///
    /// Absent ports return the zero-fill sentinel without touching the bus.
    /// A failed transaction is logged and also yields the zero-fill sentinel,
    /// so the caller's cadence is never broken by a bad read.
    pub fn read(&self) -> SideReading {
        match &self.state {
            PortState::Absent => SideReading::zero_fill(),
            PortState::Ready(device) => {
                let mut device = device.lock().unwrap_or_else(|e| e.into_inner());
                match device.read_frame() {
                    Ok(reading) => reading,
                    Err(e) => {
                        warn!("[PORT] {} read failed: {}", self.config.side.label(), e);
                        SideReading::zero_fill()
                    }
                }
            }
        }
    }
}
