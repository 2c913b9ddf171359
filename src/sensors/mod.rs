pub mod lsm9ds1;
pub mod simulated;

pub use lsm9ds1::Lsm9ds1;
pub use simulated::SimulatedImu;

use crate::error::DriverError;
use crate::frame::SideReading;

/// A live IMU that can produce one accel/mag/gyro reading per call
pub trait ImuDevice: Send {
    fn read_frame(&mut self) -> Result<SideReading, DriverError>;
}

impl<T: ImuDevice + ?Sized> ImuDevice for Box<T> {
    fn read_frame(&mut self) -> Result<SideReading, DriverError> {
        (**self).read_frame()
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Plays back a script of read results, then repeats `fallback` forever
    pub struct ScriptedImu {
        script: VecDeque<Result<SideReading, DriverError>>,
        fallback: Result<SideReading, DriverError>,
        pub reads: Arc<AtomicUsize>,
    }

    impl ScriptedImu {
        pub fn new(
            script: Vec<Result<SideReading, DriverError>>,
            fallback: Result<SideReading, DriverError>,
        ) -> Self {
            Self {
                script: script.into(),
                fallback,
                reads: Arc::new(AtomicUsize::new(0)),
            }
        }

        /// Always returns the same reading
        pub fn steady(reading: SideReading) -> Self {
            Self::new(Vec::new(), Ok(reading))
        }
    }

    impl ImuDevice for ScriptedImu {
        fn read_frame(&mut self) -> Result<SideReading, DriverError> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            self.script
                .pop_front()
                .unwrap_or_else(|| self.fallback.clone())
        }
    }

    pub fn bus_error() -> DriverError {
        DriverError::Bus {
            address: 0x6A,
            reason: "nack".to_string(),
        }
    }
}
