//! Dual-IMU telemetry relay: live acquisition with background gyro
//! calibration, CSV capture, and timing-faithful replay over OSC/UDP.

pub mod acquisition;
pub mod calibration;
pub mod capture;
pub mod commands;
pub mod config;
pub mod error;
pub mod frame;
pub mod live_status;
pub mod playback;
pub mod sensor_port;
pub mod sensors;
pub mod session;
pub mod shutdown;
pub mod telemetry;

pub use acquisition::{AcquisitionEngine, EngineState};
pub use calibration::{bias_register, BiasReader, BiasWriter, Calibrator, GyroBias};
pub use capture::{load_capture, CaptureWriter};
pub use error::{CaptureError, DriverError, PlaybackError};
pub use frame::{Frame, Side, SideReading, Vec3};
pub use playback::{PlaybackEngine, PlaybackState};
pub use sensor_port::{PortState, SensorPort};
pub use session::{SessionStatus, SuccessRate};
pub use shutdown::Shutdown;
pub use telemetry::{OscUdpSink, TelemetrySink};
