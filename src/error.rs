use std::path::PathBuf;

use thiserror::Error;

/// Failures raised by an IMU device while opening or reading it
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DriverError {
    #[error("I2C transaction failed at 0x{address:02X}: {reason}")]
    Bus { address: u8, reason: String },

    #[error("Unexpected WHO_AM_I at 0x{address:02X}: got 0x{found:02X}, expected 0x{expected:02X}")]
    Identity { address: u8, found: u8, expected: u8 },

    #[error("Device not available: {0}")]
    Unavailable(String),
}

/// Recorded capture I/O and format errors
#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("Failed to open capture {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Capture CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Failed to flush capture: {0}")]
    Flush(#[from] std::io::Error),

    #[error("Malformed capture record at row {row}: {reason}")]
    Malformed { row: usize, reason: String },
}

/// Errors that stop a replay before or during `Playing`
#[derive(Error, Debug)]
pub enum PlaybackError {
    #[error("Capture unreadable: {0}")]
    Capture(#[from] CaptureError),

    #[error("Capture {0} holds no data record after the header")]
    Empty(PathBuf),
}
