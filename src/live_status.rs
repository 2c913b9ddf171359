use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use crate::calibration::BiasReader;
use crate::session::SessionStatus;

pub const STATUS_FILE: &str = "live_status.json";

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct LiveStatus {
    pub timestamp: f64,
    pub uptime_seconds: f64,
    pub total_attempts: u64,
    pub successful_reads: u64,
    pub success_rate: f64,
    pub calibrating: bool,
    // Gyro bias in dps
    pub gyro_bias_left: [f64; 3],
    pub gyro_bias_right: [f64; 3],
    pub left_connected: bool,
    pub right_connected: bool,
    pub capture_path: String,
}

impl LiveStatus {
    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }
}

/// Gathers a [`LiveStatus`] from the shared session state on demand
pub struct StatusReporter {
    session: Arc<SessionStatus>,
    bias: BiasReader,
    connected: [bool; 2],
    capture_path: PathBuf,
    output_path: PathBuf,
    started: Instant,
}

impl StatusReporter {
    pub fn new(
        session: Arc<SessionStatus>,
        bias: BiasReader,
        connected: [bool; 2],
        capture_path: PathBuf,
        output_dir: &Path,
    ) -> Self {
        Self {
            session,
            bias,
            connected,
            capture_path,
            output_path: output_dir.join(STATUS_FILE),
            started: Instant::now(),
        }
    }

    pub fn snapshot(&self) -> LiveStatus {
        let rate = self.session.success_rate();
        let bias = self.bias.snapshot();
        LiveStatus {
            timestamp: current_timestamp(),
            uptime_seconds: self.started.elapsed().as_secs_f64(),
            total_attempts: rate.total_attempts,
            successful_reads: rate.successful_reads,
            success_rate: rate.ratio(),
            calibrating: self.session.is_calibrating(),
            gyro_bias_left: [bias.left.x, bias.left.y, bias.left.z],
            gyro_bias_right: [bias.right.x, bias.right.y, bias.right.z],
            left_connected: self.connected[0],
            right_connected: self.connected[1],
            capture_path: self.capture_path.display().to_string(),
        }
    }

    /// Snapshot and write to `<output-dir>/live_status.json`
    pub fn write(&self) -> std::io::Result<&Path> {
        self.snapshot().save(&self.output_path)?;
        Ok(&self.output_path)
    }

    pub fn output_path(&self) -> &Path {
        &self.output_path
    }
}

pub fn current_timestamp() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}
