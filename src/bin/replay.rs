use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use log::{error, info};

use imu_relay_rs::error::PlaybackError;
use imu_relay_rs::playback::{PlaybackEngine, PlaybackState};
use imu_relay_rs::shutdown::Shutdown;
use imu_relay_rs::telemetry::OscUdpSink;

#[derive(Parser, Debug)]
#[command(name = "replay")]
#[command(about = "Replay a recorded IMU capture over OSC with its original timing", long_about = None)]
struct Args {
    /// Telemetry receiver host
    host: String,

    /// Telemetry receiver port
    port: u16,

    /// Capture CSV written by imu_relay
    capture: PathBuf,

    /// Longest sleep between deadline checks, in milliseconds
    #[arg(long, default_value = "6")]
    granularity_ms: u64,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let sink = OscUdpSink::connect(&args.host, args.port)
        .with_context(|| format!("cannot reach {}:{}", args.host, args.port))?;

    let shutdown = Shutdown::new();
    shutdown.install_ctrl_c_handler();

    let mut engine =
        PlaybackEngine::new(sink).with_granularity(Duration::from_millis(args.granularity_ms));
    let outcome = engine.replay(&args.capture, &shutdown).await;
    report(&args.capture, outcome);
    Ok(())
}

/// Log how playback ended. A bad capture is reported, not escalated.
fn report(capture: &Path, outcome: Result<PlaybackState, PlaybackError>) -> PlaybackState {
    match outcome {
        Ok(PlaybackState::Aborted) => {
            info!("[REPLAY] Stopped by operator");
            PlaybackState::Aborted
        }
        Ok(state) => state,
        Err(e) => {
            error!("[REPLAY] Nothing played from {}: {}", capture.display(), e);
            PlaybackState::Idle
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use imu_relay_rs::error::CaptureError;

    #[test]
    fn test_bad_capture_is_reported_not_escalated() {
        let missing = Path::new("/nonexistent/imu_relay/none.csv");
        let open_error = PlaybackError::Capture(CaptureError::Open {
            path: missing.to_path_buf(),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        });
        assert_eq!(report(missing, Err(open_error)), PlaybackState::Idle);
        assert_eq!(
            report(missing, Err(PlaybackError::Empty(missing.to_path_buf()))),
            PlaybackState::Idle
        );
        assert_eq!(
            report(missing, Ok(PlaybackState::Finished)),
            PlaybackState::Finished
        );
    }
}
