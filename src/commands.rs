//! Operator commands typed on stdin while acquisition runs.
//!
//! A plain thread does the blocking reads and forwards lines over a channel,
//! so an idle terminal never holds up runtime shutdown. Dispatch happens on
//! the async side.

use std::io::{stdin, BufRead};
use std::str::FromStr;
use std::sync::Arc;

use log::{info, warn};
use tokio::sync::mpsc;

use crate::calibration::Calibrator;
use crate::live_status::StatusReporter;
use crate::sensors::ImuDevice;
use crate::session::SessionStatus;
use crate::shutdown::Shutdown;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    Calibrate,
    Rate,
    Status,
    Quit,
}

impl FromStr for Command {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "c" | "calibrate" => Ok(Command::Calibrate),
            "r" | "rate" => Ok(Command::Rate),
            "s" | "status" => Ok(Command::Status),
            "q" | "quit" => Ok(Command::Quit),
            other => Err(format!("unknown command {:?}", other)),
        }
    }
}

/// Forward stdin lines until EOF or a read error
pub fn spawn_stdin_reader() -> mpsc::UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        for line in stdin().lock().lines() {
            match line {
                Ok(line) => {
                    if tx.send(line).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    warn!("[CMD] stdin read failed: {}", e);
                    break;
                }
            }
        }
    });
    rx
}

pub struct CommandContext<D> {
    pub calibrator: Arc<Calibrator<D>>,
    pub session: Arc<SessionStatus>,
    pub reporter: Arc<StatusReporter>,
    pub shutdown: Shutdown,
}

impl<D: ImuDevice + 'static> CommandContext<D> {
    /// Act on one command. Returns false once the listener should stop.
    pub fn dispatch(&self, command: Command) -> bool {
        match command {
            Command::Calibrate => {
                // Ignored with a log line if one is already running
                let _ = self.calibrator.request();
                true
            }
            Command::Rate => {
                info!("[CMD] Success rate: {}", self.session.success_rate());
                true
            }
            Command::Status => {
                match self.reporter.write() {
                    Ok(path) => info!("[CMD] Status written to {}", path.display()),
                    Err(e) => warn!("[CMD] Could not write status: {}", e),
                }
                true
            }
            Command::Quit => {
                info!("[CMD] Quit requested");
                self.shutdown.trigger();
                false
            }
        }
    }
}

/// Dispatch incoming lines until quit, EOF or shutdown
pub async fn run_commands<D: ImuDevice + 'static>(
    mut lines: mpsc::UnboundedReceiver<String>,
    ctx: CommandContext<D>,
) {
    info!("[CMD] Commands: c=calibrate r=rate s=status q=quit");

    while let Some(line) = lines.recv().await {
        if ctx.shutdown.is_triggered() {
            break;
        }
        if line.trim().is_empty() {
            continue;
        }
        match line.parse::<Command>() {
            Ok(command) => {
                if !ctx.dispatch(command) {
                    break;
                }
            }
            Err(e) => warn!("[CMD] {}", e),
        }
    }
    info!("[CMD] Command listener stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibration::bias_register;
    use crate::config::PortConfig;
    use crate::frame::{Side, SideReading, Vec3};
    use crate::sensor_port::SensorPort;
    use crate::sensors::testing::ScriptedImu;
    use std::time::Duration;

    fn context(dir: &std::path::Path) -> CommandContext<ScriptedImu> {
        let reading = SideReading::new(Vec3::new(0.0, 0.0, 9.8), Vec3::zeros(), Vec3::new(0.2, 0.0, 0.0));
        let ports = Side::BOTH.map(|side| {
            Arc::new(SensorPort::ready(
                PortConfig::for_side(side),
                ScriptedImu::steady(reading),
            ))
        });
        let (writer, reader) = bias_register();
        let session = Arc::new(SessionStatus::new());
        let calibrator = Calibrator::new(
            ports,
            writer,
            session.clone(),
            Duration::from_millis(100),
            Duration::from_millis(5),
        );
        let reporter = StatusReporter::new(
            session.clone(),
            reader,
            [true, true],
            dir.join("capture.csv"),
            dir,
        );
        CommandContext {
            calibrator: Arc::new(calibrator),
            session,
            reporter: Arc::new(reporter),
            shutdown: Shutdown::new(),
        }
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!("c".parse::<Command>(), Ok(Command::Calibrate));
        assert_eq!(" Calibrate\n".parse::<Command>(), Ok(Command::Calibrate));
        assert_eq!("r".parse::<Command>(), Ok(Command::Rate));
        assert_eq!("status".parse::<Command>(), Ok(Command::Status));
        assert_eq!("Q".parse::<Command>(), Ok(Command::Quit));
        assert!("calibrat".parse::<Command>().is_err());
    }

    #[tokio::test]
    async fn test_listener_dispatches_until_quit() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path());
        let calibrator = ctx.calibrator.clone();
        let shutdown = ctx.shutdown.clone();
        let status_path = ctx.reporter.output_path().to_path_buf();

        let (tx, rx) = mpsc::unbounded_channel();
        for line in ["c", "c", "bogus", "", "s", "q", "c"] {
            tx.send(line.to_string()).unwrap();
        }

        run_commands(rx, ctx).await;

        assert!(shutdown.is_triggered());
        assert!(calibrator.is_running());
        assert!(status_path.exists());
    }

    #[tokio::test]
    async fn test_eof_stops_listener_only() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path());
        let shutdown = ctx.shutdown.clone();

        let (tx, rx) = mpsc::unbounded_channel();
        tx.send("r".to_string()).unwrap();
        drop(tx);

        run_commands(rx, ctx).await;
        assert!(!shutdown.is_triggered());
    }
}
