use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Local;
use clap::Parser;
use log::{error, info};

use imu_relay_rs::calibration::{bias_register, Calibrator};
use imu_relay_rs::capture::CaptureWriter;
use imu_relay_rs::commands::{run_commands, spawn_stdin_reader, CommandContext};
use imu_relay_rs::config::{select_port, AcquisitionConfig, PortConfig, DEFAULT_PORTS};
use imu_relay_rs::error::DriverError;
use imu_relay_rs::frame::{Side, Vec3};
use imu_relay_rs::live_status::StatusReporter;
use imu_relay_rs::sensor_port::SensorPort;
use imu_relay_rs::sensors::{ImuDevice, SimulatedImu};
use imu_relay_rs::session::SessionStatus;
use imu_relay_rs::shutdown::Shutdown;
use imu_relay_rs::telemetry::OscUdpSink;
use imu_relay_rs::AcquisitionEngine;

type Device = Box<dyn ImuDevice>;

#[derive(Parser, Debug)]
#[command(name = "imu_relay")]
#[command(about = "Stream dual LSM9DS1 readings over OSC and record them to CSV", long_about = None)]
struct Args {
    /// Telemetry receiver host
    #[arg(long, default_value = "192.168.10.112")]
    host: String,

    /// Destination port per node id, comma separated
    #[arg(long, value_delimiter = ',', default_values_t = DEFAULT_PORTS)]
    ports: Vec<u16>,

    /// File holding this node's id (index into --ports)
    #[arg(long, default_value = "node_id.txt")]
    node_id_file: PathBuf,

    /// Output directory for captures and live status
    #[arg(long, default_value = "imu_captures")]
    output_dir: PathBuf,

    /// Loop period in milliseconds
    #[arg(long, default_value = "10")]
    period_ms: u64,

    /// Sensor init attempts per side (1-10)
    #[arg(long, default_value = "3")]
    max_retries: u32,

    /// Delay between init attempts in milliseconds
    #[arg(long, default_value = "1000")]
    retry_backoff_ms: u64,

    /// Gyro calibration window in seconds
    #[arg(long, default_value = "5")]
    calibration_secs: u64,

    /// I2C bus device
    #[arg(long, default_value = "/dev/i2c-1")]
    i2c_bus: String,

    /// Use simulated sensors instead of I2C hardware
    #[arg(long)]
    simulate: bool,

    /// Duration in seconds (0 = until interrupted)
    #[arg(long, default_value = "0")]
    duration: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let acquisition = AcquisitionConfig {
        period: Duration::from_millis(args.period_ms.max(1)),
        calibration_duration: Duration::from_secs(args.calibration_secs),
    };

    let port = select_port(&args.ports, &args.node_id_file);
    let sink = OscUdpSink::connect(&args.host, port)
        .with_context(|| format!("cannot reach {}:{}", args.host, port))?;

    fs::create_dir_all(&args.output_dir)
        .with_context(|| format!("cannot create {}", args.output_dir.display()))?;
    let capture_path = args.output_dir.join(format!("imu_{}.csv", ts_now_clean()));
    let capture = CaptureWriter::create(&capture_path)?;

    let ports = open_ports(&args).await?;
    let connected = [ports[0].is_ready(), ports[1].is_ready()];

    let (bias_writer, bias_reader) = bias_register();
    let session = Arc::new(SessionStatus::new());
    let calibrator = Arc::new(Calibrator::new(
        ports.clone(),
        bias_writer,
        session.clone(),
        acquisition.calibration_duration,
        acquisition.period,
    ));
    let reporter = Arc::new(StatusReporter::new(
        session.clone(),
        bias_reader.clone(),
        connected,
        capture_path.clone(),
        &args.output_dir,
    ));

    let shutdown = Shutdown::new();
    shutdown.install_ctrl_c_handler();

    if args.duration > 0 {
        let timer = shutdown.clone();
        let limit = Duration::from_secs(args.duration);
        tokio::spawn(async move {
            tokio::time::sleep(limit).await;
            info!("[ACQ] Duration of {}s reached", limit.as_secs());
            timer.trigger();
        });
    }

    tokio::spawn(run_commands(
        spawn_stdin_reader(),
        CommandContext {
            calibrator,
            session: session.clone(),
            reporter: reporter.clone(),
            shutdown: shutdown.clone(),
        },
    ));

    let mut engine = AcquisitionEngine::new(
        ports,
        sink,
        capture,
        bias_reader,
        session,
        acquisition.period,
    );
    let outcome = engine.run(&shutdown).await;

    match reporter.write() {
        Ok(path) => info!("[ACQ] Final status written to {}", path.display()),
        Err(e) => error!("[ACQ] Could not write final status: {}", e),
    }
    info!(
        "[CAPTURE] {} records in {}",
        engine.capture().records(),
        capture_path.display()
    );

    outcome?;
    Ok(())
}

/// Bring up both sides concurrently; each may end up absent
async fn open_ports(args: &Args) -> Result<[Arc<SensorPort<Device>>; 2]> {
    let configs = Side::BOTH.map(|side| {
        PortConfig::for_side(side)
            .with_retries(args.max_retries)
            .with_backoff(Duration::from_millis(args.retry_backoff_ms))
    });

    let [left, right] = configs.map(|config| {
        let simulate = args.simulate;
        let bus = args.i2c_bus.clone();
        tokio::task::spawn_blocking(move || {
            SensorPort::initialize(config, |config| {
                if simulate {
                    Ok(simulated_device(config))
                } else {
                    open_hardware(&bus, config)
                }
            })
        })
    });

    Ok([Arc::new(left.await?), Arc::new(right.await?)])
}

fn simulated_device(config: &PortConfig) -> Device {
    let (phase, offset) = match config.side {
        Side::L => (0.0, Vec3::new(0.8, -0.4, 0.2)),
        Side::R => (0.25, Vec3::new(-0.3, 0.6, -0.1)),
    };
    Box::new(SimulatedImu::new(phase, offset))
}

#[cfg(target_os = "linux")]
fn open_hardware(bus: &str, config: &PortConfig) -> Result<Device, DriverError> {
    let imu = imu_relay_rs::sensors::lsm9ds1::open_linux(
        bus,
        config.xg_address,
        config.mag_address,
        config.ranges,
    )?;
    Ok(Box::new(imu))
}

#[cfg(not(target_os = "linux"))]
fn open_hardware(bus: &str, _config: &PortConfig) -> Result<Device, DriverError> {
    Err(DriverError::Unavailable(format!(
        "{}: I2C needs Linux, run with --simulate",
        bus
    )))
}

fn ts_now_clean() -> String {
    Local::now().format("%Y%m%d_%H%M%S").to_string()
}
