//! Background gyroscope bias estimation.
//!
//! The bias register is a single-writer snapshot built on `tokio::sync::watch`.
//! The calibration task publishes once per run, and the acquisition engine
//! takes a copy at the top of every iteration. Nothing else writes it.

use std::sync::Arc;
use std::time::Duration;

use log::info;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, Instant, MissedTickBehavior};

use crate::frame::{Side, SideReading, Vec3};
use crate::sensor_port::SensorPort;
use crate::sensors::ImuDevice;
use crate::session::SessionStatus;

/// Per-side gyroscope offsets, zero until a calibration completes
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct GyroBias {
    pub left: Vec3,
    pub right: Vec3,
}

impl GyroBias {
    pub fn side(&self, side: Side) -> &Vec3 {
        match side {
            Side::L => &self.left,
            Side::R => &self.right,
        }
    }

    pub fn side_mut(&mut self, side: Side) -> &mut Vec3 {
        match side {
            Side::L => &mut self.left,
            Side::R => &mut self.right,
        }
    }
}

/// Create a bias register starting at zero
pub fn bias_register() -> (BiasWriter, BiasReader) {
    let (tx, rx) = watch::channel(GyroBias::default());
    (BiasWriter { tx }, BiasReader { rx })
}

pub struct BiasWriter {
    tx: watch::Sender<GyroBias>,
}

impl BiasWriter {
    pub fn publish(&self, bias: GyroBias) {
        self.tx.send_replace(bias);
    }

    pub fn current(&self) -> GyroBias {
        *self.tx.borrow()
    }
}

#[derive(Clone)]
pub struct BiasReader {
    rx: watch::Receiver<GyroBias>,
}

impl BiasReader {
    /// Copy out the latest published bias
    pub fn snapshot(&self) -> GyroBias {
        *self.rx.borrow()
    }
}

/// Running gyro sums per side, skipping zero-filled readings
#[derive(Debug, Default)]
pub struct GyroAccumulator {
    sums: [Vec3; 2],
    counts: [usize; 2],
}

impl GyroAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a reading. Returns false if it was the zero-fill sentinel and was ignored.
    pub fn push(&mut self, side: Side, reading: &SideReading) -> bool {
        if reading.is_zero_fill() {
            return false;
        }
        self.sums[side.index()] += reading.gyro;
        self.counts[side.index()] += 1;
        true
    }

    pub fn count(&self, side: Side) -> usize {
        self.counts[side.index()]
    }

    pub fn mean(&self, side: Side) -> Option<Vec3> {
        let n = self.counts[side.index()];
        if n == 0 {
            return None;
        }
        Some(self.sums[side.index()] / n as f64)
    }

    pub fn is_empty(&self) -> bool {
        self.counts.iter().all(|&n| n == 0)
    }

    /// New bias with each side's mean, keeping `prior` for sides with no samples
    pub fn apply_to(&self, prior: GyroBias) -> GyroBias {
        let mut bias = prior;
        for side in Side::BOTH {
            if let Some(mean) = self.mean(side) {
                *bias.side_mut(side) = mean;
            }
        }
        bias
    }
}

/// Clears the calibrating flag however the task ends
struct CalibrationGuard(Arc<SessionStatus>);

impl Drop for CalibrationGuard {
    fn drop(&mut self) {
        self.0.end_calibration();
    }
}

/// Spawns at most one bias-estimation window at a time
pub struct Calibrator<D> {
    ports: [Arc<SensorPort<D>>; 2],
    writer: Arc<BiasWriter>,
    session: Arc<SessionStatus>,
    duration: Duration,
    period: Duration,
}

impl<D: ImuDevice + 'static> Calibrator<D> {
    pub fn new(
        ports: [Arc<SensorPort<D>>; 2],
        writer: BiasWriter,
        session: Arc<SessionStatus>,
        duration: Duration,
        period: Duration,
    ) -> Self {
        Self {
            ports,
            writer: Arc::new(writer),
            session,
            duration,
            period,
        }
    }

    /// Start a calibration run unless one is already in flight.
    ///
    /// A request made while a run is active is dropped, not queued, and does
    /// not extend the active run.
    pub fn request(&self) -> Option<JoinHandle<GyroBias>> {
        if !self.session.try_begin_calibration() {
            info!("[CALIB] Calibration already running, request ignored");
            return None;
        }

        let guard = CalibrationGuard(self.session.clone());
        let ports = self.ports.clone();
        let writer = self.writer.clone();
        let duration = self.duration;
        let period = self.period;

        info!(
            "[CALIB] Calibrating gyro bias for {:.1}s, keep the sensors still",
            duration.as_secs_f64()
        );

        Some(tokio::spawn(async move {
            let _guard = guard;
            let samples = collect_window(&ports, duration, period).await;

            let prior = writer.current();
            if samples.is_empty() {
                info!("[CALIB] No live gyro samples collected, bias left unchanged");
                return prior;
            }

            let bias = samples.apply_to(prior);
            writer.publish(bias);
            info!(
                "[CALIB] Bias updated: L ({:.4}, {:.4}, {:.4}) from {} samples, R ({:.4}, {:.4}, {:.4}) from {} samples",
                bias.left.x,
                bias.left.y,
                bias.left.z,
                samples.count(Side::L),
                bias.right.x,
                bias.right.y,
                bias.right.z,
                samples.count(Side::R)
            );
            bias
        }))
    }

    pub fn is_running(&self) -> bool {
        self.session.is_calibrating()
    }

    pub fn current_bias(&self) -> GyroBias {
        self.writer.current()
    }
}

/// Read both ports at `period` for `duration`, accumulating live gyro samples
async fn collect_window<D: ImuDevice>(
    ports: &[Arc<SensorPort<D>>; 2],
    duration: Duration,
    period: Duration,
) -> GyroAccumulator {
    let mut samples = GyroAccumulator::new();
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let start = Instant::now();

    while start.elapsed() < duration {
        ticker.tick().await;
        for port in ports {
            let reading = port.read();
            samples.push(port.side(), &reading);
        }
    }
    samples
}
