//! Live acquisition loop.
//!
//! Each iteration reads both ports, removes the current gyro bias, stamps the
//! frame with monotonic elapsed time, emits it and then appends it to the
//! capture. Telemetry always goes out before the record is written.

use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, info};
use tokio::time::{sleep, Instant};

use crate::calibration::BiasReader;
use crate::capture::CaptureWriter;
use crate::error::CaptureError;
use crate::frame::{Frame, Side, SideReading};
use crate::sensor_port::SensorPort;
use crate::sensors::ImuDevice;
use crate::session::SessionStatus;
use crate::shutdown::Shutdown;
use crate::telemetry::{
    connection_address, TelemetrySink, TerminalStatus, ADDR_CALIBRATING,
};

const PROGRESS_EVERY: u64 = 1000;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EngineState {
    Running,
    ShuttingDown,
}

pub struct AcquisitionEngine<D, S: TelemetrySink> {
    ports: [Arc<SensorPort<D>>; 2],
    sink: Arc<S>,
    capture: CaptureWriter,
    bias: BiasReader,
    session: Arc<SessionStatus>,
    period: Duration,
    started: Instant,
    state: EngineState,
    frames: u64,
}

impl<D: ImuDevice, S: TelemetrySink> AcquisitionEngine<D, S> {
    pub fn new(
        ports: [Arc<SensorPort<D>>; 2],
        sink: S,
        capture: CaptureWriter,
        bias: BiasReader,
        session: Arc<SessionStatus>,
        period: Duration,
    ) -> Self {
        Self {
            ports,
            sink: Arc::new(sink),
            capture,
            bias,
            session,
            period,
            started: Instant::now(),
            state: EngineState::Running,
            frames: 0,
        }
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn capture(&self) -> &CaptureWriter {
        &self.capture
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Run one iteration without the trailing sleep.
    ///
    /// A capture write failure is the only error; it is logged here and handed
    /// back so the caller can stop the loop.
    pub fn step(&mut self) -> Result<Frame, CaptureError> {
        let bias = self.bias.snapshot();
        let raw = [self.ports[0].read(), self.ports[1].read()];

        let live = raw.iter().filter(|r| !r.is_zero_fill()).count() as u64;
        self.session.record_reads(raw.len() as u64, live);

        // Zero-fill stays zero so a missing side never looks like motion
        let [left, right] = Side::BOTH.map(|side| {
            let reading = raw[side.index()];
            if reading.is_zero_fill() {
                SideReading::zero_fill()
            } else {
                reading.with_gyro_bias_removed(bias.side(side))
            }
        });

        let timestamp_ms = self.started.elapsed().as_secs_f64() * 1000.0;
        let frame = Frame::new(timestamp_ms, left, right);

        self.emit(&frame);

        if let Err(e) = self.capture.append(&frame) {
            error!(
                "[CAPTURE] Write to {} failed: {}",
                self.capture.path().display(),
                e
            );
            return Err(e);
        }

        self.frames += 1;
        if self.frames % PROGRESS_EVERY == 0 {
            debug!(
                "[ACQ] {} frames, {}",
                self.frames,
                self.session.success_rate()
            );
        }
        Ok(frame)
    }

    fn emit(&self, frame: &Frame) {
        for side in Side::BOTH {
            self.sink.send_side(side, frame.side(side));
        }
        for port in &self.ports {
            self.sink
                .send_flag(&connection_address(port.side()), port.is_ready());
        }
        self.sink
            .send_flag(ADDR_CALIBRATING, self.session.is_calibrating());
        self.sink.send_timestamp(frame.timestamp_ms);
        self.sink.send_play_status(true);
    }

    /// Poll until `shutdown` fires or the capture can no longer be written.
    ///
    /// `playStatus=0` is sent exactly once when this returns or is dropped.
    /// The engine cannot be restarted afterwards.
    pub async fn run(&mut self, shutdown: &Shutdown) -> Result<u64, CaptureError> {
        if self.state == EngineState::ShuttingDown {
            return Ok(self.frames);
        }

        info!(
            "[ACQ] Streaming at {} ms period (L {}, R {})",
            self.period.as_millis(),
            port_label(&self.ports[0]),
            port_label(&self.ports[1])
        );

        let _terminal = TerminalStatus::arm(self.sink.clone());
        let result = self.poll(shutdown).await;
        self.state = EngineState::ShuttingDown;

        info!(
            "[ACQ] Stopped after {} frames, {}",
            self.frames,
            self.session.success_rate()
        );
        result.map(|_| self.frames)
    }

    async fn poll(&mut self, shutdown: &Shutdown) -> Result<(), CaptureError> {
        while !shutdown.is_triggered() {
            let iteration = Instant::now();
            self.step()?;

            let remaining = self.period.saturating_sub(iteration.elapsed());
            if !remaining.is_zero() {
                sleep(remaining).await;
            }
        }
        Ok(())
    }
}

fn port_label<D: ImuDevice>(port: &SensorPort<D>) -> &'static str {
    if port.is_ready() {
        "ready"
    } else {
        "absent"
    }
}
