//! Replays a recorded capture over telemetry with its recorded spacing.
//!
//! Every frame's deadline is measured from one fixed origin (the first
//! record's timestamp mapped to the start of playback). Waiting happens in
//! short steps so cancellation is noticed within one granularity unit, and
//! time spent emitting a frame never pushes later deadlines back.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use log::{error, info, warn};
use tokio::task::yield_now;
use tokio::time::{sleep, Instant};

use crate::capture::load_capture;
use crate::error::PlaybackError;
use crate::frame::{Frame, Side};
use crate::shutdown::Shutdown;
use crate::telemetry::{TelemetrySink, TerminalStatus};

pub const DEFAULT_GRANULARITY: Duration = Duration::from_millis(6);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlaybackState {
    Idle,
    Playing,
    Finished,
    Aborted,
}

pub struct PlaybackEngine<S: TelemetrySink> {
    sink: Arc<S>,
    granularity: Duration,
    state: PlaybackState,
}

impl<S: TelemetrySink> PlaybackEngine<S> {
    pub fn new(sink: S) -> Self {
        Self {
            sink: Arc::new(sink),
            granularity: DEFAULT_GRANULARITY,
            state: PlaybackState::Idle,
        }
    }

    /// Longest single sleep while waiting for a deadline
    pub fn with_granularity(mut self, granularity: Duration) -> Self {
        self.granularity = granularity.max(Duration::from_millis(1));
        self
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Play `path` once, start to finish or until `shutdown` fires.
    ///
    /// Returns `Finished` or `Aborted`. A capture that cannot be read or has
    /// no data record is an error; in that case the only message sent is
    /// the terminal `playStatus=0`.
    pub async fn replay(
        &mut self,
        path: impl AsRef<Path>,
        shutdown: &Shutdown,
    ) -> Result<PlaybackState, PlaybackError> {
        let path = path.as_ref();
        if self.state != PlaybackState::Idle {
            warn!("[REPLAY] Engine already used ({:?}), not replaying", self.state);
            return Ok(self.state);
        }

        let _terminal = TerminalStatus::arm(self.sink.clone());

        let frames = load_capture(path).map_err(|e| {
            error!("[REPLAY] Cannot read capture {}: {}", path.display(), e);
            PlaybackError::from(e)
        })?;
        let Some(first) = frames.first() else {
            error!("[REPLAY] Capture {} has no data records", path.display());
            return Err(PlaybackError::Empty(path.to_path_buf()));
        };

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let origin = first.timestamp_ms;
        let span_ms = frames.last().map_or(0.0, |f| f.timestamp_ms - origin);

        info!(
            "[REPLAY] Playing {} ({} frames, {:.1}s)",
            name,
            frames.len(),
            span_ms / 1000.0
        );

        self.state = PlaybackState::Playing;
        let start = Instant::now();

        for (index, frame) in frames.iter().enumerate() {
            let deadline = offset_from_origin(frame.timestamp_ms, origin);
            if !self.wait_until(start, deadline, shutdown).await {
                self.state = PlaybackState::Aborted;
                info!(
                    "[REPLAY] Interrupted at frame {}/{}",
                    index + 1,
                    frames.len()
                );
                return Ok(self.state);
            }
            self.emit(frame, &name);
        }

        self.state = PlaybackState::Finished;
        info!(
            "[REPLAY] Finished {} in {:.2}s",
            name,
            start.elapsed().as_secs_f64()
        );
        Ok(self.state)
    }

    /// Sleep in granularity-sized steps until `deadline` past `start`.
    /// False if shutdown fired first.
    ///
    /// Always suspends at least once, so a replay running behind schedule
    /// still lets the signal task on a current-thread runtime run.
    async fn wait_until(&self, start: Instant, deadline: Duration, shutdown: &Shutdown) -> bool {
        loop {
            if shutdown.is_triggered() {
                return false;
            }
            let elapsed = start.elapsed();
            if elapsed >= deadline {
                yield_now().await;
                return !shutdown.is_triggered();
            }
            sleep((deadline - elapsed).min(self.granularity)).await;
        }
    }

    fn emit(&self, frame: &Frame, name: &str) {
        for side in Side::BOTH {
            self.sink.send_side(side, frame.side(side));
        }
        self.sink.send_filename(name);
        self.sink.send_timestamp(frame.timestamp_ms);
        self.sink.send_play_status(true);
    }
}

/// Deadline of a record relative to playback start. Records before the
/// origin, or with a non-finite timestamp, are due immediately.
fn offset_from_origin(timestamp_ms: f64, origin_ms: f64) -> Duration {
    Duration::try_from_secs_f64((timestamp_ms - origin_ms) / 1000.0).unwrap_or(Duration::ZERO)
}
