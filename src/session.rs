use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Acquisition session state shared with the calibration task and status reporters.
///
/// The acquisition engine is the only writer of the counters. The
/// `calibrating` flag is flipped by the calibration task through
/// [`SessionStatus::try_begin_calibration`] and [`SessionStatus::end_calibration`].
#[derive(Debug, Default)]
pub struct SessionStatus {
    total_attempts: AtomicU64,
    successful_reads: AtomicU64,
    calibrating: AtomicBool,
}

/// Read success-rate snapshot
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SuccessRate {
    pub total_attempts: u64,
    pub successful_reads: u64,
}

impl SuccessRate {
    /// Fraction of successful reads, 0.0 before any attempt
    pub fn ratio(&self) -> f64 {
        if self.total_attempts == 0 {
            return 0.0;
        }
        self.successful_reads as f64 / self.total_attempts as f64
    }
}

impl std::fmt::Display for SuccessRate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}/{} reads ok ({:.1}%)",
            self.successful_reads,
            self.total_attempts,
            self.ratio() * 100.0
        )
    }
}

impl SessionStatus {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_reads(&self, attempts: u64, successes: u64) {
        self.total_attempts.fetch_add(attempts, Ordering::Relaxed);
        self.successful_reads.fetch_add(successes, Ordering::Relaxed);
    }

    pub fn success_rate(&self) -> SuccessRate {
        SuccessRate {
            total_attempts: self.total_attempts.load(Ordering::Relaxed),
            successful_reads: self.successful_reads.load(Ordering::Relaxed),
        }
    }

    pub fn is_calibrating(&self) -> bool {
        self.calibrating.load(Ordering::Acquire)
    }

    /// Claim the calibration slot. False if a calibration already runs.
    pub(crate) fn try_begin_calibration(&self) -> bool {
        self.calibrating
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub(crate) fn end_calibration(&self) {
        self.calibrating.store(false, Ordering::Release);
    }
}
