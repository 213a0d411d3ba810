//! Offline audio analysis
//!
//! Background scans over region audio: transient (onset) detection with a
//! per-region cache, and silence mapping. Both stream the region's raw
//! source material block by block off the audio thread, so they observe the
//! recorded samples rather than the faded and enveloped output.
//!
//! ```text
//!   worker thread                         region
//!   -------------                         ------
//!   transients(detector, ..) ---------> read cached / run detector
//!   find_silence(thr, min, progress) --> stream raw blocks, hysteresis
//!   maximum_amplitude(progress)  -----> stream raw blocks, peak
//! ```
//!
//! Everything here is cancellable at block granularity through [`Progress`];
//! the same token also serves the peak scan in [`crate::region`].

mod silence;
mod transients;

pub use transients::{cleanup_transients, TRANSIENT_GAP_MS};

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use thiserror::Error;

use crate::source::Source;

/// Analysis failures surfaced to the caller.
///
/// Scans that can degrade gracefully (short reads, cancellation) do so and
/// never construct one of these; only a detector backend refusing to run is
/// an error the caller has to see.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("transient detection failed: {0}")]
    Detector(String),
}

/// Progress reporting and cancellation for scans that stream a lot of audio.
///
/// Polled from the scanning thread: `set_progress` receives the completed
/// fraction in `0.0..=1.0` after each block, and a `cancelled` result of
/// `true` makes the scan stop before the next block.
pub trait Progress: Send + Sync {
    fn set_progress(&self, fraction: f32);
    fn cancelled(&self) -> bool;
}

/// Shared progress token backing [`Progress`] with atomics.
///
/// Hand one (usually `Arc`-wrapped) to a worker and keep a reference on the
/// control side; `cancel` flips a flag the scan polls between blocks, and
/// `fraction` reads the latest reported progress without locking.
#[derive(Debug, Default)]
pub struct TaskProgress {
    cancelled: AtomicBool,
    /// f32 fraction stored as raw bits so readers never tear
    fraction: AtomicU32,
}

impl TaskProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn fraction(&self) -> f32 {
        f32::from_bits(self.fraction.load(Ordering::Relaxed))
    }
}

impl Progress for TaskProgress {
    fn set_progress(&self, fraction: f32) {
        self.fraction.store(fraction.to_bits(), Ordering::Relaxed);
    }

    fn cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }
}

/// A pluggable onset detector.
///
/// `detect` analyses `len` frames starting `start` frames into one channel
/// of `source` and returns onset positions relative to the analysed window.
/// The region translates them onto the timeline and merges channels.
pub trait OnsetDetector: Send + Sync {
    fn detect(
        &self,
        source: &dyn Source,
        channel: u32,
        start: u64,
        len: u64,
    ) -> Result<Vec<u64>, AnalysisError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_progress_starts_clean() {
        let p = TaskProgress::new();
        assert!(!p.cancelled());
        assert_eq!(p.fraction(), 0.0);
    }

    #[test]
    fn test_task_progress_reports_and_cancels() {
        let p = TaskProgress::new();
        p.set_progress(0.25);
        assert_eq!(p.fraction(), 0.25);
        p.cancel();
        assert!(p.cancelled());
        // Cancellation does not disturb the last reported fraction
        assert_eq!(p.fraction(), 0.25);
    }
}
