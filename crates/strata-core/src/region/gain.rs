//! Peak scanning and normalization
//!
//! Non-realtime gain work: finding a region's peak amplitude by streaming
//! its covered source frames, and deriving the scalar amplitude that lands
//! the peak on a target level. Both run on background threads; the scan is
//! cancellable between blocks.

use crate::analysis::Progress;
use crate::types::{db_to_linear, Sample, ANALYSIS_BLOCK_FRAMES};

use super::AudioRegion;

impl AudioRegion {
    /// Peak absolute amplitude across the whole region, all channels.
    ///
    /// Streams the covered source frames block by block, polling
    /// `progress.cancelled()` before each block and reporting the scanned
    /// fraction after it. Returns `None` on cancellation. A short source
    /// read logs and yields `Some(0.0)`, which downstream
    /// [`normalize`](Self::normalize) treats as "nothing to do".
    pub fn maximum_amplitude(&self, progress: &dyn Progress) -> Option<Sample> {
        let frames = self.length;
        let n_channels = self.sources.len();
        let mut block = vec![0.0; ANALYSIS_BLOCK_FRAMES.min(frames as usize)];
        let mut maxamp: Sample = 0.0;
        let mut pos: u64 = 0;

        while pos < frames {
            if progress.cancelled() {
                log::debug!(
                    "region {}: peak scan cancelled at {}/{} frames",
                    self.name,
                    pos,
                    frames
                );
                return None;
            }
            let this_time = block.len().min((frames - pos) as usize);
            for channel in 0..n_channels {
                let got = self.read_raw(&mut block[..this_time], pos, channel);
                if got != this_time {
                    log::warn!(
                        "region {}: peak scan short read on channel {} at frame {}",
                        self.name,
                        channel,
                        pos
                    );
                    return Some(0.0);
                }
                for &s in &block[..this_time] {
                    maxamp = maxamp.max(s.abs());
                }
            }
            pos += this_time as u64;
            progress.set_progress(pos as f32 / frames as f32);
        }

        Some(maxamp)
    }

    /// Set the scalar amplitude so a peak of `max_amplitude` lands on
    /// `target_db`.
    ///
    /// `max_amplitude` comes from a prior
    /// [`maximum_amplitude`](Self::maximum_amplitude) scan; splitting the
    /// two lets callers scan once and try several targets. No-op when the
    /// peak is zero (silent region or failed scan) or already on target. A
    /// unity target is nudged just below 1.0 so normalized material never
    /// sits exactly at full scale.
    pub fn normalize(&mut self, max_amplitude: Sample, target_db: f32) {
        let mut target = db_to_linear(target_db);

        if target == 1.0 {
            target -= f32::EPSILON;
        }

        if max_amplitude == 0.0 {
            log::debug!("region {}: normalize skipped, peak is zero", self.name);
            return;
        }

        if max_amplitude == target {
            return;
        }

        self.set_scale_amplitude(target / max_amplitude);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::analysis::TaskProgress;
    use crate::config::EngineConfig;
    use crate::source::{channels_of, MemorySource, Source};

    use super::super::AudioRegion;

    fn region_over(channels: Vec<Vec<f32>>, start: u64, length: u64) -> AudioRegion {
        let src: Arc<dyn Source> =
            Arc::new(MemorySource::from_channels("src", channels, 48000));
        AudioRegion::new(
            "r",
            channels_of(&src),
            0,
            start,
            length,
            &EngineConfig::default(),
        )
    }

    #[test]
    fn test_maximum_amplitude_tracks_abs_peak() {
        let r = region_over(vec![vec![0.1, -0.9, 0.4, 0.0]], 0, 4);
        let progress = TaskProgress::new();
        assert_eq!(r.maximum_amplitude(&progress), Some(0.9));
        assert_eq!(progress.fraction(), 1.0);
    }

    #[test]
    fn test_maximum_amplitude_spans_channels() {
        let r = region_over(vec![vec![0.5, 0.1], vec![-0.7, 0.2]], 0, 2);
        let progress = TaskProgress::new();
        assert_eq!(r.maximum_amplitude(&progress), Some(0.7));
    }

    #[test]
    fn test_maximum_amplitude_respects_window() {
        // Peak of 1.0 sits before the region's window into the source
        let r = region_over(vec![vec![1.0, 0.2, 0.3, 0.2]], 1, 3);
        let progress = TaskProgress::new();
        let max = r.maximum_amplitude(&progress).unwrap();
        assert!((max - 0.3).abs() < 1e-6);
    }

    #[test]
    fn test_maximum_amplitude_cancelled() {
        let r = region_over(vec![vec![0.5; 100]], 0, 100);
        let progress = TaskProgress::new();
        progress.cancel();
        assert_eq!(r.maximum_amplitude(&progress), None);
    }

    #[test]
    fn test_maximum_amplitude_short_read_yields_zero() {
        // Region longer than its source: the scan cannot complete
        let r = region_over(vec![vec![0.5; 10]], 0, 50);
        let progress = TaskProgress::new();
        assert_eq!(r.maximum_amplitude(&progress), Some(0.0));
    }

    #[test]
    fn test_normalize_to_unity_stays_below_full_scale() {
        let mut r = region_over(vec![vec![0.5; 8]], 0, 8);
        r.normalize(0.5, 0.0);
        let scale = r.scale_amplitude();
        assert!((scale - 2.0).abs() < 1e-5);
        assert!(0.5 * scale < 1.0, "normalized peak must sit below 1.0");
    }

    #[test]
    fn test_normalize_to_minus_six_db() {
        let mut r = region_over(vec![vec![0.25; 8]], 0, 8);
        r.normalize(0.25, -6.0);
        let expected = crate::types::db_to_linear(-6.0) / 0.25;
        assert!((r.scale_amplitude() - expected).abs() < 1e-6);
    }

    #[test]
    fn test_normalize_noop_on_silence() {
        let mut r = region_over(vec![vec![0.0; 8]], 0, 8);
        r.normalize(0.0, 0.0);
        assert_eq!(r.scale_amplitude(), 1.0);
    }

    #[test]
    fn test_normalize_noop_when_on_target() {
        let mut r = region_over(vec![vec![0.5; 8]], 0, 8);
        let target = crate::types::db_to_linear(-6.0);
        r.normalize(target, -6.0);
        assert_eq!(r.scale_amplitude(), 1.0);
    }

    #[test]
    fn test_scan_then_normalize_round_trip() {
        let mut r = region_over(vec![vec![0.2, -0.4, 0.1]], 0, 3);
        let progress = TaskProgress::new();
        let max = r.maximum_amplitude(&progress).unwrap();
        r.normalize(max, 0.0);
        // Raw peak times the new scale lands just under full scale
        let peak = 0.4 * r.scale_amplitude();
        assert!(peak <= 1.0 && peak > 0.999);
    }
}
