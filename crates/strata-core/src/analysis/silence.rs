//! Silence mapping
//!
//! Finds stretches of a region where every channel stays below a threshold,
//! for strip-silence style editing. One streaming pass with a hysteresis
//! state machine; nothing here is realtime-safe.

use std::ops::Range;

use crate::region::AudioRegion;
use crate::types::{Sample, ANALYSIS_BLOCK_FRAMES};

use super::Progress;

impl AudioRegion {
    /// Intervals (region-relative frames) where the per-frame peak across
    /// all channels stays strictly below `threshold` for at least
    /// `min_length` frames.
    ///
    /// Streams the region's raw audio in blocks, polling
    /// `progress.cancelled()` before each; cancellation abandons the scan
    /// and returns an empty list. A frame exactly at `threshold` counts as
    /// loud. An interval still open at the end of the region is closed
    /// there.
    pub fn find_silence(
        &self,
        threshold: Sample,
        min_length: u64,
        progress: &dyn Progress,
    ) -> Vec<Range<u64>> {
        let frames = self.length();
        let n_channels = self.sources().len();
        let block_len = ANALYSIS_BLOCK_FRAMES.min(frames as usize);
        let mut block = vec![0.0; block_len];
        let mut peak = vec![0.0 as Sample; block_len];

        let mut intervals: Vec<Range<u64>> = Vec::new();
        let mut silence_start: Option<u64> = None;
        let mut pos: u64 = 0;

        while pos < frames {
            if progress.cancelled() {
                log::debug!(
                    "region {}: silence scan cancelled at {}/{} frames",
                    self.name(),
                    pos,
                    frames
                );
                return Vec::new();
            }
            let this_time = block_len.min((frames - pos) as usize);

            peak[..this_time].fill(0.0);
            for channel in 0..n_channels {
                let got = self.read_raw(&mut block[..this_time], pos, channel);
                if got != this_time {
                    log::warn!(
                        "region {}: silence scan short read on channel {} at frame {}",
                        self.name(),
                        channel,
                        pos
                    );
                    return intervals;
                }
                for (p, &s) in peak[..this_time].iter_mut().zip(&block[..this_time]) {
                    *p = p.max(s.abs());
                }
            }

            for (i, &p) in peak[..this_time].iter().enumerate() {
                let frame = pos + i as u64;
                match silence_start {
                    None if p < threshold => silence_start = Some(frame),
                    Some(started) if p >= threshold => {
                        if frame - started >= min_length {
                            intervals.push(started..frame);
                        }
                        silence_start = None;
                    }
                    _ => {}
                }
            }

            pos += this_time as u64;
            progress.set_progress(pos as f32 / frames as f32);
        }

        if let Some(started) = silence_start {
            if frames - started >= min_length {
                intervals.push(started..frames);
            }
        }

        log::debug!(
            "region {}: {} silent interval(s) below {}",
            self.name(),
            intervals.len(),
            threshold
        );
        intervals
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::analysis::TaskProgress;
    use crate::config::EngineConfig;
    use crate::source::{channels_of, MemorySource, Source};

    fn region_of(channels: Vec<Vec<Sample>>, position: u64) -> AudioRegion {
        let src: Arc<dyn Source> =
            Arc::new(MemorySource::from_channels("src", channels, 48000));
        AudioRegion::from_source("r", src, position, &EngineConfig::default())
    }

    fn pattern(pieces: &[(usize, Sample)]) -> Vec<Sample> {
        let mut out = Vec::new();
        for &(count, value) in pieces {
            out.extend(std::iter::repeat(value).take(count));
        }
        out
    }

    #[test]
    fn test_leading_silence_then_loud() {
        let r = region_of(vec![pattern(&[(2000, 0.0), (2000, 200.0)])], 0);
        let v = r.find_silence(100.0, 1000, &TaskProgress::new());
        assert_eq!(v, vec![0..2000]);
    }

    #[test]
    fn test_all_loud_is_empty() {
        let r = region_of(vec![pattern(&[(4000, 200.0)])], 0);
        let v = r.find_silence(100.0, 1000, &TaskProgress::new());
        assert!(v.is_empty());
    }

    #[test]
    fn test_threshold_is_strict() {
        // Frames exactly at the threshold are loud
        let r = region_of(vec![pattern(&[(4000, 100.0)])], 0);
        let v = r.find_silence(100.0, 1000, &TaskProgress::new());
        assert!(v.is_empty());
    }

    #[test]
    fn test_trailing_silence_closes_at_end() {
        let r = region_of(vec![pattern(&[(1000, 200.0), (3000, 0.0)])], 0);
        let v = r.find_silence(100.0, 1000, &TaskProgress::new());
        assert_eq!(v, vec![1000..4000]);
    }

    #[test]
    fn test_short_gap_not_reported() {
        let r = region_of(
            vec![pattern(&[(2000, 200.0), (500, 0.0), (1500, 200.0)])],
            0,
        );
        let v = r.find_silence(100.0, 1000, &TaskProgress::new());
        assert!(v.is_empty());
    }

    #[test]
    fn test_multiple_intervals() {
        let r = region_of(
            vec![pattern(&[(1500, 0.0), (500, 200.0), (2000, 0.0)])],
            0,
        );
        let v = r.find_silence(100.0, 1000, &TaskProgress::new());
        assert_eq!(v, vec![0..1500, 2000..4000]);
    }

    #[test]
    fn test_intervals_are_region_relative() {
        // Loud head lies before the region's window; position must not
        // shift the reported frames
        let src: Arc<dyn Source> = Arc::new(MemorySource::from_channels(
            "src",
            vec![pattern(&[(2500, 200.0), (2500, 0.0)])],
            48000,
        ));
        let r = AudioRegion::new(
            "r",
            channels_of(&src),
            7777,
            2000,
            3000,
            &EngineConfig::default(),
        );
        let v = r.find_silence(100.0, 1000, &TaskProgress::new());
        assert_eq!(v, vec![500..3000]);
    }

    #[test]
    fn test_any_loud_channel_breaks_silence() {
        let quiet = pattern(&[(4000, 0.0)]);
        let right = pattern(&[(1000, 200.0), (3000, 0.0)]);
        let r = region_of(vec![quiet, right], 0);
        let v = r.find_silence(100.0, 1000, &TaskProgress::new());
        assert_eq!(v, vec![1000..4000]);
    }

    #[test]
    fn test_silence_spans_block_boundary() {
        // 70k frames crosses the 64 Ki-frame block size with the interval
        // still open
        let r = region_of(vec![pattern(&[(70_000, 0.0), (30_000, 200.0)])], 0);
        let v = r.find_silence(100.0, 1000, &TaskProgress::new());
        assert_eq!(v, vec![0..70_000]);
    }

    #[test]
    fn test_cancelled_scan_returns_empty() {
        let r = region_of(vec![pattern(&[(4000, 0.0)])], 0);
        let progress = TaskProgress::new();
        progress.cancel();
        assert!(r.find_silence(100.0, 1000, &progress).is_empty());
    }
}
