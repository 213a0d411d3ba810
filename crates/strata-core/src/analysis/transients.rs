//! Transient positions for a region
//!
//! A region answers "where are the onsets?" three ways, in order of
//! preference: a cached answer from a previous call, the backing sources'
//! own analysis results windowed to the region, or a fresh detector run
//! across every channel. Results are timeline positions, deduplicated so
//! that no two survive closer than a minimum gap.

use rayon::prelude::*;

use crate::region::AudioRegion;
use crate::types::SAMPLE_RATE;

use super::{AnalysisError, OnsetDetector};

/// Minimum spacing between reported transients, in milliseconds. Detectors
/// tend to fire several times across one drum hit; anything closer than
/// this is one event.
pub const TRANSIENT_GAP_MS: f32 = 20.0;

impl AudioRegion {
    /// Transient positions within this region, as timeline frames.
    ///
    /// Serves the cached list unless `force_new` is set. Without a cache,
    /// sources that have already been analysed contribute their stored
    /// transients windowed to the region; otherwise `detector` runs over
    /// every channel in parallel. `seeds` are caller-supplied positions
    /// (timeline frames) merged in before cleanup, so a manually placed
    /// marker suppresses detector hits in its neighborhood.
    ///
    /// The result is cached until the next edit that moves or reshapes the
    /// region's audio.
    pub fn transients(
        &mut self,
        detector: &dyn OnsetDetector,
        seeds: &[u64],
        force_new: bool,
    ) -> Result<Vec<u64>, AnalysisError> {
        if !force_new {
            if let Some(cached) = &self.transient_cache {
                return Ok(cached.clone());
            }
        }

        let start = self.start();
        let len = self.length();
        let position = self.position();

        let all_analysed = !self.sources().is_empty()
            && self.sources().iter().all(|sc| sc.source().has_been_analysed());

        let mut merged: Vec<u64> = if all_analysed {
            self.sources()
                .iter()
                .flat_map(|sc| {
                    sc.source()
                        .cached_transients()
                        .into_iter()
                        .filter(|&x| x >= start && x < start + len)
                        .map(|x| x - start + position)
                })
                .collect()
        } else {
            let per_channel: Result<Vec<Vec<u64>>, AnalysisError> = self
                .sources()
                .par_iter()
                .map(|sc| detector.detect(sc.source().as_ref(), sc.channel(), start, len))
                .collect();
            per_channel?
                .into_iter()
                .flatten()
                .map(|x| x + position)
                .collect()
        };

        merged.extend_from_slice(seeds);

        let sample_rate = self
            .sources()
            .first()
            .map(|sc| sc.source().sample_rate())
            .unwrap_or(SAMPLE_RATE);
        cleanup_transients(&mut merged, sample_rate, TRANSIENT_GAP_MS);

        log::debug!(
            "region {}: {} transients after cleanup",
            self.name(),
            merged.len()
        );
        self.transient_cache = Some(merged.clone());
        Ok(merged)
    }
}

/// Collapse bursts of near-coincident transients.
///
/// Sorts ascending, keeps the first point of each burst, and drops every
/// following point closer than `gap = floor(gap_ms * sample_rate / 1000)`
/// frames to the last kept one. Surviving points are pairwise at least
/// `gap` apart and form an order-preserving subsequence of the input.
pub fn cleanup_transients(transients: &mut Vec<u64>, sample_rate: u32, gap_ms: f32) {
    if transients.is_empty() {
        return;
    }
    transients.sort_unstable();
    let gap = (gap_ms * sample_rate as f32 / 1000.0).floor() as u64;

    let mut kept = 0;
    for i in 1..transients.len() {
        if transients[i] - transients[kept] >= gap {
            kept += 1;
            transients[kept] = transients[i];
        }
    }
    transients.truncate(kept + 1);
}
