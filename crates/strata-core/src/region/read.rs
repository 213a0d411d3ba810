//! The compositing read path
//!
//! Turns a region plus a requested timeline window into output samples:
//! raw source frames, then fade-in and fade-out windows, then the gain
//! envelope folded with the scalar amplitude, honoring mute, opacity, and
//! the channel-mismatch policy. Everything here runs against an immutable
//! [`RegionSnapshot`], so it is safe from the audio callback: no locks, no
//! allocation, work bounded by the requested frame count.
//!
//! Callers supply three equally sized scratch buffers per stream: the
//! output buffer, a mixdown buffer for transparent (additive) regions, and
//! a gain buffer the curves are sampled into. Pre-allocate them once at the
//! maximum callback size.

use std::sync::Arc;

use basedrop::{Shared, SharedCell};

use crate::curve::Curve;
use crate::source::SourceChannel;
use crate::types::Sample;

/// How a read composes the region's gain stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadProfile {
    /// Source frames untouched: no fades, no envelope, no scaling, and the
    /// mute flag is ignored. Editing and analysis use this.
    Raw,
    /// What the listener hears: fades, envelope, scalar amplitude, and
    /// nothing at all when the region is muted.
    Playback,
    /// Raw frames read through the master-source list: the pre-edit
    /// material a crossfade renders against.
    CrossfadeReference,
}

impl ReadProfile {
    /// Raw-like profiles skip every gain stage, ignore mute, and always
    /// overwrite the destination.
    #[inline]
    fn is_raw(self) -> bool {
        !matches!(self, ReadProfile::Playback)
    }

    #[inline]
    fn uses_master_sources(self) -> bool {
        matches!(self, ReadProfile::CrossfadeReference)
    }
}

/// Per-call read statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReadResult {
    /// Frames composed into the caller's buffer.
    pub frames: usize,
    /// Bytes pulled from sources for this call. Zero when the channel was
    /// silence-filled.
    pub bytes_read: u64,
}

impl ReadResult {
    /// Nothing produced: window out of range, region muted, or source
    /// failure. Callers must treat the whole call as having produced no
    /// audio; after a failed source read the touched slice holds
    /// unspecified partial data.
    pub const EMPTY: ReadResult = ReadResult {
        frames: 0,
        bytes_read: 0,
    };
}

/// Immutable copy of a region's read-relevant state.
///
/// Built and published by `AudioRegion` mutators; consumed by
/// [`RegionReader`] on the audio thread. A snapshot taken once stays
/// internally consistent no matter what the control thread does next.
pub struct RegionSnapshot {
    pub(super) name: String,
    pub(super) position: u64,
    pub(super) start: u64,
    pub(super) length: u64,
    pub(super) muted: bool,
    pub(super) opaque: bool,
    pub(super) scale_amplitude: Sample,
    pub(super) envelope_active: bool,
    pub(super) fade_in_active: bool,
    pub(super) fade_out_active: bool,
    pub(super) fade_in: Curve,
    pub(super) fade_out: Curve,
    pub(super) envelope: Curve,
    pub(super) sources: Vec<SourceChannel>,
    pub(super) master_sources: Vec<SourceChannel>,
    pub(super) replicate_missing_channels: bool,
}

impl RegionSnapshot {
    /// Zero-length stand-in published before the first real snapshot; every
    /// read against it comes back empty.
    pub(super) fn placeholder() -> Self {
        Self {
            name: String::new(),
            position: 0,
            start: 0,
            length: 0,
            muted: false,
            opaque: true,
            scale_amplitude: 1.0,
            envelope_active: false,
            fade_in_active: false,
            fade_out_active: false,
            fade_in: Curve::new(),
            fade_out: Curve::new(),
            envelope: Curve::new(),
            sources: Vec::new(),
            master_sources: Vec::new(),
            replicate_missing_channels: false,
        }
    }

    #[inline]
    pub fn position(&self) -> u64 {
        self.position
    }

    #[inline]
    pub fn length(&self) -> u64 {
        self.length
    }

    #[inline]
    pub fn n_channels(&self) -> u32 {
        self.sources.len() as u32
    }

    /// Compose this region's contribution to the timeline window
    /// `[position, position + cnt)` for one channel.
    ///
    /// Only the overlap between the window and the region produces output.
    /// A window starting before the region lands at the matching offset
    /// inside `buf` (`buf_offset = region.position - position`); a window
    /// running past the region's tail is cut short. `buf`, `mixdown`, and
    /// `gain` must each hold at least `cnt` frames.
    ///
    /// Opaque regions and raw-like profiles overwrite their slice of `buf`;
    /// a transparent region under `Playback` composes into `mixdown` and
    /// adds into `buf`. Untouched parts of `buf` are preserved either way.
    ///
    /// Returns [`ReadResult::EMPTY`] when the window misses the region
    /// entirely, when the region is muted under `Playback`, or when any
    /// source read comes up short. In the first two cases `buf` is
    /// untouched; a failed source read may leave partial frames behind,
    /// which the zero frame count tells the caller to disregard.
    #[allow(clippy::too_many_arguments)]
    pub fn read_at(
        &self,
        profile: ReadProfile,
        buf: &mut [Sample],
        mixdown: &mut [Sample],
        gain: &mut [Sample],
        position: u64,
        cnt: usize,
        channel: u32,
    ) -> ReadResult {
        // Clamp the request to the part of the window the region covers
        let (internal_offset, buf_offset, cnt) = if position < self.position {
            let ahead = (self.position - position) as usize;
            if ahead >= cnt {
                return ReadResult::EMPTY;
            }
            (0, ahead, cnt - ahead)
        } else {
            (position - self.position, 0, cnt)
        };

        if internal_offset >= self.length {
            return ReadResult::EMPTY;
        }
        let to_read = cnt.min((self.length - internal_offset) as usize);
        if to_read == 0 {
            return ReadResult::EMPTY;
        }

        if self.muted && !profile.is_raw() {
            return ReadResult::EMPTY;
        }

        debug_assert!(buf.len() >= buf_offset + to_read, "output buffer too small");
        debug_assert!(mixdown.len() >= to_read, "mixdown buffer too small");
        debug_assert!(gain.len() >= to_read, "gain buffer too small");

        let bytes = if self.opaque || profile.is_raw() {
            // Overwrite straight into the caller's buffer
            self.compose(
                profile,
                &mut buf[buf_offset..buf_offset + to_read],
                &mut gain[..to_read],
                internal_offset,
                channel,
            )
        } else {
            // Transparent playback: compose aside, then mix additively
            let bytes = self.compose(
                profile,
                &mut mixdown[..to_read],
                &mut gain[..to_read],
                internal_offset,
                channel,
            );
            if bytes.is_some() {
                for (dst, src) in buf[buf_offset..buf_offset + to_read]
                    .iter_mut()
                    .zip(mixdown[..to_read].iter())
                {
                    *dst += *src;
                }
            }
            bytes
        };

        match bytes {
            Some(bytes_read) => ReadResult {
                frames: to_read,
                bytes_read,
            },
            None => ReadResult::EMPTY,
        }
    }

    /// Fill `dest` with the region's frames at `internal_offset` and run
    /// the gain pipeline over them in place. `None` means a source read
    /// came up short and the caller must report total failure.
    fn compose(
        &self,
        profile: ReadProfile,
        dest: &mut [Sample],
        gain: &mut [Sample],
        internal_offset: u64,
        channel: u32,
    ) -> Option<u64> {
        let to_read = dest.len();
        let sources = if profile.uses_master_sources() {
            &self.master_sources
        } else {
            &self.sources
        };
        let n_channels = sources.len();
        let source_pos = self.start + internal_offset;

        let bytes_read = if (channel as usize) < n_channels {
            self.pull(&sources[channel as usize], dest, source_pos)?
        } else if self.replicate_missing_channels && n_channels > 0 {
            // Wrap around: a mono region plays on every track channel
            self.pull(&sources[channel as usize % n_channels], dest, source_pos)?
        } else {
            dest.fill(0.0);
            0
        };

        if profile.is_raw() {
            return Some(bytes_read);
        }

        // Fade-in: the window's overlap with [0, fade_in_length)
        if self.fade_in_active {
            let fade_in_length = self.fade_in.end();
            if internal_offset < fade_in_length {
                let fade_limit = to_read.min((fade_in_length - internal_offset) as usize);
                self.fade_in.get_vector(internal_offset, &mut gain[..fade_limit]);
                for (d, g) in dest[..fade_limit].iter_mut().zip(gain[..fade_limit].iter()) {
                    *d *= *g;
                }
            }
        }

        // Fade-out: the window's overlap with the region's last
        // fade_out_length frames, sampled in fade-local coordinates
        if self.fade_out_active {
            let fade_out_length = self.fade_out.end();
            let fade_out_start = self.length.saturating_sub(fade_out_length);
            let overlap_start = fade_out_start.max(internal_offset);
            let overlap_end = self.length.min(internal_offset + to_read as u64);
            if overlap_end > overlap_start {
                let curve_offset = overlap_start - fade_out_start;
                let dest_offset = (overlap_start - internal_offset) as usize;
                let n = (overlap_end - overlap_start) as usize;
                self.fade_out.get_vector(curve_offset, &mut gain[..n]);
                for (d, g) in dest[dest_offset..dest_offset + n]
                    .iter_mut()
                    .zip(gain[..n].iter())
                {
                    *d *= *g;
                }
            }
        }

        // Envelope and scalar amplitude fold into one pass over the window
        if self.envelope_active {
            self.envelope.get_vector(internal_offset, &mut gain[..to_read]);
            if self.scale_amplitude != 1.0 {
                let scale = self.scale_amplitude;
                for (d, g) in dest.iter_mut().zip(gain[..to_read].iter()) {
                    *d *= *g * scale;
                }
            } else {
                for (d, g) in dest.iter_mut().zip(gain[..to_read].iter()) {
                    *d *= *g;
                }
            }
        } else if self.scale_amplitude != 1.0 {
            let scale = self.scale_amplitude;
            for d in dest.iter_mut() {
                *d *= scale;
            }
        }

        Some(bytes_read)
    }

    #[inline]
    fn pull(&self, sc: &SourceChannel, dest: &mut [Sample], source_pos: u64) -> Option<u64> {
        let got = sc.read(dest, source_pos);
        if got != dest.len() {
            log::warn!(
                "region {}: short source read ({} of {} frames at {})",
                self.name,
                got,
                dest.len(),
                source_pos
            );
            return None;
        }
        Some((got * std::mem::size_of::<Sample>()) as u64)
    }
}

/// Cloneable realtime handle onto a region's published snapshots.
///
/// Stays valid across later edits; every call sees the most recently
/// published state. Taking a snapshot is wait-free, and dropping one on the
/// audio thread defers any deallocation to the collector thread.
#[derive(Clone)]
pub struct RegionReader {
    cell: Arc<SharedCell<RegionSnapshot>>,
}

impl RegionReader {
    pub(super) fn new(cell: Arc<SharedCell<RegionSnapshot>>) -> Self {
        Self { cell }
    }

    /// The latest published snapshot. Hold it for at most one callback so
    /// republished state becomes audible promptly.
    #[inline]
    pub fn snapshot(&self) -> Shared<RegionSnapshot> {
        self.cell.get()
    }

    /// One-shot read against the latest snapshot; see
    /// [`RegionSnapshot::read_at`].
    #[allow(clippy::too_many_arguments)]
    pub fn read_at(
        &self,
        profile: ReadProfile,
        buf: &mut [Sample],
        mixdown: &mut [Sample],
        gain: &mut [Sample],
        position: u64,
        cnt: usize,
        channel: u32,
    ) -> ReadResult {
        self.cell
            .get()
            .read_at(profile, buf, mixdown, gain, position, cnt, channel)
    }
}
