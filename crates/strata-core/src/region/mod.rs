//! Audio regions - placed, trimmed references to source audio
//!
//! A region is a window onto shared source material: `start..start+length`
//! of the source, placed at `position` on the timeline, with fades at both
//! ends, a gain envelope, a scalar amplitude, and mute/opacity flags. It
//! never owns sample data.
//!
//! ## Control side vs. read side
//!
//! ```text
//!   control thread                   audio thread
//!   --------------                   ------------
//!   AudioRegion (this file)          RegionReader (read.rs)
//!        |  set_*, trim_*, ...            |  read_at()
//!        v                                v
//!     publish() ---Shared<RegionSnapshot>---> SharedCell::get()
//! ```
//!
//! Every mutator rebuilds an immutable [`RegionSnapshot`] and publishes it
//! through a `basedrop::SharedCell`. Readers take the latest snapshot per
//! call without locking and can never observe a half-edited curve; retired
//! snapshots are reclaimed off the audio thread by the collector in
//! [`crate::gc`].

mod gain;
mod read;
mod state;

pub use read::{ReadProfile, ReadResult, RegionReader, RegionSnapshot};
pub use state::{AudioRegionState, CurveState, EnvelopeState, FadeState, RegionStateError};

use std::sync::Arc;

use basedrop::{Shared, SharedCell};
use crossbeam::channel::Sender;

use crate::config::EngineConfig;
use crate::curve::Curve;
use crate::events::{RegionEvent, RegionProperty};
use crate::fade::{build_fade, FadeDirection, FadeShape};
use crate::gc;
use crate::source::{channels_of, Source, SourceChannel};
use crate::types::{Sample, DEFAULT_FADE_LENGTH};

/// Fade suspension state.
///
/// Suspension nests: overlapping editing gestures (capture passes, crossfade
/// auditions) each suspend and resume, and the fade only comes back when the
/// last one finishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FadeSuspend {
    #[default]
    Active,
    Suspended {
        depth: u32,
    },
}

impl FadeSuspend {
    #[inline]
    pub fn is_suspended(&self) -> bool {
        matches!(self, FadeSuspend::Suspended { .. })
    }
}

/// A placed, trimmed, gain-shaped reference to source audio.
///
/// This is the control-side object: it is mutated by whoever owns the
/// region and publishes snapshots for the realtime read path. Get a
/// [`RegionReader`] from [`reader`](AudioRegion::reader) for the audio
/// thread.
pub struct AudioRegion {
    name: String,
    /// Timeline frame of the region's first frame
    position: u64,
    /// Offset into the sources where the region's audio begins
    start: u64,
    /// Length in frames (always nonzero)
    length: u64,
    /// Snap-alignment frame, relative to `position`
    sync_position: u64,
    muted: bool,
    /// Opaque regions overwrite what is underneath; transparent regions mix
    opaque: bool,
    /// Scalar gain applied after the envelope (1.0 = untouched)
    scale_amplitude: Sample,
    envelope_active: bool,
    fade_in_active: bool,
    fade_out_active: bool,
    /// Serialization economy: still the constructor-built default fade?
    /// Cleared by the fade setters, restored by `set_default_fade_*`.
    default_fade_in: bool,
    default_fade_out: bool,
    fade_in_suspend: FadeSuspend,
    fade_out_suspend: FadeSuspend,
    /// Fade-local coordinates, domain `[0, fade_length]`
    fade_in: Curve,
    fade_out: Curve,
    /// Region-local coordinates, domain `[0, length]`, never below 2 points
    envelope: Curve,
    /// One entry per region channel
    sources: Vec<SourceChannel>,
    /// Source list used by crossfade-reference reads
    master_sources: Vec<SourceChannel>,
    /// Channel-mismatch policy, copied from [`EngineConfig`]
    replicate_missing_channels: bool,
    /// Latest published snapshot; shared with every [`RegionReader`]
    snapshot: Arc<SharedCell<RegionSnapshot>>,
    /// Change notifications, if anyone is listening
    events: Option<Sender<RegionEvent>>,
    /// Timeline-space transient positions, invalidated by edits
    pub(crate) transient_cache: Option<Vec<u64>>,
}

impl AudioRegion {
    /// Create a region over an explicit channel list.
    ///
    /// `length` must be nonzero. The region starts unmuted, opaque, at unity
    /// gain, with an active flat envelope and default linear fades at both
    /// ends.
    pub fn new(
        name: impl Into<String>,
        sources: Vec<SourceChannel>,
        position: u64,
        start: u64,
        length: u64,
        config: &EngineConfig,
    ) -> Self {
        assert!(length > 0, "region length must be nonzero");
        let name = name.into();

        if let Some(shortest) = sources.iter().map(|sc| sc.source().length()).min() {
            if start + length > shortest {
                log::warn!(
                    "region {}: window [{}, {}) runs past the shortest source ({} frames)",
                    name,
                    start,
                    start + length,
                    shortest
                );
            }
        }

        let fade_length = Self::default_fade_length(length);
        let master_sources = sources.clone();
        let region = Self {
            name,
            position,
            start,
            length,
            sync_position: 0,
            muted: false,
            opaque: true,
            scale_amplitude: 1.0,
            envelope_active: true,
            fade_in_active: true,
            fade_out_active: true,
            default_fade_in: true,
            default_fade_out: true,
            fade_in_suspend: FadeSuspend::Active,
            fade_out_suspend: FadeSuspend::Active,
            fade_in: build_fade(FadeShape::Linear, fade_length, FadeDirection::In),
            fade_out: build_fade(FadeShape::Linear, fade_length, FadeDirection::Out),
            envelope: default_envelope(length),
            sources,
            master_sources,
            replicate_missing_channels: config.replicate_missing_region_channels,
            snapshot: Arc::new(SharedCell::new(Shared::new(
                &gc::gc_handle(),
                RegionSnapshot::placeholder(),
            ))),
            events: None,
            transient_cache: None,
        };
        region.publish();
        region
    }

    /// Create a region covering a whole source, placed at `position`.
    pub fn from_source(
        name: impl Into<String>,
        source: Arc<dyn Source>,
        position: u64,
        config: &EngineConfig,
    ) -> Self {
        let length = source.length().max(1);
        Self::new(name, channels_of(&source), position, 0, length, config)
    }

    /// Default fades are 64 frames, shrunk to fit short regions. A
    /// single-frame region keeps a degenerate 1-frame fade rather than none.
    fn default_fade_length(region_length: u64) -> u64 {
        DEFAULT_FADE_LENGTH.min(region_length.saturating_sub(1)).max(1)
    }

    // --- accessors ---

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn position(&self) -> u64 {
        self.position
    }

    #[inline]
    pub fn start(&self) -> u64 {
        self.start
    }

    #[inline]
    pub fn length(&self) -> u64 {
        self.length
    }

    /// First timeline frame past the region.
    #[inline]
    pub fn end(&self) -> u64 {
        self.position + self.length
    }

    #[inline]
    pub fn sync_position(&self) -> u64 {
        self.sync_position
    }

    #[inline]
    pub fn muted(&self) -> bool {
        self.muted
    }

    #[inline]
    pub fn opaque(&self) -> bool {
        self.opaque
    }

    #[inline]
    pub fn scale_amplitude(&self) -> Sample {
        self.scale_amplitude
    }

    #[inline]
    pub fn envelope_active(&self) -> bool {
        self.envelope_active
    }

    #[inline]
    pub fn fade_in_active(&self) -> bool {
        self.fade_in_active
    }

    #[inline]
    pub fn fade_out_active(&self) -> bool {
        self.fade_out_active
    }

    #[inline]
    pub fn fade_in(&self) -> &Curve {
        &self.fade_in
    }

    #[inline]
    pub fn fade_out(&self) -> &Curve {
        &self.fade_out
    }

    #[inline]
    pub fn envelope(&self) -> &Curve {
        &self.envelope
    }

    #[inline]
    pub fn n_channels(&self) -> u32 {
        self.sources.len() as u32
    }

    #[inline]
    pub fn sources(&self) -> &[SourceChannel] {
        &self.sources
    }

    /// Whether the fade-in still has the *structure* of a default fade: two
    /// points at frames 0 and 64. This inspects point times only; it is
    /// deliberately independent of the serialized `default` flag, which
    /// tracks whether a setter ever replaced the fade.
    pub fn fade_in_is_default(&self) -> bool {
        self.fade_in.len() == 2
            && self.fade_in.front().map(|p| p.when) == Some(0)
            && self.fade_in.back().map(|p| p.when) == Some(DEFAULT_FADE_LENGTH)
    }

    /// Structural twin of [`fade_in_is_default`](Self::fade_in_is_default)
    /// for the fade-out.
    pub fn fade_out_is_default(&self) -> bool {
        self.fade_out.len() == 2
            && self.fade_out.front().map(|p| p.when) == Some(0)
            && self.fade_out.back().map(|p| p.when) == Some(DEFAULT_FADE_LENGTH)
    }

    // --- placement and trims ---

    /// Move the region on the timeline without touching its contents.
    pub fn set_position(&mut self, position: u64) {
        if position == self.position {
            return;
        }
        self.position = position;
        self.transient_cache = None;
        self.publish();
        self.notify_property(RegionProperty::Position);
    }

    /// Slide the window within the source without moving the region.
    pub fn set_start(&mut self, start: u64) {
        if start == self.start {
            return;
        }
        self.start = start;
        self.transient_cache = None;
        self.publish();
        self.notify_contents(RegionProperty::Start);
    }

    /// Resize the region in place. The envelope is clamped or extended so
    /// its domain tracks the region, and over-long fades are shrunk to fit.
    pub fn set_length(&mut self, new_length: u64) {
        if new_length == 0 {
            log::warn!("region {}: ignoring zero-length resize", self.name);
            return;
        }
        if new_length == self.length {
            return;
        }
        self.length = new_length;
        self.envelope.set_end(new_length);
        self.clamp_fades_to_length();
        self.transient_cache = None;
        self.publish();
        self.notify_contents(RegionProperty::Length);
    }

    /// Trim or extend the region's tail; equivalent to
    /// [`set_length`](Self::set_length).
    pub fn trim_end(&mut self, new_length: u64) {
        self.set_length(new_length);
    }

    /// Trim the region's head forward to `new_position`, keeping the
    /// remaining audio where it was on the timeline. The envelope keeps its
    /// tail shape; `new_position` must lie inside the region.
    pub fn trim_front(&mut self, new_position: u64) {
        if new_position <= self.position {
            if new_position < self.position {
                log::debug!("region {}: trim_front only moves forward", self.name);
            }
            return;
        }
        let delta = new_position - self.position;
        if delta >= self.length {
            log::warn!("region {}: trim_front would consume the region", self.name);
            return;
        }
        self.position = new_position;
        self.start += delta;
        self.length -= delta;
        self.envelope.truncate_start(self.length);
        self.clamp_fades_to_length();
        self.transient_cache = None;
        self.publish();
        self.notify_contents(RegionProperty::Position);
    }

    /// Set the snap-alignment frame (relative to the region position).
    pub fn set_sync_position(&mut self, sync_position: u64) {
        if sync_position == self.sync_position {
            return;
        }
        self.sync_position = sync_position;
        self.notify_property(RegionProperty::SyncPosition);
    }

    // --- audibility flags ---

    pub fn set_muted(&mut self, muted: bool) {
        if muted == self.muted {
            return;
        }
        self.muted = muted;
        self.publish();
        self.notify_contents(RegionProperty::Muted);
    }

    pub fn set_opaque(&mut self, opaque: bool) {
        if opaque == self.opaque {
            return;
        }
        self.opaque = opaque;
        self.publish();
        self.notify_contents(RegionProperty::Opaque);
    }

    // --- fades ---

    /// Replace the fade-in with a freshly built curve. Marks the fade as
    /// explicitly chosen: it will be serialized in full rather than as
    /// `default: true`.
    pub fn set_fade_in(&mut self, shape: FadeShape, length: u64) {
        let length = self.clamp_fade_length(length);
        log::debug!(
            "region {}: fade in {} over {} frames",
            self.name,
            shape.name(),
            length
        );
        self.fade_in = build_fade(shape, length, FadeDirection::In);
        self.default_fade_in = false;
        self.publish();
        self.notify_contents(RegionProperty::FadeIn);
    }

    /// Replace the fade-out; mirror of [`set_fade_in`](Self::set_fade_in).
    pub fn set_fade_out(&mut self, shape: FadeShape, length: u64) {
        let length = self.clamp_fade_length(length);
        log::debug!(
            "region {}: fade out {} over {} frames",
            self.name,
            shape.name(),
            length
        );
        self.fade_out = build_fade(shape, length, FadeDirection::Out);
        self.default_fade_out = false;
        self.publish();
        self.notify_contents(RegionProperty::FadeOut);
    }

    /// Restore the constructor-built default fade-in and set the
    /// serialization flag back.
    pub fn set_default_fade_in(&mut self) {
        self.fade_in = build_fade(
            FadeShape::Linear,
            Self::default_fade_length(self.length),
            FadeDirection::In,
        );
        self.default_fade_in = true;
        self.publish();
        self.notify_contents(RegionProperty::FadeIn);
    }

    /// Restore the constructor-built default fade-out.
    pub fn set_default_fade_out(&mut self) {
        self.fade_out = build_fade(
            FadeShape::Linear,
            Self::default_fade_length(self.length),
            FadeDirection::Out,
        );
        self.default_fade_out = true;
        self.publish();
        self.notify_contents(RegionProperty::FadeOut);
    }

    pub fn set_fade_in_active(&mut self, active: bool) {
        if active == self.fade_in_active {
            return;
        }
        self.fade_in_active = active;
        self.publish();
        self.notify_contents(RegionProperty::FadeInActive);
    }

    pub fn set_fade_out_active(&mut self, active: bool) {
        if active == self.fade_out_active {
            return;
        }
        self.fade_out_active = active;
        self.publish();
        self.notify_contents(RegionProperty::FadeOutActive);
    }

    /// Suspend the fade-in for the duration of an editing gesture.
    ///
    /// The first suspension deactivates the fade only while it is still a
    /// default fade; an explicitly shaped fade survives suspension audibly
    /// untouched. Nested calls stack.
    pub fn suspend_fade_in(&mut self) {
        self.fade_in_suspend = match self.fade_in_suspend {
            FadeSuspend::Active => {
                if self.fade_in_is_default() {
                    self.set_fade_in_active(false);
                }
                FadeSuspend::Suspended { depth: 1 }
            }
            FadeSuspend::Suspended { depth } => FadeSuspend::Suspended { depth: depth + 1 },
        };
    }

    /// Unwind one fade-in suspension; the last resume always reactivates.
    pub fn resume_fade_in(&mut self) {
        self.fade_in_suspend = match self.fade_in_suspend {
            FadeSuspend::Active => {
                log::warn!("region {}: resume_fade_in without suspend", self.name);
                FadeSuspend::Active
            }
            FadeSuspend::Suspended { depth: 1 } => {
                self.set_fade_in_active(true);
                FadeSuspend::Active
            }
            FadeSuspend::Suspended { depth } => FadeSuspend::Suspended { depth: depth - 1 },
        };
    }

    /// Fade-out twin of [`suspend_fade_in`](Self::suspend_fade_in).
    pub fn suspend_fade_out(&mut self) {
        self.fade_out_suspend = match self.fade_out_suspend {
            FadeSuspend::Active => {
                if self.fade_out_is_default() {
                    self.set_fade_out_active(false);
                }
                FadeSuspend::Suspended { depth: 1 }
            }
            FadeSuspend::Suspended { depth } => FadeSuspend::Suspended { depth: depth + 1 },
        };
    }

    /// Fade-out twin of [`resume_fade_in`](Self::resume_fade_in).
    pub fn resume_fade_out(&mut self) {
        self.fade_out_suspend = match self.fade_out_suspend {
            FadeSuspend::Active => {
                log::warn!("region {}: resume_fade_out without suspend", self.name);
                FadeSuspend::Active
            }
            FadeSuspend::Suspended { depth: 1 } => {
                self.set_fade_out_active(true);
                FadeSuspend::Active
            }
            FadeSuspend::Suspended { depth } => FadeSuspend::Suspended { depth: depth - 1 },
        };
    }

    #[inline]
    pub fn fade_in_suspended(&self) -> bool {
        self.fade_in_suspend.is_suspended()
    }

    #[inline]
    pub fn fade_out_suspended(&self) -> bool {
        self.fade_out_suspend.is_suspended()
    }

    // --- envelope and gain ---

    pub fn set_envelope_active(&mut self, active: bool) {
        if active == self.envelope_active {
            return;
        }
        self.envelope_active = active;
        self.publish();
        self.notify_contents(RegionProperty::EnvelopeActive);
    }

    /// Edit the gain envelope in place. The closure may add, move, or
    /// remove points; the result must keep at least two points and is
    /// published as one change.
    pub fn with_envelope<F>(&mut self, edit: F)
    where
        F: FnOnce(&mut Curve),
    {
        edit(&mut self.envelope);
        debug_assert!(
            self.envelope.len() >= 2,
            "envelope must keep at least two points"
        );
        self.publish();
        self.notify_contents(RegionProperty::Envelope);
    }

    /// Replace the envelope with the flat unity default.
    pub fn set_default_envelope(&mut self) {
        self.envelope = default_envelope(self.length);
        self.publish();
        self.notify_contents(RegionProperty::Envelope);
    }

    /// Set the scalar amplitude applied after the envelope. Unclamped;
    /// callers keep it non-negative.
    pub fn set_scale_amplitude(&mut self, scale: Sample) {
        if scale == self.scale_amplitude {
            return;
        }
        self.scale_amplitude = scale;
        self.publish();
        self.notify_contents(RegionProperty::ScaleAmplitude);
    }

    // --- read access ---

    /// Compose this region's contribution to a timeline window using the
    /// latest published snapshot. See [`RegionSnapshot::read_at`] for the
    /// full contract.
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
        self.snapshot
            .get()
            .read_at(profile, buf, mixdown, gain, position, cnt, channel)
    }

    /// Cloneable handle for the audio thread. Readers stay valid across
    /// later edits; they always see the most recently published snapshot.
    pub fn reader(&self) -> RegionReader {
        RegionReader::new(Arc::clone(&self.snapshot))
    }

    /// Attach a change-notification sender (see [`crate::events`]).
    pub fn set_event_sink(&mut self, sender: Sender<RegionEvent>) {
        self.events = Some(sender);
    }

    // --- internals ---

    /// Read raw source frames for one region channel, region-relative.
    /// Control-side helper for the analysis and gain scans; the realtime
    /// path reads through the snapshot instead.
    pub(crate) fn read_raw(&self, dst: &mut [Sample], offset: u64, channel: usize) -> usize {
        match self.sources.get(channel) {
            Some(sc) => sc.read(dst, self.start + offset),
            None => 0,
        }
    }

    /// Fades must leave at least one unfaded frame; degenerate single-frame
    /// regions still get a 1-frame fade.
    fn clamp_fade_length(&self, requested: u64) -> u64 {
        requested.clamp(1, self.length.saturating_sub(1).max(1))
    }

    /// Shrink fades that no longer fit after a resize. A still-default fade
    /// is rebuilt at the default length; an explicit fade is compressed in
    /// time onto the new boundary, so a fade-in still reaches unity and a
    /// fade-out still reaches silence.
    fn clamp_fades_to_length(&mut self) {
        let max_fade = self.length.saturating_sub(1).max(1);
        if self.fade_in.end() > max_fade {
            if self.default_fade_in {
                self.fade_in = build_fade(
                    FadeShape::Linear,
                    Self::default_fade_length(self.length),
                    FadeDirection::In,
                );
            } else {
                self.fade_in.rescale_end(max_fade);
            }
        }
        if self.fade_out.end() > max_fade {
            if self.default_fade_out {
                self.fade_out = build_fade(
                    FadeShape::Linear,
                    Self::default_fade_length(self.length),
                    FadeDirection::Out,
                );
            } else {
                self.fade_out.rescale_end(max_fade);
            }
        }
    }

    /// Rebuild and publish the read-side snapshot. Called at the end of
    /// every mutator that affects what a read produces.
    fn publish(&self) {
        let snapshot = RegionSnapshot {
            name: self.name.clone(),
            position: self.position,
            start: self.start,
            length: self.length,
            muted: self.muted,
            opaque: self.opaque,
            scale_amplitude: self.scale_amplitude,
            envelope_active: self.envelope_active,
            fade_in_active: self.fade_in_active,
            fade_out_active: self.fade_out_active,
            fade_in: self.fade_in.clone(),
            fade_out: self.fade_out.clone(),
            envelope: self.envelope.clone(),
            sources: self.sources.clone(),
            master_sources: self.master_sources.clone(),
            replicate_missing_channels: self.replicate_missing_channels,
        };
        self.snapshot.set(Shared::new(&gc::gc_handle(), snapshot));
    }

    fn notify_property(&self, property: RegionProperty) {
        self.send(RegionEvent::PropertyChanged {
            region: self.name.clone(),
            property,
        });
    }

    /// Property change that also invalidates rendered audio.
    fn notify_contents(&self, property: RegionProperty) {
        self.send(RegionEvent::PropertyChanged {
            region: self.name.clone(),
            property,
        });
        self.send(RegionEvent::ContentsChanged {
            region: self.name.clone(),
        });
    }

    fn send(&self, event: RegionEvent) {
        if let Some(tx) = &self.events {
            // Never block an edit on a slow subscriber
            if let Err(e) = tx.try_send(event) {
                log::warn!("region {}: event dropped: {}", self.name, e);
            }
        }
    }
}

/// Flat unity envelope spanning `[0, length]`.
pub fn default_envelope(length: u64) -> Curve {
    Curve::from_points([(0, 1.0), (length, 1.0)])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::RegionEventBus;
    use crate::source::MemorySource;

    fn test_source(frames: usize) -> Arc<dyn Source> {
        let data: Vec<Sample> = (0..frames).map(|i| (i % 100) as f32 / 100.0).collect();
        Arc::new(MemorySource::from_channels("src", vec![data], 48000))
    }

    fn test_region(frames: usize) -> AudioRegion {
        AudioRegion::from_source("r1", test_source(frames), 0, &EngineConfig::default())
    }

    #[test]
    fn test_new_region_defaults() {
        let r = test_region(10000);
        assert_eq!(r.length(), 10000);
        assert_eq!(r.start(), 0);
        assert!(r.opaque());
        assert!(!r.muted());
        assert_eq!(r.scale_amplitude(), 1.0);
        assert!(r.envelope_active());
        assert!(r.fade_in_active());
        assert!(r.fade_in_is_default());
        assert!(r.fade_out_is_default());
        assert_eq!(r.fade_in().end(), DEFAULT_FADE_LENGTH);
        assert_eq!(r.envelope().len(), 2);
        assert_eq!(r.envelope().back().unwrap().when, 10000);
    }

    #[test]
    fn test_set_fade_clears_default_flag_structural_check_disagrees() {
        let mut r = test_region(10000);
        // An explicit linear 64-frame fade: flag goes false, structure still
        // looks default. Both observables are intentional.
        r.set_fade_in(FadeShape::Linear, 64);
        assert!(!r.default_fade_in);
        assert!(r.fade_in_is_default());
    }

    #[test]
    fn test_envelope_tracks_shrink() {
        let mut r = test_region(10000);
        r.with_envelope(|env| {
            env.add(4000, 0.5);
            env.add(9000, 0.25);
        });
        r.set_length(5000);
        let env = r.envelope();
        assert_eq!(env.back().unwrap().when, 5000);
        assert!(env.points().iter().all(|p| p.when <= 5000));
        // Point inside the survived range is untouched
        assert_eq!(env.value_at(4000), 0.5);
    }

    #[test]
    fn test_envelope_tracks_grow() {
        let mut r = test_region(5000);
        r.set_length(8000);
        let env = r.envelope();
        assert_eq!(env.back().unwrap().when, 8000);
        assert_eq!(env.value_at(7000), 1.0);
    }

    #[test]
    fn test_shrink_compresses_explicit_fades() {
        let mut r = test_region(10000);
        r.set_fade_in(FadeShape::Linear, 8000);
        r.set_fade_out(FadeShape::Fast, 8000);
        r.set_length(4000);
        // The fades compress onto the shorter region instead of being cut
        // off mid-slope: the fade-in still reaches unity at its end and the
        // fade-out still lands on silence
        let fade_in = r.fade_in();
        assert_eq!(fade_in.end(), 3999);
        assert_eq!(fade_in.value_at(3999), 1.0);
        let fade_out = r.fade_out();
        assert_eq!(fade_out.end(), 3999);
        assert_eq!(fade_out.front().unwrap().value, 1.0);
        assert_eq!(fade_out.value_at(3999), 0.0);
        // Compression keeps the shape's interior points in proportion
        assert_eq!(fade_out.len(), 7);
        assert!(fade_out
            .points()
            .windows(2)
            .all(|w| w[0].when < w[1].when && w[0].value >= w[1].value));
    }

    #[test]
    fn test_shrink_rebuilds_default_fade() {
        let mut r = test_region(100);
        assert_eq!(r.fade_in().end(), 64);
        r.set_length(32);
        // Default fades regenerate at the shorter default length
        assert_eq!(r.fade_in().end(), 31);
        assert!(r.default_fade_in);
    }

    #[test]
    fn test_trim_front_moves_window() {
        let mut r = test_region(10000);
        r.with_envelope(|env| env.add(6000, 0.5));
        r.trim_front(4000);
        assert_eq!(r.position(), 4000);
        assert_eq!(r.start(), 4000);
        assert_eq!(r.length(), 6000);
        // Envelope kept its tail: old frame 6000 is new frame 2000
        assert_eq!(r.envelope().value_at(2000), 0.5);
        assert_eq!(r.envelope().back().unwrap().when, 6000);
    }

    #[test]
    fn test_trim_front_rejects_backward_and_overrun() {
        let mut r = test_region(1000);
        r.set_position(500);
        r.trim_front(100);
        assert_eq!(r.position(), 500);
        r.trim_front(5000);
        assert_eq!(r.position(), 500);
        assert_eq!(r.length(), 1000);
    }

    #[test]
    fn test_suspend_resume_default_fade() {
        let mut r = test_region(10000);
        assert!(r.fade_in_active());
        r.suspend_fade_in();
        assert!(!r.fade_in_active(), "default fade deactivates on suspend");
        assert!(r.fade_in_suspended());
        r.resume_fade_in();
        assert!(r.fade_in_active());
        assert!(!r.fade_in_suspended());
    }

    #[test]
    fn test_suspend_explicit_fade_stays_active() {
        let mut r = test_region(10000);
        r.set_fade_in(FadeShape::Slow, 2000);
        r.suspend_fade_in();
        assert!(r.fade_in_active(), "explicit fade survives suspension");
        r.resume_fade_in();
        assert!(r.fade_in_active());
    }

    #[test]
    fn test_suspend_nesting() {
        let mut r = test_region(10000);
        r.suspend_fade_out();
        r.suspend_fade_out();
        r.resume_fade_out();
        assert!(r.fade_out_suspended());
        assert!(!r.fade_out_active());
        r.resume_fade_out();
        assert!(!r.fade_out_suspended());
        assert!(r.fade_out_active());
    }

    #[test]
    fn test_unbalanced_resume_is_harmless() {
        let mut r = test_region(10000);
        r.resume_fade_in();
        assert!(!r.fade_in_suspended());
        assert!(r.fade_in_active());
    }

    #[test]
    fn test_events_emitted() {
        let bus = RegionEventBus::new(64);
        let rx = bus.subscribe();
        let mut r = test_region(10000);
        r.set_event_sink(bus.sender());

        r.set_scale_amplitude(0.5);
        let first = rx.recv().unwrap();
        assert_eq!(
            first,
            RegionEvent::PropertyChanged {
                region: "r1".to_string(),
                property: RegionProperty::ScaleAmplitude,
            }
        );
        let second = rx.recv().unwrap();
        assert_eq!(
            second,
            RegionEvent::ContentsChanged {
                region: "r1".to_string(),
            }
        );

        r.set_sync_position(123);
        match rx.recv().unwrap() {
            RegionEvent::PropertyChanged { property, .. } => {
                assert_eq!(property, RegionProperty::SyncPosition)
            }
            other => panic!("unexpected event {:?}", other),
        }
        // Sync position is inaudible: no ContentsChanged follows
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_noop_setters_stay_silent() {
        let bus = RegionEventBus::new(8);
        let rx = bus.subscribe();
        let mut r = test_region(1000);
        r.set_event_sink(bus.sender());

        r.set_muted(false);
        r.set_scale_amplitude(1.0);
        r.set_length(1000);
        assert!(rx.try_recv().is_err());
    }
}
