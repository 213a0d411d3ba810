//! Ordered control-point lists for fades and gain envelopes
//!
//! A [`Curve`] is a sorted list of `(when, value)` breakpoints with linear
//! interpolation between neighbors and flat extrapolation outside the
//! covered range. Fade curves span `[0, fade_length]` in fade-local
//! coordinates; the gain envelope spans `[0, region_length]` in
//! region-local coordinates.
//!
//! The realtime read path samples curves with [`Curve::get_vector`], which
//! walks segments across the output span instead of binary-searching per
//! frame. Mutation never happens on the audio thread; regions hand readers
//! an immutable snapshot instead (see `region::read`).

use crate::types::Sample;

/// A single breakpoint: `value` applies at frame `when`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControlPoint {
    pub when: u64,
    pub value: Sample,
}

impl ControlPoint {
    #[inline]
    pub fn new(when: u64, value: Sample) -> Self {
        Self { when, value }
    }
}

/// Sorted breakpoint list with freeze/thaw batching.
///
/// Points are kept strictly increasing in `when`. During a freeze, adds are
/// appended unsorted and the list is re-sorted (duplicates collapsed, last
/// write wins) when the final `thaw` lands. Region code keeps every curve at
/// two points minimum; `Curve` itself only guarantees ordering.
#[derive(Debug, Clone, Default)]
pub struct Curve {
    points: Vec<ControlPoint>,
    freeze_depth: u32,
    sort_pending: bool,
}

impl Curve {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from `(when, value)` pairs that are already in ascending order.
    pub fn from_points<I>(points: I) -> Self
    where
        I: IntoIterator<Item = (u64, Sample)>,
    {
        let mut curve = Self::new();
        for (when, value) in points {
            curve.fast_simple_add(when, value);
        }
        curve
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    #[inline]
    pub fn points(&self) -> &[ControlPoint] {
        &self.points
    }

    #[inline]
    pub fn front(&self) -> Option<&ControlPoint> {
        self.points.first()
    }

    #[inline]
    pub fn back(&self) -> Option<&ControlPoint> {
        self.points.last()
    }

    /// Frame position of the last point, or 0 for an empty curve.
    ///
    /// For fade curves this is the fade length; for envelopes it matches the
    /// region length.
    #[inline]
    pub fn end(&self) -> u64 {
        self.points.last().map(|p| p.when).unwrap_or(0)
    }

    pub fn clear(&mut self) {
        self.points.clear();
        self.sort_pending = false;
    }

    /// Defer sorting until the matching [`thaw`](Self::thaw).
    ///
    /// Freezes nest; only the final thaw restores ordering.
    pub fn freeze(&mut self) {
        self.freeze_depth += 1;
    }

    pub fn thaw(&mut self) {
        match self.freeze_depth {
            0 => log::warn!("curve: thaw without matching freeze"),
            1 => {
                self.freeze_depth = 0;
                if self.sort_pending {
                    self.sort_and_dedup();
                }
            }
            _ => self.freeze_depth -= 1,
        }
    }

    #[inline]
    pub fn is_frozen(&self) -> bool {
        self.freeze_depth > 0
    }

    /// Append a point, trusting the caller to add in ascending order.
    ///
    /// The bulk-construction path for fade generation and state loading.
    /// An out-of-order append is repaired immediately (or at thaw when
    /// frozen) rather than corrupting the list.
    pub fn fast_simple_add(&mut self, when: u64, value: Sample) {
        let ordered = self.points.last().map(|p| p.when < when).unwrap_or(true);
        self.points.push(ControlPoint::new(when, value));
        if !ordered {
            if self.freeze_depth > 0 {
                self.sort_pending = true;
            } else {
                self.sort_and_dedup();
            }
        }
    }

    /// Insert a point at its sorted position, replacing any point already at
    /// `when`.
    pub fn add(&mut self, when: u64, value: Sample) {
        if self.freeze_depth > 0 {
            self.points.push(ControlPoint::new(when, value));
            self.sort_pending = true;
            return;
        }
        match self.points.binary_search_by(|p| p.when.cmp(&when)) {
            Ok(i) => self.points[i].value = value,
            Err(i) => self.points.insert(i, ControlPoint::new(when, value)),
        }
    }

    fn sort_and_dedup(&mut self) {
        // Stable sort keeps insertion order for equal frames, so keeping the
        // last of each run gives last-write-wins.
        self.points.sort_by_key(|p| p.when);
        let mut kept: Vec<ControlPoint> = Vec::with_capacity(self.points.len());
        for p in self.points.drain(..) {
            match kept.last_mut() {
                Some(last) if last.when == p.when => *last = p,
                _ => kept.push(p),
            }
        }
        self.points = kept;
        self.sort_pending = false;
    }

    /// Sample the curve at a single frame.
    ///
    /// Linear interpolation between neighbors; positions before the first or
    /// after the last point take the boundary value. An empty curve samples
    /// as silence.
    pub fn value_at(&self, when: u64) -> Sample {
        debug_assert!(!self.sort_pending, "sampling an unsorted curve");
        let pts = &self.points;
        match pts.len() {
            0 => 0.0,
            1 => pts[0].value,
            n => {
                if when <= pts[0].when {
                    return pts[0].value;
                }
                if when >= pts[n - 1].when {
                    return pts[n - 1].value;
                }
                match pts.binary_search_by(|p| p.when.cmp(&when)) {
                    Ok(i) => pts[i].value,
                    Err(i) => Self::interpolate(&pts[i - 1], &pts[i], when),
                }
            }
        }
    }

    /// Fill `out` with per-frame values for the span starting at `start`.
    ///
    /// Walks segments across the span, so the cost is `O(out.len() +
    /// points_crossed)` rather than a binary search per frame. Realtime safe:
    /// no allocation, no locks.
    pub fn get_vector(&self, start: u64, out: &mut [Sample]) {
        debug_assert!(!self.sort_pending, "sampling an unsorted curve");
        let pts = &self.points;
        match pts.len() {
            0 => {
                out.fill(0.0);
                return;
            }
            1 => {
                out.fill(pts[0].value);
                return;
            }
            _ => {}
        }

        let mut seg = match pts.binary_search_by(|p| p.when.cmp(&start)) {
            Ok(i) => i,
            Err(i) => i.saturating_sub(1),
        };

        for (i, slot) in out.iter_mut().enumerate() {
            let when = start + i as u64;
            while seg + 1 < pts.len() && pts[seg + 1].when <= when {
                seg += 1;
            }
            *slot = if seg + 1 == pts.len() || when <= pts[seg].when {
                // Past the last point, or at/before the segment's left edge
                pts[seg].value
            } else {
                Self::interpolate(&pts[seg], &pts[seg + 1], when)
            };
        }
    }

    #[inline]
    fn interpolate(a: &ControlPoint, b: &ControlPoint, when: u64) -> Sample {
        let t = (when - a.when) as f64 / (b.when - a.when) as f64;
        (a.value as f64 + (b.value as f64 - a.value as f64) * t) as Sample
    }

    /// Clamp or extend the curve so its last point lands exactly on
    /// `new_end`.
    ///
    /// Shrinking drops points at or beyond the boundary and re-adds the
    /// boundary carrying the interpolated value there; growing appends a
    /// point holding the previous end value. Called on region length
    /// changes; `new_end` must be nonzero.
    pub fn set_end(&mut self, new_end: u64) {
        debug_assert!(!self.sort_pending, "resizing an unsorted curve");
        debug_assert!(new_end > 0, "curve domain must be nonzero");
        let Some(last) = self.points.last() else {
            return;
        };
        if last.when == new_end {
            return;
        }
        if last.when < new_end {
            let value = last.value;
            self.points.push(ControlPoint::new(new_end, value));
            return;
        }
        let boundary = self.value_at(new_end);
        self.points.retain(|p| p.when < new_end);
        self.points.push(ControlPoint::new(new_end, boundary));
        if self.points.len() < 2 {
            // Every original point sat past the boundary; rebuild a flat head
            self.points.insert(0, ControlPoint::new(0, boundary));
        }
    }

    /// Compress or stretch the curve in time so its last point lands exactly
    /// on `new_end`, keeping every point's value.
    ///
    /// Point times scale by `new_end / old_end`: the shape survives at the
    /// new length with its terminal value intact, where
    /// [`set_end`](Self::set_end) would cut the tail off at the boundary.
    /// Interior points that round onto an occupied frame keep the first of
    /// each run. Used when an explicit fade must shrink to fit a resized
    /// region; `new_end` must be nonzero.
    pub fn rescale_end(&mut self, new_end: u64) {
        debug_assert!(!self.sort_pending, "resizing an unsorted curve");
        debug_assert!(new_end > 0, "curve domain must be nonzero");
        let old_end = self.end();
        if old_end == new_end || old_end == 0 {
            return;
        }
        let ratio = new_end as f64 / old_end as f64;
        let last = self.points.len() - 1;
        let mut scaled: Vec<ControlPoint> = Vec::with_capacity(self.points.len());
        for p in &self.points[..last] {
            let when = (p.when as f64 * ratio).round() as u64;
            if when >= new_end {
                // Squeezed into the terminal frame; the end point wins
                break;
            }
            match scaled.last() {
                Some(prev) if prev.when >= when => {} // rounding collision, first wins
                _ => scaled.push(ControlPoint::new(when, p.value)),
            }
        }
        scaled.push(ControlPoint::new(new_end, self.points[last].value));
        self.points = scaled;
    }

    /// Keep the trailing `new_length` frames of the curve, shifted to start
    /// at 0.
    ///
    /// The cut boundary carries the interpolated value so the surviving tail
    /// keeps its shape. Called when a region is trimmed from the front;
    /// `new_length` must be nonzero.
    pub fn truncate_start(&mut self, new_length: u64) {
        debug_assert!(!self.sort_pending, "resizing an unsorted curve");
        debug_assert!(new_length > 0, "curve domain must be nonzero");
        let Some(last) = self.points.last() else {
            return;
        };
        if new_length >= last.when {
            return;
        }
        let cut = last.when - new_length;
        let boundary = self.value_at(cut);
        self.points.retain(|p| p.when > cut);
        for p in &mut self.points {
            p.when -= cut;
        }
        self.points.insert(0, ControlPoint::new(0, boundary));
    }
}
