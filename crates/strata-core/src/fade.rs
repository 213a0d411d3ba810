//! Deterministic fade curve generation
//!
//! Each fade shape is a fixed table of normalized `(time, value)` breakpoints
//! in the unit square, scaled onto `[0, length]` when a fade is built. The
//! fade-out direction reuses the fade-in table mirrored across the time axis,
//! so both directions of a shape keep the same character and stay in exact
//! correspondence.
//!
//! Shape tables are data, not code: adding a shape means adding a table.

use crate::curve::Curve;
use crate::types::Sample;

/// Normalized `(time, value)` breakpoints, both axes in `[0, 1]`.
type Breakpoint = (f32, f32);

const LINEAR: &[Breakpoint] = &[(0.0, 0.0), (1.0, 1.0)];

// The four non-linear shapes are empirically tuned 7-point tables. Values
// are part of the persisted-state contract: saved curves must reload
// bit-identically across versions, so these never change.
const FAST: &[Breakpoint] = &[
    (0.0, 0.0),
    (0.389401, 0.0333333),
    (0.629032, 0.0861111),
    (0.829493, 0.233333),
    (0.9447, 0.483333),
    (0.976959, 0.697222),
    (1.0, 1.0),
];

const SLOW: &[Breakpoint] = &[
    (0.0, 0.0),
    (0.0207373, 0.197222),
    (0.0645161, 0.525),
    (0.152074, 0.802778),
    (0.276498, 0.919444),
    (0.481567, 0.980556),
    (1.0, 1.0),
];

const LOG_A: &[Breakpoint] = &[
    (0.0, 0.0),
    (0.0737327, 0.308333),
    (0.246544, 0.658333),
    (0.470046, 0.886111),
    (0.652074, 0.972222),
    (0.771889, 0.988889),
    (1.0, 1.0),
];

const LOG_B: &[Breakpoint] = &[
    (0.0, 0.0),
    (0.304147, 0.0694444),
    (0.529954, 0.152778),
    (0.725806, 0.333333),
    (0.847926, 0.558333),
    (0.919355, 0.730556),
    (1.0, 1.0),
];

/// Fade curve family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FadeShape {
    /// Straight line; the shape of freshly constructed default fades.
    #[default]
    Linear,
    /// Most of the gain change happens late (in) / early (out).
    Fast,
    /// Most of the gain change happens early (in) / late (out).
    Slow,
    /// Logarithmic, gentle knee.
    LogA,
    /// Logarithmic, hard knee.
    LogB,
}

impl FadeShape {
    /// All shapes in declaration order.
    pub const ALL: [FadeShape; 5] = [
        FadeShape::Linear,
        FadeShape::Fast,
        FadeShape::Slow,
        FadeShape::LogA,
        FadeShape::LogB,
    ];

    /// Get the name of this shape
    pub fn name(&self) -> &'static str {
        match self {
            FadeShape::Linear => "Linear",
            FadeShape::Fast => "Fast",
            FadeShape::Slow => "Slow",
            FadeShape::LogA => "LogA",
            FadeShape::LogB => "LogB",
        }
    }

    fn table(self) -> &'static [Breakpoint] {
        match self {
            FadeShape::Linear => LINEAR,
            FadeShape::Fast => FAST,
            FadeShape::Slow => SLOW,
            FadeShape::LogA => LOG_A,
            FadeShape::LogB => LOG_B,
        }
    }
}

/// Which end of the region a fade sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FadeDirection {
    In,
    Out,
}

/// Build a fade curve of `length` frames from a shape table.
///
/// Fade-in curves rise from `(0, 0)` to `(length, 1)`; fade-out curves fall
/// from `(0, 1)` to `(length, 0)` by reading the same table reflected in
/// time. Breakpoints that collapse onto the same frame at short lengths are
/// merged so the result stays strictly increasing in time, and the endpoints
/// always land exactly on 0 and `length` with exact terminal values.
///
/// Panics if `length` is zero; callers clamp fades to `region_length - 1`
/// before getting here.
pub fn build_fade(shape: FadeShape, length: u64, direction: FadeDirection) -> Curve {
    assert!(length > 0, "fade length must be nonzero");
    let table = shape.table();

    // Scale onto [0, length], dropping rounding collisions (first wins so
    // the 0-frame endpoint keeps its exact boundary value).
    let mut scaled: Vec<(u64, Sample)> = Vec::with_capacity(table.len());
    let push = |when: u64, value: Sample, scaled: &mut Vec<(u64, Sample)>| {
        if scaled.last().map(|&(w, _)| when > w).unwrap_or(true) {
            scaled.push((when, value));
        }
    };
    match direction {
        FadeDirection::In => {
            for &(t, v) in table {
                push(snap(t, length), v, &mut scaled);
            }
        }
        FadeDirection::Out => {
            for &(t, v) in table.iter().rev() {
                push(snap(1.0 - t, length), v, &mut scaled);
            }
        }
    }

    // Rounding at short lengths can swallow the final breakpoint; the curve
    // must still terminate on the exact boundary value.
    let terminal = match direction {
        FadeDirection::In => table[table.len() - 1].1,
        FadeDirection::Out => table[0].1,
    };
    match scaled.last_mut() {
        Some(last) if last.0 == length => last.1 = terminal,
        _ => scaled.push((length, terminal)),
    }

    Curve::from_points(scaled)
}

#[inline]
fn snap(frac: f32, length: u64) -> u64 {
    if frac <= 0.0 {
        0
    } else if frac >= 1.0 {
        length
    } else {
        (frac as f64 * length as f64).round() as u64
    }
}
