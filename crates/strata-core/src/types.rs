//! Common types for Strata
//!
//! Fundamental scalar types and conversions shared by the compositing read
//! path, the gain engine, and the analysis passes. Timeline and source
//! positions are plain `u64` frame counts throughout the crate; buffer
//! lengths are `usize`.

/// Audio sample type (32-bit float end to end).
pub type Sample = f32;

/// Fallback sample rate when a source does not carry one (48kHz - standard
/// professional audio rate).
pub const SAMPLE_RATE: u32 = 48000;

/// Length in frames of a freshly constructed default fade (in and out).
pub const DEFAULT_FADE_LENGTH: u64 = 64;

/// Frames scanned per step by the streaming analysis passes
/// (peak scan, silence detection). 64Ki frames keeps cancellation latency
/// in the low milliseconds at common rates without hammering the source.
pub const ANALYSIS_BLOCK_FRAMES: usize = 64 * 1024;

/// Convert decibels to a linear gain factor.
///
/// # Example
/// ```
/// use strata_core::types::db_to_linear;
///
/// assert_eq!(db_to_linear(0.0), 1.0);
/// assert!((db_to_linear(-20.0) - 0.1).abs() < 1e-6);
/// ```
#[inline]
pub fn db_to_linear(db: f32) -> f32 {
    10.0_f32.powf(db / 20.0)
}

/// Convert a linear gain factor to decibels.
///
/// Zero and negative input map to negative infinity (digital silence).
#[inline]
pub fn linear_to_db(linear: f32) -> f32 {
    if linear > 0.0 {
        20.0 * linear.log10()
    } else {
        f32::NEG_INFINITY
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_db_linear_round_trip() {
        for db in [-60.0_f32, -20.0, -6.0, 0.0, 6.0, 12.0] {
            let back = linear_to_db(db_to_linear(db));
            assert!((back - db).abs() < 1e-4, "round trip failed for {} dB", db);
        }
    }

    #[test]
    fn test_db_to_linear_landmarks() {
        assert_eq!(db_to_linear(0.0), 1.0);
        assert!((db_to_linear(6.0) - 2.0).abs() < 0.01);
        assert!((db_to_linear(-6.0) - 0.5).abs() < 0.01);
    }

    #[test]
    fn test_linear_to_db_silence() {
        assert_eq!(linear_to_db(0.0), f32::NEG_INFINITY);
        assert_eq!(linear_to_db(-1.0), f32::NEG_INFINITY);
    }
}
