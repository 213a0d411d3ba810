//! Audio source abstraction
//!
//! Regions never own sample data; they hold shared references into sources
//! and describe a window onto them. The engine consumes sources through the
//! [`Source`] trait so production audio (disk-streamed, decoded, recorded)
//! stays outside this crate. [`MemorySource`] is the in-crate implementation:
//! whole-file audio held in memory, loadable from WAV, used by the analysis
//! binary and throughout the tests.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use thiserror::Error;

use crate::types::Sample;

/// Errors from loading audio data into a [`MemorySource`].
#[derive(Debug, Error)]
pub enum SourceLoadError {
    #[error("failed to open {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: hound::Error,
    },
    #[error("failed to decode {path}: {source}")]
    Decode {
        path: String,
        #[source]
        source: hound::Error,
    },
    #[error("unsupported format in {path}: {detail}")]
    UnsupportedFormat { path: String, detail: String },
}

/// Frame-addressable audio data backing one or more regions.
///
/// All channels of a source have the same length. `read` copies what exists
/// and returns the number of frames delivered; a short read means the
/// request ran past the end of the data, which the compositing path treats
/// as failure of the whole call.
pub trait Source: Send + Sync {
    /// Name for logs and error reports.
    fn name(&self) -> &str;

    /// Copy up to `dst.len()` frames of `channel` starting at frame `start`
    /// into `dst`. Returns the number of frames copied. A `channel` outside
    /// `0..n_channels()` yields 0.
    fn read(&self, dst: &mut [Sample], start: u64, channel: u32) -> usize;

    fn n_channels(&self) -> u32;

    /// Total length in frames.
    fn length(&self) -> u64;

    fn sample_rate(&self) -> u32;

    /// Whether a transient analysis pass has stored results for this source.
    fn has_been_analysed(&self) -> bool {
        false
    }

    /// Source-relative transient positions from a prior analysis pass.
    /// Meaningful only when [`has_been_analysed`](Self::has_been_analysed)
    /// returns true.
    fn cached_transients(&self) -> Vec<u64> {
        Vec::new()
    }
}

/// One playable channel: a shared source plus a channel index into it.
///
/// A region's channel list is a `Vec<SourceChannel>`, so region channel `n`
/// can map onto any channel of any source. [`channels_of`] builds the common
/// case of one source supplying all its channels in order.
#[derive(Clone)]
pub struct SourceChannel {
    source: Arc<dyn Source>,
    channel: u32,
}

impl SourceChannel {
    pub fn new(source: Arc<dyn Source>, channel: u32) -> Self {
        debug_assert!(channel < source.n_channels(), "channel out of range");
        Self { source, channel }
    }

    /// Copy frames from the underlying source channel. Same short-read
    /// contract as [`Source::read`].
    #[inline]
    pub fn read(&self, dst: &mut [Sample], start: u64) -> usize {
        self.source.read(dst, start, self.channel)
    }

    #[inline]
    pub fn source(&self) -> &Arc<dyn Source> {
        &self.source
    }

    #[inline]
    pub fn channel(&self) -> u32 {
        self.channel
    }
}

impl fmt::Debug for SourceChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceChannel")
            .field("source", &self.source.name())
            .field("channel", &self.channel)
            .finish()
    }
}

/// Expand a source into one [`SourceChannel`] per channel, in order.
pub fn channels_of(source: &Arc<dyn Source>) -> Vec<SourceChannel> {
    (0..source.n_channels())
        .map(|ch| SourceChannel::new(Arc::clone(source), ch))
        .collect()
}

/// Whole-file audio held in memory, one `Vec<Sample>` per channel.
#[derive(Debug, Clone)]
pub struct MemorySource {
    name: String,
    channels: Vec<Vec<Sample>>,
    sample_rate: u32,
    transients: Option<Vec<u64>>,
}

impl MemorySource {
    /// Build from per-channel sample data. All channels must be the same
    /// length.
    pub fn from_channels(
        name: impl Into<String>,
        channels: Vec<Vec<Sample>>,
        sample_rate: u32,
    ) -> Self {
        if let Some(first) = channels.first() {
            debug_assert!(
                channels.iter().all(|c| c.len() == first.len()),
                "channel lengths must match"
            );
        }
        Self {
            name: name.into(),
            channels,
            sample_rate,
            transients: None,
        }
    }

    /// Load a WAV file fully into memory.
    ///
    /// Accepts integer PCM (normalized to `[-1, 1]` by bit depth) and 32-bit
    /// float data.
    pub fn from_wav(path: impl AsRef<Path>) -> Result<Self, SourceLoadError> {
        let path = path.as_ref();
        let display = path.display().to_string();
        let mut reader = hound::WavReader::open(path).map_err(|e| SourceLoadError::Open {
            path: display.clone(),
            source: e,
        })?;
        let spec = reader.spec();
        if spec.channels == 0 {
            return Err(SourceLoadError::UnsupportedFormat {
                path: display,
                detail: "zero channels".to_string(),
            });
        }

        let n = spec.channels as usize;
        let frames = reader.duration() as usize;
        let mut channels: Vec<Vec<Sample>> = vec![Vec::with_capacity(frames); n];

        match spec.sample_format {
            hound::SampleFormat::Float => {
                for (i, s) in reader.samples::<f32>().enumerate() {
                    let s = s.map_err(|e| SourceLoadError::Decode {
                        path: display.clone(),
                        source: e,
                    })?;
                    channels[i % n].push(s);
                }
            }
            hound::SampleFormat::Int => {
                // Normalize by the nominal full scale of the bit depth
                let scale = 1.0 / (1i64 << (spec.bits_per_sample - 1)) as f32;
                for (i, s) in reader.samples::<i32>().enumerate() {
                    let s = s.map_err(|e| SourceLoadError::Decode {
                        path: display.clone(),
                        source: e,
                    })?;
                    channels[i % n].push(s as f32 * scale);
                }
            }
        }

        log::debug!(
            "source: loaded {} ({} ch, {} frames, {} Hz)",
            display,
            n,
            channels.first().map(|c| c.len()).unwrap_or(0),
            spec.sample_rate
        );

        Ok(Self {
            name: display,
            channels,
            sample_rate: spec.sample_rate,
            transients: None,
        })
    }

    /// Attach transient positions from an analysis pass. Call before sharing
    /// the source; `Arc`-wrapped sources are immutable.
    pub fn set_transients(&mut self, transients: Vec<u64>) {
        self.transients = Some(transients);
    }
}

impl Source for MemorySource {
    fn name(&self) -> &str {
        &self.name
    }

    fn read(&self, dst: &mut [Sample], start: u64, channel: u32) -> usize {
        let Some(data) = self.channels.get(channel as usize) else {
            return 0;
        };
        let len = data.len() as u64;
        if start >= len {
            return 0;
        }
        let avail = (len - start) as usize;
        let n = dst.len().min(avail);
        dst[..n].copy_from_slice(&data[start as usize..start as usize + n]);
        n
    }

    fn n_channels(&self) -> u32 {
        self.channels.len() as u32
    }

    fn length(&self) -> u64 {
        self.channels.first().map(|c| c.len() as u64).unwrap_or(0)
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn has_been_analysed(&self) -> bool {
        self.transients.is_some()
    }

    fn cached_transients(&self) -> Vec<u64> {
        self.transients.clone().unwrap_or_default()
    }
}
