//! Core audio data types
//!
//! The whole file lives in RAM as one immutable buffer: playback reads it
//! at arbitrary frame positions with no disk access or decode work on the
//! real-time path.

use serde::{Deserialize, Serialize};

/// Channel ordering/normalization convention of an ambisonic source.
///
/// Only consulted by the StereoUhj decoder; Raw ignores it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelFormat {
    /// ACN channel order (W, Y, Z, X for first order)
    Acn,
    /// FuMa channel order (W, X, Y, Z) with its -3 dB omni scaling
    FuMa,
}

impl Default for ChannelFormat {
    fn default() -> Self {
        ChannelFormat::Acn
    }
}

impl std::fmt::Display for ChannelFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChannelFormat::Acn => write!(f, "ACN"),
            ChannelFormat::FuMa => write!(f, "FuMa"),
        }
    }
}

/// AudioBuffer holds a fully decoded file, immutable after load.
///
/// **Format:**
/// - Samples are f32 (floating point -1.0 to 1.0)
/// - Interleaved by frame: [c0, c1, .., cN, c0, c1, ..]
/// - Channel count and sample rate are whatever the file carried;
///   playback runs at the source rate, no resampling
#[derive(Debug, Clone)]
pub struct AudioBuffer {
    /// PCM audio samples (interleaved)
    pub samples: Vec<f32>,

    /// Number of channels per frame
    pub channel_count: usize,

    /// Native sample rate of the source
    pub sample_rate: u32,

    /// Channel convention tag recorded at load time
    pub channel_format: ChannelFormat,
}

impl AudioBuffer {
    /// Create a new AudioBuffer from decoded audio data.
    ///
    /// Trailing samples that do not fill a whole frame are dropped.
    pub fn new(
        mut samples: Vec<f32>,
        channel_count: usize,
        sample_rate: u32,
        channel_format: ChannelFormat,
    ) -> Self {
        assert!(channel_count > 0, "channel_count must be non-zero");
        let whole = (samples.len() / channel_count) * channel_count;
        samples.truncate(whole);

        Self {
            samples,
            channel_count,
            sample_rate,
            channel_format,
        }
    }

    /// Total number of frames in the buffer.
    pub fn frame_count(&self) -> usize {
        self.samples.len() / self.channel_count
    }

    /// Duration in seconds.
    pub fn duration_seconds(&self) -> f64 {
        self.frame_count() as f64 / self.sample_rate as f64
    }

    /// Sample for one channel of one frame.
    ///
    /// Callers on the streaming path stay in bounds by construction; this
    /// returns 0.0 past the end rather than panicking.
    #[inline]
    pub fn sample(&self, frame: usize, channel: usize) -> f32 {
        if channel >= self.channel_count {
            return 0.0;
        }
        self.samples
            .get(frame * self.channel_count + channel)
            .copied()
            .unwrap_or(0.0)
    }

    /// One whole interleaved frame, if in bounds.
    pub fn frame(&self, frame: usize) -> Option<&[f32]> {
        let start = frame.checked_mul(self.channel_count)?;
        self.samples.get(start..start + self.channel_count)
    }
}
