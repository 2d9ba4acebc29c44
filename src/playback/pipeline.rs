//! Channel-decode pipeline
//!
//! Stateless, swappable strategies that transform source-channel frames
//! into device-channel frames. Each variant is a pure function of
//! (input frame, channel format); no variant keeps state between blocks,
//! which is what makes block-granularity swaps trivially safe.
//!
//! Channel-count compatibility is checked at assignment time via
//! [`DecoderVariant::validate`]; the per-frame decode never fails.

use crate::audio::types::{AudioBuffer, ChannelFormat};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// First-order UHJ stereo decode coefficients.
///
/// Real part of the classic UHJ encoding equations:
///   S = 0.9396926*W + 0.1855740*X
///   D = 0.6554516*Y
///   L = (S + D) / 2,  R = (S - D) / 2
/// The phase-shifted terms are omitted to keep the decode a fixed linear
/// matrix; L+R carries no Y, so the pair stays mono-compatible.
const UHJ_S_W: f32 = 0.939_692_6;
const UHJ_S_X: f32 = 0.185_574_0;
const UHJ_D_Y: f32 = 0.655_451_6;

/// SN3D gain for first-order directional channels of an N3D source.
const SN3D_DIRECTIONAL: f32 = 0.577_350_27;

/// Restores unity gain on FuMa's -3 dB omni channel.
const FUMA_OMNI: f32 = std::f32::consts::SQRT_2;

/// A channel-decode strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecoderVariant {
    /// Direct channel copy: min(source, device) channels pass through,
    /// extra device channels are zero-filled, extra source channels are
    /// dropped. The permissive default.
    Raw,

    /// First-order B-format to 2-channel UHJ stereo downmix.
    /// Requires a 3- or 4-channel source.
    StereoUhj,

    /// Loudspeaker-array ambisonic decode. Registered extension point;
    /// assignment fails with NotImplemented so the gap stays visible
    /// instead of masquerading as passthrough audio.
    Ambisonics,
}

impl DecoderVariant {
    pub fn name(&self) -> &'static str {
        match self {
            DecoderVariant::Raw => "Raw",
            DecoderVariant::StereoUhj => "StereoUhj",
            DecoderVariant::Ambisonics => "Ambisonics",
        }
    }

    /// Check this variant against a source channel layout.
    ///
    /// Called at decoder-assignment time, never inside the callback, so a
    /// failed assignment commits nothing.
    pub fn validate(&self, source_channels: usize) -> Result<()> {
        match self {
            DecoderVariant::Raw => Ok(()),
            DecoderVariant::StereoUhj => {
                // Horizontal-only (WXY) or full (WXYZ) first-order B-format
                if source_channels == 3 || source_channels == 4 {
                    Ok(())
                } else {
                    Err(Error::UnsupportedChannelCount {
                        decoder: self.name(),
                        channels: source_channels,
                    })
                }
            }
            DecoderVariant::Ambisonics => Err(Error::NotImplemented(
                "Ambisonics loudspeaker decode is not implemented".to_string(),
            )),
        }
    }

    /// Decode one source frame into one device frame.
    ///
    /// `out` is the interleaved device frame (`device_channels` samples).
    /// Runs on the real-time path: no allocation, no locking, no failure.
    #[inline]
    pub fn decode_frame(
        &self,
        buffer: &AudioBuffer,
        frame: usize,
        channel_format: ChannelFormat,
        out: &mut [f32],
    ) {
        match self {
            DecoderVariant::Raw => {
                let source_channels = buffer.channel_count;
                for (ch, sample) in out.iter_mut().enumerate() {
                    *sample = if ch < source_channels {
                        buffer.sample(frame, ch)
                    } else {
                        0.0
                    };
                }
            }
            DecoderVariant::StereoUhj => {
                let (w, x, y) = canonical_wxy(buffer, frame, channel_format);
                let s = UHJ_S_W * w + UHJ_S_X * x;
                let d = UHJ_D_Y * y;

                if let Some(left) = out.get_mut(0) {
                    *left = 0.5 * (s + d);
                }
                if let Some(right) = out.get_mut(1) {
                    *right = 0.5 * (s - d);
                }
                for sample in out.iter_mut().skip(2) {
                    *sample = 0.0;
                }
            }
            DecoderVariant::Ambisonics => {
                // validate() rejects assignment, so the callback never
                // reaches this arm; render silence rather than passthrough.
                out.fill(0.0);
            }
        }
    }
}

impl std::fmt::Display for DecoderVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Reorder and rescale one source frame into canonical (W, X, Y).
///
/// ACN sources arrive as (W, Y, Z, X), or (W, Y, X) horizontal-only,
/// with N3D normalization; directional channels get the SN3D gain. FuMa
/// sources are already (W, X, Y[, Z]) ordered; only the omni channel is
/// rescaled. Z never contributes to the horizontal stereo decode.
#[inline]
fn canonical_wxy(buffer: &AudioBuffer, frame: usize, format: ChannelFormat) -> (f32, f32, f32) {
    match format {
        ChannelFormat::Acn => {
            let w = buffer.sample(frame, 0);
            let (x, y) = if buffer.channel_count >= 4 {
                (buffer.sample(frame, 3), buffer.sample(frame, 1))
            } else {
                (buffer.sample(frame, 2), buffer.sample(frame, 1))
            };
            (w, x * SN3D_DIRECTIONAL, y * SN3D_DIRECTIONAL)
        }
        ChannelFormat::FuMa => (
            buffer.sample(frame, 0) * FUMA_OMNI,
            buffer.sample(frame, 1),
            buffer.sample(frame, 2),
        ),
    }
}
