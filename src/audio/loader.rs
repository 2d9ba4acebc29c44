//! File loading using symphonia
//!
//! Decodes a whole file eagerly into one [`AudioBuffer`]: memory is
//! traded for seek-free access and deterministic callback latency. No
//! on-the-fly disk decode ever happens on the real-time path.
//!
//! All channels are preserved as-is (no downmix here; channel math is
//! the decode pipeline's job) and every symphonia sample format is
//! converted to interleaved f32.

use crate::audio::types::{AudioBuffer, ChannelFormat};
use crate::error::{Error, Result};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use symphonia::core::audio::{AudioBufferRef, AudioPlanes, Signal};
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::core::sample::Sample;
use tracing::{info, warn};

/// A fully loaded audio file.
///
/// Stateless once loaded; the engine takes a shared reference to the
/// buffer and this handle keeps the source path for reporting.
#[derive(Debug)]
pub struct FileSource {
    path: PathBuf,
    buffer: Arc<AudioBuffer>,
}

impl FileSource {
    /// Load a file's full sample data into memory.
    ///
    /// `channel_format` is the caller-selected (or defaulted) ambisonic
    /// convention tag recorded on the buffer for the UHJ decoder.
    ///
    /// # Errors
    /// - `Io` if the file cannot be opened
    /// - `UnsupportedFormat` for containers or encodings symphonia
    ///   cannot decode, or files with no audio track
    pub fn load(path: impl AsRef<Path>, channel_format: ChannelFormat) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;

        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        // Hint the probe with the file extension
        let mut hint = Hint::new();
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            hint.with_extension(ext);
        }

        let probed = symphonia::default::get_probe()
            .format(
                &hint,
                mss,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|e| Error::UnsupportedFormat(format!("probe failed: {}", e)))?;

        let mut format = probed.format;

        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| Error::UnsupportedFormat("no audio track found".to_string()))?;

        let track_id = track.id;
        let codec_params = track.codec_params.clone();
        let sample_rate = codec_params.sample_rate.unwrap_or(44100);
        let mut channel_count = codec_params.channels.map(|c| c.count());

        let mut decoder = symphonia::default::get_codecs()
            .make(&codec_params, &DecoderOptions::default())
            .map_err(|e| Error::UnsupportedFormat(format!("unsupported codec: {}", e)))?;

        let mut samples: Vec<f32> = Vec::new();
        if let (Some(frames), Some(channels)) = (codec_params.n_frames, channel_count) {
            samples.reserve(frames as usize * channels);
        }

        loop {
            let packet = match format.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(ref e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    break;
                }
                Err(SymphoniaError::ResetRequired) => {
                    decoder.reset();
                    continue;
                }
                Err(e) => {
                    return Err(Error::UnsupportedFormat(format!("packet read failed: {}", e)))
                }
            };

            if packet.track_id() != track_id {
                continue;
            }

            match decoder.decode(&packet) {
                Ok(decoded) => {
                    if channel_count.is_none() {
                        channel_count = Some(decoded.spec().channels.count());
                    }
                    append_interleaved(&mut samples, &decoded);
                }
                Err(SymphoniaError::DecodeError(e)) => {
                    // Corrupt packet; skip it and keep going
                    warn!("decode error in {}: {} (skipping packet)", path.display(), e);
                    continue;
                }
                Err(e) => return Err(Error::UnsupportedFormat(format!("decode failed: {}", e))),
            }
        }

        let channel_count = channel_count
            .filter(|&c| c > 0)
            .ok_or_else(|| Error::UnsupportedFormat("unknown channel layout".to_string()))?;

        if samples.is_empty() {
            return Err(Error::UnsupportedFormat(
                "file contains no audio data".to_string(),
            ));
        }

        let buffer = AudioBuffer::new(samples, channel_count, sample_rate, channel_format);
        info!(
            "Loaded {}: {} frames, {} ch, {} Hz, {:.1}s ({})",
            path.display(),
            buffer.frame_count(),
            buffer.channel_count,
            buffer.sample_rate,
            buffer.duration_seconds(),
            channel_format,
        );

        Ok(Self {
            path: path.to_path_buf(),
            buffer: Arc::new(buffer),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Shared handle to the decoded buffer.
    pub fn buffer(&self) -> Arc<AudioBuffer> {
        Arc::clone(&self.buffer)
    }
}

/// Append one decoded packet to `dst` as interleaved f32, preserving the
/// source channel count.
fn append_interleaved(dst: &mut Vec<f32>, decoded: &AudioBufferRef) {
    match decoded {
        AudioBufferRef::F32(b) => interleave(dst, b.planes(), b.frames(), |s: f32| s),
        AudioBufferRef::F64(b) => interleave(dst, b.planes(), b.frames(), |s: f64| s as f32),
        AudioBufferRef::S8(b) => {
            interleave(dst, b.planes(), b.frames(), |s: i8| s as f32 / 128.0)
        }
        AudioBufferRef::S16(b) => {
            interleave(dst, b.planes(), b.frames(), |s: i16| s as f32 / 32768.0)
        }
        AudioBufferRef::S24(b) => interleave(dst, b.planes(), b.frames(), |s| {
            s.inner() as f32 / 8388608.0
        }),
        AudioBufferRef::S32(b) => interleave(dst, b.planes(), b.frames(), |s: i32| {
            s as f32 / 2147483648.0
        }),
        AudioBufferRef::U8(b) => interleave(dst, b.planes(), b.frames(), |s: u8| {
            (s as f32 - 128.0) / 128.0
        }),
        AudioBufferRef::U16(b) => interleave(dst, b.planes(), b.frames(), |s: u16| {
            (s as f32 - 32768.0) / 32768.0
        }),
        AudioBufferRef::U24(b) => interleave(dst, b.planes(), b.frames(), |s| {
            (s.inner() as f32 - 8388608.0) / 8388608.0
        }),
        AudioBufferRef::U32(b) => interleave(dst, b.planes(), b.frames(), |s: u32| {
            ((s as f64 - 2147483648.0) / 2147483648.0) as f32
        }),
    }
}

fn interleave<T: Sample + Copy, F: Fn(T) -> f32>(
    dst: &mut Vec<f32>,
    planes: AudioPlanes<T>,
    frames: usize,
    convert: F,
) {
    let channels = planes.planes().len();
    if channels == 0 || frames == 0 {
        return;
    }

    dst.reserve(frames * channels);
    for frame in 0..frames {
        for plane in planes.planes() {
            dst.push(convert(plane[frame]));
        }
    }
}
