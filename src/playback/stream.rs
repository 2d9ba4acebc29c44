//! Shared streaming state and the real-time block-fill routine
//!
//! [`StreamCore`] is the synchronization boundary between the control
//! path (engine commands) and the streaming path (the output device's
//! callback). The callback side must never block and never allocate:
//! transport and position are atomics, and the pipeline mutex is only
//! ever held across value swaps. A snapshot is taken once per block and
//! the decode work happens outside the lock. If the lock is contended
//! the block renders silence and an underrun is reported, it does not
//! wait.

use crate::audio::types::{AudioBuffer, ChannelFormat};
use crate::error::Error;
use crate::events::{EventBus, PlayerEvent};
use crate::playback::pipeline::DecoderVariant;
use crate::playback::state::{AtomicTransport, TransportState};
use std::borrow::Cow;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Control state swapped in by engine commands, snapshotted per block by
/// the callback. The mutex around it is held only for the copy.
#[derive(Debug, Default)]
struct Pipeline {
    buffer: Option<Arc<AudioBuffer>>,
    decoder: Option<DecoderVariant>,
    channel_format: ChannelFormat,
}

/// Shared state between the control path and the streaming callback.
///
/// The engine owns an `Arc<StreamCore>`; every attached output stream
/// holds a clone, so swapping devices never disturbs position or
/// transport. Test harnesses drive [`StreamCore::fill`] directly in
/// place of a hardware callback.
pub struct StreamCore {
    transport: AtomicTransport,
    /// Current playback position in frames. Written by the callback
    /// while streaming, reset by `install_buffer`; always within
    /// `0..=frame_count`.
    position: AtomicUsize,
    pipeline: Mutex<Pipeline>,
    events: EventBus,
}

impl StreamCore {
    pub fn new(events: EventBus) -> Self {
        Self {
            transport: AtomicTransport::default(),
            position: AtomicUsize::new(0),
            pipeline: Mutex::new(Pipeline::default()),
            events,
        }
    }

    // ------------------------------------------------------------------
    // Control-path commits
    // ------------------------------------------------------------------

    /// Commit a new buffer: transport forces Stopped first, then the
    /// position rewinds to zero, then the pipeline swaps (decoder unset,
    /// format taken from the buffer). Stopping first keeps the callback
    /// on silence for the rest of the commit, so it can never pair a
    /// stale position with the incoming buffer and report a spurious
    /// end of file.
    pub fn install_buffer(&self, buffer: Arc<AudioBuffer>) {
        let format = buffer.channel_format;
        self.commit_transport(TransportState::Stopped);
        self.position.store(0, Ordering::Release);

        let mut pipeline = self.lock_pipeline();
        pipeline.buffer = Some(buffer);
        pipeline.decoder = None;
        pipeline.channel_format = format;
    }

    /// Swap the active decoder variant; visible to the callback at the
    /// next block boundary. Validation already happened in the engine.
    pub fn install_decoder(&self, decoder: DecoderVariant) {
        self.lock_pipeline().decoder = Some(decoder);
    }

    /// Swap the channel-format tag used by subsequent StereoUhj decodes.
    pub fn install_channel_format(&self, format: ChannelFormat) {
        self.lock_pipeline().channel_format = format;
    }

    /// Transition the transport, emitting StateChanged when it actually
    /// changed. Returns the previous state.
    pub fn commit_transport(&self, new_state: TransportState) -> TransportState {
        let old_state = self.transport.swap(new_state);
        if old_state != new_state {
            self.events.emit_lossy(PlayerEvent::StateChanged {
                old_state,
                new_state,
                timestamp: chrono::Utc::now(),
            });
        }
        old_state
    }

    /// Transition only if the transport currently matches `from`,
    /// emitting StateChanged on success. Lets commands like pause stay
    /// races-safe against the callback's auto-stop.
    pub fn commit_transport_from(&self, from: TransportState, to: TransportState) -> bool {
        if self.transport.compare_swap(from, to) {
            self.events.emit_lossy(PlayerEvent::StateChanged {
                old_state: from,
                new_state: to,
                timestamp: chrono::Utc::now(),
            });
            true
        } else {
            false
        }
    }

    /// Report an asynchronous streaming/device error and force Stopped.
    ///
    /// Shared by the cpal error callback and the engine's device-swap
    /// failure path; state stays consistent (position untouched).
    pub fn fail(&self, error: &Error) {
        self.events.emit_lossy(PlayerEvent::Error {
            kind: Cow::Borrowed(error.kind()),
            message: Cow::Owned(error.to_string()),
            timestamp: chrono::Utc::now(),
        });
        self.commit_transport(TransportState::Stopped);
    }

    // ------------------------------------------------------------------
    // Shared getters
    // ------------------------------------------------------------------

    pub fn transport(&self) -> TransportState {
        self.transport.load()
    }

    /// Current playback position in frames.
    pub fn position(&self) -> usize {
        self.position.load(Ordering::Acquire)
    }

    /// Channel count of the loaded buffer, if any.
    pub fn source_channels(&self) -> Option<usize> {
        self.lock_pipeline()
            .buffer
            .as_ref()
            .map(|b| b.channel_count)
    }

    /// Sample rate of the loaded buffer, if any.
    pub fn source_sample_rate(&self) -> Option<u32> {
        self.lock_pipeline().buffer.as_ref().map(|b| b.sample_rate)
    }

    /// Whether a buffer is currently loaded.
    pub fn has_buffer(&self) -> bool {
        self.lock_pipeline().buffer.is_some()
    }

    pub fn active_decoder(&self) -> Option<DecoderVariant> {
        self.lock_pipeline().decoder
    }

    pub fn channel_format(&self) -> ChannelFormat {
        self.lock_pipeline().channel_format
    }

    // ------------------------------------------------------------------
    // Streaming path
    // ------------------------------------------------------------------

    /// Fill one interleaved block for the output device.
    ///
    /// `data.len()` is `N * device_channels` for a block of N frames.
    /// Contract (invoked on the real-time thread):
    /// 1. Not Playing, or no buffer: silence. Never blocks, never errors.
    /// 2. Otherwise reads frames `[position, position + N)`, zero-padding
    ///    past the end of the buffer.
    /// 3. The pipeline snapshot is taken once, so a concurrent decoder or
    ///    format swap lands exactly on a block boundary.
    /// 4. Position advances by the real frames consumed; on reaching the
    ///    end, transport auto-stops and EndOfFile is emitted after this
    ///    block.
    pub fn fill(&self, data: &mut [f32], device_channels: usize) {
        if device_channels == 0 || data.is_empty() {
            return;
        }

        if self.transport.load() != TransportState::Playing {
            data.fill(0.0);
            return;
        }

        // Snapshot the pipeline without waiting: a contended lock means
        // the control path is mid-swap, so this block is silence and the
        // miss is reported as a non-fatal underrun.
        let (buffer, decoder, channel_format) = match self.pipeline.try_lock() {
            Ok(pipeline) => match pipeline.buffer.as_ref() {
                Some(buffer) => (
                    Arc::clone(buffer),
                    pipeline.decoder.unwrap_or(DecoderVariant::Raw),
                    pipeline.channel_format,
                ),
                None => {
                    data.fill(0.0);
                    return;
                }
            },
            Err(_) => {
                data.fill(0.0);
                self.emit_underrun();
                return;
            }
        };

        let frames = data.len() / device_channels;
        let total = buffer.frame_count();
        let position = self.position.load(Ordering::Acquire);
        let real = frames.min(total.saturating_sub(position));

        for i in 0..real {
            let out = &mut data[i * device_channels..(i + 1) * device_channels];
            decoder.decode_frame(&buffer, position + i, channel_format, out);
        }
        // Tail past the buffer end (and any ragged remainder) is silence
        data[real * device_channels..].fill(0.0);

        if real > 0 {
            self.position.store(position + real, Ordering::Release);
        }

        if position + real >= total {
            // compare_swap so a command racing in between blocks wins
            if self
                .transport
                .compare_swap(TransportState::Playing, TransportState::Stopped)
            {
                self.events.emit_lossy(PlayerEvent::EndOfFile {
                    timestamp: chrono::Utc::now(),
                });
                self.events.emit_lossy(PlayerEvent::StateChanged {
                    old_state: TransportState::Playing,
                    new_state: TransportState::Stopped,
                    timestamp: chrono::Utc::now(),
                });
            }
        }
    }

    /// Report a non-fatal deadline miss from the callback.
    ///
    /// Runs on the real-time thread: both event strings are borrowed
    /// statics, nothing is heap-allocated here.
    fn emit_underrun(&self) {
        self.events.emit_lossy(PlayerEvent::Error {
            kind: Cow::Borrowed(Error::BufferUnderrun.kind()),
            message: Cow::Borrowed("Buffer underrun"),
            timestamp: chrono::Utc::now(),
        });
    }

    fn lock_pipeline(&self) -> std::sync::MutexGuard<'_, Pipeline> {
        // Control-path lock. Poisoning is impossible in practice: no
        // holder panics while the guard is live.
        match self.pipeline.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
