//! Playback engine - command surface and orchestration
//!
//! Owns the shared [`StreamCore`] and the attached output sink. Every
//! command commits new control state and returns immediately; effects
//! are observed by the streaming path on its next block. The engine runs
//! headless (no sink) until [`PlaybackEngine::set_device`] is called;
//! test harnesses pull blocks straight from the core instead.

use crate::audio::loader::FileSource;
use crate::audio::output::AudioOutput;
use crate::audio::types::{AudioBuffer, ChannelFormat};
use crate::error::Result;
use crate::events::{EventBus, PlayerEvent};
use crate::playback::pipeline::DecoderVariant;
use crate::playback::state::TransportState;
use crate::playback::stream::StreamCore;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info, warn};

/// Transport state machine and streaming coordinator.
pub struct PlaybackEngine {
    core: Arc<StreamCore>,
    events: EventBus,
    output: Option<AudioOutput>,
    /// Requested device name (None = default), kept for re-attachment
    device_name: Option<String>,
    /// Master volume shared with every attached output
    volume: Arc<Mutex<f32>>,
    current_track: Option<PathBuf>,
}

impl PlaybackEngine {
    pub fn new(events: EventBus) -> Self {
        Self {
            core: Arc::new(StreamCore::new(events.clone())),
            events,
            output: None,
            device_name: None,
            volume: Arc::new(Mutex::new(1.0)),
            current_track: None,
        }
    }

    // ------------------------------------------------------------------
    // Loading
    // ------------------------------------------------------------------

    /// Load a file and commit it as the current track.
    ///
    /// Resets position to 0, unsets the decoder, forces Stopped. The
    /// engine's current channel-format selection is recorded on the
    /// buffer for StereoUhj. On failure the prior track stays committed.
    pub fn open(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let source = FileSource::load(path.as_ref(), self.core.channel_format())?;
        let buffer = source.buffer();

        self.core.install_buffer(Arc::clone(&buffer));
        self.current_track = Some(source.path().to_path_buf());

        self.events.emit_lossy(PlayerEvent::TrackLoaded {
            path: source.path().to_path_buf(),
            frames: buffer.frame_count(),
            sample_rate: buffer.sample_rate,
            channels: buffer.channel_count,
            timestamp: chrono::Utc::now(),
        });

        // The stream runs at the source rate; a sink opened for the
        // previous track may need re-opening for this one.
        self.reattach_if_rate_changed();

        Ok(())
    }

    /// Commit an already-decoded PCM buffer as the current track.
    ///
    /// Same commit path as [`PlaybackEngine::open`], for callers (and
    /// tests) that hold decoded audio without a file behind it.
    pub fn open_buffer(&mut self, buffer: AudioBuffer) {
        self.core.install_buffer(Arc::new(buffer));
        self.current_track = None;
        self.reattach_if_rate_changed();
    }

    // ------------------------------------------------------------------
    // Transport
    // ------------------------------------------------------------------

    /// Begin or resume streaming from the current position.
    pub fn play(&self) {
        if !self.core.has_buffer() {
            warn!("play ignored: no track loaded");
            return;
        }
        let old = self.core.commit_transport(TransportState::Playing);
        if old != TransportState::Playing {
            info!("Transport: {} -> playing at frame {}", old, self.core.position());
        }
    }

    /// Suspend streaming without resetting position.
    pub fn pause(&self) {
        if self
            .core
            .commit_transport_from(TransportState::Playing, TransportState::Paused)
        {
            info!("Transport: playing -> paused at frame {}", self.core.position());
        } else {
            debug!("pause ignored: transport not playing");
        }
    }

    /// Halt streaming. Position is left where it is; stopping is a
    /// mute, not a rewind.
    pub fn stop(&self) {
        let old = self.core.commit_transport(TransportState::Stopped);
        if old != TransportState::Stopped {
            info!("Transport: {} -> stopped at frame {}", old, self.core.position());
        }
    }

    // ------------------------------------------------------------------
    // Sink and pipeline swaps
    // ------------------------------------------------------------------

    /// Swap the output sink, preserving position and transport exactly.
    ///
    /// `None` selects the default device. The old sink detaches only
    /// once the new one is live, so the handoff loses at most one block
    /// to silence. On failure the error is also reported asynchronously
    /// as an error event and the transport is forced Stopped.
    pub fn set_device(&mut self, device_name: Option<&str>) -> Result<()> {
        let preferred_rate = self.core.source_sample_rate();
        match self.attach(device_name, preferred_rate) {
            Ok(()) => Ok(()),
            Err(e) => {
                self.core.fail(&e);
                Err(e)
            }
        }
    }

    /// Swap the decode strategy; takes effect at the next block, with no
    /// crossfade. Fails without committing anything if the variant
    /// rejects the loaded source's channel layout.
    pub fn set_decoder(&self, variant: DecoderVariant) -> Result<()> {
        let channels = self.core.source_channels().unwrap_or(0);
        variant.validate(channels)?;

        self.core.install_decoder(variant);
        info!("Decoder set to {} ({} source channels)", variant, channels);
        Ok(())
    }

    /// Select the ambisonic channel convention for subsequent StereoUhj
    /// decodes.
    pub fn set_channel_format(&self, format: ChannelFormat) {
        self.core.install_channel_format(format);
        info!("Channel format set to {}", format);
    }

    /// Set master volume (clamped to 0.0..=1.0).
    pub fn set_volume(&self, volume: f32) {
        let clamped = volume.clamp(0.0, 1.0);
        *self.volume.lock().unwrap_or_else(PoisonError::into_inner) = clamped;
        debug!("Volume set to {:.2}", clamped);
    }

    pub fn volume(&self) -> f32 {
        *self.volume.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ------------------------------------------------------------------
    // Getters
    // ------------------------------------------------------------------

    pub fn transport(&self) -> TransportState {
        self.core.transport()
    }

    /// Current playback position in frames.
    pub fn position_frames(&self) -> usize {
        self.core.position()
    }

    pub fn current_track(&self) -> Option<&Path> {
        self.current_track.as_deref()
    }

    pub fn active_decoder(&self) -> Option<DecoderVariant> {
        self.core.active_decoder()
    }

    /// Name of the attached output device, if any.
    pub fn device_name(&self) -> Option<String> {
        self.output.as_ref().map(|o| o.device_name())
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Shared handle to the streaming core.
    ///
    /// This is the pull side of the engine: the attached device's
    /// callback and hardware-free test harnesses both drain it.
    pub fn stream_core(&self) -> Arc<StreamCore> {
        Arc::clone(&self.core)
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn attach(&mut self, device_name: Option<&str>, preferred_rate: Option<u32>) -> Result<()> {
        let mut output =
            AudioOutput::open(device_name, preferred_rate, Arc::clone(&self.volume))?;
        output.start(self.stream_core())?;

        let device = output.device_name();
        self.output = Some(output);
        self.device_name = device_name.map(String::from);

        self.events.emit_lossy(PlayerEvent::DeviceChanged {
            device,
            timestamp: chrono::Utc::now(),
        });
        Ok(())
    }

    /// Re-open the attached sink when the new track's rate differs from
    /// the running stream's. Failure is reported asynchronously (the
    /// transport is already Stopped after a load commit).
    fn reattach_if_rate_changed(&mut self) {
        let Some(rate) = self.core.source_sample_rate() else {
            return;
        };
        let Some(output) = &self.output else {
            return;
        };
        if output.sample_rate() == rate {
            return;
        }

        let name = self.device_name.clone();
        if let Err(e) = self.attach(name.as_deref(), Some(rate)) {
            warn!("failed to re-open device at {} Hz: {}", rate, e);
            self.core.fail(&e);
        }
    }
}

impl Default for PlaybackEngine {
    fn default() -> Self {
        Self::new(EventBus::default())
    }
}
