//! Audio output using cpal
//!
//! Wraps one cpal output stream over a shared [`StreamCore`]. The device
//! pulls blocks on its real-time thread; everything here besides the
//! callback body is control-path setup. Swapping devices is done by the
//! engine: it opens a new `AudioOutput` over the same core and drops the
//! old one, so position and transport carry over untouched.

use crate::error::{Error, Result};
use crate::playback::stream::StreamCore;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleFormat, Stream, StreamConfig};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, error, info};

/// Audio output manager using cpal.
pub struct AudioOutput {
    device: Device,
    config: StreamConfig,
    sample_format: SampleFormat,
    stream: Option<Stream>,
    /// Master volume, shared with the engine; read in the audio callback.
    volume: Arc<Mutex<f32>>,
}

impl AudioOutput {
    /// List the names of addressable output devices.
    pub fn list_devices() -> Result<Vec<String>> {
        let host = cpal::default_host();

        let devices: Vec<String> = host
            .output_devices()
            .map_err(|e| Error::DeviceUnavailable(format!("failed to enumerate devices: {}", e)))?
            .filter_map(|device| device.name().ok())
            .collect();

        debug!("Found {} output devices", devices.len());
        Ok(devices)
    }

    /// Open an output device.
    ///
    /// # Arguments
    /// - `device_name`: device to open (None = default device)
    /// - `preferred_rate`: source sample rate to run the stream at, if
    ///   the device supports it (no resampling happens downstream)
    /// - `volume`: master volume shared with the engine
    ///
    /// # Errors
    /// `DeviceUnavailable` if the device does not exist or exposes no
    /// usable configuration.
    pub fn open(
        device_name: Option<&str>,
        preferred_rate: Option<u32>,
        volume: Arc<Mutex<f32>>,
    ) -> Result<Self> {
        let host = cpal::default_host();

        let device = match device_name {
            Some(name) => {
                let mut devices = host.output_devices().map_err(|e| {
                    Error::DeviceUnavailable(format!("failed to enumerate devices: {}", e))
                })?;
                devices
                    .find(|d| d.name().ok().as_deref() == Some(name))
                    .ok_or_else(|| {
                        Error::DeviceUnavailable(format!("device '{}' not found", name))
                    })?
            }
            None => host.default_output_device().ok_or_else(|| {
                Error::DeviceUnavailable("no default output device".to_string())
            })?,
        };

        let (config, sample_format) = Self::pick_config(&device, preferred_rate)?;

        info!(
            "Opened audio device '{}': {} ch, {} Hz, {:?}",
            device.name().unwrap_or_else(|_| "Unknown".to_string()),
            config.channels,
            config.sample_rate.0,
            sample_format,
        );

        Ok(Self {
            device,
            config,
            sample_format,
            stream: None,
            volume,
        })
    }

    /// Pick a stream configuration, preferring f32 at the source rate.
    ///
    /// Falls back to the device default config when nothing matches; in
    /// that case playback runs at whatever rate the device gives us.
    fn pick_config(
        device: &Device,
        preferred_rate: Option<u32>,
    ) -> Result<(StreamConfig, SampleFormat)> {
        if let Some(rate) = preferred_rate {
            let supported = device.supported_output_configs().map_err(|e| {
                Error::DeviceUnavailable(format!("failed to get device configs: {}", e))
            })?;

            let mut candidates: Vec<_> = supported
                .filter(|c| c.min_sample_rate().0 <= rate && c.max_sample_rate().0 >= rate)
                .collect();
            // f32 first, then widest channel layout
            candidates.sort_by_key(|c| {
                (c.sample_format() != SampleFormat::F32, std::cmp::Reverse(c.channels()))
            });

            if let Some(range) = candidates.into_iter().next() {
                let sample_format = range.sample_format();
                let config = range.with_sample_rate(cpal::SampleRate(rate)).config();
                return Ok((config, sample_format));
            }
            debug!("device does not support {} Hz, using default config", rate);
        }

        let supported = device.default_output_config().map_err(|e| {
            Error::DeviceUnavailable(format!("failed to get default config: {}", e))
        })?;

        let sample_format = supported.sample_format();
        Ok((supported.config(), sample_format))
    }

    /// Start pulling blocks from the core.
    ///
    /// The callback runs on the device's real-time thread; stream errors
    /// are routed to the core, which emits the error event and forces
    /// Stopped.
    pub fn start(&mut self, core: Arc<StreamCore>) -> Result<()> {
        let stream = match self.sample_format {
            SampleFormat::F32 => self.build_stream::<f32>(core)?,
            SampleFormat::I16 => self.build_stream::<i16>(core)?,
            SampleFormat::U16 => self.build_stream::<u16>(core)?,
            sample_format => {
                return Err(Error::DeviceUnavailable(format!(
                    "unsupported sample format: {:?}",
                    sample_format
                )));
            }
        };

        stream
            .play()
            .map_err(|e| Error::DeviceUnavailable(format!("failed to start stream: {}", e)))?;

        self.stream = Some(stream);
        info!("Audio stream started");
        Ok(())
    }

    fn build_stream<T: cpal::SizedSample + cpal::FromSample<f32>>(
        &self,
        core: Arc<StreamCore>,
    ) -> Result<Stream> {
        let channels = self.config.channels as usize;
        let volume = Arc::clone(&self.volume);
        let error_core = Arc::clone(&core);

        // Scratch block reused across callbacks; capacity settles after
        // the first invocation, no steady-state allocation.
        let mut scratch: Vec<f32> = Vec::with_capacity(channels * 4096);

        let stream = self
            .device
            .build_output_stream(
                &self.config,
                move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                    scratch.resize(data.len(), 0.0);
                    core.fill(&mut scratch, channels);

                    let gain = *volume.lock().unwrap_or_else(PoisonError::into_inner);
                    for (out, &sample) in data.iter_mut().zip(scratch.iter()) {
                        *out = T::from_sample((sample * gain).clamp(-1.0, 1.0));
                    }
                },
                move |err| {
                    error!("Audio stream error: {}", err);
                    error_core.fail(&Error::DeviceUnavailable(err.to_string()));
                },
                None,
            )
            .map_err(|e| Error::DeviceUnavailable(format!("failed to build stream: {}", e)))?;

        Ok(stream)
    }

    /// Stop and drop the stream, detaching from the core.
    pub fn stop(&mut self) {
        if let Some(stream) = self.stream.take() {
            let _ = stream.pause();
            drop(stream);
            info!("Audio stream stopped");
        }
    }

    pub fn device_name(&self) -> String {
        self.device
            .name()
            .unwrap_or_else(|_| "Unknown".to_string())
    }

    pub fn sample_rate(&self) -> u32 {
        self.config.sample_rate.0
    }

    pub fn channels(&self) -> usize {
        self.config.channels as usize
    }
}

impl Drop for AudioOutput {
    fn drop(&mut self) {
        self.stop();
    }
}
