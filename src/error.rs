//! Error types for ambiplayer
//!
//! Defines the playback failure taxonomy using thiserror for clear error
//! propagation. Load-time and decoder-assignment errors are returned
//! synchronously and commit no state; streaming and device errors are
//! delivered asynchronously as [`crate::events::PlayerEvent::Error`] and
//! force the transport to Stopped.

use thiserror::Error;

/// Main error type for ambiplayer
#[derive(Error, Debug)]
pub enum Error {
    /// File container or encoding the loader cannot decode
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// Decoder variant incompatible with the source channel layout
    #[error("{decoder} decoder does not support {channels}-channel sources")]
    UnsupportedChannelCount {
        decoder: &'static str,
        channels: usize,
    },

    /// Output sink could not be opened or started
    #[error("Device unavailable: {0}")]
    DeviceUnavailable(String),

    /// Real-time deadline miss; silence filled the affected block
    #[error("Buffer underrun")]
    BufferUnderrun,

    /// Decode variant registered but not implemented
    #[error("Not implemented: {0}")]
    NotImplemented(String),

    /// Configuration file loading errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Stable kind string carried in error events.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::UnsupportedFormat(_) => "unsupported_format",
            Error::UnsupportedChannelCount { .. } => "unsupported_channel_count",
            Error::DeviceUnavailable(_) => "device_unavailable",
            Error::BufferUnderrun => "buffer_underrun",
            Error::NotImplemented(_) => "not_implemented",
            Error::Config(_) => "config",
            Error::Io(_) => "io",
        }
    }
}

/// Convenience Result type using ambiplayer Error
pub type Result<T> = std::result::Result<T, Error>;
