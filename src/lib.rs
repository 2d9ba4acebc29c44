//! # ambiplayer
//!
//! Playback engine for multichannel ambisonic audio files.
//!
//! **Purpose:** Load a file into memory, stream it to a selectable cpal
//! output device in a real-time pull callback, and decode the source
//! channel layout into the device's channels with a swappable strategy
//! (Raw passthrough, Stereo UHJ downmix, and an Ambisonics extension
//! point).
//!
//! **Architecture:** A control path (the [`playback::PlaybackEngine`]
//! command surface) and a hardware-driven streaming path (the device
//! callback pulling blocks from [`playback::StreamCore`]) share state at
//! block granularity; commands commit and return immediately, the
//! callback never blocks. Progress and failures are broadcast on the
//! [`events::EventBus`].

pub mod audio;
pub mod config;
pub mod error;
pub mod events;
pub mod playback;

pub use audio::{AudioBuffer, ChannelFormat, FileSource};
pub use config::PlayerConfig;
pub use error::{Error, Result};
pub use events::{EventBus, PlayerEvent};
pub use playback::{DecoderVariant, PlaybackEngine, TransportState};
