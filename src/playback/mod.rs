//! Playback engine, transport state, and the channel-decode pipeline

pub mod engine;
pub mod pipeline;
pub mod state;
pub mod stream;

pub use engine::PlaybackEngine;
pub use pipeline::DecoderVariant;
pub use state::TransportState;
pub use stream::StreamCore;
