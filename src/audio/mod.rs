//! Audio data types, file loading, and device output

pub mod loader;
pub mod output;
pub mod types;

pub use loader::FileSource;
pub use output::AudioOutput;
pub use types::{AudioBuffer, ChannelFormat};
