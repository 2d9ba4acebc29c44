//! Transport state machine types

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU8, Ordering};

/// Transport state
///
/// Valid transitions:
/// - Stopped|Paused -> Playing (play)
/// - Playing -> Paused (pause)
/// - Playing|Paused -> Stopped (stop, or end of buffer)
///
/// Stopped and Paused both render silence in the callback; the difference
/// is intent. Paused resumes from the frozen position, Stopped is a halt
/// (position is preserved either way, stopping never rewinds).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum TransportState {
    Stopped = 0,
    Playing = 1,
    Paused = 2,
}

impl TransportState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => TransportState::Playing,
            2 => TransportState::Paused,
            _ => TransportState::Stopped,
        }
    }
}

impl std::fmt::Display for TransportState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportState::Stopped => write!(f, "stopped"),
            TransportState::Playing => write!(f, "playing"),
            TransportState::Paused => write!(f, "paused"),
        }
    }
}

/// Lock-free transport cell shared between the control path and the
/// audio callback.
///
/// The callback reads it every block, so it must never take a lock.
#[derive(Debug)]
pub struct AtomicTransport(AtomicU8);

impl AtomicTransport {
    pub fn new(state: TransportState) -> Self {
        Self(AtomicU8::new(state as u8))
    }

    pub fn load(&self) -> TransportState {
        TransportState::from_u8(self.0.load(Ordering::Acquire))
    }

    /// Store a new state, returning the previous one.
    pub fn swap(&self, state: TransportState) -> TransportState {
        TransportState::from_u8(self.0.swap(state as u8, Ordering::AcqRel))
    }

    /// Transition only if the current state matches `from`.
    ///
    /// Used by the callback's auto-stop so it cannot clobber a command
    /// that raced in between blocks. Returns true if the swap happened.
    pub fn compare_swap(&self, from: TransportState, to: TransportState) -> bool {
        self.0
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

impl Default for AtomicTransport {
    fn default() -> Self {
        Self::new(TransportState::Stopped)
    }
}
