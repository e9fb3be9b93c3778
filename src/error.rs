//! Error types for tessitura.

use crate::player::Transport;
use thiserror::Error;

/// Result type alias for tessitura operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while driving voices or playback.
#[derive(Debug, Error)]
pub enum Error {
    /// A voice handle addresses a slot that was never allocated.
    #[error("voice handle {handle:#x} is out of range ({slots} slots allocated)")]
    HandleOutOfRange { handle: u64, slots: usize },

    /// A voice handle whose slot has since been freed and recycled.
    #[error("voice handle {0:#x} is stale")]
    StaleHandle(u64),

    /// The audio backend refused a command.
    #[error("audio backend: {0}")]
    Backend(String),

    /// The transport command is not valid in the current state.
    #[error("cannot {operation} while {state:?}")]
    Transport {
        state: Transport,
        operation: &'static str,
    },

    /// Playback was started before any tracks were selected.
    #[error("playback has not been initialized")]
    NotInitialized,

    /// Standard MIDI File parsing error.
    #[error("MIDI file: {0}")]
    Smf(#[from] midly::Error),

    /// The MIDI file uses SMPTE timecode rather than metrical timing.
    #[error("MIDI file uses unsupported timecode timing")]
    UnsupportedTiming,

    /// I/O error (file operations).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
