//! Polyphonic voice management for sample-based MIDI playback.
//!
//! MIDI channel events are turned into voices playing on an [AudioBackend],
//! which owns the sample buffers and renders the audio. A [Player] drives a
//! [Sequence] through per-channel [ChannelInstrument]s in musical time.

pub use backend::*;
pub use channel::*;
pub use error::{Error, Result};
pub use instrument::*;
pub use midi::*;
pub use player::*;
pub use pool::*;
pub use sequence::*;
pub use tuning::*;
pub use voice::*;

mod backend;
mod channel;
mod error;
mod instrument;
mod midi;
mod player;
mod pool;
mod sequence;
mod smf;
mod tuning;
mod voice;

/// A MIDI note between 0 and 127.
pub type Note = u8;
