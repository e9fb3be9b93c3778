//! The boundary to the audio engine that actually renders sound.
//!
//! Voices never touch audio data. They create emitters bound to sample
//! buffers, write scalar parameters onto them and issue state transitions.
//! Everything else (mixing, effects, device output) lives behind
//! [AudioBackend].

use crate::error::{Error, Result};

/// A sample buffer loaded into the backend. Buffers are shared between
/// voices and are owned by the backend, not by this crate.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, PartialOrd, Ord)]
pub struct BufferId(pub u32);

/// An emitter created by the backend to play one buffer.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, PartialOrd, Ord)]
pub struct EmitterId(pub u32);

/// How an emitter is positioned in the backend's sound field.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum Positioning {
    /// Positioned relative to the listener, so it follows the listener around.
    Relative,
    /// Positioned in world coordinates.
    Absolute,
}

/// A scalar effect parameter of an emitter.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum Param {
    /// Playback rate multiplier.
    Pitch,
    /// Stereo position, from -1 (left) to 1 (right).
    Pan,
    /// Gain multiplier.
    Gain,
}

/// Playback state of an emitter.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum EmitterState {
    Playing,
    Stopped,
    /// The emitter's sound is finished with and its resources may be reclaimed.
    Processed,
}

/// Primitives consumed from the audio engine.
pub trait AudioBackend {
    /// Creates an emitter bound to `buffer`.
    fn create_emitter(&mut self, buffer: BufferId, positioning: Positioning) -> Result<EmitterId>;

    /// Detaches and destroys an emitter. The buffer it was bound to is untouched.
    fn destroy_emitter(&mut self, emitter: EmitterId);

    /// Writes a scalar parameter onto an emitter.
    fn set_param(&mut self, emitter: EmitterId, param: Param, value: f32) -> Result<()>;

    /// Issues a state transition to an emitter.
    fn set_state(&mut self, emitter: EmitterId, state: EmitterState) -> Result<()>;

    /// Sets the gain applied to the whole mix.
    fn set_master_gain(&mut self, _gain: f32) -> Result<()> {
        Ok(())
    }

    /// Resumes or suspends the backend's rendering.
    fn set_running(&mut self, _running: bool) -> Result<()> {
        Ok(())
    }
}

impl<B: AudioBackend + ?Sized> AudioBackend for &mut B {
    fn create_emitter(&mut self, buffer: BufferId, positioning: Positioning) -> Result<EmitterId> {
        (**self).create_emitter(buffer, positioning)
    }

    fn destroy_emitter(&mut self, emitter: EmitterId) {
        (**self).destroy_emitter(emitter)
    }

    fn set_param(&mut self, emitter: EmitterId, param: Param, value: f32) -> Result<()> {
        (**self).set_param(emitter, param, value)
    }

    fn set_state(&mut self, emitter: EmitterId, state: EmitterState) -> Result<()> {
        (**self).set_state(emitter, state)
    }

    fn set_master_gain(&mut self, gain: f32) -> Result<()> {
        (**self).set_master_gain(gain)
    }

    fn set_running(&mut self, running: bool) -> Result<()> {
        (**self).set_running(running)
    }
}

/// A command received by a [RecordingBackend].
#[derive(Copy, Clone, PartialEq, Debug)]
pub enum Command {
    Create {
        emitter: EmitterId,
        buffer: BufferId,
        positioning: Positioning,
    },
    Destroy(EmitterId),
    Param {
        emitter: EmitterId,
        param: Param,
        value: f32,
    },
    State {
        emitter: EmitterId,
        state: EmitterState,
    },
    MasterGain(f32),
    Running(bool),
}

/// A backend that renders nothing and records every command it receives.
///
/// Useful for dry runs and for asserting on the exact command stream.
#[derive(Default, Debug)]
pub struct RecordingBackend {
    pub(crate) commands: Vec<Command>,
    pub(crate) next_emitter: u32,
    pub(crate) live: Vec<EmitterId>,
    /// Number of emitters that may still be created before creation is refused.
    /// `None` means unlimited.
    pub emitter_budget: Option<usize>,
    /// When set, every state transition is refused.
    pub refuse_state: bool,
    /// Number of state transitions that may still be accepted before the rest
    /// are refused. `None` means unlimited.
    pub state_budget: Option<usize>,
}

impl RecordingBackend {
    /// Creates an empty [RecordingBackend].
    pub fn new() -> Self {
        Self::default()
    }

    /// All commands received so far, oldest first.
    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    /// Discards the recorded commands.
    pub fn clear(&mut self) {
        self.commands.clear();
    }

    /// Emitters that have been created and not yet destroyed.
    pub fn live_emitters(&self) -> &[EmitterId] {
        &self.live
    }

    /// Counts recorded writes of `param`.
    pub fn param_count(&self, param: Param) -> usize {
        self.commands
            .iter()
            .filter(|c| matches!(c, Command::Param { param: p, .. } if *p == param))
            .count()
    }

    /// Counts recorded transitions into `state`.
    pub fn state_count(&self, state: EmitterState) -> usize {
        self.commands
            .iter()
            .filter(|c| matches!(c, Command::State { state: s, .. } if *s == state))
            .count()
    }

    /// The most recent value written to `param` on `emitter`.
    pub fn last_param(&self, emitter: EmitterId, param: Param) -> Option<f32> {
        self.commands.iter().rev().find_map(|c| match *c {
            Command::Param { emitter: e, param: p, value } if e == emitter && p == param => {
                Some(value)
            }
            _ => None,
        })
    }

    fn check_live(&self, emitter: EmitterId) -> Result<()> {
        if self.live.contains(&emitter) {
            Ok(())
        } else {
            Err(Error::Backend(format!("unknown emitter {}", emitter.0)))
        }
    }
}

impl AudioBackend for RecordingBackend {
    fn create_emitter(&mut self, buffer: BufferId, positioning: Positioning) -> Result<EmitterId> {
        if let Some(budget) = &mut self.emitter_budget {
            if *budget == 0 {
                return Err(Error::Backend("out of emitters".into()));
            }
            *budget -= 1;
        }
        let emitter = EmitterId(self.next_emitter);
        self.next_emitter += 1;
        self.live.push(emitter);
        self.commands.push(Command::Create {
            emitter,
            buffer,
            positioning,
        });
        Ok(emitter)
    }

    fn destroy_emitter(&mut self, emitter: EmitterId) {
        self.live.retain(|e| *e != emitter);
        self.commands.push(Command::Destroy(emitter));
    }

    fn set_param(&mut self, emitter: EmitterId, param: Param, value: f32) -> Result<()> {
        self.check_live(emitter)?;
        self.commands.push(Command::Param {
            emitter,
            param,
            value,
        });
        Ok(())
    }

    fn set_state(&mut self, emitter: EmitterId, state: EmitterState) -> Result<()> {
        self.check_live(emitter)?;
        if self.refuse_state {
            return Err(Error::Backend("state change refused".into()));
        }
        if let Some(budget) = &mut self.state_budget {
            if *budget == 0 {
                return Err(Error::Backend("state change refused".into()));
            }
            *budget -= 1;
        }
        self.commands.push(Command::State { emitter, state });
        Ok(())
    }

    fn set_master_gain(&mut self, gain: f32) -> Result<()> {
        self.commands.push(Command::MasterGain(gain));
        Ok(())
    }

    fn set_running(&mut self, running: bool) -> Result<()> {
        self.commands.push(Command::Running(running));
        Ok(())
    }
}
