use crate::backend::{AudioBackend, BufferId, EmitterId, EmitterState, Param, Positioning};
use crate::error::Result;
use crate::tuning::voice_pitch;
use crate::Note;

/// Lifecycle of a [Voice].
#[derive(Copy, Clone, Eq, PartialEq, Debug, Default)]
pub enum VoiceState {
    /// Attached to a buffer but never triggered.
    #[default]
    Idle,
    Playing,
    Stopped,
}

/// One sounding note: a backend emitter bound to a single sample buffer.
///
/// Every parameter write completes before the state transition it belongs to
/// is issued, and each transition sends exactly one state command.
#[derive(Debug)]
pub struct Voice {
    emitter: EmitterId,
    buffer: BufferId,
    pitch: f32,
    state: VoiceState,
}

impl Voice {
    /// Binds `buffer` to a fresh emitter positioned relative to the listener.
    ///
    /// The buffer must outlive the voice.
    pub fn attach(backend: &mut impl AudioBackend, buffer: BufferId) -> Result<Self> {
        let emitter = backend.create_emitter(buffer, Positioning::Relative)?;
        Ok(Self {
            emitter,
            buffer,
            pitch: 1.0,
            state: VoiceState::Idle,
        })
    }

    /// Triggers `note` at the voice's own pitch mapping.
    pub fn trigger(&mut self, backend: &mut impl AudioBackend, note: Note) -> Result<()> {
        self.trigger_at(backend, voice_pitch(note))
    }

    /// Triggers the voice at an explicit playback rate.
    ///
    /// A voice that is already playing is stopped first, so the sample restarts.
    /// On failure the voice is not left playing at the new pitch.
    pub fn trigger_at(&mut self, backend: &mut impl AudioBackend, pitch: f32) -> Result<()> {
        backend.set_param(self.emitter, Param::Pitch, pitch)?;
        if self.state == VoiceState::Playing {
            backend.set_state(self.emitter, EmitterState::Stopped)?;
            self.state = VoiceState::Stopped;
        }
        backend.set_state(self.emitter, EmitterState::Playing)?;
        self.pitch = pitch;
        self.state = VoiceState::Playing;
        Ok(())
    }

    /// Stops the voice. Releasing a voice that is not playing does nothing.
    ///
    /// The emitter stays attached until [destroy](Self::destroy).
    pub fn release(&mut self, backend: &mut impl AudioBackend) -> Result<()> {
        if self.state != VoiceState::Playing {
            return Ok(());
        }
        backend.set_state(self.emitter, EmitterState::Stopped)?;
        self.state = VoiceState::Stopped;
        Ok(())
    }

    /// Writes the gain multiplier, taking effect immediately.
    pub fn set_gain(&mut self, backend: &mut impl AudioBackend, gain: f32) -> Result<()> {
        backend.set_param(self.emitter, Param::Gain, gain)
    }

    /// Writes the stereo position, from -1 (left) to 1 (right).
    pub fn set_pan(&mut self, backend: &mut impl AudioBackend, pan: f32) -> Result<()> {
        backend.set_param(self.emitter, Param::Pan, pan)
    }

    /// Stops the voice if needed, tells the backend the sound is fully
    /// processed and detaches the emitter.
    pub fn destroy(mut self, backend: &mut impl AudioBackend) {
        if let Err(err) = self.release(backend) {
            tracing::warn!("emitter {} not stopped: {}", self.emitter.0, err);
        }
        if let Err(err) = backend.set_state(self.emitter, EmitterState::Processed) {
            tracing::warn!("emitter {} not marked processed: {}", self.emitter.0, err);
        }
        backend.destroy_emitter(self.emitter);
    }

    /// The backend emitter owned by the voice.
    pub fn emitter(&self) -> EmitterId {
        self.emitter
    }

    /// The sample buffer bound at attach.
    pub fn buffer(&self) -> BufferId {
        self.buffer
    }

    /// The playback rate applied at the last successful trigger.
    pub fn pitch(&self) -> f32 {
        self.pitch
    }

    /// The lifecycle state.
    pub fn state(&self) -> VoiceState {
        self.state
    }

    /// Whether the voice is in [VoiceState::Playing].
    pub fn is_playing(&self) -> bool {
        self.state == VoiceState::Playing
    }
}
