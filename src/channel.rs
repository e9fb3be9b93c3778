use crate::backend::AudioBackend;
use crate::error::Result;
use crate::instrument::InstrumentDef;
use crate::midi::cc;
use crate::pool::{VoiceHandle, VoicePool};
use crate::tuning::{bend_ratio, gain, voice_pitch};
use crate::Note;
use std::collections::HashMap;
use tracing::{debug, trace, warn};

/// Pan position applied while stereo is disabled.
pub const CENTER: f32 = 0.0;

/// Modulation depth, in semitones, reached by a full modulation wheel.
pub const MODULATION_RANGE: f32 = 2.0;

/// Controller state of a channel. Changes take effect at the next key-on or key-off.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ChannelParams {
    /// Pitch bend range in semitones.
    pub bend_range: f32,
    /// Fixed tuning offset as a frequency ratio.
    pub tuning: f32,
    /// Modulation depth in semitones.
    pub modulation: f32,
    /// How strongly channel pressure affects sounding notes, from 0 to 1.
    pub aftertouch: f32,
    /// Pressure raises the gain of new notes.
    pub pressure_volume: bool,
    /// Pressure raises the pitch of new notes.
    pub pressure_pitch: bool,
    /// Whether `pan` is applied. Voices are centred otherwise.
    pub stereo: bool,
    /// Stereo position, from -1 (left) to 1 (right).
    pub pan: f32,
    /// Current pitch bend, centred on zero (-8192 to 8191).
    pub pitch_bend: i16,
    /// Current channel pressure.
    pub pressure: u8,
}

impl ChannelParams {
    /// Centred, untuned parameters with the given bend range and stereo mode.
    pub fn new(bend_range: f32, stereo: bool) -> Self {
        Self {
            bend_range,
            tuning: 1.0,
            modulation: MODULATION_RANGE / 2.0,
            aftertouch: 0.0,
            pressure_volume: false,
            pressure_pitch: false,
            stereo,
            pan: CENTER,
            pitch_bend: 0,
            pressure: 0,
        }
    }
}

impl Default for ChannelParams {
    fn default() -> Self {
        Self::new(2.0, true)
    }
}

/// The instrument currently assigned to a MIDI channel, with the voices it owns.
pub struct ChannelInstrument {
    channel: u8,
    bank: u16,
    program: u8,
    def: InstrumentDef,
    params: ChannelParams,
    /// Pan position last written to the backend.
    pan_prev: Option<f32>,
    pool: VoicePool,
    /// Persistent voice for the attack transient, if the instrument has one.
    key_on: VoiceHandle,
    /// Persistent voice for the release transient, if the instrument has one.
    key_off: VoiceHandle,
    /// Voice currently sounding each key.
    sounding: HashMap<Note, VoiceHandle>,
    /// Registered parameter selected by CC 101/100.
    rpn: (u8, u8),
}

impl ChannelInstrument {
    /// Builds the instrument, attaching its persistent transient voices.
    ///
    /// Either every voice is attached or none is.
    pub fn new(
        backend: &mut impl AudioBackend,
        channel: u8,
        bank: u16,
        program: u8,
        def: InstrumentDef,
        params: ChannelParams,
    ) -> Result<Self> {
        let (pool, key_on, key_off) = Self::attach(backend, &def)?;
        debug!(
            "channel {} bank {} program {}: loaded '{}'",
            channel, bank, program, def.name
        );
        Ok(Self {
            channel,
            bank,
            program,
            def,
            params,
            pan_prev: None,
            pool,
            key_on,
            key_off,
            sounding: HashMap::new(),
            rpn: (0x7f, 0x7f),
        })
    }

    /// Replaces the instrument on this channel, keeping the controller state.
    ///
    /// On failure the previous instrument stays loaded.
    pub fn load(
        &mut self,
        backend: &mut impl AudioBackend,
        program: u8,
        def: InstrumentDef,
    ) -> Result<()> {
        let (pool, key_on, key_off) = Self::attach(backend, &def)?;
        self.sounding.clear();
        let mut old = std::mem::replace(&mut self.pool, pool);
        old.destroy(backend);
        debug!(
            "channel {} bank {} program {}: '{}' replaced by '{}'",
            self.channel, self.bank, program, self.def.name, def.name
        );
        self.program = program;
        self.def = def;
        self.key_on = key_on;
        self.key_off = key_off;
        self.pan_prev = None;
        Ok(())
    }

    fn attach(
        backend: &mut impl AudioBackend,
        def: &InstrumentDef,
    ) -> Result<(VoicePool, VoiceHandle, VoiceHandle)> {
        let mut pool = VoicePool::new();
        let mut handles = [VoiceHandle::NONE; 2];
        for (handle, buffer) in handles.iter_mut().zip([def.attack, def.release]) {
            let Some(buffer) = buffer else { continue };
            match pool.allocate(backend, buffer) {
                Ok(allocated) => *handle = allocated,
                Err(err) => {
                    pool.destroy(backend);
                    return Err(err);
                }
            }
        }
        Ok((pool, handles[0], handles[1]))
    }

    /// Plays `key` at the current pitch bend.
    pub fn note_on(
        &mut self,
        backend: &mut impl AudioBackend,
        key: Note,
        velocity: u8,
    ) -> Result<Option<VoiceHandle>> {
        self.play(backend, key, velocity, self.params.pitch_bend)
    }

    /// Starts a voice for `key`.
    ///
    /// Returns `None` without touching the backend when the instrument has no
    /// sample for `key`. A key that is already sounding is released first.
    pub fn play(
        &mut self,
        backend: &mut impl AudioBackend,
        key: Note,
        velocity: u8,
        pitch_bend: i16,
    ) -> Result<Option<VoiceHandle>> {
        let Some(buffer) = self.def.kind.buffer_for(key) else {
            trace!("channel {}: no sample for key {}", self.channel, key);
            return Ok(None);
        };
        if let Some(previous) = self.sounding.remove(&key) {
            self.pool.release(backend, previous)?;
        }

        let pitch = self.key_pitch(key, pitch_bend);
        let gain = self.key_gain(velocity);
        let handle = self.pool.allocate(backend, buffer)?;
        if let Err(err) = self.start(backend, handle, pitch, gain) {
            if let Err(cleanup) = self.pool.release(backend, handle) {
                warn!("channel {}: failed voice not stopped: {}", self.channel, cleanup);
            }
            return Err(err);
        }
        self.sounding.insert(key, handle);
        Ok(Some(handle))
    }

    fn start(
        &mut self,
        backend: &mut impl AudioBackend,
        handle: VoiceHandle,
        pitch: f32,
        gain: f32,
    ) -> Result<()> {
        if !self.sync_pan(backend)? {
            let pan = self.pan_prev.unwrap_or(CENTER);
            self.pool.get_mut(handle)?.set_pan(backend, pan)?;
        }
        let voice = self.pool.get_mut(handle)?;
        voice.set_gain(backend, gain)?;
        voice.trigger_at(backend, pitch)?;
        self.fire(backend, self.key_on, pitch, gain)
    }

    /// Releases the voice sounding `key` and fires the release transient.
    ///
    /// The voice is freed even if the release transient fails.
    pub fn stop(&mut self, backend: &mut impl AudioBackend, key: Note, velocity: u8) -> Result<()> {
        let Some(handle) = self.sounding.remove(&key) else {
            return Ok(());
        };
        let pitch = self.key_pitch(key, self.params.pitch_bend);
        let gain = self.key_gain(velocity);
        let fired = match self.sync_pan(backend) {
            Ok(_) => self.fire(backend, self.key_off, pitch, gain),
            Err(err) => Err(err),
        };
        let released = self.pool.release(backend, handle);
        fired.and(released)
    }

    /// Stops every voice of the channel, including the transients.
    pub fn silence(&mut self, backend: &mut impl AudioBackend) -> Result<()> {
        let mut result = Ok(());
        for (_, handle) in self.sounding.drain() {
            if let Err(err) = self.pool.release(backend, handle) {
                result = result.and(Err(err));
            }
        }
        result.and(self.pool.stop_all(backend))
    }

    /// Triggers a persistent transient voice, if present.
    fn fire(
        &mut self,
        backend: &mut impl AudioBackend,
        handle: VoiceHandle,
        pitch: f32,
        gain: f32,
    ) -> Result<()> {
        if handle.is_none() {
            return Ok(());
        }
        let voice = self.pool.get_mut(handle)?;
        voice.set_gain(backend, gain)?;
        voice.trigger_at(backend, pitch)
    }

    /// Enables or disables stereo panning. While disabled, voices are centred.
    pub fn set_stereo(&mut self, backend: &mut impl AudioBackend, enabled: bool) -> Result<()> {
        self.params.stereo = enabled;
        self.sync_pan(backend).map(|_| ())
    }

    /// Writes the effective pan to every voice if it changed since last written.
    ///
    /// Returns `true` if the backend was updated.
    fn sync_pan(&mut self, backend: &mut impl AudioBackend) -> Result<bool> {
        let pan = if self.params.stereo {
            self.params.pan
        } else {
            CENTER
        };
        if self.pan_prev == Some(pan) {
            return Ok(false);
        }
        for voice in self.pool.voices_mut() {
            voice.set_pan(backend, pan)?;
        }
        self.pan_prev = Some(pan);
        Ok(true)
    }

    /// Playback rate for `key` under the current channel state.
    pub fn key_pitch(&self, key: Note, pitch_bend: i16) -> f32 {
        let base = if self.def.kind.is_pitched() {
            voice_pitch(key)
        } else {
            1.0
        };
        let mut semitones = f32::from(pitch_bend) / 8192.0 * self.params.bend_range;
        if self.params.pressure_pitch {
            semitones += self.pressure() * self.params.aftertouch * self.params.modulation;
        }
        base * self.params.tuning * bend_ratio(semitones) * self.def.rate_factor()
    }

    /// Gain for a note struck at `velocity` under the current channel state.
    pub fn key_gain(&self, velocity: u8) -> f32 {
        let mut gain = gain(velocity);
        if self.params.pressure_volume {
            gain *= 1.0 + self.pressure() * self.params.aftertouch;
        }
        gain
    }

    fn pressure(&self) -> f32 {
        f32::from(self.params.pressure.min(127)) / 127.0
    }

    /// Applies a control change.
    pub fn controller(
        &mut self,
        backend: &mut impl AudioBackend,
        controller: u8,
        value: u8,
    ) -> Result<()> {
        let value = value.min(127);
        match controller {
            cc::BANK_SELECT => self.bank = (u16::from(value) << 7) | (self.bank & 0x7f),
            cc::BANK_SELECT_LSB => self.bank = (self.bank & !0x7f) | u16::from(value),
            cc::MODULATION => self.set_modulation(f32::from(value) / 127.0 * MODULATION_RANGE),
            cc::PAN => self.set_pan((f32::from(value) - 64.0) / 63.0),
            cc::RPN_MSB => self.rpn.0 = value,
            cc::RPN_LSB => self.rpn.1 = value,
            cc::DATA_ENTRY if self.rpn == (0, 0) => {
                self.params.bend_range = f32::from(value) + self.params.bend_range.fract();
            }
            cc::DATA_ENTRY_LSB if self.rpn == (0, 0) => {
                self.params.bend_range = self.params.bend_range.trunc() + f32::from(value) / 100.0;
            }
            cc::ALL_SOUND_OFF | cc::ALL_NOTES_OFF => return self.silence(backend),
            _ => trace!(
                "channel {}: ignoring controller {} = {}",
                self.channel,
                controller,
                value
            ),
        }
        Ok(())
    }

    /// The MIDI channel this instrument listens on.
    pub fn channel(&self) -> u8 {
        self.channel
    }

    /// Moves the instrument to another MIDI channel.
    pub fn set_channel(&mut self, channel: u8) {
        self.channel = channel;
    }

    /// The selected bank, combined from bank select MSB and LSB.
    pub fn bank(&self) -> u16 {
        self.bank
    }

    /// Selects the bank used by the next program change.
    pub fn set_bank(&mut self, bank: u16) {
        self.bank = bank;
    }

    /// The program currently loaded.
    pub fn program(&self) -> u8 {
        self.program
    }

    /// Records the program number without loading a new instrument.
    pub fn set_program(&mut self, program: u8) {
        self.program = program;
    }

    /// The definition of the loaded instrument.
    pub fn instrument(&self) -> &InstrumentDef {
        &self.def
    }

    /// Whether the loaded instrument plays one unpitched sample per key.
    pub fn is_drum_kit(&self) -> bool {
        !self.def.kind.is_pitched()
    }

    /// The controller state of the channel.
    pub fn params(&self) -> &ChannelParams {
        &self.params
    }

    /// Sets the fixed tuning offset from a signed number of semitones.
    pub fn set_tuning(&mut self, semitones: f32) {
        self.params.tuning = bend_ratio(semitones);
    }

    /// The fixed tuning offset as a frequency ratio.
    pub fn tuning(&self) -> f32 {
        self.params.tuning
    }

    /// Sets the pitch bend range in semitones.
    pub fn set_bend_range(&mut self, semitones: f32) {
        self.params.bend_range = semitones;
    }

    /// Sets the pitch bend, centred on zero, applied to the next key-on.
    pub fn set_pitch_bend(&mut self, value: i16) {
        self.params.pitch_bend = value.clamp(-8192, 8191);
    }

    /// Sets the modulation depth in semitones.
    pub fn set_modulation(&mut self, depth: f32) {
        self.params.modulation = depth;
    }

    /// The modulation depth in semitones.
    pub fn modulation(&self) -> f32 {
        self.params.modulation
    }

    /// Sets how strongly channel pressure affects new notes, clamped to 0..=1.
    pub fn set_aftertouch(&mut self, sensitivity: f32) {
        self.params.aftertouch = sensitivity.clamp(0.0, 1.0);
    }

    /// The aftertouch sensitivity.
    pub fn aftertouch(&self) -> f32 {
        self.params.aftertouch
    }

    /// Records the latest channel pressure.
    pub fn set_pressure(&mut self, pressure: u8) {
        self.params.pressure = pressure;
    }

    /// Makes channel pressure raise the gain of new notes.
    pub fn set_pressure_volume(&mut self, enabled: bool) {
        self.params.pressure_volume = enabled;
    }

    /// Makes channel pressure raise the pitch of new notes.
    pub fn set_pressure_pitch(&mut self, enabled: bool) {
        self.params.pressure_pitch = enabled;
    }

    /// Sets the stereo position, written at the next key-on or key-off.
    pub fn set_pan(&mut self, pan: f32) {
        self.params.pan = pan.clamp(-1.0, 1.0);
    }

    /// The voices owned by the instrument, transients included.
    pub fn pool(&self) -> &VoicePool {
        &self.pool
    }

    /// Number of keys currently held.
    pub fn sounding(&self) -> usize {
        self.sounding.len()
    }

    /// Detaches every voice from the backend.
    pub fn destroy(mut self, backend: &mut impl AudioBackend) {
        self.sounding.clear();
        self.pool.destroy(backend);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BufferId, Command, EmitterState, Param, RecordingBackend};
    use crate::error::Error;
    use approx::assert_relative_eq;

    fn piano(backend: &mut RecordingBackend, params: ChannelParams) -> ChannelInstrument {
        let def = InstrumentDef::melodic("piano", BufferId(1));
        ChannelInstrument::new(backend, 0, 0, 0, def, params).unwrap()
    }

    #[test]
    fn play_triggers_at_key_pitch() {
        let mut backend = RecordingBackend::new();
        let mut channel = piano(&mut backend, ChannelParams::default());
        let handle = channel.note_on(&mut backend, 61, 127).unwrap().unwrap();

        let voice = channel.pool().get(handle).unwrap();
        assert!(voice.is_playing());
        assert_relative_eq!(voice.pitch(), 4.0);
        assert_relative_eq!(
            backend.last_param(voice.emitter(), Param::Gain).unwrap(),
            gain(127)
        );
        assert_eq!(channel.sounding(), 1);
    }

    #[test]
    fn parameters_configure_before_play() {
        let mut backend = RecordingBackend::new();
        let mut channel = piano(&mut backend, ChannelParams::default());
        backend.clear();
        channel.note_on(&mut backend, 60, 100).unwrap();

        let commands = backend.commands();
        let play = commands
            .iter()
            .position(|c| matches!(c, Command::State { state: EmitterState::Playing, .. }))
            .unwrap();
        assert_eq!(play, commands.len() - 1);
        for param in [Param::Pan, Param::Gain, Param::Pitch] {
            assert!(commands[..play]
                .iter()
                .any(|c| matches!(c, Command::Param { param: p, .. } if *p == param)));
        }
    }

    #[test]
    fn tuning_and_bend_scale_pitch() {
        let mut backend = RecordingBackend::new();
        let mut channel = piano(&mut backend, ChannelParams::new(2.0, true));
        assert_eq!(channel.tuning(), 1.0);

        channel.set_tuning(12.0);
        assert_relative_eq!(channel.tuning(), 2.0);
        assert_relative_eq!(channel.key_pitch(49, 0), 4.0);

        channel.set_tuning(0.0);
        assert_relative_eq!(channel.key_pitch(49, 8192 / 2), 2.0 * bend_ratio(1.0));
        assert_relative_eq!(channel.key_pitch(49, -8192), 2.0 * bend_ratio(-2.0));
    }

    #[test]
    fn pressure_affects_gain_and_pitch() {
        let mut backend = RecordingBackend::new();
        let mut channel = piano(&mut backend, ChannelParams::default());
        channel.set_aftertouch(1.0);
        channel.set_modulation(2.0);
        channel.set_pressure(127);
        assert_relative_eq!(channel.key_gain(127), gain(127));
        assert_relative_eq!(channel.key_pitch(49, 0), 2.0);

        channel.set_pressure_volume(true);
        channel.set_pressure_pitch(true);
        assert_relative_eq!(channel.key_gain(127), 2.0 * gain(127));
        assert_relative_eq!(channel.key_pitch(49, 0), 2.0 * bend_ratio(2.0));
    }

    #[test]
    fn unmapped_drum_key_is_skipped() {
        let mut backend = RecordingBackend::new();
        let def = InstrumentDef::drum_kit("kit", [(36, BufferId(5))]);
        let mut channel =
            ChannelInstrument::new(&mut backend, 9, 128, 0, def, ChannelParams::default()).unwrap();
        assert!(channel.is_drum_kit());

        assert_eq!(channel.note_on(&mut backend, 37, 100).unwrap(), None);
        channel.stop(&mut backend, 37, 0).unwrap();
        assert!(backend.commands().is_empty());

        let handle = channel.note_on(&mut backend, 36, 100).unwrap().unwrap();
        let voice = channel.pool().get(handle).unwrap();
        assert_eq!(voice.buffer(), BufferId(5));
        assert_relative_eq!(voice.pitch(), 1.0);
    }

    #[test]
    fn stereo_toggle_updates_pan_once() {
        let mut backend = RecordingBackend::new();
        let mut channel = piano(&mut backend, ChannelParams::new(2.0, false));
        channel.set_pan(0.5);
        channel.note_on(&mut backend, 60, 100).unwrap();
        backend.clear();

        channel.set_stereo(&mut backend, true).unwrap();
        channel.set_stereo(&mut backend, true).unwrap();
        assert_eq!(backend.param_count(Param::Pan), 1);
        assert_eq!(backend.commands()[0], Command::Param {
            emitter: backend.live_emitters()[0],
            param: Param::Pan,
            value: 0.5,
        });

        channel.set_stereo(&mut backend, false).unwrap();
        assert_eq!(backend.param_count(Param::Pan), 2);
        assert_eq!(
            backend.last_param(backend.live_emitters()[0], Param::Pan),
            Some(CENTER)
        );
    }

    #[test]
    fn stop_releases_and_fires_release_transient() {
        let mut backend = RecordingBackend::new();
        let def = InstrumentDef::melodic("guitar", BufferId(1))
            .with_transients(Some(BufferId(2)), Some(BufferId(3)));
        let mut channel =
            ChannelInstrument::new(&mut backend, 0, 0, 0, def, ChannelParams::default()).unwrap();
        assert_eq!(channel.pool().len(), 2);

        channel.note_on(&mut backend, 60, 100).unwrap();
        assert_eq!(channel.pool().playing_count(), 2);

        channel.stop(&mut backend, 60, 64).unwrap();
        assert_eq!(channel.sounding(), 0);
        assert_eq!(channel.pool().len(), 2);
        assert_eq!(backend.state_count(EmitterState::Processed), 1);
        // attack transient still ringing, release transient fired
        assert_eq!(channel.pool().playing_count(), 2);

        channel.silence(&mut backend).unwrap();
        assert_eq!(channel.pool().playing_count(), 0);
    }

    #[test]
    fn replaying_a_key_reuses_its_slot() {
        let mut backend = RecordingBackend::new();
        let mut channel = piano(&mut backend, ChannelParams::default());
        let first = channel.note_on(&mut backend, 60, 100).unwrap().unwrap();
        let second = channel.note_on(&mut backend, 60, 100).unwrap().unwrap();
        assert_ne!(first, second);
        assert_eq!(first.slot(), second.slot());
        assert_eq!(channel.pool().len(), 1);
        assert_eq!(channel.sounding(), 1);
    }

    #[test]
    fn failed_construction_leaves_nothing_attached() {
        let mut backend = RecordingBackend {
            emitter_budget: Some(1),
            ..Default::default()
        };
        let def = InstrumentDef::melodic("guitar", BufferId(1))
            .with_transients(Some(BufferId(2)), Some(BufferId(3)));
        let result = ChannelInstrument::new(&mut backend, 0, 0, 0, def, ChannelParams::default());
        assert!(matches!(result, Err(Error::Backend(_))));
        assert!(backend.live_emitters().is_empty());
    }

    #[test]
    fn failed_play_leaves_no_voice() {
        let mut backend = RecordingBackend::new();
        let mut channel = piano(&mut backend, ChannelParams::default());
        backend.refuse_state = true;
        assert!(channel.note_on(&mut backend, 60, 100).is_err());
        assert_eq!(channel.sounding(), 0);
        assert!(channel.pool().is_empty());
        assert!(backend.live_emitters().is_empty());
    }

    fn guitar(backend: &mut RecordingBackend) -> ChannelInstrument {
        let def = InstrumentDef::melodic("guitar", BufferId(1))
            .with_transients(Some(BufferId(2)), Some(BufferId(3)));
        ChannelInstrument::new(backend, 0, 0, 0, def, ChannelParams::default()).unwrap()
    }

    #[test]
    fn failed_play_leaves_attack_quiet() {
        let mut backend = RecordingBackend::new();
        let mut channel = guitar(&mut backend);
        // the note itself starts, the attack transient is refused
        backend.state_budget = Some(1);
        assert!(channel.note_on(&mut backend, 60, 100).is_err());

        assert_eq!(channel.sounding(), 0);
        assert_eq!(channel.pool().len(), 2);
        assert_eq!(channel.pool().playing_count(), 0);
        assert_eq!(backend.live_emitters().len(), 2);
    }

    #[test]
    fn failed_stop_still_frees_the_voice() {
        let mut backend = RecordingBackend::new();
        let mut channel = guitar(&mut backend);
        channel.note_on(&mut backend, 60, 100).unwrap();
        assert_eq!(channel.pool().len(), 3);

        backend.state_budget = Some(0);
        assert!(channel.stop(&mut backend, 60, 64).is_err());
        assert_eq!(channel.sounding(), 0);
        assert_eq!(channel.pool().len(), 2);
        assert_eq!(backend.live_emitters().len(), 2);
    }

    #[test]
    fn controllers_update_state() {
        let mut backend = RecordingBackend::new();
        let mut channel = piano(&mut backend, ChannelParams::default());

        channel.controller(&mut backend, cc::BANK_SELECT, 1).unwrap();
        channel.controller(&mut backend, cc::BANK_SELECT_LSB, 3).unwrap();
        assert_eq!(channel.bank(), 131);

        channel.controller(&mut backend, cc::PAN, 127).unwrap();
        assert_relative_eq!(channel.params().pan, 1.0);
        channel.controller(&mut backend, cc::PAN, 0).unwrap();
        assert_relative_eq!(channel.params().pan, -1.0);

        channel.controller(&mut backend, cc::MODULATION, 127).unwrap();
        assert_relative_eq!(channel.modulation(), MODULATION_RANGE);

        channel.controller(&mut backend, cc::DATA_ENTRY, 7).unwrap();
        assert_relative_eq!(channel.params().bend_range, 2.0);
        channel.controller(&mut backend, cc::RPN_MSB, 0).unwrap();
        channel.controller(&mut backend, cc::RPN_LSB, 0).unwrap();
        channel.controller(&mut backend, cc::DATA_ENTRY, 12).unwrap();
        channel.controller(&mut backend, cc::DATA_ENTRY_LSB, 50).unwrap();
        assert_relative_eq!(channel.params().bend_range, 12.5);

        channel.note_on(&mut backend, 60, 100).unwrap();
        channel.controller(&mut backend, cc::ALL_NOTES_OFF, 0).unwrap();
        assert_eq!(channel.sounding(), 0);
    }

    #[test]
    fn load_swaps_instrument_and_keeps_params() {
        let mut backend = RecordingBackend::new();
        let mut channel = piano(&mut backend, ChannelParams::default());
        channel.set_tuning(3.0);
        channel.note_on(&mut backend, 60, 100).unwrap();

        let kit = InstrumentDef::drum_kit("kit", [(36, BufferId(9))]);
        channel.load(&mut backend, 5, kit).unwrap();
        assert_eq!(channel.program(), 5);
        assert!(channel.is_drum_kit());
        assert_eq!(channel.sounding(), 0);
        assert!(backend.live_emitters().is_empty());
        assert_relative_eq!(channel.tuning(), bend_ratio(3.0));
    }
}
