use crate::backend::AudioBackend;
use crate::channel::{ChannelInstrument, ChannelParams};
use crate::error::{Error, Result};
use crate::instrument::{InstrumentDef, InstrumentLibrary};
use crate::midi::{ChannelEvent, TimedEvent};
use crate::sequence::{Sequence, TrackFilter};
use crate::tuning::gain;
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, info, trace, warn};

/// Drives a [Sequence] through per-channel instruments in musical time.
///
/// The host calls [process](Self::process) to advance time and dispatch due
/// events, then [wait](Self::wait) to pace itself in real time. Nothing but
/// `wait` blocks.
pub struct Player<B: AudioBackend> {
    /// The configuration options.
    opts: PlayerOpts,
    backend: B,
    library: Box<dyn InstrumentLibrary + Send>,
    sequence: Sequence,
    /// Events of the selected tracks, in dispatch order.
    schedule: Vec<TimedEvent>,
    /// Index of the next undispatched event in `schedule`.
    next: usize,
    /// Musical time reached so far, in time parts.
    cursor: u64,
    channels: BTreeMap<u8, ChannelInstrument>,
    transport: Transport,
    initialized: bool,
}

/// Configuration options for [Player].
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PlayerOpts {
    /// The channel whose instruments are looked up in `drum_bank`.
    pub drum_channel: Option<u8>,
    /// The bank holding drum kits.
    pub drum_bank: u16,
    /// Pitch bend range in semitones of newly activated channels.
    pub bend_range: f32,
    /// Whether newly activated channels pan in stereo.
    pub stereo: bool,
    /// The longest a single call to [Player::wait] sleeps, in seconds.
    pub max_wait: f64,
}

impl Default for PlayerOpts {
    fn default() -> Self {
        Self {
            drum_channel: Some(9),
            drum_bank: 128,
            bend_range: 2.0,
            stereo: true,
            max_wait: 1.0,
        }
    }
}

/// Transport state of a [Player].
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum Transport {
    Stopped,
    /// Tracks are selected and the cursor is ready, but time is not advancing.
    Initialized,
    Playing,
}

/// Outcome of one call to [Player::process].
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct Step {
    /// Whether undispatched events remain.
    pub pending: bool,
    /// Scheduled time of the next undispatched event.
    pub next_due: Option<u64>,
    /// Number of events dispatched by this call.
    pub dispatched: usize,
}

impl<B: AudioBackend> Player<B> {
    /// Creates a stopped player for `sequence`.
    pub fn new(
        backend: B,
        library: impl InstrumentLibrary + Send + 'static,
        sequence: Sequence,
        opts: PlayerOpts,
    ) -> Self {
        Self {
            opts,
            backend,
            library: Box::new(library),
            sequence,
            schedule: vec![],
            next: 0,
            cursor: 0,
            channels: BTreeMap::new(),
            transport: Transport::Stopped,
            initialized: false,
        }
    }

    /// Updates the settings. Channels already active keep their state.
    pub fn update_opts(&mut self, f: impl FnOnce(&mut PlayerOpts)) {
        f(&mut self.opts);
    }

    /// The current settings.
    pub fn opts(&self) -> &PlayerOpts {
        &self.opts
    }

    /// Selects the tracks whose names match `filter` and rewinds to their start.
    pub fn initialize(&mut self, filter: &str) -> Result<()> {
        if self.transport == Transport::Playing {
            return Err(Error::Transport {
                state: self.transport,
                operation: "initialize",
            });
        }
        let filter = TrackFilter::new(filter);
        self.schedule = self.sequence.schedule(&filter);
        self.next = 0;
        self.cursor = 0;
        self.transport = Transport::Initialized;
        self.initialized = true;
        info!(
            "selected {} of {} tracks, {} events",
            self.sequence
                .tracks
                .iter()
                .filter(|t| filter.matches(&t.name))
                .count(),
            self.sequence.tracks.len(),
            self.schedule.len()
        );
        Ok(())
    }

    /// Starts or resumes advancing time.
    pub fn start(&mut self) -> Result<()> {
        match self.transport {
            Transport::Playing => return Ok(()),
            Transport::Stopped if !self.initialized => return Err(Error::NotInitialized),
            _ => {}
        }
        self.backend.set_running(true)?;
        self.transport = Transport::Playing;
        debug!("transport playing at {}", self.cursor);
        Ok(())
    }

    /// Stops advancing time and silences every voice.
    ///
    /// Every channel is silenced even if some fail; the first failure is returned.
    pub fn stop(&mut self) -> Result<()> {
        let mut result = self.silence();
        if self.transport == Transport::Playing {
            result = result.and(self.backend.set_running(false));
        }
        if self.transport != Transport::Stopped {
            debug!("transport stopped at {}", self.cursor);
        }
        self.transport = Transport::Stopped;
        result
    }

    /// Moves the cursor back to zero and silences sounding voices.
    ///
    /// Channel state and the transport state are kept.
    pub fn rewind(&mut self) -> Result<()> {
        self.cursor = 0;
        self.next = 0;
        debug!("rewound");
        self.silence()
    }

    fn silence(&mut self) -> Result<()> {
        let mut result = Ok(());
        for channel in self.channels.values_mut() {
            if let Err(err) = channel.silence(&mut self.backend) {
                warn!("channel {} failed to silence: {}", channel.channel(), err);
                result = result.and(Err(err));
            }
        }
        result
    }

    /// Advances the cursor by `elapsed` time parts and dispatches every event
    /// now due, in schedule order.
    ///
    /// Time only advances while playing. A dispatch failure is returned after
    /// the failing event has been consumed.
    pub fn process(&mut self, elapsed: u64) -> Result<Step> {
        if self.transport != Transport::Playing {
            return Ok(self.step(0));
        }
        self.cursor = self.cursor.saturating_add(elapsed);

        let mut dispatched = 0;
        while let Some(event) = self.schedule.get(self.next).copied() {
            if event.time > self.cursor {
                break;
            }
            self.next += 1;
            trace!("{}: channel {} {:?}", event.time, event.channel, event.event);
            if let Err(err) = self.dispatch(event.channel, event.event) {
                warn!("dispatch at {} failed: {}", event.time, err);
                return Err(err);
            }
            dispatched += 1;
        }
        Ok(self.step(dispatched))
    }

    fn step(&self, dispatched: usize) -> Step {
        let next_due = self.schedule.get(self.next).map(|e| e.time);
        Step {
            pending: next_due.is_some(),
            next_due,
            dispatched,
        }
    }

    /// Sleeps for up to `seconds` and reports whether playback continues.
    ///
    /// Returns `false` without sleeping once playback has ended: the transport
    /// is not playing, or no events remain and no voice is sounding.
    pub fn wait(&self, seconds: f64) -> bool {
        if !self.is_playing() {
            return false;
        }
        let seconds = seconds.max(0.0).min(self.opts.max_wait);
        if seconds > 0.0 {
            std::thread::sleep(Duration::from_secs_f64(seconds));
        }
        true
    }

    /// Whether the transport is playing and events or held notes remain.
    ///
    /// Attack and release transients do not hold playback open.
    pub fn is_playing(&self) -> bool {
        self.transport == Transport::Playing
            && (self.next < self.schedule.len() || self.held_notes() > 0)
    }

    /// Routes one event to the instrument of `channel`, activating it if needed.
    ///
    /// This is how scheduled events are applied, and may also be used for live input.
    pub fn dispatch(&mut self, channel: u8, event: ChannelEvent) -> Result<()> {
        let instrument = Self::activate_in(
            &mut self.channels,
            &mut self.backend,
            &*self.library,
            &self.opts,
            channel,
        )?;
        let backend = &mut self.backend;
        match event {
            ChannelEvent::NoteOn { note, velocity } => {
                instrument.note_on(backend, note, velocity)?;
            }
            ChannelEvent::NoteOff { note, velocity } => instrument.stop(backend, note, velocity)?,
            ChannelEvent::Controller { controller, value } => {
                instrument.controller(backend, controller, value)?
            }
            ChannelEvent::ProgramChange { program } => {
                let bank = if self.opts.drum_channel == Some(channel) {
                    self.opts.drum_bank
                } else {
                    instrument.bank()
                };
                let def = resolve(&*self.library, bank, program);
                instrument.load(backend, program, def)?;
            }
            ChannelEvent::ChannelPressure { pressure } => instrument.set_pressure(pressure),
            ChannelEvent::PitchBend { value } => instrument.set_pitch_bend(value),
        }
        Ok(())
    }

    /// Gets the instrument of `channel`, creating it with program 0 if it is
    /// not active yet.
    pub fn activate(&mut self, channel: u8) -> Result<&mut ChannelInstrument> {
        Self::activate_in(
            &mut self.channels,
            &mut self.backend,
            &*self.library,
            &self.opts,
            channel,
        )
    }

    fn activate_in<'a>(
        channels: &'a mut BTreeMap<u8, ChannelInstrument>,
        backend: &mut B,
        library: &dyn InstrumentLibrary,
        opts: &PlayerOpts,
        channel: u8,
    ) -> Result<&'a mut ChannelInstrument> {
        match channels.entry(channel) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => {
                let bank = if opts.drum_channel == Some(channel) {
                    opts.drum_bank
                } else {
                    0
                };
                let def = resolve(library, bank, 0);
                let params = ChannelParams::new(opts.bend_range, opts.stereo);
                let instrument = ChannelInstrument::new(backend, channel, bank, 0, def, params)?;
                Ok(entry.insert(instrument))
            }
        }
    }

    /// The instrument of `channel`, if active.
    pub fn channel(&self, channel: u8) -> Option<&ChannelInstrument> {
        self.channels.get(&channel)
    }

    /// The instrument of `channel` for changing its parameters, if active.
    pub fn channel_mut(&mut self, channel: u8) -> Option<&mut ChannelInstrument> {
        self.channels.get_mut(&channel)
    }

    /// Enables or disables stereo panning on `channel`.
    pub fn set_stereo(&mut self, channel: u8, enabled: bool) -> Result<()> {
        let instrument = Self::activate_in(
            &mut self.channels,
            &mut self.backend,
            &*self.library,
            &self.opts,
            channel,
        )?;
        instrument.set_stereo(&mut self.backend, enabled)
    }

    /// Sets the master gain from a 7-bit control value.
    pub fn set_gain(&mut self, raw: u8) -> Result<()> {
        self.backend.set_master_gain(gain(raw))
    }

    /// Number of notes held across every channel.
    pub fn held_notes(&self) -> usize {
        self.channels.values().map(|c| c.sounding()).sum()
    }

    /// Number of voices currently playing across every channel, transients included.
    pub fn playing_voices(&self) -> usize {
        self.channels
            .values()
            .map(|c| c.pool().playing_count())
            .sum()
    }

    /// The current transport state.
    pub fn transport(&self) -> Transport {
        self.transport
    }

    /// Musical time reached, in time parts.
    pub fn cursor(&self) -> u64 {
        self.cursor
    }

    /// The sequence being played.
    pub fn sequence(&self) -> &Sequence {
        &self.sequence
    }

    /// The audio backend receiving voice commands.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// The audio backend, for changes made outside the player.
    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }
}

impl<B: AudioBackend> Drop for Player<B> {
    fn drop(&mut self) {
        for (_, channel) in std::mem::take(&mut self.channels) {
            channel.destroy(&mut self.backend);
        }
    }
}

/// Looks up an instrument, falling back to a silent one.
fn resolve(library: &dyn InstrumentLibrary, bank: u16, program: u8) -> InstrumentDef {
    library.resolve(bank, program).unwrap_or_else(|| {
        warn!("no instrument for bank {} program {}", bank, program);
        InstrumentDef {
            name: format!("silent {}:{}", bank, program),
            ..Default::default()
        }
    })
}
