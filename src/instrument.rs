//! Instrument definitions and the library that resolves programs to them.

use crate::backend::BufferId;
use crate::Note;
use std::collections::HashMap;

/// How an instrument maps keys onto sample buffers.
#[derive(Clone, Debug, PartialEq)]
pub enum InstrumentKind {
    /// One sample, pitch-shifted to every key.
    Melodic { buffer: Option<BufferId> },
    /// One unpitched sample per key.
    DrumKit { keys: HashMap<Note, BufferId> },
}

impl InstrumentKind {
    /// Resolves the sample for `key`, or `None` when the key is unmapped.
    pub fn buffer_for(&self, key: Note) -> Option<BufferId> {
        match self {
            InstrumentKind::Melodic { buffer } => *buffer,
            InstrumentKind::DrumKit { keys } => keys.get(&key).copied(),
        }
    }

    /// Whether keys transpose the sample.
    pub fn is_pitched(&self) -> bool {
        matches!(self, InstrumentKind::Melodic { .. })
    }
}

impl Default for InstrumentKind {
    fn default() -> Self {
        InstrumentKind::Melodic { buffer: None }
    }
}

/// Everything needed to build a channel's instrument.
#[derive(Clone, Debug, PartialEq)]
pub struct InstrumentDef {
    pub name: String,
    pub kind: InstrumentKind,
    /// Transient played on every key-on, such as a hammer or pick noise.
    pub attack: Option<BufferId>,
    /// Transient played on every key-off, such as a damper or release noise.
    pub release: Option<BufferId>,
    /// Playback rate of the samples relative to the backend's output rate.
    pub rate: f32,
    /// Fine correction applied on top of `rate`, as a fraction.
    pub rate_correction: f32,
}

impl Default for InstrumentDef {
    fn default() -> Self {
        Self {
            name: String::new(),
            kind: InstrumentKind::default(),
            attack: None,
            release: None,
            rate: 1.0,
            rate_correction: 0.0,
        }
    }
}

impl InstrumentDef {
    /// A melodic instrument playing `buffer`.
    pub fn melodic(name: impl Into<String>, buffer: BufferId) -> Self {
        Self {
            name: name.into(),
            kind: InstrumentKind::Melodic {
                buffer: Some(buffer),
            },
            ..Default::default()
        }
    }

    /// A drum kit playing one buffer per key.
    pub fn drum_kit(name: impl Into<String>, keys: impl IntoIterator<Item = (Note, BufferId)>) -> Self {
        Self {
            name: name.into(),
            kind: InstrumentKind::DrumKit {
                keys: keys.into_iter().collect(),
            },
            ..Default::default()
        }
    }

    pub fn with_transients(mut self, attack: Option<BufferId>, release: Option<BufferId>) -> Self {
        self.attack = attack;
        self.release = release;
        self
    }

    /// Effective sample rate multiplier.
    pub fn rate_factor(&self) -> f32 {
        self.rate * (1.0 + self.rate_correction)
    }
}

/// Resolves a bank and program number to an instrument.
pub trait InstrumentLibrary {
    fn resolve(&self, bank: u16, program: u8) -> Option<InstrumentDef>;
}

/// An in-memory [InstrumentLibrary].
///
/// Lookups fall back to program 0 of the same bank when the exact program
/// is missing.
#[derive(Clone, Debug, Default)]
pub struct ProgramTable {
    programs: HashMap<(u16, u8), InstrumentDef>,
}

impl ProgramTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, bank: u16, program: u8, def: InstrumentDef) -> &mut Self {
        self.programs.insert((bank, program), def);
        self
    }

    pub fn len(&self) -> usize {
        self.programs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.programs.is_empty()
    }
}

impl InstrumentLibrary for ProgramTable {
    fn resolve(&self, bank: u16, program: u8) -> Option<InstrumentDef> {
        self.programs
            .get(&(bank, program))
            .or_else(|| self.programs.get(&(bank, 0)))
            .cloned()
    }
}
