use crate::Note;

/// Controller numbers interpreted by [ChannelInstrument](crate::ChannelInstrument).
pub mod cc {
    pub const BANK_SELECT: u8 = 0;
    pub const MODULATION: u8 = 1;
    pub const DATA_ENTRY: u8 = 6;
    pub const PAN: u8 = 10;
    pub const BANK_SELECT_LSB: u8 = 32;
    pub const DATA_ENTRY_LSB: u8 = 38;
    pub const RPN_LSB: u8 = 100;
    pub const RPN_MSB: u8 = 101;
    pub const ALL_SOUND_OFF: u8 = 120;
    pub const ALL_NOTES_OFF: u8 = 123;
}

/// A channel-scoped MIDI event.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum ChannelEvent {
    NoteOn {
        note: Note,
        velocity: u8,
    },
    NoteOff {
        note: Note,
        velocity: u8,
    },
    Controller {
        controller: u8,
        value: u8,
    },
    ProgramChange {
        program: u8,
    },
    /// Channel-wide aftertouch.
    ChannelPressure {
        pressure: u8,
    },
    /// Signed pitch bend, centred on zero (-8192 to 8191).
    PitchBend {
        value: i16,
    },
}

impl ChannelEvent {
    /// Decodes a channel event and its channel from raw bytes.
    ///
    /// A note-on with zero velocity is decoded as a note-off.
    pub fn from_raw(data: &[u8]) -> Option<(u8, Self)> {
        let (status, event) = match *data {
            [a @ 0x80..=0x8f, note, velocity] => (a, ChannelEvent::NoteOff { note, velocity }),
            [a @ 0x90..=0x9f, note, 0] => (a, ChannelEvent::NoteOff { note, velocity: 0 }),
            [a @ 0x90..=0x9f, note, velocity] => (a, ChannelEvent::NoteOn { note, velocity }),
            [a @ 0xb0..=0xbf, controller, value] => {
                (a, ChannelEvent::Controller { controller, value })
            }
            [a @ 0xc0..=0xcf, program, ..] => (a, ChannelEvent::ProgramChange { program }),
            [a @ 0xd0..=0xdf, pressure, ..] => (a, ChannelEvent::ChannelPressure { pressure }),
            [a @ 0xe0..=0xef, lsb, msb] => {
                let raw = lsb as i16 | ((msb as i16) << 7);
                (a, ChannelEvent::PitchBend { value: raw - 8192 })
            }
            _ => return None,
        };
        Some((status & 0x0f, event))
    }
}

/// A channel event scheduled at a point in musical time.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct TimedEvent {
    /// Scheduled time in time parts (ticks).
    pub time: u64,
    pub channel: u8,
    pub event: ChannelEvent,
}

impl TimedEvent {
    pub fn new(time: u64, channel: u8, event: ChannelEvent) -> Self {
        Self {
            time,
            channel,
            event,
        }
    }
}
