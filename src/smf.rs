//! Standard MIDI File loading.
//!
//! Converts an SMF into a [Sequence] of named tracks stamped in ticks, using
//! the `midly` crate for parsing.

use crate::error::{Error, Result};
use crate::midi::{ChannelEvent, TimedEvent};
use crate::sequence::{Sequence, Track, DEFAULT_TEMPO};
use midly::{MetaMessage, MidiMessage, Smf, Timing, TrackEventKind};
use std::path::Path;
use tracing::debug;

impl Sequence {
    /// Loads and parses a MIDI file from disk.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let data = std::fs::read(path.as_ref())?;
        Self::from_smf(&data)
    }

    /// Parses a MIDI file from bytes.
    pub fn from_smf(data: &[u8]) -> Result<Self> {
        let smf = Smf::parse(data)?;
        let ticks_per_beat = match smf.header.timing {
            Timing::Metrical(tpb) => tpb.as_int(),
            Timing::Timecode(_, _) => return Err(Error::UnsupportedTiming),
        };

        let mut tempo = None;
        let mut tracks = Vec::with_capacity(smf.tracks.len());
        for (index, events) in smf.tracks.iter().enumerate() {
            let mut track = Track::new(format!("Track {}", index + 1), vec![]);
            let mut tick = 0u64;
            for event in events {
                tick += u64::from(event.delta.as_int());
                match event.kind {
                    TrackEventKind::Midi { channel, message } => {
                        if let Some(event) = convert(message) {
                            track.events.push(TimedEvent::new(tick, channel.as_int(), event));
                        }
                    }
                    TrackEventKind::Meta(MetaMessage::TrackName(name)) => {
                        track.name = String::from_utf8_lossy(name).trim().to_string();
                    }
                    TrackEventKind::Meta(MetaMessage::Tempo(t)) if tempo.is_none() => {
                        tempo = Some(t.as_int());
                    }
                    _ => {}
                }
            }
            tracks.push(track);
        }

        debug!(
            "Parsed MIDI file: {} tracks, {} ticks per beat, {} events",
            tracks.len(),
            ticks_per_beat,
            tracks.iter().map(|t| t.events.len()).sum::<usize>()
        );

        Ok(Self {
            tracks,
            ticks_per_beat,
            tempo: tempo.unwrap_or(DEFAULT_TEMPO),
        })
    }
}

fn convert(message: MidiMessage) -> Option<ChannelEvent> {
    Some(match message {
        MidiMessage::NoteOn { key, vel } if vel.as_int() == 0 => ChannelEvent::NoteOff {
            note: key.as_int(),
            velocity: 0,
        },
        MidiMessage::NoteOn { key, vel } => ChannelEvent::NoteOn {
            note: key.as_int(),
            velocity: vel.as_int(),
        },
        MidiMessage::NoteOff { key, vel } => ChannelEvent::NoteOff {
            note: key.as_int(),
            velocity: vel.as_int(),
        },
        MidiMessage::Controller { controller, value } => ChannelEvent::Controller {
            controller: controller.as_int(),
            value: value.as_int(),
        },
        MidiMessage::ProgramChange { program } => ChannelEvent::ProgramChange {
            program: program.as_int(),
        },
        MidiMessage::ChannelAftertouch { vel } => ChannelEvent::ChannelPressure {
            pressure: vel.as_int(),
        },
        MidiMessage::PitchBend { bend } => ChannelEvent::PitchBend {
            value: bend.0.as_int() as i16 - 8192,
        },
        MidiMessage::Aftertouch { .. } => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Two tracks at 96 ticks per beat: a piano note and a drum hit.
    #[rustfmt::skip]
    const TWO_TRACKS: &[u8] = &[
        b'M', b'T', b'h', b'd', 0, 0, 0, 6, 0, 1, 0, 2, 0, 96,
        b'M', b'T', b'r', b'k', 0, 0, 0, 31,
        0x00, 0xff, 0x03, 5, b'P', b'i', b'a', b'n', b'o',
        0x00, 0xff, 0x51, 3, 0x07, 0xa1, 0x20,
        0x00, 0xc0, 0x00,
        0x00, 0x90, 60, 100,
        0x60, 0x80, 60, 64,
        0x00, 0xff, 0x2f, 0x00,
        b'M', b'T', b'r', b'k', 0, 0, 0, 21,
        0x00, 0xff, 0x03, 5, b'D', b'r', b'u', b'm', b's',
        0x00, 0x99, 36, 127,
        0x30, 0x99, 36, 0,
        0x00, 0xff, 0x2f, 0x00,
    ];

    #[test]
    fn parses_named_tracks() {
        let sequence = Sequence::from_smf(TWO_TRACKS).unwrap();
        assert_eq!(sequence.ticks_per_beat, 96);
        assert_eq!(sequence.tempo, 500_000);

        let names: Vec<_> = sequence.tracks.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, ["Piano", "Drums"]);

        assert_eq!(
            sequence.tracks[0].events,
            vec![
                TimedEvent::new(0, 0, ChannelEvent::ProgramChange { program: 0 }),
                TimedEvent::new(0, 0, ChannelEvent::NoteOn { note: 60, velocity: 100 }),
                TimedEvent::new(96, 0, ChannelEvent::NoteOff { note: 60, velocity: 64 }),
            ]
        );
        assert_eq!(
            sequence.tracks[1].events[1],
            TimedEvent::new(48, 9, ChannelEvent::NoteOff { note: 36, velocity: 0 })
        );
    }

    #[test]
    fn converts_pitch_bend() {
        assert_eq!(
            convert(MidiMessage::PitchBend {
                bend: midly::PitchBend(midly::num::u14::new(0))
            }),
            Some(ChannelEvent::PitchBend { value: -8192 })
        );
    }

    #[test]
    fn rejects_garbage() {
        assert!(matches!(Sequence::from_smf(b"not a midi file"), Err(Error::Smf(_))));
    }
}
