use crate::Note;
use lazy_static::lazy_static;
use std::f64::consts::E;
use std::sync::Arc;

lazy_static! {
    static ref CONCERT_PITCH: Arc<Tuning> = Arc::new(Tuning::equal_temperament(440.0));
}

/// Denotes the pitch in Hz for each MIDI note.
#[derive(Copy, Clone)]
pub struct Tuning {
    notes: [f64; 128],
}

impl Tuning {
    /// Creates a new equal temperament tuning, based on the provided pitch for the note A4.
    pub fn equal_temperament(a4: f64) -> Self {
        let mut notes = [0.0; 128];
        for (note, pitch) in notes.iter_mut().enumerate() {
            *pitch = a4 * 2.0f64.powf((note as f64 - 69.0) / 12.0);
        }
        Self { notes }
    }

    /// Gets a reference to the standard tuning system in which A4 is 440Hz.
    pub fn concert_pitch() -> Arc<Self> {
        CONCERT_PITCH.clone()
    }

    /// Gets the pitch of the provided MIDI note. Notes above 127 are clamped.
    pub fn pitch(&self, note: Note) -> f64 {
        self.notes[usize::from(note.min(127))]
    }
}

/// Frequency in Hz of a MIDI note in concert pitch, 12-tone equal temperament.
pub fn frequency(note: Note) -> f64 {
    440.0 * 2.0f64.powf((f64::from(note) - 69.0) / 12.0)
}

/// Frequency ratio of a bend of `semitones`.
pub fn bend_ratio(semitones: f32) -> f32 {
    2f32.powf(semitones / 12.0)
}

/// Playback rate multiplier applied to a voice when triggered with `note`.
///
/// Samples are recorded so that note 49 plays at twice their natural rate.
pub fn voice_pitch(note: Note) -> f32 {
    2.0 * 2f32.powf((f32::from(note) - 49.0) / 12.0)
}

/// Maps a 7-bit control value onto a perceptual gain multiplier.
pub fn gain(raw: u8) -> f32 {
    let linear = 100.0 * f64::from(raw.min(127)) / 127.0;
    linear.powf(E.recip()) as f32
}
