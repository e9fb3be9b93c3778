//! Time-ordered event sources for the [Player](crate::Player).

use crate::midi::TimedEvent;

/// Tempo assumed until a sequence says otherwise, in microseconds per beat.
pub const DEFAULT_TEMPO: u32 = 500_000;

/// A named stream of events, ordered by time.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Track {
    pub name: String,
    pub events: Vec<TimedEvent>,
}

impl Track {
    pub fn new(name: impl Into<String>, events: Vec<TimedEvent>) -> Self {
        Self {
            name: name.into(),
            events,
        }
    }
}

/// A set of tracks sharing one time base.
#[derive(Clone, Debug, PartialEq)]
pub struct Sequence {
    pub tracks: Vec<Track>,
    /// Time parts per beat.
    pub ticks_per_beat: u16,
    /// Microseconds per beat.
    pub tempo: u32,
}

impl Default for Sequence {
    fn default() -> Self {
        Self {
            tracks: vec![],
            ticks_per_beat: 96,
            tempo: DEFAULT_TEMPO,
        }
    }
}

impl Sequence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_track(mut self, track: Track) -> Self {
        self.tracks.push(track);
        self
    }

    /// Merges the events of every track accepted by `filter` into one schedule.
    ///
    /// Events are ordered by time. Simultaneous events keep track order, then
    /// their order within the track.
    pub fn schedule(&self, filter: &TrackFilter) -> Vec<TimedEvent> {
        let mut events: Vec<_> = self
            .tracks
            .iter()
            .filter(|track| filter.matches(&track.name))
            .flat_map(|track| track.events.iter().copied())
            .collect();
        events.sort_by_key(|event| event.time);
        events
    }

    /// Time parts elapsing per second at the sequence tempo.
    pub fn ticks_per_second(&self) -> f64 {
        f64::from(self.ticks_per_beat) * 1_000_000.0 / f64::from(self.tempo.max(1))
    }
}

/// Selects tracks by name.
///
/// Patterns containing `*` or `?` are matched as globs against the whole name;
/// other patterns match any name containing them. Matching ignores case, and
/// the empty pattern matches every track.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TrackFilter {
    pattern: Vec<char>,
}

impl TrackFilter {
    pub fn new(pattern: &str) -> Self {
        Self {
            pattern: pattern.to_lowercase().chars().collect(),
        }
    }

    /// A filter accepting every track.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn matches(&self, name: &str) -> bool {
        let name: Vec<char> = name.to_lowercase().chars().collect();
        if self.pattern.iter().any(|c| matches!(c, '*' | '?')) {
            glob(&self.pattern, &name)
        } else {
            self.pattern.is_empty() || name.windows(self.pattern.len()).any(|w| w == self.pattern.as_slice())
        }
    }
}

fn glob(pattern: &[char], text: &[char]) -> bool {
    let (mut p, mut t) = (0, 0);
    // Position of the last `*` and the text position it currently absorbs up to.
    let mut star = None;
    while t < text.len() {
        match pattern.get(p) {
            Some('*') => {
                star = Some((p, t));
                p += 1;
            }
            Some('?') => {
                p += 1;
                t += 1;
            }
            Some(c) if *c == text[t] => {
                p += 1;
                t += 1;
            }
            _ => match star {
                Some((sp, st)) => {
                    p = sp + 1;
                    t = st + 1;
                    star = Some((sp, st + 1));
                }
                None => return false,
            },
        }
    }
    pattern[p..].iter().all(|c| *c == '*')
}
