// Monophonic note/rest events and the song input format.
//
// An `Event` is one note or rest with an exact rational duration in
// quarter-note units (1 = quarter, 1/4 = sixteenth, 3/2 = dotted quarter).
// Rationals keep the duration filter and the step arithmetic exact: 0.75 is
// 3/4, not 0.75000000001.
//
// `Song` is the JSON shape the CLI reads in place of a notation parser. The
// score parser itself is an external collaborator; anything that can emit
// this shape (pitch or null, duration) can feed the pipeline.

use crate::error::{MelodyError, Result};
use crate::transpose::KeySignature;
use num_rational::Rational32;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Duration in quarter-note units.
pub type Duration = Rational32;

/// Highest MIDI pitch number.
pub const MAX_PITCH: u8 = 127;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// MIDI pitch, 0-127.
    Note(u8),
    Rest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "EventRecord", into = "EventRecord")]
pub struct Event {
    pub kind: EventKind,
    pub duration: Duration,
}

impl Event {
    pub fn note(pitch: u8, duration: Duration) -> Self {
        Event {
            kind: EventKind::Note(pitch),
            duration,
        }
    }

    pub fn rest(duration: Duration) -> Self {
        Event {
            kind: EventKind::Rest,
            duration,
        }
    }

    pub fn pitch(&self) -> Option<u8> {
        match self.kind {
            EventKind::Note(p) => Some(p),
            EventKind::Rest => None,
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            EventKind::Note(p) => write!(f, "Note({p}, {})", self.duration),
            EventKind::Rest => write!(f, "Rest({})", self.duration),
        }
    }
}

/// Build a duration from a decimal quarter length. Exact for every value
/// with a short binary expansion (all standard note values and their dots).
pub fn duration_from_f64(quarter_length: f64) -> Option<Duration> {
    if !quarter_length.is_finite() || quarter_length <= 0.0 {
        return None;
    }
    Rational32::approximate_float(quarter_length)
}

/// Duration as written in song files: a decimal (`0.75`) or a fraction
/// pair (`[3, 4]`).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(untagged)]
enum DurationRecord {
    Fraction([i32; 2]),
    Decimal(f64),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct EventRecord {
    /// `null` for a rest.
    pitch: Option<u8>,
    duration: DurationRecord,
}

/// Build a duration from a raw `[n, d]` pair. The sign is normalized in
/// i64 so `i32::MIN` in either slot is an error, not an overflow.
fn fraction_duration(n: i32, d: i32) -> std::result::Result<Duration, String> {
    if d == 0 {
        return Err("duration denominator is zero".into());
    }
    let (n, d) = if d < 0 {
        (-(n as i64), -(d as i64))
    } else {
        (n as i64, d as i64)
    };
    if n <= 0 {
        return Err(format!("duration {n}/{d} must be positive"));
    }
    match (i32::try_from(n), i32::try_from(d)) {
        (Ok(n), Ok(d)) => Ok(Rational32::new(n, d)),
        _ => Err(format!("duration {n}/{d} is out of range")),
    }
}

impl TryFrom<EventRecord> for Event {
    type Error = String;

    fn try_from(rec: EventRecord) -> std::result::Result<Self, Self::Error> {
        let duration = match rec.duration {
            DurationRecord::Fraction([n, d]) => fraction_duration(n, d)?,
            DurationRecord::Decimal(x) => duration_from_f64(x)
                .ok_or_else(|| format!("duration {x} is not a positive finite number"))?,
        };
        if duration <= Rational32::from_integer(0) {
            return Err(format!("duration {duration} must be positive"));
        }
        let kind = match rec.pitch {
            Some(p) if p > MAX_PITCH => return Err(format!("pitch {p} is above {MAX_PITCH}")),
            Some(p) => EventKind::Note(p),
            None => EventKind::Rest,
        };
        Ok(Event { kind, duration })
    }
}

impl From<Event> for EventRecord {
    fn from(ev: Event) -> Self {
        EventRecord {
            pitch: ev.pitch(),
            duration: DurationRecord::Fraction([*ev.duration.numer(), *ev.duration.denom()]),
        }
    }
}

/// One song from the external score provider: a flattened note/rest stream
/// and, when the source declares one, its key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Song {
    /// Stable identifier; also the corpus sort key.
    pub id: String,
    #[serde(default)]
    pub key: Option<KeySignature>,
    pub events: Vec<Event>,
}

impl Song {
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        let song: Song = serde_json::from_str(&data)?;
        if song.id.trim().is_empty() {
            return Err(MelodyError::InvalidSong {
                id: path.display().to_string(),
                reason: "empty id".into(),
            });
        }
        Ok(song)
    }

    /// Load every `*.json` song under `dir`, sorted by id. Files that fail to
    /// parse are logged and skipped.
    pub fn load_dir(dir: &Path) -> Result<Vec<Song>> {
        let mut songs = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match Song::load(&path) {
                Ok(song) => songs.push(song),
                Err(e) => log::warn!("skipping {}: {e}", path.display()),
            }
        }
        songs.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(songs)
    }
}
