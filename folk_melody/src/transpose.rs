// Transposition planning: bring every song to C major or A minor.
//
// Normalizing the key shrinks the vocabulary the model has to learn (a
// melody in D major and the same melody in C major become one pattern).
// Only the interval is planned here; the key itself comes from the song
// file or an external key detector.
//
// The interval is `target - tonic` with both pitches in the same octave,
// so it always lies in -11..=11: D major → C is -2, F# minor → A is +3,
// B major → C is -11.

use crate::error::{MelodyError, Result};
use crate::event::{Event, EventKind, MAX_PITCH};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Pitch class of the major-key target (C).
pub const MAJOR_TARGET_PC: u8 = 0;
/// Pitch class of the minor-key target (A).
pub const MINOR_TARGET_PC: u8 = 9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyMode {
    Major,
    Minor,
}

impl KeyMode {
    pub fn target_pitch_class(self) -> u8 {
        match self {
            KeyMode::Major => MAJOR_TARGET_PC,
            KeyMode::Minor => MINOR_TARGET_PC,
        }
    }
}

impl FromStr for KeyMode {
    type Err = MelodyError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "major" => Ok(KeyMode::Major),
            "minor" => Ok(KeyMode::Minor),
            _ => Err(MelodyError::UnsupportedMode(s.to_string())),
        }
    }
}

impl fmt::Display for KeyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyMode::Major => write!(f, "major"),
            KeyMode::Minor => write!(f, "minor"),
        }
    }
}

/// A key as declared by a song file or reported by a key detector.
///
/// `mode` stays a free string so files can carry whatever the detector
/// emitted (`dorian`, `mixolydian`, ...); only major and minor can be
/// planned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeySignature {
    /// Tonic pitch class, 0 = C .. 11 = B. Files may also give a name
    /// (`"F#"`).
    #[serde(deserialize_with = "deserialize_tonic")]
    pub tonic: u8,
    pub mode: String,
}

impl KeySignature {
    pub fn new(tonic: u8, mode: &str) -> Self {
        KeySignature {
            tonic: tonic % 12,
            mode: mode.to_string(),
        }
    }

    pub fn transposition_interval(&self) -> Result<i8> {
        let mode: KeyMode = self.mode.parse()?;
        Ok(plan_transposition(self.tonic, mode))
    }
}

/// Signed semitone interval from `tonic_pc` to the canonical tonic of `mode`.
pub fn plan_transposition(tonic_pc: u8, mode: KeyMode) -> i8 {
    mode.target_pitch_class() as i8 - (tonic_pc % 12) as i8
}

/// Shift every note by `interval` semitones. Rests pass through.
pub fn transpose_events(events: &[Event], interval: i8) -> Result<Vec<Event>> {
    events
        .iter()
        .map(|ev| match ev.kind {
            EventKind::Rest => Ok(*ev),
            EventKind::Note(pitch) => {
                let shifted = pitch as i16 + interval as i16;
                if !(0..=MAX_PITCH as i16).contains(&shifted) {
                    return Err(MelodyError::PitchOutOfRange { pitch, interval });
                }
                Ok(Event::note(shifted as u8, ev.duration))
            }
        })
        .collect()
}

/// Parse a pitch-class name such as `C`, `F#`, `Bb`, `Ebb`.
pub fn parse_pitch_class(name: &str) -> Option<u8> {
    let mut chars = name.trim().chars();
    let base: i8 = match chars.next()?.to_ascii_uppercase() {
        'C' => 0,
        'D' => 2,
        'E' => 4,
        'F' => 5,
        'G' => 7,
        'A' => 9,
        'B' => 11,
        _ => return None,
    };
    let mut offset = 0i8;
    for c in chars {
        match c {
            '#' => offset += 1,
            'b' | '-' => offset -= 1,
            _ => return None,
        }
    }
    Some((base + offset).rem_euclid(12) as u8)
}

#[derive(Deserialize)]
#[serde(untagged)]
enum TonicRecord {
    Number(u8),
    Name(String),
}

fn deserialize_tonic<'de, D>(deserializer: D) -> std::result::Result<u8, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::Error;
    match TonicRecord::deserialize(deserializer)? {
        TonicRecord::Number(n) if n < 12 => Ok(n),
        TonicRecord::Number(n) => Err(D::Error::custom(format!("tonic {n} is not a pitch class"))),
        TonicRecord::Name(name) => parse_pitch_class(&name)
            .ok_or_else(|| D::Error::custom(format!("unknown tonic {name:?}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_rational::Rational32;

    #[test]
    fn d_major_goes_down_a_whole_step() {
        let d = parse_pitch_class("D").unwrap();
        assert_eq!(plan_transposition(d, KeyMode::Major), -2);
    }

    #[test]
    fn f_sharp_minor_goes_up_a_minor_third() {
        let fs = parse_pitch_class("F#").unwrap();
        assert_eq!(plan_transposition(fs, KeyMode::Minor), 3);
    }

    #[test]
    fn canonical_keys_are_untouched() {
        assert_eq!(plan_transposition(0, KeyMode::Major), 0);
        assert_eq!(plan_transposition(9, KeyMode::Minor), 0);
    }

    #[test]
    fn interval_always_lands_on_target() {
        for tonic in 0..12u8 {
            for mode in [KeyMode::Major, KeyMode::Minor] {
                let iv = plan_transposition(tonic, mode);
                assert!((-11..=11).contains(&iv));
                let landed = (tonic as i8 + iv).rem_euclid(12) as u8;
                assert_eq!(landed, mode.target_pitch_class());
            }
        }
    }

    #[test]
    fn other_modes_are_rejected() {
        let key = KeySignature::new(2, "dorian");
        match key.transposition_interval() {
            Err(MelodyError::UnsupportedMode(m)) => assert_eq!(m, "dorian"),
            other => panic!("expected UnsupportedMode, got {other:?}"),
        }
        assert_eq!(KeySignature::new(2, "Major").transposition_interval().unwrap(), -2);
    }

    #[test]
    fn pitch_class_names() {
        assert_eq!(parse_pitch_class("C"), Some(0));
        assert_eq!(parse_pitch_class("Bb"), Some(10));
        assert_eq!(parse_pitch_class("B#"), Some(0));
        assert_eq!(parse_pitch_class("Cb"), Some(11));
        assert_eq!(parse_pitch_class("E-"), Some(3));
        assert_eq!(parse_pitch_class("H"), None);
        assert_eq!(parse_pitch_class(""), None);
    }

    #[test]
    fn key_files_accept_numbers_or_names() {
        let by_number: KeySignature = serde_json::from_str(r#"{"tonic":6,"mode":"minor"}"#).unwrap();
        let by_name: KeySignature = serde_json::from_str(r#"{"tonic":"F#","mode":"minor"}"#).unwrap();
        assert_eq!(by_number, by_name);
        assert_eq!(by_name.transposition_interval().unwrap(), 3);
        assert!(serde_json::from_str::<KeySignature>(r#"{"tonic":12,"mode":"major"}"#).is_err());
        assert!(serde_json::from_str::<KeySignature>(r#"{"tonic":"X","mode":"major"}"#).is_err());
    }

    #[test]
    fn transposing_moves_notes_only() {
        let one = Rational32::from_integer(1);
        let events = [Event::note(62, one), Event::rest(one), Event::note(66, one)];
        let moved = transpose_events(&events, -2).unwrap();
        assert_eq!(moved, vec![Event::note(60, one), Event::rest(one), Event::note(64, one)]);
    }

    #[test]
    fn transposing_past_the_midi_range_fails() {
        let one = Rational32::from_integer(1);
        let err = transpose_events(&[Event::note(126, one)], 3).unwrap_err();
        assert!(matches!(err, MelodyError::PitchOutOfRange { pitch: 126, interval: 3 }));
        assert!(transpose_events(&[Event::note(1, one)], -2).is_err());
    }
}
