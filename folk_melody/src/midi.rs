// MIDI output for decoded melodies.
//
// Writes a Standard MIDI File, format 0: one track holding the tempo, a
// program change, and a NoteOn/NoteOff pair per note. Rests only advance
// time. Quarter-length durations convert to ticks exactly at 480 ticks per
// quarter for every duration whose denominator divides 480; anything finer
// is floored to the tick.
//
// Uses the `midly` crate for encoding.

use crate::error::{MelodyError, Result};
use crate::event::{Duration, Event, EventKind};
use midly::{
    Format, Header, MetaMessage, MidiMessage, Smf, Timing, Track, TrackEvent, TrackEventKind,
    num::{u4, u7, u15, u24, u28},
};
use std::path::Path;

/// Ticks per quarter note in MIDI output.
pub const TICKS_PER_QUARTER: u16 = 480;

/// Slowest tempo whose microseconds-per-quarter fits the 24-bit tempo field.
pub const MIN_TEMPO_BPM: u16 = 4;

const CHANNEL: u8 = 0;
const VELOCITY: u8 = 80;

/// Output settings for `write_midi`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MidiSettings {
    pub tempo_bpm: u16,
    /// General MIDI program (0 = acoustic grand piano).
    pub program: u8,
}

impl Default for MidiSettings {
    fn default() -> Self {
        MidiSettings {
            tempo_bpm: 120,
            program: 0,
        }
    }
}

/// Convert events to MIDI and write them to `path`.
pub fn write_midi(events: &[Event], settings: &MidiSettings, path: &Path) -> Result<()> {
    let smf = events_to_smf(events, settings)?;
    let mut buf = Vec::new();
    smf.write_std(&mut buf)?;
    std::fs::write(path, &buf)?;
    Ok(())
}

/// Largest delta time a track event can carry.
const MAX_DELTA: u32 = (1 << 28) - 1;

/// Duration in ticks, floored. Computed in i64 so no duration overflows.
fn ticks(duration: Duration) -> Result<u32> {
    let t = (*duration.numer() as i64 * TICKS_PER_QUARTER as i64)
        .div_euclid(*duration.denom() as i64);
    u32::try_from(t)
        .ok()
        .filter(|&t| t <= MAX_DELTA)
        .ok_or_else(|| {
            MelodyError::Midi(format!("duration {duration} does not fit a MIDI delta"))
        })
}

/// Checked delta, so oversized gaps are reported instead of masked.
fn delta(ticks: u32) -> Result<u28> {
    if ticks > MAX_DELTA {
        return Err(MelodyError::Midi(format!(
            "gap of {ticks} ticks does not fit a MIDI delta"
        )));
    }
    Ok(u28::new(ticks))
}

/// Build an in-memory single-track SMF.
pub fn events_to_smf(events: &[Event], settings: &MidiSettings) -> Result<Smf<'static>> {
    if settings.tempo_bpm < MIN_TEMPO_BPM {
        return Err(MelodyError::Midi(format!(
            "tempo {} BPM is below the {MIN_TEMPO_BPM} BPM a MIDI tempo event can hold",
            settings.tempo_bpm
        )));
    }
    if settings.program > 127 {
        return Err(MelodyError::Midi(format!("program {} out of range", settings.program)));
    }

    let mut smf = Smf::new(Header::new(
        Format::SingleTrack,
        Timing::Metrical(u15::new(TICKS_PER_QUARTER)),
    ));
    let channel = u4::new(CHANNEL);

    let mut track: Track<'static> = Vec::new();
    let tempo_microseconds = 60_000_000 / settings.tempo_bpm as u32;
    track.push(TrackEvent {
        delta: u28::new(0),
        kind: TrackEventKind::Meta(MetaMessage::Tempo(u24::new(tempo_microseconds))),
    });
    track.push(TrackEvent {
        delta: u28::new(0),
        kind: TrackEventKind::Midi {
            channel,
            message: MidiMessage::ProgramChange {
                program: u7::new(settings.program),
            },
        },
    });

    // Ticks elapsed since the last emitted event.
    let mut pending: u32 = 0;
    for ev in events {
        let length = ticks(ev.duration)?;
        match ev.kind {
            EventKind::Rest => pending = pending.saturating_add(length),
            EventKind::Note(pitch) => {
                if length == 0 {
                    continue;
                }
                track.push(TrackEvent {
                    delta: delta(pending)?,
                    kind: TrackEventKind::Midi {
                        channel,
                        message: MidiMessage::NoteOn {
                            key: u7::new(pitch),
                            vel: u7::new(VELOCITY),
                        },
                    },
                });
                track.push(TrackEvent {
                    delta: u28::new(length),
                    kind: TrackEventKind::Midi {
                        channel,
                        message: MidiMessage::NoteOff {
                            key: u7::new(pitch),
                            vel: u7::new(0),
                        },
                    },
                });
                pending = 0;
            }
        }
    }

    // A trailing rest still lengthens the file.
    track.push(TrackEvent {
        delta: delta(pending)?,
        kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
    });
    smf.tracks.push(track);
    Ok(smf)
}
