// Step codec: note/rest events <-> fixed-timestep run-length tokens.
//
// A melody is sampled on a fixed grid (a sixteenth note by default). Each
// event becomes one onset token followed by one continuation token for every
// further grid step it lasts:
//
//   Note(60, 1)  Rest(1/2)   at 1/4   ->   60 _ _ _ r _
//
// Sequence boundaries (`/`) separate songs in a concatenated corpus. The
// codec treats a boundary like an onset when scanning (it ends the current
// run) but refuses to turn one into an event: stripping boundaries is the
// corpus layer's job.
//
// Encoding floors `duration / step`, so an off-grid duration is shortened
// rather than rejected; the duration filter in `quantize.rs` keeps such
// durations out in practice. A zero-step event emits nothing.

use crate::error::{MelodyError, Result};
use crate::event::{Duration, Event, EventKind, MAX_PITCH};
use std::fmt;
use std::str::FromStr;

pub const REST_SYMBOL: &str = "r";
pub const CONTINUATION_SYMBOL: &str = "_";
pub const BOUNDARY_SYMBOL: &str = "/";

/// What an onset starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Symbol {
    Pitch(u8),
    Rest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Token {
    Onset(Symbol),
    Continuation,
    SequenceBoundary,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Onset(Symbol::Pitch(p)) => write!(f, "{p}"),
            Token::Onset(Symbol::Rest) => f.write_str(REST_SYMBOL),
            Token::Continuation => f.write_str(CONTINUATION_SYMBOL),
            Token::SequenceBoundary => f.write_str(BOUNDARY_SYMBOL),
        }
    }
}

impl FromStr for Token {
    type Err = MelodyError;

    /// Parse one symbol. Errors report position 0; `parse_tokens` fills in
    /// the real position.
    fn from_str(s: &str) -> Result<Self> {
        match s {
            REST_SYMBOL => Ok(Token::Onset(Symbol::Rest)),
            CONTINUATION_SYMBOL => Ok(Token::Continuation),
            BOUNDARY_SYMBOL => Ok(Token::SequenceBoundary),
            // Pitches are canonical decimals: "060" would format back as "60".
            _ => match s.parse::<u8>() {
                Ok(p)
                    if p <= MAX_PITCH
                        && s.bytes().all(|b| b.is_ascii_digit())
                        && !(s.len() > 1 && s.starts_with('0')) =>
                {
                    Ok(Token::Onset(Symbol::Pitch(p)))
                }
                _ => Err(MelodyError::MalformedTokenStream {
                    position: 0,
                    token: s.to_string(),
                    reason: "unrecognized symbol",
                }),
            },
        }
    }
}

/// Quantization grid, in quarter-note units. Always positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeStep(Duration);

impl TimeStep {
    pub fn new(step: Duration) -> Result<Self> {
        if step <= Duration::from_integer(0) {
            return Err(MelodyError::InvalidConfig(format!(
                "time step must be positive, got {step}"
            )));
        }
        Ok(TimeStep(step))
    }

    /// One sixteenth note (a quarter of a quarter).
    pub fn sixteenth() -> Self {
        TimeStep(Duration::new(1, 4))
    }

    pub fn get(self) -> Duration {
        self.0
    }

    /// Whole grid steps covered by `duration`, rounded down.
    ///
    /// Computed in i64 so no i32 duration can overflow; both denominators
    /// and the step numerator are positive.
    pub fn steps(self, duration: Duration) -> usize {
        let num = *duration.numer() as i64 * *self.0.denom() as i64;
        let den = *duration.denom() as i64 * *self.0.numer() as i64;
        usize::try_from(num.div_euclid(den).max(0)).unwrap_or(usize::MAX)
    }
}

impl Default for TimeStep {
    fn default() -> Self {
        TimeStep::sixteenth()
    }
}

/// Encode events into step tokens.
pub fn encode(events: &[Event], step: TimeStep) -> Vec<Token> {
    let mut tokens = Vec::new();
    for ev in events {
        let steps = step.steps(ev.duration);
        if steps == 0 {
            continue;
        }
        let symbol = match ev.kind {
            EventKind::Note(p) => Symbol::Pitch(p),
            EventKind::Rest => Symbol::Rest,
        };
        tokens.push(Token::Onset(symbol));
        tokens.extend(std::iter::repeat_n(Token::Continuation, steps - 1));
    }
    tokens
}

/// Decode step tokens back into events.
///
/// Fails with `MalformedTokenStream` on a continuation that has no onset to
/// extend (only possible at position 0) and on a boundary that would have
/// to be emitted as an event.
pub fn decode(tokens: &[Token], step: TimeStep) -> Result<Vec<Event>> {
    // (position, onset) of the run being accumulated; `None` onset marks a
    // boundary run.
    let mut current: Option<(usize, Option<Symbol>)> = None;
    let mut run: i32 = 1;
    let mut events = Vec::new();

    for (position, token) in tokens.iter().enumerate() {
        let next = match token {
            Token::Continuation => {
                if current.is_none() {
                    return Err(MelodyError::MalformedTokenStream {
                        position,
                        token: CONTINUATION_SYMBOL.to_string(),
                        reason: "continuation without a preceding onset",
                    });
                }
                run += 1;
                continue;
            }
            Token::Onset(symbol) => (position, Some(*symbol)),
            Token::SequenceBoundary => (position, None),
        };
        if let Some(run_start) = current.replace(next) {
            events.push(flush(run_start, run, step)?);
        }
        run = 1;
    }
    if let Some(run_start) = current {
        events.push(flush(run_start, run, step)?);
    }
    Ok(events)
}

fn flush((position, onset): (usize, Option<Symbol>), run: i32, step: TimeStep) -> Result<Event> {
    let duration = step.get() * Duration::from_integer(run);
    match onset {
        Some(Symbol::Pitch(p)) => Ok(Event::note(p, duration)),
        Some(Symbol::Rest) => Ok(Event::rest(duration)),
        None => Err(MelodyError::MalformedTokenStream {
            position,
            token: BOUNDARY_SYMBOL.to_string(),
            reason: "sequence boundary inside a melody",
        }),
    }
}

/// Parse whitespace-separated symbols.
pub fn parse_tokens(text: &str) -> Result<Vec<Token>> {
    text.split_whitespace()
        .enumerate()
        .map(|(position, s)| {
            s.parse::<Token>().map_err(|e| match e {
                MelodyError::MalformedTokenStream { token, reason, .. } => {
                    MelodyError::MalformedTokenStream {
                        position,
                        token,
                        reason,
                    }
                }
                other => other,
            })
        })
        .collect()
}

/// Join tokens with single spaces, no trailing whitespace.
pub fn format_tokens(tokens: &[Token]) -> String {
    tokens
        .iter()
        .map(|t| t.to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn q(n: i32, d: i32) -> Duration {
        Duration::new(n, d)
    }

    fn sixteenth() -> TimeStep {
        TimeStep::sixteenth()
    }

    #[test]
    fn quarter_note_then_eighth_rest() {
        let events = [Event::note(60, q(1, 1)), Event::rest(q(1, 2))];
        let tokens = encode(&events, sixteenth());
        assert_eq!(format_tokens(&tokens), "60 _ _ _ r _");
        assert_eq!(decode(&tokens, sixteenth()).unwrap(), events);
    }

    #[test]
    fn round_trip_on_grid() {
        let events = vec![
            Event::note(67, q(3, 4)),
            Event::note(69, q(1, 4)),
            Event::rest(q(2, 1)),
            Event::note(72, q(3, 2)),
            Event::note(72, q(1, 2)),
            Event::rest(q(1, 4)),
        ];
        let tokens = encode(&events, sixteenth());
        assert_eq!(decode(&tokens, sixteenth()).unwrap(), events);

        let eighth = TimeStep::new(q(1, 4) * q(2, 1)).unwrap();
        let tokens = encode(&events[2..5], eighth);
        assert_eq!(decode(&tokens, eighth).unwrap(), events[2..5].to_vec());
    }

    #[test]
    fn token_count_is_sum_of_steps() {
        let events = [
            Event::note(60, q(4, 1)),
            Event::rest(q(3, 4)),
            Event::note(62, q(1, 4)),
        ];
        let step = sixteenth();
        let expected: usize = events.iter().map(|e| step.steps(e.duration)).sum();
        assert_eq!(expected, 16 + 3 + 1);
        assert_eq!(encode(&events, step).len(), expected);
    }

    #[test]
    fn off_grid_durations_floor() {
        // 3/8 at a sixteenth grid is 1.5 steps -> 1 token.
        let tokens = encode(&[Event::note(60, q(3, 8))], sixteenth());
        assert_eq!(format_tokens(&tokens), "60");
    }

    #[test]
    fn huge_durations_do_not_overflow() {
        assert_eq!(sixteenth().steps(q(i32::MAX, 1)), i32::MAX as usize * 4);
        assert_eq!(sixteenth().steps(q(i32::MAX, i32::MAX - 1)), 4);
        let tokens = encode(&[Event::note(60, q(i32::MAX, i32::MAX - 1))], sixteenth());
        assert_eq!(format_tokens(&tokens), "60 _ _ _");

        let coarse = TimeStep::new(q(i32::MAX / 2, 1)).unwrap();
        assert_eq!(coarse.steps(q(i32::MAX, 1)), 2);
        assert_eq!(coarse.steps(q(1, i32::MAX)), 0);
    }

    #[test]
    fn zero_step_events_vanish() {
        let events = [
            Event::note(60, q(1, 8)),
            Event::note(62, q(1, 4)),
        ];
        assert_eq!(format_tokens(&encode(&events, sixteenth())), "62");
    }

    #[test]
    fn trailing_onset_flushes_one_step() {
        let tokens = parse_tokens("60 _ 62").unwrap();
        let events = decode(&tokens, sixteenth()).unwrap();
        assert_eq!(events, vec![Event::note(60, q(1, 2)), Event::note(62, q(1, 4))]);
    }

    #[test]
    fn leading_continuation_is_an_error() {
        let tokens = parse_tokens("_ 60 _").unwrap();
        match decode(&tokens, sixteenth()) {
            Err(MelodyError::MalformedTokenStream { position, token, .. }) => {
                assert_eq!(position, 0);
                assert_eq!(token, "_");
            }
            other => panic!("expected MalformedTokenStream, got {other:?}"),
        }
    }

    #[test]
    fn boundary_ends_a_run_but_cannot_be_emitted() {
        let tokens = parse_tokens("60 _ / 62").unwrap();
        match decode(&tokens, sixteenth()) {
            Err(MelodyError::MalformedTokenStream { position, token, .. }) => {
                assert_eq!(position, 2);
                assert_eq!(token, "/");
            }
            other => panic!("expected MalformedTokenStream, got {other:?}"),
        }
    }

    #[test]
    fn empty_stream_decodes_to_nothing() {
        assert!(decode(&[], sixteenth()).unwrap().is_empty());
    }

    #[test]
    fn parses_every_symbol_kind() {
        let tokens = parse_tokens("  0 127\tr _\n/ ").unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::Onset(Symbol::Pitch(0)),
                Token::Onset(Symbol::Pitch(127)),
                Token::Onset(Symbol::Rest),
                Token::Continuation,
                Token::SequenceBoundary,
            ]
        );
    }

    #[test]
    fn rejects_unknown_symbols_with_position() {
        for (text, bad_pos) in [("60 _ x", 2), ("128", 0), ("60 +5", 1), ("r -1", 1)] {
            match parse_tokens(text) {
                Err(MelodyError::MalformedTokenStream { position, .. }) => {
                    assert_eq!(position, bad_pos, "{text}")
                }
                other => panic!("{text}: expected error, got {other:?}"),
            }
        }
    }

    #[test]
    fn pitch_text_is_canonical() {
        for bad in ["060", "00", "0127"] {
            assert!(bad.parse::<Token>().is_err(), "accepted {bad}");
        }
        assert_eq!("0".parse::<Token>().unwrap(), Token::Onset(Symbol::Pitch(0)));
        assert_eq!("60".parse::<Token>().unwrap().to_string(), "60");
        assert!(parse_tokens("60 _ 060").is_err());
    }

    #[test]
    fn time_step_must_be_positive() {
        assert!(TimeStep::new(q(0, 1)).is_err());
        assert!(TimeStep::new(q(-1, 4)).is_err());
        assert_eq!(TimeStep::new(q(1, 4)).unwrap(), TimeStep::default());
    }
}
