// Duration filter applied before encoding.
//
// The step codec only represents durations that are whole multiples of its
// timestep. Songs containing anything else (triplets, 32nds, odd tied
// values) are dropped up front rather than being silently distorted.
// Membership is exact rational equality, never a tolerance check.

use crate::event::{Duration, Event, duration_from_f64};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Set of accepted quarter-length durations. Serialized as a list of
/// decimal quarter lengths (`[0.25, 0.5, 0.75, ...]`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<f64>", into = "Vec<f64>")]
pub struct AcceptableDurations {
    durations: BTreeSet<Duration>,
}

impl AcceptableDurations {
    pub fn new(durations: impl IntoIterator<Item = Duration>) -> Self {
        AcceptableDurations {
            durations: durations.into_iter().collect(),
        }
    }

    pub fn contains(&self, duration: Duration) -> bool {
        self.durations.contains(&duration)
    }

    pub fn iter(&self) -> impl Iterator<Item = Duration> + '_ {
        self.durations.iter().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.durations.is_empty()
    }
}

impl TryFrom<Vec<f64>> for AcceptableDurations {
    type Error = String;

    fn try_from(values: Vec<f64>) -> Result<Self, Self::Error> {
        values
            .into_iter()
            .map(|x| duration_from_f64(x).ok_or_else(|| format!("bad duration {x}")))
            .collect::<Result<Vec<_>, _>>()
            .map(AcceptableDurations::new)
    }
}

impl From<AcceptableDurations> for Vec<f64> {
    fn from(accepted: AcceptableDurations) -> Self {
        accepted
            .iter()
            .map(|d| *d.numer() as f64 / *d.denom() as f64)
            .collect()
    }
}

impl Default for AcceptableDurations {
    /// Sixteenth through whole note, including dotted eighth, dotted
    /// quarter and dotted half.
    fn default() -> Self {
        AcceptableDurations::new(
            [(1, 4), (1, 2), (3, 4), (1, 1), (3, 2), (2, 1), (3, 1), (4, 1)]
                .into_iter()
                .map(|(n, d)| Duration::new(n, d)),
        )
    }
}

/// True iff every event's duration is in `accepted`.
pub fn has_acceptable_durations(events: &[Event], accepted: &AcceptableDurations) -> bool {
    first_unacceptable(events, accepted).is_none()
}

/// Index and duration of the first event outside `accepted`.
pub fn first_unacceptable(
    events: &[Event],
    accepted: &AcceptableDurations,
) -> Option<(usize, Duration)> {
    events
        .iter()
        .enumerate()
        .find(|(_, ev)| !accepted.contains(ev.duration))
        .map(|(i, ev)| (i, ev.duration))
}
