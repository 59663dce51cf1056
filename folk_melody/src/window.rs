// Sliding-window training pairs over an id-encoded corpus.
//
// For a corpus of `n` ids and window length `L`, pair `i` is
// `(ids[i..i + L], ids[i + L])` for `0 <= i < n - L`. A corpus not longer
// than the window yields no pairs (an empty iterator, not an error).
//
// `Windows` borrows the corpus and is `Clone`, so a training loop can
// restart it each epoch without copying the ids.
//
// One-hot width always comes from the vocabulary size, never from the number
// of distinct ids that happen to appear in the corpus: a model trained on one
// corpus and sampled with the persisted vocabulary must agree on the width.

use crate::error::{MelodyError, Result};
use crate::vocab::Vocabulary;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrainingPair {
    pub window: Vec<usize>,
    pub target: usize,
}

/// Lazy iterator over training pairs.
#[derive(Debug, Clone)]
pub struct Windows<'a> {
    ids: &'a [usize],
    length: usize,
    next: usize,
}

impl Windows<'_> {
    /// Number of pairs the full iteration produces.
    pub fn total(&self) -> usize {
        self.ids.len().saturating_sub(self.length)
    }
}

impl Iterator for Windows<'_> {
    type Item = TrainingPair;

    fn next(&mut self) -> Option<TrainingPair> {
        if self.length == 0 || self.next >= self.total() {
            return None;
        }
        let i = self.next;
        self.next += 1;
        Some(TrainingPair {
            window: self.ids[i..i + self.length].to_vec(),
            target: self.ids[i + self.length],
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = if self.length == 0 {
            0
        } else {
            self.total().saturating_sub(self.next)
        };
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Windows<'_> {}

/// Slide a window of `length` over `ids` with stride 1. A zero length
/// yields nothing.
pub fn windows(ids: &[usize], length: usize) -> Windows<'_> {
    Windows {
        ids,
        length,
        next: 0,
    }
}

/// One-hot row of `width` with a 1.0 at `id`.
pub fn one_hot(id: usize, width: usize) -> Result<Vec<f32>> {
    if id >= width {
        return Err(MelodyError::UnknownId { id, size: width });
    }
    let mut row = vec![0.0; width];
    row[id] = 1.0;
    Ok(row)
}

/// One-hot encode a window: one row per id, `vocab.len()` columns.
pub fn one_hot_window(window: &[usize], vocab: &Vocabulary) -> Result<Vec<Vec<f32>>> {
    window.iter().map(|&id| one_hot(id, vocab.len())).collect()
}

/// Expand pairs into `(one-hot windows, targets)` in pair order, the shape a
/// categorical sequence model trains on.
pub fn one_hot_pairs<I>(pairs: I, vocab: &Vocabulary) -> Result<(Vec<Vec<Vec<f32>>>, Vec<usize>)>
where
    I: IntoIterator<Item = TrainingPair>,
{
    let mut inputs = Vec::new();
    let mut targets = Vec::new();
    for pair in pairs {
        if pair.target >= vocab.len() {
            return Err(MelodyError::UnknownId {
                id: pair.target,
                size: vocab.len(),
            });
        }
        inputs.push(one_hot_window(&pair.window, vocab)?);
        targets.push(pair.target);
    }
    Ok((inputs, targets))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn produces_n_minus_l_pairs() {
        let ids: Vec<usize> = (0..10).collect();
        for length in 1..10 {
            let pairs: Vec<_> = windows(&ids, length).collect();
            assert_eq!(pairs.len(), 10 - length);
            assert_eq!(windows(&ids, length).len(), 10 - length);
        }
    }

    #[test]
    fn short_corpus_yields_nothing() {
        let ids = [1, 2, 3];
        assert_eq!(windows(&ids, 3).count(), 0);
        assert_eq!(windows(&ids, 7).count(), 0);
        assert_eq!(windows(&ids, 0).count(), 0);
        assert_eq!(windows(&[], 1).count(), 0);
    }

    #[test]
    fn pair_contents() {
        let ids = [4, 8, 15, 16, 23, 42];
        let pairs: Vec<_> = windows(&ids, 4).collect();
        assert_eq!(
            pairs,
            vec![
                TrainingPair { window: vec![4, 8, 15, 16], target: 23 },
                TrainingPair { window: vec![8, 15, 16, 23], target: 42 },
            ]
        );
    }

    #[test]
    fn restarting_repeats_the_sequence() {
        let ids = [0, 1, 0, 2, 1, 1, 0];
        let it = windows(&ids, 2);
        let first: Vec<_> = it.clone().collect();
        let second: Vec<_> = it.collect();
        assert_eq!(first, second);
    }

    #[test]
    fn size_hint_tracks_progress() {
        let ids = [0, 1, 2, 3, 4];
        let mut it = windows(&ids, 2);
        assert_eq!(it.len(), 3);
        it.next();
        assert_eq!(it.len(), 2);
    }

    #[test]
    fn one_hot_width_follows_vocabulary() {
        // Corpus uses only ids 0 and 2 of a 4-symbol vocabulary.
        let vocab = Vocabulary::from_text("60 62 _ r");
        let ids = [0, 2, 0, 2];
        let (inputs, targets) = one_hot_pairs(windows(&ids, 2), &vocab).unwrap();
        assert_eq!(inputs.len(), 2);
        assert_eq!(targets, vec![0, 2]);
        for window in &inputs {
            assert_eq!(window.len(), 2);
            for row in window {
                assert_eq!(row.len(), 4);
                assert_eq!(row.iter().sum::<f32>(), 1.0);
            }
        }
        assert_eq!(inputs[0][1], vec![0.0, 0.0, 1.0, 0.0]);
    }

    #[test]
    fn one_hot_rejects_ids_past_width() {
        assert!(one_hot(3, 3).is_err());
        let vocab = Vocabulary::from_text("a b");
        assert!(one_hot_pairs(windows(&[0, 1, 5], 2), &vocab).is_err());
    }
}
