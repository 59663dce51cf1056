// Count-based next-token model with backoff.
//
// The real next-token predictor is an external sequence model; this n-gram
// table stands in for it so `generate` runs end to end with nothing but a
// corpus. Trained directly on the id-encoded corpus:
//
// - `tables[k]` maps a context of the last `k + 1` ids to counts of the id
//   that followed it.
// - Prediction backs off from the longest context present in the tables to
//   shorter ones, then to unigram counts.
// - Every id gets a small additive count so the distribution has no zeros.
//
// Saved and loaded as JSON alongside the vocabulary it was trained with.

use crate::error::{MelodyError, Result};
use crate::generator::Predictor;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Next id -> observed count.
type TransitionTable = BTreeMap<usize, f64>;

/// Count added to every id when turning a table into probabilities.
const SMOOTHING: f64 = 0.01;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NgramModel {
    vocab_size: usize,
    /// Longest context length.
    order: usize,
    tables: Vec<BTreeMap<String, TransitionTable>>,
    unigram: TransitionTable,
}

impl NgramModel {
    /// Count transitions in `ids` for context lengths `1..=order`.
    pub fn train(ids: &[usize], vocab_size: usize, order: usize) -> Result<Self> {
        if order == 0 {
            return Err(MelodyError::InvalidConfig("model order must be at least 1".into()));
        }
        if let Some(&bad) = ids.iter().find(|&&id| id >= vocab_size) {
            return Err(MelodyError::UnknownId {
                id: bad,
                size: vocab_size,
            });
        }

        let mut tables = vec![BTreeMap::<String, TransitionTable>::new(); order];
        let mut unigram = TransitionTable::new();
        for (i, &next) in ids.iter().enumerate() {
            *unigram.entry(next).or_insert(0.0) += 1.0;
            for len in 1..=order.min(i) {
                let key = context_key(&ids[i - len..i]);
                *tables[len - 1]
                    .entry(key)
                    .or_default()
                    .entry(next)
                    .or_insert(0.0) += 1.0;
            }
        }

        log::debug!(
            "trained order-{order} model on {} ids ({} contexts)",
            ids.len(),
            tables.iter().map(BTreeMap::len).sum::<usize>()
        );
        Ok(NgramModel {
            vocab_size,
            order,
            tables,
            unigram,
        })
    }

    pub fn vocab_size(&self) -> usize {
        self.vocab_size
    }

    pub fn order(&self) -> usize {
        self.order
    }

    /// The table for the longest suffix of `context` seen in training.
    fn backoff_table(&self, context: &[usize]) -> &TransitionTable {
        for len in (1..=self.order.min(context.len())).rev() {
            let key = context_key(&context[context.len() - len..]);
            if let Some(table) = self.tables[len - 1].get(&key) {
                return table;
            }
        }
        &self.unigram
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        std::fs::write(path, serde_json::to_string(self)?)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        let model: NgramModel = serde_json::from_str(&data)?;
        if model.tables.len() != model.order {
            return Err(MelodyError::InvalidConfig(format!(
                "model declares order {} but has {} tables",
                model.order,
                model.tables.len()
            )));
        }
        Ok(model)
    }
}

impl Predictor for NgramModel {
    fn predict(&self, context: &[usize]) -> Vec<f64> {
        let table = self.backoff_table(context);
        let total: f64 = table.values().sum::<f64>() + SMOOTHING * self.vocab_size as f64;
        (0..self.vocab_size)
            .map(|id| (table.get(&id).copied().unwrap_or(0.0) + SMOOTHING) / total)
            .collect()
    }
}

/// Encode a context as a map key.
fn context_key(context: &[usize]) -> String {
    context
        .iter()
        .map(|i| i.to_string())
        .collect::<Vec<_>>()
        .join(",")
}
