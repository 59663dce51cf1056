// Autoregressive melody generation.
//
// Starts from a seed melody written in corpus symbols (`"55 _ _ _ 60 _"`),
// prefixed with a full run of sequence boundaries so the context looks like
// the start of a song in the training corpus. Each step:
//
//   1. keep the last `max_sequence_length` ids as context,
//   2. ask the predictor for a distribution over the vocabulary,
//   3. draw an id with the temperature sampler,
//   4. stop if the id is the boundary symbol, else append it to the melody.
//
// The predictor is the seam for the external sequence model; `NgramModel`
// in `markov.rs` is the built-in implementation.

use crate::codec::BOUNDARY_SYMBOL;
use crate::error::{MelodyError, Result};
use crate::sampler;
use crate::vocab::Vocabulary;
use folk_melody_prng::MelodyRng;

/// Anything that maps a context of vocabulary ids to a probability for each
/// id in the vocabulary.
pub trait Predictor {
    fn predict(&self, context: &[usize]) -> Vec<f64>;
}

/// Per-call generation knobs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationParams {
    /// Upper bound on sampled tokens.
    pub num_steps: usize,
    /// Context length handed to the predictor.
    pub max_sequence_length: usize,
    pub temperature: f64,
}

pub struct MelodyGenerator<'a, P: Predictor> {
    predictor: &'a P,
    vocab: &'a Vocabulary,
    /// Boundary run placed before the seed; matches the corpus delimiter.
    sequence_length: usize,
}

impl<'a, P: Predictor> MelodyGenerator<'a, P> {
    pub fn new(predictor: &'a P, vocab: &'a Vocabulary, sequence_length: usize) -> Self {
        MelodyGenerator {
            predictor,
            vocab,
            sequence_length,
        }
    }

    /// Generate a melody continuing `seed`. The returned symbols include the
    /// seed and never include a boundary.
    pub fn generate(
        &self,
        seed: &str,
        params: &GenerationParams,
        rng: &mut MelodyRng,
    ) -> Result<Vec<String>> {
        if params.max_sequence_length == 0 {
            return Err(MelodyError::InvalidConfig(
                "max_sequence_length must be positive".into(),
            ));
        }
        let boundary = self.vocab.symbol_to_id(BOUNDARY_SYMBOL)?;
        let mut melody: Vec<String> = seed.split_whitespace().map(str::to_string).collect();

        let mut context = vec![boundary; self.sequence_length];
        context.extend(self.vocab.encode_symbols(&melody)?);

        for step in 0..params.num_steps {
            let start = context.len().saturating_sub(params.max_sequence_length);
            let probabilities = self.predictor.predict(&context[start..]);
            if probabilities.len() != self.vocab.len() {
                return Err(MelodyError::InvalidDistribution(format!(
                    "predictor returned {} probabilities for a vocabulary of {}",
                    probabilities.len(),
                    self.vocab.len()
                )));
            }
            let id = sampler::sample(&probabilities, params.temperature, rng)?;
            context.push(id);
            if id == boundary {
                log::debug!("boundary drawn after {step} steps");
                break;
            }
            melody.push(self.vocab.id_to_symbol(id)?.to_string());
        }
        Ok(melody)
    }
}
