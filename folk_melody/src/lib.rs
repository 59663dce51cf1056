// Folk melody step codec.
//
// Turns monophonic folk songs into categorical training data and back:
// note/rest events are quantized onto a fixed grid as run-length tokens,
// concatenated into a boundary-delimited corpus, mapped to dense integer ids,
// and sliced into fixed-length training windows. Going the other way,
// sampled ids are mapped back to tokens, decoded to events, and written as
// MIDI.
//
// Architecture:
// - event.rs:     Note/rest events with exact rational durations; song input format
// - quantize.rs:  Accepted-duration filter applied before encoding
// - transpose.rs: Key mode parsing and the interval to C major / A minor
// - codec.rs:     Step tokens, encode/decode, token text format
// - corpus.rs:    Parallel per-song preparation and corpus concatenation
// - vocab.rs:     Bidirectional symbol <-> id vocabulary, JSON persistence
// - window.rs:    Sliding (window, target) training pairs, one-hot expansion
// - sampler.rs:   Temperature-scaled categorical sampling
// - markov.rs:    N-gram next-token model with backoff (built-in predictor)
// - generator.rs: Predictor trait and autoregressive melody generation
// - midi.rs:      Standard MIDI File output
// - config.rs:    Pipeline configuration (paths, grid, window, generation)
// - error.rs:     Shared error type
//
// Randomness comes only from a caller-owned `folk_melody_prng::MelodyRng`,
// so generation is reproducible given a seed.

pub mod codec;
pub mod config;
pub mod corpus;
pub mod error;
pub mod event;
pub mod generator;
pub mod markov;
pub mod midi;
pub mod quantize;
pub mod sampler;
pub mod transpose;
pub mod vocab;
pub mod window;

pub use codec::{Symbol, TimeStep, Token, decode, encode};
pub use config::PipelineConfig;
pub use corpus::{Corpus, EncodedSong};
pub use error::{MelodyError, Result};
pub use event::{Duration, Event, EventKind, Song};
pub use generator::{GenerationParams, MelodyGenerator, Predictor};
pub use markov::NgramModel;
pub use quantize::{AcceptableDurations, has_acceptable_durations};
pub use transpose::{KeyMode, KeySignature, plan_transposition};
pub use vocab::Vocabulary;
pub use window::{TrainingPair, windows};
