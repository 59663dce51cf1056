// Error type shared by every stage of the melody pipeline.
//
// All conditions are local and recoverable: the corpus builder logs and skips
// a song that fails, the CLI reports and exits. Variants carry the offending
// value (and position, for token streams) so a failure can be traced back to
// the input without re-running.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MelodyError {
    /// The token stream cannot be turned back into events.
    #[error("malformed token stream at position {position} (`{token}`): {reason}")]
    MalformedTokenStream {
        position: usize,
        token: String,
        reason: &'static str,
    },

    #[error("symbol `{0}` is not in the vocabulary")]
    UnknownSymbol(String),

    #[error("id {id} is outside the vocabulary (size {size})")]
    UnknownId { id: usize, size: usize },

    #[error("invalid probability distribution: {0}")]
    InvalidDistribution(String),

    #[error("unsupported key mode `{0}` (expected major or minor)")]
    UnsupportedMode(String),

    #[error("pitch {pitch} transposed by {interval} leaves the MIDI range")]
    PitchOutOfRange { pitch: u8, interval: i8 },

    #[error("invalid vocabulary: {0}")]
    InvalidVocabulary(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("invalid song `{id}`: {reason}")]
    InvalidSong { id: String, reason: String },

    #[error("MIDI error: {0}")]
    Midi(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, MelodyError>;
