// Pipeline configuration.
//
// Every path and tunable the pipeline reads lives in `PipelineConfig`,
// loaded from JSON (any field may be omitted; omitted fields take the
// defaults below) and then overridden by CLI flags. Library functions never
// reach for a default path on their own: they receive what they need from
// here.
//
// Defaults reproduce the classic folk-song setup: sixteenth-note grid,
// 64-token windows, sixteenth through whole-note durations, temperature 0.7.

use crate::codec::TimeStep;
use crate::error::{MelodyError, Result};
use crate::event::duration_from_f64;
use crate::generator::GenerationParams;
use crate::midi::{MIN_TEMPO_BPM, MidiSettings};
use crate::quantize::AcceptableDurations;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Directory of song JSON files from the score provider.
    pub songs_dir: PathBuf,
    /// One encoded text file per accepted song.
    pub encoded_dir: PathBuf,
    /// Concatenated corpus text.
    pub corpus_path: PathBuf,
    /// Persisted vocabulary.
    pub mapping_path: PathBuf,
    /// Persisted n-gram model.
    pub model_path: PathBuf,
    /// Quantization grid in quarter lengths.
    pub time_step: f64,
    /// Training window length; also the boundary run between songs.
    pub sequence_length: usize,
    pub acceptable_durations: AcceptableDurations,
    pub generation: GenerationConfig,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Symbols to start from, in corpus notation.
    pub seed_melody: String,
    pub num_steps: usize,
    pub max_sequence_length: usize,
    pub temperature: f64,
    /// RNG seed; `None` seeds from the clock.
    pub rng_seed: Option<u64>,
    /// Longest context the n-gram model conditions on.
    pub model_order: usize,
    pub tempo_bpm: u16,
    pub program: u8,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            songs_dir: PathBuf::from("songs"),
            encoded_dir: PathBuf::from("dataset"),
            corpus_path: PathBuf::from("file_dataset"),
            mapping_path: PathBuf::from("mapping.json"),
            model_path: PathBuf::from("model.json"),
            time_step: 0.25,
            sequence_length: 64,
            acceptable_durations: AcceptableDurations::default(),
            generation: GenerationConfig::default(),
        }
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        GenerationConfig {
            seed_melody: "55 _ _ _ 60 _ _ _ 55 _ _ _ 55 _".to_string(),
            num_steps: 500,
            max_sequence_length: 64,
            temperature: 0.7,
            rng_seed: None,
            model_order: 4,
            tempo_bpm: 120,
            program: 0,
        }
    }
}

impl PipelineConfig {
    /// Load from a JSON file and validate.
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        let config: PipelineConfig = serde_json::from_str(&data)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.sequence_length == 0 {
            return Err(MelodyError::InvalidConfig("sequence_length must be positive".into()));
        }
        if self.acceptable_durations.is_empty() {
            return Err(MelodyError::InvalidConfig(
                "acceptable_durations must not be empty".into(),
            ));
        }
        let step = self.time_step()?;
        if let Some(d) = self
            .acceptable_durations
            .iter()
            .find(|&d| !(d / step.get()).is_integer())
        {
            log::warn!(
                "accepted duration {d} is not a multiple of the time step {}; it will be shortened",
                step.get()
            );
        }
        let g = &self.generation;
        if !(g.temperature.is_finite() && g.temperature > 0.0) {
            return Err(MelodyError::InvalidConfig(format!(
                "temperature must be positive, got {}",
                g.temperature
            )));
        }
        if g.max_sequence_length == 0 {
            return Err(MelodyError::InvalidConfig(
                "max_sequence_length must be positive".into(),
            ));
        }
        if g.model_order == 0 {
            return Err(MelodyError::InvalidConfig("model_order must be positive".into()));
        }
        if g.tempo_bpm < MIN_TEMPO_BPM {
            return Err(MelodyError::InvalidConfig(format!(
                "tempo_bpm must be at least {MIN_TEMPO_BPM}, got {}",
                g.tempo_bpm
            )));
        }
        if g.program > 127 {
            return Err(MelodyError::InvalidConfig(format!(
                "program {} is not a General MIDI program",
                g.program
            )));
        }
        Ok(())
    }

    pub fn time_step(&self) -> Result<TimeStep> {
        let step = duration_from_f64(self.time_step).ok_or_else(|| {
            MelodyError::InvalidConfig(format!(
                "time_step must be a positive number, got {}",
                self.time_step
            ))
        })?;
        TimeStep::new(step)
    }

    pub fn generation_params(&self) -> GenerationParams {
        GenerationParams {
            num_steps: self.generation.num_steps,
            max_sequence_length: self.generation.max_sequence_length,
            temperature: self.generation.temperature,
        }
    }

    pub fn midi_settings(&self) -> MidiSettings {
        MidiSettings {
            tempo_bpm: self.generation.tempo_bpm,
            program: self.generation.program,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Duration;

    #[test]
    fn defaults_are_valid() {
        let config = PipelineConfig::default();
        config.validate().unwrap();
        assert_eq!(config.time_step().unwrap(), TimeStep::sixteenth());
    }

    #[test]
    fn partial_json_fills_defaults() {
        let config: PipelineConfig = serde_json::from_str(
            r#"{"sequence_length": 32, "generation": {"temperature": 1.2}}"#,
        )
        .unwrap();
        assert_eq!(config.sequence_length, 32);
        assert_eq!(config.generation.temperature, 1.2);
        assert_eq!(config.generation.num_steps, 500);
        assert_eq!(config.mapping_path, PathBuf::from("mapping.json"));
    }

    #[test]
    fn round_trips_through_json() {
        let config = PipelineConfig::default();
        let json = serde_json::to_string_pretty(&config).unwrap();
        let back: PipelineConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn rejects_bad_values() {
        let with_generation = |generation| PipelineConfig {
            generation,
            ..Default::default()
        };
        let bad = [
            PipelineConfig {
                time_step: 0.0,
                ..Default::default()
            },
            PipelineConfig {
                sequence_length: 0,
                ..Default::default()
            },
            PipelineConfig {
                acceptable_durations: AcceptableDurations::new(Vec::<Duration>::new()),
                ..Default::default()
            },
            with_generation(GenerationConfig {
                temperature: -0.5,
                ..Default::default()
            }),
            with_generation(GenerationConfig {
                model_order: 0,
                ..Default::default()
            }),
            with_generation(GenerationConfig {
                tempo_bpm: 3,
                ..Default::default()
            }),
            with_generation(GenerationConfig {
                program: 128,
                ..Default::default()
            }),
        ];
        for config in bad {
            assert!(config.validate().is_err(), "accepted {config:?}");
        }
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"time_step": 0.5, "songs_dir": "kern"}"#).unwrap();
        let config = PipelineConfig::load(&path).unwrap();
        assert_eq!(config.songs_dir, PathBuf::from("kern"));
        assert_eq!(config.time_step().unwrap().get(), Duration::new(1, 2));

        std::fs::write(&path, r#"{"generation": {"max_sequence_length": 0}}"#).unwrap();
        assert!(PipelineConfig::load(&path).is_err());
    }
}
