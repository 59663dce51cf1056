// folk_melody CLI.
//
// Three commands over one configuration:
//
//   preprocess   songs/*.json -> per-song token files, corpus, vocabulary,
//                n-gram model; reports the number of training windows
//   generate     seed melody -> sampled continuation -> MIDI
//   to-midi      encoded token files -> MIDI, one file each
//
// Usage:
//   cargo run -p folk_melody -- preprocess [--config FILE] [--songs DIR]
//     [--dataset DIR] [--corpus FILE] [--mapping FILE] [--model FILE]
//     [--time-step X] [--sequence-length N] [--order N]
//   cargo run -p folk_melody -- generate [--config FILE] [--seed-melody "55 _ 60 _"]
//     [--steps N] [--max-sequence-length N] [--temperature T] [--seed N]
//     [--tempo BPM] [--output mel.mid]
//   cargo run -p folk_melody -- to-midi FILE... [--time-step X] [--tempo BPM]
//
// Add --verbose for debug logging or --quiet for warnings only.

use folk_melody::codec::{self, Token};
use folk_melody::config::PipelineConfig;
use folk_melody::corpus::{self, Corpus};
use folk_melody::event::Song;
use folk_melody::generator::{MelodyGenerator, Predictor};
use folk_melody::midi::write_midi;
use folk_melody::window::windows;
use folk_melody::{MelodyError, NgramModel, Result, Vocabulary};
use folk_melody_prng::MelodyRng;
use std::path::{Path, PathBuf};

/// Flags that consume the following argument.
const VALUE_FLAGS: &[&str] = &[
    "--config",
    "--songs",
    "--dataset",
    "--corpus",
    "--mapping",
    "--model",
    "--time-step",
    "--sequence-length",
    "--order",
    "--seed-melody",
    "--steps",
    "--max-sequence-length",
    "--temperature",
    "--seed",
    "--tempo",
    "--output",
];

fn main() {
    let args: Vec<String> = std::env::args().collect();
    init_logging(&args);

    let command = args.get(1).map(String::as_str).unwrap_or("help");
    let result = load_config(&args).and_then(|config| match command {
        "preprocess" => preprocess(&config),
        "generate" => generate(&config, parse_flag(&args, "--output")),
        "to-midi" => to_midi(&config, &positional(&args[2..])),
        _ => {
            print_usage();
            Ok(())
        }
    });

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn print_usage() {
    println!("Usage: folk_melody <preprocess|generate|to-midi> [options]");
    println!("  preprocess   encode songs, build corpus, vocabulary and model");
    println!("  generate     sample a melody and write it as MIDI");
    println!("  to-midi      convert encoded token files to MIDI");
}

fn load_config(args: &[String]) -> Result<PipelineConfig> {
    let mut config = match parse_flag::<PathBuf>(args, "--config") {
        Some(path) => PipelineConfig::load(&path)?,
        None => PipelineConfig::default(),
    };
    if let Some(v) = parse_flag(args, "--songs") {
        config.songs_dir = v;
    }
    if let Some(v) = parse_flag(args, "--dataset") {
        config.encoded_dir = v;
    }
    if let Some(v) = parse_flag(args, "--corpus") {
        config.corpus_path = v;
    }
    if let Some(v) = parse_flag(args, "--mapping") {
        config.mapping_path = v;
    }
    if let Some(v) = parse_flag(args, "--model") {
        config.model_path = v;
    }
    if let Some(v) = parse_flag(args, "--time-step") {
        config.time_step = v;
    }
    if let Some(v) = parse_flag(args, "--sequence-length") {
        config.sequence_length = v;
    }
    let g = &mut config.generation;
    if let Some(v) = parse_flag(args, "--order") {
        g.model_order = v;
    }
    if let Some(v) = parse_flag(args, "--seed-melody") {
        g.seed_melody = v;
    }
    if let Some(v) = parse_flag(args, "--steps") {
        g.num_steps = v;
    }
    if let Some(v) = parse_flag(args, "--max-sequence-length") {
        g.max_sequence_length = v;
    }
    if let Some(v) = parse_flag(args, "--temperature") {
        g.temperature = v;
    }
    if let Some(v) = parse_flag(args, "--seed") {
        g.rng_seed = Some(v);
    }
    if let Some(v) = parse_flag(args, "--tempo") {
        g.tempo_bpm = v;
    }
    config.validate()?;
    Ok(config)
}

fn preprocess(config: &PipelineConfig) -> Result<()> {
    println!("=== folk_melody preprocess ===");
    let step = config.time_step()?;

    println!("[1/4] Loading songs from {}...", config.songs_dir.display());
    let songs = Song::load_dir(&config.songs_dir)?;
    println!("  {} songs loaded.", songs.len());

    println!("[2/4] Filtering, transposing and encoding...");
    let report = corpus::prepare_songs(&songs, &config.acceptable_durations, step);
    println!(
        "  {} accepted, {} rejected by duration, {} failed.",
        report.encoded.len(),
        report.rejected.len(),
        report.failed.len()
    );
    for (id, e) in &report.failed {
        println!("  skipped {id}: {e}");
    }
    corpus::write_encoded_songs(&config.encoded_dir, &report.encoded)?;

    println!("[3/4] Building corpus and vocabulary...");
    let corpus = Corpus::from_songs(&report.encoded, config.sequence_length);
    corpus.save(&config.corpus_path)?;
    let vocab = corpus.vocabulary();
    vocab.save(&config.mapping_path)?;
    println!(
        "  {} tokens, {} symbols -> {}",
        corpus.len(),
        vocab.len(),
        config.mapping_path.display()
    );

    println!("[4/4] Training windows and model...");
    let ids = corpus.to_ids(&vocab)?;
    let pairs = windows(&ids, config.sequence_length).len();
    if pairs == 0 {
        println!(
            "  Corpus of {} tokens is not longer than the window ({}); no training pairs.",
            ids.len(),
            config.sequence_length
        );
    } else {
        println!(
            "  {pairs} training pairs of length {} (one-hot width {}).",
            config.sequence_length,
            vocab.len()
        );
    }
    let model = NgramModel::train(&ids, vocab.len(), config.generation.model_order)?;
    model.save(&config.model_path)?;
    println!("  Model saved to {}.", config.model_path.display());
    Ok(())
}

fn generate(config: &PipelineConfig, output: Option<PathBuf>) -> Result<()> {
    println!("=== folk_melody generate ===");
    let output = output.unwrap_or_else(|| PathBuf::from("mel.mid"));
    let step = config.time_step()?;
    let g = &config.generation;

    println!("[1/3] Loading vocabulary and model...");
    let vocab = Vocabulary::load(&config.mapping_path)?;
    let model = if config.model_path.exists() {
        NgramModel::load(&config.model_path)?
    } else {
        println!("  No model at {}, training from corpus.", config.model_path.display());
        let corpus = Corpus::load(&config.corpus_path)?;
        NgramModel::train(&corpus.to_ids(&vocab)?, vocab.len(), g.model_order)?
    };
    if model.vocab_size() != vocab.len() {
        return Err(MelodyError::InvalidVocabulary(format!(
            "model was trained on {} symbols but the vocabulary has {}",
            model.vocab_size(),
            vocab.len()
        )));
    }
    println!("  {} symbols, order-{} model.", vocab.len(), model.order());

    println!("[2/3] Sampling (temperature {})...", g.temperature);
    let (mut rng, seed) = match g.rng_seed {
        Some(s) => (MelodyRng::new(s), s),
        None => MelodyRng::from_clock(),
    };
    println!("  Seed: {seed}");
    let melody = sample_melody(&model, &vocab, config, &mut rng)?;
    println!("  {}", melody.join(" "));

    println!("[3/3] Writing MIDI to {}...", output.display());
    let tokens = codec::parse_tokens(&melody.join(" "))?;
    let events = codec::decode(&tokens, step)?;
    write_midi(&events, &config.midi_settings(), &output)?;
    println!("  Done! {} events.", events.len());
    Ok(())
}

fn sample_melody<P: Predictor>(
    model: &P,
    vocab: &Vocabulary,
    config: &PipelineConfig,
    rng: &mut MelodyRng,
) -> Result<Vec<String>> {
    let generator = MelodyGenerator::new(model, vocab, config.sequence_length);
    generator.generate(
        &config.generation.seed_melody,
        &config.generation_params(),
        rng,
    )
}

fn to_midi(config: &PipelineConfig, files: &[String]) -> Result<()> {
    if files.is_empty() {
        return Err(MelodyError::InvalidConfig("to-midi needs at least one token file".into()));
    }
    let step = config.time_step()?;
    for file in files {
        let path = Path::new(file);
        let text = std::fs::read_to_string(path)?;
        let tokens: Vec<_> = codec::parse_tokens(&text)?
            .into_iter()
            .filter(|t| *t != Token::SequenceBoundary)
            .collect();
        let events = codec::decode(&tokens, step)?;
        let out = path.with_extension("mid");
        write_midi(&events, &config.midi_settings(), &out)?;
        println!("{} -> {} ({} events)", path.display(), out.display(), events.len());
    }
    Ok(())
}

/// Value following `flag`, if present and parseable. A present flag with a
/// missing or bad value is warned about and ignored.
fn parse_flag<T: std::str::FromStr>(args: &[String], flag: &str) -> Option<T> {
    let i = args.iter().position(|a| a == flag)?;
    let Some(value) = args.get(i + 1) else {
        log::warn!("ignoring {flag}: no value given");
        return None;
    };
    match value.parse() {
        Ok(v) => Some(v),
        Err(_) => {
            log::warn!("ignoring {flag} {value:?}: not a valid value");
            None
        }
    }
}

/// Arguments that are neither flags nor flag values.
fn positional(args: &[String]) -> Vec<String> {
    let mut out = Vec::new();
    let mut skip = false;
    for a in args {
        if skip {
            skip = false;
        } else if VALUE_FLAGS.contains(&a.as_str()) {
            skip = true;
        } else if !a.starts_with("--") {
            out.push(a.clone());
        }
    }
    out
}

/// Minimal stderr backend for the `log` facade.
struct StderrLogger;

impl log::Log for StderrLogger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &log::Record) {
        if self.enabled(record.metadata()) {
            eprintln!("[{}] {}", record.level(), record.args());
        }
    }

    fn flush(&self) {}
}

static LOGGER: StderrLogger = StderrLogger;

fn init_logging(args: &[String]) {
    let level = if args.iter().any(|a| a == "--verbose") {
        log::LevelFilter::Debug
    } else if args.iter().any(|a| a == "--quiet") {
        log::LevelFilter::Warn
    } else {
        log::LevelFilter::Info
    };
    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(level);
    }
}
