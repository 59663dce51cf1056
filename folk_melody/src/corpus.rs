// Corpus construction: songs -> filtered, transposed, encoded token streams
// -> one concatenated corpus.
//
// Per-song work (duration filter, transposition, encoding) is independent,
// so it runs on rayon's pool. Results are sorted by song id before
// concatenation; the corpus, and everything derived from it (vocabulary,
// training windows), is therefore identical across runs and thread counts.
//
// A song that fails (unsupported key mode, a pitch pushed out of range) is
// logged and skipped; it never aborts the batch. A song with unacceptable
// durations is counted as rejected, not failed.
//
// Layout: each song's tokens followed by `sequence_length` boundary tokens,
// so every song, including the last, is terminated by a full boundary run.

use crate::codec::{self, TimeStep, Token};
use crate::error::{MelodyError, Result};
use crate::event::Song;
use crate::quantize::{AcceptableDurations, first_unacceptable};
use crate::transpose::transpose_events;
use crate::vocab::Vocabulary;
use rayon::prelude::*;
use std::path::Path;

/// A song ready for the corpus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedSong {
    pub id: String,
    /// Semitones applied to reach C major / A minor.
    pub interval: i8,
    pub tokens: Vec<Token>,
}

/// What happened to each input song.
#[derive(Debug, Default)]
pub struct PrepareReport {
    /// Accepted songs, sorted by id.
    pub encoded: Vec<EncodedSong>,
    /// Ids of songs dropped by the duration filter.
    pub rejected: Vec<String>,
    /// Songs that errored, with the reason.
    pub failed: Vec<(String, MelodyError)>,
}

enum Prepared {
    Encoded(EncodedSong),
    Rejected(String),
    Failed(String, MelodyError),
}

/// Filter, transpose and encode one song. `Ok(None)` means the song has a
/// duration outside `accepted`.
pub fn prepare_song(
    song: &Song,
    accepted: &AcceptableDurations,
    step: TimeStep,
) -> Result<Option<EncodedSong>> {
    if let Some((index, duration)) = first_unacceptable(&song.events, accepted) {
        log::debug!("{}: event {index} has unacceptable duration {duration}", song.id);
        return Ok(None);
    }
    // Songs without a declared key are taken as already in C major / A minor.
    let interval = match &song.key {
        Some(key) => key.transposition_interval()?,
        None => 0,
    };
    let events = transpose_events(&song.events, interval)?;
    Ok(Some(EncodedSong {
        id: song.id.clone(),
        interval,
        tokens: codec::encode(&events, step),
    }))
}

/// Prepare every song in parallel and sort the results by id.
pub fn prepare_songs(songs: &[Song], accepted: &AcceptableDurations, step: TimeStep) -> PrepareReport {
    let outcomes: Vec<Prepared> = songs
        .par_iter()
        .map(|song| match prepare_song(song, accepted, step) {
            Ok(Some(encoded)) => Prepared::Encoded(encoded),
            Ok(None) => Prepared::Rejected(song.id.clone()),
            Err(e) => Prepared::Failed(song.id.clone(), e),
        })
        .collect();

    let mut report = PrepareReport::default();
    for outcome in outcomes {
        match outcome {
            Prepared::Encoded(s) => report.encoded.push(s),
            Prepared::Rejected(id) => report.rejected.push(id),
            Prepared::Failed(id, e) => {
                log::warn!("skipping song {id}: {e}");
                report.failed.push((id, e));
            }
        }
    }
    report.encoded.sort_by(|a, b| a.id.cmp(&b.id));
    report.rejected.sort();
    report.failed.sort_by(|a, b| a.0.cmp(&b.0));
    log::info!(
        "prepared {} songs ({} rejected by duration, {} failed)",
        report.encoded.len(),
        report.rejected.len(),
        report.failed.len()
    );
    report
}

/// Concatenated token stream of many songs.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Corpus {
    tokens: Vec<Token>,
}

impl Corpus {
    pub fn from_songs(songs: &[EncodedSong], sequence_length: usize) -> Self {
        let mut tokens = Vec::new();
        for song in songs {
            tokens.extend_from_slice(&song.tokens);
            tokens.extend(std::iter::repeat_n(Token::SequenceBoundary, sequence_length));
        }
        Corpus { tokens }
    }

    pub fn from_tokens(tokens: Vec<Token>) -> Self {
        Corpus { tokens }
    }

    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn to_text(&self) -> String {
        codec::format_tokens(&self.tokens)
    }

    pub fn parse(text: &str) -> Result<Self> {
        Ok(Corpus {
            tokens: codec::parse_tokens(text)?,
        })
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_text())?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        Corpus::parse(&std::fs::read_to_string(path)?)
    }

    /// Per-song token runs with boundaries stripped. Empty runs between
    /// consecutive boundaries are dropped.
    pub fn songs(&self) -> Vec<&[Token]> {
        self.tokens
            .split(|t| *t == Token::SequenceBoundary)
            .filter(|run| !run.is_empty())
            .collect()
    }

    pub fn vocabulary(&self) -> Vocabulary {
        Vocabulary::from_tokens(&self.tokens)
    }

    pub fn to_ids(&self, vocab: &Vocabulary) -> Result<Vec<usize>> {
        vocab.encode_tokens(&self.tokens)
    }
}

/// Write each song's tokens to `dir/<id>`, creating `dir` if needed.
/// Characters outside `[A-Za-z0-9._-]` in ids become `_`.
pub fn write_encoded_songs(dir: &Path, songs: &[EncodedSong]) -> Result<()> {
    std::fs::create_dir_all(dir)?;
    for song in songs {
        let name: String = song
            .id
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        std::fs::write(dir.join(name), codec::format_tokens(&song.tokens))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{Duration, Event};
    use crate::transpose::KeySignature;

    fn q(n: i32, d: i32) -> Duration {
        Duration::new(n, d)
    }

    fn song(id: &str, key: Option<KeySignature>, events: Vec<Event>) -> Song {
        Song {
            id: id.to_string(),
            key,
            events,
        }
    }

    #[test]
    fn transposes_then_encodes() {
        let s = song(
            "d-major",
            Some(KeySignature::new(2, "major")),
            vec![Event::note(62, q(1, 2)), Event::rest(q(1, 4))],
        );
        let encoded = prepare_song(&s, &AcceptableDurations::default(), TimeStep::sixteenth())
            .unwrap()
            .unwrap();
        assert_eq!(encoded.interval, -2);
        assert_eq!(codec::format_tokens(&encoded.tokens), "60 _ r");
    }

    #[test]
    fn sorts_accepted_and_separates_rejects() {
        let songs = vec![
            song("c", None, vec![Event::note(64, q(1, 4))]),
            song("a", None, vec![Event::note(60, q(1, 4))]),
            song("triplet", None, vec![Event::note(60, q(1, 3))]),
            song("modal", Some(KeySignature::new(2, "dorian")), vec![Event::note(62, q(1, 1))]),
            song("b", Some(KeySignature::new(9, "minor")), vec![Event::rest(q(1, 2))]),
        ];
        let report = prepare_songs(&songs, &AcceptableDurations::default(), TimeStep::sixteenth());
        let ids: Vec<_> = report.encoded.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, ["a", "b", "c"]);
        assert_eq!(report.rejected, ["triplet"]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, "modal");
        assert!(matches!(report.failed[0].1, MelodyError::UnsupportedMode(_)));
    }

    #[test]
    fn corpus_layout_and_text() {
        let songs = [
            EncodedSong {
                id: "1".into(),
                interval: 0,
                tokens: codec::parse_tokens("60 _ r").unwrap(),
            },
            EncodedSong {
                id: "2".into(),
                interval: 0,
                tokens: codec::parse_tokens("62").unwrap(),
            },
        ];
        let corpus = Corpus::from_songs(&songs, 2);
        assert_eq!(corpus.to_text(), "60 _ r / / 62 / /");
        assert_eq!(corpus.len(), 8);
        assert_eq!(Corpus::parse(&corpus.to_text()).unwrap(), corpus);

        let split = corpus.songs();
        assert_eq!(split.len(), 2);
        assert_eq!(codec::format_tokens(split[0]), "60 _ r");
        assert_eq!(codec::format_tokens(split[1]), "62");
    }

    #[test]
    fn corpus_ids_cover_vocabulary() {
        let corpus = Corpus::parse("60 _ r _ / / 60").unwrap();
        let vocab = corpus.vocabulary();
        assert_eq!(vocab.len(), 4);
        let ids = corpus.to_ids(&vocab).unwrap();
        assert_eq!(ids.len(), 7);
        assert_eq!(ids[0], ids[6]);
        assert_eq!(ids[4], ids[5]);
    }

    #[test]
    fn files_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let songs = [EncodedSong {
            id: "deut/0042".into(),
            interval: 0,
            tokens: codec::parse_tokens("67 _ _ _").unwrap(),
        }];
        write_encoded_songs(&dir.path().join("dataset"), &songs).unwrap();
        let text = std::fs::read_to_string(dir.path().join("dataset").join("deut_0042")).unwrap();
        assert_eq!(text, "67 _ _ _");

        let corpus = Corpus::from_songs(&songs, 3);
        let path = dir.path().join("file_dataset");
        corpus.save(&path).unwrap();
        assert_eq!(Corpus::load(&path).unwrap(), corpus);
    }
}
