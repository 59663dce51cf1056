// Symbol <-> integer id vocabulary.
//
// Ids are dense (`0..len`) and only distinguish symbols; they carry no
// frequency or pitch meaning. The builder deduplicates through a sorted set,
// so a fixed corpus always produces the same ids, but nothing downstream may
// rely on that: the persisted mapping is the source of truth and a rebuilt
// vocabulary is not guaranteed to match an older file.
//
// Both directions are stored (`BTreeMap` forward, `Vec` reverse) and kept in
// sync by construction, so lookups never scan.
//
// Persisted as a pretty-printed JSON object `{ "symbol": id, ... }`.

use crate::codec::Token;
use crate::error::{MelodyError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "BTreeMap<String, usize>", into = "BTreeMap<String, usize>")]
pub struct Vocabulary {
    ids: BTreeMap<String, usize>,
    symbols: Vec<String>,
}

impl Vocabulary {
    /// Build from a symbol sequence, duplicates removed.
    pub fn build<S: AsRef<str>>(corpus_symbols: &[S]) -> Self {
        let distinct: BTreeSet<&str> = corpus_symbols.iter().map(|s| s.as_ref()).collect();
        let symbols: Vec<String> = distinct.into_iter().map(str::to_string).collect();
        let ids = symbols
            .iter()
            .enumerate()
            .map(|(id, s)| (s.clone(), id))
            .collect();
        Vocabulary { ids, symbols }
    }

    pub fn from_tokens(tokens: &[Token]) -> Self {
        let symbols: Vec<String> = tokens.iter().map(|t| t.to_string()).collect();
        Vocabulary::build(&symbols)
    }

    /// Build from whitespace-separated corpus text.
    pub fn from_text(text: &str) -> Self {
        let symbols: Vec<&str> = text.split_whitespace().collect();
        Vocabulary::build(&symbols)
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn symbol_to_id(&self, symbol: &str) -> Result<usize> {
        self.ids
            .get(symbol)
            .copied()
            .ok_or_else(|| MelodyError::UnknownSymbol(symbol.to_string()))
    }

    pub fn id_to_symbol(&self, id: usize) -> Result<&str> {
        self.symbols
            .get(id)
            .map(String::as_str)
            .ok_or(MelodyError::UnknownId {
                id,
                size: self.len(),
            })
    }

    pub fn token_to_id(&self, token: &Token) -> Result<usize> {
        self.symbol_to_id(&token.to_string())
    }

    /// Map a whole token sequence to ids, failing on the first unknown one.
    pub fn encode_tokens(&self, tokens: &[Token]) -> Result<Vec<usize>> {
        tokens.iter().map(|t| self.token_to_id(t)).collect()
    }

    pub fn encode_symbols<S: AsRef<str>>(&self, symbols: &[S]) -> Result<Vec<usize>> {
        symbols
            .iter()
            .map(|s| self.symbol_to_id(s.as_ref()))
            .collect()
    }

    pub fn decode_ids(&self, ids: &[usize]) -> Result<Vec<&str>> {
        ids.iter().map(|&id| self.id_to_symbol(id)).collect()
    }

    /// `(symbol, id)` pairs in id order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, usize)> {
        self.symbols
            .iter()
            .enumerate()
            .map(|(id, s)| (s.as_str(), id))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        let vocab: Vocabulary = serde_json::from_str(&data)?;
        Ok(vocab)
    }
}

impl TryFrom<BTreeMap<String, usize>> for Vocabulary {
    type Error = MelodyError;

    /// Rebuild the reverse table. The ids must be exactly `0..len`.
    fn try_from(ids: BTreeMap<String, usize>) -> Result<Self> {
        let mut symbols: Vec<Option<String>> = vec![None; ids.len()];
        for (symbol, &id) in &ids {
            let slot = symbols.get_mut(id).ok_or_else(|| {
                MelodyError::InvalidVocabulary(format!(
                    "id {id} for `{symbol}` is not below {}",
                    ids.len()
                ))
            })?;
            if let Some(other) = slot.replace(symbol.clone()) {
                return Err(MelodyError::InvalidVocabulary(format!(
                    "id {id} assigned to both `{other}` and `{symbol}`"
                )));
            }
        }
        // Every slot is filled: len(ids) distinct ids below len(ids).
        let symbols = symbols.into_iter().flatten().collect();
        Ok(Vocabulary { ids, symbols })
    }
}

impl From<Vocabulary> for BTreeMap<String, usize> {
    fn from(vocab: Vocabulary) -> Self {
        vocab.ids
    }
}
