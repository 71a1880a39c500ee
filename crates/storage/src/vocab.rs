//! Loader for the static vocabulary table.
//!
//! The file groups words by level:
//!
//! ```json
//! {
//!   "Absolute Beginner": {
//!     "halo": { "english": "hello", "pronunciation": "ha-lo",
//!               "category": "greetings", "example": "Halo, apa kabar?" }
//!   }
//! }
//! ```
//!
//! `translation` is accepted as a synonym of `english`. Repeated words, both
//! inside one level and across levels, are resolved last-write-wins and
//! logged.

use std::fmt;
use std::path::Path;

use kosakata_core::model::{Level, LevelError, VocabEntry, Vocabulary, VocabularyError};
use serde::Deserialize;
use serde::de::{Deserializer, MapAccess, Visitor};
use thiserror::Error;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum VocabularyLoadError {
    #[error("failed to read vocabulary file: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed vocabulary json: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Level(#[from] LevelError),
    #[error(transparent)]
    Entry(#[from] VocabularyError),
}

#[derive(Debug, Deserialize)]
struct RawEntry {
    #[serde(alias = "english")]
    translation: String,
    #[serde(default)]
    pronunciation: String,
    #[serde(default)]
    category: String,
    #[serde(default)]
    example: Option<String>,
}

/// JSON object read as an ordered list of pairs so repeated keys stay visible.
struct Pairs<V>(Vec<(String, V)>);

impl<'de, V: Deserialize<'de>> Deserialize<'de> for Pairs<V> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct PairsVisitor<V>(std::marker::PhantomData<V>);

        impl<'de, V: Deserialize<'de>> Visitor<'de> for PairsVisitor<V> {
            type Value = Pairs<V>;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a JSON object")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
                let mut out = Vec::with_capacity(map.size_hint().unwrap_or(0));
                while let Some(pair) = map.next_entry::<String, V>()? {
                    out.push(pair);
                }
                Ok(Pairs(out))
            }
        }

        deserializer.deserialize_map(PairsVisitor(std::marker::PhantomData))
    }
}

/// Parse vocabulary JSON into a validated lookup table.
///
/// # Errors
///
/// Returns `VocabularyLoadError` for malformed JSON, unknown level names or
/// entries without an identifier or translation.
pub fn parse_vocabulary(json: &str) -> Result<Vocabulary, VocabularyLoadError> {
    let levels: Pairs<Pairs<RawEntry>> = serde_json::from_str(json)?;

    let mut vocab = Vocabulary::new();
    for (level_name, Pairs(words)) in levels.0 {
        let level: Level = level_name.parse()?;
        for (word, raw) in words {
            let entry = VocabEntry::new(
                &word,
                &raw.translation,
                &raw.pronunciation,
                &raw.category,
                raw.example.as_deref(),
                level,
            )?;
            if let Some(previous) = vocab.insert(entry) {
                tracing::warn!(
                    word = %previous.identifier,
                    replaced_level = %previous.level,
                    %level,
                    "duplicate vocabulary entry, keeping the later one"
                );
            }
        }
    }

    tracing::debug!(
        entries = vocab.len(),
        duplicates = vocab.duplicates().len(),
        "parsed vocabulary"
    );
    Ok(vocab)
}

/// Read and parse a vocabulary file.
///
/// # Errors
///
/// Returns `VocabularyLoadError::Io` if the file cannot be read, otherwise the
/// errors of [`parse_vocabulary`].
pub fn load_vocabulary(path: impl AsRef<Path>) -> Result<Vocabulary, VocabularyLoadError> {
    let path = path.as_ref();
    let json = std::fs::read_to_string(path)?;
    let vocab = parse_vocabulary(&json)?;
    tracing::info!(path = %path.display(), entries = vocab.len(), "loaded vocabulary");
    Ok(vocab)
}
