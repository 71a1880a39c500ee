use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

use crate::model::ids::{IdError, ItemId};
use crate::model::level::Level;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum VocabularyError {
    #[error(transparent)]
    Identifier(#[from] IdError),
    #[error("entry `{identifier}` is missing a {field}")]
    MissingField {
        identifier: String,
        field: &'static str,
    },
}

/// One row of the static vocabulary table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VocabEntry {
    pub identifier: ItemId,
    pub translation: String,
    pub pronunciation: String,
    pub category: String,
    pub example: Option<String>,
    pub level: Level,
}

impl VocabEntry {
    /// Builds an entry, trimming text fields.
    ///
    /// # Errors
    ///
    /// Returns `VocabularyError` if the identifier or translation is blank.
    pub fn new(
        identifier: &str,
        translation: &str,
        pronunciation: &str,
        category: &str,
        example: Option<&str>,
        level: Level,
    ) -> Result<Self, VocabularyError> {
        let identifier = ItemId::new(identifier)?;
        let translation = translation.trim();
        if translation.is_empty() {
            return Err(VocabularyError::MissingField {
                identifier: identifier.to_string(),
                field: "translation",
            });
        }
        Ok(Self {
            identifier,
            translation: translation.to_owned(),
            pronunciation: pronunciation.trim().to_owned(),
            category: category.trim().to_owned(),
            example: example
                .map(str::trim)
                .filter(|e| !e.is_empty())
                .map(str::to_owned),
            level,
        })
    }
}

/// Read-only lookup table `identifier → entry`.
///
/// Built with last-write-wins semantics; identifiers that were overwritten are
/// kept in [`Vocabulary::duplicates`] so loaders can report them.
#[derive(Debug, Clone, Default)]
pub struct Vocabulary {
    entries: HashMap<ItemId, VocabEntry>,
    duplicates: Vec<ItemId>,
}

impl Vocabulary {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `entry`, replacing any earlier entry with the same identifier.
    ///
    /// Returns the replaced entry.
    pub fn insert(&mut self, entry: VocabEntry) -> Option<VocabEntry> {
        let previous = self.entries.insert(entry.identifier.clone(), entry);
        if let Some(prev) = &previous {
            self.duplicates.push(prev.identifier.clone());
        }
        previous
    }

    #[must_use]
    pub fn get(&self, identifier: &ItemId) -> Option<&VocabEntry> {
        self.entries.get(identifier)
    }

    #[must_use]
    pub fn contains(&self, identifier: &ItemId) -> bool {
        self.entries.contains_key(identifier)
    }

    #[must_use]
    pub fn level_of(&self, identifier: &ItemId) -> Option<Level> {
        self.get(identifier).map(|e| e.level)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Identifiers that appeared more than once, in the order they were overwritten.
    #[must_use]
    pub fn duplicates(&self) -> &[ItemId] {
        &self.duplicates
    }

    pub fn entries(&self) -> impl Iterator<Item = &VocabEntry> {
        self.entries.values()
    }

    /// Entries of one level, sorted by identifier.
    #[must_use]
    pub fn by_level(&self, level: Level) -> Vec<&VocabEntry> {
        let mut out: Vec<_> = self.entries.values().filter(|e| e.level == level).collect();
        out.sort_by(|a, b| a.identifier.cmp(&b.identifier));
        out
    }
}

impl FromIterator<VocabEntry> for Vocabulary {
    fn from_iter<I: IntoIterator<Item = VocabEntry>>(iter: I) -> Self {
        let mut vocab = Self::new();
        for entry in iter {
            vocab.insert(entry);
        }
        vocab
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: &str, translation: &str, level: Level) -> VocabEntry {
        VocabEntry::new(id, translation, "", "greetings", None, level).unwrap()
    }

    #[test]
    fn blank_translation_is_rejected() {
        let err = VocabEntry::new("halo", "  ", "ha-lo", "greetings", None, Level::Beginner)
            .unwrap_err();
        assert_eq!(
            err,
            VocabularyError::MissingField {
                identifier: "halo".into(),
                field: "translation",
            }
        );
    }

    #[test]
    fn blank_example_becomes_none() {
        let e = VocabEntry::new("halo", "hello", "ha-lo", "greetings", Some(" "), Level::Beginner)
            .unwrap();
        assert_eq!(e.example, None);
    }

    #[test]
    fn duplicates_are_last_write_wins_and_reported() {
        let vocab: Vocabulary = [
            entry("kamu", "you", Level::AbsoluteBeginner),
            entry("makan", "eat", Level::AbsoluteBeginner),
            entry("kamu", "you (informal)", Level::Beginner),
        ]
        .into_iter()
        .collect();

        let kamu = ItemId::new("kamu").unwrap();
        assert_eq!(vocab.len(), 2);
        assert_eq!(vocab.get(&kamu).unwrap().translation, "you (informal)");
        assert_eq!(vocab.level_of(&kamu), Some(Level::Beginner));
        assert_eq!(vocab.duplicates(), &[kamu]);
    }

    #[test]
    fn by_level_is_sorted() {
        let vocab: Vocabulary = [
            entry("tidur", "sleep", Level::Beginner),
            entry("air", "water", Level::Beginner),
            entry("halo", "hello", Level::AbsoluteBeginner),
        ]
        .into_iter()
        .collect();

        let ids: Vec<_> = vocab
            .by_level(Level::Beginner)
            .iter()
            .map(|e| e.identifier.as_str())
            .collect();
        assert_eq!(ids, ["air", "tidur"]);
    }
}
