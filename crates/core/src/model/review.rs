use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::model::ids::ItemId;

//
// ─── ERRORS ───────────────────────────────────────────────────────────────────
//

/// Errors raised while interpreting a user's rating.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ReviewError {
    #[error("invalid difficulty `{0}`: expected easy, medium or hard")]
    InvalidDifficulty(String),
}

//
// ─── DIFFICULTY ───────────────────────────────────────────────────────────────
//

/// Three-level recall rating reported by the learner.
///
/// - `Easy`: recalled instantly; interval grows by the full ease factor
/// - `Medium`: recalled with some effort; interval grows by 80% of the ease factor
/// - `Hard`: not recalled; the item restarts at a one-day interval
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    pub const ALL: [Difficulty; 3] = [Difficulty::Easy, Difficulty::Medium, Difficulty::Hard];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }

    /// Easy and medium both count as a correct recall.
    #[must_use]
    pub fn is_correct(self) -> bool {
        !matches!(self, Difficulty::Hard)
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Difficulty {
    type Err = ReviewError;

    /// Parses exactly `easy`, `medium` or `hard`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|d| d.as_str() == s)
            .ok_or_else(|| ReviewError::InvalidDifficulty(s.to_owned()))
    }
}

//
// ─── REVIEW SESSION ───────────────────────────────────────────────────────────
//

/// Append-only log record of one review.
///
/// Kept for history and analytics; the scheduler never reads these back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewSession {
    pub timestamp: DateTime<Utc>,
    pub item: ItemId,
    pub difficulty: Difficulty,
    pub mastery_level: u8,
}

impl ReviewSession {
    #[must_use]
    pub fn new(
        timestamp: DateTime<Utc>,
        item: ItemId,
        difficulty: Difficulty,
        mastery_level: u8,
    ) -> Self {
        Self {
            timestamp,
            item,
            difficulty,
            mastery_level,
        }
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;

    #[test]
    fn difficulty_parses_known_values() {
        assert_eq!("easy".parse::<Difficulty>().unwrap(), Difficulty::Easy);
        assert_eq!("medium".parse::<Difficulty>().unwrap(), Difficulty::Medium);
        assert_eq!("hard".parse::<Difficulty>().unwrap(), Difficulty::Hard);
    }

    #[test]
    fn difficulty_rejects_unknown_values() {
        let err = "medium-ish".parse::<Difficulty>().unwrap_err();
        assert_eq!(err, ReviewError::InvalidDifficulty("medium-ish".into()));
        assert!("".parse::<Difficulty>().is_err());
    }

    #[test]
    fn difficulty_parsing_is_exact() {
        for raw in ["HARD", "Easy", " medium ", "medium\n"] {
            let err = raw.parse::<Difficulty>().unwrap_err();
            assert_eq!(err, ReviewError::InvalidDifficulty(raw.into()));
        }
    }

    #[test]
    fn only_hard_is_incorrect() {
        assert!(Difficulty::Easy.is_correct());
        assert!(Difficulty::Medium.is_correct());
        assert!(!Difficulty::Hard.is_correct());
    }

    #[test]
    fn session_serializes_lowercase_difficulty() {
        let session = ReviewSession::new(
            fixed_now(),
            ItemId::new("halo").unwrap(),
            Difficulty::Medium,
            4,
        );
        let json = serde_json::to_value(&session).unwrap();
        assert_eq!(json["difficulty"], "medium");
        assert_eq!(json["item"], "halo");
        assert_eq!(json["mastery_level"], 4);

        let back: ReviewSession = serde_json::from_value(json).unwrap();
        assert_eq!(back, session);
    }
}
