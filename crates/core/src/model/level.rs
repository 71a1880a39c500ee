use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown vocabulary level `{0}`")]
pub struct LevelError(pub String);

/// Course level a vocabulary entry belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Level {
    AbsoluteBeginner,
    Beginner,
    Intermediate,
    Advanced,
}

impl Level {
    pub const ALL: [Level; 4] = [
        Level::AbsoluteBeginner,
        Level::Beginner,
        Level::Intermediate,
        Level::Advanced,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Level::AbsoluteBeginner => "absolute-beginner",
            Level::Beginner => "beginner",
            Level::Intermediate => "intermediate",
            Level::Advanced => "advanced",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Level {
    type Err = LevelError;

    /// Accepts the kebab-case form as well as the human label
    /// (`"Absolute Beginner"`), case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_ascii_lowercase().replace([' ', '_'], "-");
        Self::ALL
            .into_iter()
            .find(|level| level.as_str() == key)
            .ok_or_else(|| LevelError(s.to_owned()))
    }
}
