use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_DAILY_GOAL: u32 = 20;
pub const MIN_DAILY_GOAL: u32 = 5;
pub const MAX_DAILY_GOAL: u32 = 100;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("daily goal must be between 5 and 100 words, got {provided}")]
pub struct GoalError {
    pub provided: u32,
}

/// Number of reviews a profile aims for each day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct DailyGoal(u32);

impl Default for DailyGoal {
    fn default() -> Self {
        Self(DEFAULT_DAILY_GOAL)
    }
}

impl DailyGoal {
    /// # Errors
    ///
    /// Returns `GoalError` if `words` is outside `[5, 100]`.
    pub fn new(words: u32) -> Result<Self, GoalError> {
        if (MIN_DAILY_GOAL..=MAX_DAILY_GOAL).contains(&words) {
            Ok(Self(words))
        } else {
            Err(GoalError { provided: words })
        }
    }

    #[must_use]
    pub fn words(self) -> u32 {
        self.0
    }

    /// Share of the goal reached with `reviewed` reviews, in whole percent,
    /// capped at 100.
    #[must_use]
    pub fn progress_percent(self, reviewed: u32) -> u32 {
        let percent = u64::from(reviewed) * 100 / u64::from(self.0);
        u32::try_from(percent.min(100)).unwrap_or(100)
    }
}

impl TryFrom<u32> for DailyGoal {
    type Error = GoalError;

    fn try_from(words: u32) -> Result<Self, Self::Error> {
        Self::new(words)
    }
}

impl From<DailyGoal> for u32 {
    fn from(goal: DailyGoal) -> Self {
        goal.0
    }
}

impl fmt::Display for DailyGoal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} words", self.0)
    }
}
