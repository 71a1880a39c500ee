mod goal;
mod ids;
mod item;
mod level;
mod review;
mod streak;
mod vocab;

pub use goal::{DEFAULT_DAILY_GOAL, DailyGoal, GoalError, MAX_DAILY_GOAL, MIN_DAILY_GOAL};
pub use ids::{IdError, ItemId, ProfileId};
pub use item::{
    DEFAULT_EASE_FACTOR, DEFAULT_INTERVAL_DAYS, ItemStateError, MASTERED_THRESHOLD,
    MAX_EASE_FACTOR, MAX_MASTERY_LEVEL, MIN_EASE_FACTOR, MasteryStatus, ReviewItem,
    ReviewItemRecord, WEAK_THRESHOLD,
};
pub use level::{Level, LevelError};
pub use review::{Difficulty, ReviewError, ReviewSession};
pub use streak::DailyStreak;
pub use vocab::{VocabEntry, Vocabulary, VocabularyError};
