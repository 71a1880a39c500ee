use thiserror::Error;

use crate::model::{GoalError, IdError, ItemStateError, LevelError, ReviewError, VocabularyError};
use crate::scheduler::SchedulerError;

/// Umbrella error for callers that do not care which core concern failed.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Id(#[from] IdError),
    #[error(transparent)]
    Review(#[from] ReviewError),
    #[error(transparent)]
    Level(#[from] LevelError),
    #[error(transparent)]
    ItemState(#[from] ItemStateError),
    #[error(transparent)]
    Vocabulary(#[from] VocabularyError),
    #[error(transparent)]
    Scheduler(#[from] SchedulerError),
    #[error(transparent)]
    Goal(#[from] GoalError),
}
