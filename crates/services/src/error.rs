//! Shared error types for the services crate.

use thiserror::Error;

use kosakata_core::model::{GoalError, ItemId, ItemStateError};
use kosakata_core::scheduler::SchedulerError;
use storage::repository::StorageError;

/// Errors emitted by `ReviewService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ReviewServiceError {
    #[error("`{0}` is not in the vocabulary")]
    UnknownWord(ItemId),
    #[error("stored state of `{identifier}` is invalid: {source}")]
    InvalidItemState {
        identifier: ItemId,
        #[source]
        source: ItemStateError,
    },
    #[error(transparent)]
    Scheduler(#[from] SchedulerError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `ProgressService` and `DueQueue`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProgressError {
    #[error(transparent)]
    Goal(#[from] GoalError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}
