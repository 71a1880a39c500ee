#![forbid(unsafe_code)]

pub mod due_queue;
pub mod error;
pub mod progress_service;
pub mod review_service;

pub use kosakata_core::Clock;

pub use due_queue::{DueQueue, DueQueueOptions};
pub use error::{ProgressError, ReviewServiceError};
pub use progress_service::{ProgressOverview, ProgressService, WeakItem};
pub use review_service::{PersistedReview, ReviewService};
