use std::sync::Arc;

use chrono::{DateTime, Utc};

use kosakata_core::{
    model::{DailyStreak, Difficulty, ItemId, Level, ProfileId, ReviewItem, Vocabulary},
    scheduler::{AppliedReview, Scheduler, SchedulerError},
    time::Clock,
};
use storage::repository::{ReviewItemRepository, Storage, StorageError, StreakRepository};

use crate::error::ReviewServiceError;

/// Result of a persisted review: applied schedule, session row id and the
/// profile's streak after the review.
#[derive(Debug, Clone, PartialEq)]
pub struct PersistedReview {
    pub applied: AppliedReview,
    pub session_id: i64,
    pub streak: DailyStreak,
}

/// Coordinates applying a learner's rating to an item using the scheduler.
///
/// The scheduler itself stays pure; this service loads state, stamps the
/// review with its clock, persists the outcome and keeps the daily streak.
pub struct ReviewService {
    clock: Clock,
    scheduler: Scheduler,
    vocabulary: Option<Arc<Vocabulary>>,
}

impl Default for ReviewService {
    fn default() -> Self {
        Self::new()
    }
}

impl ReviewService {
    /// Review service with the default scheduler and a real-time clock.
    #[must_use]
    pub fn new() -> Self {
        Self::with_scheduler(Scheduler::new())
    }

    #[must_use]
    pub fn with_scheduler(scheduler: Scheduler) -> Self {
        Self {
            clock: Clock::default(),
            scheduler,
            vocabulary: None,
        }
    }

    /// Override the clock (usually for deterministic testing).
    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Restrict first reviews to known words and tag new items with their level.
    #[must_use]
    pub fn with_vocabulary(mut self, vocabulary: Arc<Vocabulary>) -> Self {
        self.vocabulary = Some(vocabulary);
        self
    }

    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    #[must_use]
    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    fn level_for(&self, identifier: &ItemId) -> Result<Option<Level>, ReviewServiceError> {
        match &self.vocabulary {
            Some(vocab) => vocab
                .level_of(identifier)
                .map(Some)
                .ok_or_else(|| ReviewServiceError::UnknownWord(identifier.clone())),
            None => Ok(None),
        }
    }

    /// Apply a rating in memory, starting a fresh item when `existing` is `None`.
    ///
    /// # Errors
    ///
    /// - `UnknownWord` if a vocabulary is configured and does not contain a new `identifier`
    /// - `Scheduler` for invalid item state
    pub fn review_item(
        &self,
        existing: Option<&ReviewItem>,
        identifier: &ItemId,
        difficulty: Difficulty,
        reviewed_at: DateTime<Utc>,
    ) -> Result<AppliedReview, ReviewServiceError> {
        let applied = match existing {
            Some(item) => self.scheduler.record_review(item, difficulty, reviewed_at)?,
            None => {
                let level = self.level_for(identifier)?;
                self.scheduler
                    .record_first_review(identifier.clone(), level, difficulty, reviewed_at)?
            }
        };

        tracing::debug!(
            item = %applied.item.identifier(),
            %difficulty,
            interval_days = applied.item.interval_days(),
            ease_factor = applied.item.ease_factor(),
            mastery_level = applied.item.mastery_level(),
            "scheduled review"
        );
        if let Some((from, to)) = applied.status_change() {
            tracing::debug!(item = %applied.item.identifier(), %from, %to, "item reclassified");
        }

        Ok(applied)
    }

    /// Load and validate a stored item.
    ///
    /// # Errors
    ///
    /// Returns `InvalidItemState` if the stored record breaks an invariant, or
    /// storage errors.
    pub async fn load_item(
        &self,
        profile: &ProfileId,
        identifier: &ItemId,
        items: &dyn ReviewItemRepository,
    ) -> Result<Option<ReviewItem>, ReviewServiceError> {
        let Some(record) = items.get_item(profile, identifier).await? else {
            return Ok(None);
        };
        ReviewItem::from_persisted(record).map(Some).map_err(|source| {
            tracing::warn!(%profile, item = %identifier, error = %source, "invalid stored item");
            ReviewServiceError::InvalidItemState {
                identifier: identifier.clone(),
                source,
            }
        })
    }

    /// Rate an item for a profile and persist the outcome.
    ///
    /// The rating is parsed before anything is loaded or written. The item and
    /// its session record are stored atomically, then the daily streak is
    /// advanced.
    ///
    /// # Errors
    ///
    /// - `Scheduler(InvalidDifficulty)` for an unknown rating
    /// - `InvalidItemState` if the stored item is corrupt
    /// - `UnknownWord` for a first review of a word missing from the vocabulary
    /// - `Storage` if loading or persisting fails
    pub async fn review_persisted(
        &self,
        profile: &ProfileId,
        identifier: &ItemId,
        rating: &str,
        storage: &Storage,
    ) -> Result<PersistedReview, ReviewServiceError> {
        let difficulty: Difficulty = rating.parse().map_err(SchedulerError::from)?;

        let existing = self
            .load_item(profile, identifier, storage.items.as_ref())
            .await?;
        let reviewed_at = self.now();
        let applied = self.review_item(existing.as_ref(), identifier, difficulty, reviewed_at)?;

        let session_id = storage
            .reviews
            .apply_review(profile, &applied.item, &applied.session)
            .await?;
        let streak = self.record_study(profile, storage.streaks.as_ref()).await?;

        tracing::info!(
            %profile,
            item = %identifier,
            %difficulty,
            next_review_at = %applied.item.next_review_at(),
            status = %applied.item.status(),
            "review recorded"
        );

        Ok(PersistedReview {
            applied,
            session_id,
            streak,
        })
    }

    /// Advance the profile's daily streak for today's study.
    ///
    /// # Errors
    ///
    /// Returns storage errors.
    pub async fn record_study(
        &self,
        profile: &ProfileId,
        streaks: &dyn StreakRepository,
    ) -> Result<DailyStreak, ReviewServiceError> {
        let mut streak = streaks.get_streak(profile).await?;
        streak.record_study(self.clock.today());
        streaks.upsert_streak(profile, &streak).await?;
        Ok(streak)
    }

    /// Put a stored item back to default scheduling state.
    ///
    /// This is the recovery path for `InvalidItemState`; it works on the raw
    /// record, so it succeeds even when the stored state cannot be loaded.
    ///
    /// # Errors
    ///
    /// Returns `Storage(NotFound)` if the profile never reviewed the item.
    pub async fn reset_item(
        &self,
        profile: &ProfileId,
        identifier: &ItemId,
        items: &dyn ReviewItemRepository,
    ) -> Result<ReviewItem, ReviewServiceError> {
        let record = items
            .get_item(profile, identifier)
            .await?
            .ok_or(StorageError::NotFound)?;
        let item = ReviewItem::reset_from(&record, self.now());
        items.upsert_item(profile, &item).await?;
        tracing::info!(%profile, item = %identifier, "item schedule reset");
        Ok(item)
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
