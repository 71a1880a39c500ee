use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

use crate::model::{
    Difficulty, ItemId, ItemStateError, Level, MAX_EASE_FACTOR, MAX_MASTERY_LEVEL,
    MIN_EASE_FACTOR, MasteryStatus, ReviewError, ReviewItem, ReviewSession,
};

/// Ease gained on an easy rating.
const EASY_EASE_BONUS: f64 = 0.1;
/// Ease lost on a hard rating.
const HARD_EASE_PENALTY: f64 = 0.2;
/// Share of the ease factor applied to the interval on a medium rating.
const MEDIUM_INTERVAL_FACTOR: f64 = 0.8;
const EASY_MASTERY_GAIN: u8 = 2;
const MEDIUM_MASTERY_GAIN: u8 = 1;
const HARD_MASTERY_LOSS: u8 = 1;

/// Default ceiling for computed intervals.
pub const DEFAULT_MAX_INTERVAL_DAYS: u32 = 365;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq)]
pub enum SchedulerError {
    #[error("invalid difficulty `{0}`: expected easy, medium or hard")]
    InvalidDifficulty(String),
    #[error("invalid item state: {0}")]
    InvalidItemState(#[from] ItemStateError),
    #[error("max interval must be at least one day, got {provided}")]
    InvalidMaxInterval { provided: u32 },
}

impl From<ReviewError> for SchedulerError {
    fn from(err: ReviewError) -> Self {
        match err {
            ReviewError::InvalidDifficulty(raw) => Self::InvalidDifficulty(raw),
        }
    }
}

//
// ─── CONFIG ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Upper bound for `interval_days` after an easy or medium rating.
    pub max_interval_days: u32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_interval_days: DEFAULT_MAX_INTERVAL_DAYS,
        }
    }
}

//
// ─── APPLIED REVIEW ────────────────────────────────────────────────────────────
//

/// Outcome of one review: the updated item and the session record to log.
#[derive(Debug, Clone, PartialEq)]
pub struct AppliedReview {
    pub item: ReviewItem,
    pub session: ReviewSession,
    pub previous_status: MasteryStatus,
}

impl AppliedReview {
    /// `Some((before, after))` when the rating moved the item between
    /// weak, normal and mastered.
    #[must_use]
    pub fn status_change(&self) -> Option<(MasteryStatus, MasteryStatus)> {
        let current = self.item.status();
        (current != self.previous_status).then_some((self.previous_status, current))
    }
}

//
// ─── SCHEDULER ─────────────────────────────────────────────────────────────────
//

/// Ease-factor based spaced-repetition scheduler.
///
/// Every operation is a pure function of the item passed in, the rating and
/// the supplied `now`; the scheduler holds no per-item state and never touches
/// storage.
///
/// # Examples
///
/// ```
/// # use kosakata_core::scheduler::Scheduler;
/// # use kosakata_core::model::{Difficulty, ItemId, ReviewItem};
/// let scheduler = Scheduler::new();
/// let now = chrono::Utc::now();
/// let fresh = ReviewItem::fresh(ItemId::new("halo")?, None, now);
///
/// let applied = scheduler.record_review(&fresh, Difficulty::Easy, now)?;
/// assert_eq!(applied.item.interval_days(), 2);
/// assert_eq!(applied.item.mastery_level(), 2);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct Scheduler {
    config: SchedulerConfig,
}

impl Scheduler {
    /// Scheduler with the default one-year interval cap.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Scheduler with a custom configuration.
    ///
    /// # Errors
    ///
    /// Returns `InvalidMaxInterval` if the cap is zero.
    pub fn try_with_config(config: SchedulerConfig) -> Result<Self, SchedulerError> {
        if config.max_interval_days == 0 {
            return Err(SchedulerError::InvalidMaxInterval {
                provided: config.max_interval_days,
            });
        }
        Ok(Self { config })
    }

    #[must_use]
    pub fn config(&self) -> SchedulerConfig {
        self.config
    }

    /// Apply a rating to `item` and return the updated copy plus its log record.
    ///
    /// `item` is either loaded from storage or built with [`ReviewItem::fresh`]
    /// for a first review. The input is never modified, so a rejected call
    /// leaves the caller's state untouched.
    ///
    /// # Errors
    ///
    /// Returns `InvalidItemState` if `item` violates an invariant.
    pub fn record_review(
        &self,
        item: &ReviewItem,
        difficulty: Difficulty,
        now: DateTime<Utc>,
    ) -> Result<AppliedReview, SchedulerError> {
        item.validate()?;

        let previous_status = item.status();
        let interval = item.interval_days();
        let ease = item.ease_factor();
        let mastery = item.mastery_level();

        let (interval_days, ease_factor, mastery_level) = match difficulty {
            Difficulty::Easy => (
                self.grow_interval(f64::from(interval) * ease),
                (ease + EASY_EASE_BONUS).min(MAX_EASE_FACTOR),
                mastery.saturating_add(EASY_MASTERY_GAIN).min(MAX_MASTERY_LEVEL),
            ),
            Difficulty::Medium => (
                self.grow_interval(f64::from(interval) * ease * MEDIUM_INTERVAL_FACTOR),
                ease,
                mastery.saturating_add(MEDIUM_MASTERY_GAIN).min(MAX_MASTERY_LEVEL),
            ),
            Difficulty::Hard => (
                1,
                (ease - HARD_EASE_PENALTY).max(MIN_EASE_FACTOR),
                mastery.saturating_sub(HARD_MASTERY_LOSS),
            ),
        };
        let next_review_at = now + Duration::days(i64::from(interval_days));

        let mut updated = item.clone();
        updated.apply_review(
            difficulty,
            interval_days,
            ease_factor,
            mastery_level,
            now,
            next_review_at,
        );

        let session = ReviewSession::new(
            now,
            updated.identifier().clone(),
            difficulty,
            updated.mastery_level(),
        );

        Ok(AppliedReview {
            item: updated,
            session,
            previous_status,
        })
    }

    /// Parse a raw rating and apply it.
    ///
    /// The rating is validated before the item is looked at.
    ///
    /// # Errors
    ///
    /// Returns `InvalidDifficulty` for anything other than easy, medium or hard,
    /// otherwise the errors of [`Scheduler::record_review`].
    pub fn record_rating(
        &self,
        item: &ReviewItem,
        rating: &str,
        now: DateTime<Utc>,
    ) -> Result<AppliedReview, SchedulerError> {
        let difficulty: Difficulty = rating.parse()?;
        self.record_review(item, difficulty, now)
    }

    /// First review of a vocabulary entry: starts from default state.
    ///
    /// # Errors
    ///
    /// Propagates [`Scheduler::record_review`] errors.
    pub fn record_first_review(
        &self,
        identifier: ItemId,
        level: Option<Level>,
        difficulty: Difficulty,
        now: DateTime<Utc>,
    ) -> Result<AppliedReview, SchedulerError> {
        self.record_review(&ReviewItem::fresh(identifier, level, now), difficulty, now)
    }

    /// True when `item` is due at `now`.
    #[must_use]
    pub fn is_due(item: &ReviewItem, now: DateTime<Utc>) -> bool {
        item.is_due(now)
    }

    /// Identifiers of due items, in input order.
    ///
    /// With `level` set, only items tagged with that level are kept; untagged
    /// items never match a level filter.
    pub fn select_due_items<'a>(
        items: impl IntoIterator<Item = &'a ReviewItem>,
        now: DateTime<Utc>,
        level: Option<Level>,
    ) -> Vec<ItemId> {
        items
            .into_iter()
            .filter(|item| item.is_due(now))
            .filter(|item| level.is_none_or(|wanted| item.level() == Some(wanted)))
            .map(|item| item.identifier().clone())
            .collect()
    }

    /// Weak items ordered by descending [`ReviewItem::review_priority`].
    ///
    /// The sort is stable, so equally urgent items keep their input order.
    pub fn rank_weak_items<'a>(items: impl IntoIterator<Item = &'a ReviewItem>) -> Vec<&'a ReviewItem> {
        let mut weak: Vec<&ReviewItem> = items
            .into_iter()
            .filter(|item| item.status() == MasteryStatus::Weak)
            .collect();
        weak.sort_by(|a, b| b.review_priority().total_cmp(&a.review_priority()));
        weak
    }

    /// `floor(product)` bounded to `[1, max_interval_days]`.
    ///
    /// Callers multiply left to right (`interval * ease * 0.8`); regrouping the
    /// factors changes the floored result for inexact ease values.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn grow_interval(&self, product: f64) -> u32 {
        let max = f64::from(self.config.max_interval_days);
        product.floor().clamp(1.0, max) as u32
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
