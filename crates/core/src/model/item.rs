use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::model::ids::ItemId;
use crate::model::level::Level;
use crate::model::review::Difficulty;

pub const DEFAULT_INTERVAL_DAYS: u32 = 1;
pub const DEFAULT_EASE_FACTOR: f64 = 2.5;
pub const MIN_EASE_FACTOR: f64 = 1.3;
pub const MAX_EASE_FACTOR: f64 = 2.5;
pub const MAX_MASTERY_LEVEL: u8 = 10;
/// Mastery at or above this level classifies an item as mastered.
pub const MASTERED_THRESHOLD: u8 = 8;
/// Mastery strictly below this level classifies an item as weak.
pub const WEAK_THRESHOLD: u8 = 3;

//
// ─── ERRORS ───────────────────────────────────────────────────────────────────
//

/// A loaded review item violates one of its invariants.
///
/// Corrupt state is never repaired silently; callers decide whether to reset
/// the item to defaults.
#[derive(Debug, Error, Clone, PartialEq)]
#[non_exhaustive]
pub enum ItemStateError {
    #[error("ease factor {provided} is outside [1.3, 2.5]")]
    EaseFactorOutOfRange { provided: f64 },
    #[error("interval must be at least one day")]
    ZeroInterval,
    #[error("mastery level {provided} exceeds 10")]
    MasteryOutOfRange { provided: u8 },
    #[error("stored item has never been reviewed")]
    NeverReviewed,
    #[error("{field} ({value}) exceeds review count ({review_count})")]
    CountExceedsReviews {
        field: &'static str,
        value: u32,
        review_count: u32,
    },
    #[error("last review precedes first review")]
    ReviewTimesOutOfOrder,
}

//
// ─── STATUS ───────────────────────────────────────────────────────────────────
//

/// Weak / normal / mastered classification derived from the mastery level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MasteryStatus {
    Weak,
    Normal,
    Mastered,
}

impl MasteryStatus {
    #[must_use]
    pub fn from_level(mastery_level: u8) -> Self {
        if mastery_level >= MASTERED_THRESHOLD {
            Self::Mastered
        } else if mastery_level < WEAK_THRESHOLD {
            Self::Weak
        } else {
            Self::Normal
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            MasteryStatus::Weak => "weak",
            MasteryStatus::Normal => "normal",
            MasteryStatus::Mastered => "mastered",
        }
    }
}

impl fmt::Display for MasteryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

//
// ─── PERSISTED SHAPE ──────────────────────────────────────────────────────────
//

/// Storage-facing shape of a [`ReviewItem`].
///
/// Any store (SQL row, JSON document, key-value blob) can round-trip this
/// record; [`ReviewItem::from_persisted`] re-checks the invariants on load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewItemRecord {
    pub identifier: ItemId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<Level>,
    pub interval_days: u32,
    pub ease_factor: f64,
    pub review_count: u32,
    pub correct_streak: u32,
    #[serde(default)]
    pub correct_reviews: u32,
    pub next_review_at: DateTime<Utc>,
    pub mastery_level: u8,
    pub first_reviewed_at: Option<DateTime<Utc>>,
    pub last_reviewed_at: Option<DateTime<Utc>>,
}

//
// ─── REVIEW ITEM ──────────────────────────────────────────────────────────────
//

/// Scheduling state of one vocabulary entry inside one profile.
#[derive(Debug, Clone, PartialEq)]
pub struct ReviewItem {
    identifier: ItemId,
    level: Option<Level>,
    interval_days: u32,
    ease_factor: f64,
    review_count: u32,
    correct_streak: u32,
    correct_reviews: u32,
    next_review_at: DateTime<Utc>,
    mastery_level: u8,
    first_reviewed_at: Option<DateTime<Utc>>,
    last_reviewed_at: Option<DateTime<Utc>>,
}

impl ReviewItem {
    /// Item with default scheduling state, as used for a first review.
    ///
    /// It is due immediately and has no review history yet.
    #[must_use]
    pub fn fresh(identifier: ItemId, level: Option<Level>, now: DateTime<Utc>) -> Self {
        Self {
            identifier,
            level,
            interval_days: DEFAULT_INTERVAL_DAYS,
            ease_factor: DEFAULT_EASE_FACTOR,
            review_count: 0,
            correct_streak: 0,
            correct_reviews: 0,
            next_review_at: now,
            mastery_level: 0,
            first_reviewed_at: None,
            last_reviewed_at: None,
        }
    }

    /// Rehydrate an item from storage.
    ///
    /// # Errors
    ///
    /// Returns `ItemStateError` if the record breaks an invariant or describes
    /// an item that was never reviewed.
    pub fn from_persisted(record: ReviewItemRecord) -> Result<Self, ItemStateError> {
        let item = Self {
            identifier: record.identifier,
            level: record.level,
            interval_days: record.interval_days,
            ease_factor: record.ease_factor,
            review_count: record.review_count,
            correct_streak: record.correct_streak,
            correct_reviews: record.correct_reviews,
            next_review_at: record.next_review_at,
            mastery_level: record.mastery_level,
            first_reviewed_at: record.first_reviewed_at,
            last_reviewed_at: record.last_reviewed_at,
        };
        if item.review_count == 0 {
            return Err(ItemStateError::NeverReviewed);
        }
        item.validate()?;
        Ok(item)
    }

    #[must_use]
    pub fn to_persisted(&self) -> ReviewItemRecord {
        ReviewItemRecord {
            identifier: self.identifier.clone(),
            level: self.level,
            interval_days: self.interval_days,
            ease_factor: self.ease_factor,
            review_count: self.review_count,
            correct_streak: self.correct_streak,
            correct_reviews: self.correct_reviews,
            next_review_at: self.next_review_at,
            mastery_level: self.mastery_level,
            first_reviewed_at: self.first_reviewed_at,
            last_reviewed_at: self.last_reviewed_at,
        }
    }

    /// Checks the range invariants of the scheduling fields.
    ///
    /// # Errors
    ///
    /// Returns the first violated invariant.
    pub fn validate(&self) -> Result<(), ItemStateError> {
        if !(MIN_EASE_FACTOR..=MAX_EASE_FACTOR).contains(&self.ease_factor) {
            return Err(ItemStateError::EaseFactorOutOfRange {
                provided: self.ease_factor,
            });
        }
        if self.interval_days == 0 {
            return Err(ItemStateError::ZeroInterval);
        }
        if self.mastery_level > MAX_MASTERY_LEVEL {
            return Err(ItemStateError::MasteryOutOfRange {
                provided: self.mastery_level,
            });
        }
        for (field, value) in [
            ("correct streak", self.correct_streak),
            ("correct reviews", self.correct_reviews),
        ] {
            if value > self.review_count {
                return Err(ItemStateError::CountExceedsReviews {
                    field,
                    value,
                    review_count: self.review_count,
                });
            }
        }
        if let (Some(first), Some(last)) = (self.first_reviewed_at, self.last_reviewed_at) {
            if last < first {
                return Err(ItemStateError::ReviewTimesOutOfOrder);
            }
        }
        Ok(())
    }

    /// Rebuild a stored item whose state is invalid.
    ///
    /// Identifier, level and review history timestamps are kept; scheduling
    /// state returns to the defaults and the item is due at `now`. The item
    /// still counts as reviewed, so it keeps existing in the store.
    #[must_use]
    pub fn reset_from(record: &ReviewItemRecord, now: DateTime<Utc>) -> Self {
        let (first_reviewed_at, last_reviewed_at) =
            match (record.first_reviewed_at, record.last_reviewed_at) {
                (Some(first), Some(last)) if last < first => (None, None),
                (first, last) => (first, last),
            };
        Self {
            review_count: record.review_count.max(1),
            first_reviewed_at,
            last_reviewed_at: last_reviewed_at.filter(|last| *last <= now),
            ..Self::fresh(record.identifier.clone(), record.level, now)
        }
    }

    pub(crate) fn apply_review(
        &mut self,
        difficulty: Difficulty,
        interval_days: u32,
        ease_factor: f64,
        mastery_level: u8,
        reviewed_at: DateTime<Utc>,
        next_review_at: DateTime<Utc>,
    ) {
        self.review_count += 1;
        if difficulty.is_correct() {
            self.correct_streak += 1;
            self.correct_reviews += 1;
        } else {
            self.correct_streak = 0;
        }
        self.interval_days = interval_days;
        self.ease_factor = ease_factor;
        self.mastery_level = mastery_level;
        self.next_review_at = next_review_at;
        self.first_reviewed_at.get_or_insert(reviewed_at);
        // A clock stepping backwards never rewinds the review history.
        let last = self
            .last_reviewed_at
            .map_or(reviewed_at, |last| last.max(reviewed_at));
        self.last_reviewed_at = Some(last);
    }

    #[must_use]
    pub fn identifier(&self) -> &ItemId {
        &self.identifier
    }

    #[must_use]
    pub fn level(&self) -> Option<Level> {
        self.level
    }

    #[must_use]
    pub fn interval_days(&self) -> u32 {
        self.interval_days
    }

    #[must_use]
    pub fn ease_factor(&self) -> f64 {
        self.ease_factor
    }

    #[must_use]
    pub fn review_count(&self) -> u32 {
        self.review_count
    }

    #[must_use]
    pub fn correct_streak(&self) -> u32 {
        self.correct_streak
    }

    #[must_use]
    pub fn correct_reviews(&self) -> u32 {
        self.correct_reviews
    }

    #[must_use]
    pub fn next_review_at(&self) -> DateTime<Utc> {
        self.next_review_at
    }

    #[must_use]
    pub fn mastery_level(&self) -> u8 {
        self.mastery_level
    }

    #[must_use]
    pub fn first_reviewed_at(&self) -> Option<DateTime<Utc>> {
        self.first_reviewed_at
    }

    #[must_use]
    pub fn last_reviewed_at(&self) -> Option<DateTime<Utc>> {
        self.last_reviewed_at
    }

    #[must_use]
    pub fn status(&self) -> MasteryStatus {
        MasteryStatus::from_level(self.mastery_level)
    }

    #[must_use]
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        now >= self.next_review_at
    }

    /// Share of reviews rated easy or medium; `0.0` before the first review.
    #[must_use]
    pub fn success_rate(&self) -> f64 {
        f64::from(self.correct_reviews) / f64::from(self.review_count.max(1))
    }

    /// Practice urgency: low mastery weighs 60%, low success rate 40%.
    ///
    /// Ranges from `0.0` (fully mastered, never missed) to `6.4`.
    #[must_use]
    pub fn review_priority(&self) -> f64 {
        let mastery_gap = f64::from(MAX_MASTERY_LEVEL.saturating_sub(self.mastery_level));
        mastery_gap * 0.6 + (1.0 - self.success_rate()) * 0.4
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;
    use chrono::Duration;

    fn record() -> ReviewItemRecord {
        ReviewItemRecord {
            identifier: ItemId::new("rumah").unwrap(),
            level: Some(Level::Beginner),
            interval_days: 3,
            ease_factor: 2.1,
            review_count: 4,
            correct_streak: 2,
            correct_reviews: 3,
            next_review_at: fixed_now() + Duration::days(3),
            mastery_level: 5,
            first_reviewed_at: Some(fixed_now() - Duration::days(7)),
            last_reviewed_at: Some(fixed_now()),
        }
    }

    #[test]
    fn fresh_item_has_defaults_and_is_due() {
        let now = fixed_now();
        let item = ReviewItem::fresh(ItemId::new("halo").unwrap(), None, now);
        assert_eq!(item.interval_days(), 1);
        assert_eq!(item.ease_factor(), 2.5);
        assert_eq!(item.review_count(), 0);
        assert_eq!(item.correct_streak(), 0);
        assert_eq!(item.mastery_level(), 0);
        assert!(item.is_due(now));
        assert_eq!(item.status(), MasteryStatus::Weak);
        assert!(item.validate().is_ok());
    }

    #[test]
    fn status_thresholds_are_inclusive_at_eight_and_exclusive_at_three() {
        assert_eq!(MasteryStatus::from_level(0), MasteryStatus::Weak);
        assert_eq!(MasteryStatus::from_level(2), MasteryStatus::Weak);
        assert_eq!(MasteryStatus::from_level(3), MasteryStatus::Normal);
        assert_eq!(MasteryStatus::from_level(7), MasteryStatus::Normal);
        assert_eq!(MasteryStatus::from_level(8), MasteryStatus::Mastered);
        assert_eq!(MasteryStatus::from_level(10), MasteryStatus::Mastered);
    }

    #[test]
    fn persisted_round_trip_preserves_every_field() {
        let rec = record();
        let item = ReviewItem::from_persisted(rec.clone()).unwrap();
        assert_eq!(item.to_persisted(), rec);
    }

    #[test]
    fn from_persisted_rejects_out_of_range_ease() {
        let mut rec = record();
        rec.ease_factor = 2.6;
        assert!(matches!(
            ReviewItem::from_persisted(rec),
            Err(ItemStateError::EaseFactorOutOfRange { provided }) if provided == 2.6
        ));

        let mut rec = record();
        rec.ease_factor = f64::NAN;
        assert!(ReviewItem::from_persisted(rec).is_err());
    }

    #[test]
    fn from_persisted_rejects_broken_invariants() {
        let mut rec = record();
        rec.mastery_level = 11;
        assert_eq!(
            ReviewItem::from_persisted(rec).unwrap_err(),
            ItemStateError::MasteryOutOfRange { provided: 11 }
        );

        let mut rec = record();
        rec.interval_days = 0;
        assert_eq!(
            ReviewItem::from_persisted(rec).unwrap_err(),
            ItemStateError::ZeroInterval
        );

        let mut rec = record();
        rec.review_count = 0;
        rec.correct_streak = 0;
        rec.correct_reviews = 0;
        assert_eq!(
            ReviewItem::from_persisted(rec).unwrap_err(),
            ItemStateError::NeverReviewed
        );

        let mut rec = record();
        rec.correct_reviews = 9;
        assert!(matches!(
            ReviewItem::from_persisted(rec).unwrap_err(),
            ItemStateError::CountExceedsReviews { value: 9, .. }
        ));
    }

    #[test]
    fn record_json_uses_plain_field_names() {
        let rec = record();
        let json = serde_json::to_value(&rec).unwrap();
        assert_eq!(json["identifier"], "rumah");
        assert_eq!(json["level"], "beginner");
        assert_eq!(json["interval_days"], 3);
        assert_eq!(json["mastery_level"], 5);

        let back: ReviewItemRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back, rec);
    }

    #[test]
    fn reset_from_restores_defaults_and_stays_loadable() {
        let mut corrupt = record();
        corrupt.ease_factor = 9.0;
        corrupt.mastery_level = 42;
        corrupt.correct_reviews = 99;

        let reset = ReviewItem::reset_from(&corrupt, fixed_now());
        assert_eq!(reset.identifier().as_str(), "rumah");
        assert_eq!(reset.level(), Some(Level::Beginner));
        assert_eq!(reset.review_count(), 4);
        assert_eq!(reset.correct_reviews(), 0);
        assert_eq!(reset.mastery_level(), 0);
        assert_eq!(reset.ease_factor(), DEFAULT_EASE_FACTOR);
        assert_eq!(reset.interval_days(), DEFAULT_INTERVAL_DAYS);
        assert!(reset.is_due(fixed_now()));

        let reloaded = ReviewItem::from_persisted(reset.to_persisted()).unwrap();
        assert_eq!(reloaded, reset);
    }

    #[test]
    fn reset_from_drops_out_of_order_timestamps() {
        let mut corrupt = record();
        corrupt.first_reviewed_at = Some(fixed_now());
        corrupt.last_reviewed_at = Some(fixed_now() - Duration::days(2));
        corrupt.review_count = 0;

        let reset = ReviewItem::reset_from(&corrupt, fixed_now());
        assert_eq!(reset.first_reviewed_at(), None);
        assert_eq!(reset.last_reviewed_at(), None);
        assert_eq!(reset.review_count(), 1);
    }

    #[test]
    fn priority_prefers_low_mastery_and_low_success() {
        let mut low = record();
        low.mastery_level = 1;
        low.correct_reviews = 1;
        let low = ReviewItem::from_persisted(low).unwrap();

        let mut high = record();
        high.mastery_level = 2;
        high.correct_reviews = 4;
        let high = ReviewItem::from_persisted(high).unwrap();

        assert!(low.review_priority() > high.review_priority());
        assert!((low.success_rate() - 0.25).abs() < f64::EPSILON);
        assert!((high.review_priority() - 4.8).abs() < 1e-9);
    }
}
