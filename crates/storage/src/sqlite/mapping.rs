use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use kosakata_core::model::{
    DailyGoal, DailyStreak, Difficulty, ItemId, Level, ProfileId, ReviewItemRecord, ReviewSession,
};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use crate::repository::{ReviewSessionRecord, StorageError};

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

fn u32_from_i64(field: &'static str, v: i64) -> Result<u32, StorageError> {
    u32::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {field}: {v}")))
}

fn u8_from_i64(field: &'static str, v: i64) -> Result<u8, StorageError> {
    u8::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {field}: {v}")))
}

/// Timestamps are stored as RFC 3339 UTC text with nanosecond precision and a
/// `Z` suffix; the fixed width keeps text ordering chronological.
pub(crate) fn encode_ts(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

pub(crate) fn decode_ts(raw: &str) -> Result<DateTime<Utc>, StorageError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|at| at.with_timezone(&Utc))
        .map_err(|e| StorageError::Serialization(format!("invalid timestamp {raw:?}: {e}")))
}

fn ts_column(row: &SqliteRow, column: &str) -> Result<DateTime<Utc>, StorageError> {
    decode_ts(&row.try_get::<String, _>(column).map_err(ser)?)
}

fn opt_ts_column(row: &SqliteRow, column: &str) -> Result<Option<DateTime<Utc>>, StorageError> {
    row.try_get::<Option<String>, _>(column)
        .map_err(ser)?
        .as_deref()
        .map(decode_ts)
        .transpose()
}

pub(crate) fn parse_difficulty(s: &str) -> Result<Difficulty, StorageError> {
    s.parse().map_err(ser)
}

pub(crate) fn map_item_row(row: &SqliteRow) -> Result<ReviewItemRecord, StorageError> {
    let identifier = ItemId::new(row.try_get::<String, _>("identifier").map_err(ser)?).map_err(ser)?;
    let level = row
        .try_get::<Option<String>, _>("level")
        .map_err(ser)?
        .map(|raw| raw.parse::<Level>())
        .transpose()
        .map_err(ser)?;

    Ok(ReviewItemRecord {
        identifier,
        level,
        interval_days: u32_from_i64(
            "interval_days",
            row.try_get::<i64, _>("interval_days").map_err(ser)?,
        )?,
        ease_factor: row.try_get("ease_factor").map_err(ser)?,
        review_count: u32_from_i64(
            "review_count",
            row.try_get::<i64, _>("review_count").map_err(ser)?,
        )?,
        correct_streak: u32_from_i64(
            "correct_streak",
            row.try_get::<i64, _>("correct_streak").map_err(ser)?,
        )?,
        correct_reviews: u32_from_i64(
            "correct_reviews",
            row.try_get::<i64, _>("correct_reviews").map_err(ser)?,
        )?,
        next_review_at: ts_column(row, "next_review_at")?,
        // Values above 10 still decode so validation can report them.
        mastery_level: u8_from_i64(
            "mastery_level",
            row.try_get::<i64, _>("mastery_level").map_err(ser)?,
        )?,
        first_reviewed_at: opt_ts_column(row, "first_reviewed_at")?,
        last_reviewed_at: opt_ts_column(row, "last_reviewed_at")?,
    })
}

pub(crate) fn map_session_row(row: &SqliteRow) -> Result<ReviewSessionRecord, StorageError> {
    let profile = ProfileId::new(row.try_get::<String, _>("profile").map_err(ser)?).map_err(ser)?;
    let item = ItemId::new(row.try_get::<String, _>("item").map_err(ser)?).map_err(ser)?;
    let difficulty = parse_difficulty(&row.try_get::<String, _>("difficulty").map_err(ser)?)?;
    let mastery_level = u8_from_i64(
        "mastery_level",
        row.try_get::<i64, _>("mastery_level").map_err(ser)?,
    )?;

    Ok(ReviewSessionRecord {
        id: Some(row.try_get("id").map_err(ser)?),
        profile,
        session: ReviewSession::new(
            ts_column(row, "reviewed_at")?,
            item,
            difficulty,
            mastery_level,
        ),
    })
}

pub(crate) fn map_streak_row(row: &SqliteRow) -> Result<DailyStreak, StorageError> {
    let current = u32_from_i64("streak_days", row.try_get::<i64, _>("streak_days").map_err(ser)?)?;
    let last: Option<NaiveDate> = row.try_get("last_study_date").map_err(ser)?;
    Ok(DailyStreak::from_persisted(current, last))
}

pub(crate) fn map_goal_row(row: &SqliteRow) -> Result<DailyGoal, StorageError> {
    let words = u32_from_i64("words", row.try_get("words").map_err(ser)?)?;
    DailyGoal::new(words).map_err(ser)
}
