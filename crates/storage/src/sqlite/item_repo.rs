use kosakata_core::model::{ItemId, ProfileId, ReviewItem, ReviewItemRecord};
use sqlx::{Executor, Sqlite};

use super::{
    SqliteRepository,
    mapping::{encode_ts, map_item_row},
};
use crate::repository::{ReviewItemRepository, StorageError};

/// Upsert shared by the item repository and the atomic review write.
pub(super) async fn upsert_item_with<'e, E>(
    executor: E,
    profile: &ProfileId,
    item: &ReviewItem,
) -> Result<(), StorageError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let record = item.to_persisted();
    sqlx::query(
        r"
            INSERT INTO review_items (
                profile, identifier, level, interval_days, ease_factor,
                review_count, correct_streak, correct_reviews, next_review_at,
                mastery_level, first_reviewed_at, last_reviewed_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            ON CONFLICT(profile, identifier) DO UPDATE SET
                level = excluded.level,
                interval_days = excluded.interval_days,
                ease_factor = excluded.ease_factor,
                review_count = excluded.review_count,
                correct_streak = excluded.correct_streak,
                correct_reviews = excluded.correct_reviews,
                next_review_at = excluded.next_review_at,
                mastery_level = excluded.mastery_level,
                first_reviewed_at = excluded.first_reviewed_at,
                last_reviewed_at = excluded.last_reviewed_at
        ",
    )
    .bind(profile.as_str())
    .bind(record.identifier.as_str())
    .bind(record.level.map(|l| l.as_str()))
    .bind(i64::from(record.interval_days))
    .bind(record.ease_factor)
    .bind(i64::from(record.review_count))
    .bind(i64::from(record.correct_streak))
    .bind(i64::from(record.correct_reviews))
    .bind(encode_ts(record.next_review_at))
    .bind(i64::from(record.mastery_level))
    .bind(record.first_reviewed_at.map(encode_ts))
    .bind(record.last_reviewed_at.map(encode_ts))
    .execute(executor)
    .await
    .map_err(|e| StorageError::Connection(e.to_string()))?;
    Ok(())
}

#[async_trait::async_trait]
impl ReviewItemRepository for SqliteRepository {
    async fn upsert_item(&self, profile: &ProfileId, item: &ReviewItem) -> Result<(), StorageError> {
        upsert_item_with(&self.pool, profile, item).await
    }

    async fn get_item(
        &self,
        profile: &ProfileId,
        identifier: &ItemId,
    ) -> Result<Option<ReviewItemRecord>, StorageError> {
        let row = sqlx::query(
            r"
                SELECT * FROM review_items
                WHERE profile = ?1 AND identifier = ?2
            ",
        )
        .bind(profile.as_str())
        .bind(identifier.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        row.as_ref().map(map_item_row).transpose()
    }

    async fn list_items(&self, profile: &ProfileId) -> Result<Vec<ReviewItemRecord>, StorageError> {
        let rows = sqlx::query(
            r"
                SELECT * FROM review_items
                WHERE profile = ?1
                ORDER BY identifier ASC
            ",
        )
        .bind(profile.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        rows.iter()
            .map(map_item_row)
            .collect::<Result<Vec<_>, _>>()
            .inspect_err(|e| tracing::warn!(%profile, error = %e, "failed to decode review item row"))
    }
}
