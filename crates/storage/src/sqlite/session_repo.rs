use chrono::{DateTime, Utc};
use kosakata_core::model::{ItemId, ProfileId, ReviewItem, ReviewSession};
use sqlx::Row;
use sqlx::{Executor, Sqlite};

use super::{SqliteRepository, item_repo::upsert_item_with, mapping::{encode_ts, map_session_row, ser}};
use crate::repository::{
    ReviewPersistence, ReviewSessionRecord, ReviewSessionRepository, StorageError,
};

async fn insert_session_with<'e, E>(
    executor: E,
    profile: &ProfileId,
    session: &ReviewSession,
) -> Result<i64, StorageError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let res = sqlx::query(
        r"
            INSERT INTO review_sessions (profile, item, difficulty, mastery_level, reviewed_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
        ",
    )
    .bind(profile.as_str())
    .bind(session.item.as_str())
    .bind(session.difficulty.as_str())
    .bind(i64::from(session.mastery_level))
    .bind(encode_ts(session.timestamp))
    .execute(executor)
    .await
    .map_err(|e| StorageError::Connection(e.to_string()))?;

    Ok(res.last_insert_rowid())
}

#[async_trait::async_trait]
impl ReviewSessionRepository for SqliteRepository {
    async fn append_session(
        &self,
        profile: &ProfileId,
        session: &ReviewSession,
    ) -> Result<i64, StorageError> {
        insert_session_with(&self.pool, profile, session).await
    }

    async fn sessions_for_item(
        &self,
        profile: &ProfileId,
        identifier: &ItemId,
    ) -> Result<Vec<ReviewSessionRecord>, StorageError> {
        let rows = sqlx::query(
            r"
                SELECT id, profile, item, difficulty, mastery_level, reviewed_at
                FROM review_sessions
                WHERE profile = ?1 AND item = ?2
                ORDER BY reviewed_at ASC, id ASC
            ",
        )
        .bind(profile.as_str())
        .bind(identifier.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        rows.iter().map(map_session_row).collect()
    }

    async fn recent_sessions(
        &self,
        profile: &ProfileId,
        limit: u32,
    ) -> Result<Vec<ReviewSessionRecord>, StorageError> {
        let rows = sqlx::query(
            r"
                SELECT id, profile, item, difficulty, mastery_level, reviewed_at
                FROM review_sessions
                WHERE profile = ?1
                ORDER BY reviewed_at DESC, id DESC
                LIMIT ?2
            ",
        )
        .bind(profile.as_str())
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        rows.iter().map(map_session_row).collect()
    }

    async fn count_sessions_between(
        &self,
        profile: &ProfileId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<u32, StorageError> {
        // Fixed-width timestamps compare correctly as text.
        let row = sqlx::query(
            r"
                SELECT COUNT(*) AS total
                FROM review_sessions
                WHERE profile = ?1 AND reviewed_at >= ?2 AND reviewed_at < ?3
            ",
        )
        .bind(profile.as_str())
        .bind(encode_ts(from))
        .bind(encode_ts(to))
        .fetch_one(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        let total: i64 = row.try_get("total").map_err(ser)?;
        u32::try_from(total).map_err(ser)
    }
}

#[async_trait::async_trait]
impl ReviewPersistence for SqliteRepository {
    async fn apply_review(
        &self,
        profile: &ProfileId,
        item: &ReviewItem,
        session: &ReviewSession,
    ) -> Result<i64, StorageError> {
        if &session.item != item.identifier() {
            return Err(StorageError::Conflict);
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        upsert_item_with(&mut *tx, profile, item).await?;
        let id = insert_session_with(&mut *tx, profile, session).await?;

        tx.commit()
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        Ok(id)
    }
}
