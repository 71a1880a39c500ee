use kosakata_core::model::{DailyStreak, ProfileId};

use super::{SqliteRepository, mapping::map_streak_row};
use crate::repository::{StorageError, StreakRepository};

#[async_trait::async_trait]
impl StreakRepository for SqliteRepository {
    async fn get_streak(&self, profile: &ProfileId) -> Result<DailyStreak, StorageError> {
        let row = sqlx::query(
            r"
                SELECT streak_days, last_study_date FROM daily_streaks
                WHERE profile = ?1
            ",
        )
        .bind(profile.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        row.as_ref()
            .map(map_streak_row)
            .transpose()
            .map(Option::unwrap_or_default)
    }

    async fn upsert_streak(
        &self,
        profile: &ProfileId,
        streak: &DailyStreak,
    ) -> Result<(), StorageError> {
        sqlx::query(
            r"
                INSERT INTO daily_streaks (profile, streak_days, last_study_date)
                VALUES (?1, ?2, ?3)
                ON CONFLICT(profile) DO UPDATE SET
                    streak_days = excluded.streak_days,
                    last_study_date = excluded.last_study_date
            ",
        )
        .bind(profile.as_str())
        .bind(i64::from(streak.current()))
        .bind(streak.last_study_date())
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(())
    }
}
