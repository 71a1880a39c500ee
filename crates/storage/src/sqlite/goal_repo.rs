use kosakata_core::model::{DailyGoal, ProfileId};

use super::{SqliteRepository, mapping::map_goal_row};
use crate::repository::{GoalRepository, StorageError};

#[async_trait::async_trait]
impl GoalRepository for SqliteRepository {
    async fn get_daily_goal(&self, profile: &ProfileId) -> Result<DailyGoal, StorageError> {
        let row = sqlx::query("SELECT words FROM daily_goals WHERE profile = ?1")
            .bind(profile.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        row.as_ref()
            .map(map_goal_row)
            .transpose()
            .map(Option::unwrap_or_default)
    }

    async fn set_daily_goal(
        &self,
        profile: &ProfileId,
        goal: DailyGoal,
    ) -> Result<(), StorageError> {
        sqlx::query(
            r"
                INSERT INTO daily_goals (profile, words)
                VALUES (?1, ?2)
                ON CONFLICT(profile) DO UPDATE SET words = excluded.words
            ",
        )
        .bind(profile.as_str())
        .bind(i64::from(goal.words()))
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(())
    }
}
