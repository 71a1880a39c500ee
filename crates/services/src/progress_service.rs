use std::sync::Arc;

use serde::Serialize;

use chrono::{Duration, NaiveTime};
use kosakata_core::{
    model::{DailyGoal, ItemId, Level, MasteryStatus, ProfileId},
    scheduler::Scheduler,
};
use storage::repository::{
    GoalRepository, ReviewItemRepository, ReviewSessionRepository, Storage, StreakRepository,
};

use crate::Clock;
use crate::due_queue::valid_items;
use crate::error::ProgressError;

/// Counts shown on the progress screen.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ProgressOverview {
    pub total: u32,
    pub due: u32,
    pub mastered: u32,
    pub normal: u32,
    pub weak: u32,
    /// Stored items skipped because their state is invalid.
    pub invalid: u32,
    /// Daily streak as of today; zero once a day was missed.
    pub streak: u32,
    /// Reviews logged since midnight UTC.
    pub reviewed_today: u32,
    pub daily_goal: u32,
    /// `reviewed_today` as a whole percentage of `daily_goal`, capped at 100.
    pub goal_percent: u32,
}

/// Weak item with the numbers used to rank it.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct WeakItem {
    pub identifier: ItemId,
    pub level: Option<Level>,
    pub mastery_level: u8,
    pub success_rate: f64,
    pub priority: f64,
}

#[derive(Clone)]
pub struct ProgressService {
    clock: Clock,
    items: Arc<dyn ReviewItemRepository>,
    sessions: Arc<dyn ReviewSessionRepository>,
    streaks: Arc<dyn StreakRepository>,
    goals: Arc<dyn GoalRepository>,
}

fn count(n: usize) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}

impl ProgressService {
    #[must_use]
    pub fn new(clock: Clock, storage: &Storage) -> Self {
        Self {
            clock,
            items: Arc::clone(&storage.items),
            sessions: Arc::clone(&storage.sessions),
            streaks: Arc::clone(&storage.streaks),
            goals: Arc::clone(&storage.goals),
        }
    }

    /// Totals for a profile.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::Storage` if items, sessions, the streak or the
    /// goal cannot be read.
    pub async fn overview(&self, profile: &ProfileId) -> Result<ProgressOverview, ProgressError> {
        let records = self.items.list_items(profile).await?;
        let (items, invalid) = valid_items(profile, records);
        let now = self.clock.now();

        let mut overview = ProgressOverview {
            total: count(items.len()),
            invalid: count(invalid),
            ..ProgressOverview::default()
        };
        for item in &items {
            if item.is_due(now) {
                overview.due += 1;
            }
            match item.status() {
                MasteryStatus::Mastered => overview.mastered += 1,
                MasteryStatus::Normal => overview.normal += 1,
                MasteryStatus::Weak => overview.weak += 1,
            }
        }

        let streak = self.streaks.get_streak(profile).await?;
        overview.streak = streak.active_on(self.clock.today());

        let day_start = self.clock.today().and_time(NaiveTime::MIN).and_utc();
        overview.reviewed_today = self
            .sessions
            .count_sessions_between(profile, day_start, day_start + Duration::days(1))
            .await?;
        let goal = self.goals.get_daily_goal(profile).await?;
        overview.daily_goal = goal.words();
        overview.goal_percent = goal.progress_percent(overview.reviewed_today);
        Ok(overview)
    }

    /// # Errors
    ///
    /// Returns `ProgressError::Storage` if the goal cannot be read.
    pub async fn daily_goal(&self, profile: &ProfileId) -> Result<DailyGoal, ProgressError> {
        Ok(self.goals.get_daily_goal(profile).await?)
    }

    /// Stores a new daily goal of `words` reviews.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::Goal` if `words` is outside `[5, 100]`, or
    /// `ProgressError::Storage` if it cannot be stored.
    pub async fn set_daily_goal(
        &self,
        profile: &ProfileId,
        words: u32,
    ) -> Result<DailyGoal, ProgressError> {
        let goal = DailyGoal::new(words)?;
        self.goals.set_daily_goal(profile, goal).await?;
        tracing::info!(profile = %profile, words, "daily goal updated");
        Ok(goal)
    }

    /// Weak items, most urgent first.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::Storage` if items cannot be listed.
    pub async fn weak_items(
        &self,
        profile: &ProfileId,
        limit: Option<usize>,
    ) -> Result<Vec<WeakItem>, ProgressError> {
        let records = self.items.list_items(profile).await?;
        let (items, _) = valid_items(profile, records);

        let ranked = Scheduler::rank_weak_items(&items)
            .into_iter()
            .take(limit.unwrap_or(usize::MAX))
            .map(|item| WeakItem {
                identifier: item.identifier().clone(),
                level: item.level(),
                mastery_level: item.mastery_level(),
                success_rate: item.success_rate(),
                priority: item.review_priority(),
            })
            .collect();
        Ok(ranked)
    }
}
