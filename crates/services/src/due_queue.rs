use std::sync::Arc;

use rand::seq::SliceRandom;

use kosakata_core::{
    model::{ItemId, Level, ProfileId, ReviewItem, ReviewItemRecord},
    scheduler::Scheduler,
};
use storage::repository::ReviewItemRepository;

use crate::Clock;
use crate::error::ProgressError;

/// Filters for building a review queue.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DueQueueOptions {
    /// Keep only items tagged with this level.
    pub level: Option<Level>,
    /// Cap the queue length after filtering and shuffling.
    pub limit: Option<usize>,
    /// Present due items in random order instead of identifier order.
    pub shuffle: bool,
}

/// Builds the list of items a profile should review now.
#[derive(Clone)]
pub struct DueQueue {
    clock: Clock,
    items: Arc<dyn ReviewItemRepository>,
}

/// Validate stored records, dropping (and logging) the ones that break an
/// item invariant. Returns the valid items and the number skipped.
pub(crate) fn valid_items(
    profile: &ProfileId,
    records: Vec<ReviewItemRecord>,
) -> (Vec<ReviewItem>, usize) {
    let mut skipped = 0;
    let items = records
        .into_iter()
        .filter_map(|record| {
            let identifier = record.identifier.clone();
            ReviewItem::from_persisted(record)
                .inspect_err(|e| {
                    skipped += 1;
                    tracing::warn!(%profile, item = %identifier, error = %e, "skipping invalid stored item");
                })
                .ok()
        })
        .collect();
    (items, skipped)
}

impl DueQueue {
    #[must_use]
    pub fn new(clock: Clock, items: Arc<dyn ReviewItemRepository>) -> Self {
        Self { clock, items }
    }

    /// Identifiers due for `profile` at the clock's current time.
    ///
    /// Items with invalid stored state are left out; `reset` them to bring
    /// them back into rotation.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::Storage` if items cannot be listed.
    pub async fn due_items(
        &self,
        profile: &ProfileId,
        options: DueQueueOptions,
    ) -> Result<Vec<ItemId>, ProgressError> {
        let records = self.items.list_items(profile).await?;
        let (items, _) = valid_items(profile, records);

        let mut due = Scheduler::select_due_items(&items, self.clock.now(), options.level);
        if options.shuffle {
            due.shuffle(&mut rand::rng());
        }
        if let Some(limit) = options.limit {
            due.truncate(limit);
        }

        tracing::debug!(%profile, due = due.len(), level = ?options.level, "built due queue");
        Ok(due)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use kosakata_core::model::Difficulty;
    use kosakata_core::time::fixed_now;
    use std::collections::HashSet;
    use storage::repository::InMemoryRepository;

    fn profile() -> ProfileId {
        ProfileId::new("sari").unwrap()
    }

    async fn seed(repo: &InMemoryRepository, word: &str, level: Level, difficulty: Difficulty) {
        let applied = Scheduler::new()
            .record_first_review(
                ItemId::new(word).unwrap(),
                Some(level),
                difficulty,
                fixed_now() - Duration::days(5),
            )
            .unwrap();
        repo.upsert_item(&profile(), &applied.item).await.unwrap();
    }

    async fn seeded() -> InMemoryRepository {
        let repo = InMemoryRepository::new();
        seed(&repo, "air", Level::AbsoluteBeginner, Difficulty::Hard).await;
        seed(&repo, "buku", Level::Beginner, Difficulty::Easy).await;
        seed(&repo, "cepat", Level::Beginner, Difficulty::Medium).await;
        seed(&repo, "dapur", Level::Intermediate, Difficulty::Hard).await;
        repo
    }

    fn ids(raw: &[&str]) -> Vec<ItemId> {
        raw.iter().map(|w| ItemId::new(*w).unwrap()).collect()
    }

    #[tokio::test]
    async fn due_items_in_identifier_order() {
        let repo = seeded().await;
        let queue = DueQueue::new(Clock::fixed(fixed_now()), Arc::new(repo));

        let due = queue
            .due_items(&profile(), DueQueueOptions::default())
            .await
            .unwrap();
        assert_eq!(due, ids(&["air", "buku", "cepat", "dapur"]));
    }

    #[tokio::test]
    async fn level_filter_and_limit() {
        let repo = seeded().await;
        let queue = DueQueue::new(Clock::fixed(fixed_now()), Arc::new(repo));

        let beginner = queue
            .due_items(
                &profile(),
                DueQueueOptions {
                    level: Some(Level::Beginner),
                    ..DueQueueOptions::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(beginner, ids(&["buku", "cepat"]));

        let limited = queue
            .due_items(
                &profile(),
                DueQueueOptions {
                    limit: Some(1),
                    ..DueQueueOptions::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(limited, ids(&["air"]));
    }

    #[tokio::test]
    async fn items_not_yet_due_are_left_out() {
        let repo = seeded().await;
        // Hard ratings come back after one day, easy and medium after two.
        let queue = DueQueue::new(
            Clock::fixed(fixed_now() - Duration::days(3) - Duration::hours(12)),
            Arc::new(repo),
        );
        let due = queue
            .due_items(&profile(), DueQueueOptions::default())
            .await
            .unwrap();
        assert_eq!(due, ids(&["air", "dapur"]));
    }

    #[tokio::test]
    async fn shuffle_keeps_the_same_items() {
        let repo = seeded().await;
        let queue = DueQueue::new(Clock::fixed(fixed_now()), Arc::new(repo));

        let shuffled = queue
            .due_items(
                &profile(),
                DueQueueOptions {
                    shuffle: true,
                    ..DueQueueOptions::default()
                },
            )
            .await
            .unwrap();
        let got: HashSet<_> = shuffled.into_iter().collect();
        let want: HashSet<_> = ids(&["air", "buku", "cepat", "dapur"]).into_iter().collect();
        assert_eq!(got, want);
    }

    #[tokio::test]
    async fn invalid_items_are_skipped() {
        let repo = seeded().await;
        let mut record = repo
            .get_item(&profile(), &ItemId::new("buku").unwrap())
            .await
            .unwrap()
            .unwrap();
        record.interval_days = 0;
        repo.put_record(&profile(), record).unwrap();

        let queue = DueQueue::new(Clock::fixed(fixed_now()), Arc::new(repo));
        let due = queue
            .due_items(&profile(), DueQueueOptions::default())
            .await
            .unwrap();
        assert_eq!(due, ids(&["air", "cepat", "dapur"]));
    }
}
