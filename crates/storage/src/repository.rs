use async_trait::async_trait;
use chrono::{DateTime, Utc};
use kosakata_core::model::{
    DailyGoal, DailyStreak, ItemId, ProfileId, ReviewItem, ReviewItemRecord, ReviewSession,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Persisted review session, with the row id assigned by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewSessionRecord {
    pub id: Option<i64>,
    pub profile: ProfileId,
    pub session: ReviewSession,
}

/// Review items keyed by `(profile, identifier)`.
///
/// Reads hand back the raw [`ReviewItemRecord`]; callers validate it with
/// [`ReviewItem::from_persisted`] so corrupt rows surface as item-state errors
/// instead of being dropped here.
#[async_trait]
pub trait ReviewItemRepository: Send + Sync {
    /// Insert or replace an item.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the item cannot be stored.
    async fn upsert_item(&self, profile: &ProfileId, item: &ReviewItem) -> Result<(), StorageError>;

    /// Fetch one item, `None` if the profile never reviewed it.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the row cannot be read or decoded.
    async fn get_item(
        &self,
        profile: &ProfileId,
        identifier: &ItemId,
    ) -> Result<Option<ReviewItemRecord>, StorageError>;

    /// All items of a profile, ordered by identifier.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if rows cannot be read or decoded.
    async fn list_items(&self, profile: &ProfileId) -> Result<Vec<ReviewItemRecord>, StorageError>;
}

/// Append-only review session log.
#[async_trait]
pub trait ReviewSessionRepository: Send + Sync {
    /// Append a session and return its id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the session cannot be stored.
    async fn append_session(
        &self,
        profile: &ProfileId,
        session: &ReviewSession,
    ) -> Result<i64, StorageError>;

    /// Sessions of one item, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if rows cannot be read or decoded.
    async fn sessions_for_item(
        &self,
        profile: &ProfileId,
        identifier: &ItemId,
    ) -> Result<Vec<ReviewSessionRecord>, StorageError>;

    /// Most recent sessions of a profile, newest first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if rows cannot be read or decoded.
    async fn recent_sessions(
        &self,
        profile: &ProfileId,
        limit: u32,
    ) -> Result<Vec<ReviewSessionRecord>, StorageError>;

    /// Number of sessions of a profile timestamped in `[from, to)`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if sessions cannot be counted.
    async fn count_sessions_between(
        &self,
        profile: &ProfileId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<u32, StorageError>;
}

#[async_trait]
pub trait StreakRepository: Send + Sync {
    /// Current streak of a profile; the empty streak if none was stored yet.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the row cannot be read or decoded.
    async fn get_streak(&self, profile: &ProfileId) -> Result<DailyStreak, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` if the streak cannot be stored.
    async fn upsert_streak(
        &self,
        profile: &ProfileId,
        streak: &DailyStreak,
    ) -> Result<(), StorageError>;
}

/// Per-profile daily review goal.
#[async_trait]
pub trait GoalRepository: Send + Sync {
    /// Stored goal, or the default goal if the profile never set one.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the row cannot be read or decoded.
    async fn get_daily_goal(&self, profile: &ProfileId) -> Result<DailyGoal, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` if the goal cannot be stored.
    async fn set_daily_goal(&self, profile: &ProfileId, goal: DailyGoal)
    -> Result<(), StorageError>;
}

/// Persists a reviewed item together with its session record.
#[async_trait]
pub trait ReviewPersistence: Send + Sync {
    /// Store `item` and append `session` atomically, returning the session id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if `session` belongs to another item,
    /// or other storage errors if the write fails. Nothing is written on error.
    async fn apply_review(
        &self,
        profile: &ProfileId,
        item: &ReviewItem,
        session: &ReviewSession,
    ) -> Result<i64, StorageError>;
}

type ItemKey = (ProfileId, ItemId);

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    items: Arc<Mutex<HashMap<ItemKey, ReviewItemRecord>>>,
    sessions: Arc<Mutex<Vec<ReviewSessionRecord>>>,
    streaks: Arc<Mutex<HashMap<ProfileId, DailyStreak>>>,
    goals: Arc<Mutex<HashMap<ProfileId, DailyGoal>>>,
}

fn poisoned<E: std::fmt::Display>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a raw record without any validation.
    ///
    /// Lets tests and importers place state exactly as an external store holds it.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Connection` if the lock is poisoned.
    pub fn put_record(
        &self,
        profile: &ProfileId,
        record: ReviewItemRecord,
    ) -> Result<(), StorageError> {
        let mut guard = self.items.lock().map_err(poisoned)?;
        guard.insert((profile.clone(), record.identifier.clone()), record);
        Ok(())
    }

    fn push_session(
        sessions: &mut Vec<ReviewSessionRecord>,
        profile: &ProfileId,
        session: &ReviewSession,
    ) -> i64 {
        let id = i64::try_from(sessions.len()).unwrap_or(i64::MAX - 1) + 1;
        sessions.push(ReviewSessionRecord {
            id: Some(id),
            profile: profile.clone(),
            session: session.clone(),
        });
        id
    }
}

#[async_trait]
impl ReviewItemRepository for InMemoryRepository {
    async fn upsert_item(&self, profile: &ProfileId, item: &ReviewItem) -> Result<(), StorageError> {
        self.put_record(profile, item.to_persisted())
    }

    async fn get_item(
        &self,
        profile: &ProfileId,
        identifier: &ItemId,
    ) -> Result<Option<ReviewItemRecord>, StorageError> {
        let guard = self.items.lock().map_err(poisoned)?;
        Ok(guard.get(&(profile.clone(), identifier.clone())).cloned())
    }

    async fn list_items(&self, profile: &ProfileId) -> Result<Vec<ReviewItemRecord>, StorageError> {
        let guard = self.items.lock().map_err(poisoned)?;
        let mut out: Vec<ReviewItemRecord> = guard
            .iter()
            .filter(|((p, _), _)| p == profile)
            .map(|(_, record)| record.clone())
            .collect();
        out.sort_by(|a, b| a.identifier.cmp(&b.identifier));
        Ok(out)
    }
}

#[async_trait]
impl ReviewSessionRepository for InMemoryRepository {
    async fn append_session(
        &self,
        profile: &ProfileId,
        session: &ReviewSession,
    ) -> Result<i64, StorageError> {
        let mut guard = self.sessions.lock().map_err(poisoned)?;
        Ok(Self::push_session(&mut guard, profile, session))
    }

    async fn sessions_for_item(
        &self,
        profile: &ProfileId,
        identifier: &ItemId,
    ) -> Result<Vec<ReviewSessionRecord>, StorageError> {
        let guard = self.sessions.lock().map_err(poisoned)?;
        let mut out: Vec<_> = guard
            .iter()
            .filter(|r| &r.profile == profile && &r.session.item == identifier)
            .cloned()
            .collect();
        out.sort_by_key(|r| (r.session.timestamp, r.id));
        Ok(out)
    }

    async fn recent_sessions(
        &self,
        profile: &ProfileId,
        limit: u32,
    ) -> Result<Vec<ReviewSessionRecord>, StorageError> {
        let guard = self.sessions.lock().map_err(poisoned)?;
        let mut out: Vec<_> = guard.iter().filter(|r| &r.profile == profile).cloned().collect();
        out.sort_by(|a, b| {
            b.session
                .timestamp
                .cmp(&a.session.timestamp)
                .then(b.id.cmp(&a.id))
        });
        out.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
        Ok(out)
    }

    async fn count_sessions_between(
        &self,
        profile: &ProfileId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<u32, StorageError> {
        let guard = self.sessions.lock().map_err(poisoned)?;
        let count = guard
            .iter()
            .filter(|r| &r.profile == profile)
            .filter(|r| r.session.timestamp >= from && r.session.timestamp < to)
            .count();
        Ok(u32::try_from(count).unwrap_or(u32::MAX))
    }
}

#[async_trait]
impl StreakRepository for InMemoryRepository {
    async fn get_streak(&self, profile: &ProfileId) -> Result<DailyStreak, StorageError> {
        let guard = self.streaks.lock().map_err(poisoned)?;
        Ok(guard.get(profile).copied().unwrap_or_default())
    }

    async fn upsert_streak(
        &self,
        profile: &ProfileId,
        streak: &DailyStreak,
    ) -> Result<(), StorageError> {
        let mut guard = self.streaks.lock().map_err(poisoned)?;
        guard.insert(profile.clone(), *streak);
        Ok(())
    }
}

#[async_trait]
impl GoalRepository for InMemoryRepository {
    async fn get_daily_goal(&self, profile: &ProfileId) -> Result<DailyGoal, StorageError> {
        let guard = self.goals.lock().map_err(poisoned)?;
        Ok(guard.get(profile).copied().unwrap_or_default())
    }

    async fn set_daily_goal(
        &self,
        profile: &ProfileId,
        goal: DailyGoal,
    ) -> Result<(), StorageError> {
        let mut guard = self.goals.lock().map_err(poisoned)?;
        guard.insert(profile.clone(), goal);
        Ok(())
    }
}

#[async_trait]
impl ReviewPersistence for InMemoryRepository {
    async fn apply_review(
        &self,
        profile: &ProfileId,
        item: &ReviewItem,
        session: &ReviewSession,
    ) -> Result<i64, StorageError> {
        if &session.item != item.identifier() {
            return Err(StorageError::Conflict);
        }
        // Lock order: items, then sessions.
        let mut items = self.items.lock().map_err(poisoned)?;
        let mut sessions = self.sessions.lock().map_err(poisoned)?;
        items.insert(
            (profile.clone(), item.identifier().clone()),
            item.to_persisted(),
        );
        Ok(Self::push_session(&mut sessions, profile, session))
    }
}

/// Aggregates the repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub items: Arc<dyn ReviewItemRepository>,
    pub sessions: Arc<dyn ReviewSessionRepository>,
    pub streaks: Arc<dyn StreakRepository>,
    pub goals: Arc<dyn GoalRepository>,
    pub reviews: Arc<dyn ReviewPersistence>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        Self::from(InMemoryRepository::new())
    }
}

impl From<InMemoryRepository> for Storage {
    fn from(repo: InMemoryRepository) -> Self {
        Self {
            items: Arc::new(repo.clone()),
            sessions: Arc::new(repo.clone()),
            streaks: Arc::new(repo.clone()),
            goals: Arc::new(repo.clone()),
            reviews: Arc::new(repo),
        }
    }
}
