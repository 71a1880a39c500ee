use chrono::{Duration, NaiveTime};
use kosakata_core::model::{
    DailyGoal, DailyStreak, Difficulty, ItemId, ItemStateError, Level, ProfileId, ReviewItem, ReviewSession,
};
use kosakata_core::scheduler::Scheduler;
use kosakata_core::time::fixed_now;
use storage::repository::{
    GoalRepository, ReviewItemRepository, ReviewPersistence, ReviewSessionRepository,
    StorageError, StreakRepository,
};
use storage::sqlite::SqliteRepository;

async fn connect(name: &str) -> SqliteRepository {
    let repo = SqliteRepository::connect(&format!("sqlite:file:{name}?mode=memory&cache=shared"))
        .await
        .expect("connect");
    repo.migrate().await.expect("migrate");
    repo
}

fn profile() -> ProfileId {
    ProfileId::new("sari").unwrap()
}

fn id(raw: &str) -> ItemId {
    ItemId::new(raw).unwrap()
}

#[tokio::test]
async fn sqlite_round_trips_reviewed_item() {
    let repo = connect("memdb_item_roundtrip").await;
    let scheduler = Scheduler::new();

    let first = scheduler
        .record_first_review(id("terima kasih"), Some(Level::AbsoluteBeginner), Difficulty::Easy, fixed_now())
        .unwrap();
    let later = fixed_now() + Duration::days(2);
    let second = scheduler
        .record_review(&first.item, Difficulty::Medium, later)
        .unwrap();

    repo.apply_review(&profile(), &first.item, &first.session)
        .await
        .unwrap();
    repo.apply_review(&profile(), &second.item, &second.session)
        .await
        .unwrap();

    let record = repo
        .get_item(&profile(), &id("terima kasih"))
        .await
        .unwrap()
        .expect("item stored");
    let loaded = ReviewItem::from_persisted(record).unwrap();
    assert_eq!(loaded, second.item);
    assert_eq!(loaded.review_count(), 2);
    assert_eq!(loaded.level(), Some(Level::AbsoluteBeginner));

    let sessions = repo
        .sessions_for_item(&profile(), &id("terima kasih"))
        .await
        .unwrap();
    assert_eq!(sessions.len(), 2);
    assert_eq!(sessions[0].session, first.session);
    assert_eq!(sessions[1].session, second.session);
}

#[tokio::test]
async fn sqlite_migrate_is_idempotent() {
    let repo = connect("memdb_migrate_twice").await;
    repo.migrate().await.expect("second migrate");
    assert!(repo.list_items(&profile()).await.unwrap().is_empty());
}

#[tokio::test]
async fn sqlite_lists_items_per_profile_in_identifier_order() {
    let repo = connect("memdb_list_items").await;
    let scheduler = Scheduler::new();
    let other = ProfileId::new("budi").unwrap();

    for word in ["tidur", "air", "makan"] {
        let applied = scheduler
            .record_first_review(id(word), None, Difficulty::Hard, fixed_now())
            .unwrap();
        repo.upsert_item(&profile(), &applied.item).await.unwrap();
    }
    let applied = scheduler
        .record_first_review(id("rumah"), None, Difficulty::Easy, fixed_now())
        .unwrap();
    repo.upsert_item(&other, &applied.item).await.unwrap();

    let ids: Vec<String> = repo
        .list_items(&profile())
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.identifier.to_string())
        .collect();
    assert_eq!(ids, ["air", "makan", "tidur"]);
    assert_eq!(repo.list_items(&other).await.unwrap().len(), 1);
    assert!(repo.get_item(&other, &id("air")).await.unwrap().is_none());
}

#[tokio::test]
async fn sqlite_surfaces_corrupt_rows_as_item_state_errors() {
    let repo = connect("memdb_corrupt_row").await;
    let applied = Scheduler::new()
        .record_first_review(id("buku"), None, Difficulty::Easy, fixed_now())
        .unwrap();
    repo.upsert_item(&profile(), &applied.item).await.unwrap();

    sqlx::query("UPDATE review_items SET ease_factor = 3.1 WHERE identifier = 'buku'")
        .execute(repo.pool())
        .await
        .unwrap();

    let record = repo.get_item(&profile(), &id("buku")).await.unwrap().unwrap();
    assert_eq!(record.ease_factor, 3.1);
    assert!(matches!(
        ReviewItem::from_persisted(record),
        Err(ItemStateError::EaseFactorOutOfRange { .. })
    ));
}

#[tokio::test]
async fn sqlite_apply_review_rejects_mismatched_session() {
    let repo = connect("memdb_conflict").await;
    let applied = Scheduler::new()
        .record_first_review(id("makan"), None, Difficulty::Easy, fixed_now())
        .unwrap();
    let stray = ReviewSession::new(fixed_now(), id("minum"), Difficulty::Easy, 2);

    let err = repo
        .apply_review(&profile(), &applied.item, &stray)
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::Conflict));
    assert!(repo.get_item(&profile(), &id("makan")).await.unwrap().is_none());
}

#[tokio::test]
async fn sqlite_session_log_requires_existing_item() {
    let repo = connect("memdb_session_fk").await;
    let orphan = ReviewSession::new(fixed_now(), id("hantu"), Difficulty::Hard, 0);
    let err = repo.append_session(&profile(), &orphan).await.unwrap_err();
    assert!(matches!(err, StorageError::Connection(_)));
}

#[tokio::test]
async fn sqlite_recent_sessions_newest_first() {
    let repo = connect("memdb_recent_sessions").await;
    let scheduler = Scheduler::new();
    let mut item = scheduler
        .record_first_review(id("kopi"), None, Difficulty::Hard, fixed_now())
        .unwrap();
    repo.apply_review(&profile(), &item.item, &item.session)
        .await
        .unwrap();

    for (offset, difficulty) in [(1, Difficulty::Medium), (3, Difficulty::Easy)] {
        item = scheduler
            .record_review(&item.item, difficulty, fixed_now() + Duration::days(offset))
            .unwrap();
        repo.apply_review(&profile(), &item.item, &item.session)
            .await
            .unwrap();
    }

    let recent = repo.recent_sessions(&profile(), 2).await.unwrap();
    let difficulties: Vec<Difficulty> = recent.iter().map(|r| r.session.difficulty).collect();
    assert_eq!(difficulties, [Difficulty::Easy, Difficulty::Medium]);
    assert!(recent.iter().all(|r| r.id.is_some() && r.profile == profile()));
}

#[tokio::test]
async fn sqlite_streak_round_trip() {
    let repo = connect("memdb_streak").await;
    assert_eq!(repo.get_streak(&profile()).await.unwrap(), DailyStreak::new());

    let mut streak = DailyStreak::new();
    let today = fixed_now().date_naive();
    streak.record_study(today);
    streak.record_study(today.succ_opt().unwrap());
    repo.upsert_streak(&profile(), &streak).await.unwrap();

    let loaded = repo.get_streak(&profile()).await.unwrap();
    assert_eq!(loaded, streak);
    assert_eq!(loaded.current(), 2);
}

#[tokio::test]
async fn sqlite_stores_timestamps_as_fixed_width_utc_text() {
    let repo = connect("memdb_timestamp_text").await;
    let applied = Scheduler::new()
        .record_first_review(id("pagi"), None, Difficulty::Easy, fixed_now())
        .unwrap();
    repo.apply_review(&profile(), &applied.item, &applied.session)
        .await
        .unwrap();

    let (reviewed_at,): (String,) = sqlx::query_as("SELECT reviewed_at FROM review_sessions")
        .fetch_one(repo.pool())
        .await
        .unwrap();
    assert_eq!(reviewed_at, "2023-11-14T22:13:20.000000000Z");

    let (last,): (String,) = sqlx::query_as("SELECT last_reviewed_at FROM review_items")
        .fetch_one(repo.pool())
        .await
        .unwrap();
    assert_eq!(last, reviewed_at);
}

#[tokio::test]
async fn sqlite_rejects_malformed_timestamps() {
    let repo = connect("memdb_bad_timestamp").await;
    let applied = Scheduler::new()
        .record_first_review(id("malam"), None, Difficulty::Easy, fixed_now())
        .unwrap();
    repo.upsert_item(&profile(), &applied.item).await.unwrap();

    sqlx::query("UPDATE review_items SET next_review_at = 'next tuesday' WHERE identifier = 'malam'")
        .execute(repo.pool())
        .await
        .unwrap();

    let err = repo.get_item(&profile(), &id("malam")).await.unwrap_err();
    assert!(matches!(err, StorageError::Serialization(_)));
}

#[tokio::test]
async fn sqlite_counts_sessions_within_a_day() {
    let repo = connect("memdb_session_count").await;
    let applied = Scheduler::new()
        .record_first_review(id("kopi"), None, Difficulty::Hard, fixed_now())
        .unwrap();
    repo.upsert_item(&profile(), &applied.item).await.unwrap();

    let day_start = fixed_now()
        .date_naive()
        .and_time(NaiveTime::MIN)
        .and_utc();
    let day_end = day_start + Duration::days(1);
    for at in [
        day_start - Duration::seconds(1),
        day_start,
        fixed_now() + Duration::milliseconds(250),
        fixed_now() + Duration::hours(1),
        day_end,
    ] {
        let session = ReviewSession::new(at, id("kopi"), Difficulty::Medium, 1);
        repo.append_session(&profile(), &session).await.unwrap();
    }

    let other = ProfileId::new("budi").unwrap();
    assert_eq!(
        repo.count_sessions_between(&profile(), day_start, day_end)
            .await
            .unwrap(),
        3
    );
    assert_eq!(
        repo.count_sessions_between(&other, day_start, day_end)
            .await
            .unwrap(),
        0
    );
}

#[tokio::test]
async fn sqlite_daily_goal_round_trip() {
    let repo = connect("memdb_daily_goal").await;
    assert_eq!(repo.get_daily_goal(&profile()).await.unwrap(), DailyGoal::default());

    repo.set_daily_goal(&profile(), DailyGoal::new(40).unwrap())
        .await
        .unwrap();
    repo.set_daily_goal(&profile(), DailyGoal::new(15).unwrap())
        .await
        .unwrap();
    assert_eq!(repo.get_daily_goal(&profile()).await.unwrap().words(), 15);

    let out_of_range = sqlx::query("INSERT INTO daily_goals (profile, words) VALUES ('budi', 3)")
        .execute(repo.pool())
        .await;
    assert!(out_of_range.is_err());
}
