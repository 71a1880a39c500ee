use chrono::Utc;
use sqlx::SqlitePool;

use super::SqliteInitError;

/// Runs the versioned schema migrations.
///
/// Version 1 creates review items, the session log, daily streaks and indexes.
/// Version 2 adds per-profile daily goals.
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), SqliteInitError> {
    async fn is_applied(pool: &SqlitePool, version: i64) -> Result<bool, sqlx::Error> {
        let row = sqlx::query("SELECT 1 FROM schema_migrations WHERE version = ?1")
            .bind(version)
            .fetch_optional(pool)
            .await?;
        Ok(row.is_some())
    }

    sqlx::query(
        r"
            CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            );
            ",
    )
    .execute(pool)
    .await?;

    if !is_applied(pool, 1).await? {
        let mut tx = pool.begin().await?;

        // Range invariants (ease, mastery) are checked when rows are loaded,
        // so out-of-range rows written by other tools surface as item-state errors.
        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS review_items (
                    profile TEXT NOT NULL,
                    identifier TEXT NOT NULL,
                    level TEXT,
                    interval_days INTEGER NOT NULL CHECK (interval_days >= 0),
                    ease_factor REAL NOT NULL,
                    review_count INTEGER NOT NULL CHECK (review_count >= 0),
                    correct_streak INTEGER NOT NULL CHECK (correct_streak >= 0),
                    correct_reviews INTEGER NOT NULL DEFAULT 0 CHECK (correct_reviews >= 0),
                    next_review_at TEXT NOT NULL,
                    mastery_level INTEGER NOT NULL CHECK (mastery_level >= 0),
                    first_reviewed_at TEXT,
                    last_reviewed_at TEXT,
                    PRIMARY KEY (profile, identifier)
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS review_sessions (
                    id INTEGER PRIMARY KEY,
                    profile TEXT NOT NULL,
                    item TEXT NOT NULL,
                    difficulty TEXT NOT NULL CHECK (difficulty IN ('easy', 'medium', 'hard')),
                    mastery_level INTEGER NOT NULL CHECK (mastery_level BETWEEN 0 AND 10),
                    reviewed_at TEXT NOT NULL,
                    FOREIGN KEY (profile, item)
                        REFERENCES review_items(profile, identifier) ON DELETE CASCADE
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS daily_streaks (
                    profile TEXT PRIMARY KEY,
                    streak_days INTEGER NOT NULL CHECK (streak_days >= 0),
                    last_study_date TEXT
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE INDEX IF NOT EXISTS idx_review_items_profile_next_review
                    ON review_items (profile, next_review_at);
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE INDEX IF NOT EXISTS idx_review_sessions_profile_item_reviewed_at
                    ON review_sessions (profile, item, reviewed_at);
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                INSERT INTO schema_migrations (version, applied_at)
                VALUES (?1, ?2)
                ON CONFLICT(version) DO NOTHING
            ",
        )
        .bind(1_i64)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        tracing::info!(version = 1, "applied schema migration");
    }

    if !is_applied(pool, 2).await? {
        let mut tx = pool.begin().await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS daily_goals (
                    profile TEXT PRIMARY KEY,
                    words INTEGER NOT NULL CHECK (words BETWEEN 5 AND 100)
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                INSERT INTO schema_migrations (version, applied_at)
                VALUES (?1, ?2)
                ON CONFLICT(version) DO NOTHING
            ",
        )
        .bind(2_i64)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        tracing::info!(version = 2, "applied schema migration");
    }

    Ok(())
}
