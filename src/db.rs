use std::{str::FromStr, time::Duration};

use chrono::Utc;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions},
    SqliteConnection, SqlitePool,
};
use uuid::Uuid;

use crate::models::{Link, User};

const USER_COLUMNS: &str = "id, name, email, password_hash, url_count";
const LINK_COLUMNS: &str = "id, original_url, short_code, user_id, clicks, created_at, updated_at";

// ── Pool ───────────────────────────────────────────────────────────────────

/// Open the connection pool and apply embedded migrations (files in
/// migrations/). The database file is created if it doesn't exist yet.
pub async fn connect(database_url: &str) -> anyhow::Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_secs(5))
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .connect_with(options)
        .await?;

    migrate(&pool).await?;
    Ok(pool)
}

pub async fn migrate(pool: &SqlitePool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}

pub async fn ping(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}

/// `true` when the error is a UNIQUE constraint violation.
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

// ── Users ──────────────────────────────────────────────────────────────────

/// Insert a new user with a zero url_count and return the stored row.
pub async fn create_user(
    pool: &SqlitePool,
    name: &str,
    email: &str,
    password_hash: &str,
) -> Result<User, sqlx::Error> {
    let now = Utc::now();
    sqlx::query_as(&format!(
        "INSERT INTO users (id, name, email, password_hash, url_count, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, 0, ?5, ?5)
         RETURNING {USER_COLUMNS}"
    ))
    .bind(Uuid::new_v4().to_string())
    .bind(name)
    .bind(email)
    .bind(password_hash)
    .bind(now)
    .fetch_one(pool)
    .await
}

pub async fn get_user_by_email(pool: &SqlitePool, email: &str) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?1"))
        .bind(email)
        .fetch_optional(pool)
        .await
}

pub async fn get_user_by_id(pool: &SqlitePool, id: &str) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"))
        .bind(id)
        .fetch_optional(pool)
        .await
}

/// Current url_count for a user, or `None` if the user does not exist.
pub async fn get_url_count(
    conn: &mut SqliteConnection,
    user_id: &str,
) -> Result<Option<i64>, sqlx::Error> {
    sqlx::query_scalar("SELECT url_count FROM users WHERE id = ?1")
        .bind(user_id)
        .fetch_optional(conn)
        .await
}

/// Claim one unit of quota. Check and increment are a single statement, so
/// two concurrent callers can never both pass at `limit - 1`.
///
/// Returns `false` when the user is missing or already at `limit`.
pub async fn reserve_quota(
    conn: &mut SqliteConnection,
    user_id: &str,
    limit: i64,
) -> Result<bool, sqlx::Error> {
    let affected = sqlx::query(
        "UPDATE users SET url_count = url_count + 1, updated_at = ?1
         WHERE id = ?2 AND url_count < ?3",
    )
    .bind(Utc::now())
    .bind(user_id)
    .bind(limit)
    .execute(conn)
    .await?
    .rows_affected();

    Ok(affected == 1)
}

/// Give back one unit of quota, never going below zero.
pub async fn release_quota(conn: &mut SqliteConnection, user_id: &str) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE users SET url_count = MAX(url_count - 1, 0), updated_at = ?1
         WHERE id = ?2",
    )
    .bind(Utc::now())
    .bind(user_id)
    .execute(conn)
    .await?;

    Ok(())
}

// ── Links ──────────────────────────────────────────────────────────────────

pub async fn code_exists(conn: &mut SqliteConnection, short_code: &str) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM links WHERE short_code = ?1)")
        .bind(short_code)
        .fetch_one(conn)
        .await
}

/// Insert a new link with zero clicks and return the stored row.
pub async fn insert_link(
    conn: &mut SqliteConnection,
    short_code: &str,
    original_url: &str,
    user_id: &str,
) -> Result<Link, sqlx::Error> {
    let now = Utc::now();
    sqlx::query_as(&format!(
        "INSERT INTO links (id, original_url, short_code, user_id, clicks, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, 0, ?5, ?5)
         RETURNING {LINK_COLUMNS}"
    ))
    .bind(Uuid::new_v4().to_string())
    .bind(original_url)
    .bind(short_code)
    .bind(user_id)
    .bind(now)
    .fetch_one(conn)
    .await
}

pub async fn get_link_by_id(conn: &mut SqliteConnection, id: &str) -> Result<Option<Link>, sqlx::Error> {
    sqlx::query_as(&format!("SELECT {LINK_COLUMNS} FROM links WHERE id = ?1"))
        .bind(id)
        .fetch_optional(conn)
        .await
}

#[cfg(test)]
pub async fn get_link_by_code(
    pool: &SqlitePool,
    short_code: &str,
) -> Result<Option<Link>, sqlx::Error> {
    sqlx::query_as(&format!("SELECT {LINK_COLUMNS} FROM links WHERE short_code = ?1"))
        .bind(short_code)
        .fetch_optional(pool)
        .await
}

/// All links owned by a user, newest first.
pub async fn list_links_for_user(pool: &SqlitePool, user_id: &str) -> Result<Vec<Link>, sqlx::Error> {
    sqlx::query_as(&format!(
        "SELECT {LINK_COLUMNS} FROM links
         WHERE user_id = ?1
         ORDER BY created_at DESC, rowid DESC"
    ))
    .bind(user_id)
    .fetch_all(pool)
    .await
}

/// Delete a link only if `user_id` owns it. Returns `true` if a row went away.
pub async fn delete_owned_link(
    conn: &mut SqliteConnection,
    id: &str,
    user_id: &str,
) -> Result<bool, sqlx::Error> {
    let affected = sqlx::query("DELETE FROM links WHERE id = ?1 AND user_id = ?2")
        .bind(id)
        .bind(user_id)
        .execute(conn)
        .await?
        .rows_affected();

    Ok(affected > 0)
}

// ── Clicks ─────────────────────────────────────────────────────────────────

/// Bump the click counter for a code and return its destination in one
/// statement. `None` if no link uses the code.
pub async fn record_click(pool: &SqlitePool, short_code: &str) -> Result<Option<String>, sqlx::Error> {
    sqlx::query_scalar(
        "UPDATE links SET clicks = clicks + 1, updated_at = ?1
         WHERE short_code = ?2
         RETURNING original_url",
    )
    .bind(Utc::now())
    .bind(short_code)
    .fetch_optional(pool)
    .await
}
