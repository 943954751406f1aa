//! Link lifecycle: creation under the per-user quota, listing, owner-only
//! deletion and redirect resolution.
//!
//! Every multi-step mutation runs in one transaction. The quota check and
//! increment are a single conditional UPDATE and the UNIQUE index on
//! `short_code` backs the allocator, so concurrent requests can neither
//! overshoot the quota nor commit a duplicate code.

use sqlx::SqlitePool;
use url::Url;
use uuid::Uuid;

use crate::{
    db,
    error::AppError,
    models::{Link, URL_LIMIT},
    shortcode,
};

/// Normalize user input into an absolute http(s) URL.
///
/// Input without a scheme is assumed to be https, so `example.com` becomes
/// `https://example.com/`.
pub fn normalize_url(raw: &str) -> Result<String, AppError> {
    let invalid = || AppError::Validation("Please provide a valid URL".into());

    let raw = raw.trim();
    if raw.is_empty() {
        return Err(invalid());
    }

    let candidate = if raw.starts_with("http") {
        raw.to_owned()
    } else {
        format!("https://{raw}")
    };

    let url = Url::parse(&candidate).map_err(|_| invalid())?;
    if !matches!(url.scheme(), "http" | "https") || url.host_str().map_or(true, str::is_empty) {
        return Err(invalid());
    }

    Ok(url.to_string())
}

/// Create a link for `user_id`, consuming one unit of quota.
///
/// Fails with `QuotaExceeded` (before any code is drawn) when the user
/// already owns [`URL_LIMIT`] links and with `NotFound` when the user is gone.
pub async fn create_for_user(
    pool: &SqlitePool,
    user_id: &str,
    original_url: &str,
) -> Result<Link, AppError> {
    let mut tx = pool.begin().await?;

    if !db::reserve_quota(&mut tx, user_id, URL_LIMIT).await? {
        return match db::get_url_count(&mut tx, user_id).await? {
            None => Err(AppError::NotFound("User not found".into())),
            Some(count) => {
                tracing::info!(user_id, count, "Link creation refused: quota reached");
                Err(AppError::QuotaExceeded { limit: URL_LIMIT })
            }
        };
    }

    for _ in 0..shortcode::MAX_ATTEMPTS {
        let code =
            shortcode::allocate(&mut *tx, shortcode::DEFAULT_LENGTH, shortcode::MAX_ATTEMPTS)
                .await?;

        match db::insert_link(&mut tx, &code, original_url, user_id).await {
            Ok(link) => {
                tx.commit().await?;
                tracing::info!(user_id, short_code = %link.short_code, "Link created");
                return Ok(link);
            }
            Err(e) if db::is_unique_violation(&e) => {
                tracing::warn!(short_code = %code, "Short code claimed concurrently, retrying");
            }
            Err(e) => return Err(e.into()),
        }
    }

    // Dropping `tx` rolls back the quota reservation.
    Err(AppError::CodeSpaceExhausted(shortcode::MAX_ATTEMPTS))
}

/// Delete a link owned by `user_id` and return the quota unit it held.
pub async fn delete_for_user(pool: &SqlitePool, user_id: &str, link_id: &str) -> Result<(), AppError> {
    if Uuid::parse_str(link_id).is_err() {
        return Err(AppError::Validation("Invalid URL ID".into()));
    }

    let mut tx = pool.begin().await?;

    if !db::delete_owned_link(&mut tx, link_id, user_id).await? {
        return match db::get_link_by_id(&mut tx, link_id).await? {
            None => Err(AppError::NotFound("URL not found".into())),
            Some(_) => {
                tracing::warn!(user_id, link_id, "Refused to delete a link owned by someone else");
                Err(AppError::Forbidden("Not authorized to delete this URL".into()))
            }
        };
    }

    db::release_quota(&mut tx, user_id).await?;
    tx.commit().await?;

    tracing::info!(user_id, link_id, "Link deleted");
    Ok(())
}

pub async fn list_for_user(pool: &SqlitePool, user_id: &str) -> Result<Vec<Link>, AppError> {
    Ok(db::list_links_for_user(pool, user_id).await?)
}

/// Resolve a short code to its destination, counting the visit.
pub async fn resolve(pool: &SqlitePool, short_code: &str) -> Result<String, AppError> {
    let not_found = || AppError::NotFound("URL not found".into());

    if !shortcode::is_valid_code(short_code) {
        return Err(not_found());
    }

    db::record_click(pool, short_code).await?.ok_or_else(not_found)
}
