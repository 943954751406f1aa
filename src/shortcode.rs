use async_trait::async_trait;
use rand::Rng;
use sqlx::SqliteConnection;

use crate::{db, error::AppError};

/// A–Z, a–z, 0–9.
pub const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

pub const DEFAULT_LENGTH: usize = 6;
pub const MIN_LENGTH: usize = 6;
pub const MAX_LENGTH: usize = 8;

/// Candidates tried before giving up on an allocation.
pub const MAX_ATTEMPTS: usize = 10;

/// Anything that can answer "is this code taken?".
#[async_trait]
pub trait CodeStore {
    async fn code_exists(&mut self, code: &str) -> Result<bool, AppError>;
}

#[async_trait]
impl CodeStore for SqliteConnection {
    async fn code_exists(&mut self, code: &str) -> Result<bool, AppError> {
        Ok(db::code_exists(self, code).await?)
    }
}

/// Generate a random code of the given length, each position drawn
/// uniformly from [`ALPHABET`].
pub fn random_code(len: usize) -> String {
    random_code_with(&mut rand::thread_rng(), len)
}

pub fn random_code_with<R: Rng + ?Sized>(rng: &mut R, len: usize) -> String {
    (0..len)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect()
}

/// `true` if `code` could have been produced by this allocator.
pub fn is_valid_code(code: &str) -> bool {
    (MIN_LENGTH..=MAX_LENGTH).contains(&code.len())
        && code.bytes().all(|b| b.is_ascii_alphanumeric())
}

/// Draw candidates until one is not in `store`, up to `attempts` times.
///
/// The check is advisory: callers still rely on the UNIQUE index when
/// inserting and must treat a unique violation as a collision.
pub async fn allocate<S>(store: &mut S, len: usize, attempts: usize) -> Result<String, AppError>
where
    S: CodeStore + Send + ?Sized,
{
    for attempt in 1..=attempts {
        let code = random_code(len);
        if !store.code_exists(&code).await? {
            return Ok(code);
        }
        tracing::debug!(attempt, "short code collision, retrying");
    }

    tracing::error!(attempts, len, "short code space exhausted");
    Err(AppError::CodeSpaceExhausted(attempts))
}
