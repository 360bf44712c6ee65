//! PostgreSQL-backed stores
//!
//! Relation sets live in `account_relations`, one row per account side. A pair
//! transition locks both account rows in id order, reads both sides, and
//! writes both sides in one transaction. Likes and saves are rows keyed by
//! `(post_id, user_id)`; toggles lock the post row so the membership flip and
//! the score recomputation commit together.

mod accounts;
mod posts;

use rand::Rng;
use sqlx::PgPool;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

use crate::error::StoreError;

const INITIAL_BACKOFF: Duration = Duration::from_millis(25);
const MAX_BACKOFF: Duration = Duration::from_millis(500);
const BACKOFF_MULTIPLIER: f64 = 2.0;

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
    write_retries: u32,
}

impl PgStore {
    pub fn new(pool: PgPool, write_retries: u32) -> Self {
        Self {
            pool,
            write_retries,
        }
    }

    /// Re-run `op` while it fails with a write conflict, backing off
    /// exponentially with jitter. Other errors are returned immediately.
    async fn retry_on_conflict<F, Fut, T, E>(&self, label: &'static str, mut op: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: AsStoreError,
    {
        let mut attempt = 0;
        let mut backoff = INITIAL_BACKOFF;

        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if attempt < self.write_retries && err.is_conflict() => {
                    attempt += 1;
                    let delay = jittered(backoff);
                    warn!(
                        operation = label,
                        attempt,
                        max_retries = self.write_retries,
                        delay_ms = delay.as_millis() as u64,
                        "Write conflict, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    backoff = Duration::from_millis(
                        (backoff.as_millis() as f64 * BACKOFF_MULTIPLIER)
                            .min(MAX_BACKOFF.as_millis() as f64) as u64,
                    );
                }
                Err(err) => return Err(err),
            }
        }
    }
}

fn jittered(base: Duration) -> Duration {
    let factor = 1.0 + rand::thread_rng().gen_range(-0.3..0.3);
    Duration::from_millis((base.as_millis() as f64 * factor) as u64)
}

/// Errors that may wrap a retryable store conflict
pub(crate) trait AsStoreError {
    fn is_conflict(&self) -> bool;
}

impl AsStoreError for StoreError {
    fn is_conflict(&self) -> bool {
        self.is_retryable()
    }
}

impl AsStoreError for crate::domain::ConnectionError {
    fn is_conflict(&self) -> bool {
        matches!(self, crate::domain::ConnectionError::Store(e) if e.is_retryable())
    }
}
