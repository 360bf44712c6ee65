mod memory;
mod postgres;
mod r#trait;

pub use memory::InMemoryStore;
pub use postgres::PgStore;
pub use r#trait::{AccountStore, PostFilter, PostPage, PostQuery, PostRepository};

#[cfg(test)]
pub use r#trait::{MockAccountStore, MockPostRepository};

use tracing::error;
use uuid::Uuid;

use crate::domain::connection::MirrorMismatch;
use crate::error::StoreError;
use crate::metrics::STORE_INTEGRITY_VIOLATIONS_TOTAL;

/// Report a pair whose two sides disagree. The pair is left untouched.
pub(crate) fn mirror_violation(actor: Uuid, other: Uuid, mismatch: MirrorMismatch) -> StoreError {
    STORE_INTEGRITY_VIOLATIONS_TOTAL.inc();
    error!(
        actor = %actor,
        other = %other,
        mismatch = %mismatch,
        "Relation sets are not mirrored between accounts"
    );
    StoreError::Integrity(format!(
        "relation between {} and {} is inconsistent: {}",
        actor, other, mismatch
    ))
}
