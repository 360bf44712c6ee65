use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use uuid::Uuid;

use crate::domain::{
    Account, AccountSummary, Comment, ConnectionError, ConnectionOp, MediaType, PairState, Post,
    PostWithAuthor, Relation,
};
use crate::error::StoreResult;
use crate::services::visibility::ViewerScope;

/// Account records and their relation sets.
///
/// Implemented by `PgStore` (PostgreSQL) and `InMemoryStore`.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn get_account(&self, id: Uuid) -> StoreResult<Option<Account>>;

    /// Accounts for the given ids; unknown ids are skipped
    async fn get_accounts(&self, ids: &[Uuid]) -> StoreResult<Vec<Account>>;

    /// Create or replace an account's profile fields
    async fn upsert_account(&self, account: &Account) -> StoreResult<()>;

    async fn connection_ids(&self, id: Uuid) -> StoreResult<HashSet<Uuid>>;

    /// Current state of the pair as seen from `actor`
    async fn pair_state(&self, actor: Uuid, other: Uuid) -> Result<PairState, ConnectionError>;

    /// Apply `op` to the pair, updating both accounts as one unit.
    /// Returns the new state as seen from `actor`.
    async fn apply_transition(
        &self,
        actor: Uuid,
        other: Uuid,
        op: ConnectionOp,
    ) -> Result<PairState, ConnectionError>;

    /// Accounts `id` holds `relation` towards
    async fn list_related(&self, id: Uuid, relation: Relation) -> StoreResult<Vec<AccountSummary>>;

    /// Up to `limit` accounts other than `viewer`, relation sets included
    async fn discover(&self, viewer: Uuid, limit: usize) -> StoreResult<Vec<Account>>;

    async fn ping(&self) -> StoreResult<()>;
}

/// Candidate restriction applied before ordering
#[derive(Debug, Clone, PartialEq)]
pub enum PostFilter {
    All,
    PostType(String),
    HasMedia,
    MediaType(MediaType),
    /// Case-insensitive `#tag` in the content
    Hashtag(String),
}

/// Visible posts, newest first (ties on id, descending)
#[derive(Debug, Clone, PartialEq)]
pub struct PostQuery {
    pub scope: ViewerScope,
    pub filter: PostFilter,
    pub since: Option<DateTime<Utc>>,
    pub limit: usize,
    pub offset: usize,
}

impl PostQuery {
    pub fn new(scope: ViewerScope, filter: PostFilter, limit: usize) -> Self {
        Self {
            scope,
            filter,
            since: None,
            limit,
            offset: 0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PostPage {
    pub posts: Vec<PostWithAuthor>,
    /// Visible posts matching the filter, ignoring limit/offset
    pub total: u64,
}

/// Posts and their engagement sub-records.
///
/// Every engagement mutation is atomic per post and recomputes the persisted
/// score in the same unit. Mutations return `None` when the post is missing.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PostRepository: Send + Sync {
    async fn insert_post(&self, post: &Post) -> StoreResult<()>;

    /// Replace content and tag set
    async fn update_content(
        &self,
        post_id: Uuid,
        content: &str,
        tags: &[String],
        now: DateTime<Utc>,
    ) -> StoreResult<Option<Post>>;

    async fn get_post(&self, post_id: Uuid) -> StoreResult<Option<PostWithAuthor>>;

    async fn query_posts(&self, query: &PostQuery) -> StoreResult<PostPage>;

    async fn toggle_like(
        &self,
        post_id: Uuid,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<Post>>;

    async fn toggle_save(
        &self,
        post_id: Uuid,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<Post>>;

    async fn add_comment(
        &self,
        post_id: Uuid,
        comment: &Comment,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<Post>>;

    async fn increment_shares(&self, post_id: Uuid, now: DateTime<Utc>) -> StoreResult<Option<Post>>;

    async fn increment_views(&self, post_id: Uuid, now: DateTime<Utc>) -> StoreResult<Option<Post>>;
}
