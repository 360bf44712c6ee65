//! In-memory store used by tests and by development runs without a database.
//!
//! Every mutation runs under a single write guard, so pair updates and set
//! mutations are atomic. Lock order is always accounts before posts.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::mirror_violation;
use super::r#trait::{AccountStore, PostFilter, PostPage, PostQuery, PostRepository};
use crate::domain::connection::transition;
use crate::domain::{
    Account, AccountSummary, AuthorSummary, Comment, ConnectionError, ConnectionOp, PairState,
    Post, PostWithAuthor, Relation,
};
use crate::error::StoreResult;
use crate::services::engagement::recompute_score;

#[derive(Default)]
pub struct InMemoryStore {
    accounts: RwLock<HashMap<Uuid, Account>>,
    posts: RwLock<HashMap<Uuid, Post>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn read_pair(
    accounts: &HashMap<Uuid, Account>,
    actor: Uuid,
    other: Uuid,
) -> Result<PairState, ConnectionError> {
    let actor_account = accounts
        .get(&actor)
        .ok_or(ConnectionError::AccountNotFound(actor))?;
    let other_account = accounts
        .get(&other)
        .ok_or(ConnectionError::AccountNotFound(other))?;

    let forward = actor_account.relations.relation_to(other);
    let backward = other_account.relations.relation_to(actor);

    PairState::from_sides(forward, backward)
        .map_err(|mismatch| mirror_violation(actor, other, mismatch).into())
}

fn with_author(post: &Post, accounts: &HashMap<Uuid, Account>) -> PostWithAuthor {
    let user = accounts
        .get(&post.author_id)
        .map(Account::author_summary)
        .unwrap_or_else(|| AuthorSummary::unknown(post.author_id));

    PostWithAuthor {
        post: post.clone(),
        user,
    }
}

fn matches_filter(post: &Post, filter: &PostFilter) -> bool {
    match filter {
        PostFilter::All => true,
        PostFilter::PostType(kind) => post.post_type.as_deref() == Some(kind.as_str()),
        PostFilter::HasMedia => post.has_media(),
        PostFilter::MediaType(media_type) => post.has_media_type(*media_type),
        PostFilter::Hashtag(tag) => post.mentions_hashtag(tag),
    }
}

#[async_trait]
impl AccountStore for InMemoryStore {
    async fn get_account(&self, id: Uuid) -> StoreResult<Option<Account>> {
        Ok(self.accounts.read().await.get(&id).cloned())
    }

    async fn get_accounts(&self, ids: &[Uuid]) -> StoreResult<Vec<Account>> {
        let accounts = self.accounts.read().await;
        Ok(ids.iter().filter_map(|id| accounts.get(id).cloned()).collect())
    }

    /// Stores the account as given, relation sets included
    async fn upsert_account(&self, account: &Account) -> StoreResult<()> {
        self.accounts
            .write()
            .await
            .insert(account.id, account.clone());
        Ok(())
    }

    async fn connection_ids(&self, id: Uuid) -> StoreResult<HashSet<Uuid>> {
        Ok(self
            .accounts
            .read()
            .await
            .get(&id)
            .map(|a| a.relations.connections.clone())
            .unwrap_or_default())
    }

    async fn pair_state(&self, actor: Uuid, other: Uuid) -> Result<PairState, ConnectionError> {
        let accounts = self.accounts.read().await;
        read_pair(&accounts, actor, other)
    }

    async fn apply_transition(
        &self,
        actor: Uuid,
        other: Uuid,
        op: ConnectionOp,
    ) -> Result<PairState, ConnectionError> {
        let mut accounts = self.accounts.write().await;

        let current = read_pair(&accounts, actor, other)?;
        let next = transition(op, current)?;
        let (forward, backward) = next.sides();

        // Both accounts exist: read_pair checked them under this guard
        if let Some(account) = accounts.get_mut(&actor) {
            account.relations.set(other, forward);
        }
        if let Some(account) = accounts.get_mut(&other) {
            account.relations.set(actor, backward);
        }

        Ok(next)
    }

    async fn list_related(&self, id: Uuid, relation: Relation) -> StoreResult<Vec<AccountSummary>> {
        let accounts = self.accounts.read().await;
        let Some(account) = accounts.get(&id) else {
            return Ok(Vec::new());
        };

        let mut related: Vec<AccountSummary> = account
            .relations
            .ids(relation)
            .iter()
            .filter_map(|other| accounts.get(other).map(Account::summary))
            .collect();
        related.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));

        Ok(related)
    }

    async fn discover(&self, viewer: Uuid, limit: usize) -> StoreResult<Vec<Account>> {
        let accounts = self.accounts.read().await;
        let mut others: Vec<&Account> = accounts.values().filter(|a| a.id != viewer).collect();
        others.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));

        Ok(others.into_iter().take(limit).cloned().collect())
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}

impl InMemoryStore {
    /// Run `mutate` on one post under the posts write guard, then recompute
    /// its persisted score
    async fn mutate_post<F>(
        &self,
        post_id: Uuid,
        now: DateTime<Utc>,
        mutate: F,
    ) -> StoreResult<Option<Post>>
    where
        F: FnOnce(&mut Post) + Send,
    {
        let mut posts = self.posts.write().await;
        let Some(post) = posts.get_mut(&post_id) else {
            return Ok(None);
        };

        mutate(post);
        post.updated_at = now;
        recompute_score(post, now);

        Ok(Some(post.clone()))
    }
}

#[async_trait]
impl PostRepository for InMemoryStore {
    async fn insert_post(&self, post: &Post) -> StoreResult<()> {
        self.posts.write().await.insert(post.id, post.clone());
        Ok(())
    }

    async fn update_content(
        &self,
        post_id: Uuid,
        content: &str,
        tags: &[String],
        now: DateTime<Utc>,
    ) -> StoreResult<Option<Post>> {
        let mut posts = self.posts.write().await;
        let Some(post) = posts.get_mut(&post_id) else {
            return Ok(None);
        };

        post.content = content.to_string();
        post.tags = tags.to_vec();
        post.updated_at = now;

        Ok(Some(post.clone()))
    }

    async fn get_post(&self, post_id: Uuid) -> StoreResult<Option<PostWithAuthor>> {
        let accounts = self.accounts.read().await;
        let posts = self.posts.read().await;

        Ok(posts.get(&post_id).map(|post| with_author(post, &accounts)))
    }

    async fn query_posts(&self, query: &PostQuery) -> StoreResult<PostPage> {
        let accounts = self.accounts.read().await;
        let posts = self.posts.read().await;

        let mut visible: Vec<PostWithAuthor> = posts
            .values()
            .filter(|post| query.since.map_or(true, |since| post.created_at >= since))
            .filter(|post| matches_filter(post, &query.filter))
            .map(|post| with_author(post, &accounts))
            .filter(|item| query.scope.can_view_post(item))
            .collect();

        visible.sort_by(|a, b| {
            b.post
                .created_at
                .cmp(&a.post.created_at)
                .then(b.post.id.cmp(&a.post.id))
        });

        let total = visible.len() as u64;
        let posts = visible
            .into_iter()
            .skip(query.offset)
            .take(query.limit)
            .collect();

        Ok(PostPage { posts, total })
    }

    async fn toggle_like(
        &self,
        post_id: Uuid,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<Post>> {
        self.mutate_post(post_id, now, |post| {
            if !post.likes.remove(&user_id) {
                post.likes.insert(user_id);
            }
        })
        .await
    }

    async fn toggle_save(
        &self,
        post_id: Uuid,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<Post>> {
        self.mutate_post(post_id, now, |post| {
            if !post.saves.remove(&user_id) {
                post.saves.insert(user_id);
            }
        })
        .await
    }

    async fn add_comment(
        &self,
        post_id: Uuid,
        comment: &Comment,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<Post>> {
        let comment = comment.clone();
        self.mutate_post(post_id, now, move |post| post.comments.push(comment))
            .await
    }

    async fn increment_shares(&self, post_id: Uuid, now: DateTime<Utc>) -> StoreResult<Option<Post>> {
        self.mutate_post(post_id, now, |post| post.shares += 1).await
    }

    async fn increment_views(&self, post_id: Uuid, now: DateTime<Utc>) -> StoreResult<Option<Post>> {
        self.mutate_post(post_id, now, |post| post.views += 1).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Visibility;
    use crate::error::StoreError;
    use crate::services::visibility::ViewerScope;

    async fn store_with(accounts: &[&Account]) -> InMemoryStore {
        let store = InMemoryStore::new();
        for account in accounts {
            store.upsert_account(account).await.unwrap();
        }
        store
    }

    #[tokio::test]
    async fn test_transition_updates_both_sides() {
        let a = Account::new("Ana", "ana@campus.edu", Visibility::Public);
        let b = Account::new("Ben", "ben@campus.edu", Visibility::Public);
        let store = store_with(&[&a, &b]).await;

        let state = store
            .apply_transition(a.id, b.id, ConnectionOp::Send)
            .await
            .unwrap();
        assert_eq!(state, PairState::Sent);

        let a_now = store.get_account(a.id).await.unwrap().unwrap();
        let b_now = store.get_account(b.id).await.unwrap().unwrap();
        assert!(a_now.relations.sent_requests.contains(&b.id));
        assert!(b_now.relations.received_requests.contains(&a.id));
    }

    #[tokio::test]
    async fn test_refused_transition_leaves_pair_untouched() {
        let a = Account::new("Ana", "ana@campus.edu", Visibility::Public);
        let b = Account::new("Ben", "ben@campus.edu", Visibility::Public);
        let store = store_with(&[&a, &b]).await;

        let result = store.apply_transition(b.id, a.id, ConnectionOp::Accept).await;
        assert!(matches!(result, Err(ConnectionError::NoSuchRequest)));
        assert_eq!(store.pair_state(a.id, b.id).await.unwrap(), PairState::None);
    }

    #[tokio::test]
    async fn test_half_written_pair_is_reported() {
        let mut a = Account::new("Ana", "ana@campus.edu", Visibility::Public);
        let b = Account::new("Ben", "ben@campus.edu", Visibility::Public);
        a.relations.set(b.id, Some(Relation::Sent));
        let store = store_with(&[&a, &b]).await;

        let result = store.apply_transition(a.id, b.id, ConnectionOp::Cancel).await;
        assert!(matches!(
            result,
            Err(ConnectionError::Store(StoreError::Integrity(_)))
        ));

        // Not repaired
        let a_now = store.get_account(a.id).await.unwrap().unwrap();
        assert!(a_now.relations.sent_requests.contains(&b.id));
    }

    #[tokio::test]
    async fn test_missing_account() {
        let a = Account::new("Ana", "ana@campus.edu", Visibility::Public);
        let store = store_with(&[&a]).await;
        let ghost = Uuid::new_v4();

        let result = store.apply_transition(a.id, ghost, ConnectionOp::Send).await;
        assert!(matches!(result, Err(ConnectionError::AccountNotFound(id)) if id == ghost));
    }

    #[tokio::test]
    async fn test_toggle_like_twice_restores_membership() {
        let store = InMemoryStore::new();
        let user = Uuid::new_v4();
        let post = Post::new(
            Uuid::new_v4(),
            "hi".to_string(),
            None,
            Vec::new(),
            Vec::new(),
            Utc::now(),
        );
        store.insert_post(&post).await.unwrap();

        let liked = store.toggle_like(post.id, user, Utc::now()).await.unwrap().unwrap();
        assert!(liked.likes.contains(&user));

        let unliked = store.toggle_like(post.id, user, Utc::now()).await.unwrap().unwrap();
        assert!(unliked.likes.is_empty());
    }

    #[tokio::test]
    async fn test_query_orders_newest_first_and_counts_total() {
        let author = Account::new("Ana", "ana@campus.edu", Visibility::Public);
        let store = store_with(&[&author]).await;
        let base = Utc::now();

        for i in 0..5 {
            let post = Post::new(
                author.id,
                format!("post {}", i),
                None,
                Vec::new(),
                Vec::new(),
                base - chrono::Duration::minutes(i),
            );
            store.insert_post(&post).await.unwrap();
        }

        let mut query = PostQuery::new(ViewerScope::new(Uuid::new_v4(), []), PostFilter::All, 2);
        query.offset = 2;
        let page = store.query_posts(&query).await.unwrap();

        assert_eq!(page.total, 5);
        let contents: Vec<&str> = page.posts.iter().map(|p| p.post.content.as_str()).collect();
        assert_eq!(contents, vec!["post 2", "post 3"]);
    }
}
