//! Visibility Evaluator
//!
//! One rule decides whether a viewer may see a post:
//!
//! ```text
//! author is public  OR  author is the viewer  OR  author is a connection of the viewer
//! ```
//!
//! [`ViewerScope`] holds the viewer's connection set, fetched once per request.
//! The same scope answers single-post checks in Rust and renders the bulk
//! query predicate for Postgres, so both paths read the rule from one place.

use sqlx::{Postgres, QueryBuilder};
use std::collections::HashSet;
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::{PostWithAuthor, Visibility};
use crate::error::StoreResult;
use crate::repository::AccountStore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewerScope {
    pub viewer_id: Uuid,
    pub connections: HashSet<Uuid>,
}

impl ViewerScope {
    pub fn new(viewer_id: Uuid, connections: impl IntoIterator<Item = Uuid>) -> Self {
        Self {
            viewer_id,
            connections: connections.into_iter().collect(),
        }
    }

    pub fn can_view(&self, author_id: Uuid, author_visibility: Visibility) -> bool {
        author_visibility == Visibility::Public
            || author_id == self.viewer_id
            || self.connections.contains(&author_id)
    }

    /// Posts whose author record is gone carry a private sentinel author
    pub fn can_view_post(&self, item: &PostWithAuthor) -> bool {
        self.can_view(item.post.author_id, item.user.visibility())
    }

    /// Append the visibility rule as a SQL boolean expression.
    ///
    /// Expects posts aliased `p` left-joined to accounts aliased `a`.
    pub fn push_predicate(&self, qb: &mut QueryBuilder<'_, Postgres>) {
        let connections: Vec<Uuid> = self.connections.iter().copied().collect();

        qb.push("(COALESCE(a.visibility, 'private') = 'public' OR p.author_id = ");
        qb.push_bind(self.viewer_id);
        qb.push(" OR p.author_id = ANY(");
        qb.push_bind(connections);
        qb.push("))");
    }
}

/// Resolves viewer scopes against the account store
#[derive(Clone)]
pub struct VisibilityEvaluator {
    accounts: Arc<dyn AccountStore>,
}

impl VisibilityEvaluator {
    pub fn new(accounts: Arc<dyn AccountStore>) -> Self {
        Self { accounts }
    }

    pub async fn scope_for(&self, viewer_id: Uuid) -> StoreResult<ViewerScope> {
        let connections = self.accounts.connection_ids(viewer_id).await?;
        Ok(ViewerScope::new(viewer_id, connections))
    }

    pub async fn can_view(&self, viewer_id: Uuid, item: &PostWithAuthor) -> StoreResult<bool> {
        // The viewer's own posts never need the connection lookup
        if item.post.author_id == viewer_id {
            return Ok(true);
        }
        let scope = self.scope_for(viewer_id).await?;
        Ok(scope.can_view_post(item))
    }
}
