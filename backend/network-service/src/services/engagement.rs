//! Engagement Aggregator
//!
//! Likes, saves, comments, shares and views on a single post. Each mutation is
//! one atomic store operation that also recomputes the persisted score.
//!
//! Two scores exist and are kept apart:
//! - the persisted `engagementScore` ([`persisted_score`]), stored on the post
//!   and refreshed on every engagement change;
//! - the presentation-time `trendingScore` ([`trending_score`]), computed only
//!   while ranking the trending feed.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::domain::{Comment, Post, PostWithAuthor};
use crate::error::{AppError, Result};
use crate::metrics::ENGAGEMENT_MUTATIONS_TOTAL;
use crate::repository::{AccountStore, PostRepository};
use crate::services::visibility::VisibilityEvaluator;

pub const MAX_COMMENT_LENGTH: usize = 500;

/// `likes*2 + comments + saves + shares*3 - hoursSincePost*0.1`
pub fn persisted_score(
    likes: usize,
    comments: usize,
    saves: usize,
    shares: i64,
    hours_since_post: f64,
) -> f64 {
    likes as f64 * 2.0 + comments as f64 + saves as f64 + shares as f64 * 3.0
        - hours_since_post * 0.1
}

/// `likes*1 + comments*2`
pub fn trending_score(likes: usize, comments: usize) -> i64 {
    likes as i64 + comments as i64 * 2
}

pub fn recompute_score(post: &mut Post, now: DateTime<Utc>) {
    let hours = (now - post.created_at).num_milliseconds() as f64 / 3_600_000.0;
    post.engagement_score = persisted_score(
        post.likes.len(),
        post.comments.len(),
        post.saves.len(),
        post.shares,
        hours,
    );
}

#[derive(Clone)]
pub struct EngagementService {
    posts: Arc<dyn PostRepository>,
    accounts: Arc<dyn AccountStore>,
    visibility: VisibilityEvaluator,
}

impl EngagementService {
    pub fn new(posts: Arc<dyn PostRepository>, accounts: Arc<dyn AccountStore>) -> Self {
        let visibility = VisibilityEvaluator::new(accounts.clone());
        Self {
            posts,
            accounts,
            visibility,
        }
    }

    /// Posts the viewer cannot see answer as missing
    async fn visible_post(&self, viewer: Uuid, post_id: Uuid) -> Result<PostWithAuthor> {
        let item = self
            .posts
            .get_post(post_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Post not found".to_string()))?;

        if !self.visibility.can_view(viewer, &item).await? {
            debug!(viewer = %viewer, post_id = %post_id, "Engagement on invisible post refused");
            return Err(AppError::NotFound("Post not found".to_string()));
        }
        Ok(item)
    }

    fn finish(kind: &'static str, author: PostWithAuthor, updated: Option<Post>) -> Result<PostWithAuthor> {
        let post = updated.ok_or_else(|| AppError::NotFound("Post not found".to_string()))?;
        ENGAGEMENT_MUTATIONS_TOTAL.with_label_values(&[kind]).inc();
        Ok(PostWithAuthor {
            post,
            user: author.user,
        })
    }

    pub async fn toggle_like(&self, viewer: Uuid, post_id: Uuid) -> Result<PostWithAuthor> {
        let item = self.visible_post(viewer, post_id).await?;
        let updated = self.posts.toggle_like(post_id, viewer, Utc::now()).await?;

        let result = Self::finish("like", item, updated)?;
        info!(
            viewer = %viewer,
            post_id = %post_id,
            liked = result.post.likes.contains(&viewer),
            "Like toggled"
        );
        Ok(result)
    }

    pub async fn toggle_save(&self, viewer: Uuid, post_id: Uuid) -> Result<PostWithAuthor> {
        let item = self.visible_post(viewer, post_id).await?;
        let updated = self.posts.toggle_save(post_id, viewer, Utc::now()).await?;
        Self::finish("save", item, updated)
    }

    pub async fn add_comment(&self, viewer: Uuid, post_id: Uuid, text: &str) -> Result<PostWithAuthor> {
        let content = text.trim();
        if content.is_empty() {
            return Err(AppError::Validation("Comment content is required".to_string()));
        }
        if content.chars().count() > MAX_COMMENT_LENGTH {
            return Err(AppError::Validation(format!(
                "Comment cannot exceed {} characters",
                MAX_COMMENT_LENGTH
            )));
        }

        let commenter = self
            .accounts
            .get_account(viewer)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;
        let item = self.visible_post(viewer, post_id).await?;

        let now = Utc::now();
        let comment = Comment {
            id: Uuid::new_v4(),
            author_id: viewer,
            author_name: commenter.name,
            content: content.to_string(),
            created_at: now,
        };

        let updated = self.posts.add_comment(post_id, &comment, now).await?;
        let result = Self::finish("comment", item, updated)?;
        info!(viewer = %viewer, post_id = %post_id, comment_id = %comment.id, "Comment added");
        Ok(result)
    }

    pub async fn record_share(&self, viewer: Uuid, post_id: Uuid) -> Result<PostWithAuthor> {
        let item = self.visible_post(viewer, post_id).await?;
        let updated = self.posts.increment_shares(post_id, Utc::now()).await?;
        Self::finish("share", item, updated)
    }

    pub async fn record_view(&self, viewer: Uuid, post_id: Uuid) -> Result<PostWithAuthor> {
        let item = self.visible_post(viewer, post_id).await?;
        let updated = self.posts.increment_views(post_id, Utc::now()).await?;
        Self::finish("view", item, updated)
    }
}
