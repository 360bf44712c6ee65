//! Post creation, editing and single/bulk reads.
//!
//! Single reads apply the same visibility rule as the feed: a post the viewer
//! may not see answers as missing.

use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::domain::{MediaItem, MediaType, Post, PostWithAuthor};
use crate::error::{AppError, Result};
use crate::repository::{AccountStore, PostFilter, PostQuery, PostRepository};
use crate::services::hashtags::extract_hashtags;
use crate::services::visibility::VisibilityEvaluator;

pub const MAX_CONTENT_LENGTH: usize = 2000;
pub const MAX_MEDIA_ITEMS: usize = 10;
const LIST_LIMIT: usize = 100;

fn content_error(code: &'static str, message: String) -> ValidationError {
    let mut err = ValidationError::new(code);
    err.message = Some(message.into());
    err
}

pub fn validate_content(content: &str) -> std::result::Result<(), ValidationError> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return Err(content_error("required", "Post content is required".to_string()));
    }
    if trimmed.chars().count() > MAX_CONTENT_LENGTH {
        return Err(content_error(
            "length",
            format!("Post cannot exceed {} characters", MAX_CONTENT_LENGTH),
        ));
    }
    Ok(())
}

#[derive(Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct MediaInput {
    #[serde(rename = "type")]
    pub media_type: MediaType,

    #[validate(length(min = 1, max = 2048))]
    pub url: String,

    #[serde(default)]
    #[validate(length(max = 2048))]
    pub thumbnail: Option<String>,

    #[serde(default)]
    #[validate(length(max = 200))]
    pub caption: Option<String>,
}

impl From<MediaInput> for MediaItem {
    fn from(input: MediaInput) -> Self {
        MediaItem {
            media_type: input.media_type,
            url: input.url,
            thumbnail: input.thumbnail,
            caption: input.caption.map(|c| c.trim().to_string()),
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct CreatePostRequest {
    #[validate(custom(function = "validate_content"))]
    pub content: String,

    /// `event`, `poll`, or a free-form category
    #[serde(default, rename = "type")]
    #[validate(length(min = 1, max = 32))]
    pub post_type: Option<String>,

    #[serde(default)]
    #[validate(nested)]
    pub media: Vec<MediaInput>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct UpdatePostRequest {
    #[validate(custom(function = "validate_content"))]
    pub content: String,
}

#[derive(Clone)]
pub struct PostService {
    posts: Arc<dyn PostRepository>,
    accounts: Arc<dyn AccountStore>,
    visibility: VisibilityEvaluator,
}

impl PostService {
    pub fn new(posts: Arc<dyn PostRepository>, accounts: Arc<dyn AccountStore>) -> Self {
        let visibility = VisibilityEvaluator::new(accounts.clone());
        Self {
            posts,
            accounts,
            visibility,
        }
    }

    pub async fn create(&self, author_id: Uuid, request: CreatePostRequest) -> Result<PostWithAuthor> {
        request.validate()?;
        if request.media.len() > MAX_MEDIA_ITEMS {
            return Err(AppError::Validation(format!(
                "A post can carry at most {} media items",
                MAX_MEDIA_ITEMS
            )));
        }

        let author = self
            .accounts
            .get_account(author_id)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

        let content = request.content.trim().to_string();
        let tags = extract_hashtags(&content);
        let post = Post::new(
            author_id,
            content,
            request.post_type.map(|t| t.trim().to_lowercase()),
            request.media.into_iter().map(MediaItem::from).collect(),
            tags,
            Utc::now(),
        );

        self.posts.insert_post(&post).await?;
        info!(author_id = %author_id, post_id = %post.id, tags = post.tags.len(), "Post created");

        Ok(PostWithAuthor {
            post,
            user: author.author_summary(),
        })
    }

    /// Author-only; the tag set is replaced from the new content
    pub async fn update_content(
        &self,
        viewer: Uuid,
        post_id: Uuid,
        request: UpdatePostRequest,
    ) -> Result<PostWithAuthor> {
        request.validate()?;

        let existing = self
            .posts
            .get_post(post_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Post not found".to_string()))?;
        if existing.post.author_id != viewer {
            return Err(AppError::Forbidden(
                "Only the author can edit this post".to_string(),
            ));
        }

        let content = request.content.trim().to_string();
        let tags = extract_hashtags(&content);
        let post = self
            .posts
            .update_content(post_id, &content, &tags, Utc::now())
            .await?
            .ok_or_else(|| AppError::NotFound("Post not found".to_string()))?;

        info!(post_id = %post_id, "Post content updated");
        Ok(PostWithAuthor {
            post,
            user: existing.user,
        })
    }

    pub async fn get_post(&self, viewer: Uuid, post_id: Uuid) -> Result<PostWithAuthor> {
        let item = self
            .posts
            .get_post(post_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Post not found".to_string()))?;

        if !self.visibility.can_view(viewer, &item).await? {
            return Err(AppError::NotFound("Post not found".to_string()));
        }
        Ok(item)
    }

    /// All posts visible to the viewer, newest first. Degrades to empty.
    pub async fn list_visible(&self, viewer: Uuid) -> Vec<PostWithAuthor> {
        let scope = match self.visibility.scope_for(viewer).await {
            Ok(scope) => scope,
            Err(e) => {
                error!(viewer = %viewer, error = %e, "Post list degraded to empty");
                return Vec::new();
            }
        };

        match self
            .posts
            .query_posts(&PostQuery::new(scope, PostFilter::All, LIST_LIMIT))
            .await
        {
            Ok(page) => page.posts,
            Err(e) => {
                error!(viewer = %viewer, error = %e, "Post list degraded to empty");
                Vec::new()
            }
        }
    }
}
