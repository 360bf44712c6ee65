use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

use super::account::AuthorSummary;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Image,
    Video,
}

impl MediaType {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "image" => Some(MediaType::Image),
            "video" => Some(MediaType::Video),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaItem {
    #[serde(rename = "type")]
    pub media_type: MediaType,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
}

/// Comment with the commenter's name as it was when the comment was written
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: Uuid,
    #[serde(rename = "user")]
    pub author_id: Uuid,
    #[serde(rename = "userName")]
    pub author_name: String,
    pub content: String,
    #[serde(rename = "timestamp")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: Uuid,
    pub author_id: Uuid,
    pub content: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub post_type: Option<String>,
    pub media: Vec<MediaItem>,
    pub tags: Vec<String>,
    pub likes: BTreeSet<Uuid>,
    pub saves: BTreeSet<Uuid>,
    pub shares: i64,
    pub views: i64,
    pub comments: Vec<Comment>,
    /// Persisted ranking signal, recomputed on every engagement change
    pub engagement_score: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Post {
    pub fn new(
        author_id: Uuid,
        content: String,
        post_type: Option<String>,
        media: Vec<MediaItem>,
        tags: Vec<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            author_id,
            content,
            post_type,
            media,
            tags,
            likes: BTreeSet::new(),
            saves: BTreeSet::new(),
            shares: 0,
            views: 0,
            comments: Vec::new(),
            engagement_score: 0.0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn has_media(&self) -> bool {
        !self.media.is_empty()
    }

    pub fn has_media_type(&self, media_type: MediaType) -> bool {
        self.media.iter().any(|m| m.media_type == media_type)
    }

    /// Case-insensitive `#tag` occurrence anywhere in the content
    pub fn mentions_hashtag(&self, tag: &str) -> bool {
        let needle = format!("#{}", tag.to_lowercase());
        self.content.to_lowercase().contains(&needle)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostWithAuthor {
    #[serde(flatten)]
    pub post: Post,
    pub user: AuthorSummary,
}

/// Trending entry carrying the presentation-time score
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendingPost {
    #[serde(flatten)]
    pub item: PostWithAuthor,
    pub likes_count: usize,
    pub comments_count: usize,
    pub trending_score: i64,
}
