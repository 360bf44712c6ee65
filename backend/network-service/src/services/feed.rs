//! Feed Composer
//!
//! Every retrieval mode resolves the viewer's scope once, lets the store apply
//! the visibility predicate, and never fails: store errors are logged and the
//! caller receives an empty result.

use chrono::{DateTime, Duration, Months, Utc};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, error};
use uuid::Uuid;

use crate::config::FeedConfig;
use crate::domain::{MediaType, PostWithAuthor, TrendingPost};
use crate::error::StoreResult;
use crate::metrics::{FEED_CANDIDATE_COUNT, FEED_REQUESTS_TOTAL};
use crate::repository::{AccountStore, PostFilter, PostPage, PostQuery, PostRepository};
use crate::services::engagement::trending_score;
use crate::services::hashtags::extract_hashtags;
use crate::services::visibility::VisibilityEvaluator;

const HASHTAG_WINDOW_DAYS: i64 = 7;
const HASHTAG_CANDIDATES: usize = 100;
const TRENDING_HASHTAGS: usize = 10;
const PEOPLE_LIMIT: usize = 20;
const MAX_PAGE: i64 = 1_000_000;

/// Lookback window for the trending feed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Timeframe {
    Day,
    #[default]
    Week,
    Month,
}

impl Timeframe {
    /// Unknown or missing values mean a week
    pub fn parse(raw: Option<&str>) -> Self {
        match raw {
            Some("day") => Timeframe::Day,
            Some("month") => Timeframe::Month,
            _ => Timeframe::Week,
        }
    }

    pub fn window_start(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        match self {
            Timeframe::Day => now - Duration::days(1),
            Timeframe::Week => now - Duration::days(7),
            Timeframe::Month => now
                .checked_sub_months(Months::new(1))
                .unwrap_or_else(|| now - Duration::days(30)),
        }
    }
}

/// Category path segment mapped to a candidate restriction
pub fn category_filter(category: &str) -> PostFilter {
    match category {
        "events" => PostFilter::PostType("event".to_string()),
        "polls" => PostFilter::PostType("poll".to_string()),
        "media" => PostFilter::HasMedia,
        other => PostFilter::PostType(other.to_string()),
    }
}

/// Media path segment; anything but image/video means "has any media"
pub fn media_filter(media_type: &str) -> PostFilter {
    match MediaType::parse(media_type) {
        Some(media_type) => PostFilter::MediaType(media_type),
        None => PostFilter::HasMedia,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LatestPage {
    pub posts: Vec<PostWithAuthor>,
    pub current_page: usize,
    pub total_pages: u64,
    pub total_posts: u64,
}

impl LatestPage {
    pub fn empty() -> Self {
        Self {
            posts: Vec::new(),
            current_page: 1,
            total_pages: 0,
            total_posts: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HashtagCount {
    pub tag: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonSuggestion {
    pub id: Uuid,
    pub name: String,
    pub profile_photo: Option<String>,
    pub role: String,
    pub department: Option<String>,
    pub mutual_connections: usize,
    pub is_connected: bool,
}

#[derive(Clone)]
pub struct FeedService {
    posts: Arc<dyn PostRepository>,
    accounts: Arc<dyn AccountStore>,
    visibility: VisibilityEvaluator,
    config: FeedConfig,
}

impl FeedService {
    pub fn new(
        posts: Arc<dyn PostRepository>,
        accounts: Arc<dyn AccountStore>,
        config: FeedConfig,
    ) -> Self {
        let visibility = VisibilityEvaluator::new(accounts.clone());
        Self {
            posts,
            accounts,
            visibility,
            config,
        }
    }

    async fn fetch(
        &self,
        viewer: Uuid,
        filter: PostFilter,
        since: Option<DateTime<Utc>>,
        limit: usize,
        offset: usize,
    ) -> StoreResult<PostPage> {
        let scope = self.visibility.scope_for(viewer).await?;
        let mut query = PostQuery::new(scope, filter, limit);
        query.since = since;
        query.offset = offset;
        self.posts.query_posts(&query).await
    }

    /// Record the outcome and fall back to `fallback` on error
    fn settle<T>(mode: &'static str, viewer: Uuid, result: StoreResult<T>, fallback: T) -> T {
        match result {
            Ok(value) => {
                FEED_REQUESTS_TOTAL.with_label_values(&[mode, "ok"]).inc();
                value
            }
            Err(e) => {
                FEED_REQUESTS_TOTAL.with_label_values(&[mode, "degraded"]).inc();
                error!(mode, viewer = %viewer, error = %e, "Feed request degraded to empty result");
                fallback
            }
        }
    }

    async fn capped(&self, mode: &'static str, viewer: Uuid, filter: PostFilter) -> Vec<PostWithAuthor> {
        let result = self
            .fetch(viewer, filter, None, self.config.category_limit, 0)
            .await
            .map(|page| {
                FEED_CANDIDATE_COUNT
                    .with_label_values(&[mode])
                    .observe(page.posts.len() as f64);
                page.posts
            });
        Self::settle(mode, viewer, result, Vec::new())
    }

    /// Newest first, paginated. `page` is clamped to `[1, MAX_PAGE]` and
    /// `limit` to the configured page size range.
    pub async fn latest(&self, viewer: Uuid, page: Option<i64>, limit: Option<i64>) -> LatestPage {
        let page = page.unwrap_or(1).clamp(1, MAX_PAGE) as usize;
        let limit = limit
            .unwrap_or(self.config.default_page_size as i64)
            .clamp(1, self.config.max_page_size.max(1) as i64) as usize;
        let offset = (page - 1).saturating_mul(limit);

        let result = self
            .fetch(viewer, PostFilter::All, None, limit, offset)
            .await
            .map(|result| LatestPage {
                total_pages: result.total.div_ceil(limit as u64),
                total_posts: result.total,
                current_page: page,
                posts: result.posts,
            });

        Self::settle("latest", viewer, result, LatestPage::empty())
    }

    /// Highest presentation score inside the window; equal scores keep the
    /// store's newest-first order
    pub async fn trending(&self, viewer: Uuid, timeframe: Timeframe, now: DateTime<Utc>) -> Vec<TrendingPost> {
        let since = timeframe.window_start(now);
        let result = self
            .fetch(
                viewer,
                PostFilter::All,
                Some(since),
                self.config.trending_candidates,
                0,
            )
            .await
            .map(|page| {
                FEED_CANDIDATE_COUNT
                    .with_label_values(&["trending"])
                    .observe(page.posts.len() as f64);

                let mut scored: Vec<TrendingPost> = page
                    .posts
                    .into_iter()
                    .map(|item| {
                        let likes_count = item.post.likes.len();
                        let comments_count = item.post.comments.len();
                        TrendingPost {
                            item,
                            likes_count,
                            comments_count,
                            trending_score: trending_score(likes_count, comments_count),
                        }
                    })
                    .collect();

                // sort_by is stable
                scored.sort_by(|a, b| b.trending_score.cmp(&a.trending_score));
                scored.truncate(self.config.trending_limit);
                scored
            });

        debug!(viewer = %viewer, timeframe = ?timeframe, "Trending feed composed");
        Self::settle("trending", viewer, result, Vec::new())
    }

    pub async fn by_category(&self, viewer: Uuid, category: &str) -> Vec<PostWithAuthor> {
        self.capped("category", viewer, category_filter(category)).await
    }

    pub async fn by_hashtag(&self, viewer: Uuid, tag: &str) -> Vec<PostWithAuthor> {
        let tag = tag.trim_start_matches('#');
        if tag.is_empty() {
            return Vec::new();
        }
        self.capped("hashtag", viewer, PostFilter::Hashtag(tag.to_string()))
            .await
    }

    pub async fn by_media_type(&self, viewer: Uuid, media_type: &str) -> Vec<PostWithAuthor> {
        self.capped("media", viewer, media_filter(media_type)).await
    }

    /// Tags of recent visible posts, each post counting once per tag
    pub async fn trending_hashtags(&self, viewer: Uuid, now: DateTime<Utc>) -> Vec<HashtagCount> {
        let since = now - Duration::days(HASHTAG_WINDOW_DAYS);
        let result = self
            .fetch(viewer, PostFilter::All, Some(since), HASHTAG_CANDIDATES, 0)
            .await
            .map(|page| {
                let mut counts: HashMap<String, usize> = HashMap::new();
                for item in &page.posts {
                    for tag in extract_hashtags(&item.post.content) {
                        *counts.entry(tag).or_default() += 1;
                    }
                }

                let mut ranked: Vec<HashtagCount> = counts
                    .into_iter()
                    .map(|(tag, count)| HashtagCount { tag, count })
                    .collect();
                ranked.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.tag.cmp(&b.tag)));
                ranked.truncate(TRENDING_HASHTAGS);
                ranked
            });

        Self::settle("hashtags", viewer, result, Vec::new())
    }

    /// Other accounts ranked by connections shared with the viewer
    pub async fn discover_people(&self, viewer: Uuid) -> Vec<PersonSuggestion> {
        let result = self.suggestions(viewer).await;
        Self::settle("people", viewer, result, Vec::new())
    }

    async fn suggestions(&self, viewer: Uuid) -> StoreResult<Vec<PersonSuggestion>> {
        let mine: HashSet<Uuid> = self.accounts.connection_ids(viewer).await?;
        let candidates = self.accounts.discover(viewer, PEOPLE_LIMIT).await?;

        let mut people: Vec<PersonSuggestion> = candidates
            .into_iter()
            .map(|account| {
                let author = account.author_summary();
                PersonSuggestion {
                    mutual_connections: account
                        .relations
                        .connections
                        .intersection(&mine)
                        .count(),
                    is_connected: mine.contains(&account.id),
                    id: account.id,
                    name: account.name,
                    profile_photo: account.profile_photo,
                    role: author.role,
                    department: author.department,
                }
            })
            .collect();

        people.sort_by(|a, b| b.mutual_connections.cmp(&a.mutual_connections));
        Ok(people)
    }
}
