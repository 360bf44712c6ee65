/// Business logic for network-service
///
/// - `connections`: friend-request state machine over the account store
/// - `visibility`: who may see whose posts
/// - `feed`: latest, trending, category, hashtag and media feeds plus discovery
/// - `engagement`: likes, comments, saves, shares, views and the stored score
/// - `posts`: create, edit and read single posts
pub mod connections;
pub mod engagement;
pub mod feed;
pub mod hashtags;
pub mod posts;
pub mod visibility;

pub use connections::ConnectionService;
pub use engagement::EngagementService;
pub use feed::{FeedService, HashtagCount, LatestPage, PersonSuggestion, Timeframe};
pub use hashtags::extract_hashtags;
pub use posts::{CreatePostRequest, MediaInput, PostService, UpdatePostRequest};
pub use visibility::{VisibilityEvaluator, ViewerScope};
