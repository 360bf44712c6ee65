use std::sync::Arc;

use crate::config::FeedConfig;
use crate::repository::{AccountStore, PostRepository};
use crate::services::{ConnectionService, EngagementService, FeedService, PostService};

/// Services shared by every worker, registered once as `web::Data<AppState>`
#[derive(Clone)]
pub struct AppState {
    pub accounts: Arc<dyn AccountStore>,
    pub connections: ConnectionService,
    pub feed: FeedService,
    pub posts: PostService,
    pub engagement: EngagementService,
}

impl AppState {
    pub fn new(
        accounts: Arc<dyn AccountStore>,
        posts: Arc<dyn PostRepository>,
        feed_config: FeedConfig,
    ) -> Self {
        Self {
            connections: ConnectionService::new(accounts.clone()),
            feed: FeedService::new(posts.clone(), accounts.clone(), feed_config),
            posts: PostService::new(posts.clone(), accounts.clone()),
            engagement: EngagementService::new(posts, accounts.clone()),
            accounts,
        }
    }
}
