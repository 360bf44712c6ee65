/// HTTP handlers for network-service
///
/// Handlers only extract the viewer and inputs, call one service method, and
/// shape the response. Feed and connection-list handlers never fail: their
/// services degrade to empty results.
pub mod connections;
pub mod feed;
pub mod health;
pub mod posts;

pub use health::{health_summary, liveness_check};
