//! # Actix Middleware Library
//!
//! Shared middleware components for the campus network services
//!
//! ## Modules
//! - `jwt_auth`: bearer token authentication resolving the viewer identity
//! - `correlation_id`: request correlation ids for log stitching
//! - `metrics`: Prometheus HTTP request metrics

pub mod correlation_id;
pub mod jwt_auth;
pub mod metrics;

pub use correlation_id::{CorrelationId, CorrelationIdMiddleware};
pub use jwt_auth::{Claims, JwtAuthMiddleware, TokenError, TokenVerifier, UserId};
pub use metrics::MetricsMiddleware;
