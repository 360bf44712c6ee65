//! Network Service
//!
//! Campus social network backend: connection requests between accounts,
//! privacy-aware feeds and post engagement.
//!
//! # Modules
//!
//! - `domain`: accounts, the connection state machine, posts
//! - `repository`: account store and post repository (PostgreSQL, in-memory)
//! - `services`: connections, visibility, feed, engagement, posts
//! - `handlers` / `routes`: HTTP surface under `/api/v1`

pub mod config;
pub mod db;
pub mod domain;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod repository;
pub mod routes;
pub mod services;
pub mod state;

pub use config::Config;
pub use error::{AppError, Result};
pub use state::AppState;
