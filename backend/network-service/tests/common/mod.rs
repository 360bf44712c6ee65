//! Shared fixtures for HTTP integration tests
//!
//! Every test runs the real route table against a fresh in-memory store.

#![allow(dead_code)]

use actix_middleware::{Claims, TokenVerifier};
use actix_web::web;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use std::sync::Arc;
use uuid::Uuid;

use network_service::config::FeedConfig;
use network_service::domain::{Account, Visibility};
use network_service::repository::{AccountStore, InMemoryStore};
use network_service::AppState;

pub const SECRET: &str = "integration-test-secret";

pub struct TestContext {
    pub store: Arc<InMemoryStore>,
    pub state: web::Data<AppState>,
    pub verifier: Arc<TokenVerifier>,
}

impl TestContext {
    pub fn new() -> Self {
        let store = Arc::new(InMemoryStore::new());
        let state = web::Data::new(AppState::new(
            store.clone(),
            store.clone(),
            FeedConfig::default(),
        ));
        Self {
            store,
            state,
            verifier: Arc::new(TokenVerifier::from_secret(SECRET)),
        }
    }

    pub async fn account(&self, name: &str, visibility: Visibility) -> Account {
        let email = format!("{}@campus.edu", name.to_lowercase());
        let account = Account::new(name, email, visibility);
        self.store
            .upsert_account(&account)
            .await
            .expect("seed account");
        account
    }
}

pub fn token_for(id: Uuid) -> String {
    let claims = Claims {
        sub: Some(id.to_string()),
        id: None,
        user_id: None,
        exp: chrono::Utc::now().timestamp() + 3600,
    };
    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .expect("encode token")
}

pub fn bearer(id: Uuid) -> (&'static str, String) {
    ("Authorization", format!("Bearer {}", token_for(id)))
}

/// Build the service under test from a [`TestContext`]
macro_rules! test_app {
    ($ctx:expr) => {{
        let verifier = $ctx.verifier.clone();
        actix_web::test::init_service(
            actix_web::App::new()
                .app_data($ctx.state.clone())
                .configure(move |cfg| network_service::routes::configure(cfg, verifier)),
        )
        .await
    }};
}
