//! services/api/tests/common/mod.rs
//!
//! Shared fixture for the HTTP integration tests: the real router wired to
//! the in-memory store, captured outgoing mail and real token signing.

#![allow(dead_code)]

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;
use tracing::Level;

use api_lib::adapters::{MemoryMailAdapter, MemoryStore, SignerAdapter};
use api_lib::config::{Config, MailBackend};
use api_lib::web::{api_router, AppState};
use critique_core::domain::{NewUser, Role};
use critique_core::ports::{DatabaseService, TokenService};
use critique_core::User;

pub struct TestApp {
    pub router: Router,
    pub db: MemoryStore,
    pub mail: MemoryMailAdapter,
    pub tokens: Arc<SignerAdapter>,
}

/// Builds the application exactly as the binary does, with the in-memory
/// adapters in place of PostgreSQL and SMTP.
pub fn test_app() -> TestApp {
    let config = Arc::new(Config {
        bind_address: "127.0.0.1:0".parse::<SocketAddr>().unwrap(),
        database_url: "postgres://unused".to_string(),
        log_level: Level::INFO,
        secret_key: "integration-test-secret".to_string(),
        admin_email: "admin@critique.example".to_string(),
        mail_backend: MailBackend::Console,
        smtp_host: None,
        smtp_port: 587,
        smtp_username: None,
        smtp_password: None,
        mail_timeout: Duration::from_secs(2),
        token_timeout: Duration::from_secs(2),
        access_token_ttl_hours: 24,
        confirmation_ttl_secs: 259_200,
    });
    let db = MemoryStore::new();
    let mail = MemoryMailAdapter::new();
    let tokens = Arc::new(SignerAdapter::new(
        &config.secret_key,
        config.access_token_ttl_hours,
        config.confirmation_ttl_secs,
    ));
    let state = Arc::new(AppState {
        db: Arc::new(db.clone()),
        mail: Arc::new(mail.clone()),
        tokens: tokens.clone(),
        config,
    });
    TestApp {
        router: api_router(state),
        db,
        mail,
        tokens,
    }
}

impl TestApp {
    /// Creates an account directly in the store.
    pub async fn seed_user(&self, username: &str, role: Role) -> User {
        self.db
            .create_user(&NewUser {
                username: username.to_string(),
                email: format!("{}@critique.example", username),
                first_name: String::new(),
                last_name: String::new(),
                bio: String::new(),
                role,
            })
            .await
            .unwrap()
    }

    /// Issues a bearer token for a seeded account.
    pub async fn token_for(&self, user: &User) -> String {
        self.tokens.issue_access_token(user).await.unwrap()
    }

    /// Seeds an account and returns it together with a token, the shape
    /// most tests want.
    pub async fn seed_with_token(&self, username: &str, role: Role) -> (User, String) {
        let user = self.seed_user(username, role).await;
        let token = self.token_for(&user).await;
        (user, token)
    }

    async fn request(
        &self,
        method: &str,
        path: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(path);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    pub async fn get(&self, path: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.request("GET", path, token, None).await
    }

    pub async fn post(&self, path: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.request("POST", path, token, Some(body)).await
    }

    pub async fn patch(&self, path: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.request("PATCH", path, token, Some(body)).await
    }

    pub async fn delete(&self, path: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.request("DELETE", path, token, None).await
    }
}
