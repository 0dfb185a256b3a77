#![allow(dead_code)]

use std::num::NonZeroU32;
use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use serde_json::Value;
use storefront::{
    ServerConfig,
    auth::Principal,
    create_app,
    db::{Database, NewUser},
    jwt::{ManualClock, TokenAuthority, TokenSettings},
    password::hash_password,
    permissions::{Permission, PermissionSet},
};
use tower::ServiceExt;

pub const SECRET: &[u8] = b"integration-test-secret-0123456789";

/// Password used for every user created through `TestApp::create_user`.
pub const PASSWORD: &str = "Sup3r$ecret";

/// Lowest cost bcrypt accepts, keeps tests fast.
pub const BCRYPT_COST: u32 = 4;

pub struct TestApp {
    pub app: Router,
    pub db: Database,
    pub authority: Arc<TokenAuthority>,
    pub clock: Arc<ManualClock>,
}

pub async fn setup() -> TestApp {
    setup_with_login_limit(1000).await
}

pub async fn setup_with_login_limit(per_minute: u32) -> TestApp {
    let db = Database::open(":memory:")
        .await
        .expect("Failed to open test database");

    let clock = Arc::new(ManualClock::starting_now());
    let authority = Arc::new(TokenAuthority::with_clock(
        &TokenSettings::new(SECRET),
        clock.clone(),
    ));

    let config = ServerConfig {
        db: db.clone(),
        authority: authority.clone(),
        password_cost: BCRYPT_COST,
        login_attempts_per_minute: NonZeroU32::new(per_minute).expect("limit must be non-zero"),
        trust_forwarded_for: false,
    };

    TestApp {
        app: create_app(&config),
        db,
        authority,
        clock,
    }
}

impl TestApp {
    /// Send a request and return the status with the JSON body (`Null` if not JSON).
    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
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

        self.send_request(request).await
    }

    pub async fn send_request(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = serde_json::from_slice(&body).unwrap_or(Value::Null);
        (status, json)
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.send(Method::GET, uri, token, None).await
    }

    pub async fn post(&self, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.send(Method::POST, uri, token, Some(body)).await
    }

    /// Insert a user directly, bypassing the signup endpoint.
    pub async fn create_user(&self, username: &str, permissions: &[Permission]) -> Principal {
        self.insert_user(username, false, permissions.iter().copied().collect())
            .await
    }

    pub async fn create_admin(&self, username: &str) -> Principal {
        self.insert_user(username, true, Permission::all()).await
    }

    async fn insert_user(
        &self,
        username: &str,
        is_admin: bool,
        permissions: PermissionSet,
    ) -> Principal {
        let email = format!("{}@example.com", username);
        let password_hash = hash_password(PASSWORD, BCRYPT_COST).await.unwrap();

        let id = self
            .db
            .users()
            .create(&NewUser {
                username,
                email: &email,
                password_hash: &password_hash,
                is_admin,
                permissions: permissions.clone(),
            })
            .await
            .expect("Failed to create user");

        Principal {
            id,
            username: username.to_string(),
            email,
            is_admin,
            permissions,
        }
    }

    pub fn access_token(&self, principal: &Principal) -> String {
        self.authority.issue_access(principal).unwrap()
    }

    pub fn refresh_token(&self, principal: &Principal) -> String {
        self.authority.issue_refresh(principal).unwrap()
    }
}
