use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

use super::error::{ApiError, ResultExt};
use crate::auth::{CurrentUser, PermissionGate, Principal};
use crate::db::{Database, NewUser, is_unique_violation};
use crate::impl_has_auth_backend;
use crate::jwt::TokenType;
use crate::password::{hash_password, verify_password};
use crate::permissions::{Permission, PermissionSet};
use crate::rate_limit::{RateLimitConfig, rate_limit_login};

#[derive(Clone)]
pub struct UsersState {
    pub db: Database,
    pub gate: Arc<PermissionGate<Database>>,
    pub password_cost: u32,
    pub rate_limit_config: Arc<RateLimitConfig>,
}

impl_has_auth_backend!(UsersState);

pub fn router(state: UsersState) -> Router {
    let login_router = Router::new()
        .route("/users/login", post(login))
        .with_state(state.clone())
        .layer(middleware::from_fn_with_state(
            state.rate_limit_config.clone(),
            rate_limit_login,
        ));

    Router::new()
        .route("/users", get(list_users))
        .route("/users/", get(list_users))
        .route("/users/create", post(create_user))
        .route("/users/refresh", post(refresh))
        .route("/users/me", get(me))
        .route("/users/{id}", get(get_user))
        .with_state(state)
        .merge(login_router)
}

#[derive(Serialize)]
struct UserListResponse {
    total_users: usize,
    users: Vec<Principal>,
}

async fn list_users(State(state): State<UsersState>) -> Result<impl IntoResponse, ApiError> {
    let users: Vec<Principal> = state
        .db
        .users()
        .list()
        .await
        .db_err("Failed to list users")?
        .into_iter()
        .map(Principal::from)
        .collect();

    Ok(Json(UserListResponse {
        total_users: users.len(),
        users,
    }))
}

async fn get_user(
    State(state): State<UsersState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let user = state
        .db
        .users()
        .get_by_id(id)
        .await
        .db_err("Failed to get user")?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    Ok(Json(Principal::from(user)))
}

#[derive(Deserialize)]
struct CreateUserRequest {
    username: String,
    email: String,
    password: String,
    #[serde(default)]
    is_admin: bool,
    /// Permission names; omitted means "none", or "all" for admins
    permissions: Option<Vec<String>>,
}

async fn create_user(
    State(state): State<UsersState>,
    Json(payload): Json<CreateUserRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_username(&payload.username)?;
    validate_email(&payload.email)?;
    validate_password(&payload.password)?;

    let permissions = match payload.permissions {
        Some(names) => parse_permissions(&names)?,
        None if payload.is_admin => Permission::all(),
        None => PermissionSet::new(),
    };

    let available = state
        .db
        .users()
        .is_username_available(&payload.username)
        .await
        .db_err("Failed to check username availability")?;

    if !available {
        return Err(ApiError::bad_request("User already exists"));
    }

    let password_hash = hash_password(&payload.password, state.password_cost)
        .await
        .internal_err("User creation failed")?;

    let id = match state
        .db
        .users()
        .create(&NewUser {
            username: &payload.username,
            email: &payload.email,
            password_hash: &password_hash,
            is_admin: payload.is_admin,
            permissions: permissions.clone(),
        })
        .await
    {
        Ok(id) => id,
        // Lost a race with a concurrent signup for the same name
        Err(e) if is_unique_violation(&e) => {
            return Err(ApiError::bad_request("User already exists"));
        }
        Err(e) => return Err(ApiError::db_error("Failed to create user", e)),
    };

    info!(
        username = %payload.username,
        user_id = id,
        is_admin = payload.is_admin,
        "User created"
    );

    Ok((
        StatusCode::CREATED,
        Json(Principal {
            id,
            username: payload.username,
            email: payload.email,
            is_admin: payload.is_admin,
            permissions,
        }),
    ))
}

#[derive(Deserialize)]
struct LoginRequest {
    username: String,
    password: String,
}

#[derive(Serialize)]
struct LoginResponse {
    user: Principal,
    access_token: String,
    refresh_token: String,
}

async fn login(
    State(state): State<UsersState>,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let user = state
        .db
        .users()
        .get_by_username(&payload.username)
        .await
        .db_err("Failed to get user")?;

    let Some(user) = user else {
        warn!(username = %payload.username, "Login for unknown user");
        return Err(ApiError::unauthorized("Incorrect username or password"));
    };

    let valid = verify_password(&payload.password, &user.password_hash)
        .await
        .internal_err("Failed to verify password")?;

    if !valid {
        warn!(username = %payload.username, "Login with wrong password");
        return Err(ApiError::unauthorized("Incorrect username or password"));
    }

    let principal = Principal::from(user);
    let authority = state.gate.authority();
    let access_token = authority.issue_access(&principal)?;
    let refresh_token = authority.issue_refresh(&principal)?;

    info!(username = %principal.username, "User logged in");

    Ok(Json(LoginResponse {
        user: principal,
        access_token,
        refresh_token,
    }))
}

#[derive(Deserialize)]
struct RefreshRequest {
    token: String,
}

#[derive(Serialize)]
struct RefreshResponse {
    access_token: String,
}

/// Exchange a refresh token for a new access token.
///
/// The refresh token itself is not rotated and stays valid until it expires.
async fn refresh(
    State(state): State<UsersState>,
    Json(payload): Json<RefreshRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let authority = state.gate.authority();
    let username = authority.verify(&payload.token, TokenType::RefreshToken)?;

    let user = state
        .db
        .users()
        .get_by_username(&username)
        .await
        .db_err("Failed to get user")?
        .ok_or_else(|| {
            ApiError::unauthorized("Wrong username or password during token refresh")
        })?;

    let access_token = authority.issue_access(&Principal::from(user))?;

    Ok(Json(RefreshResponse { access_token }))
}

async fn me(CurrentUser(principal): CurrentUser) -> Json<Principal> {
    Json(principal)
}

fn validate_username(username: &str) -> Result<(), ApiError> {
    let len = username.chars().count();
    if !(3..=100).contains(&len) {
        return Err(ApiError::bad_request(
            "Username must be between 3 and 100 characters",
        ));
    }
    Ok(())
}

/// Shape check only: one `@`, a non-empty local part and a dotted domain.
fn validate_email(email: &str) -> Result<(), ApiError> {
    let invalid = || ApiError::bad_request("Use a valid email");

    if email.len() > 254 || email.chars().any(char::is_whitespace) {
        return Err(invalid());
    }

    let (local, domain) = email.split_once('@').ok_or_else(invalid)?;
    if local.is_empty() || domain.contains('@') {
        return Err(invalid());
    }

    let labels: Vec<&str> = domain.split('.').collect();
    if labels.len() < 2 || labels.iter().any(|label| label.is_empty()) {
        return Err(invalid());
    }

    Ok(())
}

fn validate_password(password: &str) -> Result<(), ApiError> {
    let len = password.chars().count();
    if !(8..=100).contains(&len) {
        return Err(ApiError::bad_request(
            "Password must be between 8 and 100 characters",
        ));
    }

    let has_letter = password.chars().any(char::is_alphabetic);
    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    let has_upper = password.chars().any(char::is_uppercase);
    let has_symbol = password.chars().any(|c| c.is_ascii_punctuation());

    if !(has_letter && has_digit && has_upper && has_symbol) {
        return Err(ApiError::bad_request(
            "Password must contain a letter, a digit, an uppercase letter and a symbol",
        ));
    }

    Ok(())
}

fn parse_permissions(names: &[String]) -> Result<PermissionSet, ApiError> {
    names
        .iter()
        .map(|name| {
            name.parse::<Permission>()
                .map_err(|e| ApiError::bad_request(e.to_string()))
        })
        .collect()
}
