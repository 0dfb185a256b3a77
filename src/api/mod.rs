mod error;
mod products;
mod users;

use axum::Router;
use std::sync::Arc;

use crate::auth::PermissionGate;
use crate::db::Database;
use crate::rate_limit::RateLimitConfig;

pub use error::ApiError;
pub use products::ProductsState;
pub use users::UsersState;

/// Create the API router. Routes carry their full path below the API prefix.
pub fn create_api_router(
    db: Database,
    gate: Arc<PermissionGate<Database>>,
    password_cost: u32,
    rate_limit_config: Arc<RateLimitConfig>,
) -> Router {
    let products_state = products::ProductsState {
        db: db.clone(),
        gate: gate.clone(),
    };

    let users_state = users::UsersState {
        db,
        gate,
        password_cost,
        rate_limit_config,
    };

    Router::new()
        .merge(users::router(users_state))
        .merge(products::router(products_state))
}
