//! Axum extractors and middleware for authentication.

use std::sync::Arc;

use axum::{
    extract::{FromRequestParts, Request, State},
    http::request::Parts,
    middleware::{self, Next},
    response::Response,
    routing::MethodRouter,
};

use super::errors::AuthError;
use super::gate::{PermissionGate, UserDirectory};
use super::header::bearer_token;
use super::state::HasAuthBackend;
use super::types::Principal;
use crate::permissions::Permission;

/// Extractor for endpoints that need the caller's identity but no permissions.
pub struct CurrentUser(pub Principal);

impl<S> FromRequestParts<S> for CurrentUser
where
    S: HasAuthBackend + Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers).ok_or(AuthError::NotAuthenticated)?;

        state
            .gate()
            .resolve_current_principal(token)
            .await
            .map(CurrentUser)
    }
}

/// Middleware state: the gate plus the permissions one route requires.
pub struct PermissionGuard<D> {
    gate: Arc<PermissionGate<D>>,
    required: &'static [Permission],
}

impl<D> PermissionGuard<D> {
    pub fn new(gate: Arc<PermissionGate<D>>, required: &'static [Permission]) -> Self {
        Self { gate, required }
    }
}

impl<D> Clone for PermissionGuard<D> {
    fn clone(&self) -> Self {
        Self {
            gate: self.gate.clone(),
            required: self.required,
        }
    }
}

/// Middleware: verify the bearer token, load the user and check the guard's
/// permissions. On success the `Principal` is stored in request extensions.
pub async fn require_permissions<D>(
    State(guard): State<PermissionGuard<D>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthError>
where
    D: UserDirectory + 'static,
{
    let token = bearer_token(request.headers()).ok_or(AuthError::NotAuthenticated)?;
    let principal = guard.gate.check(token, guard.required).await?;

    request.extensions_mut().insert(principal);

    Ok(next.run(request).await)
}

/// Wrap a route so it only runs for users holding every permission in `required`.
pub fn with_permissions<S, D>(
    route: MethodRouter<S>,
    gate: Arc<PermissionGate<D>>,
    required: &'static [Permission],
) -> MethodRouter<S>
where
    S: Clone + Send + Sync + 'static,
    D: UserDirectory + 'static,
{
    route.route_layer(middleware::from_fn_with_state(
        PermissionGuard::new(gate, required),
        require_permissions::<D>,
    ))
}
