//! Token-to-principal resolution and permission checks.

use std::future::Future;
use std::sync::Arc;

use tracing::{debug, error};

use super::errors::AuthError;
use super::types::Principal;
use crate::jwt::{TokenAuthority, TokenType};
use crate::permissions::Permission;

/// Lookup of users by username.
///
/// The returned future must not borrow the directory or the name, so that
/// callers can hold it across await points in any task.
pub trait UserDirectory: Send + Sync {
    type Error: std::fmt::Display + Send;

    fn find_by_username(
        &self,
        username: &str,
    ) -> impl Future<Output = Result<Option<Principal>, Self::Error>> + Send + 'static;
}

/// Check that `principal` holds every permission in `required`.
///
/// `is_admin` is deliberately not consulted: admins pass because they were
/// seeded with the full permission set.
pub fn authorize(principal: Principal, required: &[Permission]) -> Result<Principal, AuthError> {
    let missing: Vec<Permission> = required
        .iter()
        .copied()
        .filter(|p| !principal.has_permission(*p))
        .collect();

    if !missing.is_empty() {
        debug!(
            username = %principal.username,
            missing = ?missing,
            "Permission denied"
        );
        return Err(AuthError::InsufficientPermissions);
    }

    Ok(principal)
}

/// Resolves bearer tokens to principals and enforces permission sets.
pub struct PermissionGate<D> {
    authority: Arc<TokenAuthority>,
    directory: D,
}

impl<D: UserDirectory> PermissionGate<D> {
    pub fn new(authority: Arc<TokenAuthority>, directory: D) -> Self {
        Self {
            authority,
            directory,
        }
    }

    pub fn authority(&self) -> &TokenAuthority {
        &self.authority
    }

    /// Verify an access token and load the user it names.
    pub async fn resolve_current_principal(&self, token: &str) -> Result<Principal, AuthError> {
        let username = self.authority.verify(token, TokenType::AccessToken)?;

        self.directory
            .find_by_username(&username)
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to look up user");
                AuthError::Directory
            })?
            .ok_or(AuthError::PrincipalNotFound)
    }

    /// Full chain: verify, resolve, then authorize against `required`.
    pub async fn check(&self, token: &str, required: &[Permission]) -> Result<Principal, AuthError> {
        let principal = self.resolve_current_principal(token).await?;
        authorize(principal, required)
    }
}
