//! Authentication user types.

use serde::Serialize;

use crate::permissions::{Permission, PermissionSet};

/// An authenticated user with the permissions they were granted.
///
/// This is always loaded from the user directory; nothing in it is taken from
/// token claims.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Principal {
    /// Database user ID
    pub id: i64,
    pub username: String,
    pub email: String,
    /// Informational. Admins get their rights from `permissions`, seeded at creation.
    pub is_admin: bool,
    pub permissions: PermissionSet,
}

impl Principal {
    pub fn has_permission(&self, permission: Permission) -> bool {
        self.permissions.contains(&permission)
    }
}
