//! Product permissions granted to users.
//!
//! The set is closed: every route guard names one of these variants, and
//! anything else is rejected when parsed.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A named capability gating a product operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    ViewProduct,
    UpdateProduct,
    AddProduct,
    DeleteProduct,
}

/// Permissions held by a user.
pub type PermissionSet = BTreeSet<Permission>;

impl Permission {
    /// Every permission, in declaration order.
    pub const ALL: [Permission; 4] = [
        Permission::ViewProduct,
        Permission::UpdateProduct,
        Permission::AddProduct,
        Permission::DeleteProduct,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::ViewProduct => "view_product",
            Permission::UpdateProduct => "update_product",
            Permission::AddProduct => "add_product",
            Permission::DeleteProduct => "delete_product",
        }
    }

    /// The full set, seeded into admin accounts at creation.
    pub fn all() -> PermissionSet {
        Self::ALL.into_iter().collect()
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error for a permission name outside the known set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownPermission(pub String);

impl fmt::Display for UnknownPermission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Unknown permission: {}", self.0)
    }
}

impl std::error::Error for UnknownPermission {}

impl FromStr for Permission {
    type Err = UnknownPermission;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| UnknownPermission(s.to_string()))
    }
}
