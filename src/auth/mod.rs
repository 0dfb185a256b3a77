//! Bearer-token authentication with permission-based access control.
//!
//! Every guarded request runs the same chain: verify the access token,
//! resolve its subject to a live user record, then check the route's
//! required permissions against the user's granted set.

mod errors;
mod extractors;
mod gate;
mod header;
mod ip;
mod state;
mod types;

pub use errors::AuthError;
pub use extractors::{CurrentUser, PermissionGuard, require_permissions, with_permissions};
pub use gate::{PermissionGate, UserDirectory, authorize};
pub use header::bearer_token;
pub use ip::{HasHeadersAndExtensions, client_ip};
pub use state::HasAuthBackend;
pub use types::Principal;
