//! Authentication state trait and macro.

use super::gate::{PermissionGate, UserDirectory};

/// Trait for state types that can authenticate requests.
pub trait HasAuthBackend {
    type Directory: UserDirectory;

    fn gate(&self) -> &PermissionGate<Self::Directory>;
}

/// Macro to implement `HasAuthBackend` for state structs with the standard field.
///
/// The struct must have a `gate: Arc<PermissionGate<Database>>` field.
///
/// # Example
/// ```ignore
/// use crate::impl_has_auth_backend;
///
/// #[derive(Clone)]
/// pub struct MyState {
///     pub db: Database,
///     pub gate: Arc<PermissionGate<Database>>,
/// }
///
/// impl_has_auth_backend!(MyState);
/// ```
#[macro_export]
macro_rules! impl_has_auth_backend {
    ($state_type:ty) => {
        impl $crate::auth::HasAuthBackend for $state_type {
            type Directory = $crate::db::Database;

            fn gate(&self) -> &$crate::auth::PermissionGate<$crate::db::Database> {
                &self.gate
            }
        }
    };
}
