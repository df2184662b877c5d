//! Authentication state trait and macro.

use crate::engine::AuthEngine;

/// Trait for state types that give the auth extractors access to the engine.
pub trait HasAuthBackend {
    fn engine(&self) -> &AuthEngine;
}

/// Implement `HasAuthBackend` for a state struct with an
/// `engine: Arc<AuthEngine>` field.
#[macro_export]
macro_rules! impl_has_auth_backend {
    ($state_type:ty) => {
        impl $crate::auth::HasAuthBackend for $state_type {
            fn engine(&self) -> &$crate::engine::AuthEngine {
                &self.engine
            }
        }
    };
}
