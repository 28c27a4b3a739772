pub mod auth;
pub mod posts;

use thebook_kernel::ModuleRegistry;

use crate::app::AppState;

/// Register every application module with the registry
pub fn register_all(registry: &mut ModuleRegistry, state: &AppState) {
    registry.register_core(auth::create_module(state.clone()));
    registry.register_custom(posts::create_module(state.clone()));
}
