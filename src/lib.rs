//! thebook application library
//!
//! Application modules, shared state and form/media utilities for thebook.

pub mod app;
pub mod modules;
pub mod utils;

pub use app::{router, run, AppState};
