//! HTTP API handlers

pub mod actions;
pub mod buildinfo;
pub mod health;

pub use actions::{handle_action_get, handle_action_post};
pub use buildinfo::get_build_info;
pub use health::health_routes;
