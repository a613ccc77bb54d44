//! HTTP surface for anonymous-token plan sessions.

pub mod api;
pub mod config;
pub mod cookies;
pub mod error;
pub mod main_lib;
pub mod scheduler;

pub use api::app_router;
pub use config::{Environment, ServerConfig};
pub use main_lib::{build_state, AppState};
