//! HTTP surface for the property price service
//!
//! - `config`: layered server configuration
//! - `server`: axum router, handlers and error mapping

pub mod config;
pub mod server;

pub use config::{ApiConfig, CliOverrides};
pub use server::{build_router, serve, ApiError, AppState};
