//! Passgate Backend Library
//!
//! Account registration, password login, and bearer-token gating for a JSON
//! API. Exposes the router builder so binaries and tests share one wiring.

pub mod app;
pub mod auth;
pub mod config;
pub mod middleware;

pub use app::{build_router, build_state};
pub use config::Config;
