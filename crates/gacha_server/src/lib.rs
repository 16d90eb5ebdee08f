//! # Gacha Server
//!
//! Thin HTTP transport over [`gacha_economy::DrawEngine`].
//!
//! ```text
//! config/gacha.toml -> GachaConfig -> build_engine() -> DrawEngine
//!                                                        │
//! HTTP (axum) -> handlers -> spawn_blocking ─────────────┘
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod api;
pub mod bootstrap;
pub mod config;
pub mod errors;
pub mod server;
pub mod telemetry;

pub use bootstrap::build_engine;
pub use config::{config_path, GachaConfig};
pub use errors::{ApiError, StartupError};
pub use server::{build_router, serve, SharedEngine};
