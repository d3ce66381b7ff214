//! Ascent daemon library
//!
//! This module provides the core components for the Ascent daemon:
//! - REST API handlers for bundles and promotion runs
//! - Server lifecycle management
//! - Configuration

pub mod api;
pub mod config;
pub mod error;
pub mod server;

pub use config::DaemonConfig;
pub use error::{ApiError, DaemonError};
pub use server::Server;
