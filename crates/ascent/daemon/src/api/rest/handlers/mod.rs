//! REST API handlers

pub mod bundles;
pub mod health;
pub mod runs;

pub use bundles::{get_bundle, record_approval, register_bundle};
pub use health::health_check;
pub use runs::{abort_run, advance_run, create_run, get_run, get_run_events, list_runs};
