//! Shared utilities for cadence
//!
//! This crate provides:
//! - ID types (ClientId, CallId)
//! - Wall-clock access with mock time support
//! - Business-day arithmetic for follow-up scheduling
//! - Default paths for config and data directories

mod ids;
mod paths;
mod time;

pub use ids::*;
pub use paths::*;
pub use time::*;
