//! Data model for cadence
//!
//! This crate defines the types every other crate agrees on:
//! - Client records as persisted (with forward-compatible defaults)
//! - Field-wise patches used for every mutation
//! - Read-only views rendered by the CLI

mod types;
mod views;

pub use types::*;
pub use views::*;

/// Current persisted schema version, recorded alongside the client array
pub const SCHEMA_VERSION: u32 = 1;
