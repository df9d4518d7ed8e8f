//! Follow-up scheduling core for cadence
//!
//! This crate contains:
//! - The per-client follow-up clock (Unset -> Running -> Due, with Paused)
//! - User actions that drive the clock and write through the client store
//! - The periodic sweep that notifies once per due event and suspends
//!   long-overdue clients
//! - An owned handle that runs the sweep on a timer

mod clock;
mod engine;
mod events;
mod runner;
mod scheduler;

pub use clock::*;
pub use engine::*;
pub use events::*;
pub use runner::*;
pub use scheduler::*;
