//! Notification delivery for cadence
//!
//! The scheduler hands due follow-ups to a [`Notifier`]. This crate holds the
//! trait and its implementations; it knows nothing about clients beyond the
//! notice payload.

mod command;
mod log;
mod mock;
mod traits;

pub use command::*;
pub use log::*;
pub use mock::*;
pub use traits::*;
