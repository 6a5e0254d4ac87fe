//! Shared utilities for the Kasper realtime chat client.
//!
//! Logging bootstrap and timestamp helpers used by every package in the
//! workspace.

pub mod logger;
pub mod time;
