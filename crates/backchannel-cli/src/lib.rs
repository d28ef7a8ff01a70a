//! Backchannel command-line glue.
//!
//! Kept as a library beside `main.rs` so configuration, logging setup and
//! command rendering can be tested.

pub mod commands;
pub mod config;
pub mod logging;
