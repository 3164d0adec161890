//! Tillguard CLI library
//!
//! Exposes the command definitions for testing and reuse.

pub mod commands;

pub use commands::{run, Cli, Commands};
