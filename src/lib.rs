//! Smart Scanner: marketplace arbitrage scanning and decision engine.
//!
//! Library crate exposing all modules for use by integration tests
//! and the binary entry point.

pub mod config;
pub mod types;
pub mod platforms;
pub mod oracle;
pub mod engine;
