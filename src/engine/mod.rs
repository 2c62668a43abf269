//! Core engine: the poll → filter → evaluate → execute loop.

pub mod delta;
pub mod evaluator;
pub mod executor;
pub mod scanner;
