//! Shared types and utilities for recordgate
//!
//! This crate contains the data structures exchanged between the gateway's
//! stores and its HTTP layer, plus the strict calendar-date parser used by
//! the record query engine.

pub mod types;
pub mod utils;

// Re-export commonly used types
pub use types::{entry::*, query::*};
