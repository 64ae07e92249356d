//! Domain types

pub mod entry;
pub mod query;
