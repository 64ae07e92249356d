//! recordgate gateway library
//!
//! A transactional key-value store and a record aggregation query engine,
//! exposed over HTTP.

pub mod access;
pub mod config;
pub mod kv;
pub mod metrics;
pub mod query;
pub mod server;
pub mod storage;
