//! HTTP servers: the public API and the admin endpoints

pub mod api;
pub mod http;

use crate::kv::KvStore;
use crate::query::QueryEngine;
use std::sync::Arc;

/// Handles shared by every request task. Both stores are created once at
/// startup and injected here.
#[derive(Clone)]
pub struct AppState {
    pub kv: Arc<dyn KvStore>,
    pub engine: Arc<QueryEngine>,
}

impl AppState {
    pub fn new(kv: Arc<dyn KvStore>, engine: Arc<QueryEngine>) -> Self {
        Self { kv, engine }
    }
}
