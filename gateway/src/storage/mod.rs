//! Document collection backends

pub mod memory;
#[cfg(feature = "mongodb-storage")]
pub mod mongo;

use async_trait::async_trait;
use bson::Document;

/// A queryable record collection that evaluates aggregation pipelines
/// natively. The query engine composes the pipeline; the backend runs it.
#[async_trait]
pub trait DocumentCollection: Send + Sync {
    /// Run `pipeline` and collect every resulting document.
    async fn aggregate(&self, pipeline: Vec<Document>) -> Result<Vec<Document>, String>;

    /// Round-trip to the backend. Default reports it reachable.
    async fn ping(&self) -> Result<(), String> {
        Ok(())
    }

    /// Backend name for logs.
    fn backend_name(&self) -> &'static str;
}
