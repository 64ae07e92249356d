//! MongoDB storage backend
//!
//! Runs aggregation pipelines against one collection of a MongoDB
//! deployment. The client is created once at startup and shared by all
//! queries; the driver pools connections internally.

use super::DocumentCollection;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use bson::{doc, Document};
use mongodb::options::ClientOptions;
use mongodb::{Client, Collection, Database};
use std::time::Duration;

const APP_NAME: &str = "recordgate";

/// MongoDB-backed record collection.
pub struct MongoCollection {
    database: Database,
    collection: Collection<Document>,
}

impl MongoCollection {
    /// Connect and verify the deployment answers a `ping` within
    /// `connect_timeout`.
    pub async fn connect(
        uri: &str,
        database: &str,
        collection: &str,
        connect_timeout: Duration,
    ) -> Result<Self> {
        let mut options = ClientOptions::parse(uri)
            .await
            .context("Parse MongoDB connection string")?;
        options.app_name = Some(APP_NAME.to_string());
        options.connect_timeout = Some(connect_timeout);
        options.server_selection_timeout = Some(connect_timeout);

        let client = Client::with_options(options).context("Build MongoDB client")?;
        let database = client.database(database);
        let store = Self {
            collection: database.collection::<Document>(collection),
            database,
        };

        tokio::time::timeout(connect_timeout, store.run_ping())
            .await
            .map_err(|_| anyhow!("MongoDB ping timed out after {:?}", connect_timeout))??;
        Ok(store)
    }

    async fn run_ping(&self) -> Result<()> {
        self.database
            .run_command(doc! { "ping": 1 }, None)
            .await
            .context("Ping MongoDB")?;
        Ok(())
    }
}

#[async_trait]
impl DocumentCollection for MongoCollection {
    async fn aggregate(&self, pipeline: Vec<Document>) -> Result<Vec<Document>, String> {
        let mut cursor = self
            .collection
            .aggregate(pipeline, None)
            .await
            .map_err(|e| e.to_string())?;

        let mut out = Vec::new();
        while cursor.advance().await.map_err(|e| e.to_string())? {
            out.push(cursor.deserialize_current().map_err(|e| e.to_string())?);
        }
        Ok(out)
    }

    async fn ping(&self) -> Result<(), String> {
        self.run_ping().await.map_err(|e| format!("{:#}", e))
    }

    fn backend_name(&self) -> &'static str {
        "mongodb"
    }
}
