//! Record query engine
//!
//! Turns a [`QueryFilter`] into a three-stage aggregation pipeline, hands it
//! to the document collection, and classifies the outcome:
//!
//! 1. `$match` on `createdAt` strictly inside `(startDate, endDate)`
//! 2. `$project` `key`, `createdAt` and `totalCount = sum(counts)`, dropping `_id`
//! 3. `$match` on `totalCount` strictly inside `(minCount, maxCount)`
//!
//! Date parsing happens before the store is touched. The engine never filters
//! locally; it only decodes what the collection returns.

use crate::metrics;
use crate::storage::DocumentCollection;
use bson::{doc, Bson, Document};
use chrono::{DateTime, Utc};
use recordgate_shared::utils::{parse_calendar_date, start_of_day_utc, DateParseError};
use recordgate_shared::{QueryFilter, QueryResult, Record, TotalCount};
use std::sync::Arc;
use std::time::{Duration, Instant};

pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(5);

/// Creation-time window of a query, both ends exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    /// Parse both dates of `filter`; the start date is checked first.
    pub fn parse(filter: &QueryFilter) -> Result<Self, DateParseError> {
        let start = parse_calendar_date(&filter.start_date)?;
        let end = parse_calendar_date(&filter.end_date)?;
        Ok(Self {
            start: start_of_day_utc(start),
            end: start_of_day_utc(end),
        })
    }
}

/// Compose the match / project / match pipeline.
pub fn build_pipeline(window: &TimeWindow, min_count: f64, max_count: f64) -> Vec<Document> {
    vec![
        doc! {
            "$match": {
                "createdAt": {
                    "$gt": bson::DateTime::from_chrono(window.start),
                    "$lt": bson::DateTime::from_chrono(window.end),
                },
            },
        },
        doc! {
            "$project": {
                "_id": 0,
                "key": 1,
                "createdAt": 1,
                "totalCount": { "$sum": "$counts" },
            },
        },
        doc! {
            "$match": {
                "totalCount": {
                    "$gt": min_count,
                    "$lt": max_count,
                },
            },
        },
    ]
}

/// Aggregation query engine over a shared document collection.
pub struct QueryEngine {
    collection: Arc<dyn DocumentCollection>,
    timeout: Duration,
}

impl QueryEngine {
    pub fn new(collection: Arc<dyn DocumentCollection>) -> Self {
        Self {
            collection,
            timeout: DEFAULT_QUERY_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn collection(&self) -> &Arc<dyn DocumentCollection> {
        &self.collection
    }

    /// Run one query. Every failure is reported inside the returned result.
    pub async fn query(&self, filter: &QueryFilter) -> QueryResult {
        let start = Instant::now();
        let result = self.execute(filter).await;

        metrics::QUERY_TOTAL
            .with_label_values(&[result.status.label()])
            .inc();
        metrics::QUERY_DURATION.observe(start.elapsed().as_secs_f64());
        if result.is_success() {
            metrics::QUERY_RECORDS.observe(result.records.len() as f64);
        }
        tracing::debug!(
            status = result.status.label(),
            records = result.records.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Record query finished"
        );
        result
    }

    async fn execute(&self, filter: &QueryFilter) -> QueryResult {
        let window = match TimeWindow::parse(filter) {
            Ok(w) => w,
            Err(e) => return QueryResult::error(e.to_string()),
        };
        let pipeline = build_pipeline(&window, filter.min_count, filter.max_count);

        let documents =
            match tokio::time::timeout(self.timeout, self.collection.aggregate(pipeline)).await {
                Ok(Ok(docs)) => docs,
                Ok(Err(e)) => {
                    tracing::warn!(
                        "Aggregation on {} backend failed: {}",
                        self.collection.backend_name(),
                        e
                    );
                    return QueryResult::error(e);
                }
                Err(_) => {
                    tracing::warn!(
                        "Aggregation on {} backend timed out ({:?})",
                        self.collection.backend_name(),
                        self.timeout
                    );
                    return QueryResult::error(format!(
                        "query timed out after {:?}",
                        self.timeout
                    ));
                }
            };

        match documents.iter().map(decode_record).collect::<Result<Vec<_>, _>>() {
            Ok(records) => QueryResult::from_records(records),
            Err(e) => QueryResult::error(e),
        }
    }
}

/// Decode one projected document into a [`Record`].
fn decode_record(document: &Document) -> Result<Record, String> {
    let key = document
        .get_str("key")
        .map_err(|e| format!("decode record field \"key\": {}", e))?
        .to_string();
    let created_at = document
        .get_datetime("createdAt")
        .map_err(|e| format!("decode record field \"createdAt\": {}", e))?
        .to_chrono();
    let total_count = match document.get("totalCount") {
        Some(Bson::Int32(n)) => TotalCount::Integer(i64::from(*n)),
        Some(Bson::Int64(n)) => TotalCount::Integer(*n),
        Some(Bson::Double(x)) => TotalCount::Fractional(*x),
        other => {
            return Err(format!(
                "decode record field \"totalCount\": unexpected value {:?}",
                other
            ))
        }
    };
    Ok(Record {
        key,
        created_at,
        total_count,
    })
}
