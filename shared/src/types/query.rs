//! Record query types
//!
//! These types describe a time-window / count-threshold query over the record
//! collection and its classified outcome. The JSON field names are a fixed
//! external contract (`startDate`, `createdAt`, `code`, `msg`, ...).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Message attached to a query that matched at least one record.
pub const SUCCESS_MESSAGE: &str = "Success";

/// Message attached to a query that ran but matched nothing.
pub const NO_DATA_FOUND: &str = "No Data Found";

/// Query parameters: an open `(start_date, end_date)` window on `createdAt`
/// and an open `(min_count, max_count)` window on the summed `counts`.
///
/// Dates are kept as the caller sent them; they are validated by the query
/// engine so that parse failures surface as a query outcome.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QueryFilter {
    pub start_date: String,
    pub end_date: String,
    pub min_count: f64,
    pub max_count: f64,
}

impl QueryFilter {
    pub fn new(
        start_date: impl Into<String>,
        end_date: impl Into<String>,
        min_count: f64,
        max_count: f64,
    ) -> Self {
        Self {
            start_date: start_date.into(),
            end_date: end_date.into(),
            min_count,
            max_count,
        }
    }
}

/// A projected record: identity field dropped, `counts` folded into
/// `total_count`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    pub key: String,
    pub created_at: DateTime<Utc>,
    pub total_count: TotalCount,
}

/// Sum of a document's `counts`, kept in the numeric form the store
/// produced: integer sums stay integers, any fractional element makes it a
/// double.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TotalCount {
    Integer(i64),
    Fractional(f64),
}

impl TotalCount {
    pub fn as_f64(self) -> f64 {
        match self {
            Self::Integer(n) => n as f64,
            Self::Fractional(x) => x,
        }
    }
}

impl From<i64> for TotalCount {
    fn from(n: i64) -> Self {
        Self::Integer(n)
    }
}

impl From<f64> for TotalCount {
    fn from(x: f64) -> Self {
        Self::Fractional(x)
    }
}

impl PartialEq<i64> for TotalCount {
    fn eq(&self, other: &i64) -> bool {
        match *self {
            Self::Integer(n) => n == *other,
            Self::Fractional(x) => x == *other as f64,
        }
    }
}

impl PartialEq<f64> for TotalCount {
    fn eq(&self, other: &f64) -> bool {
        self.as_f64() == *other
    }
}

/// Outcome class of a query. Serialized as the numeric code clients expect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "i32", try_from = "i32")]
pub enum QueryStatus {
    Success,
    Empty,
    Error,
}

impl QueryStatus {
    pub fn code(self) -> i32 {
        match self {
            Self::Success => 0,
            Self::Empty => 204,
            Self::Error => 400,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Empty => "empty",
            Self::Error => "error",
        }
    }
}

impl From<QueryStatus> for i32 {
    fn from(status: QueryStatus) -> Self {
        status.code()
    }
}

impl TryFrom<i32> for QueryStatus {
    type Error = String;

    fn try_from(code: i32) -> Result<Self, String> {
        match code {
            0 => Ok(Self::Success),
            204 => Ok(Self::Empty),
            400 => Ok(QueryStatus::Error),
            other => Err(format!("unknown query status code {}", other)),
        }
    }
}

/// Classified result of one query. Produced fresh per call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    #[serde(rename = "code")]
    pub status: QueryStatus,
    #[serde(rename = "msg")]
    pub message: String,
    pub records: Vec<Record>,
}

impl QueryResult {
    /// Build a result from the surviving records, choosing `Empty` when there
    /// are none.
    pub fn from_records(records: Vec<Record>) -> Self {
        if records.is_empty() {
            Self::empty()
        } else {
            Self {
                status: QueryStatus::Success,
                message: SUCCESS_MESSAGE.to_string(),
                records,
            }
        }
    }

    pub fn empty() -> Self {
        Self {
            status: QueryStatus::Empty,
            message: NO_DATA_FOUND.to_string(),
            records: Vec::new(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: QueryStatus::Error,
            message: message.into(),
            records: Vec::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == QueryStatus::Success
    }
}
