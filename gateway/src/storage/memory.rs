//! In-memory record collection
//!
//! Holds BSON documents behind an `RwLock` and evaluates the subset of the
//! aggregation language the query engine emits: `$match` with comparison
//! operators and `$project` with field inclusion and `$sum`. Anything else is
//! rejected with an error, the same way a real server rejects an unknown stage.

use super::DocumentCollection;
use anyhow::{Context, Result};
use async_trait::async_trait;
use bson::{doc, Bson, Document};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::cmp::Ordering;
use std::path::Path;
use std::sync::RwLock;

/// Thread-safe in-memory collection.
#[derive(Debug, Default)]
pub struct InMemoryCollection {
    documents: RwLock<Vec<Document>>,
}

impl InMemoryCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_documents(documents: Vec<Document>) -> Self {
        Self {
            documents: RwLock::new(documents),
        }
    }

    pub fn insert_many(&self, documents: impl IntoIterator<Item = Document>) -> Result<(), String> {
        let mut guard = self.documents.write().map_err(|e| e.to_string())?;
        guard.extend(documents);
        Ok(())
    }

    pub fn len(&self) -> Result<usize, String> {
        let guard = self.documents.read().map_err(|e| e.to_string())?;
        Ok(guard.len())
    }

    pub fn is_empty(&self) -> Result<bool, String> {
        Ok(self.len()? == 0)
    }

    /// Evaluate `pipeline` over a snapshot of the collection.
    pub fn run_pipeline(&self, pipeline: &[Document]) -> Result<Vec<Document>, String> {
        let mut current = {
            let guard = self.documents.read().map_err(|e| e.to_string())?;
            guard.clone()
        };
        for stage in pipeline {
            current = apply_stage(stage, current)?;
        }
        Ok(current)
    }
}

#[async_trait]
impl DocumentCollection for InMemoryCollection {
    async fn aggregate(&self, pipeline: Vec<Document>) -> Result<Vec<Document>, String> {
        self.run_pipeline(&pipeline)
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

/// One seed document as written in a seed file.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SeedRecord {
    key: String,
    created_at: DateTime<Utc>,
    #[serde(default)]
    counts: Vec<SeedCount>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SeedCount {
    Integer(i64),
    Fractional(f64),
}

impl From<SeedCount> for Bson {
    fn from(count: SeedCount) -> Self {
        match count {
            SeedCount::Integer(n) => Bson::Int64(n),
            SeedCount::Fractional(x) => Bson::Double(x),
        }
    }
}

/// Read a JSON array of `{key, createdAt, counts}` records into documents
/// shaped like the external collection (an `_id` is generated for each).
pub fn load_seed_file(path: &Path) -> Result<Vec<Document>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Read seed file {}", path.display()))?;
    let records: Vec<SeedRecord> = serde_json::from_str(&raw)
        .with_context(|| format!("Parse seed file {}", path.display()))?;
    Ok(records
        .into_iter()
        .map(|r| {
            doc! {
                "_id": bson::oid::ObjectId::new(),
                "key": r.key,
                "createdAt": bson::DateTime::from_chrono(r.created_at),
                "counts": r.counts,
            }
        })
        .collect())
}

fn apply_stage(stage: &Document, documents: Vec<Document>) -> Result<Vec<Document>, String> {
    let mut fields = stage.iter();
    let (name, args) = match (fields.next(), fields.next()) {
        (Some(entry), None) => entry,
        _ => {
            return Err(
                "A pipeline stage specification object must contain exactly one field."
                    .to_string(),
            )
        }
    };
    let args = args
        .as_document()
        .ok_or_else(|| format!("{} specification must be an object", name))?;

    match name.as_str() {
        "$match" => {
            let mut out = Vec::with_capacity(documents.len());
            for document in documents {
                if matches_filter(&document, args)? {
                    out.push(document);
                }
            }
            Ok(out)
        }
        "$project" => documents.iter().map(|d| project(d, args)).collect(),
        other => Err(format!("Unrecognized pipeline stage name: '{}'", other)),
    }
}

fn matches_filter(document: &Document, filter: &Document) -> Result<bool, String> {
    for (field, condition) in filter {
        let value = document.get(field);
        let matched = match condition {
            Bson::Document(ops) if ops.keys().next().is_some_and(|k| k.starts_with('$')) => {
                let mut all = true;
                for (op, operand) in ops {
                    if !evaluate_operator(op, value, operand)? {
                        all = false;
                        break;
                    }
                }
                all
            }
            literal => value.and_then(|v| compare(v, literal)) == Some(Ordering::Equal),
        };
        if !matched {
            return Ok(false);
        }
    }
    Ok(true)
}

fn evaluate_operator(op: &str, value: Option<&Bson>, operand: &Bson) -> Result<bool, String> {
    let ordering = value.and_then(|v| compare(v, operand));
    Ok(match op {
        "$gt" => ordering == Some(Ordering::Greater),
        "$gte" => matches!(ordering, Some(Ordering::Greater | Ordering::Equal)),
        "$lt" => ordering == Some(Ordering::Less),
        "$lte" => matches!(ordering, Some(Ordering::Less | Ordering::Equal)),
        "$eq" => ordering == Some(Ordering::Equal),
        other => return Err(format!("unknown operator: {}", other)),
    })
}

/// Order two values of comparable types. Numbers compare across widths;
/// values of unrelated types never match.
fn compare(a: &Bson, b: &Bson) -> Option<Ordering> {
    match (a, b) {
        (Bson::DateTime(x), Bson::DateTime(y)) => Some(x.cmp(y)),
        (Bson::String(x), Bson::String(y)) => Some(x.cmp(y)),
        (Bson::Boolean(x), Bson::Boolean(y)) => Some(x.cmp(y)),
        _ => as_f64(a)?.partial_cmp(&as_f64(b)?),
    }
}

fn as_f64(value: &Bson) -> Option<f64> {
    match value {
        Bson::Int32(n) => Some(f64::from(*n)),
        Bson::Int64(n) => Some(*n as f64),
        Bson::Double(n) => Some(*n),
        _ => None,
    }
}

fn is_excluded(flag: &Bson) -> bool {
    matches!(flag, Bson::Boolean(false)) || as_f64(flag) == Some(0.0)
}

fn project(document: &Document, args: &Document) -> Result<Document, String> {
    let mut out = Document::new();
    let keep_id = !args.get("_id").is_some_and(is_excluded);
    if keep_id {
        if let Some(id) = document.get("_id") {
            out.insert("_id", id.clone());
        }
    }

    for (field, rule) in args {
        if field == "_id" {
            continue;
        }
        match rule {
            Bson::Document(expr) => {
                out.insert(field.clone(), evaluate_expression(document, expr)?);
            }
            flag if !is_excluded(flag) => {
                if let Some(value) = document.get(field) {
                    out.insert(field.clone(), value.clone());
                }
            }
            _ => {
                return Err(format!(
                    "Invalid $project :: cannot exclude '{}' in inclusion projection",
                    field
                ))
            }
        }
    }
    Ok(out)
}

fn evaluate_expression(document: &Document, expr: &Document) -> Result<Bson, String> {
    let mut ops = expr.iter();
    let (op, arg) = match (ops.next(), ops.next()) {
        (Some(entry), None) => entry,
        _ => return Err("an expression specification must contain exactly one field".to_string()),
    };
    match op.as_str() {
        "$sum" => {
            let path = arg
                .as_str()
                .and_then(|s| s.strip_prefix('$'))
                .ok_or_else(|| "$sum expects a field path such as \"$counts\"".to_string())?;
            Ok(sum(document.get(path)))
        }
        other => Err(format!("Unrecognized expression '{}'", other)),
    }
}

/// `$sum` over an array or a single value. Non-numeric items are ignored and
/// a missing field sums to 0. Integer inputs keep an integer result.
fn sum(value: Option<&Bson>) -> Bson {
    let items: Vec<&Bson> = match value {
        Some(Bson::Array(items)) => items.iter().collect(),
        Some(other) => vec![other],
        None => Vec::new(),
    };

    let mut int_total: i64 = 0;
    let mut float_total = 0.0;
    let mut saw_double = false;
    let mut saw_long = false;
    for item in items {
        match item {
            Bson::Int32(n) => int_total = int_total.saturating_add(i64::from(*n)),
            Bson::Int64(n) => {
                int_total = int_total.saturating_add(*n);
                saw_long = true;
            }
            Bson::Double(n) => {
                float_total += n;
                saw_double = true;
            }
            _ => {}
        }
    }

    if saw_double {
        Bson::Double(float_total + int_total as f64)
    } else if saw_long || i32::try_from(int_total).is_err() {
        Bson::Int64(int_total)
    } else {
        Bson::Int32(int_total as i32)
    }
}
