use crate::error::{ExecutionError, RequestError, Result};
use chrono::DateTime;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One result row: column name to scalar value.
pub type Record = Map<String, Value>;

/// A query and the time range it runs over.
///
/// Range bounds are engine-native expressions (`now()-1h`, ISO timestamps, ...)
/// and are passed to the upstream engine verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QueryRequest {
    query: String,
    range_start: String,
    range_end: String,
}

impl QueryRequest {
    pub fn new(
        query: impl Into<String>,
        range_start: impl Into<String>,
        range_end: impl Into<String>,
    ) -> std::result::Result<Self, RequestError> {
        let query = query.into();
        if query.trim().is_empty() {
            return Err(RequestError::EmptyQuery);
        }
        Ok(Self {
            query,
            range_start: range_start.into(),
            range_end: range_end.into(),
        })
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn range_start(&self) -> &str {
        &self.range_start
    }

    pub fn range_end(&self) -> &str {
        &self.range_end
    }
}

/// Inferred type of a result column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnKind {
    Time,
    Number,
    String,
}

impl ColumnKind {
    /// Map a Grail field type name onto a column kind.
    fn from_engine_type(name: &str) -> Self {
        match name {
            "timestamp" | "timeframe" => ColumnKind::Time,
            "long" | "double" | "duration" => ColumnKind::Number,
            _ => ColumnKind::String,
        }
    }

    fn infer(name: &str, value: Option<&Value>) -> Self {
        match value {
            Some(Value::Number(_)) => ColumnKind::Number,
            Some(Value::String(s)) if DateTime::parse_from_rfc3339(s).is_ok() => ColumnKind::Time,
            Some(_) => ColumnKind::String,
            None if is_time_like(name) => ColumnKind::Time,
            None => ColumnKind::String,
        }
    }
}

/// Whether a column name looks like it carries timestamps.
pub fn is_time_like(name: &str) -> bool {
    name.to_ascii_lowercase().contains("time")
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub kind: ColumnKind,
}

/// Unshaped result of a succeeded query execution.
#[derive(Debug, Clone, PartialEq)]
pub struct RawResult {
    payload: Value,
    records: Vec<Record>,
    columns: Vec<Column>,
}

impl RawResult {
    /// Build a result from the final upstream response body.
    ///
    /// The body must carry `result.records` as an array of objects.
    pub fn from_payload(payload: Value) -> Result<Self> {
        let result = payload
            .get("result")
            .and_then(Value::as_object)
            .ok_or_else(|| ExecutionError::MalformedResponse("missing 'result' object".into()))?;

        let records = result
            .get("records")
            .and_then(Value::as_array)
            .ok_or_else(|| ExecutionError::MalformedResponse("missing 'result.records'".into()))?
            .iter()
            .enumerate()
            .map(|(i, rec)| {
                rec.as_object().cloned().ok_or_else(|| {
                    ExecutionError::MalformedResponse(format!("record {} is not an object", i))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let columns = infer_columns(&records, result.get("types"));

        Ok(Self {
            payload,
            records,
            columns,
        })
    }

    /// The upstream body exactly as received.
    pub fn payload(&self) -> &Value {
        &self.payload
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn row_count(&self) -> usize {
        self.records.len()
    }
}

fn infer_columns(records: &[Record], types: Option<&Value>) -> Vec<Column> {
    let mut names: Vec<&str> = Vec::new();
    for record in records {
        for key in record.keys() {
            if !names.contains(&key.as_str()) {
                names.push(key);
            }
        }
    }

    let declared = declared_types(types);

    names
        .into_iter()
        .map(|name| {
            let kind = declared
                .iter()
                .find(|(n, _)| n == name)
                .map(|(_, k)| *k)
                .unwrap_or_else(|| {
                    let sample = records
                        .iter()
                        .filter_map(|r| r.get(name))
                        .find(|v| !v.is_null());
                    ColumnKind::infer(name, sample)
                });
            Column {
                name: name.to_string(),
                kind,
            }
        })
        .collect()
}

/// Column types declared by the engine under `result.types[].mappings`.
fn declared_types(types: Option<&Value>) -> Vec<(String, ColumnKind)> {
    let Some(entries) = types.and_then(Value::as_array) else {
        return Vec::new();
    };

    entries
        .iter()
        .filter_map(|entry| entry.get("mappings").and_then(Value::as_object))
        .flat_map(|mappings| mappings.iter())
        .filter_map(|(name, mapping)| {
            mapping
                .get("type")
                .and_then(Value::as_str)
                .map(|t| (name.clone(), ColumnKind::from_engine_type(t)))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_query_request_rejects_empty() {
        assert_eq!(
            QueryRequest::new("   ", "now()-1h", "now()"),
            Err(RequestError::EmptyQuery)
        );

        let req = QueryRequest::new("fetch logs", "now()-1h", "now()").unwrap();
        assert_eq!(req.query(), "fetch logs");
        assert_eq!(req.range_start(), "now()-1h");
        assert_eq!(req.range_end(), "now()");
    }

    #[test]
    fn test_raw_result_infers_columns() {
        let payload = json!({
            "status": "SUCCEEDED",
            "result": {
                "records": [
                    {"timestamp": "2024-05-01T10:00:00Z", "host": "a", "count": 3},
                    {"timestamp": "2024-05-01T10:01:00Z", "host": "b", "count": 5, "end_time": null}
                ]
            }
        });

        let result = RawResult::from_payload(payload.clone()).unwrap();
        assert_eq!(result.row_count(), 2);
        assert_eq!(result.payload(), &payload);

        let kinds: Vec<_> = result
            .columns()
            .iter()
            .map(|c| (c.name.as_str(), c.kind))
            .collect();
        assert_eq!(
            kinds,
            vec![
                ("timestamp", ColumnKind::Time),
                ("host", ColumnKind::String),
                ("count", ColumnKind::Number),
                ("end_time", ColumnKind::Time),
            ]
        );
    }

    #[test]
    fn test_declared_types_override_inference() {
        let payload = json!({
            "result": {
                "records": [{"ts": "1714557600000", "bytes": "42"}],
                "types": [{
                    "indexRange": [0, 0],
                    "mappings": {
                        "ts": {"type": "timestamp"},
                        "bytes": {"type": "long"}
                    }
                }]
            }
        });

        let result = RawResult::from_payload(payload).unwrap();
        assert_eq!(result.column("ts").unwrap().kind, ColumnKind::Time);
        assert_eq!(result.column("bytes").unwrap().kind, ColumnKind::Number);
    }

    #[test]
    fn test_malformed_payloads() {
        let missing_result = RawResult::from_payload(json!({"status": "SUCCEEDED"}));
        assert!(matches!(
            missing_result,
            Err(ExecutionError::MalformedResponse(_))
        ));

        let missing_records = RawResult::from_payload(json!({"result": {}}));
        assert!(matches!(
            missing_records,
            Err(ExecutionError::MalformedResponse(_))
        ));

        let bad_record = RawResult::from_payload(json!({"result": {"records": [1]}}));
        assert!(matches!(bad_record, Err(ExecutionError::MalformedResponse(_))));
    }

    #[test]
    fn test_empty_records() {
        let result = RawResult::from_payload(json!({"result": {"records": []}})).unwrap();
        assert_eq!(result.row_count(), 0);
        assert!(result.columns().is_empty());
    }
}
