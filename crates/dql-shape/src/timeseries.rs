use chrono::{DateTime, NaiveDateTime};
use dql_core::{RawResult, Record};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;

/// Epoch values below this are taken to be seconds.
const EPOCH_MS_THRESHOLD: f64 = 1e12;

/// Columns that select and group the points of a timeseries
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeseriesParams {
    pub time_column: String,
    pub value_column: String,
    pub label_column: Option<String>,
}

impl TimeseriesParams {
    pub fn new(time_column: impl Into<String>, value_column: impl Into<String>) -> Self {
        Self {
            time_column: time_column.into(),
            value_column: value_column.into(),
            label_column: None,
        }
    }

    pub fn with_label(mut self, label_column: impl Into<String>) -> Self {
        self.label_column = Some(label_column.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrameField {
    pub name: &'static str,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub values: Vec<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Frame {
    pub name: String,
    pub fields: Vec<FrameField>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeseriesResponse {
    pub schema: &'static str,
    pub frames: Vec<Frame>,
}

/// Normalise a timestamp cell to epoch milliseconds.
///
/// Accepts epoch seconds or milliseconds, RFC 3339 strings, and zone-less
/// ISO strings (read as UTC).
pub fn to_epoch_ms(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => {
            let ts = n.as_f64()?;
            if ts < EPOCH_MS_THRESHOLD {
                Some((ts * 1000.0) as i64)
            } else {
                Some(ts as i64)
            }
        }
        Value::String(s) => parse_iso(s),
        _ => None,
    }
}

fn parse_iso(s: &str) -> Option<i64> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.timestamp_millis());
    }

    let whole_seconds = s.split('.').next().unwrap_or(s);
    ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(whole_seconds, fmt).ok())
        .map(|naive| naive.and_utc().timestamp_millis())
}

fn series_name(record: &Record, label: Option<&str>) -> String {
    match label.filter(|column| !column.is_empty()) {
        None => "series".to_string(),
        Some(column) => match record.get(column) {
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => "null".to_string(),
        },
    }
}

/// Group records into one frame per label value.
///
/// Frames appear in the order their label is first seen; points within a
/// frame are sorted by time. Rows whose time does not parse, or whose value is
/// null or missing, are dropped. An empty label column means no grouping.
pub fn to_timeseries(result: &RawResult, params: &TimeseriesParams) -> TimeseriesResponse {
    let mut order: Vec<String> = Vec::new();
    let mut series: HashMap<String, Vec<(i64, Value)>> = HashMap::new();

    for record in result.records() {
        let Some(ts) = record.get(&params.time_column).and_then(to_epoch_ms) else {
            continue;
        };
        let value = match record.get(&params.value_column) {
            Some(v) if !v.is_null() => v.clone(),
            _ => continue,
        };

        let name = series_name(record, params.label_column.as_deref());
        series
            .entry(name.clone())
            .or_insert_with(|| {
                order.push(name);
                Vec::new()
            })
            .push((ts, value));
    }

    let frames = order
        .into_iter()
        .map(|name| {
            let mut points = series.remove(&name).unwrap_or_default();
            points.sort_by_key(|(ts, _)| *ts);
            let (times, values): (Vec<_>, Vec<_>) =
                points.into_iter().map(|(ts, v)| (Value::from(ts), v)).unzip();

            Frame {
                name,
                fields: vec![
                    FrameField {
                        name: "Time",
                        kind: "time",
                        values: times,
                    },
                    FrameField {
                        name: "Value",
                        kind: "number",
                        values,
                    },
                ],
            }
        })
        .collect();

    TimeseriesResponse {
        schema: "grafana-timeseries",
        frames,
    }
}
