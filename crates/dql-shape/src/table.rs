use dql_core::{is_time_like, RawResult};
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableColumn {
    pub text: String,
}

/// Grafana table frame
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableResponse {
    pub schema: &'static str,
    pub columns: Vec<TableColumn>,
    pub rows: Vec<Vec<Value>>,
}

/// Lay out every record as a row.
///
/// Time-like columns come first, the rest alphabetically. A record without a
/// column gets `null` in that cell.
pub fn to_table(result: &RawResult) -> TableResponse {
    let mut names: Vec<&str> = result.columns().iter().map(|c| c.name.as_str()).collect();
    names.sort_by_key(|name| (!is_time_like(name), *name));

    let rows = result
        .records()
        .iter()
        .map(|record| {
            names
                .iter()
                .map(|name| record.get(*name).cloned().unwrap_or(Value::Null))
                .collect()
        })
        .collect();

    TableResponse {
        schema: "grafana-table",
        columns: names
            .into_iter()
            .map(|name| TableColumn {
                text: name.to_string(),
            })
            .collect(),
        rows,
    }
}
