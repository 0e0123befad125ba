//! Helpers over confirmed widget snapshots.
//!
//! The client cache stays schema-agnostic JSON; these helpers read the
//! shapes the server actually sends:
//!
//! - table header: `{"columns": [["id", {"type_node": "<int/>"}], …]}`
//! - table data: `[{"_id": 1, "col": …}, …]`

use serde_json::Value;

/// One column of a table or table view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnInfo {
    pub id: String,
    /// Serialized XML of the column's type element, e.g. `<int/>`.
    pub type_node: String,
}

/// Ordered column list of a table widget.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableHeader {
    pub columns: Vec<ColumnInfo>,
}

impl TableHeader {
    /// Parse a header pushed with a `data` message.
    ///
    /// Returns `None` when `header` is not a table header (e.g. `null` for
    /// variables). Malformed column entries are skipped.
    pub fn from_value(header: &Value) -> Option<Self> {
        let columns = header.get("columns")?.as_array()?;
        let columns = columns
            .iter()
            .filter_map(|entry| {
                let pair = entry.as_array()?;
                let id = pair.first()?.as_str()?;
                let type_node = pair.get(1)?.get("type_node")?.as_str()?;
                Some(ColumnInfo { id: id.to_string(), type_node: type_node.to_string() })
            })
            .collect();
        Some(Self { columns })
    }

    pub fn column(&self, id: &str) -> Option<&ColumnInfo> {
        self.columns.iter().find(|c| c.id == id)
    }
}

/// A row's `_id` as a path segment.
pub fn row_id(row: &Value) -> Option<String> {
    segment_of(row.get("_id")?)
}

/// Render a scalar JSON value as a path segment.
pub(crate) fn segment_of(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Find the row whose `_id` renders as `segment`.
pub fn find_row<'a>(rows: &'a Value, segment: &str) -> Option<&'a Value> {
    rows.as_array()?
        .iter()
        .find(|row| row_id(row).as_deref() == Some(segment))
}

/// One step into a confirmed value: row `_id` for row arrays, key for
/// objects. Scalars have no children.
pub fn descend<'a>(value: &'a Value, segment: &str) -> Option<&'a Value> {
    match value {
        Value::Array(_) => find_row(value, segment),
        Value::Object(fields) => fields.get(segment),
        _ => None,
    }
}

/// Id for the placeholder "new row" at the bottom of a table: one past
/// the last row's `_id`, or 1 for an empty table.
pub fn next_new_row_id(rows: &Value) -> u64 {
    rows.as_array()
        .and_then(|rows| rows.last())
        .and_then(|row| row.get("_id"))
        .and_then(Value::as_u64)
        .map_or(1, |last| last.saturating_add(1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_table_header_from_server_shape() {
        let header = json!({"columns": [
            ["n1", {"type_node": "<int/>"}],
            ["n2", {"type_node": "<string/>"}],
            ["broken"],
        ]});
        let parsed = TableHeader::from_value(&header).unwrap();
        assert_eq!(parsed.columns.len(), 2);
        assert_eq!(parsed.columns[0], ColumnInfo { id: "n1".into(), type_node: "<int/>".into() });
        assert_eq!(parsed.column("n2").unwrap().type_node, "<string/>");
        assert!(TableHeader::from_value(&Value::Null).is_none());
    }

    #[test]
    fn test_row_lookup_by_id() {
        let rows = json!([{"_id": 1, "name": "a"}, {"_id": "x", "name": "b"}]);
        assert_eq!(find_row(&rows, "1").unwrap()["name"], "a");
        assert_eq!(find_row(&rows, "x").unwrap()["name"], "b");
        assert!(find_row(&rows, "2").is_none());
        assert!(find_row(&json!({"not": "rows"}), "1").is_none());
    }

    #[test]
    fn test_descend_rows_and_objects() {
        let rows = json!([{"_id": 3, "cell": {"x": 1}}]);
        let row = descend(&rows, "3").unwrap();
        assert_eq!(descend(descend(row, "cell").unwrap(), "x"), Some(&json!(1)));
        assert!(descend(&json!(5), "x").is_none());
    }

    #[test]
    fn test_next_new_row_id() {
        assert_eq!(next_new_row_id(&json!([])), 1);
        assert_eq!(next_new_row_id(&json!([{"_id": 1}, {"_id": 7}])), 8);
        assert_eq!(next_new_row_id(&Value::Null), 1);
        assert_eq!(next_new_row_id(&json!([{"_id": u64::MAX}])), u64::MAX);
    }
}
