//! Wire protocol between the book server and the client.
//!
//! Messages are JSON text frames tagged by a `"type"` field.
//!
//! ```text
//! client → server   set            { path, value, epoch }   optimistic field edit
//!                   action         { path, value }          row delete etc., no preview
//!                   doc-set-text   { selector, new_value }  document markup edits
//!                   doc-delete     { selector }
//!                   doc-add        { selector, xml }
//!                   doc-add-widget { parentId, element }
//!
//! server → client   document       { data }                 full markup (rendering only)
//!                   data           { id, data, header }     confirmed widget snapshot
//!                   set-done       { epoch }                edits up to epoch applied
//! ```

use std::fmt::Write as _;

use rookbook_overlay::{Epoch, Path};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::{AsRefStr, Display, EnumIter, EnumString};
use thiserror::Error;

// ============================================================================
// Outbound
// ============================================================================

/// Messages the client sends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ClientMessage {
    /// Set a field; acknowledged later by `set-done` for `epoch`.
    Set { path: Path, value: Value, epoch: Epoch },
    /// Non-field command addressed to a path (e.g. `{"type": "delete"}` on a row).
    Action { path: Path, value: Value },
    /// Replace the text content of the element matched by `selector`.
    DocSetText { selector: String, new_value: String },
    /// Remove the element matched by `selector`.
    DocDelete { selector: String },
    /// Append `xml` under the element matched by `selector`.
    DocAdd { selector: String, xml: String },
    /// Append a fresh widget of kind `element` to a layout.
    DocAddWidget {
        #[serde(rename = "parentId")]
        parent_id: String,
        element: WidgetKind,
    },
}

impl ClientMessage {
    /// The `type` tag, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            ClientMessage::Set { .. } => "set",
            ClientMessage::Action { .. } => "action",
            ClientMessage::DocSetText { .. } => "doc-set-text",
            ClientMessage::DocDelete { .. } => "doc-delete",
            ClientMessage::DocAdd { .. } => "doc-add",
            ClientMessage::DocAddWidget { .. } => "doc-add-widget",
        }
    }

    pub fn encode(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Replace the text of the `text` widget `id`.
    pub fn set_text(id: &str, new_value: impl Into<String>) -> Self {
        ClientMessage::DocSetText { selector: id_selector(id), new_value: new_value.into() }
    }

    /// Delete column `column_id` from table `table_id`.
    pub fn delete_column(table_id: &str, column_id: &str) -> Self {
        ClientMessage::DocDelete { selector: child_id_selector(table_id, column_id) }
    }

    /// Add a placeholder column to a `table` or `table-view` widget.
    ///
    /// Data tables get a string column; views get a computed column.
    /// Returns `None` for widget kinds without columns.
    pub fn add_column(kind: WidgetKind, table_id: &str) -> Option<Self> {
        let xml = match kind {
            WidgetKind::Table => r#"<data-col id="column1"><string/></data-col>"#,
            WidgetKind::TableView => r#"<computed-col id="column1"><python>None</python></computed-col>"#,
            _ => return None,
        };
        Some(ClientMessage::DocAdd {
            selector: format!("{kind}{}", id_selector(table_id)),
            xml: xml.to_string(),
        })
    }

    pub fn add_widget(parent_id: impl Into<String>, element: WidgetKind) -> Self {
        ClientMessage::DocAddWidget { parent_id: parent_id.into(), element }
    }
}

/// Widget element names understood by the server.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, EnumIter, AsRefStr,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum WidgetKind {
    Text,
    Table,
    TableView,
    Variable,
    VariableView,
}

impl WidgetKind {
    pub fn has_columns(self) -> bool {
        matches!(self, WidgetKind::Table | WidgetKind::TableView)
    }
}

// ============================================================================
// Inbound
// ============================================================================

/// Messages the server pushes. Decode-only.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ServerMessage {
    /// Full document markup. Consumed by the rendering layer only.
    Document { data: String },
    /// Confirmed snapshot of one widget's data and schema header.
    Data {
        id: String,
        #[serde(default)]
        data: Value,
        #[serde(default)]
        header: Value,
    },
    /// Every edit with `epoch <= epoch` has been applied.
    SetDone { epoch: Epoch },
    /// A `type` this client does not know. Logged and ignored.
    #[serde(skip_deserializing)]
    Unknown { kind: String },
}

const KNOWN_SERVER_KINDS: &[&str] = &["document", "data", "set-done"];

impl ServerMessage {
    /// Decode one text frame.
    ///
    /// Frames with an unrecognised `type` decode to [`ServerMessage::Unknown`]
    /// rather than failing.
    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        let raw: Value = serde_json::from_str(text)?;
        let kind = raw
            .get("type")
            .and_then(Value::as_str)
            .ok_or(ProtocolError::MissingType)?;
        if !KNOWN_SERVER_KINDS.contains(&kind) {
            return Ok(ServerMessage::Unknown { kind: kind.to_string() });
        }
        Ok(serde_json::from_value(raw)?)
    }

    pub fn kind(&self) -> &str {
        match self {
            ServerMessage::Document { .. } => "document",
            ServerMessage::Data { .. } => "data",
            ServerMessage::SetDone { .. } => "set-done",
            ServerMessage::Unknown { kind } => kind,
        }
    }
}

/// Errors decoding or encoding frames.
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("invalid JSON frame: {0}")]
    Json(#[from] serde_json::Error),
    #[error("frame has no string \"type\" field")]
    MissingType,
}

// ============================================================================
// Selectors
// ============================================================================

/// Quote `value` as a CSS string literal.
pub fn escape_css_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for ch in value.chars() {
        match ch {
            '"' | '\\' => {
                out.push('\\');
                out.push(ch);
            }
            c if c.is_control() => {
                let _ = write!(out, "\\{:x} ", c as u32);
            }
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// `[id="…"]`
pub fn id_selector(id: &str) -> String {
    format!("[id={}]", escape_css_value(id))
}

/// `[id="parent"] > [id="child"]`
pub fn child_id_selector(parent_id: &str, child_id: &str) -> String {
    format!("{} > {}", id_selector(parent_id), id_selector(child_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_set_message_wire_shape() {
        let msg = ClientMessage::Set {
            path: Path::from(["t1", "5", "name"]),
            value: json!("Bob"),
            epoch: Epoch(3),
        };
        let wire: Value = serde_json::from_str(&msg.encode().unwrap()).unwrap();
        assert_eq!(
            wire,
            json!({"type": "set", "path": ["t1", "5", "name"], "value": "Bob", "epoch": 3})
        );
    }

    #[test]
    fn test_action_and_doc_messages_wire_shape() {
        let action = ClientMessage::Action { path: Path::from(["t1", "5"]), value: json!({"type": "delete"}) };
        assert_eq!(
            serde_json::to_value(&action).unwrap(),
            json!({"type": "action", "path": ["t1", "5"], "value": {"type": "delete"}})
        );

        let add = ClientMessage::add_widget("sheet1", WidgetKind::TableView);
        assert_eq!(
            serde_json::to_value(&add).unwrap(),
            json!({"type": "doc-add-widget", "parentId": "sheet1", "element": "table-view"})
        );

        let text = ClientMessage::set_text("intro", "hello");
        assert_eq!(
            serde_json::to_value(&text).unwrap(),
            json!({"type": "doc-set-text", "selector": "[id=\"intro\"]", "new_value": "hello"})
        );
    }

    #[test]
    fn test_delete_column_targets_child_of_table() {
        let msg = ClientMessage::delete_column("t1", "n2");
        assert_eq!(
            serde_json::to_value(&msg).unwrap(),
            json!({"type": "doc-delete", "selector": "[id=\"t1\"] > [id=\"n2\"]"})
        );
    }

    #[test]
    fn test_add_column_depends_on_widget_kind() {
        let ClientMessage::DocAdd { selector, xml } = ClientMessage::add_column(WidgetKind::Table, "t1").unwrap()
        else {
            panic!("expected doc-add");
        };
        assert_eq!(selector, "table[id=\"t1\"]");
        assert!(xml.starts_with("<data-col"));

        let ClientMessage::DocAdd { selector, xml } =
            ClientMessage::add_column(WidgetKind::TableView, "v1").unwrap()
        else {
            panic!("expected doc-add");
        };
        assert_eq!(selector, "table-view[id=\"v1\"]");
        assert!(xml.starts_with("<computed-col"));

        assert!(ClientMessage::add_column(WidgetKind::Variable, "x").is_none());
    }

    #[test]
    fn test_decode_known_server_messages() {
        let msg = ServerMessage::decode(r#"{"type": "set-done", "epoch": 4}"#).unwrap();
        assert_eq!(msg, ServerMessage::SetDone { epoch: Epoch(4) });

        let msg = ServerMessage::decode(
            r#"{"type": "data", "id": "t1", "data": [{"_id": 1, "n1": 5}], "header": {"columns": []}}"#,
        )
        .unwrap();
        assert!(matches!(msg, ServerMessage::Data { ref id, .. } if id == "t1"));

        let msg = ServerMessage::decode(r#"{"type": "data", "id": "v", "data": null, "header": null}"#).unwrap();
        assert_eq!(msg, ServerMessage::Data { id: "v".into(), data: Value::Null, header: Value::Null });

        let msg = ServerMessage::decode(r#"{"type": "document", "data": "<rookbook/>"}"#).unwrap();
        assert_eq!(msg.kind(), "document");
    }

    #[test]
    fn test_decode_unknown_kind_is_not_an_error() {
        let msg = ServerMessage::decode(r#"{"type": "presence", "who": "amy"}"#).unwrap();
        assert_eq!(msg, ServerMessage::Unknown { kind: "presence".into() });
    }

    #[test]
    fn test_decode_rejects_malformed_frames() {
        assert!(matches!(ServerMessage::decode("not json"), Err(ProtocolError::Json(_))));
        assert!(matches!(ServerMessage::decode(r#"{"epoch": 1}"#), Err(ProtocolError::MissingType)));
        assert!(matches!(ServerMessage::decode(r#"{"type": "set-done"}"#), Err(ProtocolError::Json(_))));
    }

    #[test]
    fn test_escape_css_value() {
        assert_eq!(escape_css_value("plain"), "\"plain\"");
        assert_eq!(escape_css_value(r#"a"b\c"#), r#""a\"b\\c""#);
        assert_eq!(escape_css_value("x\ny"), "\"x\\a y\"");
        assert_eq!(child_id_selector("t", "c"), r#"[id="t"] > [id="c"]"#);
    }

    #[test]
    fn test_widget_kind_names() {
        assert_eq!(WidgetKind::VariableView.to_string(), "variable-view");
        assert_eq!("table-view".parse::<WidgetKind>().unwrap(), WidgetKind::TableView);
        assert!(WidgetKind::Table.has_columns());
        assert!(!WidgetKind::Text.has_columns());
    }
}
