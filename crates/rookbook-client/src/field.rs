//! Per-field read/write handle for rendering code.
//!
//! A [`FieldHandle`] pins the overlay projection and confirmed value for
//! one path as of the snapshot it was built from. Writes go back through
//! the actor, so a handle never goes stale in a way that loses edits; it
//! only reads stale until the renderer builds a new one.

use rookbook_overlay::{OverlayView, Path, PendingEntry};
use serde_json::Value;

use crate::actor::{ActorError, ClientHandle};
use crate::error::ClientError;
use crate::state::ClientState;
use crate::widget;

#[derive(Clone)]
pub struct FieldHandle {
    view: OverlayView,
    confirmed: Option<Value>,
    handle: ClientHandle,
}

impl FieldHandle {
    /// Build a handle for `path` from `state`.
    ///
    /// Fails with a type mismatch when a pending leaf sits on a proper
    /// prefix of `path`.
    pub fn at(state: &ClientState, path: &Path, handle: ClientHandle) -> Result<Self, ClientError> {
        let view = state.pending().view_at(path)?;
        let confirmed = state.confirmed_value(path).cloned();
        Ok(Self { view, confirmed, handle })
    }

    pub fn path(&self) -> &Path {
        self.view.path()
    }

    /// Handle for a child segment (a row id, then a column id).
    pub fn scope(&self, segment: &str) -> Result<FieldHandle, ClientError> {
        let view = self.view.scope(segment)?;
        let confirmed = self
            .confirmed
            .as_ref()
            .and_then(|value| widget::descend(value, segment))
            .cloned();
        Ok(Self { view, confirmed, handle: self.handle.clone() })
    }

    /// Pending value, else confirmed value, else `fallback`.
    pub fn value<'a>(&'a self, fallback: &'a Value) -> &'a Value {
        match self.view.pending() {
            Some(entry) => &entry.value,
            None => self.confirmed.as_ref().unwrap_or(fallback),
        }
    }

    pub fn confirmed(&self) -> Option<&Value> {
        self.confirmed.as_ref()
    }

    pub fn pending(&self) -> Option<&PendingEntry> {
        self.view.pending()
    }

    /// True if this field or anything below it has an unacknowledged edit.
    pub fn is_dirty(&self) -> bool {
        self.view.has_pending()
    }

    pub fn set(&self, value: Value) -> Result<(), ActorError> {
        self.handle.submit_edit(self.path().clone(), value)
    }

    pub fn action(&self, payload: Value) -> Result<(), ActorError> {
        self.handle.submit_action(self.path().clone(), payload)
    }
}

impl std::fmt::Debug for FieldHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldHandle")
            .field("path", self.path())
            .field("pending", &self.pending().map(|e| e.epoch))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actor::spawn_client;
    use crate::protocol::{ClientMessage, ServerMessage};
    use crate::transport::ChannelTransport;
    use rookbook_overlay::{Epoch, OverlayError};
    use serde_json::json;
    use std::sync::Arc;

    async fn table_client() -> (ClientHandle, tokio::sync::mpsc::UnboundedReceiver<ClientMessage>) {
        let (transport, rx) = ChannelTransport::new();
        let handle = spawn_client(ClientState::new());
        handle.attach(Arc::new(transport)).unwrap();
        handle
            .deliver(ServerMessage::Data {
                id: "t1".into(),
                data: json!([{"_id": 5, "name": "Alice"}, {"_id": 6, "name": "Dan"}]),
                header: Value::Null,
            })
            .unwrap();
        handle.snapshot().await.unwrap();
        (handle, rx)
    }

    #[tokio::test]
    async fn test_scoped_reads_follow_rows_and_columns() {
        let (handle, _rx) = table_client().await;
        let table = handle.field(&Path::from(["t1"])).unwrap();
        let cell = table.scope("6").unwrap().scope("name").unwrap();
        assert_eq!(cell.path(), &Path::from(["t1", "6", "name"]));
        assert_eq!(cell.value(&json!("")), &json!("Dan"));
        assert!(!cell.is_dirty());

        let missing = table.scope("99").unwrap().scope("name").unwrap();
        assert_eq!(missing.value(&json!("")), &json!(""));
    }

    #[tokio::test]
    async fn test_set_goes_through_actor_and_shows_on_next_handle() {
        let (handle, mut rx) = table_client().await;
        let path = Path::from(["t1", "5", "name"]);
        let cell = handle.field(&path).unwrap();

        cell.set(json!("Bob")).unwrap();
        handle.snapshot().await.unwrap();
        assert_eq!(
            rx.recv().await.unwrap(),
            ClientMessage::Set { path: path.clone(), value: json!("Bob"), epoch: Epoch(0) }
        );

        // The old handle still shows the snapshot it was built from.
        assert_eq!(cell.value(&Value::Null), &json!("Alice"));
        let fresh = handle.field(&path).unwrap();
        assert_eq!(fresh.value(&Value::Null), &json!("Bob"));
        assert_eq!(fresh.pending().unwrap().epoch, Epoch(0));
        assert_eq!(fresh.confirmed(), Some(&json!("Alice")));

        let row = handle.field(&Path::from(["t1", "5"])).unwrap();
        assert!(row.is_dirty());
    }

    #[tokio::test]
    async fn test_scope_below_pending_leaf_is_rejected() {
        let (handle, _rx) = table_client().await;
        handle.field(&Path::from(["t1", "5"])).unwrap().set(json!({"name": "x"})).unwrap();
        handle.snapshot().await.unwrap();

        let row = handle.field(&Path::from(["t1", "5"])).unwrap();
        let err = row.scope("name").unwrap_err();
        assert!(matches!(err, ClientError::Overlay(OverlayError::TypeMismatch { .. })));
    }

    #[tokio::test]
    async fn test_action_sends_without_pending_entry() {
        let (handle, mut rx) = table_client().await;
        let table = handle.field(&Path::from(["t1"])).unwrap();
        table.action(json!({"type": "delete", "id": 5})).unwrap();
        handle.snapshot().await.unwrap();

        assert_eq!(rx.recv().await.unwrap().kind(), "action");
        assert!(handle.latest().pending().is_empty());
    }
}
