//! Client state: confirmed data, pending edits and the epoch counter.
//!
//! [`ClientState`] is an immutable snapshot. Every mutating operation
//! returns a new snapshot and the owner swaps it in; clones are cheap
//! because the confirmed cache and the overlay are shared structurally.
//!
//! ```text
//!   submit_edit(path, v)                       server
//!   ──────────────────▶  overlay[path] = (v, e) ──set{path,v,e}──▶
//!                        epoch e+1
//!                                              ◀──set-done{e'}───
//!   on_acknowledge(e')   prune epochs <= e'
//!                                              ◀──data{id,…}─────
//!   on_data_snapshot     cache[id] = (data, header)
//!
//!   read_field(path)     overlay ─▶ cache ─▶ fallback
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use rookbook_overlay::{Epoch, EpochCounter, OverlayView, Path, PendingEntry, PendingOverlay};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::ClientError;
use crate::protocol::{ClientMessage, ServerMessage};
use crate::transport::{Connection, Transport};
use crate::widget;

/// Confirmed snapshot of one widget, replaced wholesale on every push.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfirmedEntry {
    pub data: Value,
    pub header: Value,
}

/// Outcome of [`ClientState::apply`].
#[derive(Debug, Clone)]
pub enum Applied {
    /// The message produced a new snapshot.
    Updated(ClientState),
    /// Document markup for the rendering layer; state is unchanged.
    Document(String),
    /// Unknown message kind; logged and dropped.
    Ignored { kind: String },
}

/// Immutable client snapshot.
#[derive(Debug, Clone)]
pub struct ClientState {
    editable: bool,
    confirmed: Arc<HashMap<String, Arc<ConfirmedEntry>>>,
    pending: PendingOverlay,
    epochs: EpochCounter,
    connection: Connection,
}

impl Default for ClientState {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientState {
    /// Fresh, editable state with no transport attached.
    pub fn new() -> Self {
        Self {
            editable: true,
            confirmed: Arc::new(HashMap::new()),
            pending: PendingOverlay::new(),
            epochs: EpochCounter::new(),
            connection: Connection::new(),
        }
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn editable(&self) -> bool {
        self.editable
    }

    pub fn with_editable(&self, editable: bool) -> Self {
        Self { editable, ..self.clone() }
    }

    /// The epoch the next [`submit_edit`](Self::submit_edit) will use.
    pub fn next_epoch(&self) -> Epoch {
        self.epochs.current()
    }

    pub fn pending(&self) -> &PendingOverlay {
        &self.pending
    }

    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    /// Attach the outbound transport. Visible to every snapshot sharing
    /// this state's connection slot.
    pub fn attach(&self, transport: Arc<dyn Transport>) {
        self.connection.attach(transport);
    }

    pub fn confirmed(&self, id: &str) -> Option<&ConfirmedEntry> {
        self.confirmed.get(id).map(Arc::as_ref)
    }

    pub fn confirmed_ids(&self) -> impl Iterator<Item = &str> {
        self.confirmed.keys().map(String::as_str)
    }

    /// Confirmed value at `path`: widget id, then row `_id` (for row
    /// arrays) or object key for each further segment.
    pub fn confirmed_value(&self, path: &Path) -> Option<&Value> {
        let (id, rest) = path.split_first()?;
        let mut current = &self.confirmed.get(id)?.data;
        for segment in rest {
            current = widget::descend(current, segment)?;
        }
        Some(current)
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Value to display at `path`: a pending edit if there is one, else the
    /// confirmed value, else `fallback`.
    pub fn read_field<'a>(&'a self, path: &Path, fallback: &'a Value) -> Result<&'a Value, ClientError> {
        if let Some(entry) = self.pending.pending(path)? {
            return Ok(&entry.value);
        }
        Ok(self.confirmed_value(path).unwrap_or(fallback))
    }

    /// Like [`read_field`](Self::read_field) without a fallback.
    pub fn display_value(&self, path: &Path) -> Result<Option<&Value>, ClientError> {
        if let Some(entry) = self.pending.pending(path)? {
            return Ok(Some(&entry.value));
        }
        Ok(self.confirmed_value(path))
    }

    pub fn pending_entry(&self, path: &Path) -> Result<Option<&PendingEntry>, ClientError> {
        Ok(self.pending.pending(path)?)
    }

    /// Overlay projection rooted at the top of the document.
    pub fn pending_view(&self) -> OverlayView {
        self.pending.view()
    }

    /// Overlay projection for one top-level widget.
    pub fn scope(&self, segment: &str) -> Result<OverlayView, ClientError> {
        Ok(self.pending.scope(segment)?)
    }

    // =========================================================================
    // Outbound
    // =========================================================================

    fn send(&self, message: &ClientMessage) -> Result<(), ClientError> {
        let transport = self.connection.transport().ok_or(ClientError::NotConnected)?;
        transport.send(message)?;
        Ok(())
    }

    /// Optimistically set `path` to `value` and send it to the server.
    ///
    /// The overlay write is computed first, so a path that does not fit
    /// the overlay fails before anything is sent. If the send fails no new
    /// snapshot is produced; callers never observe one effect without the
    /// other.
    pub fn submit_edit(&self, path: &Path, value: Value) -> Result<ClientState, ClientError> {
        if !self.editable {
            return Err(ClientError::ReadOnly);
        }
        let epoch = self.epochs.current();
        let pending = self.pending.submit(path, value.clone(), epoch)?;
        self.send(&ClientMessage::Set { path: path.clone(), value, epoch })?;
        debug!(%path, %epoch, "edit submitted");
        Ok(Self {
            pending,
            epochs: self.epochs.advanced(),
            ..self.clone()
        })
    }

    /// Send a non-field command. No overlay change, no epoch consumed.
    pub fn submit_action(&self, path: &Path, payload: Value) -> Result<(), ClientError> {
        if !self.editable {
            return Err(ClientError::ReadOnly);
        }
        self.send(&ClientMessage::Action { path: path.clone(), value: payload })?;
        debug!(%path, "action submitted");
        Ok(())
    }

    /// Send a document-structure command (`doc-*`).
    pub fn send_message(&self, message: &ClientMessage) -> Result<(), ClientError> {
        if !self.editable {
            return Err(ClientError::ReadOnly);
        }
        self.send(message)?;
        debug!(kind = message.kind(), "message sent");
        Ok(())
    }

    // =========================================================================
    // Inbound
    // =========================================================================

    /// Drop every pending edit the server has applied.
    pub fn on_acknowledge(&self, server_epoch: Epoch) -> ClientState {
        let pending = self.pending.prune_acknowledged(server_epoch);
        debug!(
            %server_epoch,
            before = self.pending.pending_count(),
            after = pending.pending_count(),
            "acknowledged"
        );
        Self { pending, ..self.clone() }
    }

    /// Replace the confirmed snapshot for widget `id`.
    pub fn on_data_snapshot(&self, id: impl Into<String>, data: Value, header: Value) -> ClientState {
        let id = id.into();
        let mut confirmed = HashMap::clone(&self.confirmed);
        debug!(%id, "confirmed data refreshed");
        confirmed.insert(id, Arc::new(ConfirmedEntry { data, header }));
        Self {
            confirmed: Arc::new(confirmed),
            ..self.clone()
        }
    }

    /// Route one inbound message.
    pub fn apply(&self, message: ServerMessage) -> Applied {
        match message {
            ServerMessage::Data { id, data, header } => Applied::Updated(self.on_data_snapshot(id, data, header)),
            ServerMessage::SetDone { epoch } => Applied::Updated(self.on_acknowledge(epoch)),
            ServerMessage::Document { data } => {
                info!(bytes = data.len(), "document markup received");
                Applied::Document(data)
            }
            ServerMessage::Unknown { kind } => {
                warn!(%kind, "ignoring unknown server message");
                Applied::Ignored { kind }
            }
        }
    }
}
