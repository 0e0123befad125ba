//! State-owning actor for the client.
//!
//! All mutations of [`ClientState`] happen on one task, in the order their
//! commands arrive, so the overlay and the epoch counter need no locking.
//! I/O tasks (the WebSocket reader) hand inbound messages over with
//! [`ClientHandle::deliver`] instead of touching state themselves.
//!
//! ```text
//!   ClientHandle (Clone+Send+Sync)   mpsc      ClientActor (tokio task)
//!   ┌──────────────────────────┐  ────────▶  ┌──────────────────────────┐
//!   │ .submit_edit()           │             │ ClientState snapshot     │
//!   │ .submit_action()         │             │   old ─▶ new per command │
//!   │ .deliver(ServerMessage)  │             └─────┬──────────────┬─────┘
//!   └──────────────────────────┘                   │ watch        │ broadcast
//!                                          latest snapshot   ClientEvent
//! ```

use std::sync::Arc;

use rookbook_overlay::{Epoch, Path};
use serde_json::Value;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tracing::{debug, info, warn};

use crate::constants::EVENT_CHANNEL_CAPACITY;
use crate::error::ClientError;
use crate::field::FieldHandle;
use crate::protocol::{ClientMessage, ServerMessage};
use crate::state::{Applied, ClientState};
use crate::transport::Transport;

// ============================================================================
// Error + Event Types
// ============================================================================

/// Errors from the actor system.
#[derive(Debug, Error)]
pub enum ActorError {
    #[error(transparent)]
    Client(#[from] ClientError),
    #[error("client actor shut down")]
    Shutdown,
}

/// Things the rendering layer may want to react to besides new snapshots.
#[derive(Clone, Debug, PartialEq)]
pub enum ClientEvent {
    /// Full document markup pushed by the server.
    Document { markup: String },
    /// Confirmed data for a widget was replaced.
    DataRefreshed { id: String },
    /// The server acknowledged edits up to `epoch`.
    Acknowledged { epoch: Epoch, still_pending: usize },
    /// An edit, action or document command was not sent.
    EditRejected { path: Option<Path>, reason: String },
    /// Server sent a message kind this client does not know.
    Ignored { kind: String },
    /// The transport went away. Pending edits stay displayed.
    Disconnected { reason: String },
}

// ============================================================================
// Commands (internal)
// ============================================================================

type Reply<T> = Option<oneshot::Sender<Result<T, ActorError>>>;

enum Command {
    SubmitEdit { path: Path, value: Value, reply: Reply<Epoch> },
    SubmitAction { path: Path, payload: Value, reply: Reply<()> },
    Send { message: ClientMessage, reply: Reply<()> },
    Deliver(ServerMessage),
    Attach(Arc<dyn Transport>),
    ConnectionLost(String),
    SetEditable(bool),
    Snapshot { reply: oneshot::Sender<ClientState> },
}

// ============================================================================
// ClientHandle (Send + Sync public API)
// ============================================================================

/// Handle to a running client actor.
///
/// Methods without `async` only enqueue and return immediately; failures
/// surface as [`ClientEvent::EditRejected`]. The `*_confirmed` variants wait
/// for the actor to process the command and return its result.
#[derive(Clone)]
pub struct ClientHandle {
    tx: mpsc::UnboundedSender<Command>,
    state_rx: watch::Receiver<ClientState>,
    event_tx: broadcast::Sender<ClientEvent>,
}

impl ClientHandle {
    fn enqueue(&self, command: Command) -> Result<(), ActorError> {
        self.tx.send(command).map_err(|_| ActorError::Shutdown)
    }

    // ── Edits ────────────────────────────────────────────────────────────

    /// Queue an optimistic edit.
    pub fn submit_edit(&self, path: Path, value: Value) -> Result<(), ActorError> {
        self.enqueue(Command::SubmitEdit { path, value, reply: None })
    }

    /// Submit an edit and wait for the epoch it was assigned.
    pub async fn submit_edit_confirmed(&self, path: Path, value: Value) -> Result<Epoch, ActorError> {
        let (reply, rx) = oneshot::channel();
        self.enqueue(Command::SubmitEdit { path, value, reply: Some(reply) })?;
        rx.await.map_err(|_| ActorError::Shutdown)?
    }

    /// Queue a non-field action (e.g. row delete).
    pub fn submit_action(&self, path: Path, payload: Value) -> Result<(), ActorError> {
        self.enqueue(Command::SubmitAction { path, payload, reply: None })
    }

    pub async fn submit_action_confirmed(&self, path: Path, payload: Value) -> Result<(), ActorError> {
        let (reply, rx) = oneshot::channel();
        self.enqueue(Command::SubmitAction { path, payload, reply: Some(reply) })?;
        rx.await.map_err(|_| ActorError::Shutdown)?
    }

    /// Queue a document-structure command.
    pub fn send_message(&self, message: ClientMessage) -> Result<(), ActorError> {
        self.enqueue(Command::Send { message, reply: None })
    }

    pub async fn send_message_confirmed(&self, message: ClientMessage) -> Result<(), ActorError> {
        let (reply, rx) = oneshot::channel();
        self.enqueue(Command::Send { message, reply: Some(reply) })?;
        rx.await.map_err(|_| ActorError::Shutdown)?
    }

    // ── Transport side ───────────────────────────────────────────────────

    /// Hand an inbound message to the actor.
    pub fn deliver(&self, message: ServerMessage) -> Result<(), ActorError> {
        self.enqueue(Command::Deliver(message))
    }

    pub fn attach(&self, transport: Arc<dyn Transport>) -> Result<(), ActorError> {
        self.enqueue(Command::Attach(transport))
    }

    /// Report that the transport closed.
    pub fn connection_lost(&self, reason: impl Into<String>) -> Result<(), ActorError> {
        self.enqueue(Command::ConnectionLost(reason.into()))
    }

    pub fn set_editable(&self, editable: bool) -> Result<(), ActorError> {
        self.enqueue(Command::SetEditable(editable))
    }

    // ── Observation ──────────────────────────────────────────────────────

    /// Latest published snapshot. May not yet reflect commands still queued.
    pub fn latest(&self) -> ClientState {
        self.state_rx.borrow().clone()
    }

    /// Snapshot after every command queued before this call was processed.
    pub async fn snapshot(&self) -> Result<ClientState, ActorError> {
        let (reply, rx) = oneshot::channel();
        self.enqueue(Command::Snapshot { reply })?;
        rx.await.map_err(|_| ActorError::Shutdown)
    }

    pub fn subscribe_state(&self) -> watch::Receiver<ClientState> {
        self.state_rx.clone()
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<ClientEvent> {
        self.event_tx.subscribe()
    }

    /// Read/write handle for `path` against the latest snapshot.
    pub fn field(&self, path: &Path) -> Result<FieldHandle, ClientError> {
        FieldHandle::at(&self.latest(), path, self.clone())
    }
}

// ============================================================================
// ClientActor (internal, owns the state)
// ============================================================================

struct ClientActor {
    state: ClientState,
    state_tx: watch::Sender<ClientState>,
    event_tx: broadcast::Sender<ClientEvent>,
}

fn respond<T>(reply: Reply<T>, result: Result<T, ClientError>) {
    if let Some(reply) = reply {
        let _ = reply.send(result.map_err(ActorError::from));
    }
}

impl ClientActor {
    fn publish(&mut self, next: ClientState) {
        self.state = next;
        self.state_tx.send_replace(self.state.clone());
    }

    fn emit(&self, event: ClientEvent) {
        // No subscribers is fine.
        let _ = self.event_tx.send(event);
    }

    fn reject(&self, path: Option<&Path>, err: &ClientError) {
        match path {
            Some(path) => warn!(%path, "rejected: {err}"),
            None => warn!("rejected: {err}"),
        }
        self.emit(ClientEvent::EditRejected { path: path.cloned(), reason: err.to_string() });
    }

    /// Process commands until every handle is dropped.
    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<Command>) {
        while let Some(cmd) = rx.recv().await {
            self.handle_command(cmd);
        }
        debug!("client actor shutting down: channel closed");
    }

    fn handle_command(&mut self, cmd: Command) {
        match cmd {
            Command::SubmitEdit { path, value, reply } => match self.state.submit_edit(&path, value) {
                Ok(next) => {
                    let epoch = self.state.next_epoch();
                    self.publish(next);
                    respond(reply, Ok(epoch));
                }
                Err(e) => {
                    self.reject(Some(&path), &e);
                    respond(reply, Err(e));
                }
            },
            Command::SubmitAction { path, payload, reply } => {
                let result = self.state.submit_action(&path, payload);
                if let Err(e) = &result {
                    self.reject(Some(&path), e);
                }
                respond(reply, result);
            }
            Command::Send { message, reply } => {
                let result = self.state.send_message(&message);
                if let Err(e) = &result {
                    self.reject(None, e);
                }
                respond(reply, result);
            }
            Command::Deliver(message) => self.handle_server_message(message),
            Command::Attach(transport) => {
                if transport.is_closed() {
                    warn!("not attaching a transport that is already closed");
                } else {
                    self.state.attach(transport);
                    info!("transport attached");
                }
            }
            Command::ConnectionLost(reason) => {
                self.state.connection().detach();
                warn!(%reason, pending = self.state.pending().pending_count(), "connection lost");
                self.emit(ClientEvent::Disconnected { reason });
            }
            Command::SetEditable(editable) => {
                let next = self.state.with_editable(editable);
                self.publish(next);
            }
            Command::Snapshot { reply } => {
                let _ = reply.send(self.state.clone());
            }
        }
    }

    fn handle_server_message(&mut self, message: ServerMessage) {
        let event = match &message {
            ServerMessage::Data { id, .. } => Some(ClientEvent::DataRefreshed { id: id.clone() }),
            _ => None,
        };
        let ack = match &message {
            ServerMessage::SetDone { epoch } => Some(*epoch),
            _ => None,
        };

        match self.state.apply(message) {
            Applied::Updated(next) => {
                self.publish(next);
                if let Some(epoch) = ack {
                    let still_pending = self.state.pending().pending_count();
                    info!(%epoch, still_pending, "edits acknowledged");
                    self.emit(ClientEvent::Acknowledged { epoch, still_pending });
                }
                if let Some(event) = event {
                    self.emit(event);
                }
            }
            Applied::Document(markup) => self.emit(ClientEvent::Document { markup }),
            Applied::Ignored { kind } => self.emit(ClientEvent::Ignored { kind }),
        }
    }
}

// ============================================================================
// Public spawn function
// ============================================================================

/// Spawn the client actor on the current tokio runtime.
///
/// `initial` is usually [`ClientState::new()`]; a transport can already be
/// attached to it or be attached later through the handle.
pub fn spawn_client(initial: ClientState) -> ClientHandle {
    let (tx, rx) = mpsc::unbounded_channel();
    let (state_tx, state_rx) = watch::channel(initial.clone());
    let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
    let actor = ClientActor { state: initial, state_tx, event_tx: event_tx.clone() };
    tokio::spawn(actor.run(rx));
    ClientHandle { tx, state_rx, event_tx }
}
