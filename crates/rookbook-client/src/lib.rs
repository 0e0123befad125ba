//! Rookbook client library
//!
//! Keeps a local picture of a book: confirmed widget data pushed by the
//! server plus an overlay of the user's unacknowledged edits, and talks
//! to the server over a WebSocket.
//!
//! Most callers use [`connect_websocket`] and then work through the
//! returned [`ClientHandle`]:
//!
//! ```no_run
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! use rookbook_client::{ClientConfig, connect_websocket};
//! use rookbook_overlay::Path;
//!
//! let client = connect_websocket(&ClientConfig::default()).await?;
//! let cell = client.field(&Path::from(["t1", "5", "name"]))?;
//! cell.set(serde_json::json!("Bob"))?;
//! # Ok(())
//! # }
//! ```

pub mod actor;
pub mod config;
pub mod constants;
pub mod error;
pub mod field;
pub mod protocol;
pub mod state;
pub mod transport;
pub mod websocket;
pub mod widget;

use std::sync::Arc;

pub use actor::{ActorError, ClientEvent, ClientHandle, spawn_client};
pub use config::{ClientConfig, ConfigError};
pub use error::ClientError;
pub use field::FieldHandle;
pub use protocol::{ClientMessage, ProtocolError, ServerMessage, WidgetKind};
pub use state::{Applied, ClientState, ConfirmedEntry};
pub use transport::{ChannelTransport, Connection, Transport, TransportError};
pub use websocket::WebSocketTransport;
pub use widget::{ColumnInfo, TableHeader};

/// Connect to the server named in `config` and return a running client.
///
/// Must be called within a tokio runtime.
pub async fn connect_websocket(config: &ClientConfig) -> Result<ClientHandle, ConnectError> {
    let handle = spawn_client(ClientState::new().with_editable(config.editable));
    let transport = WebSocketTransport::connect(&config.url, handle.clone()).await?;
    handle.attach(Arc::new(transport))?;
    Ok(handle)
}

#[derive(Debug, thiserror::Error)]
pub enum ConnectError {
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
    #[error("actor error: {0}")]
    Actor(#[from] ActorError),
}
