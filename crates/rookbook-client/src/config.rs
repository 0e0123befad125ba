//! Client configuration loaded from a `.ron` file.
//!
//! ```ron
//! (
//!     url: "ws://books.local:5000/websocket",
//!     editable: false,
//!     log_filter: "rookbook_client=debug,info",
//! )
//! ```
//!
//! Every field is optional; missing ones take the defaults below.

use std::path::Path as FsPath;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::constants::{DEFAULT_LOG_FILTER, default_url};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// WebSocket URL of the book server.
    pub url: String,
    /// When false the client refuses edits, actions and doc commands.
    pub editable: bool,
    /// `tracing` filter directive used when `RUST_LOG` is unset.
    pub log_filter: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            editable: true,
            log_filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

/// Errors loading a config file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("RON parse error: {0}")]
    Ron(#[from] ron::error::SpannedError),
}

impl ClientConfig {
    pub fn from_ron(text: &str) -> Result<Self, ConfigError> {
        Ok(ron::from_str(text)?)
    }

    pub fn load(path: impl AsRef<FsPath>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_ron(&text)
    }

    /// Load `path`, or return defaults if the file does not exist.
    /// A file that exists but fails to parse is still an error.
    pub fn load_or_default(path: impl AsRef<FsPath>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        match std::fs::read_to_string(path) {
            Ok(text) => Self::from_ron(&text),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no config file, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(e.into()),
        }
    }
}
