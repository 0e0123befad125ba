//! Client configuration constants.
//!
//! Centralizes hardcoded values for easier configuration and documentation.

/// Default book server host for local development.
pub const DEFAULT_HOST: &str = "localhost";

/// Default book server port.
pub const DEFAULT_PORT: u16 = 5000;

/// Path the server accepts WebSocket upgrades on.
pub const WEBSOCKET_PATH: &str = "/websocket";

/// Capacity of the client event broadcast channel. Slow subscribers that
/// fall further behind than this see `Lagged` and skip ahead.
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Default `tracing` filter when neither config nor `RUST_LOG` sets one.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Default server URL built from the constants above.
pub fn default_url() -> String {
    format!("ws://{DEFAULT_HOST}:{DEFAULT_PORT}{WEBSOCKET_PATH}")
}
