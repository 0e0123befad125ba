//! Headless rookbook client.
//!
//! Connects to a book server, optionally submits edits and actions, and
//! logs what the server pushes back.
//!
//! Usage:
//!   # Watch a local server until Ctrl-C
//!   cargo run -p rookbook-cli
//!
//!   # Set a table cell and exit once the server has applied it
//!   cargo run -p rookbook-cli -- --set 't1/5/name="Bob"' --wait-acks
//!
//!   # Delete a row
//!   cargo run -p rookbook-cli -- --action 't1={"type":"delete","id":5}'

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::Parser;
use rookbook_client::{ClientConfig, ClientEvent, ClientHandle, connect_websocket};
use rookbook_overlay::Path;
use serde_json::Value;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};
use tracing_subscriber::{EnvFilter, fmt};

/// Headless client for a rookbook server.
#[derive(Parser, Debug)]
#[command(name = "rookbook")]
#[command(about = "Headless client for a rookbook server")]
struct Args {
    /// RON config file; defaults are used if it does not exist
    #[arg(short, long, default_value = "rookbook.ron")]
    config: PathBuf,

    /// Server WebSocket URL (overrides the config file)
    #[arg(long)]
    url: Option<String>,

    /// Refuse to send edits, actions and document commands
    #[arg(long)]
    read_only: bool,

    /// Edit to submit, as PATH=JSON (path segments joined by '/')
    #[arg(long = "set", value_name = "PATH=JSON", value_parser = parse_assignment)]
    sets: Vec<Assignment>,

    /// Action to submit, as PATH=JSON
    #[arg(long = "action", value_name = "PATH=JSON", value_parser = parse_assignment)]
    actions: Vec<Assignment>,

    /// Exit once every submitted edit has been acknowledged
    #[arg(long)]
    wait_acks: bool,
}

#[derive(Debug, Clone)]
struct Assignment {
    path: Path,
    value: Value,
}

/// Split `PATH=JSON` at the first `=`.
fn parse_assignment(text: &str) -> Result<Assignment, String> {
    let (path, json) = text
        .split_once('=')
        .ok_or_else(|| format!("expected PATH=JSON, got {text:?}"))?;
    let path = Path::parse_escaped(path.trim_start_matches('/'));
    if path.is_root() {
        return Err("path must not be empty".to_string());
    }
    let value = serde_json::from_str(json)
        .map_err(|e| format!("invalid JSON for {path} ({e}); quote strings, e.g. '\"Bob\"'"))?;
    Ok(Assignment { path, value })
}

fn log_event(event: ClientEvent) {
    match event {
        ClientEvent::Document { markup } => info!(bytes = markup.len(), "document received"),
        ClientEvent::DataRefreshed { id } => info!(%id, "widget data refreshed"),
        ClientEvent::Acknowledged { epoch, still_pending } => info!(%epoch, still_pending, "acknowledged"),
        ClientEvent::EditRejected { path, reason } => match path {
            Some(path) => warn!(%path, %reason, "edit rejected"),
            None => warn!(%reason, "command rejected"),
        },
        ClientEvent::Ignored { kind } => debug!(%kind, "ignored server message"),
        ClientEvent::Disconnected { reason } => info!(%reason, "disconnected"),
    }
}

async fn submit_all(client: &ClientHandle, args: &Args) -> Result<()> {
    for Assignment { path, value } in &args.sets {
        let epoch = client
            .submit_edit_confirmed(path.clone(), value.clone())
            .await
            .with_context(|| format!("submitting edit at {path}"))?;
        info!(%path, %epoch, "edit submitted");
    }
    for Assignment { path, value } in &args.actions {
        client
            .submit_action_confirmed(path.clone(), value.clone())
            .await
            .with_context(|| format!("submitting action at {path}"))?;
        info!(%path, "action submitted");
    }
    Ok(())
}

async fn run(client: ClientHandle, args: &Args) -> Result<()> {
    let mut events = client.subscribe_events();
    let mut state_rx = client.subscribe_state();
    submit_all(&client, args).await?;

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        if args.wait_acks && client.latest().pending().is_empty() {
            info!("all edits acknowledged");
            return Ok(());
        }

        tokio::select! {
            _ = &mut ctrl_c => {
                info!("interrupted");
                return Ok(());
            }
            event = events.recv() => match event {
                Ok(ClientEvent::Disconnected { reason }) => {
                    let pending = client.latest().pending().pending_count();
                    if args.wait_acks && pending > 0 {
                        bail!("disconnected ({reason}) with {pending} edit(s) unacknowledged");
                    }
                    info!(%reason, "disconnected");
                    return Ok(());
                }
                Ok(event) => log_event(event),
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "event stream lagged"),
                Err(RecvError::Closed) => return Ok(()),
            },
            changed = state_rx.changed() => {
                if changed.is_err() {
                    return Ok(());
                }
                let state = state_rx.borrow_and_update().clone();
                debug!(
                    widgets = state.confirmed_ids().count(),
                    pending = state.pending().pending_count(),
                    next_epoch = %state.next_epoch(),
                    "state updated"
                );
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = ClientConfig::load_or_default(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;
    if let Some(url) = &args.url {
        config.url = url.clone();
    }
    if args.read_only {
        config.editable = false;
    }

    // Logs go to stderr; RUST_LOG wins over the config file
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_filter));
    fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

    info!(url = %config.url, editable = config.editable, "connecting");
    let client = connect_websocket(&config)
        .await
        .with_context(|| format!("connecting to {}", config.url))?;

    run(client, &args).await
}
