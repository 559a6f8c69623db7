use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;

use logpanel_controller::{
    ChannelSurface, Config, PanelStateStore, Push, Request, RunnerOptions, SourceHandle,
    open_source, spawn_source,
};
use logpanel_types::SourceKind;

/// Logpanel - live, searchable views over growing log files
///
/// Requests are read from stdin as JSON lines carrying a "source" field
/// ("client" or "server"); pushes are written to stdout the same way.
#[derive(Parser, Debug)]
#[command(name = "logpanel")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the TOML config file
    #[arg(short, long, default_value = "logpanel.toml")]
    config: PathBuf,

    /// Directory for history, cleared offsets and panel state
    #[arg(long)]
    storage_dir: Option<PathBuf>,

    /// Client log path or glob (overrides the config file)
    #[arg(long)]
    client: Option<String>,

    /// Server log path or glob (overrides the config file)
    #[arg(long)]
    server: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Logs go to stderr; stdout carries the protocol
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let result = run(args).await;

    if let Err(e) = &result {
        eprintln!("Error: {:#}", e);
    }

    result
}

async fn run(args: Args) -> Result<()> {
    let mut config = Config::load(&args.config)?;
    if let Some(dir) = args.storage_dir {
        config.storage_dir = Some(dir);
    }
    if let Some(client) = args.client {
        config.client_log_path = client;
    }
    if let Some(server) = args.server {
        config.server_log_path = server;
    }

    let panel = PanelStateStore::in_dir(&config.storage_dir());
    let (push_tx, push_rx) = mpsc::unbounded_channel::<(SourceKind, Push)>();

    let mut sources: HashMap<SourceKind, SourceHandle> = HashMap::new();
    for kind in SourceKind::ALL {
        let controller = open_source(&config, kind, panel.clone())
            .with_context(|| format!("Failed to open {} log source", kind))?;
        let handle = spawn_source(controller, RunnerOptions::from(&config));
        handle.attach(Arc::new(ChannelSurface::new(kind, push_tx.clone())));
        sources.insert(kind, handle);
    }
    drop(push_tx);

    let writer = tokio::spawn(write_pushes(push_rx));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted, shutting down");
                break;
            }

            line = lines.next_line() => {
                match line {
                    Ok(Some(line)) => dispatch(&sources, &line),
                    Ok(None) => {
                        tracing::info!("Input closed, shutting down");
                        break;
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Failed to read input");
                        break;
                    }
                }
            }
        }
    }

    futures::future::join_all(sources.into_values().map(SourceHandle::dispose)).await;
    writer.await.context("Output writer failed")??;

    Ok(())
}

/// Route one JSON request line to its source
fn dispatch(sources: &HashMap<SourceKind, SourceHandle>, line: &str) {
    let line = line.trim();
    if line.is_empty() {
        return;
    }

    let value: Value = match serde_json::from_str(line) {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!(error = %e, "Ignoring malformed request");
            return;
        }
    };

    let Some(kind) = value
        .get("source")
        .and_then(Value::as_str)
        .and_then(SourceKind::from_name)
    else {
        tracing::warn!("Ignoring request without a known source");
        return;
    };

    let request: Request = match serde_json::from_value(value) {
        Ok(request) => request,
        Err(e) => {
            tracing::warn!(source = %kind, error = %e, "Ignoring invalid request");
            return;
        }
    };

    if let Some(handle) = sources.get(&kind) {
        if !handle.send(request) {
            tracing::warn!(source = %kind, "Source stopped, dropping request");
        }
    }
}

/// Write every push to stdout as one JSON line tagged with its source
async fn write_pushes(mut rx: mpsc::UnboundedReceiver<(SourceKind, Push)>) -> Result<()> {
    let mut stdout = tokio::io::stdout();

    while let Some((kind, push)) = rx.recv().await {
        let mut value = serde_json::to_value(&push)?;
        if let Value::Object(map) = &mut value {
            map.insert("source".to_string(), Value::from(kind.as_str()));
        }

        let mut line = serde_json::to_vec(&value)?;
        line.push(b'\n');
        stdout.write_all(&line).await?;
        stdout.flush().await?;
    }

    Ok(())
}
