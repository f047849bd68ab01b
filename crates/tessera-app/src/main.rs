//! tessera: session/layout core of a multiplexing terminal emulator.
//!
//! Speaks newline-delimited JSON over stdio: the UI process writes one
//! request per line and reads replies and pushed terminal events back,
//! interleaved, one JSON object per line.

mod ipc;
mod service;

use std::path::PathBuf;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt};
use tokio::sync::mpsc;

use ipc::{PushEvent, Reply, Request};
use service::{home_dir, TerminalService};
use tessera_pty::{BridgeConfig, PtyBridge};

#[tokio::main]
async fn main() {
    env_logger::init();

    let default_cwd = home_dir().unwrap_or_else(|| PathBuf::from("."));
    let bridge = Arc::new(PtyBridge::new(BridgeConfig {
        shell: None, // resolve from TESSERA_SHELL / $SHELL
        default_cwd: default_cwd.clone(),
        ..BridgeConfig::default()
    }));
    let events = bridge.subscribe();
    let mut service = TerminalService::new(Arc::clone(&bridge), default_cwd);

    // All output goes through one writer task so reply and event lines
    // never interleave mid-line.
    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<String>();
    let writer = tokio::spawn(async move {
        let mut stdout = tokio::io::stdout();
        while let Some(line) = out_rx.recv().await {
            if stdout.write_all(line.as_bytes()).await.is_err() {
                return;
            }
            if stdout.write_all(b"\n").await.is_err() {
                return;
            }
            let _ = stdout.flush().await;
        }
    });

    // Pump PTY output/exit events to the UI as push messages.
    let event_tx = out_tx.clone();
    tokio::spawn(async move {
        let mut events = events;
        while let Some(event) = events.recv().await {
            match serde_json::to_string(&PushEvent::from(event)) {
                Ok(json) => {
                    if event_tx.send(json).is_err() {
                        return;
                    }
                }
                Err(e) => log::error!("failed to encode push event: {e}"),
            }
        }
    });

    // Serve requests until the UI closes stdin.
    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                let reply = match serde_json::from_str::<Request>(line) {
                    Ok(request) => service.handle(request),
                    Err(e) => Reply::err(format!("bad request: {e}")),
                };
                match serde_json::to_string(&reply) {
                    Ok(json) => {
                        if out_tx.send(json).is_err() {
                            break;
                        }
                    }
                    Err(e) => log::error!("failed to encode reply: {e}"),
                }
            }
            Ok(None) => break, // EOF, UI went away
            Err(e) => {
                log::error!("stdin read failed: {e}");
                break;
            }
        }
    }

    // Kill every remaining shell before exiting; no orphaned children.
    bridge.shutdown();
    drop(out_tx);
    let _ = writer.await;
}
