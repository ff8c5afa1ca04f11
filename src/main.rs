mod backup;
mod config;
mod dates;
mod db;
mod errors;
mod ipc;
mod overlap;
mod records;
mod validate;

use dotenvy::dotenv;
use serde_json::json;
use std::io::{self, BufRead, Write};
use tracing_subscriber::{fmt, prelude::*, util::SubscriberInitExt};

fn main() {
    dotenv().ok();
    let cfg = config::Config::from_env();

    // stdout carries the protocol; logs go to stderr.
    let fmt = fmt::layer()
        .with_writer(io::stderr)
        .without_time()
        .with_file(false)
        .with_line_number(false);
    tracing_subscriber::registry()
        .with(fmt)
        .with(cfg.log_level)
        .init();

    let mut state = ipc::AppState::default();
    if let Some(path) = cfg.workspace.as_deref() {
        if let Err(e) = state.open_workspace(path) {
            tracing::error!(workspace = %path.display(), "startup workspace not opened: {e:#}");
        }
    }

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(v) => v,
            Err(e) => {
                tracing::error!("stdin read failed: {e}");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let resp = match serde_json::from_str::<ipc::Request>(&line) {
            Ok(req) => ipc::handle_request(&mut state, req),
            // No id to echo back.
            Err(e) => {
                tracing::warn!("rejected malformed request: {e}");
                json!({
                    "ok": false,
                    "error": { "code": "bad_json", "message": e.to_string() }
                })
            }
        };
        let _ = writeln!(
            stdout,
            "{}",
            serde_json::to_string(&resp).unwrap_or_else(|_| "{\"ok\":false}".to_string())
        );
        let _ = stdout.flush();
    }
    tracing::debug!("stdin closed, exiting");
}
