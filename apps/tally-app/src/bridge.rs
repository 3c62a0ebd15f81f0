//! # JSON-Lines Bridge
//!
//! Drives the ledger over a pipe: one JSON request per input line, one
//! result envelope per output line. Ledger events are interleaved on the
//! same output as `{"event": {...}}` lines so the presentation layer knows
//! when to refresh.
//!
//! ```text
//! stdin  ─► {"command":"saveBill","args":{...}}
//! stdout ◄─ {"event":{"type":"BillSaved","payload":{...}}}
//! stdout ◄─ {"success":true,"data":{...}}
//! ```

use serde::Serialize;
use serde_json::Value;
use tally_core::LedgerEvent;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info, warn};

use crate::commands::{dispatch, Command};
use crate::error::{ApiError, ApiResponse};
use crate::state::AppState;

#[derive(Debug, Serialize)]
struct EventLine<'a> {
    event: &'a LedgerEvent,
}

/// Handles one request line, returning the serialized response line.
pub async fn handle_line(state: &AppState, line: &str) -> String {
    let response: ApiResponse<Value> = match serde_json::from_str::<Command>(line) {
        Ok(command) => dispatch(state, command).await,
        Err(e) => {
            debug!(error = %e, "Rejected malformed request");
            ApiResponse::err(ApiError::validation(format!("Invalid request: {}", e)))
        }
    };
    encode(&response)
}

/// Serializes a ledger event as an output line.
pub fn event_line(event: &LedgerEvent) -> String {
    encode(&EventLine { event })
}

fn encode<T: Serialize>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|e| {
        warn!(error = %e, "Failed to encode output line");
        r#"{"success":false,"error":"Failed to encode response","code":"INTERNAL"}"#.to_string()
    })
}

/// Serves requests from `input` until it closes, writing responses and
/// ledger events to `output`.
///
/// Events published while a command runs are written before that
/// command's response line.
pub async fn serve<R, W>(state: &AppState, input: R, mut output: W) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut events = state.db().subscribe();

    let mut lines = input.lines();
    let mut handled: u64 = 0;
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let response = handle_line(state, &line).await;
        handled += 1;

        for event in events.drain() {
            write_line(&mut output, &event_line(&event)).await?;
        }
        write_line(&mut output, &response).await?;
    }

    info!(handled, "Input closed, shutting down bridge");
    output.shutdown().await
}

async fn write_line<W: AsyncWrite + Unpin>(output: &mut W, line: &str) -> std::io::Result<()> {
    output.write_all(line.as_bytes()).await?;
    output.write_all(b"\n").await?;
    output.flush().await
}
