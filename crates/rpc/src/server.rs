//! Newline-delimited JSON request loop
//!
//! One request per line, `{"op": "...", "args": {...}, "id": ...}`; one
//! response per line, either the [`InvocationResult`] fields or
//! `{"error": "...", "category": "..."}`. `id` is echoed back when present.

use lendledger_core::{ErrorCategory, LedgerError};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use crate::context::{AppContext, InvocationResult};

#[derive(Debug, Deserialize)]
struct Request {
    op: String,
    #[serde(default)]
    args: Value,
    #[serde(default)]
    id: Option<Value>,
}

fn error_response(err: &LedgerError) -> Value {
    json!({ "error": err.to_string(), "category": err.category() })
}

fn success_response(result: &InvocationResult) -> Value {
    serde_json::to_value(result).unwrap_or_else(|e| {
        json!({ "error": format!("STORAGE_ERROR: unencodable result: {}", e), "category": ErrorCategory::StorageError })
    })
}

/// Answer a single request line
pub fn handle_line(ctx: &AppContext, line: &str) -> Value {
    let request: Request = match serde_json::from_str(line) {
        Ok(request) => request,
        Err(e) => return error_response(&LedgerError::Validation(format!("malformed request: {}", e))),
    };

    let mut response = match ctx.invoke(&request.op, request.args) {
        Ok(result) => success_response(&result),
        Err(err) => error_response(&err),
    };
    if let (Some(id), Some(obj)) = (request.id, response.as_object_mut()) {
        obj.insert("id".to_string(), id);
    }
    response
}

/// Serve requests until the reader is exhausted; returns the number of requests answered
pub async fn serve<R, W>(ctx: &AppContext, reader: R, mut writer: W) -> Result<usize, anyhow::Error>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = reader.lines();
    let mut answered = 0;

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let response = handle_line(ctx, &line);
        let mut out = serde_json::to_vec(&response)?;
        out.push(b'\n');
        writer.write_all(&out).await?;
        writer.flush().await?;
        answered += 1;
    }

    tracing::info!(requests = answered, "Request stream closed");
    Ok(answered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LedgerConfig;

    #[test]
    fn test_malformed_line() {
        let ctx = AppContext::in_memory(LedgerConfig::default());
        let response = handle_line(&ctx, "{not json");
        assert_eq!(response["category"], "VALIDATION_ERROR");
        assert!(response["error"].as_str().unwrap().starts_with("VALIDATION_ERROR: malformed request"));
    }

    #[test]
    fn test_id_is_echoed() {
        let ctx = AppContext::in_memory(LedgerConfig::default());
        let response = handle_line(&ctx, r#"{"op":"InitLedger","args":{"adminID":"ADMIN"},"id":7}"#);
        assert_eq!(response["id"], 7);
        assert_eq!(response["payload"]["actorID"], "ADMIN");
        assert!(response["txId"].is_string());
    }
}
