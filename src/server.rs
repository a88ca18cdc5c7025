//! Tool Server
//!
//! Thin JSON-RPC 2.0 loop over stdio that exposes the tool catalog to
//! an agent host: `initialize`, `tools/list`, and `tools/call`. Tool
//! results are wrapped as text content blocks; tool failures are
//! serialized with their structured code/status/details so the caller
//! can react (confirm a spend, top up credits, retry).

use anyhow::Result;
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{debug, error};

use crate::studio::error::StudioError;
use crate::tools::{execute_tool, tool_definitions};
use crate::types::ToolContext;

const SERVER_NAME: &str = "framecut-studio";
const PROTOCOL_VERSION: &str = "2024-11-05";

fn rpc_result(id: Value, result: Value) -> Value {
    json!({ "jsonrpc": "2.0", "id": id, "result": result })
}

fn rpc_error(id: Value, code: i64, message: &str) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "error": { "code": code, "message": message }
    })
}

fn wrap_result(result: &Value) -> Value {
    json!({
        "content": [{
            "type": "text",
            "text": serde_json::to_string_pretty(result).unwrap_or_else(|_| result.to_string()),
        }]
    })
}

/// Serialize a tool failure, preserving the structured shape of
/// `StudioError`s; anything else becomes a generic `tool_error`.
fn wrap_error(err: &anyhow::Error) -> Value {
    let body = match err.downcast_ref::<StudioError>() {
        Some(studio_err) => json!({
            "error": true,
            "code": studio_err.code,
            "status": studio_err.status,
            "message": studio_err.message,
            "details": studio_err.details,
        }),
        None => json!({
            "error": true,
            "code": "tool_error",
            "status": 500,
            "message": err.to_string(),
            "details": Value::Null,
        }),
    };

    json!({
        "content": [{
            "type": "text",
            "text": serde_json::to_string_pretty(&body).unwrap_or_else(|_| body.to_string()),
        }],
        "isError": true
    })
}

/// Handle one raw request line. Returns `None` for notifications
/// (requests without an id), which expect no response.
pub async fn handle_request(ctx: &ToolContext, raw: &str) -> Option<Value> {
    let request: Value = match serde_json::from_str(raw) {
        Ok(request) => request,
        Err(_) => return Some(rpc_error(Value::Null, -32700, "Parse error")),
    };

    let id = request.get("id").cloned();
    let method = request.get("method").and_then(Value::as_str).unwrap_or("");

    if id.is_none() {
        debug!("ignoring notification: {}", method);
        return None;
    }
    let id = id.unwrap();

    match method {
        "initialize" => Some(rpc_result(
            id,
            json!({
                "protocolVersion": PROTOCOL_VERSION,
                "serverInfo": {
                    "name": SERVER_NAME,
                    "version": ctx.config.skill_version,
                },
                "capabilities": { "tools": {} },
            }),
        )),
        "ping" => Some(rpc_result(id, json!({}))),
        "tools/list" => {
            let tools: Vec<Value> = tool_definitions()
                .iter()
                .map(|definition| {
                    json!({
                        "name": definition.name,
                        "description": definition.description,
                        "inputSchema": definition.parameters,
                    })
                })
                .collect();
            Some(rpc_result(id, json!({ "tools": tools })))
        }
        "tools/call" => {
            let name = request
                .pointer("/params/name")
                .and_then(Value::as_str)
                .unwrap_or("");
            let arguments = request
                .pointer("/params/arguments")
                .cloned()
                .unwrap_or_else(|| json!({}));

            match execute_tool(ctx, name, arguments).await {
                Ok(result) => Some(rpc_result(id, wrap_result(&result))),
                Err(err) => Some(rpc_result(id, wrap_error(&err))),
            }
        }
        _ => Some(rpc_error(id, -32601, "Method not found")),
    }
}

/// Run the stdio server until stdin closes.
pub async fn serve_stdio(ctx: ToolContext) -> Result<()> {
    let stdin = BufReader::new(tokio::io::stdin());
    let mut stdout = tokio::io::stdout();
    let mut lines = stdin.lines();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }

        if let Some(response) = handle_request(&ctx, &line).await {
            let serialized = serde_json::to_string(&response)?;
            if let Err(err) = stdout.write_all(serialized.as_bytes()).await {
                error!("stdout write failed: {}", err);
                break;
            }
            stdout.write_all(b"\n").await?;
            stdout.flush().await?;
        }
    }

    Ok(())
}
