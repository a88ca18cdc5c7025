//! Poll Tool
//!
//! Waits for a project to reach a terminal state via the completion
//! poller (realtime channel first, HTTP polling fallback) and reports
//! every observed status transition.

use std::sync::Arc;

use anyhow::Result;
use serde_json::{json, Value};

use crate::studio::poller::{normalize_status, CompletionPoller, PollOptions};
use crate::types::{ProgressUpdate, ToolContext};

use super::require_str;

fn normalize_timeout_minutes(value: Option<f64>) -> u64 {
    match value {
        Some(v) if v.is_finite() => v.clamp(1.0, 180.0) as u64,
        _ => 30,
    }
}

pub async fn execute(ctx: &ToolContext, args: Value) -> Result<Value> {
    let project_id = require_str(&args, "project_id")?;
    let timeout_minutes =
        normalize_timeout_minutes(args.get("timeout_minutes").and_then(Value::as_f64));

    let poller = CompletionPoller::new(Arc::clone(&ctx.client), ctx.config.socket_url.clone());

    let mut updates: Vec<ProgressUpdate> = Vec::new();
    let outcome = poller
        .wait(
            &project_id,
            PollOptions {
                timeout_minutes,
                force_http: false,
            },
            &mut |update| updates.push(update),
        )
        .await?;

    let final_status = normalize_status(&outcome.status.status);
    Ok(json!({
        "projectId": project_id,
        "timeoutMinutes": timeout_minutes,
        "via": outcome.via,
        "updates": updates,
        "final": outcome.status,
        "completed": final_status == "completed",
        "failed": final_status == "failed",
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_timeout_minutes() {
        assert_eq!(normalize_timeout_minutes(None), 30);
        assert_eq!(normalize_timeout_minutes(Some(f64::NAN)), 30);
        assert_eq!(normalize_timeout_minutes(Some(0.0)), 1);
        assert_eq!(normalize_timeout_minutes(Some(45.0)), 45);
        assert_eq!(normalize_timeout_minutes(Some(10_000.0)), 180);
    }
}
