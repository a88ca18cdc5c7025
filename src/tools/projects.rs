//! Project Tools
//!
//! Status snapshots, results, listing, deletion, and re-rendering of
//! existing projects.

use anyhow::Result;
use serde_json::{json, Map, Value};

use crate::types::ToolContext;

use super::{next_steps, require_str};

pub async fn execute_status(ctx: &ToolContext, args: Value) -> Result<Value> {
    let project_id = require_str(&args, "project_id")?;
    let status = ctx.client.get_project_status(&project_id).await?;

    Ok(json!({
        "projectId": project_id,
        "status": status.status,
        "progress": status.progress,
        "resultsUrl": status.results_url,
        "retentionTimeRemaining": status.retention_time_remaining,
        "error": status.error,
    }))
}

pub async fn execute_results(ctx: &ToolContext, args: Value) -> Result<Value> {
    let project_id = require_str(&args, "project_id")?;
    let results = ctx.client.get_project_results(&project_id).await?;

    let mut merged = Map::new();
    merged.insert("projectId".to_string(), Value::String(project_id));
    if let Value::Object(results_map) = &results {
        for (key, value) in results_map {
            merged.insert(key.clone(), value.clone());
        }
    }
    merged.insert(
        "next_steps".to_string(),
        serde_json::to_value(next_steps::for_results(&results))?,
    );
    Ok(Value::Object(merged))
}

pub async fn execute_list(ctx: &ToolContext, args: Value) -> Result<Value> {
    let limit = args
        .get("limit")
        .and_then(Value::as_f64)
        .unwrap_or(20.0)
        .clamp(1.0, 100.0) as u64;
    let offset = args
        .get("offset")
        .and_then(Value::as_f64)
        .unwrap_or(0.0)
        .max(0.0) as u64;

    Ok(ctx.client.list_projects(limit, offset).await?)
}

pub async fn execute_delete(ctx: &ToolContext, args: Value) -> Result<Value> {
    let project_id = require_str(&args, "project_id")?;
    let result = ctx.client.delete_project(&project_id).await?;

    let mut merged = Map::new();
    merged.insert("projectId".to_string(), Value::String(project_id));
    if let Value::Object(result_map) = result {
        for (key, value) in result_map {
            merged.insert(key, value);
        }
    }
    Ok(Value::Object(merged))
}

pub async fn execute_rerender(ctx: &ToolContext, args: Value) -> Result<Value> {
    let project_id = require_str(&args, "project_id")?;
    let configuration = match args.get("configuration") {
        Some(config @ Value::Object(_)) => config.clone(),
        _ => anyhow::bail!("configuration must be an object"),
    };

    let result = ctx
        .client
        .rerender_project(&project_id, configuration)
        .await?;

    let mut merged = Map::new();
    merged.insert("projectId".to_string(), Value::String(project_id));
    if let Value::Object(result_map) = result {
        for (key, value) in result_map {
            merged.insert(key, value);
        }
    }
    Ok(Value::Object(merged))
}
