//! Feedback & Referral Tools

use anyhow::Result;
use serde_json::{json, Value};

use crate::types::ToolContext;

use super::{optional_str, require_str};

const AGENT_CLIENT: &str = "framecut-gateway";

pub async fn execute_feedback(ctx: &ToolContext, args: Value) -> Result<Value> {
    let feedback_type = require_str(&args, "type")?.to_lowercase();
    let title = require_str(&args, "title")?;
    let description = require_str(&args, "description")?;

    let payload = json!({
        "type": feedback_type,
        "title": title,
        "description": description,
        "severity": optional_str(&args, "severity").unwrap_or_else(|| "medium".to_string()),
        "projectId": optional_str(&args, "project_id"),
        "context": {
            "skillVersion": ctx.config.skill_version,
            "agent": AGENT_CLIENT,
            "os": std::env::consts::OS,
            "timestamp": chrono::Utc::now().to_rfc3339(),
            "reportId": uuid::Uuid::new_v4().to_string(),
        },
    });

    let headers = vec![
        ("X-Agent-Client".to_string(), AGENT_CLIENT.to_string()),
        (
            "X-Skill-Version".to_string(),
            ctx.config.skill_version.clone(),
        ),
    ];

    Ok(ctx.client.submit_feedback(payload, headers).await?)
}

pub async fn execute_referral(ctx: &ToolContext, args: Value) -> Result<Value> {
    let action = optional_str(&args, "action")
        .map(|a| a.to_lowercase())
        .unwrap_or_else(|| "get".to_string());

    match action.as_str() {
        "get" => Ok(ctx.client.get_referral().await?),
        "apply" => {
            let code = require_str(&args, "code")
                .map_err(|_| anyhow::anyhow!("Referral code is required for action 'apply'."))?;
            Ok(ctx.client.apply_referral_code(&code).await?)
        }
        other => anyhow::bail!("Invalid action: \"{}\". Must be \"get\" or \"apply\".", other),
    }
}
