//! Gateway Tool System
//!
//! Defines every tool the gateway exposes, with JSON-schema parameter
//! definitions and a dispatch function. Tool handlers live in the
//! submodules and receive the shared `ToolContext`.

use anyhow::Result;
use serde_json::{json, Value};

use crate::types::ToolContext;

pub mod brand;
pub mod credits;
pub mod download;
pub mod feedback;
pub mod next_steps;
pub mod poll;
pub mod projects;
pub mod setup;
pub mod thumbnails;
pub mod upload;
pub mod watch;

/// A tool exposed over the RPC surface.
#[derive(Debug, Clone)]
pub struct ToolDefinition {
    pub name: &'static str,
    pub description: &'static str,
    pub parameters: Value,
}

fn preset_schema() -> Value {
    json!({
        "type": "string",
        "enum": crate::presets::PRESET_NAMES,
        "description": "Editing preset"
    })
}

/// All registered tool definitions.
pub fn tool_definitions() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition {
            name: "studio_upload",
            description: "Upload a video file or supported URL for AI video editing.",
            parameters: json!({
                "type": "object",
                "properties": {
                    "file_path": { "type": "string", "description": "Absolute local path or supported URL" },
                    "name": { "type": "string", "description": "Optional project name" },
                    "preset": preset_schema(),
                    "configuration": { "type": "object", "description": "Raw configuration override" },
                    "priority": { "type": "string", "enum": ["normal", "rush"] },
                    "duration_minutes": { "type": "number", "description": "Optional duration hint for more accurate cost estimation" },
                    "webhook_url": { "type": "string", "description": "Optional callback URL for project.completed webhook delivery" },
                    "webhook_secret": { "type": "string", "description": "Optional webhook signing secret (HMAC SHA-256)" },
                    "confirm_spend": { "type": "boolean", "description": "Set true after user approval when credits will be spent" }
                },
                "required": ["file_path"]
            }),
        },
        ToolDefinition {
            name: "studio_status",
            description: "Check current project status and progress.",
            parameters: json!({
                "type": "object",
                "properties": {
                    "project_id": { "type": "string", "description": "Project ID" }
                },
                "required": ["project_id"]
            }),
        },
        ToolDefinition {
            name: "studio_poll",
            description: "Wait for project completion with stage-aware polling.",
            parameters: json!({
                "type": "object",
                "properties": {
                    "project_id": { "type": "string", "description": "Project ID" },
                    "timeout_minutes": { "type": "number", "description": "Timeout in minutes" }
                },
                "required": ["project_id"]
            }),
        },
        ToolDefinition {
            name: "studio_results",
            description: "Get project output metadata and download URLs.",
            parameters: json!({
                "type": "object",
                "properties": {
                    "project_id": { "type": "string", "description": "Project ID" }
                },
                "required": ["project_id"]
            }),
        },
        ToolDefinition {
            name: "studio_download",
            description: "Download project outputs to the local filesystem.",
            parameters: json!({
                "type": "object",
                "properties": {
                    "project_id": { "type": "string", "description": "Project ID" },
                    "output_dir": { "type": "string", "description": "Output directory" },
                    "types": {
                        "type": "array",
                        "items": {
                            "type": "string",
                            "enum": ["main", "shorts", "subtitles", "transcription",
                                     "timeline-edl", "timeline-fcpxml", "timeline-xml",
                                     "thumbnails", "all"]
                        }
                    }
                },
                "required": ["project_id"]
            }),
        },
        ToolDefinition {
            name: "studio_setup",
            description: "Set up Studio authentication (send magic link, complete setup, or save API key).",
            parameters: json!({
                "type": "object",
                "properties": {
                    "action": { "type": "string", "enum": ["send_magic_link", "complete_setup", "save_api_key"], "description": "Defaults to send_magic_link" },
                    "email": { "type": "string", "description": "Email for magic-link setup" },
                    "code": { "type": "string", "description": "6-character magic-link code (for complete_setup)" },
                    "api_key": { "type": "string", "description": "Existing API key to save (for save_api_key)" }
                }
            }),
        },
        ToolDefinition {
            name: "studio_credits",
            description: "Get API credit and subscription allocation details.",
            parameters: json!({ "type": "object", "properties": {} }),
        },
        ToolDefinition {
            name: "studio_pricing",
            description: "Get current pricing for API and premium Creator Credit features.",
            parameters: json!({ "type": "object", "properties": {} }),
        },
        ToolDefinition {
            name: "studio_estimate",
            description: "Estimate API and Creator Credit costs before upload.",
            parameters: json!({
                "type": "object",
                "properties": {
                    "duration_minutes": { "type": "number" },
                    "preset": preset_schema(),
                    "priority": { "type": "string", "enum": ["normal", "rush"] },
                    "configuration": { "type": "object" }
                }
            }),
        },
        ToolDefinition {
            name: "studio_thumbnails",
            description: "Generate thumbnail variants for an existing completed project (uses Creator Credits).",
            parameters: json!({
                "type": "object",
                "properties": {
                    "project_id": { "type": "string", "description": "Project ID" },
                    "variants": { "type": "number", "minimum": 1, "maximum": 3 },
                    "premium_quality": { "type": "boolean" },
                    "use_brand_colors": { "type": "boolean" },
                    "use_brand_faces": { "type": "boolean" },
                    "confirm_spend": { "type": "boolean", "description": "Set true after user approval when Creator Credits will be spent" }
                },
                "required": ["project_id"]
            }),
        },
        ToolDefinition {
            name: "studio_analytics",
            description: "Get usage analytics and value metrics.",
            parameters: json!({
                "type": "object",
                "properties": {
                    "period": { "type": "string", "enum": ["this_month", "last_month", "all_time"] }
                }
            }),
        },
        ToolDefinition {
            name: "studio_brand",
            description: "Get or update brand kit settings used by subtitles and thumbnails.",
            parameters: json!({
                "type": "object",
                "properties": {
                    "action": { "type": "string", "enum": ["get", "update"] },
                    "updates": { "type": "object", "description": "Brand fields to update when action is update" },
                    "channel_name": { "type": "string" },
                    "primary_color": { "type": "string" },
                    "secondary_color": { "type": "string" },
                    "brand_identity": { "type": "string" },
                    "channel_pitch": { "type": "string" },
                    "posting_plan": { "type": "array", "items": { "type": "object" } },
                    "subtitle_font_id": { "type": "string" },
                    "thumbnail_font_id": { "type": "string" },
                    "default_intro_enabled": { "type": "boolean" },
                    "default_outro_enabled": { "type": "boolean" }
                }
            }),
        },
        ToolDefinition {
            name: "studio_brand_import",
            description: "Import brand colors and identity from a YouTube, Twitch, or X profile URL.",
            parameters: json!({
                "type": "object",
                "properties": {
                    "url": { "type": "string", "description": "Channel/profile URL (YouTube or Twitch)" },
                    "apply": { "type": "boolean", "description": "Apply suggested settings immediately (default false)" }
                },
                "required": ["url"]
            }),
        },
        ToolDefinition {
            name: "studio_assets",
            description: "Manage reusable intro/outro/watermark assets for future projects.",
            parameters: json!({
                "type": "object",
                "properties": {
                    "action": { "type": "string", "enum": ["list", "upload", "delete"] },
                    "asset_type": { "type": "string", "enum": ["intro", "outro", "watermark"], "description": "Required for action=upload and action=delete" },
                    "file_path": { "type": "string", "description": "Required for action=upload (absolute local file path)" }
                }
            }),
        },
        ToolDefinition {
            name: "studio_rerender",
            description: "Re-render a completed project with updated settings without re-uploading.",
            parameters: json!({
                "type": "object",
                "properties": {
                    "project_id": { "type": "string", "description": "Project ID" },
                    "configuration": { "type": "object", "description": "Configuration overrides merged into existing project settings" }
                },
                "required": ["project_id", "configuration"]
            }),
        },
        ToolDefinition {
            name: "studio_projects",
            description: "List projects for the authenticated user.",
            parameters: json!({
                "type": "object",
                "properties": {
                    "limit": { "type": "number" },
                    "offset": { "type": "number" }
                }
            }),
        },
        ToolDefinition {
            name: "studio_delete",
            description: "Delete a project by project ID.",
            parameters: json!({
                "type": "object",
                "properties": {
                    "project_id": { "type": "string" }
                },
                "required": ["project_id"]
            }),
        },
        ToolDefinition {
            name: "studio_feedback",
            description: "Submit feedback to the Studio team (bug/suggestion/question).",
            parameters: json!({
                "type": "object",
                "properties": {
                    "type": { "type": "string", "enum": ["bug", "suggestion", "question"] },
                    "title": { "type": "string" },
                    "description": { "type": "string" },
                    "severity": { "type": "string", "enum": ["low", "medium", "high", "critical"] },
                    "project_id": { "type": "string" }
                },
                "required": ["type", "title", "description"]
            }),
        },
        ToolDefinition {
            name: "studio_referral",
            description: "Get the user's referral code and stats, or apply a friend's referral code for bonus credits.",
            parameters: json!({
                "type": "object",
                "properties": {
                    "action": { "type": "string", "enum": ["get", "apply"], "description": "'get' returns the user's referral code, link, and stats. 'apply' applies a friend's code for bonus credits." },
                    "code": { "type": "string", "description": "Referral code to apply (required when action is 'apply')" }
                },
                "required": ["action"]
            }),
        },
        ToolDefinition {
            name: "studio_watch",
            description: "Watch a YouTube or Twitch channel for new videos and auto-process them.",
            parameters: json!({
                "type": "object",
                "properties": {
                    "action": { "type": "string", "enum": ["add", "list", "remove", "check", "pause", "resume", "status"], "description": "Defaults to list" },
                    "url": { "type": "string", "description": "Channel URL (required for add)" },
                    "id": { "type": "string", "description": "Watcher ID (for remove/pause/resume/status/check)" },
                    "preset": preset_schema(),
                    "configuration": { "type": "object", "description": "Configuration overrides (for add)" },
                    "poll_interval_minutes": { "type": "number", "description": "How often to check for new videos in minutes (default 30, for add)" },
                    "max_duration_minutes": { "type": "number", "description": "Skip videos longer than this (default 120, for add)" },
                    "max_daily_uploads": { "type": "number", "description": "Max uploads per day per watcher (default 5, for add)" },
                    "output_dir": { "type": "string", "description": "Directory for auto-downloading results (for add)" }
                }
            }),
        },
    ]
}

/// Dispatch a tool call by name.
pub async fn execute_tool(ctx: &ToolContext, name: &str, args: Value) -> Result<Value> {
    match name {
        "studio_upload" => upload::execute(ctx, args).await,
        "studio_status" => projects::execute_status(ctx, args).await,
        "studio_poll" => poll::execute(ctx, args).await,
        "studio_results" => projects::execute_results(ctx, args).await,
        "studio_download" => download::execute(ctx, args).await,
        "studio_setup" => setup::execute(ctx, args).await,
        "studio_credits" => credits::execute_credits(ctx, args).await,
        "studio_pricing" => credits::execute_pricing(ctx, args).await,
        "studio_estimate" => credits::execute_estimate(ctx, args).await,
        "studio_thumbnails" => thumbnails::execute(ctx, args).await,
        "studio_analytics" => credits::execute_analytics(ctx, args).await,
        "studio_brand" => brand::execute_brand(ctx, args).await,
        "studio_brand_import" => brand::execute_brand_import(ctx, args).await,
        "studio_assets" => brand::execute_assets(ctx, args).await,
        "studio_rerender" => projects::execute_rerender(ctx, args).await,
        "studio_projects" => projects::execute_list(ctx, args).await,
        "studio_delete" => projects::execute_delete(ctx, args).await,
        "studio_feedback" => feedback::execute_feedback(ctx, args).await,
        "studio_referral" => feedback::execute_referral(ctx, args).await,
        "studio_watch" => watch::execute(ctx, args).await,
        other => anyhow::bail!("Unknown tool: {}", other),
    }
}

// ── Argument helpers ─────────────────────────────────────────────

/// Required trimmed string argument.
pub(crate) fn require_str(args: &Value, key: &str) -> Result<String> {
    optional_str(args, key).ok_or_else(|| anyhow::anyhow!("{} is required", key))
}

/// Optional trimmed string argument; empty strings count as absent.
pub(crate) fn optional_str(args: &Value, key: &str) -> Option<String> {
    args.get(key)
        .and_then(Value::as_str)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

pub(crate) fn optional_bool(args: &Value, key: &str) -> Option<bool> {
    args.get(key).and_then(Value::as_bool)
}

pub(crate) fn optional_f64(args: &Value, key: &str) -> Option<f64> {
    args.get(key).and_then(Value::as_f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_definitions_are_unique_and_schematized() {
        let definitions = tool_definitions();
        assert_eq!(definitions.len(), 20);

        let mut names: Vec<&str> = definitions.iter().map(|d| d.name).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), definitions.len());

        for definition in &definitions {
            assert!(definition.name.starts_with("studio_"));
            assert!(!definition.description.is_empty());
            assert_eq!(definition.parameters["type"], "object");
            assert!(definition.parameters["properties"].is_object());
        }
    }

    #[test]
    fn test_argument_helpers() {
        let args = serde_json::json!({
            "a": "  hello ",
            "b": "",
            "c": true,
            "d": 4.5
        });
        assert_eq!(require_str(&args, "a").unwrap(), "hello");
        assert!(require_str(&args, "b").is_err());
        assert!(require_str(&args, "missing").is_err());
        assert_eq!(optional_str(&args, "b"), None);
        assert_eq!(optional_bool(&args, "c"), Some(true));
        assert_eq!(optional_f64(&args, "d"), Some(4.5));
    }
}
