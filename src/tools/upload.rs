//! Upload Tool
//!
//! Uploads a local file or a supported platform URL for processing.
//! URL sources are pulled with yt-dlp first; the upload itself is
//! gated by the spend policy using a server-side cost estimate with a
//! static fallback.

use std::path::{Path, PathBuf};

use anyhow::Result;
use serde_json::{json, Value};
use tracing::debug;

use crate::media;
use crate::policy::spend::{authorize_action, SpendRequest};
use crate::presets::{merge_configurations, resolve_preset};
use crate::types::ToolContext;

use super::{next_steps, optional_bool, optional_f64, optional_str, require_str};
use crate::studio::client::UploadProjectOptions;

const SUPPORTED_EXTENSIONS: [&str; 8] = ["mp4", "mkv", "mov", "avi", "webm", "flv", "wmv", "m4v"];

fn assert_local_file(file_path: &Path) -> Result<()> {
    if !file_path.exists() {
        anyhow::bail!("File not found: {}", file_path.display());
    }
    let extension = file_path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    if !SUPPORTED_EXTENSIONS.contains(&extension.as_str()) {
        anyhow::bail!(
            "Unsupported file type .{}. Supported formats: {}",
            extension,
            SUPPORTED_EXTENSIONS
                .map(|e| format!(".{}", e))
                .join(", ")
        );
    }
    Ok(())
}

fn strip_extension(file_name: &str) -> String {
    match file_name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem.to_string(),
        _ => file_name.to_string(),
    }
}

/// Resolve the effective configuration: named preset (or the configured
/// default) deep-merged with any raw override.
fn resolve_configuration(
    default_preset: &str,
    preset_param: Option<&str>,
    overrides: Option<&Value>,
) -> Result<(Option<String>, Value)> {
    let selected = preset_param
        .map(str::to_string)
        .or_else(|| Some(default_preset.to_string()))
        .filter(|p| !p.is_empty());

    let mut configuration = match &selected {
        Some(name) => resolve_preset(name)?,
        None => json!({}),
    };

    if let Some(overrides) = overrides.filter(|v| v.is_object()) {
        configuration = merge_configurations(&configuration, overrides);
    }

    Ok((selected, configuration))
}

pub async fn execute(ctx: &ToolContext, args: Value) -> Result<Value> {
    let mut tmp_dir: Option<PathBuf> = None;
    let result = run(ctx, &args, &mut tmp_dir).await;
    if let Some(dir) = tmp_dir {
        media::cleanup(&dir).await;
    }
    result
}

async fn run(ctx: &ToolContext, args: &Value, tmp_dir: &mut Option<PathBuf>) -> Result<Value> {
    let source_input = require_str(args, "file_path")?;

    let mut local_file = PathBuf::from(&source_input);
    let mut downloaded_from_url = false;
    let mut source_info: Option<media::VideoInfo> = None;

    if media::is_url(&source_input) {
        if !media::is_supported_url(&source_input) {
            anyhow::bail!(
                "Unsupported URL domain. Supported: YouTube, Twitch, Vimeo, Dailymotion, Streamable, Reddit"
            );
        }
        let (installed, _) = media::check_yt_dlp().await;
        if !installed {
            anyhow::bail!(
                "yt-dlp is not installed. Install with: brew install yt-dlp (macOS), pip install yt-dlp (Linux), winget install yt-dlp (Windows)."
            );
        }

        source_info = Some(media::get_video_info(&source_input).await?);
        let download = media::download(&source_input, None).await?;
        *tmp_dir = Some(download.tmp_dir.clone());
        local_file = download.file_path;
        downloaded_from_url = true;
    } else {
        assert_local_file(&local_file)?;
    }

    let (preset, configuration) = resolve_configuration(
        &ctx.config.default_preset,
        optional_str(args, "preset").as_deref(),
        args.get("configuration"),
    )?;

    let project_name = optional_str(args, "name")
        .or_else(|| source_info.as_ref().map(|info| info.title.clone()))
        .unwrap_or_else(|| {
            strip_extension(
                &local_file
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_default(),
            )
        });
    let priority = optional_str(args, "priority").unwrap_or_else(|| "normal".to_string());
    let webhook_url = optional_str(args, "webhook_url");
    let webhook_secret = optional_str(args, "webhook_secret");

    // Server-side estimate; a static guess keeps the upload usable when
    // the estimate endpoint is down.
    let mut estimate_payload = json!({
        "preset": preset,
        "priority": priority,
        "configuration": configuration,
    });
    if let Some(duration) = optional_f64(args, "duration_minutes").filter(|d| *d > 0.0) {
        estimate_payload["durationMinutes"] = json!(duration.round() as u64);
    }

    let fallback_api_credits = if priority == "rush" { 2 } else { 1 };
    let estimate = match ctx.client.estimate_cost(estimate_payload).await {
        Ok(estimate) => estimate,
        Err(err) => {
            debug!("estimate failed ({}), using static fallback", err);
            json!({
                "apiCredits": fallback_api_credits,
                "creatorCredits": { "total": 0 },
                "totalCost": { "apiCredits": fallback_api_credits, "creatorCredits": 0 },
            })
        }
    };

    let authorization = authorize_action(
        ctx,
        SpendRequest {
            action: "upload".to_string(),
            action_label: Some("Upload and process video".to_string()),
            estimated_cost: estimate,
            confirm_spend: optional_bool(args, "confirm_spend").unwrap_or(false),
            ..SpendRequest::default()
        },
    )
    .await?;

    let result = ctx
        .client
        .upload_project(
            &local_file,
            UploadProjectOptions {
                name: Some(project_name.clone()),
                configuration: Some(configuration),
                priority: Some(priority.clone()),
                webhook_url: webhook_url.clone(),
                webhook_secret: webhook_secret.clone(),
            },
        )
        .await?;

    let project_id = result
        .get("projectId")
        .or_else(|| result.get("id"))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    Ok(json!({
        "projectId": project_id,
        "status": result.get("status").and_then(Value::as_str).unwrap_or("Uploading"),
        "pollUrl": result
            .get("pollUrl")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| format!("/api/v1/projects/{}/status", project_id)),
        "preset": preset,
        "projectName": project_name,
        "priority": priority,
        "spendPolicy": authorization.policy.mode,
        "estimatedCost": authorization.estimated_cost,
        "webhook": result.get("webhook").cloned().unwrap_or_else(|| json!({
            "enabled": webhook_url.is_some(),
            "url": webhook_url,
            "event": webhook_url.as_ref().map(|_| "project.completed"),
            "signing": webhook_secret.is_some(),
        })),
        "downloadedFromUrl": downloaded_from_url,
        "sourceUrl": if downloaded_from_url { Some(source_input) } else { None },
        "next_steps": next_steps::for_upload(webhook_url.is_some()),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_extension() {
        assert_eq!(strip_extension("clip.mp4"), "clip");
        assert_eq!(strip_extension("archive.tar.gz"), "archive.tar");
        assert_eq!(strip_extension("noext"), "noext");
        assert_eq!(strip_extension(".hidden"), ".hidden");
    }

    #[test]
    fn test_assert_local_file_extension() {
        let dir = tempfile::TempDir::new().unwrap();
        let good = dir.path().join("video.MP4");
        let bad = dir.path().join("notes.txt");
        std::fs::write(&good, b"x").unwrap();
        std::fs::write(&bad, b"x").unwrap();

        assert!(assert_local_file(&good).is_ok());
        let err = assert_local_file(&bad).unwrap_err().to_string();
        assert!(err.contains("Unsupported file type"));
        assert!(assert_local_file(&dir.path().join("missing.mp4")).is_err());
    }

    #[test]
    fn test_resolve_configuration_merges_overrides() {
        let (preset, config) = resolve_configuration(
            "youtube",
            Some("quick"),
            Some(&serde_json::json!({"zoom": false})),
        )
        .unwrap();
        assert_eq!(preset.as_deref(), Some("quick"));
        assert_eq!(config["zoom"], false);
        assert_eq!(config["subtitle"], false);
    }

    #[test]
    fn test_resolve_configuration_falls_back_to_default_preset() {
        let (preset, config) = resolve_configuration("podcast", None, None).unwrap();
        assert_eq!(preset.as_deref(), Some("podcast"));
        assert_eq!(config["cutHardness"], "soft");
    }

    #[test]
    fn test_resolve_configuration_unknown_preset_errors() {
        assert!(resolve_configuration("youtube", Some("bogus"), None).is_err());
    }
}
