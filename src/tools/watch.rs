//! Watch Tool
//!
//! Registers channel watchers and runs single-shot checks: list recent
//! channel VODs, filter to new eligible videos, download each with
//! yt-dlp, and upload it for processing under the watcher's preset.
//! Scheduling the checks is left to the caller (cron, heartbeat, or a
//! human); this tool is the primitive they invoke.

use anyhow::Result;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::media;
use crate::presets::{merge_configurations, resolve_preset};
use crate::studio::client::UploadProjectOptions;
use crate::types::ToolContext;
use crate::watch::store::{
    self, filter_new_videos, remaining_uploads, uploads_today, NewWatcher, WatchStore, Watcher,
};

use super::{optional_str, require_str};

fn watcher_summary(watcher: &Watcher) -> Value {
    json!({
        "id": watcher.id,
        "label": watcher.label,
        "url": watcher.url,
        "type": watcher.watcher_type,
        "preset": watcher.preset,
        "enabled": watcher.enabled,
        "lastChecked": watcher.last_checked,
        "uploadsToday": uploads_today(watcher),
        "maxDailyUploads": watcher.max_daily_uploads,
    })
}

async fn require_yt_dlp() -> Result<()> {
    let (installed, _) = media::check_yt_dlp().await;
    if !installed {
        anyhow::bail!(
            "yt-dlp is required for watch mode. Install with: brew install yt-dlp (macOS), pip install yt-dlp (Linux), winget install yt-dlp (Windows)."
        );
    }
    Ok(())
}

async fn execute_add(ctx: &ToolContext, store: &WatchStore, args: &Value) -> Result<Value> {
    let url = require_str(args, "url")
        .map_err(|_| anyhow::anyhow!("url is required when action is 'add'"))?;

    if !media::is_supported_url(&url) {
        anyhow::bail!("Unsupported URL. Provide a YouTube or Twitch channel URL.");
    }
    if !store::is_channel_url(&url) {
        anyhow::bail!(
            "Provide a channel or user URL, not a single video URL. Examples: https://youtube.com/@username, https://twitch.tv/username"
        );
    }
    require_yt_dlp().await?;

    if let Some(preset) = optional_str(args, "preset") {
        resolve_preset(&preset)?;
    }

    let watcher = store.add(NewWatcher {
        url,
        label: None,
        preset: optional_str(args, "preset").or_else(|| Some(ctx.config.default_preset.clone())),
        configuration: args.get("configuration").cloned(),
        poll_interval_minutes: args
            .get("poll_interval_minutes")
            .and_then(Value::as_f64)
            .map(|v| v as u64),
        max_duration_minutes: args
            .get("max_duration_minutes")
            .and_then(Value::as_f64)
            .map(|v| v as u64),
        max_daily_uploads: args
            .get("max_daily_uploads")
            .and_then(Value::as_f64)
            .map(|v| v as u64),
        output_dir: optional_str(args, "output_dir"),
    })?;

    Ok(json!({
        "action": "add",
        "watcher": watcher,
        "warning": "Only watch channels you own or have explicit permission to process.",
    }))
}

fn execute_list(store: &WatchStore) -> Result<Value> {
    let watchers = store.load();
    Ok(json!({
        "action": "list",
        "count": watchers.len(),
        "watchers": watchers.iter().map(watcher_summary).collect::<Vec<_>>(),
    }))
}

fn execute_remove(store: &WatchStore, args: &Value) -> Result<Value> {
    let id = require_str(args, "id")
        .map_err(|_| anyhow::anyhow!("id is required when action is 'remove'"))?;
    if !store.remove(&id)? {
        anyhow::bail!("Watcher not found: {}", id);
    }
    Ok(json!({ "action": "remove", "id": id, "removed": true }))
}

fn execute_pause_resume(store: &WatchStore, action: &str, args: &Value) -> Result<Value> {
    let id = require_str(args, "id")
        .map_err(|_| anyhow::anyhow!("id is required when action is '{}'", action))?;
    let enabled = action == "resume";
    let watcher = store
        .update(&id, |w| w.enabled = enabled)?
        .ok_or_else(|| anyhow::anyhow!("Watcher not found: {}", id))?;
    Ok(json!({ "action": action, "id": id, "enabled": watcher.enabled }))
}

fn execute_status(store: &WatchStore, args: &Value) -> Result<Value> {
    let id = require_str(args, "id")
        .map_err(|_| anyhow::anyhow!("id is required when action is 'status'"))?;
    let watcher = store
        .get(&id)
        .ok_or_else(|| anyhow::anyhow!("Watcher not found: {}", id))?;

    let next_check_due = watcher
        .last_checked
        .as_deref()
        .filter(|_| watcher.enabled)
        .and_then(|last| last.parse::<DateTime<Utc>>().ok())
        .map(|last| {
            (last + ChronoDuration::minutes(watcher.poll_interval_minutes as i64)).to_rfc3339()
        });

    let mut detail = serde_json::to_value(&watcher)?;
    detail["uploadsToday"] = json!(uploads_today(&watcher));
    detail["remainingUploads"] = json!(remaining_uploads(&watcher));
    detail["nextCheckDue"] = json!(next_check_due);

    Ok(json!({ "action": "status", "watcher": detail }))
}

fn video_url(watcher_type: &str, video_id: &str) -> String {
    if watcher_type == "twitch_channel" {
        format!("https://www.twitch.tv/videos/{}", video_id)
    } else {
        format!("https://www.youtube.com/watch?v={}", video_id)
    }
}

async fn check_watcher(ctx: &ToolContext, store: &WatchStore, watcher: &Watcher) -> Value {
    let remaining = remaining_uploads(watcher);
    if remaining == 0 {
        return json!({
            "watcherId": watcher.id,
            "label": watcher.label,
            "skipped": true,
            "reason": "daily_upload_cap_reached",
        });
    }

    let videos = match media::list_channel_vods(&watcher.url, 10).await {
        Ok(videos) => videos,
        Err(err) => {
            warn!("listing VODs for watcher {} failed: {}", watcher.id, err);
            return json!({
                "watcherId": watcher.id,
                "label": watcher.label,
                "skipped": true,
                "reason": "list_failed",
                "error": err.to_string(),
            });
        }
    };

    let mut new_videos = filter_new_videos(watcher, &videos);
    new_videos.truncate(remaining as usize);

    if new_videos.is_empty() {
        let _ = store.update(&watcher.id, |w| {
            w.last_checked = Some(Utc::now().to_rfc3339());
        });
        return json!({
            "watcherId": watcher.id,
            "label": watcher.label,
            "checked": true,
            "newVideos": 0,
            "uploaded": 0,
        });
    }

    let mut uploaded_ids: Vec<String> = Vec::new();
    let mut uploads: Vec<Value> = Vec::new();

    for video in &new_videos {
        let source_url = video_url(&watcher.watcher_type, &video.id);
        let max_duration = (watcher.max_duration_minutes > 0)
            .then_some(watcher.max_duration_minutes * 60);

        let download = match media::download(&source_url, max_duration).await {
            Ok(download) => download,
            Err(err) => {
                let _ = store.mark_failed(&watcher.id, &video.id, &video.title);
                uploads.push(json!({
                    "videoId": video.id,
                    "title": video.title,
                    "error": err.to_string(),
                }));
                continue;
            }
        };

        let configuration = resolve_preset(&watcher.preset)
            .map(|preset| merge_configurations(&preset, &watcher.configuration))
            .unwrap_or_else(|_| watcher.configuration.clone());

        let upload_result = ctx
            .client
            .upload_project(
                &download.file_path,
                UploadProjectOptions {
                    name: Some(if video.title.is_empty() {
                        download.file_name.clone()
                    } else {
                        video.title.clone()
                    }),
                    configuration: Some(configuration),
                    ..UploadProjectOptions::default()
                },
            )
            .await;
        media::cleanup(&download.tmp_dir).await;

        match upload_result {
            Ok(result) => {
                info!("watcher {} uploaded video {}", watcher.id, video.id);
                uploaded_ids.push(video.id.clone());
                uploads.push(json!({
                    "videoId": video.id,
                    "title": video.title,
                    "projectId": result.get("projectId").or_else(|| result.get("id")),
                    "status": result.get("status").and_then(Value::as_str).unwrap_or("Uploading"),
                }));
            }
            Err(err) => {
                let _ = store.mark_failed(&watcher.id, &video.id, &video.title);
                uploads.push(json!({
                    "videoId": video.id,
                    "title": video.title,
                    "error": err.to_string(),
                }));
            }
        }
    }

    if uploaded_ids.is_empty() {
        let _ = store.update(&watcher.id, |w| {
            w.last_checked = Some(Utc::now().to_rfc3339());
        });
    } else {
        let _ = store.mark_processed(&watcher.id, &uploaded_ids);
    }

    json!({
        "watcherId": watcher.id,
        "label": watcher.label,
        "checked": true,
        "newVideos": new_videos.len(),
        "uploaded": uploaded_ids.len(),
        "uploads": uploads,
    })
}

async fn execute_check(ctx: &ToolContext, store: &WatchStore, args: &Value) -> Result<Value> {
    let target_id = optional_str(args, "id");
    require_yt_dlp().await?;

    let mut watchers: Vec<Watcher> = store.load().into_iter().filter(|w| w.enabled).collect();
    if let Some(ref id) = target_id {
        watchers.retain(|w| &w.id == id);
        if watchers.is_empty() {
            anyhow::bail!("Watcher not found or disabled: {}", id);
        }
    }

    if watchers.is_empty() {
        return Ok(json!({
            "action": "check",
            "processed": 0,
            "results": [],
            "message": "No enabled watchers.",
        }));
    }

    let mut results = Vec::new();
    for watcher in &watchers {
        results.push(check_watcher(ctx, store, watcher).await);
    }

    let total_uploaded: u64 = results
        .iter()
        .map(|r| r.get("uploaded").and_then(Value::as_u64).unwrap_or(0))
        .sum();

    Ok(json!({
        "action": "check",
        "processed": results.len(),
        "totalUploaded": total_uploaded,
        "results": results,
    }))
}

pub async fn execute(ctx: &ToolContext, args: Value) -> Result<Value> {
    let store = WatchStore::new();
    let action = optional_str(&args, "action")
        .map(|a| a.to_lowercase())
        .unwrap_or_else(|| "list".to_string());

    match action.as_str() {
        "add" => execute_add(ctx, &store, &args).await,
        "list" => execute_list(&store),
        "remove" => execute_remove(&store, &args),
        "pause" => execute_pause_resume(&store, "pause", &args),
        "resume" => execute_pause_resume(&store, "resume", &args),
        "status" => execute_status(&store, &args),
        "check" => execute_check(ctx, &store, &args).await,
        _ => anyhow::bail!(
            "Invalid action. Use one of: add, list, remove, check, pause, resume, status."
        ),
    }
}
