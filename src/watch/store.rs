//! Watcher Store
//!
//! JSON-backed persistence for channel watchers at
//! `~/.framecut/watchers.json`: creation with clamped knobs, daily
//! upload accounting, processed-id history, and failed-video retry
//! tracking.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Utc;
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

use crate::config::get_gateway_dir;
use crate::media::ChannelVideo;

/// Ring cap on remembered processed video ids per watcher.
const MAX_PROCESSED_IDS: usize = 500;
/// Upload attempts per failed video before it is skipped for good.
const MAX_VIDEO_RETRIES: u32 = 3;

const STORE_FILENAME: &str = "watchers.json";

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedVideo {
    pub id: String,
    pub title: String,
    pub attempts: u32,
    pub last_attempt: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Watcher {
    pub id: String,
    #[serde(rename = "type")]
    pub watcher_type: String,
    pub url: String,
    pub label: String,
    pub preset: String,
    #[serde(default)]
    pub configuration: Value,
    pub poll_interval_minutes: u64,
    pub max_duration_minutes: u64,
    pub max_daily_uploads: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<String>,
    pub enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_checked: Option<String>,
    #[serde(default)]
    pub last_processed_ids: Vec<String>,
    #[serde(default)]
    pub failed_videos: Vec<FailedVideo>,
    #[serde(default)]
    pub uploads_today: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uploads_today_date: Option<String>,
    pub created_at: String,
}

/// Parameters for registering a new watcher. Unset knobs take defaults.
#[derive(Clone, Debug, Default)]
pub struct NewWatcher {
    pub url: String,
    pub label: Option<String>,
    pub preset: Option<String>,
    pub configuration: Option<Value>,
    pub poll_interval_minutes: Option<u64>,
    pub max_duration_minutes: Option<u64>,
    pub max_daily_uploads: Option<u64>,
    pub output_dir: Option<String>,
}

#[derive(Serialize, Deserialize, Default)]
struct StoreDocument {
    #[serde(default)]
    watchers: Vec<Watcher>,
}

/// File-backed watcher store. Every operation loads, mutates, and
/// rewrites the full document; watcher counts stay tiny.
pub struct WatchStore {
    path: PathBuf,
}

impl WatchStore {
    pub fn new() -> Self {
        Self {
            path: get_gateway_dir().join(STORE_FILENAME),
        }
    }

    pub fn at_path(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn load(&self) -> Vec<Watcher> {
        let Ok(raw) = fs::read_to_string(&self.path) else {
            return Vec::new();
        };
        serde_json::from_str::<StoreDocument>(&raw)
            .map(|doc| doc.watchers)
            .unwrap_or_default()
    }

    fn save(&self, watchers: &[Watcher]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).context("Failed to create watcher store directory")?;
        }
        let doc = StoreDocument {
            watchers: watchers.to_vec(),
        };
        fs::write(&self.path, serde_json::to_string_pretty(&doc)?)
            .context("Failed to write watcher store")?;
        Ok(())
    }

    pub fn add(&self, params: NewWatcher) -> Result<Watcher> {
        let mut watchers = self.load();
        let watcher = create_watcher(params);
        watchers.push(watcher.clone());
        self.save(&watchers)?;
        Ok(watcher)
    }

    pub fn get(&self, id: &str) -> Option<Watcher> {
        self.load().into_iter().find(|w| w.id == id)
    }

    pub fn remove(&self, id: &str) -> Result<bool> {
        let mut watchers = self.load();
        let before = watchers.len();
        watchers.retain(|w| w.id != id);
        if watchers.len() == before {
            return Ok(false);
        }
        self.save(&watchers)?;
        Ok(true)
    }

    /// Apply a mutation to one watcher and persist. Returns the updated
    /// watcher, or `None` when the id is unknown.
    pub fn update(
        &self,
        id: &str,
        mutate: impl FnOnce(&mut Watcher),
    ) -> Result<Option<Watcher>> {
        let mut watchers = self.load();
        let Some(watcher) = watchers.iter_mut().find(|w| w.id == id) else {
            return Ok(None);
        };
        mutate(watcher);
        let updated = watcher.clone();
        self.save(&watchers)?;
        Ok(Some(updated))
    }

    /// Record successfully processed videos: extend the processed-id
    /// ring, stamp the check time, and count against today's cap.
    pub fn mark_processed(&self, id: &str, video_ids: &[String]) -> Result<Option<Watcher>> {
        let today = today_stamp();
        self.update(id, |watcher| {
            watcher.last_processed_ids.extend(video_ids.iter().cloned());
            let len = watcher.last_processed_ids.len();
            if len > MAX_PROCESSED_IDS {
                watcher.last_processed_ids.drain(..len - MAX_PROCESSED_IDS);
            }
            watcher.last_checked = Some(Utc::now().to_rfc3339());

            if watcher.uploads_today_date.as_deref() != Some(today.as_str()) {
                watcher.uploads_today = 0;
                watcher.uploads_today_date = Some(today.clone());
            }
            watcher.uploads_today += video_ids.len() as u64;
        })
    }

    /// Record a failed upload attempt for a video.
    pub fn mark_failed(&self, id: &str, video_id: &str, title: &str) -> Result<Option<Watcher>> {
        let now = Utc::now().to_rfc3339();
        self.update(id, |watcher| {
            if let Some(existing) = watcher.failed_videos.iter_mut().find(|f| f.id == video_id) {
                existing.attempts += 1;
                existing.last_attempt = now.clone();
            } else {
                watcher.failed_videos.push(FailedVideo {
                    id: video_id.to_string(),
                    title: if title.is_empty() {
                        video_id.to_string()
                    } else {
                        title.to_string()
                    },
                    attempts: 1,
                    last_attempt: now.clone(),
                });
            }
        })
    }

    pub fn clear_failed(&self, id: &str, video_id: &str) -> Result<Option<Watcher>> {
        self.update(id, |watcher| {
            watcher.failed_videos.retain(|f| f.id != video_id);
        })
    }
}

impl Default for WatchStore {
    fn default() -> Self {
        Self::new()
    }
}

fn today_stamp() -> String {
    Utc::now().format("%Y-%m-%d").to_string()
}

pub fn generate_id() -> String {
    let bytes: [u8; 6] = rand::thread_rng().gen();
    let hex: String = bytes.iter().map(|b| format!("{:02x}", b)).collect();
    format!("w_{}", hex)
}

/// Classify a channel URL into a watcher type.
pub fn normalize_type(url: &str) -> String {
    match Url::parse(url) {
        Ok(parsed)
            if parsed
                .host_str()
                .map(|h| h.to_lowercase().contains("twitch.tv"))
                .unwrap_or(false) =>
        {
            "twitch_channel".to_string()
        }
        _ => "youtube_channel".to_string(),
    }
}

/// Derive a short display label from a channel URL.
pub fn derive_label(url: &str) -> String {
    let Ok(parsed) = Url::parse(url) else {
        return "unknown".to_string();
    };
    let last = parsed
        .path_segments()
        .and_then(|segments| segments.filter(|s| !s.is_empty()).last().map(str::to_string))
        .or_else(|| parsed.host_str().map(str::to_string))
        .unwrap_or_else(|| "unknown".to_string());
    last.trim_start_matches('@').to_string()
}

/// Whether a URL points at a channel/user page rather than a single
/// video.
pub fn is_channel_url(url: &str) -> bool {
    let Ok(parsed) = Url::parse(url) else {
        return false;
    };
    let Some(host) = parsed.host_str().map(str::to_lowercase) else {
        return false;
    };
    let path = parsed.path().to_lowercase();

    if host.contains("youtube.com") || host.contains("youtu.be") {
        if path.contains("/watch") {
            return false;
        }
        return path.starts_with("/@")
            || path.starts_with("/c/")
            || path.starts_with("/channel/")
            || path.starts_with("/user/");
    }

    if host.contains("twitch.tv") {
        if path.contains("/videos") || path.contains("/clip") {
            return false;
        }
        return parsed
            .path_segments()
            .map(|segments| segments.filter(|s| !s.is_empty()).count() >= 1)
            .unwrap_or(false);
    }

    false
}

fn create_watcher(params: NewWatcher) -> Watcher {
    Watcher {
        id: generate_id(),
        watcher_type: normalize_type(&params.url),
        label: params
            .label
            .unwrap_or_else(|| derive_label(&params.url)),
        url: params.url.trim().to_string(),
        preset: params.preset.unwrap_or_else(|| "youtube".to_string()),
        configuration: params.configuration.unwrap_or(Value::Object(Default::default())),
        poll_interval_minutes: params.poll_interval_minutes.unwrap_or(30).clamp(5, 1440),
        max_duration_minutes: params.max_duration_minutes.unwrap_or(120).clamp(1, 720),
        max_daily_uploads: params.max_daily_uploads.unwrap_or(5).clamp(1, 50),
        output_dir: params.output_dir,
        enabled: true,
        last_checked: None,
        last_processed_ids: Vec::new(),
        failed_videos: Vec::new(),
        uploads_today: 0,
        uploads_today_date: None,
        created_at: Utc::now().to_rfc3339(),
    }
}

/// Uploads counted against today's cap; older counters reset to zero.
pub fn uploads_today(watcher: &Watcher) -> u64 {
    if watcher.uploads_today_date.as_deref() != Some(today_stamp().as_str()) {
        return 0;
    }
    watcher.uploads_today
}

pub fn remaining_uploads(watcher: &Watcher) -> u64 {
    watcher.max_daily_uploads.saturating_sub(uploads_today(watcher))
}

/// Filter channel videos down to the ones this watcher should process:
/// unseen, not permanently failed, and within the duration limit.
pub fn filter_new_videos(watcher: &Watcher, videos: &[ChannelVideo]) -> Vec<ChannelVideo> {
    let failed: Vec<&str> = watcher.failed_videos.iter().map(|f| f.id.as_str()).collect();
    videos
        .iter()
        .filter(|video| {
            if watcher.last_processed_ids.iter().any(|id| id == &video.id) {
                return false;
            }
            if failed.contains(&video.id.as_str()) {
                return false;
            }
            if watcher.max_duration_minutes > 0
                && video.duration > watcher.max_duration_minutes * 60
            {
                return false;
            }
            true
        })
        .cloned()
        .collect()
}

/// Failed videos still under the retry cap.
pub fn retryable_videos(watcher: &Watcher) -> Vec<FailedVideo> {
    watcher
        .failed_videos
        .iter()
        .filter(|f| f.attempts < MAX_VIDEO_RETRIES)
        .cloned()
        .collect()
}
