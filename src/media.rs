//! Media Fetch
//!
//! Wraps `yt-dlp` for pulling source videos from supported platforms:
//! availability probe, metadata inspection, download into a temp
//! directory, and channel VOD listing for the watch tools.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use rand::Rng;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tracing::{debug, warn};
use url::Url;

const SUPPORTED_DOMAINS: [&str; 7] = [
    "youtube.com",
    "youtu.be",
    "twitch.tv",
    "vimeo.com",
    "dailymotion.com",
    "streamable.com",
    "reddit.com",
];

const INFO_TIMEOUT: Duration = Duration::from_secs(30);
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(600);

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoInfo {
    pub title: String,
    pub duration: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uploader: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upload_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filesize: Option<u64>,
}

#[derive(Clone, Debug)]
pub struct DownloadedMedia {
    pub file_path: PathBuf,
    pub tmp_dir: PathBuf,
    pub file_size: u64,
    pub file_name: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelVideo {
    pub id: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    pub duration: u64,
}

pub fn is_url(input: &str) -> bool {
    matches!(Url::parse(input), Ok(url) if url.scheme() == "http" || url.scheme() == "https")
}

/// Whether the URL belongs to a platform yt-dlp is expected to handle.
pub fn is_supported_url(input: &str) -> bool {
    let Ok(url) = Url::parse(input) else {
        return false;
    };
    let Some(host) = url.host_str().map(str::to_lowercase) else {
        return false;
    };
    SUPPORTED_DOMAINS
        .iter()
        .any(|domain| host == *domain || host.ends_with(&format!(".{}", domain)))
}

/// Probe for a working yt-dlp binary.
pub async fn check_yt_dlp() -> (bool, Option<String>) {
    match Command::new("yt-dlp").arg("--version").output().await {
        Ok(output) if output.status.success() => {
            let version = String::from_utf8_lossy(&output.stdout).trim().to_string();
            (true, Some(version))
        }
        _ => (false, None),
    }
}

async fn run_yt_dlp(args: &[&str], timeout: Duration) -> Result<(String, String)> {
    let output = tokio::time::timeout(
        timeout,
        Command::new("yt-dlp").args(args).output(),
    )
    .await
    .context("yt-dlp timed out")?
    .context("Failed to run yt-dlp")?;

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();

    if !output.status.success() {
        anyhow::bail!(
            "yt-dlp exited with {}: {}",
            output.status,
            stderr.lines().last().unwrap_or("unknown error")
        );
    }
    Ok((stdout, stderr))
}

/// Fetch video metadata without downloading.
pub async fn get_video_info(url: &str) -> Result<VideoInfo> {
    let (stdout, _) = run_yt_dlp(&["--dump-json", "--no-download", url], INFO_TIMEOUT).await?;
    let info: serde_json::Value =
        serde_json::from_str(stdout.trim()).context("yt-dlp returned invalid JSON")?;

    Ok(VideoInfo {
        title: info
            .get("title")
            .and_then(serde_json::Value::as_str)
            .unwrap_or("Untitled")
            .to_string(),
        duration: info
            .get("duration")
            .and_then(serde_json::Value::as_f64)
            .unwrap_or(0.0) as u64,
        uploader: info
            .get("uploader")
            .and_then(serde_json::Value::as_str)
            .map(str::to_string),
        upload_date: info
            .get("upload_date")
            .and_then(serde_json::Value::as_str)
            .map(str::to_string),
        filesize: info
            .get("filesize_approx")
            .and_then(serde_json::Value::as_u64),
    })
}

fn make_tmp_dir() -> Result<PathBuf> {
    let suffix: u64 = rand::thread_rng().gen();
    let dir = std::env::temp_dir().join(format!("framecut-dl-{:012x}", suffix));
    std::fs::create_dir_all(&dir).context("Failed to create temp download dir")?;
    Ok(dir)
}

/// Extract the produced file path from yt-dlp output streams.
fn extract_output_path(stdout: &str, stderr: &str) -> Option<PathBuf> {
    let from_merge = Regex::new(r#"\[Merger\] Merging formats into "(.+)""#).ok()?;
    let from_existing = Regex::new(r"\[download\] (.+\.mp4) has already been downloaded").ok()?;
    let from_destination = Regex::new(r"\[download\] Destination: (.+)").ok()?;

    if let Some(caps) = from_merge.captures(stderr).or_else(|| from_merge.captures(stdout)) {
        return Some(PathBuf::from(&caps[1]));
    }
    if let Some(caps) = from_existing.captures(stderr) {
        return Some(PathBuf::from(&caps[1]));
    }
    if let Some(caps) = from_destination.captures(stdout) {
        return Some(PathBuf::from(&caps[1]));
    }
    None
}

/// Download a video to a fresh temp directory. The caller owns cleanup
/// of the returned `tmp_dir` (also on error, via the context attached).
pub async fn download(url: &str, max_duration_secs: Option<u64>) -> Result<DownloadedMedia> {
    let tmp_dir = make_tmp_dir()?;
    let output_template = tmp_dir.join("%(title)s.%(ext)s");
    let template = output_template.to_string_lossy().to_string();
    let duration_filter;

    let mut args = vec![
        "-f",
        "bestvideo[height<=1080]+bestaudio/best[height<=1080]/best",
        "--merge-output-format",
        "mp4",
        "--no-playlist",
        "--no-overwrites",
        "--restrict-filenames",
        "--output",
        &template,
    ];

    if let Some(max) = max_duration_secs {
        duration_filter = format!("duration<={}", max);
        args.push("--match-filter");
        args.push(&duration_filter);
    }
    args.push(url);

    let result = run_yt_dlp(&args, DOWNLOAD_TIMEOUT).await;
    let (stdout, stderr) = match result {
        Ok(streams) => streams,
        Err(err) => {
            cleanup(&tmp_dir).await;
            return Err(err);
        }
    };

    let file_path = extract_output_path(&stdout, &stderr).or_else(|| {
        // Fall back to scanning the temp dir for the produced mp4.
        std::fs::read_dir(&tmp_dir)
            .ok()?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .find(|path| {
                path.extension()
                    .map(|ext| ext.eq_ignore_ascii_case("mp4"))
                    .unwrap_or(false)
            })
    });

    let Some(file_path) = file_path else {
        cleanup(&tmp_dir).await;
        anyhow::bail!("Download completed but output file was not found");
    };

    let metadata = tokio::fs::metadata(&file_path)
        .await
        .context("Downloaded file is not readable")?;

    Ok(DownloadedMedia {
        file_name: file_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default(),
        file_size: metadata.len(),
        file_path,
        tmp_dir,
    })
}

/// Best-effort removal of a download temp directory.
pub async fn cleanup(tmp_dir: &Path) {
    if let Err(err) = tokio::fs::remove_dir_all(tmp_dir).await {
        debug!("cleanup of {} failed: {}", tmp_dir.display(), err);
    }
}

/// List the most recent VODs of a channel without downloading.
pub async fn list_channel_vods(channel_url: &str, limit: u32) -> Result<Vec<ChannelVideo>> {
    let limit_str = limit.to_string();
    let (stdout, _) = run_yt_dlp(
        &[
            "--flat-playlist",
            "--print",
            "%(id)s\t%(title)s\t%(upload_date)s\t%(duration)s",
            "--playlist-end",
            &limit_str,
            channel_url,
        ],
        INFO_TIMEOUT,
    )
    .await?;

    let videos = stdout
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| {
            let mut parts = line.split('\t');
            let id = parts.next()?.to_string();
            if id.is_empty() {
                warn!("skipping channel entry without id: {}", line);
                return None;
            }
            let title = parts.next().unwrap_or("").to_string();
            let date = parts.next().filter(|d| !d.is_empty() && *d != "NA");
            let duration = parts
                .next()
                .and_then(|d| d.trim().parse::<f64>().ok())
                .unwrap_or(0.0) as u64;
            Some(ChannelVideo {
                id,
                title,
                date: date.map(str::to_string),
                duration,
            })
        })
        .collect();

    Ok(videos)
}
