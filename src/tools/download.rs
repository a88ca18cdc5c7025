//! Download Tool
//!
//! Collects a project's output artifacts by requested type and streams
//! each one to a local directory derived from the project name.

use std::path::PathBuf;

use anyhow::Result;
use serde_json::{json, Value};

use crate::config::resolve_path;
use crate::types::ToolContext;

use super::{next_steps, optional_str, require_str};

#[derive(Clone, Debug)]
struct Artifact {
    kind: &'static str,
    url: String,
    file_name: String,
}

/// Reduce a project name to a filesystem-safe directory slug.
fn sanitize_name(value: &str) -> String {
    let cleaned: String = value
        .chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' => '-',
            c if c.is_whitespace() => '-',
            c => c,
        })
        .collect();
    let mut slug = cleaned.to_lowercase();
    while slug.contains("--") {
        slug = slug.replace("--", "-");
    }
    slug.chars().take(120).collect()
}

fn type_enabled(requested: &[String], candidate: &str) -> bool {
    requested.iter().any(|t| t == "all" || t == candidate)
}

fn push_url_artifact(
    artifacts: &mut Vec<Artifact>,
    kind: &'static str,
    url: Option<&Value>,
    file_name: String,
) {
    if let Some(url) = url.and_then(Value::as_str) {
        artifacts.push(Artifact {
            kind,
            url: url.to_string(),
            file_name,
        });
    }
}

/// Walk the results payload and collect the artifacts matching the
/// requested types.
fn collect_artifacts(results: &Value, requested: &[String]) -> Vec<Artifact> {
    let mut artifacts = Vec::new();
    let project_name = results
        .get("name")
        .and_then(Value::as_str)
        .unwrap_or("project");

    if type_enabled(requested, "main") {
        let file_name = results
            .pointer("/mainVideo/filename")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| format!("{}.mp4", project_name));
        push_url_artifact(
            &mut artifacts,
            "main",
            results.pointer("/mainVideo/url"),
            file_name,
        );
    }

    if type_enabled(requested, "shorts") {
        if let Some(shorts) = results.get("shorts").and_then(Value::as_array) {
            for (index, short) in shorts.iter().enumerate() {
                let file_name = short
                    .get("filename")
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("{}-short-{}.mp4", project_name, index + 1));
                push_url_artifact(&mut artifacts, "shorts", short.get("url"), file_name);
            }
        }
    }

    if type_enabled(requested, "subtitles") {
        push_url_artifact(
            &mut artifacts,
            "subtitles",
            results.pointer("/subtitles/url"),
            "subtitles.srt".to_string(),
        );
    }

    if type_enabled(requested, "transcription") {
        push_url_artifact(
            &mut artifacts,
            "transcription",
            results.pointer("/transcription/url"),
            "transcription.json".to_string(),
        );
    }

    let timeline_exports = results
        .get("timelineExports")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();
    let timeline_kinds: [(&'static str, &str, &str); 3] = [
        ("timeline-edl", "edl", "timeline.edl"),
        ("timeline-fcpxml", "fcpxml", "timeline.fcpxml"),
        ("timeline-xml", "premiere-xml", "timeline.xml"),
    ];
    for (kind, format, default_name) in timeline_kinds {
        if !type_enabled(requested, kind) {
            continue;
        }
        if let Some(export) = timeline_exports
            .iter()
            .find(|item| item.get("format").and_then(Value::as_str) == Some(format))
        {
            let file_name = export
                .get("filename")
                .and_then(Value::as_str)
                .unwrap_or(default_name)
                .to_string();
            push_url_artifact(&mut artifacts, kind, export.get("url"), file_name);
        }
    }

    if type_enabled(requested, "thumbnails") {
        if let Some(thumbnails) = results.get("thumbnails").and_then(Value::as_array) {
            for thumbnail in thumbnails {
                let Some(url) = thumbnail.get("imageUrl").and_then(Value::as_str) else {
                    continue;
                };
                let variant = thumbnail
                    .get("variant")
                    .and_then(Value::as_str)
                    .unwrap_or("x")
                    .to_lowercase();
                artifacts.push(Artifact {
                    kind: "thumbnails",
                    url: url.to_string(),
                    file_name: format!("thumbnails/thumbnail-{}.png", variant),
                });
            }
        }
    }

    artifacts
}

pub async fn execute(ctx: &ToolContext, args: Value) -> Result<Value> {
    let project_id = require_str(&args, "project_id")?;
    let results = ctx.client.get_project_results(&project_id).await?;

    let requested: Vec<String> = args
        .get("types")
        .and_then(Value::as_array)
        .map(|types| {
            types
                .iter()
                .filter_map(Value::as_str)
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .collect()
        })
        .filter(|types: &Vec<String>| !types.is_empty())
        .unwrap_or_else(|| vec!["all".to_string()]);

    let project_slug = sanitize_name(
        results
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or(&project_id),
    );
    let base_output_dir = optional_str(&args, "output_dir")
        .unwrap_or_else(|| format!("{}/{}", ctx.config.download_dir, project_slug));
    let output_dir = PathBuf::from(resolve_path(&base_output_dir));
    tokio::fs::create_dir_all(&output_dir).await?;

    let artifacts = collect_artifacts(&results, &requested);
    let mut downloaded = Vec::new();

    for artifact in &artifacts {
        let destination = output_dir.join(&artifact.file_name);
        let file = ctx.client.download_file(&artifact.url, &destination).await?;
        downloaded.push(json!({
            "kind": artifact.kind,
            "sourceUrl": file.url,
            "localPath": file.path,
        }));
    }

    Ok(json!({
        "projectId": project_id,
        "outputDir": output_dir,
        "downloaded": downloaded,
        "retentionTimeRemaining": results.get("retentionTimeRemaining"),
        "next_steps": next_steps::for_download(&results),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn results() -> Value {
        json!({
            "name": "My Video",
            "mainVideo": {"url": "https://cdn/main.mp4", "filename": "main.mp4"},
            "shorts": [
                {"url": "https://cdn/s1.mp4"},
                {"url": "https://cdn/s2.mp4", "filename": "clip2.mp4"}
            ],
            "subtitles": {"url": "https://cdn/subs.srt"},
            "timelineExports": [
                {"format": "edl", "url": "https://cdn/t.edl"},
                {"format": "premiere-xml", "url": "https://cdn/t.xml", "filename": "cut.xml"}
            ],
            "thumbnails": [
                {"variant": "A", "imageUrl": "https://cdn/a.png"},
                {"variant": "B"}
            ]
        })
    }

    #[test]
    fn test_sanitize_name() {
        assert_eq!(sanitize_name("My Video: Part 2"), "my-video-part-2");
        assert_eq!(sanitize_name("a/b\\c"), "a-b-c");
        let long = "x".repeat(200);
        assert_eq!(sanitize_name(&long).len(), 120);
    }

    #[test]
    fn test_collect_all_artifacts() {
        let artifacts = collect_artifacts(&results(), &["all".to_string()]);
        let kinds: Vec<&str> = artifacts.iter().map(|a| a.kind).collect();
        assert_eq!(
            kinds,
            vec![
                "main",
                "shorts",
                "shorts",
                "subtitles",
                "timeline-edl",
                "timeline-xml",
                "thumbnails"
            ]
        );
        // Missing filename falls back to a derived name; thumbnails
        // without an imageUrl are skipped.
        assert_eq!(artifacts[1].file_name, "My Video-short-1.mp4");
        assert_eq!(artifacts[2].file_name, "clip2.mp4");
        assert_eq!(artifacts[6].file_name, "thumbnails/thumbnail-a.png");
    }

    #[test]
    fn test_collect_filters_by_type() {
        let artifacts = collect_artifacts(&results(), &["shorts".to_string()]);
        assert_eq!(artifacts.len(), 2);
        assert!(artifacts.iter().all(|a| a.kind == "shorts"));
    }
}
