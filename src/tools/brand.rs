//! Brand & Asset Tools
//!
//! Brand kit get/update with field-alias normalization, brand import
//! from a channel URL, and intro/outro/watermark asset management.

use std::path::Path;

use anyhow::Result;
use serde_json::{json, Map, Value};

use crate::types::ToolContext;

use super::{optional_bool, optional_str, require_str};

/// snake_case tool parameters mapped to the camelCase wire fields.
const FIELD_ALIASES: [(&str, &str); 15] = [
    ("channel_name", "channelName"),
    ("primary_color", "primaryColor"),
    ("secondary_color", "secondaryColor"),
    ("brand_identity", "brandIdentity"),
    ("channel_pitch", "channelPitch"),
    ("posting_plan", "postingPlan"),
    ("scripts_content_category", "scriptsContentCategory"),
    ("scripts_channel_about", "scriptsChannelAbout"),
    ("scripts_speaking_style", "scriptsSpeakingStyle"),
    ("scripts_viewers_should_feel", "scriptsViewersShouldFeel"),
    ("scripts_viewers_should_be", "scriptsViewersShouldBe"),
    ("subtitle_font_id", "subtitleFontId"),
    ("thumbnail_font_id", "thumbnailFontId"),
    ("default_intro_enabled", "defaultIntroEnabled"),
    ("default_outro_enabled", "defaultOutroEnabled"),
];

fn alias_for(key: &str) -> &str {
    FIELD_ALIASES
        .iter()
        .find(|(snake, _)| *snake == key)
        .map(|(_, camel)| *camel)
        .unwrap_or(key)
}

/// The update payload comes either as an explicit `updates` object or
/// as loose top-level fields; either way, snake_case keys are mapped
/// to their wire names.
fn resolve_update_payload(args: &Value) -> Map<String, Value> {
    let source: Map<String, Value> = match args.get("updates") {
        Some(Value::Object(updates)) => updates.clone(),
        _ => args
            .as_object()
            .cloned()
            .unwrap_or_default(),
    };

    source
        .into_iter()
        .filter(|(key, _)| key != "action" && key != "updates")
        .map(|(key, value)| (alias_for(&key).to_string(), value))
        .collect()
}

pub async fn execute_brand(ctx: &ToolContext, args: Value) -> Result<Value> {
    let action = optional_str(&args, "action").unwrap_or_else(|| "get".to_string());

    if action == "get" {
        let brand = ctx.client.get_brand().await?;
        return Ok(json!({ "action": "get", "brand": brand }));
    }

    if action != "update" {
        anyhow::bail!("action must be \"get\" or \"update\"");
    }

    let payload = resolve_update_payload(&args);
    if payload.is_empty() {
        anyhow::bail!("No brand fields were provided to update");
    }

    let updated_fields: Vec<String> = payload.keys().cloned().collect();
    let brand = ctx.client.update_brand(Value::Object(payload)).await?;

    Ok(json!({
        "action": "update",
        "updatedFields": updated_fields,
        "brand": brand,
    }))
}

pub async fn execute_brand_import(ctx: &ToolContext, args: Value) -> Result<Value> {
    let url = require_str(&args, "url")?;
    if url.len() > 2048 {
        anyhow::bail!("URL is too long (max 2048 characters)");
    }
    if !url.starts_with("http://") && !url.starts_with("https://") {
        anyhow::bail!("URL must start with http:// or https://");
    }

    let apply = optional_bool(&args, "apply").unwrap_or(false);
    let result = ctx.client.import_brand(&url, apply).await?;

    let mut merged = Map::new();
    merged.insert(
        "action".to_string(),
        Value::String(if apply { "apply" } else { "preview" }.to_string()),
    );
    if let Value::Object(result_map) = result {
        merged.extend(result_map);
    }
    Ok(Value::Object(merged))
}

const ASSET_TYPES: [&str; 3] = ["intro", "outro", "watermark"];

fn assert_asset_type(asset_type: &str) -> Result<()> {
    if !ASSET_TYPES.contains(&asset_type) {
        anyhow::bail!("asset_type must be one of: intro, outro, watermark");
    }
    Ok(())
}

pub async fn execute_assets(ctx: &ToolContext, args: Value) -> Result<Value> {
    let action = optional_str(&args, "action").unwrap_or_else(|| "list".to_string());

    match action.as_str() {
        "list" => {
            let result = ctx.client.list_assets().await?;
            let mut merged = Map::new();
            merged.insert("action".to_string(), Value::String("list".to_string()));
            if let Value::Object(result_map) = result {
                merged.extend(result_map);
            }
            Ok(Value::Object(merged))
        }
        "upload" => {
            let asset_type = optional_str(&args, "asset_type")
                .map(|t| t.to_lowercase())
                .unwrap_or_default();
            assert_asset_type(&asset_type)?;
            let file_path = require_str(&args, "file_path")?;
            if !Path::new(&file_path).exists() {
                anyhow::bail!("File not found: {}", file_path);
            }

            let result = ctx
                .client
                .upload_asset(&asset_type, Path::new(&file_path))
                .await?;
            let latest = ctx.client.list_assets().await.ok();

            Ok(json!({
                "action": "upload",
                "assetType": asset_type,
                "filePath": file_path,
                "result": result,
                "assets": latest.as_ref().and_then(|l| l.get("assets")).cloned(),
            }))
        }
        "delete" => {
            let asset_id = optional_str(&args, "asset_type")
                .or_else(|| optional_str(&args, "asset_id"))
                .map(|t| t.to_lowercase())
                .unwrap_or_default();
            if asset_id.is_empty() {
                anyhow::bail!(
                    "asset_type is required for action=delete (intro, outro, or watermark)"
                );
            }
            assert_asset_type(&asset_id)?;

            let result = ctx.client.delete_asset(&asset_id).await?;
            let latest = ctx.client.list_assets().await.ok();

            Ok(json!({
                "action": "delete",
                "assetId": asset_id,
                "result": result,
                "assets": latest.as_ref().and_then(|l| l.get("assets")).cloned(),
            }))
        }
        _ => anyhow::bail!("action must be one of: \"list\", \"upload\", \"delete\""),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alias_mapping() {
        assert_eq!(alias_for("primary_color"), "primaryColor");
        assert_eq!(alias_for("alreadyCamel"), "alreadyCamel");
    }

    #[test]
    fn test_resolve_update_payload_from_updates_object() {
        let args = json!({
            "action": "update",
            "updates": {"primary_color": "#ff0000", "channelName": "Mine"}
        });
        let payload = resolve_update_payload(&args);
        assert_eq!(payload["primaryColor"], "#ff0000");
        assert_eq!(payload["channelName"], "Mine");
        assert!(!payload.contains_key("action"));
    }

    #[test]
    fn test_resolve_update_payload_from_loose_fields() {
        let args = json!({
            "action": "update",
            "channel_name": "Mine",
            "default_intro_enabled": true
        });
        let payload = resolve_update_payload(&args);
        assert_eq!(payload["channelName"], "Mine");
        assert_eq!(payload["defaultIntroEnabled"], true);
        assert_eq!(payload.len(), 2);
    }

    #[test]
    fn test_assert_asset_type() {
        assert!(assert_asset_type("intro").is_ok());
        assert!(assert_asset_type("banner").is_err());
    }
}
