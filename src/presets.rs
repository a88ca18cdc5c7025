//! Preset Catalog
//!
//! Named editing presets mapped to raw project configurations, plus the
//! deep-merge used to apply caller overrides on top of a preset.

use serde_json::{json, Map, Value};

pub const PRESET_NAMES: [&str; 8] = [
    "quick",
    "youtube",
    "shorts-only",
    "podcast",
    "gaming",
    "tutorial",
    "vlog",
    "cinematic",
];

/// Catalog entry metadata for listings.
#[derive(Clone, Debug, serde::Serialize)]
pub struct PresetSummary {
    pub name: &'static str,
    pub title: &'static str,
    pub description: &'static str,
}

pub fn list_presets() -> Vec<PresetSummary> {
    vec![
        PresetSummary {
            name: "quick",
            title: "Quick Cleanup",
            description: "Fast silence removal, no extras",
        },
        PresetSummary {
            name: "youtube",
            title: "YouTube Ready",
            description: "Full production with subtitles, shorts, and music",
        },
        PresetSummary {
            name: "shorts-only",
            title: "Shorts Machine",
            description: "Generate shorts only",
        },
        PresetSummary {
            name: "podcast",
            title: "Podcast Cleanup",
            description: "Talking-head cleanup with soft cuts",
        },
        PresetSummary {
            name: "gaming",
            title: "Gaming Montage",
            description: "Fast cuts with dynamic zoom",
        },
        PresetSummary {
            name: "tutorial",
            title: "Tutorial",
            description: "Educational workflow with gentle edits",
        },
        PresetSummary {
            name: "vlog",
            title: "Vlog Style",
            description: "Balanced editing with shorts and music",
        },
        PresetSummary {
            name: "cinematic",
            title: "Cinematic",
            description: "High-production settings",
        },
    ]
}

/// Resolve a preset name to its configuration. Unknown names error with
/// the available set listed.
pub fn resolve_preset(name: &str) -> anyhow::Result<Value> {
    let configuration = match name {
        "quick" => json!({
            "subtitle": false,
            "shorts": false,
            "musicEnabled": false,
            "zoom": true,
            "thumbnailVariantsRequested": 0,
        }),
        "youtube" => json!({
            "subtitle": true,
            "subtitlesOnVideo": true,
            "shorts": true,
            "shortsConfig": { "amount": 3, "minLength": 30, "maxLength": 60 },
            "musicEnabled": true,
            "musicType": null,
            "musicVolume": 15,
            "zoom": true,
            "thumbnailVariantsRequested": 2,
            "thumbnailAutoGenerate": true,
        }),
        "shorts-only" => json!({
            "onlyShorts": true,
            "subtitle": true,
            "subtitlesOnShorts": true,
            "shorts": true,
            "shortsConfig": { "amount": 5, "minLength": 15, "maxLength": 60 },
            "zoom": true,
            "zoomsOnShorts": true,
            "musicEnabled": true,
            "musicOnShorts": true,
        }),
        "podcast" => json!({
            "subtitle": true,
            "subtitlesOnVideo": true,
            "shorts": false,
            "musicEnabled": false,
            "zoom": false,
            "cutHardness": "soft",
            "thumbnailVariantsRequested": 0,
        }),
        "gaming" => json!({
            "gamingMode": true,
            "subtitle": true,
            "subtitlesOnShorts": true,
            "shorts": true,
            "shortsLayout": "split",
            "shortsConfig": { "amount": 3, "minLength": 20, "maxLength": 45 },
            "zoom": true,
            "zoomConfig": { "frequency": 3, "intensity": 3 },
            "musicEnabled": true,
            "musicType": "upbeat",
        }),
        "tutorial" => json!({
            "subtitle": true,
            "subtitlesOnVideo": true,
            "shorts": false,
            "musicEnabled": false,
            "zoom": true,
            "zoomConfig": { "frequency": 1, "intensity": 1 },
            "cutHardness": "soft",
            "thumbnailVariantsRequested": 1,
        }),
        "vlog" => json!({
            "subtitle": true,
            "shorts": true,
            "shortsConfig": { "amount": 3, "minLength": 30, "maxLength": 60 },
            "musicEnabled": true,
            "musicType": "chill",
            "musicVolume": 10,
            "zoom": true,
            "thumbnailVariantsRequested": 1,
        }),
        "cinematic" => json!({
            "premiumCut": true,
            "subtitle": true,
            "subtitlesOnVideo": true,
            "shorts": true,
            "shortsConfig": { "amount": 2, "minLength": 30, "maxLength": 60 },
            "musicEnabled": true,
            "musicType": "cinematic",
            "musicVolume": 20,
            "zoom": true,
            "zoomConfig": { "frequency": 2, "intensity": 2, "animationDuration": 0.5 },
            "thumbnailVariantsRequested": 2,
            "thumbnailPremiumQuality": true,
        }),
        other => anyhow::bail!(
            "Unknown preset \"{}\". Available: {}",
            other,
            PRESET_NAMES.join(", ")
        ),
    };
    Ok(configuration)
}

/// Merge an override configuration onto a base: objects merge
/// recursively, arrays and scalars replace.
pub fn merge_configurations(base: &Value, overrides: &Value) -> Value {
    match (base, overrides) {
        (Value::Object(base_map), Value::Object(override_map)) => {
            let mut merged: Map<String, Value> = base_map.clone();
            for (key, override_value) in override_map {
                let next = match (merged.get(key), override_value) {
                    (Some(existing @ Value::Object(_)), Value::Object(_)) => {
                        merge_configurations(existing, override_value)
                    }
                    _ => override_value.clone(),
                };
                merged.insert(key.clone(), next);
            }
            Value::Object(merged)
        }
        (_, overrides) => overrides.clone(),
    }
}
