//! Thumbnails Tool
//!
//! Generates thumbnail variants for a completed project. Creator
//! Credits are only charged for variants that do not exist yet, so the
//! cost estimate counts the missing ones against the pricing catalog.

use anyhow::Result;
use serde_json::{json, Map, Value};

use crate::policy::spend::{authorize_action, SpendRequest};
use crate::types::ToolContext;

use super::{optional_bool, optional_f64, require_str};

const FALLBACK_STANDARD_COST: f64 = 8.0;
const FALLBACK_PREMIUM_COST: f64 = 32.0;

fn normalize_variants(value: Option<f64>) -> u64 {
    match value {
        Some(v) if v.is_finite() => v.round().clamp(1.0, 3.0) as u64,
        _ => 1,
    }
}

fn requested_variants(count: u64) -> Vec<&'static str> {
    let variants = ["A", "B", "C"];
    variants[..count.clamp(1, 3) as usize].to_vec()
}

struct ThumbnailCost {
    requested_variants: Vec<&'static str>,
    missing_variants: u64,
    creator_credits: u64,
}

/// Count the requested variants that do not exist yet and price them
/// from the catalog, falling back to known list prices.
fn estimate_creator_cost(
    pricing: Option<&Value>,
    existing_thumbnails: &[Value],
    requested_count: u64,
    premium_quality: bool,
) -> ThumbnailCost {
    let requested = requested_variants(requested_count);
    let existing: Vec<String> = existing_thumbnails
        .iter()
        .filter_map(|t| t.get("variant").and_then(Value::as_str))
        .map(|v| v.trim().to_uppercase())
        .filter(|v| !v.is_empty())
        .collect();

    let missing = requested
        .iter()
        .filter(|variant| !existing.contains(&variant.to_string()))
        .count() as u64;

    let pointer = if premium_quality {
        "/thumbnails/premium/costPerVariant"
    } else {
        "/thumbnails/standard/costPerVariant"
    };
    let per_variant = pricing
        .and_then(|p| p.pointer(pointer))
        .and_then(Value::as_f64)
        .unwrap_or(if premium_quality {
            FALLBACK_PREMIUM_COST
        } else {
            FALLBACK_STANDARD_COST
        });

    ThumbnailCost {
        requested_variants: requested,
        missing_variants: missing,
        creator_credits: (missing as f64 * per_variant).round().max(0.0) as u64,
    }
}

pub async fn execute(ctx: &ToolContext, args: Value) -> Result<Value> {
    let project_id = require_str(&args, "project_id")?;
    let variants = normalize_variants(optional_f64(&args, "variants"));
    let premium_quality = optional_bool(&args, "premium_quality").unwrap_or(false);

    let mut payload = Map::new();
    payload.insert("variants".to_string(), json!(variants));
    payload.insert("premiumQuality".to_string(), json!(premium_quality));
    if let Some(use_brand_colors) = optional_bool(&args, "use_brand_colors") {
        payload.insert("useBrandColors".to_string(), json!(use_brand_colors));
    }
    if let Some(use_brand_faces) = optional_bool(&args, "use_brand_faces") {
        payload.insert("useBrandFaces".to_string(), json!(use_brand_faces));
    }

    let (pricing, existing) = tokio::join!(
        ctx.client.get_pricing(),
        ctx.client.list_project_thumbnails(&project_id),
    );
    let pricing = pricing.ok();
    let existing_thumbnails = existing
        .ok()
        .and_then(|e| e.get("thumbnails").cloned())
        .and_then(|t| t.as_array().cloned())
        .unwrap_or_default();

    let cost = estimate_creator_cost(
        pricing.as_ref(),
        &existing_thumbnails,
        variants,
        premium_quality,
    );

    let authorization = authorize_action(
        ctx,
        SpendRequest {
            action: "thumbnails_generate".to_string(),
            action_label: Some("Generate thumbnails".to_string()),
            estimated_cost: json!({
                "apiCredits": 0,
                "creatorCredits": cost.creator_credits,
            }),
            confirm_spend: optional_bool(&args, "confirm_spend").unwrap_or(false),
            pricing,
            ..SpendRequest::default()
        },
    )
    .await?;

    let result = ctx
        .client
        .generate_project_thumbnails(&project_id, Value::Object(payload))
        .await?;

    let mut merged = Map::new();
    merged.insert("projectId".to_string(), Value::String(project_id));
    merged.insert(
        "spendPolicy".to_string(),
        serde_json::to_value(authorization.policy.mode)?,
    );
    merged.insert(
        "estimatedCost".to_string(),
        serde_json::to_value(authorization.estimated_cost)?,
    );
    merged.insert(
        "requestedVariants".to_string(),
        serde_json::to_value(&cost.requested_variants)?,
    );
    merged.insert("missingVariants".to_string(), json!(cost.missing_variants));
    if let Value::Object(result_map) = result {
        merged.extend(result_map);
    }
    Ok(Value::Object(merged))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_variants() {
        assert_eq!(normalize_variants(None), 1);
        assert_eq!(normalize_variants(Some(0.0)), 1);
        assert_eq!(normalize_variants(Some(2.0)), 2);
        assert_eq!(normalize_variants(Some(9.0)), 3);
    }

    #[test]
    fn test_estimate_counts_only_missing_variants() {
        let existing = vec![json!({"variant": "a"}), json!({"variant": "B"})];
        let cost = estimate_creator_cost(None, &existing, 3, false);
        assert_eq!(cost.requested_variants, vec!["A", "B", "C"]);
        assert_eq!(cost.missing_variants, 1);
        assert_eq!(cost.creator_credits, 8);
    }

    #[test]
    fn test_estimate_uses_catalog_price() {
        let pricing = json!({
            "thumbnails": {
                "standard": {"costPerVariant": 10},
                "premium": {"costPerVariant": 40}
            }
        });
        let cost = estimate_creator_cost(Some(&pricing), &[], 2, false);
        assert_eq!(cost.creator_credits, 20);

        let premium = estimate_creator_cost(Some(&pricing), &[], 2, true);
        assert_eq!(premium.creator_credits, 80);
    }

    #[test]
    fn test_estimate_premium_fallback_price() {
        let cost = estimate_creator_cost(None, &[], 1, true);
        assert_eq!(cost.creator_credits, 32);
    }

    #[test]
    fn test_estimate_zero_when_all_exist() {
        let existing = vec![json!({"variant": "A"})];
        let cost = estimate_creator_cost(None, &existing, 1, false);
        assert_eq!(cost.missing_variants, 0);
        assert_eq!(cost.creator_credits, 0);
    }
}
