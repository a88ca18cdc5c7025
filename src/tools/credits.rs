//! Credits, Pricing, Estimate, and Analytics Tools
//!
//! Balance reporting with upsell alerts, pricing with purchase links,
//! cost estimation passthrough, and usage analytics with milestone
//! insights.

use anyhow::Result;
use serde_json::{json, Map, Value};

use crate::policy::purchase::{build_from_pricing, recommend_bundle, PurchaseBundle, PurchaseLinks};
use crate::types::ToolContext;

use super::{next_steps, optional_str};

const MILESTONES: [u64; 3] = [10, 50, 100];

fn to_number(value: Option<&Value>) -> f64 {
    value.and_then(Value::as_f64).unwrap_or(0.0)
}

fn find_bundle<'a>(bundles: &'a [PurchaseBundle], id: &str) -> Option<&'a PurchaseBundle> {
    bundles
        .iter()
        .find(|b| b.id == id)
        .or_else(|| bundles.first())
}

/// Balance alerts: low API credits, subscription near its monthly
/// limit, first-success expansion nudges, and low Creator Credits.
fn build_alerts(
    credits: &Value,
    purchase_links: Option<&PurchaseLinks>,
    analytics: Option<&Value>,
) -> Vec<Value> {
    let mut alerts = Vec::new();

    let api_credits = to_number(
        credits
            .pointer("/apiCredits/total")
            .or_else(|| credits.get("total")),
    );
    let creator_credits = to_number(credits.pointer("/creatorCredits/total"));

    let api_bundles = purchase_links.map(|l| l.api_credits.as_slice());
    let creator_bundles = purchase_links.map(|l| l.creator_credits.as_slice());
    let recommend = |bundles: Option<&[PurchaseBundle]>, id: &str| -> Value {
        bundles
            .and_then(|b| find_bundle(b, id))
            .and_then(|bundle| serde_json::to_value(bundle).ok())
            .unwrap_or(Value::Null)
    };

    if api_credits <= 2.0 {
        alerts.push(json!({
            "type": "low_api_credits",
            "severity": "high",
            "message": "Heads up: API credits are low. Consider topping up to avoid interrupted uploads.",
            "recommendation": recommend(api_bundles, "starter"),
        }));
    }

    let monthly_limit = to_number(credits.pointer("/subscription/monthlyLimit"));
    let monthly_used = to_number(credits.pointer("/subscription/monthlyUsed"));
    if monthly_limit > 0.0 && monthly_used / monthly_limit >= 0.8 {
        alerts.push(json!({
            "type": "subscription_near_limit",
            "severity": "medium",
            "message": "Subscription usage is above 80% of the monthly limit. API credit bundles can extend capacity.",
            "recommendation": recommend(api_bundles, "casual"),
        }));
    }

    let this_month_projects = to_number(
        analytics.and_then(|a| a.pointer("/thisMonth/projectsProcessed")),
    );
    if (1.0..2.0).contains(&this_month_projects) {
        alerts.push(json!({
            "type": "first_success_expansion",
            "severity": "info",
            "message": "First project done. Next-step upgrades: thumbnails, cinematic preset, and brand consistency.",
            "recommendation": recommend(creator_bundles, "topup_s"),
        }));
    }

    if creator_credits > 0.0 && creator_credits <= 20.0 {
        alerts.push(json!({
            "type": "low_creator_credits",
            "severity": "medium",
            "message": "Creator Credits are getting low. Premium thumbnails and B-roll may fail without a top-up.",
            "recommendation": recommend(creator_bundles, "topup_m"),
        }));
    }

    alerts
}

pub async fn execute_credits(ctx: &ToolContext, _args: Value) -> Result<Value> {
    let (credits, pricing, analytics) = tokio::join!(
        ctx.client.get_credits(),
        ctx.client.get_pricing(),
        ctx.client.get_analytics(Some("this_month")),
    );
    let credits = credits?;
    let pricing = pricing.ok();
    let analytics = analytics.ok();

    let purchase_links = pricing
        .as_ref()
        .map(|p| build_from_pricing(p, &ctx.config.api_endpoint));
    let alerts = build_alerts(&credits, purchase_links.as_ref(), analytics.as_ref());

    let mut merged = Map::new();
    if let Value::Object(credits_map) = &credits {
        merged.extend(credits_map.clone());
    }
    merged.insert(
        "upsell".to_string(),
        json!({
            "alerts": alerts,
            "purchaseLinks": purchase_links,
        }),
    );
    merged.insert(
        "next_steps".to_string(),
        serde_json::to_value(next_steps::for_credits(&credits))?,
    );
    Ok(Value::Object(merged))
}

pub async fn execute_pricing(ctx: &ToolContext, _args: Value) -> Result<Value> {
    let pricing = ctx.client.get_pricing().await?;
    let purchase_links = build_from_pricing(&pricing, &ctx.config.api_endpoint);

    let recommended = json!({
        "apiCredits": recommend_bundle(&purchase_links.api_credits, 10),
        "creatorCredits": recommend_bundle(&purchase_links.creator_credits, 120),
        "subscriptionUpgradeUrl": purchase_links.subscriptions.creator,
    });

    let mut merged = Map::new();
    if let Value::Object(pricing_map) = &pricing {
        merged.extend(pricing_map.clone());
    }
    merged.insert(
        "purchaseLinks".to_string(),
        serde_json::to_value(&purchase_links)?,
    );
    merged.insert("recommended".to_string(), recommended);
    Ok(Value::Object(merged))
}

pub async fn execute_estimate(ctx: &ToolContext, args: Value) -> Result<Value> {
    let mut payload = Map::new();

    if let Some(preset) = optional_str(&args, "preset") {
        payload.insert("preset".to_string(), Value::String(preset));
    }

    if let Some(duration) = args.get("duration_minutes").and_then(Value::as_f64) {
        let clamped = duration.round().clamp(0.0, 24.0 * 60.0) as u64;
        payload.insert("durationMinutes".to_string(), json!(clamped));
    }

    if let Some(priority) = optional_str(&args, "priority") {
        let priority = priority.to_lowercase();
        if priority != "normal" && priority != "rush" {
            anyhow::bail!("priority must be \"normal\" or \"rush\"");
        }
        payload.insert("priority".to_string(), Value::String(priority));
    }

    if let Some(configuration) = args.get("configuration") {
        if !configuration.is_object() {
            anyhow::bail!("configuration must be an object");
        }
        payload.insert("configuration".to_string(), configuration.clone());
    }

    Ok(ctx.client.estimate_cost(Value::Object(payload)).await?)
}

pub async fn execute_analytics(ctx: &ToolContext, args: Value) -> Result<Value> {
    let period = match optional_str(&args, "period") {
        Some(raw) => {
            let normalized = raw.to_lowercase();
            if !["this_month", "last_month", "all_time"].contains(&normalized.as_str()) {
                anyhow::bail!("period must be one of: this_month, last_month, all_time");
            }
            Some(normalized)
        }
        None => None,
    };

    let analytics = ctx.client.get_analytics(period.as_deref()).await?;

    let processed = to_number(analytics.pointer("/allTime/projectsProcessed")) as u64;
    let milestone = MILESTONES
        .iter()
        .rev()
        .find(|&&m| processed >= m)
        .map(|&m| {
            json!({
                "reached": m,
                "message": format!("Milestone reached: {} projects processed.", m),
            })
        });

    let mut merged = Map::new();
    if let Value::Object(analytics_map) = &analytics {
        merged.extend(analytics_map.clone());
    }
    merged.insert("insights".to_string(), json!({ "milestone": milestone }));
    Ok(Value::Object(merged))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn links() -> PurchaseLinks {
        build_from_pricing(
            &json!({
                "apiCreditBundles": [
                    {"id": "starter", "credits": 10, "price": 9.0},
                    {"id": "casual", "credits": 50, "price": 39.0}
                ],
                "creatorCreditBundles": [
                    {"id": "topup_s", "credits": 100, "price": 12.0},
                    {"id": "topup_m", "credits": 400, "price": 40.0}
                ]
            }),
            "https://framecut.app",
        )
    }

    #[test]
    fn test_alerts_low_api_credits() {
        let credits = json!({"apiCredits": {"total": 1}});
        let links = links();
        let alerts = build_alerts(&credits, Some(&links), None);
        assert_eq!(alerts[0]["type"], "low_api_credits");
        assert_eq!(alerts[0]["recommendation"]["id"], "starter");
    }

    #[test]
    fn test_alerts_subscription_near_limit() {
        let credits = json!({
            "apiCredits": {"total": 50},
            "subscription": {"monthlyLimit": 100, "monthlyUsed": 85}
        });
        let alerts = build_alerts(&credits, Some(&links()), None);
        assert!(alerts
            .iter()
            .any(|a| a["type"] == "subscription_near_limit"));
    }

    #[test]
    fn test_alerts_first_success_and_low_creator() {
        let credits = json!({
            "apiCredits": {"total": 50},
            "creatorCredits": {"total": 15}
        });
        let analytics = json!({"thisMonth": {"projectsProcessed": 1}});
        let alerts = build_alerts(&credits, Some(&links()), Some(&analytics));
        let kinds: Vec<&str> = alerts
            .iter()
            .filter_map(|a| a["type"].as_str())
            .collect();
        assert!(kinds.contains(&"first_success_expansion"));
        assert!(kinds.contains(&"low_creator_credits"));
    }

    #[test]
    fn test_alerts_healthy_balance_is_quiet() {
        let credits = json!({
            "apiCredits": {"total": 50},
            "creatorCredits": {"total": 500},
            "subscription": {"monthlyLimit": 100, "monthlyUsed": 10}
        });
        assert!(build_alerts(&credits, Some(&links()), None).is_empty());
    }
}
