//! Spend Policy Engine
//!
//! Decides whether a proposed paid action may proceed unconditionally,
//! must be blocked pending explicit user confirmation, or must be
//! rejected for insufficient funds. Credits are never spent without the
//! caller having authorized them: every rejection is a terminal
//! decision that requires either approval-and-retry or a top-up.

use serde::Serialize;
use serde_json::Value;

use crate::studio::error::{StudioError, StudioResult};
use crate::types::{
    default_spend_policy, BalanceSnapshot, CostEstimate, MonthlyUsage, NeededCredits, SpendMode,
    SpendPolicyConfig, ToolContext,
};

use super::purchase::{build_hints, PurchaseHints};

// ─── Configuration loading ───────────────────────────────────────

/// Parse a numeric knob, clamping into `[min, max]`. Non-numeric input
/// falls back to the default silently.
fn clamped_knob(raw: Option<String>, fallback: f64, min: f64, max: f64) -> f64 {
    match raw.and_then(|s| s.trim().parse::<f64>().ok()) {
        Some(n) if n.is_finite() => n.clamp(min, max),
        _ => fallback,
    }
}

fn parse_mode(raw: Option<String>) -> SpendMode {
    match raw.as_deref().map(|s| s.trim().to_lowercase()).as_deref() {
        Some("explicit") => SpendMode::Explicit,
        Some("smart") => SpendMode::Smart,
        _ => SpendMode::Auto,
    }
}

/// Load the spend policy from a key/value lookup. Split from `from_env`
/// so tests can supply their own environment.
pub fn policy_from_lookup(get: impl Fn(&str) -> Option<String>) -> SpendPolicyConfig {
    let defaults = default_spend_policy();
    SpendPolicyConfig {
        mode: parse_mode(get("FRAMECUT_SPEND_POLICY")),
        smart_api_confirm_threshold: clamped_knob(
            get("FRAMECUT_SMART_CONFIRM_API_THRESHOLD"),
            defaults.smart_api_confirm_threshold,
            1.0,
            20.0,
        ),
        smart_creator_confirm_threshold: clamped_knob(
            get("FRAMECUT_SMART_CONFIRM_CREATOR_THRESHOLD"),
            defaults.smart_creator_confirm_threshold,
            1.0,
            10_000.0,
        ),
        low_api_balance_threshold: clamped_knob(
            get("FRAMECUT_SMART_CONFIRM_LOW_API_BALANCE"),
            defaults.low_api_balance_threshold,
            0.0,
            1_000.0,
        ),
        low_creator_balance_threshold: clamped_knob(
            get("FRAMECUT_SMART_CONFIRM_LOW_CREATOR_BALANCE"),
            defaults.low_creator_balance_threshold,
            0.0,
            100_000.0,
        ),
        auto_max_api_per_action: clamped_knob(
            get("FRAMECUT_AUTO_SPEND_MAX_API_PER_ACTION"),
            defaults.auto_max_api_per_action,
            1.0,
            1_000.0,
        ),
        auto_max_creator_per_action: clamped_knob(
            get("FRAMECUT_AUTO_SPEND_MAX_CREATOR_PER_ACTION"),
            defaults.auto_max_creator_per_action,
            1.0,
            100_000.0,
        ),
        auto_max_api_per_month: clamped_knob(
            get("FRAMECUT_AUTO_SPEND_MAX_API_PER_MONTH"),
            defaults.auto_max_api_per_month,
            1.0,
            100_000.0,
        ),
        auto_max_creator_per_month: clamped_knob(
            get("FRAMECUT_AUTO_SPEND_MAX_CREATOR_PER_MONTH"),
            defaults.auto_max_creator_per_month,
            1.0,
            1_000_000.0,
        ),
    }
}

pub fn policy_from_env() -> SpendPolicyConfig {
    policy_from_lookup(|key| std::env::var(key).ok())
}

// ─── Normalization ───────────────────────────────────────────────

fn get_path<'a>(value: &'a Value, path: &[&str]) -> Option<&'a Value> {
    let mut current = value;
    for key in path {
        current = current.get(key)?;
    }
    Some(current)
}

/// First numeric value among candidate paths. Non-numeric nodes
/// (objects, strings) are skipped so nested shapes fall through.
fn first_number(value: &Value, paths: &[&[&str]]) -> Option<f64> {
    paths
        .iter()
        .find_map(|path| get_path(value, path).and_then(Value::as_f64))
}

fn to_credits(n: Option<f64>) -> u64 {
    n.map(|n| n.round().max(0.0) as u64).unwrap_or(0)
}

/// Normalize a cost estimate from the upstream shapes the estimate
/// endpoint and callers produce: flat fields, nested `totalCost`, and
/// the `creator.total` / bare `api` variants.
pub fn normalize_cost(estimated_cost: &Value) -> CostEstimate {
    CostEstimate {
        api_credits: to_credits(first_number(
            estimated_cost,
            &[&["apiCredits"], &["totalCost", "apiCredits"], &["api"]],
        )),
        creator_credits: to_credits(first_number(
            estimated_cost,
            &[
                &["creatorCredits"],
                &["totalCost", "creatorCredits"],
                &["creator", "total"],
            ],
        )),
    }
}

/// Normalize the credits endpoint payload into a balance snapshot.
pub fn normalize_balance(credits: &Value) -> BalanceSnapshot {
    BalanceSnapshot {
        api_credits: to_credits(first_number(
            credits,
            &[&["apiCredits", "total"], &["total"]],
        )),
        creator_credits: to_credits(first_number(credits, &[&["creatorCredits", "total"]])),
        subscription_tier: get_path(credits, &["subscription", "tier"])
            .or_else(|| credits.get("membership"))
            .and_then(Value::as_str)
            .unwrap_or("unknown")
            .to_string(),
        subscription_monthly_limit: to_credits(first_number(
            credits,
            &[&["subscription", "monthlyLimit"]],
        )),
        subscription_monthly_used: to_credits(first_number(
            credits,
            &[&["subscription", "monthlyUsed"]],
        )),
        subscription_monthly_remaining: to_credits(first_number(
            credits,
            &[&["subscription", "monthlyRemaining"]],
        )),
    }
}

/// Normalize the analytics payload into current-month usage.
pub fn normalize_monthly_usage(analytics: &Value) -> MonthlyUsage {
    MonthlyUsage {
        api_credits_used: to_credits(first_number(analytics, &[&["thisMonth", "apiCreditsUsed"]])),
        creator_credits_used: to_credits(first_number(
            analytics,
            &[&["thisMonth", "creatorCreditsUsed"]],
        )),
        projects_processed: to_credits(first_number(
            analytics,
            &[&["thisMonth", "projectsProcessed"]],
        )),
    }
}

pub fn needed_credits(cost: &CostEstimate, balance: &BalanceSnapshot) -> NeededCredits {
    NeededCredits {
        api_credits_needed: cost.api_credits.saturating_sub(balance.api_credits),
        creator_credits_needed: cost.creator_credits.saturating_sub(balance.creator_credits),
    }
}

// ─── Trigger evaluation ──────────────────────────────────────────

pub fn evaluate_smart_policy(
    policy: &SpendPolicyConfig,
    cost: &CostEstimate,
    balance: &BalanceSnapshot,
) -> Vec<String> {
    let mut triggers = Vec::new();
    if cost.api_credits as f64 >= policy.smart_api_confirm_threshold {
        triggers.push("api_cost_threshold".to_string());
    }
    if cost.creator_credits as f64 >= policy.smart_creator_confirm_threshold {
        triggers.push("creator_cost_threshold".to_string());
    }
    if cost.api_credits > 0 && balance.api_credits as f64 <= policy.low_api_balance_threshold {
        triggers.push("low_api_balance".to_string());
    }
    if cost.creator_credits > 0
        && balance.creator_credits as f64 <= policy.low_creator_balance_threshold
    {
        triggers.push("low_creator_balance".to_string());
    }
    triggers
}

pub fn evaluate_auto_caps(
    policy: &SpendPolicyConfig,
    cost: &CostEstimate,
    monthly_usage: Option<&MonthlyUsage>,
) -> Vec<String> {
    let mut triggers = Vec::new();
    if cost.api_credits as f64 > policy.auto_max_api_per_action {
        triggers.push("auto_api_action_cap".to_string());
    }
    if cost.creator_credits as f64 > policy.auto_max_creator_per_action {
        triggers.push("auto_creator_action_cap".to_string());
    }

    if let Some(usage) = monthly_usage {
        if (usage.api_credits_used + cost.api_credits) as f64 > policy.auto_max_api_per_month {
            triggers.push("auto_api_month_cap".to_string());
        }
        if (usage.creator_credits_used + cost.creator_credits) as f64
            > policy.auto_max_creator_per_month
        {
            triggers.push("auto_creator_month_cap".to_string());
        }
    }

    triggers
}

pub fn trigger_messages(triggers: &[String]) -> Vec<String> {
    triggers
        .iter()
        .filter_map(|code| match code.as_str() {
            "explicit_policy" => Some("Spend policy requires explicit confirmation."),
            "api_cost_threshold" => Some("API credit cost exceeds smart confirmation threshold."),
            "creator_cost_threshold" => {
                Some("Creator Credit cost exceeds smart confirmation threshold.")
            }
            "low_api_balance" => Some("API balance is low for this spend."),
            "low_creator_balance" => Some("Creator Credit balance is low for this spend."),
            "auto_api_action_cap" => Some("Auto-spend API per-action cap exceeded."),
            "auto_creator_action_cap" => Some("Auto-spend Creator per-action cap exceeded."),
            "auto_api_month_cap" => Some("Auto-spend API monthly cap would be exceeded."),
            "auto_creator_month_cap" => Some("Auto-spend Creator monthly cap would be exceeded."),
            _ => None,
        })
        .map(str::to_string)
        .collect()
}

// ─── Authorization ───────────────────────────────────────────────

/// A proposed paid action submitted for authorization.
#[derive(Clone, Debug, Default)]
pub struct SpendRequest {
    pub action: String,
    pub action_label: Option<String>,
    /// Raw estimated cost in any of the supported upstream shapes.
    pub estimated_cost: Value,
    pub confirm_spend: bool,
    /// Pre-fetched payloads; when absent they are fetched here.
    pub credits: Option<Value>,
    pub pricing: Option<Value>,
    pub analytics: Option<Value>,
}

/// A granted authorization. Rejections are `StudioError`s with code
/// `insufficient_credits_precheck` or `spend_confirmation_required`.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpendAuthorization {
    pub action: String,
    pub action_label: String,
    pub policy: SpendPolicyConfig,
    pub estimated_cost: CostEstimate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub balance: Option<BalanceSnapshot>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub monthly_usage: Option<MonthlyUsage>,
    pub confirmation_required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confirmed: Option<bool>,
    pub triggers: Vec<String>,
}

fn confirmation_required_error(details: Value) -> StudioError {
    StudioError::new(
        "spend_confirmation_required",
        409,
        "Confirmation required before spending credits. Re-run with confirm_spend: true after user approval.",
    )
    .with_details(details)
}

fn insufficient_credits_error(details: Value) -> StudioError {
    StudioError::new(
        "insufficient_credits_precheck",
        402,
        "Insufficient credits for this action.",
    )
    .with_details(details)
}

fn hints_value(hints: &Option<PurchaseHints>) -> Value {
    hints
        .as_ref()
        .and_then(|h| serde_json::to_value(h).ok())
        .unwrap_or(Value::Null)
}

/// Authorize a proposed paid action against the configured policy.
///
/// Free actions bypass all checks without touching the network. The
/// pricing fetch is best-effort (hints degrade to null); balance and
/// monthly-usage fetches are required and their failures are fatal.
pub async fn authorize_action(
    ctx: &ToolContext,
    request: SpendRequest,
) -> StudioResult<SpendAuthorization> {
    let SpendRequest {
        action,
        action_label,
        estimated_cost,
        confirm_spend,
        credits: supplied_credits,
        pricing: supplied_pricing,
        analytics: supplied_analytics,
    } = request;

    let policy = ctx.config.spend_policy.clone();
    let action = if action.is_empty() {
        "paid_action".to_string()
    } else {
        action
    };
    let action_label = action_label.unwrap_or_else(|| action.clone());
    let estimated_cost = normalize_cost(&estimated_cost);

    if !estimated_cost.is_paid() {
        return Ok(SpendAuthorization {
            action,
            action_label,
            policy,
            estimated_cost,
            balance: None,
            monthly_usage: None,
            confirmation_required: false,
            confirmed: None,
            triggers: Vec::new(),
        });
    }

    // Balance is required; pricing is only used for purchase hints and
    // its failure is swallowed. Both are fetched concurrently.
    let (credits, pricing) = tokio::join!(
        async {
            match supplied_credits {
                Some(value) => Ok(value),
                None => ctx.client.get_credits().await,
            }
        },
        async {
            match supplied_pricing {
                Some(value) => Some(value),
                None => ctx.client.get_pricing().await.ok(),
            }
        }
    );
    let credits = credits?;

    let balance = normalize_balance(&credits);
    let needed = needed_credits(&estimated_cost, &balance);
    let purchase_hints = build_hints(pricing.as_ref(), &ctx.config.api_endpoint, &needed);

    if needed.any() {
        return Err(insufficient_credits_error(serde_json::json!({
            "action": action,
            "actionLabel": action_label,
            "policy": policy.mode,
            "estimatedCost": estimated_cost,
            "balance": balance,
            "neededCredits": needed,
            "purchaseLinks": hints_value(&purchase_hints),
        })));
    }

    let monthly_usage = if policy.mode == SpendMode::Auto {
        let analytics = match supplied_analytics {
            Some(value) => value,
            None => ctx.client.get_analytics(Some("this_month")).await?,
        };
        Some(normalize_monthly_usage(&analytics))
    } else {
        None
    };

    if confirm_spend {
        return Ok(SpendAuthorization {
            action,
            action_label,
            policy,
            estimated_cost,
            balance: Some(balance),
            monthly_usage,
            confirmation_required: false,
            confirmed: Some(true),
            triggers: Vec::new(),
        });
    }

    let triggers = match policy.mode {
        SpendMode::Explicit => vec!["explicit_policy".to_string()],
        SpendMode::Smart => evaluate_smart_policy(&policy, &estimated_cost, &balance),
        SpendMode::Auto => evaluate_auto_caps(&policy, &estimated_cost, monthly_usage.as_ref()),
    };

    if !triggers.is_empty() {
        return Err(confirmation_required_error(serde_json::json!({
            "action": action,
            "actionLabel": action_label,
            "policy": policy.mode,
            "estimatedCost": estimated_cost,
            "balance": balance,
            "monthlyUsage": monthly_usage,
            "triggers": triggers,
            "triggerMessages": trigger_messages(&triggers),
            "purchaseLinks": hints_value(&purchase_hints),
            "nextStep": "Ask the user for approval and re-run with confirm_spend: true if they agree.",
        })));
    }

    Ok(SpendAuthorization {
        action,
        action_label,
        policy,
        estimated_cost,
        balance: Some(balance),
        monthly_usage,
        confirmation_required: false,
        confirmed: Some(false),
        triggers,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn policy_with(mode: SpendMode) -> SpendPolicyConfig {
        SpendPolicyConfig {
            mode,
            ..default_spend_policy()
        }
    }

    fn balance(api: u64, creator: u64) -> BalanceSnapshot {
        BalanceSnapshot {
            api_credits: api,
            creator_credits: creator,
            subscription_tier: "unknown".to_string(),
            subscription_monthly_limit: 0,
            subscription_monthly_used: 0,
            subscription_monthly_remaining: 0,
        }
    }

    #[test]
    fn test_clamped_knob() {
        assert_eq!(clamped_knob(Some("5".into()), 2.0, 1.0, 20.0), 5.0);
        assert_eq!(clamped_knob(Some("50".into()), 2.0, 1.0, 20.0), 20.0);
        assert_eq!(clamped_knob(Some("0".into()), 2.0, 1.0, 20.0), 1.0);
        assert_eq!(clamped_knob(Some("nope".into()), 2.0, 1.0, 20.0), 2.0);
        assert_eq!(clamped_knob(None, 2.0, 1.0, 20.0), 2.0);
    }

    #[test]
    fn test_policy_from_lookup_defaults() {
        let policy = policy_from_lookup(|_| None);
        assert_eq!(policy.mode, SpendMode::Auto);
        assert_eq!(policy.smart_api_confirm_threshold, 2.0);
        assert_eq!(policy.smart_creator_confirm_threshold, 8.0);
        assert_eq!(policy.low_api_balance_threshold, 2.0);
        assert_eq!(policy.low_creator_balance_threshold, 20.0);
        assert_eq!(policy.auto_max_api_per_action, 2.0);
        assert_eq!(policy.auto_max_creator_per_action, 40.0);
        assert_eq!(policy.auto_max_api_per_month, 80.0);
        assert_eq!(policy.auto_max_creator_per_month, 400.0);
    }

    #[test]
    fn test_policy_from_lookup_overrides() {
        let policy = policy_from_lookup(|key| match key {
            "FRAMECUT_SPEND_POLICY" => Some(" Smart ".to_string()),
            "FRAMECUT_SMART_CONFIRM_API_THRESHOLD" => Some("4".to_string()),
            _ => None,
        });
        assert_eq!(policy.mode, SpendMode::Smart);
        assert_eq!(policy.smart_api_confirm_threshold, 4.0);
    }

    #[test]
    fn test_unknown_mode_falls_back_to_auto() {
        let policy = policy_from_lookup(|key| match key {
            "FRAMECUT_SPEND_POLICY" => Some("yolo".to_string()),
            _ => None,
        });
        assert_eq!(policy.mode, SpendMode::Auto);
    }

    #[test]
    fn test_normalize_cost_flat_fields() {
        let cost = normalize_cost(&json!({"apiCredits": 2, "creatorCredits": 16}));
        assert_eq!(cost.api_credits, 2);
        assert_eq!(cost.creator_credits, 16);
    }

    #[test]
    fn test_normalize_cost_nested_total_cost() {
        let cost = normalize_cost(&json!({
            "totalCost": {"apiCredits": 1.4, "creatorCredits": 8.6}
        }));
        assert_eq!(cost.api_credits, 1);
        assert_eq!(cost.creator_credits, 9);
    }

    #[test]
    fn test_normalize_cost_creator_total_and_bare_api() {
        let cost = normalize_cost(&json!({"api": 3, "creator": {"total": 12}}));
        assert_eq!(cost.api_credits, 3);
        assert_eq!(cost.creator_credits, 12);
    }

    #[test]
    fn test_normalize_cost_skips_non_numeric_nodes() {
        // creatorCredits as an object falls through to creator.total.
        let cost = normalize_cost(&json!({
            "apiCredits": 1,
            "creatorCredits": {"total": 5},
            "creator": {"total": 7}
        }));
        assert_eq!(cost.creator_credits, 7);
    }

    #[test]
    fn test_normalize_cost_clamps_negative() {
        let cost = normalize_cost(&json!({"apiCredits": -4, "creatorCredits": -0.4}));
        assert_eq!(cost.api_credits, 0);
        assert_eq!(cost.creator_credits, 0);
    }

    #[test]
    fn test_normalize_balance_shapes() {
        let snapshot = normalize_balance(&json!({
            "apiCredits": {"total": 10},
            "creatorCredits": {"total": 100},
            "subscription": {"tier": "creator", "monthlyLimit": 80, "monthlyUsed": 20, "monthlyRemaining": 60}
        }));
        assert_eq!(snapshot.api_credits, 10);
        assert_eq!(snapshot.creator_credits, 100);
        assert_eq!(snapshot.subscription_tier, "creator");
        assert_eq!(snapshot.subscription_monthly_remaining, 60);

        let legacy = normalize_balance(&json!({"total": 5, "membership": "free"}));
        assert_eq!(legacy.api_credits, 5);
        assert_eq!(legacy.creator_credits, 0);
        assert_eq!(legacy.subscription_tier, "free");

        let empty = normalize_balance(&Value::Null);
        assert_eq!(empty.api_credits, 0);
        assert_eq!(empty.subscription_tier, "unknown");
    }

    #[test]
    fn test_needed_credits() {
        let needed = needed_credits(
            &CostEstimate {
                api_credits: 5,
                creator_credits: 10,
            },
            &balance(3, 50),
        );
        assert_eq!(needed.api_credits_needed, 2);
        assert_eq!(needed.creator_credits_needed, 0);
        assert!(needed.any());
    }

    #[test]
    fn test_smart_policy_triggers() {
        let policy = policy_with(SpendMode::Smart);

        // Below all thresholds with healthy balance: no triggers.
        let triggers = evaluate_smart_policy(
            &policy,
            &CostEstimate {
                api_credits: 1,
                creator_credits: 0,
            },
            &balance(10, 100),
        );
        assert!(triggers.is_empty());

        // At the API threshold.
        let triggers = evaluate_smart_policy(
            &policy,
            &CostEstimate {
                api_credits: 2,
                creator_credits: 0,
            },
            &balance(10, 100),
        );
        assert_eq!(triggers, vec!["api_cost_threshold".to_string()]);

        // Low balance only fires for a kind with nonzero cost.
        let triggers = evaluate_smart_policy(
            &policy,
            &CostEstimate {
                api_credits: 1,
                creator_credits: 0,
            },
            &balance(2, 0),
        );
        assert_eq!(triggers, vec!["low_api_balance".to_string()]);

        let triggers = evaluate_smart_policy(
            &policy,
            &CostEstimate {
                api_credits: 1,
                creator_credits: 0,
            },
            &balance(10, 0),
        );
        assert!(triggers.is_empty());
    }

    #[test]
    fn test_auto_caps() {
        let policy = policy_with(SpendMode::Auto);

        // Per-action cap is independent of usage.
        let triggers = evaluate_auto_caps(
            &policy,
            &CostEstimate {
                api_credits: 3,
                creator_credits: 0,
            },
            None,
        );
        assert_eq!(triggers, vec!["auto_api_action_cap".to_string()]);

        // Monthly cap counts usage plus this action.
        let usage = MonthlyUsage {
            api_credits_used: 79,
            creator_credits_used: 0,
            projects_processed: 3,
        };
        let triggers = evaluate_auto_caps(
            &policy,
            &CostEstimate {
                api_credits: 2,
                creator_credits: 0,
            },
            Some(&usage),
        );
        assert_eq!(triggers, vec!["auto_api_month_cap".to_string()]);

        let under = MonthlyUsage {
            api_credits_used: 10,
            ..MonthlyUsage::default()
        };
        assert!(evaluate_auto_caps(
            &policy,
            &CostEstimate {
                api_credits: 2,
                creator_credits: 0,
            },
            Some(&under),
        )
        .is_empty());
    }

    #[test]
    fn test_trigger_messages_cover_known_codes() {
        let codes = vec![
            "explicit_policy".to_string(),
            "api_cost_threshold".to_string(),
            "low_creator_balance".to_string(),
            "unknown_code".to_string(),
        ];
        let messages = trigger_messages(&codes);
        assert_eq!(messages.len(), 3);
        assert!(messages[0].contains("explicit confirmation"));
    }
}
