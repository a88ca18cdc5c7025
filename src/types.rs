//! Framecut Gateway - Type Definitions
//!
//! Shared types for the Studio tool gateway: configuration, spend policy
//! records, project status, and the context handed to tool handlers.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::studio::client::StudioClient;
use crate::studio::error::StudioResult;

// ─── Configuration ───────────────────────────────────────────────

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayConfig {
    pub test_mode: bool,
    pub api_endpoint: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bearer_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub basic_auth: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub socket_url: Option<String>,
    pub default_preset: String,
    pub download_dir: String,
    pub spend_policy: SpendPolicyConfig,
    pub skill_version: String,
}

// ─── Spend Policy ────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SpendMode {
    Explicit,
    Smart,
    Auto,
}

/// Spend policy configuration: the mode plus eight numeric knobs.
/// Values are clamped to documented ranges at load time; anything
/// non-numeric or out of range falls back to the default silently.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpendPolicyConfig {
    pub mode: SpendMode,
    pub smart_api_confirm_threshold: f64,
    pub smart_creator_confirm_threshold: f64,
    pub low_api_balance_threshold: f64,
    pub low_creator_balance_threshold: f64,
    pub auto_max_api_per_action: f64,
    pub auto_max_creator_per_action: f64,
    pub auto_max_api_per_month: f64,
    pub auto_max_creator_per_month: f64,
}

/// Returns the documented default spend policy.
pub fn default_spend_policy() -> SpendPolicyConfig {
    SpendPolicyConfig {
        mode: SpendMode::Auto,
        smart_api_confirm_threshold: 2.0,
        smart_creator_confirm_threshold: 8.0,
        low_api_balance_threshold: 2.0,
        low_creator_balance_threshold: 20.0,
        auto_max_api_per_action: 2.0,
        auto_max_creator_per_action: 40.0,
        auto_max_api_per_month: 80.0,
        auto_max_creator_per_month: 400.0,
    }
}

/// Canonical cost estimate for a proposed paid action, normalized from
/// the heterogeneous upstream shapes.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CostEstimate {
    pub api_credits: u64,
    pub creator_credits: u64,
}

impl CostEstimate {
    /// A paid action has a nonzero cost in at least one credit kind.
    pub fn is_paid(&self) -> bool {
        self.api_credits > 0 || self.creator_credits > 0
    }
}

/// Normalized account balance snapshot.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceSnapshot {
    pub api_credits: u64,
    pub creator_credits: u64,
    pub subscription_tier: String,
    pub subscription_monthly_limit: u64,
    pub subscription_monthly_used: u64,
    pub subscription_monthly_remaining: u64,
}

/// Normalized current-month usage from the analytics endpoint.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyUsage {
    pub api_credits_used: u64,
    pub creator_credits_used: u64,
    pub projects_processed: u64,
}

/// Credit deficit between an estimated cost and the current balance.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NeededCredits {
    pub api_credits_needed: u64,
    pub creator_credits_needed: u64,
}

impl NeededCredits {
    pub fn any(&self) -> bool {
        self.api_credits_needed > 0 || self.creator_credits_needed > 0
    }
}

// ─── Project Status ──────────────────────────────────────────────

/// Project status as reported by the status endpoint. Unknown fields
/// are preserved in `extra` so tool results can pass them through.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectStatus {
    #[serde(default)]
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub results_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retention_time_remaining: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<Value>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

/// A progress notification delivered to `on_progress` callbacks.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressUpdate {
    pub project_id: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retention_time_remaining: Option<Value>,
}

/// Seam for fetching a project's authoritative status. Implemented by
/// `StudioClient`; tests substitute scripted sources.
#[async_trait]
pub trait ProjectStatusSource: Send + Sync {
    async fn fetch_status(&self, project_id: &str) -> StudioResult<ProjectStatus>;
}

// ─── Tool System ─────────────────────────────────────────────────

/// Runtime context handed to every tool invocation.
#[derive(Clone)]
pub struct ToolContext {
    pub client: Arc<StudioClient>,
    pub config: GatewayConfig,
}
