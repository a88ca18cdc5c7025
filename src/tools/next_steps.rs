//! Next Steps
//!
//! Contextual follow-up suggestions appended to tool results so the
//! calling agent can guide the user onward.

use serde_json::Value;

#[derive(Clone, Debug, serde::Serialize)]
pub struct NextStep {
    pub tool: &'static str,
    pub message: &'static str,
}

fn has_thumbnails(results: &Value) -> bool {
    results
        .get("thumbnails")
        .and_then(Value::as_array)
        .map(|t| !t.is_empty())
        .unwrap_or(false)
}

pub fn for_upload(webhook_enabled: bool) -> Vec<NextStep> {
    let mut steps = Vec::new();
    if !webhook_enabled {
        steps.push(NextStep {
            tool: "studio_poll",
            message: "Track processing progress with studio_poll until completion.",
        });
    }
    steps.push(NextStep {
        tool: "studio_estimate",
        message: "Use studio_estimate before future uploads to preview costs.",
    });
    steps
}

pub fn for_results(results: &Value) -> Vec<NextStep> {
    let mut steps = Vec::new();
    if !has_thumbnails(results) {
        steps.push(NextStep {
            tool: "studio_thumbnails",
            message: "Generate thumbnail variants for this project with studio_thumbnails.",
        });
    }
    steps.push(NextStep {
        tool: "studio_download",
        message: "Download outputs to your local filesystem with studio_download.",
    });
    steps.push(NextStep {
        tool: "studio_rerender",
        message:
            "Need changes? Re-render with updated settings using studio_rerender (first re-render is free).",
    });
    steps
}

pub fn for_download(results: &Value) -> Vec<NextStep> {
    let mut steps = Vec::new();
    if !has_thumbnails(results) {
        steps.push(NextStep {
            tool: "studio_thumbnails",
            message:
                "Generate A/B/C thumbnail variants with studio_thumbnails (uses Creator Credits).",
        });
    }
    steps.push(NextStep {
        tool: "studio_brand",
        message:
            "Set up your brand kit with studio_brand so future videos match your style automatically.",
    });
    steps.push(NextStep {
        tool: "studio_referral",
        message:
            "Share your referral link to earn 5 free credits per signup -- use studio_referral to get your code.",
    });
    steps
}

pub fn for_credits(credits: &Value) -> Vec<NextStep> {
    let api_credits = credits
        .pointer("/apiCredits/total")
        .or_else(|| credits.get("total"))
        .and_then(Value::as_f64)
        .unwrap_or(0.0);

    let mut steps = Vec::new();
    if api_credits > 0.0 && api_credits <= 2.0 {
        steps.push(NextStep {
            tool: "studio_referral",
            message:
                "Earn 5 free credits per referral -- use studio_referral to get your shareable link.",
        });
    }
    steps
}
