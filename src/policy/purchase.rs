//! Purchase Links
//!
//! Builds checkout links from the pricing catalog and recommends the
//! smallest bundle that covers a credit deficit. Links carry a referral
//! parameter so purchases are attributed to the gateway.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

use crate::types::NeededCredits;

const REF_PARAM: &str = "gateway";
const FALLBACK_BASE_URL: &str = "https://framecut.app";

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseBundle {
    pub id: String,
    pub credits: u64,
    pub price: f64,
    pub currency: String,
    pub checkout_url: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionLinks {
    pub creator: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseLinks {
    #[serde(rename = "ref")]
    pub ref_code: String,
    pub base_url: String,
    pub api_credits: Vec<PurchaseBundle>,
    pub creator_credits: Vec<PurchaseBundle>,
    pub subscriptions: SubscriptionLinks,
}

/// Purchase links plus a recommended bundle per credit kind.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseHints {
    #[serde(flatten)]
    pub links: PurchaseLinks,
    pub recommended: RecommendedBundles,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommendedBundles {
    pub api_credits: Option<PurchaseBundle>,
    pub creator_credits: Option<PurchaseBundle>,
}

/// Reduce an endpoint to `scheme://host`, falling back to the public
/// site when the endpoint is unparsable.
fn normalize_base_url(api_endpoint: &str) -> String {
    let raw = api_endpoint.trim();
    if raw.is_empty() {
        return FALLBACK_BASE_URL.to_string();
    }
    match Url::parse(raw) {
        Ok(url) => match url.host_str() {
            Some(host) => match url.port() {
                Some(port) => format!("{}://{}:{}", url.scheme(), host, port),
                None => format!("{}://{}", url.scheme(), host),
            },
            None => FALLBACK_BASE_URL.to_string(),
        },
        Err(_) => FALLBACK_BASE_URL.to_string(),
    }
}

fn with_tracking(base_url: &str, path: &str) -> String {
    let normalized = if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{}", path)
    };
    format!("{}{}?ref={}", base_url, normalized, REF_PARAM)
}

fn bundle_from(value: &Value, base_url: &str, checkout_prefix: &str) -> PurchaseBundle {
    let id = value
        .get("id")
        .and_then(Value::as_str)
        .unwrap_or("")
        .to_string();
    PurchaseBundle {
        credits: value
            .get("credits")
            .and_then(Value::as_f64)
            .map(|n| n.round().max(0.0) as u64)
            .unwrap_or(0),
        price: value.get("price").and_then(Value::as_f64).unwrap_or(0.0),
        currency: value
            .get("currency")
            .and_then(Value::as_str)
            .unwrap_or("EUR")
            .to_string(),
        checkout_url: with_tracking(
            base_url,
            &format!("{}/{}", checkout_prefix, urlencoding::encode(&id)),
        ),
        id,
    }
}

/// Build the full link set from a pricing catalog payload.
pub fn build_from_pricing(pricing: &Value, api_endpoint: &str) -> PurchaseLinks {
    let base_url = normalize_base_url(api_endpoint);

    let api_credits = pricing
        .get("apiCreditBundles")
        .and_then(Value::as_array)
        .map(|bundles| {
            bundles
                .iter()
                .map(|b| bundle_from(b, &base_url, "/checkout/api-credits"))
                .collect()
        })
        .unwrap_or_default();

    let creator_credits = pricing
        .get("creatorCreditBundles")
        .and_then(Value::as_array)
        .map(|bundles| {
            bundles
                .iter()
                .map(|b| bundle_from(b, &base_url, "/checkout/creator-credits"))
                .collect()
        })
        .unwrap_or_default();

    PurchaseLinks {
        ref_code: REF_PARAM.to_string(),
        subscriptions: SubscriptionLinks {
            creator: with_tracking(&base_url, "/checkout/subscribe/creator"),
        },
        base_url,
        api_credits,
        creator_credits,
    }
}

/// Recommend the smallest bundle covering `needed` credits, falling
/// back to the largest available bundle.
pub fn recommend_bundle(bundles: &[PurchaseBundle], needed: u64) -> Option<PurchaseBundle> {
    let needed = needed.max(1);
    let mut sorted: Vec<&PurchaseBundle> = bundles.iter().collect();
    sorted.sort_by_key(|b| b.credits);

    sorted
        .iter()
        .find(|b| b.credits >= needed)
        .or_else(|| sorted.last())
        .map(|b| (*b).clone())
}

/// Build purchase hints for a spend decision. Absent pricing (the fetch
/// is best-effort) yields no hints.
pub fn build_hints(
    pricing: Option<&Value>,
    api_endpoint: &str,
    needed: &NeededCredits,
) -> Option<PurchaseHints> {
    let pricing = pricing.filter(|p| p.is_object())?;
    let links = build_from_pricing(pricing, api_endpoint);
    let recommended = RecommendedBundles {
        api_credits: recommend_bundle(&links.api_credits, needed.api_credits_needed.max(1)),
        creator_credits: recommend_bundle(
            &links.creator_credits,
            needed.creator_credits_needed.max(1),
        ),
    };
    Some(PurchaseHints { links, recommended })
}
