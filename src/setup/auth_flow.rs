//! Auth Flow
//!
//! Magic-link setup against the unversioned auth endpoints: send a
//! code to the user's email, exchange it for an access token, generate
//! an API key, and persist the key to the gateway config file. These
//! calls run before any credential exists, so they use a bare HTTP
//! client rather than the authenticated transport.

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;
use std::time::Duration;

use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::{get_config_path, get_gateway_dir};
use crate::studio::error::{StudioError, StudioResult};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20);

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MagicLinkSent {
    pub sent: bool,
    pub email: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenResult {
    pub access_token: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tier: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<u64>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiKeyResult {
    pub key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_prefix: Option<String>,
    pub free_credits: u64,
    pub message: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredKey {
    pub stored: bool,
    pub path: PathBuf,
}

fn normalize_endpoint(api_endpoint: &str) -> String {
    let trimmed = api_endpoint.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        "https://framecut.app".to_string()
    } else {
        trimmed.to_string()
    }
}

fn basic_header(basic_auth: Option<&str>) -> Option<String> {
    basic_auth.map(|creds| {
        format!(
            "Basic {}",
            base64::engine::general_purpose::STANDARD.encode(creds)
        )
    })
}

async fn request_json(
    builder: reqwest::RequestBuilder,
) -> StudioResult<(reqwest::StatusCode, Value)> {
    let response = builder
        .timeout(DEFAULT_TIMEOUT)
        .send()
        .await
        .map_err(|err| {
            if err.is_timeout() {
                StudioError::timeout("Setup request timed out. Please try again.")
            } else {
                StudioError::network(format!("Network error during setup: {}", err))
            }
        })?;

    let status = response.status();
    let raw = response.text().await.map_err(|err| {
        if err.is_timeout() {
            StudioError::timeout("Setup request timed out. Please try again.")
        } else {
            StudioError::network(format!("Network error during setup: {}", err))
        }
    })?;

    let payload = if raw.is_empty() {
        Value::Null
    } else {
        serde_json::from_str(&raw).unwrap_or(Value::String(raw))
    };
    Ok((status, payload))
}

fn api_error(
    status: reqwest::StatusCode,
    payload: &Value,
    fallback_code: &str,
    fallback_message: &str,
) -> StudioError {
    let code = payload
        .pointer("/error/code")
        .and_then(Value::as_str)
        .unwrap_or(fallback_code);
    let message = payload
        .pointer("/error/message")
        .and_then(Value::as_str)
        .unwrap_or(fallback_message);
    StudioError::new(code, status.as_u16(), message)
        .with_details(payload.pointer("/error").cloned().unwrap_or(Value::Null))
}

/// Send a magic-link code to the user's email.
pub async fn send_magic_link(
    api_endpoint: &str,
    email: &str,
    basic_auth: Option<&str>,
) -> StudioResult<MagicLinkSent> {
    let endpoint = normalize_endpoint(api_endpoint);
    let client = reqwest::Client::new();

    let mut builder = client
        .post(format!("{}/api/auth/magic/send", endpoint))
        .json(&serde_json::json!({ "email": email }));
    if let Some(basic) = basic_header(basic_auth) {
        builder = builder.header("Authorization", basic);
    }

    let (status, payload) = request_json(builder).await?;

    if !status.is_success() {
        if status.as_u16() == 429 {
            let retry_in = payload
                .pointer("/error/details/retryIn")
                .and_then(Value::as_u64)
                .unwrap_or(60);
            return Err(StudioError::new(
                "rate_limited",
                status.as_u16(),
                format!("Rate limited. Please wait {} seconds and retry.", retry_in),
            )
            .with_details(
                payload
                    .pointer("/error/details")
                    .cloned()
                    .unwrap_or(Value::Null),
            ));
        }
        return Err(api_error(
            status,
            &payload,
            "magic_send_failed",
            "Failed to send magic link",
        ));
    }

    Ok(MagicLinkSent {
        sent: true,
        email: payload
            .pointer("/data/email")
            .and_then(Value::as_str)
            .unwrap_or(email)
            .to_string(),
    })
}

/// Exchange the emailed code for a short-lived access token.
pub async fn complete_magic_link(
    api_endpoint: &str,
    email: &str,
    code: &str,
    basic_auth: Option<&str>,
) -> StudioResult<TokenResult> {
    let endpoint = normalize_endpoint(api_endpoint);
    let client = reqwest::Client::new();

    let mut builder = client
        .post(format!("{}/api/auth/magic/token", endpoint))
        .json(&serde_json::json!({ "state": email, "code": code }));
    if let Some(basic) = basic_header(basic_auth) {
        builder = builder.header("Authorization", basic);
    }

    let (status, payload) = request_json(builder).await?;

    if !status.is_success() {
        if payload.pointer("/error/code").and_then(Value::as_str) == Some("invalid_code") {
            return Err(StudioError::new(
                "invalid_code",
                status.as_u16(),
                "Invalid or expired code. Request a new magic link and retry.",
            )
            .with_details(
                payload
                    .pointer("/error/details")
                    .cloned()
                    .unwrap_or(Value::Null),
            ));
        }
        return Err(api_error(
            status,
            &payload,
            "magic_token_failed",
            "Authentication failed",
        ));
    }

    let access_token = payload
        .pointer("/data/accessToken")
        .and_then(Value::as_str)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| {
            StudioError::new(
                "magic_token_failed",
                502,
                "Authentication succeeded but no access token was returned",
            )
        })?;

    Ok(TokenResult {
        access_token: access_token.to_string(),
        user_id: payload
            .pointer("/data/userId")
            .and_then(Value::as_str)
            .map(str::to_string),
        tier: payload
            .pointer("/data/tier")
            .and_then(Value::as_str)
            .map(str::to_string),
        expires_in: payload.pointer("/data/expiresIn").and_then(Value::as_u64),
    })
}

/// Generate an API key using a fresh access token. The bearer token
/// occupies the Authorization header, so basic auth is not sent here.
pub async fn generate_api_key(api_endpoint: &str, access_token: &str) -> StudioResult<ApiKeyResult> {
    let endpoint = normalize_endpoint(api_endpoint);
    let client = reqwest::Client::new();

    let builder = client
        .post(format!("{}/api/user/api-key/generate", endpoint))
        .header("Authorization", format!("Bearer {}", access_token));

    let (status, payload) = request_json(builder).await?;

    if !status.is_success() {
        if payload.pointer("/error/code").and_then(Value::as_str) == Some("key_already_exists") {
            return Err(StudioError::new(
                "key_already_exists",
                status.as_u16(),
                "API key already exists. Open your account's API settings to view or regenerate it.",
            )
            .with_details(
                payload
                    .pointer("/error/details")
                    .cloned()
                    .unwrap_or(Value::Null),
            ));
        }
        return Err(api_error(
            status,
            &payload,
            "api_key_generate_failed",
            "Failed to generate API key",
        ));
    }

    let key = payload
        .pointer("/data/key")
        .and_then(Value::as_str)
        .filter(|k| !k.is_empty())
        .ok_or_else(|| {
            StudioError::new("api_key_generate_failed", 502, "No API key in response")
        })?;

    Ok(ApiKeyResult {
        key: key.to_string(),
        key_prefix: payload
            .pointer("/data/keyPrefix")
            .and_then(Value::as_str)
            .map(str::to_string),
        free_credits: payload
            .pointer("/data/freeCredits")
            .and_then(Value::as_u64)
            .unwrap_or(0),
        message: payload
            .pointer("/data/message")
            .and_then(Value::as_str)
            .unwrap_or("API key generated")
            .to_string(),
    })
}

/// Persist the API key to the gateway config file, preserving any other
/// fields already stored there. The directory is created with mode
/// 0700, the file written with mode 0600 since it holds a credential.
pub fn store_api_key(api_key: &str) -> StudioResult<StoredKey> {
    let dir = get_gateway_dir();
    let config_path = get_config_path();

    let mut config: Value = match fs::read_to_string(&config_path) {
        Ok(raw) => serde_json::from_str(&raw).map_err(|_| {
            StudioError::new(
                "config_corrupt",
                500,
                format!(
                    "Config file {} contains invalid JSON. Please fix or delete it manually.",
                    config_path.display()
                ),
            )
        })?,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            fs::create_dir_all(&dir).map_err(|e| {
                StudioError::new(
                    "config_write_error",
                    500,
                    format!("Unable to create config dir: {}", e),
                )
            })?;
            let _ = fs::set_permissions(&dir, fs::Permissions::from_mode(0o700));
            Value::Object(Default::default())
        }
        Err(err) => {
            return Err(StudioError::new(
                "config_read_error",
                500,
                format!(
                    "Unable to read config file {}: {}",
                    config_path.display(),
                    err
                ),
            ))
        }
    };

    if !config.is_object() {
        config = Value::Object(Default::default());
    }
    config["apiKey"] = Value::String(api_key.to_string());
    config["storedAt"] = Value::String(chrono::Utc::now().to_rfc3339());

    fs::write(
        &config_path,
        serde_json::to_string_pretty(&config)
            .map_err(|e| StudioError::new("config_write_error", 500, e.to_string()))?,
    )
    .map_err(|e| {
        StudioError::new(
            "config_write_error",
            500,
            format!("Unable to write config file: {}", e),
        )
    })?;
    let _ = fs::set_permissions(&config_path, fs::Permissions::from_mode(0o600));

    Ok(StoredKey {
        stored: true,
        path: config_path,
    })
}

/// Mask an API key for display: first 8 and last 4 characters.
pub fn mask_api_key(api_key: &str) -> String {
    if api_key.is_empty() {
        return String::new();
    }
    if api_key.len() <= 8 {
        return format!("{}***", &api_key[..2.min(api_key.len())]);
    }
    format!("{}...{}", &api_key[..8], &api_key[api_key.len() - 4..])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_endpoint() {
        assert_eq!(
            normalize_endpoint("https://framecut.app/"),
            "https://framecut.app"
        );
        assert_eq!(normalize_endpoint("  "), "https://framecut.app");
    }

    #[test]
    fn test_mask_api_key() {
        assert_eq!(mask_api_key(""), "");
        assert_eq!(mask_api_key("short"), "sh***");
        assert_eq!(mask_api_key("fk_live_abcdef123456"), "fk_live_...3456");
    }
}
