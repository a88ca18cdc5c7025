//! Gateway Configuration
//!
//! Loads the gateway's configuration from environment variables, with
//! the stored API key at `~/.framecut/framecut.json` as a fallback for
//! setups completed through the magic-link flow.

use std::fs;
use std::path::PathBuf;

use serde_json::Value;

use crate::policy::spend::policy_from_env;
use crate::types::GatewayConfig;

pub const SKILL_VERSION: &str = "0.1.0";

const PROD_ENDPOINT: &str = "https://framecut.app";
const TEST_ENDPOINT: &str = "https://test.framecut.app";

/// Config file name within the gateway directory.
const CONFIG_FILENAME: &str = "framecut.json";

/// Returns the gateway state directory, honoring `FRAMECUT_CONFIG_DIR`.
pub fn get_gateway_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("FRAMECUT_CONFIG_DIR") {
        let trimmed = dir.trim();
        if !trimmed.is_empty() {
            return PathBuf::from(resolve_path(trimmed));
        }
    }
    let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("/root"));
    home.join(".framecut")
}

/// Returns the full path to the gateway config file.
pub fn get_config_path() -> PathBuf {
    get_gateway_dir().join(CONFIG_FILENAME)
}

/// Read the API key persisted by the setup flow, if any.
pub fn load_stored_api_key() -> Option<String> {
    let raw = fs::read_to_string(get_config_path()).ok()?;
    let parsed: Value = serde_json::from_str(&raw).ok()?;
    parsed
        .get("apiKey")
        .and_then(Value::as_str)
        .filter(|k| !k.is_empty())
        .map(str::to_string)
}

fn env_nonempty(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Build the gateway config from the environment.
///
/// Test mode switches the default endpoint to the staging host; an
/// explicit `FRAMECUT_API_ENDPOINT` always wins.
pub fn load_config() -> GatewayConfig {
    let test_mode = matches!(
        std::env::var("FRAMECUT_TEST_MODE").as_deref(),
        Ok("true") | Ok("1")
    );
    let default_endpoint = if test_mode { TEST_ENDPOINT } else { PROD_ENDPOINT };

    GatewayConfig {
        test_mode,
        api_endpoint: env_nonempty("FRAMECUT_API_ENDPOINT")
            .unwrap_or_else(|| default_endpoint.to_string()),
        api_key: env_nonempty("FRAMECUT_API_KEY").or_else(load_stored_api_key),
        bearer_token: env_nonempty("FRAMECUT_BEARER_TOKEN"),
        basic_auth: env_nonempty("FRAMECUT_BASIC_AUTH"),
        socket_url: env_nonempty("FRAMECUT_SOCKET_URL"),
        default_preset: env_nonempty("FRAMECUT_DEFAULT_PRESET")
            .unwrap_or_else(|| "youtube".to_string()),
        download_dir: env_nonempty("FRAMECUT_DOWNLOAD_DIR")
            .unwrap_or_else(|| "~/studio-exports".to_string()),
        spend_policy: policy_from_env(),
        skill_version: SKILL_VERSION.to_string(),
    }
}

/// Resolve a path that may start with `~` to an absolute path.
pub fn resolve_path(p: &str) -> String {
    if let Some(rest) = p.strip_prefix('~') {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("/root"));
        let rest = rest.strip_prefix('/').unwrap_or(rest);
        home.join(rest).to_string_lossy().to_string()
    } else {
        p.to_string()
    }
}
