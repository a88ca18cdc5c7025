//! Setup Tool
//!
//! Magic-link authentication over the tool surface: send the link,
//! complete setup (generating and persisting an API key), or save an
//! existing key. A freshly obtained key rotates the shared client's
//! auth context immediately so subsequent tool calls use it.

use anyhow::Result;
use serde_json::{json, Value};

use crate::setup::auth_flow;
use crate::studio::error::StudioError;
use crate::types::ToolContext;

use super::optional_str;

fn assert_email(email: &str) -> Result<()> {
    if email.is_empty() || !email.contains('@') || !email.contains('.') {
        return Err(StudioError::new(
            "invalid_email",
            400,
            "A valid email is required for setup.",
        )
        .into());
    }
    Ok(())
}

fn rotate_to_key(ctx: &ToolContext, key: &str) {
    let rotated = ctx.client.auth().with_api_key(Some(key.to_string()));
    ctx.client.rotate_auth(rotated);
}

async fn run_send_magic_link(ctx: &ToolContext, email: &str) -> Result<Value> {
    assert_email(email)?;
    let result = auth_flow::send_magic_link(
        &ctx.config.api_endpoint,
        email,
        ctx.config.basic_auth.as_deref(),
    )
    .await?;

    Ok(json!({
        "action": "send_magic_link",
        "sent": true,
        "email": result.email,
        "nextStep": "Check your inbox for the magic link, then call studio_setup with action 'complete_setup', your email, and the 6-character code.",
    }))
}

async fn run_complete_setup(ctx: &ToolContext, email: &str, code: Option<String>) -> Result<Value> {
    assert_email(email)?;
    let code = code.unwrap_or_default();
    if code.len() < 4 {
        return Err(StudioError::new(
            "missing_code",
            400,
            "A valid code is required. Provide the 6-character code from the magic link email.",
        )
        .into());
    }

    let token = auth_flow::complete_magic_link(
        &ctx.config.api_endpoint,
        email,
        &code,
        ctx.config.basic_auth.as_deref(),
    )
    .await?;
    let key_result = auth_flow::generate_api_key(&ctx.config.api_endpoint, &token.access_token).await?;
    let stored = auth_flow::store_api_key(&key_result.key)?;

    // Use the newly generated key immediately for subsequent tool calls.
    rotate_to_key(ctx, &key_result.key);

    Ok(json!({
        "action": "complete_setup",
        "configured": true,
        "userId": token.user_id,
        "tier": token.tier,
        "apiKeyPrefix": key_result
            .key_prefix
            .clone()
            .unwrap_or_else(|| auth_flow::mask_api_key(&key_result.key)),
        "freeCredits": key_result.free_credits,
        "configPath": stored.path,
        "message": "Setup complete. Your API key was generated and saved to the gateway config.",
    }))
}

async fn run_save_api_key(ctx: &ToolContext, api_key: Option<String>) -> Result<Value> {
    let api_key = api_key.unwrap_or_default();
    if api_key.is_empty() {
        return Err(StudioError::new(
            "missing_api_key",
            400,
            "api_key is required when action is 'save_api_key'.",
        )
        .into());
    }

    let stored = auth_flow::store_api_key(&api_key)?;
    rotate_to_key(ctx, &api_key);

    Ok(json!({
        "action": "save_api_key",
        "configured": true,
        "apiKeyPrefix": auth_flow::mask_api_key(&api_key),
        "configPath": stored.path,
        "message": "API key saved to the gateway config.",
    }))
}

pub async fn execute(ctx: &ToolContext, args: Value) -> Result<Value> {
    let action = optional_str(&args, "action")
        .map(|a| a.to_lowercase())
        .unwrap_or_else(|| "send_magic_link".to_string());
    let email = optional_str(&args, "email")
        .map(|e| e.to_lowercase())
        .unwrap_or_default();

    match action.as_str() {
        "send_magic_link" => run_send_magic_link(ctx, &email).await,
        "complete_setup" => run_complete_setup(ctx, &email, optional_str(&args, "code")).await,
        "save_api_key" => run_save_api_key(ctx, optional_str(&args, "api_key")).await,
        _ => Err(StudioError::new(
            "invalid_action",
            400,
            "Invalid action. Use one of: send_magic_link, complete_setup, save_api_key.",
        )
        .into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assert_email() {
        assert!(assert_email("user@example.com").is_ok());
        assert!(assert_email("").is_err());
        assert!(assert_email("no-at-sign.com").is_err());
        assert!(assert_email("no@dots").is_err());
    }
}
