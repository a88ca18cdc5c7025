//! Setup Wizard
//!
//! Interactive first-run setup: walks the magic-link flow in the
//! terminal, generates an API key, and stores it in the gateway config
//! so every tool call afterwards is authenticated.

use anyhow::{Context, Result};
use colored::Colorize;

use crate::config::load_config;
use crate::setup::auth_flow;
use crate::setup::prompts::{prompt_email, prompt_optional, prompt_required};

/// Run the interactive setup wizard. Returns the stored API key.
pub async fn run_setup_wizard() -> Result<String> {
    let config = load_config();

    println!();
    println!("{}", "  Framecut Studio gateway setup".white().bold());
    println!(
        "{}",
        format!("  Endpoint: {}\n", config.api_endpoint).dimmed()
    );

    // An existing key can be pasted directly instead of running the
    // full magic-link flow.
    println!("{}", "  [1/3] Credentials".cyan());
    if let Some(existing) = prompt_optional("Existing API key (Enter to use email setup)")? {
        let stored = auth_flow::store_api_key(&existing).context("Failed to store API key")?;
        println!(
            "{}",
            format!(
                "  API key {} saved to {}.",
                auth_flow::mask_api_key(&existing),
                stored.path.display()
            )
            .green()
        );
        return Ok(existing);
    }

    let email = prompt_email("Account email")?;
    auth_flow::send_magic_link(&config.api_endpoint, &email, config.basic_auth.as_deref())
        .await
        .context("Failed to send magic link")?;
    println!(
        "{}",
        "  Magic link sent. Check your inbox for the 6-character code.\n".green()
    );

    println!("{}", "  [2/3] Verification".cyan());
    let code = prompt_required("Code from the email")?;
    let token =
        auth_flow::complete_magic_link(&config.api_endpoint, &email, &code, config.basic_auth.as_deref())
            .await
            .context("Code verification failed")?;
    println!("{}", "  Verified.\n".green());

    println!("{}", "  [3/3] API key".cyan());
    let key_result = auth_flow::generate_api_key(&config.api_endpoint, &token.access_token)
        .await
        .context("Failed to generate API key")?;
    let stored = auth_flow::store_api_key(&key_result.key).context("Failed to store API key")?;

    println!(
        "{}",
        format!(
            "  Key {} stored at {}.",
            key_result
                .key_prefix
                .clone()
                .unwrap_or_else(|| auth_flow::mask_api_key(&key_result.key)),
            stored.path.display()
        )
        .green()
    );
    if key_result.free_credits > 0 {
        println!(
            "{}",
            format!("  {} free credits included.", key_result.free_credits).green()
        );
    }
    println!("{}", "\n  Setup complete.".white());

    Ok(key_result.key)
}
