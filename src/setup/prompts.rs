//! Prompts
//!
//! Interactive terminal prompts for the setup wizard.
//! Uses the `dialoguer` crate for input handling.

use anyhow::Result;
use colored::Colorize;
use dialoguer::Input;

/// Prompt the user for a required string value.
/// Repeats until a non-empty value is entered.
pub fn prompt_required(label: &str) -> Result<String> {
    loop {
        let value: String = Input::new()
            .with_prompt(format!("  {} {}", "\u{2192}".cyan(), label.white()))
            .allow_empty(true)
            .interact_text()?;

        let trimmed = value.trim().to_string();
        if !trimmed.is_empty() {
            return Ok(trimmed);
        }
        println!("{}", "  This field is required.".yellow());
    }
}

/// Prompt the user for an email address with a light sanity check.
pub fn prompt_email(label: &str) -> Result<String> {
    loop {
        let value = prompt_required(label)?.to_lowercase();
        if value.contains('@') && value.contains('.') {
            return Ok(value);
        }
        println!("{}", "  Please enter a valid email address.".yellow());
    }
}

/// Prompt for an optional value; empty input returns `None`.
pub fn prompt_optional(label: &str) -> Result<Option<String>> {
    let value: String = Input::new()
        .with_prompt(format!("  {} {}", "\u{2192}".cyan(), label.white()))
        .allow_empty(true)
        .interact_text()?;

    let trimmed = value.trim().to_string();
    Ok(if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    })
}
