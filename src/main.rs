//! Framecut Gateway Runtime
//!
//! Entry point: CLI args, logging, and wiring the transport client and
//! tool context into the stdio tool server.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;

use framecut_gateway::config::{get_config_path, load_config};
use framecut_gateway::server::serve_stdio;
use framecut_gateway::setup::auth_flow::mask_api_key;
use framecut_gateway::setup::wizard::run_setup_wizard;
use framecut_gateway::studio::client::{AuthContext, StudioClient, StudioClientOptions};
use framecut_gateway::types::ToolContext;

const VERSION: &str = "0.1.0";

/// Framecut Studio Gateway -- tool server for the Studio platform
#[derive(Parser, Debug)]
#[command(
    name = "framecut-gateway",
    version = VERSION,
    about = "Framecut Studio Gateway -- tool server for the Studio platform"
)]
struct Cli {
    /// Serve the tool catalog over stdio
    #[arg(long)]
    serve: bool,

    /// Run the interactive setup wizard (magic-link authentication)
    #[arg(long)]
    setup: bool,

    /// Show the current gateway configuration
    #[arg(long)]
    status: bool,
}

/// Display the effective gateway configuration with the key masked.
fn show_status() {
    let config = load_config();

    println!(
        r#"
=== FRAMECUT GATEWAY ===
Endpoint:   {}
Test mode:  {}
API key:    {}
Preset:     {}
Downloads:  {}
Policy:     {:?}
Config:     {}
========================
"#,
        config.api_endpoint,
        config.test_mode,
        config
            .api_key
            .as_deref()
            .map(mask_api_key)
            .unwrap_or_else(|| "(not configured)".to_string()),
        config.default_preset,
        config.download_dir,
        config.spend_policy.mode,
        get_config_path().display(),
    );
}

/// Build the shared tool context from the environment.
fn build_context() -> Result<ToolContext> {
    let config = load_config();

    let client = StudioClient::new(StudioClientOptions {
        api_endpoint: config.api_endpoint.clone(),
        auth: AuthContext::new(
            config.api_key.clone(),
            config.bearer_token.clone(),
            config.basic_auth.clone(),
        ),
        ..StudioClientOptions::default()
    })
    .context("Failed to build Studio client")?;

    Ok(ToolContext {
        client: Arc::new(client),
        config,
    })
}

#[tokio::main]
async fn main() {
    // Logs go to stderr; stdout carries the RPC stream.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(tracing::Level::INFO)
        .init();

    let cli = Cli::parse();

    if cli.status {
        show_status();
        return;
    }

    if cli.setup {
        match run_setup_wizard().await {
            Ok(_key) => {
                println!("Setup complete.");
            }
            Err(e) => {
                eprintln!("Setup failed: {:#}", e);
                std::process::exit(1);
            }
        }
        return;
    }

    if cli.serve {
        let ctx = match build_context() {
            Ok(ctx) => ctx,
            Err(e) => {
                eprintln!("Fatal: {:#}", e);
                std::process::exit(1);
            }
        };
        if let Err(e) = serve_stdio(ctx).await {
            eprintln!("Fatal: {:#}", e);
            std::process::exit(1);
        }
        return;
    }

    // Default: show help
    println!("Run \"framecut-gateway --help\" for usage information.");
    println!("Run \"framecut-gateway --serve\" to start the tool server.");
}
