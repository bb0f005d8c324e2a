#![deny(clippy::all)]

mod api;
mod config;
mod console;
mod credentials;
mod error;
mod preferences;
mod streaming;
mod translation;
mod voting;

use credentials::TokenSource;
use std::io::Write;
use std::sync::Arc;
use streaming::{
    DualCallbacks, DualState, DualStreamController, Side, SingleCallbacks, SingleStreamController,
};
use tracing::{info, trace, warn};

/// Session hooks for comparisons; progress itself is rendered from state snapshots
fn dual_callbacks() -> DualCallbacks {
    DualCallbacks {
        on_chunk: Some(Arc::new(|side: Side, chunk: &str| {
            trace!(%side, len = chunk.len(), "Chunk received");
        })),
        on_complete: Some(Arc::new(|side: Side, output_id: Option<&str>| {
            info!(%side, output_id, "Translation finished");
        })),
        on_error: Some(Arc::new(|side: Side, message: &str| {
            warn!(%side, error = message, "Translation failed");
        })),
        on_both_complete: Some(Arc::new(|state: &DualState| {
            info!(
                a_chars = state.a.text.chars().count(),
                b_chars = state.b.text.chars().count(),
                "Both translations finished"
            );
        })),
    }
}

/// Single-model output is printed as it arrives
fn single_callbacks() -> SingleCallbacks {
    SingleCallbacks {
        on_chunk: Some(Arc::new(|chunk: &str| {
            print!("{chunk}");
            let _ = std::io::stdout().flush();
        })),
        on_complete: Some(Arc::new(|output_id: Option<&str>| {
            info!(output_id, "Translation finished");
        })),
        on_error: Some(Arc::new(|message: &str| {
            warn!(error = message, "Translation failed");
        })),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing for structured logging
    tracing_subscriber::fmt::init();

    // Embedded config.toml plus environment overrides
    let config = config::load_config()?;
    info!(base_url = %config.api.base_url, "Using translation arena API");
    if !config.auth.client_id.is_empty() {
        info!(client_id = %config.auth.client_id, "Auth client configured");
    }

    let tokens = credentials::EnvTokenSource;
    if tokens.bearer_token().is_some() {
        info!("API token found in environment");
    } else {
        info!(
            "No API token found - set {} or use :token",
            credentials::API_TOKEN_ENV
        );
    }

    let client = Arc::new(api::ArenaClient::new(&config.api)?);
    let debounce = config.streaming.debounce();
    let dual = Arc::new(DualStreamController::new(
        client.clone(),
        dual_callbacks(),
        debounce,
    ));
    let single = Arc::new(SingleStreamController::new(
        client.clone(),
        single_callbacks(),
        debounce,
    ));

    let preferences_path = preferences::preferences_path();
    if preferences_path.is_none() {
        warn!("No config directory found - preferences will not be saved");
    }

    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    let mut console = console::Console::new(
        stdin,
        client,
        Box::new(tokens),
        dual,
        single,
        preferences_path,
    );
    console.run().await?;

    info!("Exiting");
    Ok(())
}
