//! # utopia-demo
//!
//! Runs the utopiamaker demonstration against a gateway peer:
//!
//! ```text
//! Config ─▶ credentials ─▶ TLS channel ─▶ session ─▶ network/contract
//!        ─▶ step 1 ─▶ step 2 ─▶ … ─▶ close session ─▶ close channel
//! ```
//!
//! The session and the channel are closed exactly once, whether the script
//! completed or a step failed.
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | [`Config`] record and its environment defaults |
//! | [`bootstrap`] | Credential loading, channel and session construction |
//! | [`runner`] | Step interpreter and transcript |
//! | [`error`] | [`AppError`] |

pub mod bootstrap;
pub mod config;
pub mod error;
pub mod runner;

use std::io::Write;
use std::sync::Arc;

use tracing::{info, warn};
use utopia_core::render::render_parameters;
use utopia_core::{demo_script, validate_script, Script};
use utopia_gateway::{Gateway, GatewayTransport};

pub use bootstrap::Credentials;
pub use config::Config;
pub use error::AppError;
pub use runner::{run_script, RunReport, StepOutcome};

/// Run the demo script with the configured credentials and peer.
///
/// The parameter table and transcript go to standard output.
pub async fn run(config: &Config) -> Result<RunReport, AppError> {
    let mut stdout = std::io::stdout();
    write!(stdout, "{}", render_parameters(&config.parameter_rows()))?;

    let script = demo_script(&config.script_params());
    let credentials = bootstrap::load_credentials(config)?;
    let connection = bootstrap::connect(config).await?;
    run_session(config, &script, credentials, connection, &mut stdout).await
}

/// Open a session over `transport`, run `script`, and release both the
/// session and the transport.
///
/// Cleanup runs on every path once the transport is handed in.
pub async fn run_session<W: Write>(
    config: &Config,
    script: &Script,
    credentials: Credentials,
    transport: Arc<dyn GatewayTransport>,
    out: &mut W,
) -> Result<RunReport, AppError> {
    let gateway = bootstrap::open_session(credentials, Arc::clone(&transport));
    let result = drive(&gateway, config, script, out).await;

    gateway.close();
    transport.close();
    match &result {
        Ok(report) => info!("run complete after {} steps", report.steps.len()),
        Err(e) => warn!("run aborted: {e}"),
    }
    result
}

async fn drive<W: Write>(
    gateway: &Gateway,
    config: &Config,
    script: &Script,
    out: &mut W,
) -> Result<RunReport, AppError> {
    validate_script(script)?;
    let contract = gateway
        .network(config.channel_name.as_str())
        .contract(config.chaincode_name.as_str());
    info!(
        "running {} steps against {} on {}",
        script.len(),
        config.chaincode_name,
        config.channel_name
    );
    run_script(&contract, script, out).await
}
