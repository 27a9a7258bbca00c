//! `utopia-demo`: run the utopiamaker demonstration against a gateway peer.
//!
//! # Quick start
//!
//! ```sh
//! # Against the default test network layout:
//! utopia-demo
//!
//! # Different organisation material and peer:
//! CRYPTO_PATH=/path/to/org1.example.com PEER_ENDPOINT=peer0:7051 utopia-demo
//!
//! # Explicit key file instead of the keystore directory:
//! KEY_PATH=/path/to/priv_sk utopia-demo
//! ```
//!
//! See [`utopia_demo::Config`] for every variable.

use std::process::ExitCode;

use utopia_demo::Config;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "utopia_demo=info,utopia_gateway=info".into()),
        )
        .init();

    let config = Config::from_env();
    match utopia_demo::run(&config).await {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("******** FAILED to run the application: {e}");
            ExitCode::FAILURE
        }
    }
}
