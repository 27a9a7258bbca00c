//! Errors surfaced by a demo run.

use thiserror::Error;
use utopia_core::{ExpectationError, ScriptError};
use utopia_gateway::GatewayError;

/// Any failure that ends a run. `main` prints it once and exits non-zero.
#[derive(Debug, Error)]
pub enum AppError {
    /// Credentials, connection setup, or session failures outside a step.
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    /// The script was rejected before anything was sent.
    #[error("invalid script: {0}")]
    Script(#[from] ScriptError),

    /// A step's call failed; later steps were not attempted.
    #[error("step {step} ({transaction}) failed: {source}")]
    Call {
        step: String,
        transaction: String,
        #[source]
        source: GatewayError,
    },

    /// A step's result did not decode to what the step expects.
    #[error("step {step} returned an unexpected result: {source}")]
    Decode {
        step: String,
        #[source]
        source: ExpectationError,
    },

    /// The transcript could not be written.
    #[error("failed to write transcript: {0}")]
    Io(#[from] std::io::Error),
}

impl AppError {
    /// The gateway error behind this failure, if there is one.
    pub fn gateway_error(&self) -> Option<&GatewayError> {
        match self {
            AppError::Gateway(e) | AppError::Call { source: e, .. } => Some(e),
            _ => None,
        }
    }
}
