//! The script interpreter.
//!
//! Steps run strictly in order, one call in flight at a time. The first
//! failure ends the run; nothing is retried.
//!
//! # Transcript
//!
//! ```text
//! --> Submit Transaction: CreateUser, creates new user
//! *** Transaction committed successfully
//! *** Result: user0
//!
//! --> Evaluate Transaction: GetUserCount, function returns user count
//! *** Result: 1
//! ```

use std::io::Write;

use tracing::{debug, info};
use utopia_core::render::{render_payload, render_step_header};
use utopia_core::{check_expectation, CallKind, DecodedPayload, Script, Step};
use utopia_gateway::{Contract, GatewayError, Proposal};

use crate::error::AppError;

/// What one step produced.
#[derive(Debug, Clone)]
pub struct StepOutcome {
    pub id: String,
    pub kind: CallKind,
    pub transaction: String,
    pub payload: DecodedPayload,
    /// Set for committed writes.
    pub transaction_id: Option<String>,
}

/// Outcomes of every step that completed, in order.
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub steps: Vec<StepOutcome>,
}

impl RunReport {
    /// The last outcome recorded for `id`.
    pub fn get(&self, id: &str) -> Option<&StepOutcome> {
        self.steps.iter().rev().find(|s| s.id == id)
    }
}

/// Run every step of `script` against `contract`, writing the transcript
/// to `out`. The script must already be validated.
pub async fn run_script<W: Write>(
    contract: &Contract,
    script: &Script,
    out: &mut W,
) -> Result<RunReport, AppError> {
    let mut report = RunReport::default();
    for step in script.iter() {
        let outcome = run_step(contract, step, out).await?;
        report.steps.push(outcome);
    }
    info!("script finished: {} steps", report.steps.len());
    Ok(report)
}

async fn run_step<W: Write>(
    contract: &Contract,
    step: &Step,
    out: &mut W,
) -> Result<StepOutcome, AppError> {
    writeln!(out, "\n{}", render_step_header(step))?;
    debug!("step {} ({} {})", step.id, step.kind, step.transaction);

    let call_failed = |source: GatewayError| AppError::Call {
        step: step.id.clone(),
        transaction: step.transaction.clone(),
        source,
    };
    let proposal = Proposal::new(step.transaction.as_str()).args(&step.args);

    let (bytes, transaction_id) = match step.kind {
        CallKind::Evaluate => {
            let bytes = contract.evaluate(&proposal).await.map_err(call_failed)?;
            (bytes, None)
        }
        CallKind::Submit | CallKind::SubmitAsync => {
            let submitted = contract.submit_async(&proposal).await.map_err(call_failed)?;
            if step.kind == CallKind::SubmitAsync {
                writeln!(
                    out,
                    "*** Successfully submitted transaction {}",
                    submitted.transaction_id()
                )?;
                writeln!(out, "*** Waiting for transaction commit")?;
            }
            let status = submitted.status().await.map_err(call_failed)?;
            if !status.is_successful() {
                return Err(call_failed(GatewayError::CommitFailed {
                    transaction_id: status.transaction_id,
                    code: status.code,
                }));
            }
            writeln!(out, "*** Transaction committed successfully")?;
            (submitted.into_result(), Some(status.transaction_id))
        }
    };

    let payload = DecodedPayload::decode(&bytes);
    if !payload.is_empty() {
        writeln!(out, "*** Result: {}", render_payload(&payload))?;
    }
    check_expectation(&step.expect, &payload).map_err(|source| AppError::Decode {
        step: step.id.clone(),
        source,
    })?;

    if let Some(id) = &transaction_id {
        info!("{} committed as {id}", step.transaction);
    }

    Ok(StepOutcome {
        id: step.id.clone(),
        kind: step.kind,
        transaction: step.transaction.clone(),
        payload,
        transaction_id,
    })
}
