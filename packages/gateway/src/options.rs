//! Per-call-kind deadlines.

use std::time::Duration;

/// The four gateway RPCs a session issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallType {
    /// Read-only query.
    Evaluate,
    /// Proposal of a write to the endorsing peers.
    Endorse,
    /// Hand-off of an endorsed transaction for ordering.
    Submit,
    /// Wait for the commit status of a submitted transaction.
    CommitStatus,
}

impl std::fmt::Display for CallType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CallType::Evaluate => write!(f, "evaluate"),
            CallType::Endorse => write!(f, "endorse"),
            CallType::Submit => write!(f, "submit"),
            CallType::CommitStatus => write!(f, "commit-status"),
        }
    }
}

/// Deadline applied to each call kind. Expiry is reported as
/// [`GatewayError::Timeout`](crate::GatewayError::Timeout) and never retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallTimeouts {
    pub evaluate: Duration,
    pub endorse: Duration,
    pub submit: Duration,
    pub commit_status: Duration,
}

impl Default for CallTimeouts {
    fn default() -> Self {
        Self {
            evaluate: Duration::from_secs(5),
            endorse: Duration::from_secs(15),
            submit: Duration::from_secs(5),
            commit_status: Duration::from_secs(60),
        }
    }
}

impl CallTimeouts {
    pub fn for_call(&self, call: CallType) -> Duration {
        match call {
            CallType::Evaluate => self.evaluate,
            CallType::Endorse => self.endorse,
            CallType::Submit => self.submit,
            CallType::CommitStatus => self.commit_status,
        }
    }
}
