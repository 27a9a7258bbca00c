//! Gateway sessions: `Gateway → Network → Contract`.
//!
//! A [`Gateway`] binds a shared [`GatewayTransport`] to one identity, one
//! signer and one set of [`CallTimeouts`]. [`Gateway::network`] and
//! [`Network::contract`] only record names; nothing touches the network
//! until a transaction is evaluated or submitted.
//!
//! # Call flows
//!
//! ```text
//! evaluate:  sign proposal ─▶ Evaluate ─▶ payload
//! submit:    sign proposal ─▶ Endorse ─▶ sign envelope ─▶ Submit
//!                         ─▶ sign status request ─▶ CommitStatus ─▶ payload
//! ```
//!
//! Calls are awaited one at a time by the caller; a session holds no
//! per-call state, so nothing is shared between calls except the channel.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tonic::{Code, Status};
use tracing::{debug, info};

use crate::error::{GatewayError, Result};
use crate::identity::{Identity, Signer};
use crate::options::{CallTimeouts, CallType};
use crate::proposal::{self, Proposal, TransactionContext};
use crate::proto;
use crate::transport::GatewayTransport;

/// The lowest contract response status treated as an error.
const ERROR_STATUS: i32 = 400;

struct Session {
    transport: Arc<dyn GatewayTransport>,
    identity: Identity,
    signer: Signer,
    timeouts: CallTimeouts,
    closed: AtomicBool,
}

impl Session {
    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            Err(GatewayError::Closed)
        } else {
            Ok(())
        }
    }

    /// Run one RPC under its deadline, mapping failures onto the taxonomy.
    async fn call<T, F, Fut>(&self, call: CallType, rpc: F) -> Result<T>
    where
        F: FnOnce(Duration) -> Fut,
        Fut: std::future::Future<Output = std::result::Result<T, Status>>,
    {
        let after = self.timeouts.for_call(call);
        match tokio::time::timeout(after, rpc(after)).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(status)) => Err(GatewayError::from_status(call, after, status)),
            Err(_) => Err(GatewayError::Timeout { call, after }),
        }
    }
}

// ---------------------------------------------------------------------------
// Gateway
// ---------------------------------------------------------------------------

/// A client session with a gateway peer.
///
/// Cheap to clone; clones share the session and its closed state.
#[derive(Clone)]
pub struct Gateway {
    session: Arc<Session>,
}

impl Gateway {
    /// Establish a session over `transport` with the default deadlines.
    pub fn connect(transport: Arc<dyn GatewayTransport>, identity: Identity, signer: Signer) -> Self {
        Self::connect_with_timeouts(transport, identity, signer, CallTimeouts::default())
    }

    pub fn connect_with_timeouts(
        transport: Arc<dyn GatewayTransport>,
        identity: Identity,
        signer: Signer,
        timeouts: CallTimeouts,
    ) -> Self {
        info!(
            "gateway session for {} ({} signer)",
            identity.msp_id(),
            signer.algorithm()
        );
        Self {
            session: Arc::new(Session {
                transport,
                identity,
                signer,
                timeouts,
                closed: AtomicBool::new(false),
            }),
        }
    }

    /// A handle for the named channel. Performs no network call.
    pub fn network(&self, channel: impl Into<String>) -> Network {
        Network {
            session: Arc::clone(&self.session),
            channel: channel.into(),
        }
    }

    pub fn identity(&self) -> &Identity {
        &self.session.identity
    }

    pub fn timeouts(&self) -> &CallTimeouts {
        &self.session.timeouts
    }

    /// Close the session. Later calls through any handle fail with
    /// [`GatewayError::Closed`]. Returns `true` only for the call that
    /// closed it; the transport is left to its owner.
    pub fn close(&self) -> bool {
        let first = !self.session.closed.swap(true, Ordering::SeqCst);
        if first {
            info!("gateway session closed");
        }
        first
    }

    pub fn is_closed(&self) -> bool {
        self.session.closed.load(Ordering::SeqCst)
    }
}

// ---------------------------------------------------------------------------
// Network
// ---------------------------------------------------------------------------

/// A channel within a gateway session.
#[derive(Clone)]
pub struct Network {
    session: Arc<Session>,
    channel: String,
}

impl Network {
    pub fn name(&self) -> &str {
        &self.channel
    }

    /// The default contract of a deployed chaincode.
    pub fn contract(&self, chaincode: impl Into<String>) -> Contract {
        Contract {
            session: Arc::clone(&self.session),
            channel: self.channel.clone(),
            chaincode: chaincode.into(),
            contract_name: None,
        }
    }

    /// A named contract within a chaincode; transaction names are sent as
    /// `<contract>:<transaction>`.
    pub fn contract_with_name(
        &self,
        chaincode: impl Into<String>,
        contract_name: impl Into<String>,
    ) -> Contract {
        Contract {
            contract_name: Some(contract_name.into()),
            ..self.contract(chaincode)
        }
    }
}

// ---------------------------------------------------------------------------
// Contract
// ---------------------------------------------------------------------------

/// A callable contract on one channel.
#[derive(Clone)]
pub struct Contract {
    session: Arc<Session>,
    channel: String,
    chaincode: String,
    contract_name: Option<String>,
}

impl Contract {
    pub fn chaincode(&self) -> &str {
        &self.chaincode
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    fn qualified_name(&self, transaction: &str) -> String {
        match &self.contract_name {
            Some(contract) => format!("{contract}:{transaction}"),
            None => transaction.to_string(),
        }
    }

    fn prepare(&self, request: &Proposal) -> (TransactionContext, proto::SignedProposal) {
        let session = &self.session;
        let ctx = TransactionContext::new(&session.identity);
        let function = self.qualified_name(request.name());
        let unsigned =
            proposal::build_proposal(&ctx, &self.channel, &self.chaincode, &function, request);
        let signed = proposal::sign_proposal(&unsigned, &session.signer);
        (ctx, signed)
    }

    /// Evaluate `transaction` with string or byte arguments.
    pub async fn evaluate_transaction<S: AsRef<[u8]>>(
        &self,
        transaction: &str,
        args: &[S],
    ) -> Result<Vec<u8>> {
        self.evaluate(&Proposal::new(transaction).args(args)).await
    }

    /// Submit `transaction` and wait for it to commit.
    pub async fn submit_transaction<S: AsRef<[u8]>>(
        &self,
        transaction: &str,
        args: &[S],
    ) -> Result<Vec<u8>> {
        self.submit(&Proposal::new(transaction).args(args)).await
    }

    /// Query the ledger without changing it.
    ///
    /// One round trip to one peer. Safe to repeat.
    pub async fn evaluate(&self, request: &Proposal) -> Result<Vec<u8>> {
        let session = &self.session;
        session.ensure_open()?;
        let (ctx, signed) = self.prepare(request);
        debug!(
            "evaluate {} on {}/{} (tx {})",
            request.name(),
            self.channel,
            self.chaincode,
            ctx.transaction_id
        );

        let rpc_request = proto::EvaluateRequest {
            transaction_id: ctx.transaction_id.clone(),
            channel_id: self.channel.clone(),
            proposed_transaction: Some(signed),
            target_organizations: request.organizations().to_vec(),
        };
        let transport = Arc::clone(&session.transport);
        let response = session
            .call(CallType::Evaluate, |after| async move {
                transport.evaluate(rpc_request, after).await
            })
            .await?;

        let result = response
            .result
            .ok_or_else(|| GatewayError::Protocol("evaluate response has no result".into()))?;
        if result.status >= ERROR_STATUS {
            return Err(GatewayError::Contract {
                call: CallType::Evaluate,
                code: Code::Unknown,
                message: format!("chaincode response {}, {}", result.status, result.message),
                details: Vec::new(),
            });
        }
        Ok(result.payload)
    }

    /// Endorse, order, and wait for commit. Returns the contract's response
    /// once the transaction is committed as valid.
    ///
    /// Not idempotent: each call is a new transaction.
    pub async fn submit(&self, request: &Proposal) -> Result<Vec<u8>> {
        let submitted = self.submit_async(request).await?;
        let status = submitted.status().await?;
        if !status.is_successful() {
            return Err(GatewayError::CommitFailed {
                transaction_id: status.transaction_id,
                code: status.code,
            });
        }
        Ok(submitted.into_result())
    }

    /// Endorse and order without waiting for commit.
    ///
    /// The returned [`SubmittedTransaction`] already holds the contract's
    /// response; call [`SubmittedTransaction::status`] to wait for the
    /// commit outcome.
    pub async fn submit_async(&self, request: &Proposal) -> Result<SubmittedTransaction> {
        let session = &self.session;
        session.ensure_open()?;
        let (ctx, signed) = self.prepare(request);
        debug!(
            "endorse {} on {}/{} (tx {})",
            request.name(),
            self.channel,
            self.chaincode,
            ctx.transaction_id
        );

        let endorse_request = proto::EndorseRequest {
            transaction_id: ctx.transaction_id.clone(),
            channel_id: self.channel.clone(),
            proposed_transaction: Some(signed),
            endorsing_organizations: request.organizations().to_vec(),
        };
        let transport = Arc::clone(&session.transport);
        let endorsed = session
            .call(CallType::Endorse, |after| async move {
                transport.endorse(endorse_request, after).await
            })
            .await?;

        let mut envelope = endorsed.prepared_transaction.ok_or_else(|| {
            GatewayError::Protocol("endorse response has no prepared transaction".into())
        })?;
        let result = proposal::transaction_result(&envelope)?;
        proposal::sign_envelope(&mut envelope, &session.signer);

        let submit_request = proto::SubmitRequest {
            transaction_id: ctx.transaction_id.clone(),
            channel_id: self.channel.clone(),
            prepared_transaction: Some(envelope),
        };
        let transport = Arc::clone(&session.transport);
        session
            .call(CallType::Submit, |after| async move {
                transport.submit(submit_request, after).await
            })
            .await?;
        debug!("submitted tx {}", ctx.transaction_id);

        Ok(SubmittedTransaction {
            session: Arc::clone(session),
            channel: self.channel.clone(),
            transaction_id: ctx.transaction_id,
            creator: ctx.creator,
            result,
        })
    }
}

// ---------------------------------------------------------------------------
// SubmittedTransaction
// ---------------------------------------------------------------------------

/// A transaction that has been ordered but may not yet be committed.
pub struct SubmittedTransaction {
    session: Arc<Session>,
    channel: String,
    transaction_id: String,
    creator: Vec<u8>,
    result: Vec<u8>,
}

impl SubmittedTransaction {
    pub fn transaction_id(&self) -> &str {
        &self.transaction_id
    }

    /// The contract's response, as endorsed.
    pub fn result(&self) -> &[u8] {
        &self.result
    }

    pub fn into_result(self) -> Vec<u8> {
        self.result
    }

    /// Wait for the commit status of this transaction.
    pub async fn status(&self) -> Result<CommitStatus> {
        let session = &self.session;
        session.ensure_open()?;
        let request = proposal::commit_status_request(
            &self.transaction_id,
            &self.channel,
            &self.creator,
            &session.signer,
        );
        let transport = Arc::clone(&session.transport);
        let response = session
            .call(CallType::CommitStatus, |after| async move {
                transport.commit_status(request, after).await
            })
            .await?;

        let status = CommitStatus {
            transaction_id: self.transaction_id.clone(),
            code: response.result,
            block_number: response.block_number,
        };
        debug!(
            "tx {} committed in block {} with {}",
            status.transaction_id,
            status.block_number,
            proto::tx_validation_code_name(status.code)
        );
        Ok(status)
    }
}

/// The commit outcome of a submitted transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitStatus {
    pub transaction_id: String,
    /// A `TxValidationCode`; `0` is valid.
    pub code: i32,
    pub block_number: u64,
}

impl CommitStatus {
    pub fn is_successful(&self) -> bool {
        self.code == proto::TX_VALID
    }
}
