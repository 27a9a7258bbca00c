//! [`MemoryLedger`]: a single-peer ledger behind the gateway transport seam.
//!
//! Endorsement executes the contract against a copy of world state and
//! keeps the resulting state with the prepared transaction. Submission
//! commits that state in a new block when nothing else committed in
//! between, and records `MVCC_READ_CONFLICT` otherwise. Evaluation runs on
//! a throwaway copy, so it can never change what later calls observe.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use prost::Message;
use tonic::codegen::Bytes;
use tonic::{Code, Status};
use tracing::debug;
use utopia_gateway::proto::{
    self, ChaincodeResponse, CommitStatusResponse, EndorseRequest, EndorseResponse,
    EvaluateRequest, EvaluateResponse, SignedCommitStatusRequest, SubmitRequest, SubmitResponse,
};
use utopia_gateway::{CallType, GatewayTransport, ProposedInvocation, PublicKey};

use crate::contract::{ContractError, UtopiaState};

/// `TxValidationCode.MVCC_READ_CONFLICT`
pub const MVCC_READ_CONFLICT: i32 = 11;

const PEER_ADDRESS: &str = "peer0.org1.example.com:7051";
const PEER_MSP_ID: &str = "Org1MSP";

struct Endorsed {
    /// Ledger height the write was simulated at.
    height: u64,
    state: UtopiaState,
}

#[derive(Default)]
struct Inner {
    state: UtopiaState,
    height: u64,
    endorsed: HashMap<String, Endorsed>,
    committed: HashMap<String, CommitStatusResponse>,
    invalidate_next: Option<i32>,
}

/// An in-process peer running the `utopiamaker` contract.
#[derive(Default)]
pub struct MemoryLedger {
    inner: Mutex<Inner>,
    verifier: Option<PublicKey>,
    stalled: Mutex<HashSet<CallType>>,
    calls: Mutex<HashMap<CallType, usize>>,
    closes: AtomicUsize,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject any request whose signature does not verify under `key`.
    pub fn verifying(key: PublicKey) -> Self {
        Self {
            verifier: Some(key),
            ..Self::default()
        }
    }

    /// Make every later call of this kind hang until the caller gives up.
    pub fn stall(&self, call: CallType) {
        lock(&self.stalled).insert(call);
    }

    /// Record the next submitted transaction with `code` instead of
    /// committing it.
    pub fn invalidate_next(&self, code: i32) {
        lock(&self.inner).invalidate_next = Some(code);
    }

    /// Number of calls of this kind received so far.
    pub fn calls(&self, call: CallType) -> usize {
        lock(&self.calls).get(&call).copied().unwrap_or(0)
    }

    /// Number of times [`GatewayTransport::close`] was called.
    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    /// Number of committed blocks.
    pub fn height(&self) -> u64 {
        lock(&self.inner).height
    }

    /// A copy of current world state.
    pub fn state(&self) -> UtopiaState {
        lock(&self.inner).state.clone()
    }

    /// Run `function` directly against world state, bypassing the
    /// transport. Used to seed fixtures.
    pub fn seed(&self, function: &str, args: &[&str]) -> Result<Vec<u8>, ContractError> {
        let args: Vec<String> = args.iter().map(|a| a.to_string()).collect();
        let mut inner = lock(&self.inner);
        let out = inner.state.invoke(function, &args)?;
        inner.height += 1;
        Ok(out)
    }

    async fn enter(&self, call: CallType) {
        *lock(&self.calls).entry(call).or_default() += 1;
        let stalled = lock(&self.stalled).contains(&call);
        if stalled {
            debug!("{call} stalled");
            std::future::pending::<()>().await;
        }
    }

    fn verify(&self, message: &[u8], signature: &[u8]) -> Result<(), Status> {
        match &self.verifier {
            Some(key) if !key.verify(message, signature) => {
                Err(Status::permission_denied("signature verification failed"))
            }
            _ => Ok(()),
        }
    }

    fn invocation(
        &self,
        signed: Option<proto::SignedProposal>,
    ) -> Result<(ProposedInvocation, Vec<String>), Status> {
        let signed = signed.ok_or_else(|| Status::invalid_argument("missing proposed transaction"))?;
        self.verify(&signed.proposal_bytes, &signed.signature)?;
        let invocation = ProposedInvocation::decode(&signed)
            .map_err(|e| Status::invalid_argument(e.to_string()))?;
        let args = invocation
            .args
            .iter()
            .skip(1)
            .map(|a| String::from_utf8_lossy(a).into_owned())
            .collect();
        Ok((invocation, args))
    }
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// A contract rejection as the gateway reports it: a non-OK status with the
/// failing peer attached as an `ErrorDetail`.
fn contract_status(call: CallType, err: &ContractError) -> Status {
    let detail = proto::ErrorDetail {
        address: PEER_ADDRESS.into(),
        msp_id: PEER_MSP_ID.into(),
        message: format!("chaincode response 500, {err}"),
    };
    let details = proto::RpcStatus {
        code: Code::Aborted as i32,
        message: format!("{call} call to peer failed"),
        details: vec![prost_types::Any {
            type_url: proto::ERROR_DETAIL_TYPE_URL.into(),
            value: detail.encode_to_vec(),
        }],
    };
    Status::with_details(
        Code::Aborted,
        format!("failed to {call} transaction, see attached details for more info"),
        Bytes::from(details.encode_to_vec()),
    )
}

/// Wrap a contract response in a prepared transaction envelope.
fn prepared_transaction(invocation: &ProposedInvocation, result: Vec<u8>) -> proto::Envelope {
    let action = proto::ChaincodeAction {
        results: Vec::new(),
        events: Vec::new(),
        response: Some(ChaincodeResponse {
            status: 200,
            message: String::new(),
            payload: result,
        }),
        chaincode_id: Some(proto::ChaincodeId {
            name: invocation.chaincode.clone(),
            ..Default::default()
        }),
    };
    let response_payload = proto::ProposalResponsePayload {
        proposal_hash: Vec::new(),
        extension: action.encode_to_vec(),
    };
    let action_payload = proto::ChaincodeActionPayload {
        chaincode_proposal_payload: invocation.payload.clone(),
        action: Some(proto::ChaincodeEndorsedAction {
            proposal_response_payload: response_payload.encode_to_vec(),
            endorsements: vec![proto::Endorsement {
                endorser: PEER_MSP_ID.as_bytes().to_vec(),
                signature: Vec::new(),
            }],
        }),
    };
    let transaction = proto::Transaction {
        actions: vec![proto::TransactionAction {
            header: Vec::new(),
            payload: action_payload.encode_to_vec(),
        }],
    };
    let header = proto::Header::decode(invocation.header.as_slice()).unwrap_or_default();
    let payload = proto::Payload {
        header: Some(header),
        data: transaction.encode_to_vec(),
    };
    proto::Envelope {
        payload: payload.encode_to_vec(),
        signature: Vec::new(),
    }
}

/// Recover the transaction id from a prepared envelope's channel header.
fn envelope_transaction_id(envelope: &proto::Envelope) -> Result<String, Status> {
    let payload = proto::Payload::decode(envelope.payload.as_slice())
        .map_err(|e| Status::invalid_argument(e.to_string()))?;
    let header = payload
        .header
        .ok_or_else(|| Status::invalid_argument("prepared transaction has no header"))?;
    let channel_header = proto::ChannelHeader::decode(header.channel_header.as_slice())
        .map_err(|e| Status::invalid_argument(e.to_string()))?;
    Ok(channel_header.tx_id)
}

#[async_trait]
impl GatewayTransport for MemoryLedger {
    async fn evaluate(
        &self,
        request: EvaluateRequest,
        _timeout: Duration,
    ) -> Result<EvaluateResponse, Status> {
        self.enter(CallType::Evaluate).await;
        let (invocation, args) = self.invocation(request.proposed_transaction)?;
        let function = invocation.function();
        debug!("evaluate {function}");

        let mut scratch = lock(&self.inner).state.clone();
        let payload = scratch
            .invoke(&function, &args)
            .map_err(|e| contract_status(CallType::Evaluate, &e))?;
        Ok(EvaluateResponse {
            result: Some(ChaincodeResponse {
                status: 200,
                message: String::new(),
                payload,
            }),
        })
    }

    async fn endorse(
        &self,
        request: EndorseRequest,
        _timeout: Duration,
    ) -> Result<EndorseResponse, Status> {
        self.enter(CallType::Endorse).await;
        let (invocation, args) = self.invocation(request.proposed_transaction)?;
        let function = invocation.function();
        debug!("endorse {function} as {}", invocation.transaction_id);

        let mut inner = lock(&self.inner);
        if inner.committed.contains_key(&invocation.transaction_id)
            || inner.endorsed.contains_key(&invocation.transaction_id)
        {
            return Err(Status::already_exists(format!(
                "duplicate transaction id {}",
                invocation.transaction_id
            )));
        }
        let mut state = inner.state.clone();
        let result = state
            .invoke(&function, &args)
            .map_err(|e| contract_status(CallType::Endorse, &e))?;
        let height = inner.height;
        inner
            .endorsed
            .insert(invocation.transaction_id.clone(), Endorsed { height, state });

        Ok(EndorseResponse {
            prepared_transaction: Some(prepared_transaction(&invocation, result)),
        })
    }

    async fn submit(
        &self,
        request: SubmitRequest,
        _timeout: Duration,
    ) -> Result<SubmitResponse, Status> {
        self.enter(CallType::Submit).await;
        let envelope = request
            .prepared_transaction
            .ok_or_else(|| Status::invalid_argument("missing prepared transaction"))?;
        self.verify(&envelope.payload, &envelope.signature)?;
        let tx_id = envelope_transaction_id(&envelope)?;

        let mut inner = lock(&self.inner);
        let endorsed = inner
            .endorsed
            .remove(&tx_id)
            .ok_or_else(|| Status::failed_precondition(format!("transaction {tx_id} was not endorsed")))?;

        let code = match inner.invalidate_next.take() {
            Some(code) => code,
            None if endorsed.height != inner.height => MVCC_READ_CONFLICT,
            None => {
                inner.state = endorsed.state;
                proto::TX_VALID
            }
        };
        inner.height += 1;
        let block_number = inner.height;
        debug!(
            "block {block_number}: {tx_id} {}",
            proto::tx_validation_code_name(code)
        );
        inner.committed.insert(
            tx_id,
            CommitStatusResponse {
                result: code,
                block_number,
            },
        );
        Ok(SubmitResponse {})
    }

    async fn commit_status(
        &self,
        request: SignedCommitStatusRequest,
        _timeout: Duration,
    ) -> Result<CommitStatusResponse, Status> {
        self.enter(CallType::CommitStatus).await;
        self.verify(&request.request, &request.signature)?;
        let status_request = proto::CommitStatusRequest::decode(request.request.as_slice())
            .map_err(|e| Status::invalid_argument(e.to_string()))?;
        lock(&self.inner)
            .committed
            .get(&status_request.transaction_id)
            .cloned()
            .ok_or_else(|| {
                Status::not_found(format!(
                    "transaction {} has not been submitted",
                    status_request.transaction_id
                ))
            })
    }

    fn close(&self) -> bool {
        self.closes.fetch_add(1, Ordering::SeqCst) == 0
    }
}
