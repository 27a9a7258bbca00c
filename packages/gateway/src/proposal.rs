//! Transaction proposals: construction, signing, and decoding.
//!
//! A [`Proposal`] is what the caller asks for: a transaction name, its
//! arguments, optional private (transient) data and optional endorsing
//! organisations. The session turns it into a signed protobuf proposal:
//!
//! ```text
//! SignedProposal
//! ├─ proposal_bytes = Proposal
//! │  ├─ header  = Header { ChannelHeader, SignatureHeader { creator, nonce } }
//! │  └─ payload = ChaincodeProposalPayload { ChaincodeInvocationSpec, transient_map }
//! └─ signature      = sign(proposal_bytes)
//! ```
//!
//! The transaction id is the lowercase hex SHA-256 of `nonce || creator`,
//! so a peer can recompute it from the signature header.

use std::collections::HashMap;

use prost::Message;
use rand::RngCore;
use sha2::{Digest, Sha256};

use crate::error::{GatewayError, Result};
use crate::identity::{Identity, Signer};
use crate::proto;

/// Random bytes in each signature header.
pub const NONCE_LEN: usize = 24;

// ---------------------------------------------------------------------------
// Proposal
// ---------------------------------------------------------------------------

/// A transaction invocation and its per-call options.
///
/// ```rust,ignore
/// let proposal = Proposal::new("CreateUser")
///     .args(["Guy", "guy@example.com", key_hash])
///     .endorsing_organizations(["Org1MSP"]);
/// let result = contract.submit(&proposal).await?;
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Proposal {
    name: String,
    args: Vec<Vec<u8>>,
    transient: HashMap<String, Vec<u8>>,
    endorsing_organizations: Vec<String>,
}

impl Proposal {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Append one argument.
    pub fn arg(mut self, arg: impl AsRef<[u8]>) -> Self {
        self.args.push(arg.as_ref().to_vec());
        self
    }

    /// Append several arguments, in order.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<[u8]>,
    {
        self.args
            .extend(args.into_iter().map(|a| a.as_ref().to_vec()));
        self
    }

    /// Attach private data that is passed to the contract but not recorded
    /// on the ledger.
    pub fn transient(mut self, key: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        self.transient.insert(key.into(), value.into());
        self
    }

    /// Restrict endorsement (or, for evaluation, the queried peer) to these
    /// organisations.
    pub fn endorsing_organizations<I, S>(mut self, orgs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.endorsing_organizations
            .extend(orgs.into_iter().map(Into::into));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn arguments(&self) -> &[Vec<u8>] {
        &self.args
    }

    pub fn organizations(&self) -> &[String] {
        &self.endorsing_organizations
    }
}

// ---------------------------------------------------------------------------
// Transaction context
// ---------------------------------------------------------------------------

/// Compute a transaction id from a signature header's nonce and creator.
pub fn transaction_id(nonce: &[u8], creator: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(nonce);
    hasher.update(creator);
    hex::encode(hasher.finalize())
}

/// The per-transaction values shared by every message of one call.
#[derive(Debug, Clone)]
pub(crate) struct TransactionContext {
    pub transaction_id: String,
    pub nonce: Vec<u8>,
    pub creator: Vec<u8>,
}

impl TransactionContext {
    pub fn new(identity: &Identity) -> Self {
        let mut nonce = vec![0u8; NONCE_LEN];
        rand::rngs::OsRng.fill_bytes(&mut nonce);
        let creator = identity.serialize();
        Self {
            transaction_id: transaction_id(&nonce, &creator),
            nonce,
            creator,
        }
    }
}

// ---------------------------------------------------------------------------
// Building and signing
// ---------------------------------------------------------------------------

/// Build the unsigned protobuf proposal for `function` on `chaincode`.
pub(crate) fn build_proposal(
    ctx: &TransactionContext,
    channel: &str,
    chaincode: &str,
    function: &str,
    proposal: &Proposal,
) -> proto::Proposal {
    let chaincode_id = proto::ChaincodeId {
        name: chaincode.to_string(),
        ..Default::default()
    };

    let now = chrono::Utc::now();
    let channel_header = proto::ChannelHeader {
        r#type: proto::HEADER_TYPE_ENDORSER_TRANSACTION,
        timestamp: Some(prost_types::Timestamp {
            seconds: now.timestamp(),
            nanos: now.timestamp_subsec_nanos() as i32,
        }),
        channel_id: channel.to_string(),
        tx_id: ctx.transaction_id.clone(),
        extension: proto::ChaincodeHeaderExtension {
            chaincode_id: Some(chaincode_id.clone()),
        }
        .encode_to_vec(),
        ..Default::default()
    };
    let signature_header = proto::SignatureHeader {
        creator: ctx.creator.clone(),
        nonce: ctx.nonce.clone(),
    };
    let header = proto::Header {
        channel_header: channel_header.encode_to_vec(),
        signature_header: signature_header.encode_to_vec(),
    };

    let mut args = Vec::with_capacity(proposal.args.len() + 1);
    args.push(function.as_bytes().to_vec());
    args.extend(proposal.args.iter().cloned());

    let invocation = proto::ChaincodeInvocationSpec {
        chaincode_spec: Some(proto::ChaincodeSpec {
            chaincode_id: Some(chaincode_id),
            input: Some(proto::ChaincodeInput {
                args,
                ..Default::default()
            }),
            ..Default::default()
        }),
    };
    let payload = proto::ChaincodeProposalPayload {
        input: invocation.encode_to_vec(),
        transient_map: proposal.transient.clone(),
    };

    proto::Proposal {
        header: header.encode_to_vec(),
        payload: payload.encode_to_vec(),
        extension: Vec::new(),
    }
}

pub(crate) fn sign_proposal(proposal: &proto::Proposal, signer: &Signer) -> proto::SignedProposal {
    let proposal_bytes = proposal.encode_to_vec();
    let signature = signer.sign(&proposal_bytes);
    proto::SignedProposal {
        proposal_bytes,
        signature,
    }
}

/// Sign a prepared transaction in place.
pub(crate) fn sign_envelope(envelope: &mut proto::Envelope, signer: &Signer) {
    envelope.signature = signer.sign(&envelope.payload);
}

pub(crate) fn commit_status_request(
    transaction_id: &str,
    channel: &str,
    creator: &[u8],
    signer: &Signer,
) -> proto::SignedCommitStatusRequest {
    let request = proto::CommitStatusRequest {
        transaction_id: transaction_id.to_string(),
        channel_id: channel.to_string(),
        identity: creator.to_vec(),
    }
    .encode_to_vec();
    let signature = signer.sign(&request);
    proto::SignedCommitStatusRequest { request, signature }
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

/// Extract the contract's response payload from a prepared transaction.
///
/// Walks `Envelope → Payload → Transaction → ChaincodeActionPayload →
/// ProposalResponsePayload → ChaincodeAction → Response`, using the first
/// action.
pub fn transaction_result(envelope: &proto::Envelope) -> Result<Vec<u8>> {
    let payload = proto::Payload::decode(envelope.payload.as_slice())?;
    let transaction = proto::Transaction::decode(payload.data.as_slice())?;
    let action = transaction
        .actions
        .first()
        .ok_or_else(|| GatewayError::Protocol("prepared transaction has no actions".into()))?;
    let action_payload = proto::ChaincodeActionPayload::decode(action.payload.as_slice())?;
    let endorsed = action_payload
        .action
        .ok_or_else(|| GatewayError::Protocol("transaction action is not endorsed".into()))?;
    let response_payload =
        proto::ProposalResponsePayload::decode(endorsed.proposal_response_payload.as_slice())?;
    let chaincode_action = proto::ChaincodeAction::decode(response_payload.extension.as_slice())?;
    let response = chaincode_action
        .response
        .ok_or_else(|| GatewayError::Protocol("chaincode action has no response".into()))?;
    Ok(response.payload)
}

/// A signed proposal as a peer sees it.
#[derive(Debug, Clone, PartialEq)]
pub struct ProposedInvocation {
    pub transaction_id: String,
    pub channel_id: String,
    pub chaincode: String,
    pub creator: proto::SerializedIdentity,
    /// The signed header bytes, reused when preparing the transaction.
    pub header: Vec<u8>,
    pub payload: Vec<u8>,
    /// `[function, args...]`.
    pub args: Vec<Vec<u8>>,
    pub transient: HashMap<String, Vec<u8>>,
}

impl ProposedInvocation {
    /// Decode a signed proposal and check that its transaction id matches
    /// its signature header.
    pub fn decode(signed: &proto::SignedProposal) -> Result<Self> {
        let proposal = proto::Proposal::decode(signed.proposal_bytes.as_slice())?;
        let header = proto::Header::decode(proposal.header.as_slice())?;
        let channel_header = proto::ChannelHeader::decode(header.channel_header.as_slice())?;
        let signature_header =
            proto::SignatureHeader::decode(header.signature_header.as_slice())?;
        let creator = proto::SerializedIdentity::decode(signature_header.creator.as_slice())?;

        let expected = transaction_id(&signature_header.nonce, &signature_header.creator);
        if channel_header.tx_id != expected {
            return Err(GatewayError::Protocol(format!(
                "transaction id {} does not match signature header",
                channel_header.tx_id
            )));
        }

        let payload = proto::ChaincodeProposalPayload::decode(proposal.payload.as_slice())?;
        let invocation = proto::ChaincodeInvocationSpec::decode(payload.input.as_slice())?;
        let spec = invocation
            .chaincode_spec
            .ok_or_else(|| GatewayError::Protocol("proposal has no chaincode spec".into()))?;
        let chaincode = spec.chaincode_id.map(|id| id.name).unwrap_or_default();
        let args = spec.input.map(|input| input.args).unwrap_or_default();

        Ok(Self {
            transaction_id: channel_header.tx_id,
            channel_id: channel_header.channel_id,
            chaincode,
            creator,
            header: proposal.header,
            payload: proposal.payload,
            args,
            transient: payload.transient_map,
        })
    }

    /// The invoked function name, lossily decoded.
    pub fn function(&self) -> String {
        self.args
            .first()
            .map(|f| String::from_utf8_lossy(f).into_owned())
            .unwrap_or_default()
    }
}
