//! # utopia-gateway
//!
//! Client for a permissioned-ledger gateway peer: loads a member identity and
//! its signing key, opens one TLS gRPC channel, and evaluates or submits
//! contract transactions through signed proposals.
//!
//! ## Modules
//!
//! | Module        | Contents                                                      |
//! |---------------|---------------------------------------------------------------|
//! | [`identity`]  | X.509 identity, signing-key discovery, ECDSA/Ed25519 signer   |
//! | [`transport`] | [`GatewayTransport`] seam and the [`GrpcConnection`] channel   |
//! | [`gateway`]   | [`Gateway`] → [`Network`] → [`Contract`] session surface       |
//! | [`proposal`]  | Proposal builder, transaction ids, envelope decoding          |
//! | [`options`]   | Per-call deadlines                                            |
//! | [`error`]     | [`GatewayError`] taxonomy                                     |
//! | [`proto`]     | Wire messages                                                 |
//!
//! ## Example
//!
//! ```no_run
//! # async fn demo() -> utopia_gateway::Result<()> {
//! use std::sync::Arc;
//! use std::time::Duration;
//! use utopia_gateway::{ConnectionConfig, Gateway, GrpcConnection, Identity, KeySource, Signer};
//!
//! let identity = Identity::load("Org1MSP", "cert.pem".as_ref())?;
//! let signer = Signer::load(&KeySource::Directory("keystore".into()))?;
//! let connection = Arc::new(
//!     GrpcConnection::connect(&ConnectionConfig {
//!         endpoint: "localhost:7051".into(),
//!         tls_root_cert: "ca.crt".into(),
//!         host_alias: "peer0.org1.example.com".into(),
//!         connect_timeout: Duration::from_secs(5),
//!     })
//!     .await?,
//! );
//! let gateway = Gateway::connect(connection, identity, signer);
//! let contract = gateway.network("mychannel").contract("basic");
//! let count = contract.evaluate_transaction::<&str>("GetUserCount", &[]).await?;
//! # let _ = count;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod gateway;
pub mod identity;
pub mod options;
mod pem;
pub mod proposal;
pub mod proto;
pub mod transport;

pub use error::{ErrorDetail, GatewayError, Result};
pub use gateway::{CommitStatus, Contract, Gateway, Network, SubmittedTransaction};
pub use identity::{Identity, KeySource, PublicKey, Signer};
pub use options::{CallTimeouts, CallType};
pub use proposal::{transaction_id, Proposal, ProposedInvocation};
pub use transport::{ConnectionConfig, GatewayTransport, GrpcConnection};
