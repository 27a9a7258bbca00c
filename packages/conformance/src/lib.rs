//! Shared helpers for the utopia-demo conformance suite.
//!
//! Provides [`MemoryLedger`], an in-process peer implementing the gateway
//! transport seam over an in-memory `utopiamaker` contract, and
//! [`connect`], which opens a real [`Gateway`] session against it so tests
//! exercise the same proposal building, signing and decoding as a run
//! against a network peer.

pub mod contract;
pub mod ledger;

use std::sync::Arc;

use ed25519_dalek::SigningKey;
use rand::rngs::OsRng;
use utopia_demo::Credentials;
use utopia_gateway::{CallTimeouts, Gateway, GatewayTransport, Identity, Signer};

pub use contract::{ContractError, UtopiaState};
pub use ledger::{MemoryLedger, MVCC_READ_CONFLICT};

/// A DER `SEQUENCE` wrapped as a certificate; enough for the client's
/// sanity checks, which do not parse X.509.
pub const TEST_CERT_PEM: &str =
    "-----BEGIN CERTIFICATE-----\nMAMCAQE=\n-----END CERTIFICATE-----\n";

/// A fresh client identity with a random Ed25519 key.
pub fn credentials() -> Credentials {
    Credentials {
        identity: Identity::new("Org1MSP", TEST_CERT_PEM.as_bytes().to_vec()),
        signer: Signer::from_ed25519(SigningKey::generate(&mut OsRng)),
    }
}

/// A ledger that verifies every signature against `credentials`' key.
pub fn verifying_ledger(credentials: &Credentials) -> Arc<MemoryLedger> {
    Arc::new(MemoryLedger::verifying(credentials.signer.public_key()))
}

/// Open a session against `ledger` with fresh credentials and the default
/// deadlines.
pub fn connect(ledger: &Arc<MemoryLedger>) -> Gateway {
    connect_with_timeouts(ledger, CallTimeouts::default())
}

pub fn connect_with_timeouts(ledger: &Arc<MemoryLedger>, timeouts: CallTimeouts) -> Gateway {
    let Credentials { identity, signer } = credentials();
    let transport = Arc::clone(ledger) as Arc<dyn GatewayTransport>;
    Gateway::connect_with_timeouts(transport, identity, signer, timeouts)
}
