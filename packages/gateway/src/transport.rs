//! The gateway RPC seam and its gRPC implementation.
//!
//! [`GatewayTransport`] is the contract between a session and the peer: four
//! unary calls, each carrying its deadline. [`GrpcConnection`] implements it
//! over one TLS `tonic` channel; tests implement it in-process.
//!
//! # Connection setup
//!
//! ```text
//! PEER_ENDPOINT  localhost:7051          → https://localhost:7051
//! TLS_CERT_PATH  …/tls/ca.crt            → sole trust root
//! PEER_HOST_ALIAS peer0.org1.example.com → name verified in the server cert
//! ```

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tonic::codec::ProstCodec;
use tonic::codegen::http::uri::PathAndQuery;
use tonic::transport::{Certificate, Channel, ClientTlsConfig};
use tonic::Status;
use tracing::{debug, info};

use crate::error::{GatewayError, Result};
use crate::pem;
use crate::proto::{
    CommitStatusResponse, EndorseRequest, EndorseResponse, EvaluateRequest, EvaluateResponse,
    SignedCommitStatusRequest, SubmitRequest, SubmitResponse,
};

const EVALUATE_PATH: &str = "/gateway.Gateway/Evaluate";
const ENDORSE_PATH: &str = "/gateway.Gateway/Endorse";
const SUBMIT_PATH: &str = "/gateway.Gateway/Submit";
const COMMIT_STATUS_PATH: &str = "/gateway.Gateway/CommitStatus";

// ---------------------------------------------------------------------------
// GatewayTransport
// ---------------------------------------------------------------------------

/// The four gateway RPCs.
///
/// `timeout` is the deadline the caller will enforce; implementations
/// should forward it to the peer so server-side work is abandoned too.
#[async_trait]
pub trait GatewayTransport: Send + Sync {
    async fn evaluate(
        &self,
        request: EvaluateRequest,
        timeout: Duration,
    ) -> std::result::Result<EvaluateResponse, Status>;

    async fn endorse(
        &self,
        request: EndorseRequest,
        timeout: Duration,
    ) -> std::result::Result<EndorseResponse, Status>;

    async fn submit(
        &self,
        request: SubmitRequest,
        timeout: Duration,
    ) -> std::result::Result<SubmitResponse, Status>;

    async fn commit_status(
        &self,
        request: SignedCommitStatusRequest,
        timeout: Duration,
    ) -> std::result::Result<CommitStatusResponse, Status>;

    /// Release the underlying connection. Returns `true` only for the call
    /// that performed the release.
    fn close(&self) -> bool;
}

// ---------------------------------------------------------------------------
// ConnectionConfig
// ---------------------------------------------------------------------------

/// Where and how to reach the gateway peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    /// `host:port`, or a full `https://host:port` URI.
    pub endpoint: String,
    /// PEM trust root for the peer's TLS certificate.
    pub tls_root_cert: PathBuf,
    /// Server name expected in the peer's TLS certificate.
    pub host_alias: String,
    pub connect_timeout: Duration,
}

/// Normalise an endpoint to a URI, defaulting the scheme to `https`.
pub fn endpoint_uri(endpoint: &str) -> String {
    if endpoint.contains("://") {
        endpoint.to_string()
    } else {
        format!("https://{endpoint}")
    }
}

// ---------------------------------------------------------------------------
// GrpcConnection
// ---------------------------------------------------------------------------

/// One long-lived TLS channel to a gateway peer.
///
/// Cloning the inner channel is cheap; every call reuses the same HTTP/2
/// connection. Create one per process and share it.
pub struct GrpcConnection {
    channel: Channel,
    uri: String,
    closed: AtomicBool,
}

impl GrpcConnection {
    /// Load the trust root and open the channel.
    ///
    /// # Errors
    ///
    /// - [`GatewayError::Config`]: the trust root cannot be read, is not a
    ///   PEM certificate, or the endpoint is not a valid URI.
    /// - [`GatewayError::Transport`]: TLS setup or the connection failed.
    pub async fn connect(config: &ConnectionConfig) -> Result<Self> {
        let root = std::fs::read(&config.tls_root_cert).map_err(|e| {
            GatewayError::Config(format!(
                "failed to read TLS root certificate {}: {e}",
                config.tls_root_cert.display()
            ))
        })?;
        pem::decode_block(&root, "CERTIFICATE").map_err(|e| {
            GatewayError::Config(format!(
                "invalid TLS root certificate {}: {e}",
                config.tls_root_cert.display()
            ))
        })?;

        let tls = ClientTlsConfig::new()
            .ca_certificate(Certificate::from_pem(&root))
            .domain_name(config.host_alias.clone());

        let uri = endpoint_uri(&config.endpoint);
        let endpoint = Channel::from_shared(uri.clone())
            .map_err(|e| GatewayError::Config(format!("invalid peer endpoint {uri}: {e}")))?
            .tls_config(tls)
            .map_err(|e| GatewayError::Transport(format!("TLS setup for {uri} failed: {e}")))?
            .connect_timeout(config.connect_timeout);

        info!("connecting to gateway peer {uri} as {}", config.host_alias);
        let channel = endpoint
            .connect()
            .await
            .map_err(|e| GatewayError::Transport(format!("failed to connect to {uri}: {e}")))?;

        Ok(Self {
            channel,
            uri,
            closed: AtomicBool::new(false),
        })
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    async fn unary<Req, Resp>(
        &self,
        path: &'static str,
        request: Req,
        timeout: Duration,
    ) -> std::result::Result<Resp, Status>
    where
        Req: prost::Message + Send + Sync + 'static,
        Resp: prost::Message + Default + Send + Sync + 'static,
    {
        if self.closed.load(Ordering::SeqCst) {
            return Err(Status::cancelled("connection is closed"));
        }

        let mut grpc = tonic::client::Grpc::new(self.channel.clone());
        grpc.ready()
            .await
            .map_err(|e| Status::unavailable(format!("peer {} is not ready: {e}", self.uri)))?;

        let mut request = tonic::Request::new(request);
        request.set_timeout(timeout);

        debug!("{path} (deadline {timeout:?})");
        let codec: ProstCodec<Req, Resp> = ProstCodec::default();
        let response = grpc
            .unary(request, PathAndQuery::from_static(path), codec)
            .await?;
        Ok(response.into_inner())
    }
}

#[async_trait]
impl GatewayTransport for GrpcConnection {
    async fn evaluate(
        &self,
        request: EvaluateRequest,
        timeout: Duration,
    ) -> std::result::Result<EvaluateResponse, Status> {
        self.unary(EVALUATE_PATH, request, timeout).await
    }

    async fn endorse(
        &self,
        request: EndorseRequest,
        timeout: Duration,
    ) -> std::result::Result<EndorseResponse, Status> {
        self.unary(ENDORSE_PATH, request, timeout).await
    }

    async fn submit(
        &self,
        request: SubmitRequest,
        timeout: Duration,
    ) -> std::result::Result<SubmitResponse, Status> {
        self.unary(SUBMIT_PATH, request, timeout).await
    }

    async fn commit_status(
        &self,
        request: SignedCommitStatusRequest,
        timeout: Duration,
    ) -> std::result::Result<CommitStatusResponse, Status> {
        self.unary(COMMIT_STATUS_PATH, request, timeout).await
    }

    fn close(&self) -> bool {
        let first = !self.closed.swap(true, Ordering::SeqCst);
        if first {
            info!("closed connection to {}", self.uri);
        }
        first
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_gets_https_scheme() {
        assert_eq!(endpoint_uri("localhost:7051"), "https://localhost:7051");
        assert_eq!(endpoint_uri("http://peer:7051"), "http://peer:7051");
    }

    fn config(root: PathBuf) -> ConnectionConfig {
        ConnectionConfig {
            endpoint: "localhost:7051".into(),
            tls_root_cert: root,
            host_alias: "peer0.org1.example.com".into(),
            connect_timeout: Duration::from_secs(1),
        }
    }

    #[tokio::test]
    async fn missing_trust_root_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = GrpcConnection::connect(&config(dir.path().join("ca.crt")))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, GatewayError::Config(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn invalid_trust_root_is_rejected_before_connecting() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ca.crt");
        std::fs::write(&path, "not a certificate").unwrap();
        let err = GrpcConnection::connect(&config(path)).await.err().unwrap();
        assert!(
            matches!(&err, GatewayError::Config(m) if m.contains("invalid TLS root certificate")),
            "got {err:?}"
        );
    }
}
