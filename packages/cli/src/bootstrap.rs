//! Startup: credentials first, then the channel, then the session.
//!
//! Credentials are loaded before any connection is attempted, so a missing
//! certificate or an ambiguous keystore fails without touching the network.

use std::sync::Arc;

use tracing::info;
use utopia_gateway::{Gateway, GatewayTransport, GrpcConnection, Identity, Result, Signer};

use crate::config::Config;

/// The client identity and its signer.
#[derive(Debug)]
pub struct Credentials {
    pub identity: Identity,
    pub signer: Signer,
}

/// Load the certificate and the single private key named by `config`.
pub fn load_credentials(config: &Config) -> Result<Credentials> {
    let identity = Identity::load(&config.msp_id, &config.cert_path)?;
    let signer = Signer::load(&config.key_source())?;
    info!(
        "loaded identity for {} with {} key",
        identity.msp_id(),
        signer.algorithm()
    );
    Ok(Credentials { identity, signer })
}

/// Open the one TLS channel shared by the whole run.
pub async fn connect(config: &Config) -> Result<Arc<GrpcConnection>> {
    let connection = GrpcConnection::connect(&config.connection()).await?;
    Ok(Arc::new(connection))
}

/// Bind credentials to a transport with the default call deadlines.
pub fn open_session(credentials: Credentials, transport: Arc<dyn GatewayTransport>) -> Gateway {
    Gateway::connect(transport, credentials.identity, credentials.signer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use utopia_gateway::GatewayError;

    fn config_in(dir: &std::path::Path) -> Config {
        let root = dir.to_string_lossy().into_owned();
        Config::from_lookup(|key| (key == "CRYPTO_PATH").then(|| root.clone()))
    }

    #[test]
    fn missing_certificate_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_credentials(&config_in(dir.path())).unwrap_err();
        assert!(matches!(err, GatewayError::Config(_)), "{err}");
    }

    #[test]
    fn empty_keystore_fails_before_connecting() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        fs::create_dir_all(config.cert_path.parent().unwrap()).unwrap();
        fs::create_dir_all(&config.key_directory_path).unwrap();
        fs::write(
            &config.cert_path,
            "-----BEGIN CERTIFICATE-----\nMAA=\n-----END CERTIFICATE-----\n",
        )
        .unwrap();

        let err = load_credentials(&config).unwrap_err();
        match err {
            GatewayError::Config(msg) => assert!(msg.contains("no key files"), "{msg}"),
            other => panic!("expected Config, got {other}"),
        }
    }
}
