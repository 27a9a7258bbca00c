//! Run configuration, populated from environment variables.

use std::path::{Path, PathBuf};
use std::time::Duration;

use utopia_core::{ScriptParams, DEFAULT_KEY_HASH};
use utopia_gateway::{ConnectionConfig, KeySource};

const DEFAULT_CRYPTO_PATH: &str =
    "../../test-network/organizations/peerOrganizations/org1.example.com";
const USER_MSP_DIR: &str = "users/User1@org1.example.com/msp";

/// Everything a run needs, resolved once at startup and passed down
/// explicitly.
///
/// Unset and empty variables both fall back to the default. Path defaults
/// are derived from the resolved `CRYPTO_PATH`.
///
/// | Variable | Default | Description |
/// |----------|---------|-------------|
/// | `CHANNEL_NAME` | `mychannel` | Channel the contract is deployed to |
/// | `CHAINCODE_NAME` | `utopiamaker` | Deployed contract name |
/// | `MSP_ID` | `Org1MSP` | Membership service provider of the client identity |
/// | `CRYPTO_PATH` | `../../test-network/organizations/peerOrganizations/org1.example.com` | Root of the organisation's crypto material |
/// | `KEY_DIRECTORY_PATH` | `<crypto>/users/User1@org1.example.com/msp/keystore` | Keystore holding exactly one private key |
/// | `KEY_PATH` | (absent) | Explicit private key file; overrides the keystore |
/// | `CERT_PATH` | `<crypto>/users/User1@org1.example.com/msp/signcerts/cert.pem` | Client certificate |
/// | `TLS_CERT_PATH` | `<crypto>/peers/peer0.org1.example.com/tls/ca.crt` | Peer TLS trust root |
/// | `PEER_ENDPOINT` | `localhost:7051` | Gateway peer address |
/// | `PEER_HOST_ALIAS` | `peer0.org1.example.com` | Name expected in the peer's TLS certificate |
/// | `DEMO_PROJECT_ID` | `project0` | Project id used by the demo after `CreateProject` |
/// | `DEMO_TRANSACTION_ID` | `transaction0` | Transaction id used by the demo after `CreateTransaction` |
/// | `DEMO_KEY_HASH` | fixed demo hash | Key hash passed on every demo write |
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub channel_name: String,
    pub chaincode_name: String,
    pub msp_id: String,
    pub crypto_path: PathBuf,
    pub key_directory_path: PathBuf,
    /// When set, the keystore directory is not consulted.
    pub key_path: Option<PathBuf>,
    pub cert_path: PathBuf,
    pub tls_cert_path: PathBuf,
    pub peer_endpoint: String,
    pub peer_host_alias: String,

    pub project_id: String,
    pub transaction_id: String,
    pub key_hash: String,

    /// Upper bound on establishing the channel.
    pub connect_timeout: Duration,
}

impl Config {
    /// Populate config from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Populate config from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());
        let or = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_string());
        let path_or = |key: &str, default: PathBuf| get(key).map(PathBuf::from).unwrap_or(default);

        let crypto_path = PathBuf::from(or("CRYPTO_PATH", DEFAULT_CRYPTO_PATH));
        let user_msp = crypto_path.join(USER_MSP_DIR);

        Self {
            channel_name: or("CHANNEL_NAME", "mychannel"),
            chaincode_name: or("CHAINCODE_NAME", "utopiamaker"),
            msp_id: or("MSP_ID", "Org1MSP"),
            key_directory_path: path_or("KEY_DIRECTORY_PATH", user_msp.join("keystore")),
            key_path: get("KEY_PATH").map(PathBuf::from),
            cert_path: path_or("CERT_PATH", user_msp.join("signcerts").join("cert.pem")),
            tls_cert_path: path_or(
                "TLS_CERT_PATH",
                crypto_path
                    .join("peers")
                    .join("peer0.org1.example.com")
                    .join("tls")
                    .join("ca.crt"),
            ),
            peer_endpoint: or("PEER_ENDPOINT", "localhost:7051"),
            peer_host_alias: or("PEER_HOST_ALIAS", "peer0.org1.example.com"),
            project_id: or("DEMO_PROJECT_ID", "project0"),
            transaction_id: or("DEMO_TRANSACTION_ID", "transaction0"),
            key_hash: or("DEMO_KEY_HASH", DEFAULT_KEY_HASH),
            connect_timeout: Duration::from_secs(5),
            crypto_path,
        }
    }

    /// Where the signing key is read from.
    pub fn key_source(&self) -> KeySource {
        match &self.key_path {
            Some(path) => KeySource::File(path.clone()),
            None => KeySource::Directory(self.key_directory_path.clone()),
        }
    }

    pub fn connection(&self) -> ConnectionConfig {
        ConnectionConfig {
            endpoint: self.peer_endpoint.clone(),
            tls_root_cert: self.tls_cert_path.clone(),
            host_alias: self.peer_host_alias.clone(),
            connect_timeout: self.connect_timeout,
        }
    }

    pub fn script_params(&self) -> ScriptParams {
        ScriptParams {
            key_hash: self.key_hash.clone(),
            project_id: self.project_id.clone(),
            transaction_id: self.transaction_id.clone(),
            ..ScriptParams::default()
        }
    }

    /// Rows for the input-parameter table printed before connecting.
    pub fn parameter_rows(&self) -> Vec<(&'static str, String)> {
        let mut rows = vec![
            ("channelName", self.channel_name.clone()),
            ("chaincodeName", self.chaincode_name.clone()),
            ("mspId", self.msp_id.clone()),
            ("cryptoPath", display(&self.crypto_path)),
            ("keyDirectoryPath", display(&self.key_directory_path)),
        ];
        if let Some(key_path) = &self.key_path {
            rows.push(("keyPath", display(key_path)));
        }
        rows.extend([
            ("certPath", display(&self.cert_path)),
            ("tlsCertPath", display(&self.tls_cert_path)),
            ("peerEndpoint", self.peer_endpoint.clone()),
            ("peerHostAlias", self.peer_host_alias.clone()),
        ]);
        rows
    }
}

fn display(path: &Path) -> String {
    path.display().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn from_map(vars: &[(&str, &str)]) -> Config {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn defaults_when_unset() {
        let c = from_map(&[]);
        assert_eq!(c.channel_name, "mychannel");
        assert_eq!(c.chaincode_name, "utopiamaker");
        assert_eq!(c.msp_id, "Org1MSP");
        assert_eq!(c.crypto_path, PathBuf::from(DEFAULT_CRYPTO_PATH));
        assert_eq!(
            c.key_directory_path,
            PathBuf::from(DEFAULT_CRYPTO_PATH).join("users/User1@org1.example.com/msp/keystore")
        );
        assert_eq!(
            c.cert_path,
            PathBuf::from(DEFAULT_CRYPTO_PATH)
                .join("users/User1@org1.example.com/msp/signcerts/cert.pem")
        );
        assert_eq!(
            c.tls_cert_path,
            PathBuf::from(DEFAULT_CRYPTO_PATH).join("peers/peer0.org1.example.com/tls/ca.crt")
        );
        assert_eq!(c.peer_endpoint, "localhost:7051");
        assert_eq!(c.peer_host_alias, "peer0.org1.example.com");
        assert_eq!(c.key_path, None);
        assert_eq!(c.project_id, "project0");
        assert_eq!(c.transaction_id, "transaction0");
        assert_eq!(c.key_hash, DEFAULT_KEY_HASH);
    }

    #[test]
    fn empty_values_count_as_unset() {
        let c = from_map(&[("CHANNEL_NAME", ""), ("PEER_ENDPOINT", "")]);
        assert_eq!(c.channel_name, "mychannel");
        assert_eq!(c.peer_endpoint, "localhost:7051");
    }

    #[test]
    fn path_defaults_follow_crypto_path() {
        let c = from_map(&[("CRYPTO_PATH", "/org1")]);
        assert_eq!(
            c.key_directory_path,
            PathBuf::from("/org1/users/User1@org1.example.com/msp/keystore")
        );
        assert_eq!(
            c.tls_cert_path,
            PathBuf::from("/org1/peers/peer0.org1.example.com/tls/ca.crt")
        );
    }

    #[test]
    fn explicit_paths_override_derived_ones() {
        let c = from_map(&[
            ("CRYPTO_PATH", "/org1"),
            ("CERT_PATH", "/elsewhere/cert.pem"),
            ("KEY_DIRECTORY_PATH", "/keys"),
        ]);
        assert_eq!(c.cert_path, PathBuf::from("/elsewhere/cert.pem"));
        assert_eq!(c.key_source(), KeySource::Directory("/keys".into()));
    }

    #[test]
    fn key_path_wins_over_directory() {
        let c = from_map(&[("KEY_PATH", "/keys/priv_sk"), ("KEY_DIRECTORY_PATH", "/keys")]);
        assert_eq!(c.key_source(), KeySource::File("/keys/priv_sk".into()));
        assert!(c.parameter_rows().iter().any(|(name, _)| *name == "keyPath"));
    }

    #[test]
    fn fixture_ids_flow_into_script_params() {
        let c = from_map(&[("DEMO_PROJECT_ID", "project7"), ("DEMO_TRANSACTION_ID", "transaction9")]);
        let params = c.script_params();
        assert_eq!(params.project_id, "project7");
        assert_eq!(params.transaction_id, "transaction9");
        assert_eq!(params.user_id, "user0");
    }

    #[test]
    fn parameter_rows_in_display_order() {
        let names: Vec<&str> = from_map(&[]).parameter_rows().iter().map(|(n, _)| *n).collect();
        assert_eq!(
            names,
            vec![
                "channelName",
                "chaincodeName",
                "mspId",
                "cryptoPath",
                "keyDirectoryPath",
                "certPath",
                "tlsCertPath",
                "peerEndpoint",
                "peerHostAlias",
            ]
        );
    }
}
