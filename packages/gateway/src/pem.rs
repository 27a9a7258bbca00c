//! Minimal PEM block extraction for credential sanity checks.
//!
//! Private keys are parsed by the `p256`/`ed25519-dalek` PKCS#8 decoders;
//! this module only confirms that certificate files (the client identity and
//! the TLS trust root) hold a well-formed block before they are handed to
//! the peer or to the TLS stack.

use base64::{engine::general_purpose::STANDARD, Engine as _};

/// Decode the first PEM block labelled `label` into its DER bytes.
///
/// Returns a description of the problem when the block is missing, its
/// body is not base64, or the body is not a DER `SEQUENCE`.
pub(crate) fn decode_block(pem: &[u8], label: &str) -> Result<Vec<u8>, String> {
    let text = std::str::from_utf8(pem).map_err(|_| "not UTF-8 text".to_string())?;

    let begin = format!("-----BEGIN {label}-----");
    let end = format!("-----END {label}-----");

    let start = text
        .find(&begin)
        .ok_or_else(|| format!("no {label} block found"))?
        + begin.len();
    let stop = text[start..]
        .find(&end)
        .ok_or_else(|| format!("unterminated {label} block"))?
        + start;

    let body: String = text[start..stop]
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();
    let der = STANDARD
        .decode(body.as_bytes())
        .map_err(|e| format!("{label} block is not valid base64: {e}"))?;

    // Every certificate and key structure is an ASN.1 SEQUENCE.
    match der.first() {
        Some(0x30) => Ok(der),
        _ => Err(format!("{label} block does not contain DER data")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // "MAMCAQE=" is the DER SEQUENCE { INTEGER 1 }.
    const BLOCK: &str = "-----BEGIN CERTIFICATE-----\nMAMCAQE=\n-----END CERTIFICATE-----\n";

    #[test]
    fn decodes_sequence() {
        assert_eq!(
            decode_block(BLOCK.as_bytes(), "CERTIFICATE").unwrap(),
            vec![0x30, 0x03, 0x02, 0x01, 0x01]
        );
    }

    #[test]
    fn label_must_match() {
        assert!(decode_block(BLOCK.as_bytes(), "PRIVATE KEY").is_err());
    }

    #[test]
    fn rejects_garbage() {
        assert!(decode_block(b"hello", "CERTIFICATE").is_err());
        let bad = "-----BEGIN CERTIFICATE-----\n!!!!\n-----END CERTIFICATE-----";
        assert!(decode_block(bad.as_bytes(), "CERTIFICATE").is_err());
        let not_der = "-----BEGIN CERTIFICATE-----\naGVsbG8=\n-----END CERTIFICATE-----";
        assert!(decode_block(not_der.as_bytes(), "CERTIFICATE").is_err());
        let open = "-----BEGIN CERTIFICATE-----\nMAMCAQE=\n";
        assert!(decode_block(open.as_bytes(), "CERTIFICATE").is_err());
    }
}
