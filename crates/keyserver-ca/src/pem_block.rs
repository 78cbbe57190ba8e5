//! Strict single-block PEM decoding.
//!
//! Key material, certificates and CSRs all arrive as exactly one PEM block.
//! Anything that would let a second block or stray bytes slip through
//! unnoticed is rejected.

use crate::error::{CaError, Result};

/// Label of an X.509 certificate block.
pub const CERTIFICATE_TAG: &str = "CERTIFICATE";

/// Label of a PKCS#10 certificate signing request block.
pub const CERTIFICATE_REQUEST_TAG: &str = "CERTIFICATE REQUEST";

/// Label of a PKCS#1 RSA private key block.
pub const RSA_PRIVATE_KEY_TAG: &str = "RSA PRIVATE KEY";

/// Label of a PKCS#8 private key block.
pub const PRIVATE_KEY_TAG: &str = "PRIVATE KEY";

const PEM_HEADER: &[u8] = b"-----BEGIN ";
const PEM_FOOTER: &[u8] = b"-----END ";

/// Decode exactly one PEM block whose label is one of `expected_tags`.
///
/// The input must start with the PEM header. The footer line may be
/// followed by its own line terminator and nothing else.
///
/// Returns the DER payload of the block.
pub fn load_single_pem_block(data: &[u8], expected_tags: &[&str]) -> Result<Vec<u8>> {
    if !data.starts_with(PEM_HEADER) {
        return Err(CaError::MissingPemHeader);
    }

    let block_len = block_length(data)
        .ok_or_else(|| CaError::PemDecode("missing PEM footer".to_string()))?;
    let block = ::pem::parse(&data[..block_len]).map_err(|e| CaError::PemDecode(e.to_string()))?;

    if !expected_tags.contains(&block.tag()) {
        return Err(CaError::UnexpectedPemType {
            found: block.tag().to_string(),
            expected: expected_tags.iter().map(ToString::to_string).collect(),
        });
    }

    if block_len < data.len() {
        return Err(CaError::TrailingData);
    }

    Ok(block.into_contents())
}

/// Length of the first block, up to and including the footer's line break.
fn block_length(data: &[u8]) -> Option<usize> {
    let footer = data
        .windows(PEM_FOOTER.len())
        .position(|window| window == PEM_FOOTER)?;
    let line_end = data[footer..]
        .iter()
        .position(|&b| b == b'\n')
        .map_or(data.len(), |offset| footer + offset + 1);
    Some(line_end)
}

/// Encode a DER certificate as a PEM `CERTIFICATE` block with LF line endings.
pub fn encode_certificate(der: &[u8]) -> String {
    let config = ::pem::EncodeConfig::new().set_line_ending(::pem::LineEnding::LF);
    ::pem::encode_config(&::pem::Pem::new(CERTIFICATE_TAG, der), config)
}

#[cfg(test)]
mod tests {
    use super::*;

    const CA_PEM: &[u8] = include_bytes!("../tests/fixtures/ca.pem");
    const CA_KEY: &[u8] = include_bytes!("../tests/fixtures/ca.key");

    #[test]
    fn test_loads_single_certificate() {
        let der = load_single_pem_block(CA_PEM, &[CERTIFICATE_TAG]).unwrap();
        // DER SEQUENCE
        assert_eq!(der[0], 0x30);
        assert!(x509_parser::parse_x509_certificate(&der).is_ok());
    }

    #[test]
    fn test_accepts_any_expected_tag() {
        let der =
            load_single_pem_block(CA_KEY, &[RSA_PRIVATE_KEY_TAG, PRIVATE_KEY_TAG]).unwrap();
        assert!(!der.is_empty());
    }

    #[test]
    fn test_accepts_crlf_footer() {
        let text = String::from_utf8(CA_PEM.to_vec()).unwrap();
        let crlf = text.replace('\n', "\r\n");
        assert!(load_single_pem_block(crlf.as_bytes(), &[CERTIFICATE_TAG]).is_ok());
    }

    #[test]
    fn test_accepts_missing_final_newline() {
        let trimmed = CA_PEM.strip_suffix(b"\n").unwrap();
        assert!(load_single_pem_block(trimmed, &[CERTIFICATE_TAG]).is_ok());
    }

    #[test]
    fn test_rejects_missing_header() {
        let mut data = b"\n".to_vec();
        data.extend_from_slice(CA_PEM);
        assert!(matches!(
            load_single_pem_block(&data, &[CERTIFICATE_TAG]),
            Err(CaError::MissingPemHeader)
        ));
        assert!(matches!(
            load_single_pem_block(b"", &[CERTIFICATE_TAG]),
            Err(CaError::MissingPemHeader)
        ));
    }

    #[test]
    fn test_rejects_wrong_tag() {
        let err = load_single_pem_block(CA_KEY, &[CERTIFICATE_TAG]).unwrap_err();
        match err {
            CaError::UnexpectedPemType { found, expected } => {
                assert_eq!(found, RSA_PRIVATE_KEY_TAG);
                assert_eq!(expected, vec![CERTIFICATE_TAG.to_string()]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_rejects_trailing_bytes() {
        for trailer in [&b"x"[..], b"\n", b" ", b"\0", b"# comment\n"] {
            let mut data = CA_PEM.to_vec();
            data.extend_from_slice(trailer);
            assert!(
                matches!(
                    load_single_pem_block(&data, &[CERTIFICATE_TAG]),
                    Err(CaError::TrailingData)
                ),
                "trailer {trailer:?} was accepted"
            );
        }
    }

    #[test]
    fn test_rejects_second_block() {
        let mut data = CA_PEM.to_vec();
        data.extend_from_slice(CA_PEM);
        assert!(matches!(
            load_single_pem_block(&data, &[CERTIFICATE_TAG]),
            Err(CaError::TrailingData)
        ));
    }

    #[test]
    fn test_rejects_truncated_block() {
        let text = std::str::from_utf8(CA_PEM).unwrap();
        let truncated = &text[..text.find("-----END").unwrap()];
        assert!(matches!(
            load_single_pem_block(truncated.as_bytes(), &[CERTIFICATE_TAG]),
            Err(CaError::PemDecode(_))
        ));
    }

    #[test]
    fn test_rejects_bad_base64() {
        let data = b"-----BEGIN CERTIFICATE-----\n!!!!\n-----END CERTIFICATE-----\n";
        assert!(matches!(
            load_single_pem_block(data, &[CERTIFICATE_TAG]),
            Err(CaError::PemDecode(_))
        ));
    }

    #[test]
    fn test_encode_certificate() {
        let der = load_single_pem_block(CA_PEM, &[CERTIFICATE_TAG]).unwrap();
        let pem = encode_certificate(&der);
        assert!(pem.starts_with("-----BEGIN CERTIFICATE-----\n"));
        assert!(pem.ends_with("-----END CERTIFICATE-----\n"));
        assert!(!pem.contains('\r'));
        assert_eq!(load_single_pem_block(pem.as_bytes(), &[CERTIFICATE_TAG]).unwrap(), der);
    }
}
