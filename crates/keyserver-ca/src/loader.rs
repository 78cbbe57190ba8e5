//! Decoding of CA key material.
//!
//! Private keys may come as PKCS#1 or PKCS#8, but must be RSA either way.
//! The certificate must carry an RSA public key whose modulus equals the
//! private key's, which is the proof that the two belong together.

use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pkcs8::{DecodePrivateKey, PrivateKeyInfo};
use rsa::traits::PublicKeyParts;
use rsa::RsaPrivateKey;
use x509_parser::extensions::ParsedExtension;
use x509_parser::oid_registry::OID_PKCS1_RSAENCRYPTION;
use x509_parser::public_key::PublicKey;

use crate::error::{CaError, Result};

/// The parts of the CA certificate the authority keeps around.
#[derive(Debug, Clone)]
pub(crate) struct CaCertificate {
    /// Raw DER, used as trust anchor and equality key.
    pub der: Vec<u8>,
    /// Subject distinguished name (human-readable).
    pub subject: String,
    /// Subject name exactly as encoded, copied into issued certificates.
    pub subject_raw: Vec<u8>,
    /// Subject key identifier, if the certificate carries one.
    pub key_identifier: Option<Vec<u8>>,
    /// Serial number (hex).
    pub serial: String,
    /// RSA modulus, big-endian, no leading zeros.
    pub modulus: Vec<u8>,
}

/// Parse an RSA private key from PKCS#1 DER, falling back to PKCS#8.
pub(crate) fn parse_rsa_private_key(der: &[u8]) -> Result<RsaPrivateKey> {
    if let Ok(key) = RsaPrivateKey::from_pkcs1_der(der) {
        return Ok(key);
    }

    let info = PrivateKeyInfo::try_from(der).map_err(|e| CaError::KeyParse(e.to_string()))?;
    if info.algorithm.oid != rsa::pkcs1::ALGORITHM_OID {
        return Err(CaError::NonRsaPrivateKey);
    }
    RsaPrivateKey::from_pkcs8_der(der).map_err(|e| CaError::KeyParse(e.to_string()))
}

/// Parse the CA certificate and extract its RSA modulus.
pub(crate) fn parse_ca_certificate(der: Vec<u8>) -> Result<CaCertificate> {
    let (subject, subject_raw, key_identifier, serial, modulus) = {
        let (rem, cert) = x509_parser::parse_x509_certificate(&der)
            .map_err(|e| CaError::CertificateParse(e.to_string()))?;
        if !rem.is_empty() {
            return Err(CaError::CertificateParse(
                "trailing data after certificate".to_string(),
            ));
        }

        let spki = cert.public_key();
        if spki.algorithm.algorithm != OID_PKCS1_RSAENCRYPTION {
            return Err(CaError::NonRsaCertificateKey);
        }
        let modulus = match spki.parsed() {
            Ok(PublicKey::RSA(rsa)) => strip_leading_zeros(rsa.modulus).to_vec(),
            _ => return Err(CaError::NonRsaCertificateKey),
        };

        let key_identifier = cert
            .iter_extensions()
            .find_map(|ext| match ext.parsed_extension() {
                ParsedExtension::SubjectKeyIdentifier(id) => Some(id.0.to_vec()),
                _ => None,
            });

        (
            cert.subject().to_string(),
            cert.subject().as_raw().to_vec(),
            key_identifier,
            cert.raw_serial_as_string(),
            modulus,
        )
    };

    Ok(CaCertificate {
        der,
        subject,
        subject_raw,
        key_identifier,
        serial,
        modulus,
    })
}

/// Require the certificate's public modulus to equal the private key's.
pub(crate) fn ensure_key_matches(key: &RsaPrivateKey, cert: &CaCertificate) -> Result<()> {
    let key_modulus = key.n().to_bytes_be();
    if strip_leading_zeros(&key_modulus) == cert.modulus.as_slice() {
        Ok(())
    } else {
        Err(CaError::KeyMismatch)
    }
}

// DER integers carry a 0x00 pad when the high bit is set.
fn strip_leading_zeros(bytes: &[u8]) -> &[u8] {
    let start = bytes.iter().position(|&b| b != 0).unwrap_or(bytes.len());
    &bytes[start..]
}
