//! Byte-exact issuer names on issued certificates.
//!
//! rcgen re-encodes the issuer name from parsed attributes, which can change
//! string types or drop multi-valued RDNs. Chain building compares names
//! byte for byte, so when the encoded issuer differs from the CA subject the
//! raw subject is spliced into the TBS certificate and the result re-signed.

use der::asn1::{AnyRef, BitStringRef};
use der::{Decode, Encode, Tagged};
use rcgen::{KeyPair, SigningKey};

use crate::error::{CaError, Result};

/// Return `cert_der` with `issuer_name` as its issuer, re-signing if needed.
pub(crate) fn ensure_issuer_name(
    cert_der: Vec<u8>,
    issuer_name: &[u8],
    signing_key: &KeyPair,
) -> Result<Vec<u8>> {
    let (_, cert) = x509_parser::parse_x509_certificate(&cert_der)
        .map_err(|e| CaError::Signing(e.to_string()))?;
    if cert.issuer().as_raw() == issuer_name {
        return Ok(cert_der);
    }
    replace_issuer_name(&cert_der, issuer_name, signing_key)
}

fn replace_issuer_name(
    cert_der: &[u8],
    issuer_name: &[u8],
    signing_key: &KeyPair,
) -> Result<Vec<u8>> {
    let certificate = Vec::<AnyRef<'_>>::from_der(cert_der).map_err(asn1_error)?;
    let [tbs, signature_algorithm, _] = certificate.as_slice() else {
        return Err(CaError::Signing(
            "certificate is not a three-element sequence".to_string(),
        ));
    };

    let tbs_der = tbs.to_der().map_err(asn1_error)?;
    let mut fields = Vec::<AnyRef<'_>>::from_der(&tbs_der).map_err(asn1_error)?;

    // version [0], serialNumber, signature, issuer, ...
    let issuer_index = match fields.first() {
        Some(version) if version.tag().is_context_specific() => 3,
        _ => 2,
    };
    let issuer = fields
        .get_mut(issuer_index)
        .ok_or_else(|| CaError::Signing("TBS certificate has no issuer".to_string()))?;
    *issuer = AnyRef::from_der(issuer_name).map_err(asn1_error)?;

    let spliced_tbs = fields.to_der().map_err(asn1_error)?;
    let signature = signing_key
        .sign(&spliced_tbs)
        .map_err(|e| CaError::Signing(e.to_string()))?;
    let signature_bits = BitStringRef::from_bytes(&signature)
        .and_then(|bits| bits.to_der())
        .map_err(asn1_error)?;

    vec![
        AnyRef::from_der(&spliced_tbs).map_err(asn1_error)?,
        *signature_algorithm,
        AnyRef::from_der(&signature_bits).map_err(asn1_error)?,
    ]
    .to_der()
    .map_err(asn1_error)
}

fn asn1_error(err: der::Error) -> CaError {
    CaError::Signing(err.to_string())
}
