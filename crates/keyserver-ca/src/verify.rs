//! Caller identity from mutual-TLS client certificates.
//!
//! The transport has already run the handshake, possibly against a broader
//! trust store than ours. We re-verify the leaf against this authority alone
//! before believing anything it says.

use rustls::pki_types::{CertificateDer, UnixTime};
use tracing::{debug, warn};
use x509_parser::asn1_rs::Tag;
use x509_parser::x509::AttributeTypeAndValue;

use crate::authority::TlsAuthority;
use crate::error::{CaError, Result};

/// What the transport recorded about the peer of one connection.
#[derive(Debug, Clone, Default)]
pub struct ConnectionInfo {
    /// Verified chains, each leaf-first.
    verified_chains: Vec<Vec<CertificateDer<'static>>>,
}

impl ConnectionInfo {
    /// A connection on which no client certificate was presented.
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// A connection with chains the transport considers verified.
    pub fn from_verified_chains(verified_chains: Vec<Vec<CertificateDer<'static>>>) -> Self {
        Self { verified_chains }
    }

    /// Build from rustls' `peer_certificates()` (only set once verified).
    pub fn from_peer_certificates(certificates: Option<&[CertificateDer<'_>]>) -> Self {
        let verified_chains = certificates
            .filter(|chain| !chain.is_empty())
            .map(|chain| vec![chain.iter().map(|c| c.clone().into_owned()).collect()])
            .unwrap_or_default();
        Self { verified_chains }
    }

    /// Chains recorded by the transport.
    pub fn verified_chains(&self) -> &[Vec<CertificateDer<'static>>] {
        &self.verified_chains
    }

    /// Leaf certificate of the first verified chain.
    fn leaf(&self) -> Option<&CertificateDer<'static>> {
        self.verified_chains.first().and_then(|chain| chain.first())
    }
}

/// Derives a principal from an authenticated request.
///
/// Implemented by every authentication mechanism so callers can hold a
/// `dyn Verifier` without caring which one is in use.
pub trait Verifier: Send + Sync {
    /// Whether the connection carries credentials for this mechanism at all.
    fn has_attempt(&self, connection: &ConnectionInfo) -> bool;

    /// Check the credentials and return the principal they name.
    fn verify(&self, connection: &ConnectionInfo) -> Result<String>;
}

impl Verifier for TlsAuthority {
    fn has_attempt(&self, connection: &ConnectionInfo) -> bool {
        connection.leaf().is_some()
    }

    fn verify(&self, connection: &ConnectionInfo) -> Result<String> {
        let leaf = connection.leaf().ok_or(CaError::NoClientCertificate)?;

        self.client_verifier
            .verify_client_cert(leaf, &[], UnixTime::now())
            .map_err(|e| {
                warn!(error = %e, "client certificate not valid under this authority");
                CaError::Untrusted(e.to_string())
            })?;

        let principal = common_name(leaf)?;
        debug!(principal = %principal, "client certificate verified");
        Ok(principal)
    }
}

/// Subject common name of a certificate; the last one wins if repeated.
fn common_name(certificate: &CertificateDer<'_>) -> Result<String> {
    let (_, cert) = x509_parser::parse_x509_certificate(certificate.as_ref())
        .map_err(|e| CaError::Untrusted(e.to_string()))?;

    cert.subject()
        .iter_common_name()
        .last()
        .and_then(decode_directory_string)
        .filter(|cn| !cn.is_empty())
        .ok_or(CaError::MissingCommonName)
}

/// Decode any DirectoryString type; T61 is read as Latin-1.
fn decode_directory_string(attr: &AttributeTypeAndValue<'_>) -> Option<String> {
    let data = attr.as_slice();
    match attr.attr_value().tag() {
        Tag::BmpString => {
            if data.len() % 2 != 0 {
                return None;
            }
            let units: Vec<u16> = data
                .chunks_exact(2)
                .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
                .collect();
            String::from_utf16(&units).ok()
        }
        Tag::UniversalString => {
            if data.len() % 4 != 0 {
                return None;
            }
            data.chunks_exact(4)
                .map(|quad| {
                    char::from_u32(u32::from_be_bytes([quad[0], quad[1], quad[2], quad[3]]))
                })
                .collect()
        }
        Tag::T61String => Some(data.iter().copied().map(char::from).collect()),
        _ => attr.as_str().ok().map(ToString::to_string),
    }
}
