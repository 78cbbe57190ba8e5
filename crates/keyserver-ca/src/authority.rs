//! The TLS certificate authority.
//!
//! Built once at startup from the CA key and certificate, then read-only.
//! Issuance lives in `issuance.rs` and client verification in `verify.rs`;
//! this module owns construction and the material handed to the transport.

use rcgen::{
    CertificateParams, DistinguishedName, Issuer, KeyIdMethod, KeyPair, KeyUsagePurpose,
};
use rsa::pkcs8::{EncodePrivateKey, LineEnding};
use rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};
use rustls::server::danger::ClientCertVerifier;
use rustls::server::WebPkiClientVerifier;
use rustls::RootCertStore;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

use crate::error::{CaError, Result};
use crate::loader::{self, CaCertificate};
use crate::pem_block::{
    load_single_pem_block, CERTIFICATE_TAG, PRIVATE_KEY_TAG, RSA_PRIVATE_KEY_TAG,
};

/// An RSA certificate authority for internal service identities.
///
/// Two authorities are equal when their CA certificates are byte-identical,
/// which is how a reloaded authority is told apart from the one in use.
pub struct TlsAuthority {
    /// CA signing key plus issuer name, used by `sign`
    pub(crate) issuer: Issuer<'static, KeyPair>,
    /// CA private key (PKCS#8), only handed out as the server identity
    key: PrivatePkcs8KeyDer<'static>,
    /// Parsed CA certificate
    pub(crate) certificate: CaCertificate,
    /// CA certificate as originally supplied
    certificate_pem: Vec<u8>,
    /// Trust store holding only the CA certificate
    roots: Arc<RootCertStore>,
    /// Client-auth verifier over `roots`
    pub(crate) client_verifier: Arc<dyn ClientCertVerifier>,
}

impl TlsAuthority {
    /// Load an authority from a PEM private key and PEM certificate.
    ///
    /// The key may be PKCS#1 (`RSA PRIVATE KEY`) or PKCS#8 (`PRIVATE KEY`)
    /// but must be RSA, and it must match the certificate's public key.
    pub fn load(key_pem: &[u8], certificate_pem: &[u8]) -> Result<Self> {
        let cert_der = load_single_pem_block(certificate_pem, &[CERTIFICATE_TAG])?;
        let key_der = load_single_pem_block(key_pem, &[RSA_PRIVATE_KEY_TAG, PRIVATE_KEY_TAG])?;

        let private_key = loader::parse_rsa_private_key(&key_der)?;
        let certificate = loader::parse_ca_certificate(cert_der)?;
        loader::ensure_key_matches(&private_key, &certificate)?;

        let pkcs8_der = private_key
            .to_pkcs8_der()
            .map_err(|e| CaError::KeyParse(e.to_string()))?;
        let pkcs8_pem = private_key
            .to_pkcs8_pem(LineEnding::LF)
            .map_err(|e| CaError::KeyParse(e.to_string()))?;

        let issuer = ca_issuer(&certificate, &pkcs8_pem)?;

        let mut roots = RootCertStore::empty();
        roots.add(CertificateDer::from(certificate.der.clone()))?;
        let roots = Arc::new(roots);

        let client_verifier =
            WebPkiClientVerifier::builder_with_provider(Arc::clone(&roots), crypto_provider())
                .build()
                .map_err(|e| CaError::Tls(e.to_string()))?;

        info!(
            subject = %certificate.subject,
            serial = %certificate.serial,
            "loaded TLS authority"
        );

        Ok(Self {
            issuer,
            key: PrivatePkcs8KeyDer::from(pkcs8_der.as_bytes().to_vec()),
            certificate,
            certificate_pem: certificate_pem.to_vec(),
            roots,
            client_verifier,
        })
    }

    /// Trust store containing only this authority's certificate.
    ///
    /// Used by the transport to validate inbound client certificates.
    pub fn trust_store(&self) -> Arc<RootCertStore> {
        Arc::clone(&self.roots)
    }

    /// Certificate chain and private key for presenting this authority as a
    /// TLS server.
    pub fn server_identity(&self) -> (Vec<CertificateDer<'static>>, PrivateKeyDer<'static>) {
        (
            vec![CertificateDer::from(self.certificate.der.clone())],
            PrivateKeyDer::Pkcs8(self.key.clone_key()),
        )
    }

    /// The CA certificate exactly as it was loaded, for publication.
    pub fn certificate_pem(&self) -> &[u8] {
        &self.certificate_pem
    }

    /// DER encoding of the CA certificate.
    pub fn certificate_der(&self) -> CertificateDer<'_> {
        CertificateDer::from(self.certificate.der.as_slice())
    }

    /// Subject name of the CA certificate.
    pub fn subject(&self) -> &str {
        &self.certificate.subject
    }
}

impl PartialEq for TlsAuthority {
    fn eq(&self, other: &Self) -> bool {
        self.certificate.der == other.certificate.der
    }
}

impl Eq for TlsAuthority {}

impl fmt::Debug for TlsAuthority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TlsAuthority")
            .field("subject", &self.certificate.subject)
            .field("serial", &self.certificate.serial)
            .finish_non_exhaustive()
    }
}

/// Build the rcgen issuer for the CA.
///
/// rcgen cannot represent every subject (multi-valued RDNs, for one). Those
/// CAs get a placeholder name here; issuance copies the real subject bytes
/// into each certificate afterwards.
fn ca_issuer(certificate: &CaCertificate, pkcs8_pem: &str) -> Result<Issuer<'static, KeyPair>> {
    let signing_key = || {
        KeyPair::from_pem_and_sign_algo(pkcs8_pem, &rcgen::PKCS_RSA_SHA256)
            .map_err(|e| CaError::KeyParse(e.to_string()))
    };

    match Issuer::from_ca_cert_der(
        &CertificateDer::from(certificate.der.as_slice()),
        signing_key()?,
    ) {
        Ok(issuer) => Ok(issuer),
        Err(e) => {
            debug!(
                subject = %certificate.subject,
                error = %e,
                "CA subject not representable by rcgen, copying raw name on issue"
            );
            let mut params = CertificateParams::default();
            params.distinguished_name = DistinguishedName::new();
            params.key_usages = vec![KeyUsagePurpose::KeyCertSign, KeyUsagePurpose::CrlSign];
            if let Some(id) = &certificate.key_identifier {
                params.key_identifier_method = KeyIdMethod::PreSpecified(id.clone());
            }
            Ok(Issuer::new(params, signing_key()?))
        }
    }
}

/// The crypto provider used for every rustls object built here.
pub(crate) fn crypto_provider() -> Arc<rustls::crypto::CryptoProvider> {
    Arc::new(rustls::crypto::ring::default_provider())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{
        CA_CERT, CA_KEY, CA_KEY_PKCS8, EC_CA_CERT, EC_KEY, MULTI_RDN_CA_CERT, MULTI_RDN_CA_KEY,
        OTHER_CA_CERT, OTHER_CA_KEY,
    };

    #[test]
    fn test_load_pkcs1() {
        let authority = TlsAuthority::load(CA_KEY, CA_CERT).unwrap();
        assert_eq!(authority.subject(), "CN=Keyserver Test CA");
    }

    #[test]
    fn test_load_pkcs8() {
        let pkcs1 = TlsAuthority::load(CA_KEY, CA_CERT).unwrap();
        let pkcs8 = TlsAuthority::load(CA_KEY_PKCS8, CA_CERT).unwrap();
        assert_eq!(pkcs1, pkcs8);
    }

    #[test]
    fn test_load_multi_valued_subject() {
        let authority = TlsAuthority::load(MULTI_RDN_CA_KEY, MULTI_RDN_CA_CERT).unwrap();
        assert!(authority.subject().contains("Multi CA"));
        assert_eq!(authority.trust_store().len(), 1);
        assert!(matches!(
            TlsAuthority::load(MULTI_RDN_CA_KEY, CA_CERT),
            Err(CaError::KeyMismatch)
        ));
    }

    #[test]
    fn test_rejects_mismatched_pair() {
        assert!(matches!(
            TlsAuthority::load(CA_KEY, OTHER_CA_CERT),
            Err(CaError::KeyMismatch)
        ));
        assert!(matches!(
            TlsAuthority::load(OTHER_CA_KEY, CA_CERT),
            Err(CaError::KeyMismatch)
        ));
    }

    #[test]
    fn test_rejects_swapped_arguments() {
        assert!(matches!(
            TlsAuthority::load(CA_CERT, CA_KEY),
            Err(CaError::UnexpectedPemType { .. })
        ));
    }

    #[test]
    fn test_rejects_trailing_key_data() {
        let mut key = CA_KEY.to_vec();
        key.extend_from_slice(CA_KEY);
        assert!(matches!(
            TlsAuthority::load(&key, CA_CERT),
            Err(CaError::TrailingData)
        ));
    }

    #[test]
    fn test_rejects_non_rsa_material() {
        assert!(matches!(
            TlsAuthority::load(EC_KEY, CA_CERT),
            Err(CaError::NonRsaPrivateKey)
        ));
        assert!(matches!(
            TlsAuthority::load(CA_KEY, EC_CA_CERT),
            Err(CaError::NonRsaCertificateKey)
        ));
    }

    #[test]
    fn test_equality_follows_certificate() {
        let a = TlsAuthority::load(CA_KEY, CA_CERT).unwrap();
        let b = TlsAuthority::load(CA_KEY, CA_CERT).unwrap();
        let other = TlsAuthority::load(OTHER_CA_KEY, OTHER_CA_CERT).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, other);
    }

    #[test]
    fn test_exposed_material() {
        let authority = TlsAuthority::load(CA_KEY, CA_CERT).unwrap();

        assert_eq!(authority.certificate_pem(), CA_CERT);
        assert_eq!(authority.trust_store().len(), 1);

        let (chain, key) = authority.server_identity();
        assert_eq!(chain.len(), 1);
        assert_eq!(chain[0].as_ref(), authority.certificate_der().as_ref());
        assert!(matches!(key, PrivateKeyDer::Pkcs8(_)));
    }

    #[test]
    fn test_debug_hides_key() {
        let authority = TlsAuthority::load(CA_KEY, CA_CERT).unwrap();
        let debug = format!("{authority:?}");
        assert!(debug.contains("Keyserver Test CA"));
        assert!(!debug.contains("key:"));
        assert!(!debug.contains("issuer:"));
    }

    #[test]
    fn test_authority_is_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<TlsAuthority>();
    }
}
