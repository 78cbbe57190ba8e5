//! Shared fixtures for unit tests.

use rcgen::{CertificateParams, DistinguishedName, DnType, KeyPair};

use crate::TlsAuthority;

pub const CA_KEY: &[u8] = include_bytes!("../tests/fixtures/ca.key");
pub const CA_KEY_PKCS8: &[u8] = include_bytes!("../tests/fixtures/ca.pkcs8.key");
pub const CA_CERT: &[u8] = include_bytes!("../tests/fixtures/ca.pem");
pub const OTHER_CA_KEY: &[u8] = include_bytes!("../tests/fixtures/other-ca.key");
pub const OTHER_CA_CERT: &[u8] = include_bytes!("../tests/fixtures/other-ca.pem");
pub const EC_KEY: &[u8] = include_bytes!("../tests/fixtures/ec.key");
pub const EC_CA_CERT: &[u8] = include_bytes!("../tests/fixtures/ec-ca.pem");
pub const MULTI_RDN_CA_KEY: &[u8] = include_bytes!("../tests/fixtures/multi-rdn-ca.key");
pub const MULTI_RDN_CA_CERT: &[u8] = include_bytes!("../tests/fixtures/multi-rdn-ca.pem");

/// RSA-2048 CSR from openssl, subject `CN=worker-rsa`, no extensions.
pub const RSA_CSR: &str = include_str!("../tests/fixtures/rsa.csr");
/// RSA-2048 CSR from openssl requesting basicConstraints, SKI, key usage and SANs.
pub const EXTENSIONS_CSR: &str = include_str!("../tests/fixtures/extensions.csr");

pub fn authority() -> TlsAuthority {
    TlsAuthority::load(CA_KEY, CA_CERT).unwrap()
}

pub fn other_authority() -> TlsAuthority {
    TlsAuthority::load(OTHER_CA_KEY, OTHER_CA_CERT).unwrap()
}

/// CA whose subject is a single multi-valued RDN (`CN=Multi CA + O=Homeworld`).
pub fn multi_rdn_authority() -> TlsAuthority {
    TlsAuthority::load(MULTI_RDN_CA_KEY, MULTI_RDN_CA_CERT).unwrap()
}

/// A fresh P-256 CSR with the given subject CN.
pub fn csr_pem(common_name: &str) -> String {
    let key = KeyPair::generate().unwrap();
    let mut params = CertificateParams::new(Vec::<String>::new()).unwrap();
    let mut dn = DistinguishedName::new();
    dn.push(DnType::CommonName, common_name);
    params.distinguished_name = dn;
    params.serialize_request(&key).unwrap().pem().unwrap()
}
