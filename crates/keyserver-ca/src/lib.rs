//! # keyserver-ca
//!
//! Private RSA certificate authority for the keyserver.
//!
//! ## Responsibilities
//!
//! ```text
//! key + cert PEM ──► TlsAuthority ──┬── verify:  mTLS client cert ──► principal (CN)
//!                                   ├── sign:    CSR ──► short-lived leaf cert
//!                                   └── expose:  trust store, server identity
//! ```
//!
//! ## Security Model
//!
//! - The CA key must be RSA and must match the CA certificate
//! - Client certificates are re-verified against this authority alone
//! - Issued certificates are never CAs and carry random 159-bit serials
//! - Host certificates add server-auth; everything else is client-auth only
//!
//! ## Example
//!
//! ```rust,ignore
//! use keyserver_ca::{AuthorityConfig, ConnectionInfo, Verifier};
//! use std::time::Duration;
//!
//! let config = AuthorityConfig::load("authority.toml".as_ref())?;
//! let authority = config.load_authority()?;
//!
//! // Issue a one-day client certificate
//! let pem = authority.sign(&csr_pem, false, Duration::from_secs(86_400), "worker-1", &["worker-1.internal"])?;
//!
//! // Identify a caller from the handshake
//! let conn = ConnectionInfo::from_peer_certificates(tls.peer_certificates());
//! if authority.has_attempt(&conn) {
//!     let principal = authority.verify(&conn)?;
//! }
//! ```

mod authority;
mod config;
mod error;
mod issuance;
mod issuer_name;
mod loader;
mod pem_block;
mod tls;
mod verify;

#[cfg(test)]
mod testing;

pub use authority::TlsAuthority;
pub use config::AuthorityConfig;
pub use error::{CaError, ErrorCategory, Result};
pub use issuance::{partition_names, IssuedCertificate, SERIAL_NUMBER_BITS};
pub use pem_block::{
    load_single_pem_block, CERTIFICATE_REQUEST_TAG, CERTIFICATE_TAG, PRIVATE_KEY_TAG,
    RSA_PRIVATE_KEY_TAG,
};
pub use tls::{server_config, ALPN_PROTOCOLS};
pub use verify::{ConnectionInfo, Verifier};
