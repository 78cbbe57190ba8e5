//! rustls server configuration backed by a [`TlsAuthority`].

use rustls::server::WebPkiClientVerifier;
use rustls::ServerConfig;
use tracing::debug;

use crate::authority::{crypto_provider, TlsAuthority};
use crate::error::{CaError, Result};

/// ALPN protocols offered, in preference order.
pub const ALPN_PROTOCOLS: &[&[u8]] = &[b"http/1.1", b"h2"];

/// Build a server config that presents the authority's certificate.
///
/// Client certificates are requested and checked against the authority, but
/// may be omitted; whether an anonymous request is acceptable is decided per
/// request through [`crate::Verifier::has_attempt`].
pub fn server_config(authority: &TlsAuthority) -> Result<ServerConfig> {
    let client_verifier =
        WebPkiClientVerifier::builder_with_provider(authority.trust_store(), crypto_provider())
            .allow_unauthenticated()
            .build()
            .map_err(|e| CaError::Tls(e.to_string()))?;

    let (chain, key) = authority.server_identity();
    let mut config = ServerConfig::builder_with_provider(crypto_provider())
        .with_safe_default_protocol_versions()?
        .with_client_cert_verifier(client_verifier)
        .with_single_cert(chain, key)?;
    config.alpn_protocols = ALPN_PROTOCOLS.iter().map(|p| p.to_vec()).collect();

    debug!(subject = %authority.subject(), "built TLS server config");
    Ok(config)
}
