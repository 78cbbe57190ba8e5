//! Error types for the keyserver certificate authority.

use thiserror::Error;

/// Result type alias for authority operations.
pub type Result<T> = std::result::Result<T, CaError>;

/// Broad classes of failure, used by transports to pick a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Bad PEM framing, wrong block type, unparsable DER, bad names.
    MalformedInput,
    /// Input was well-formed but the authority refuses it.
    PolicyViolation,
    /// The caller could not be authenticated.
    TrustFailure,
    /// Randomness or signing machinery failed.
    ResourceFailure,
    /// Configuration files or TLS setup are unusable.
    Configuration,
}

/// Errors raised while loading, verifying or issuing certificates.
#[derive(Error, Debug)]
pub enum CaError {
    /// Input does not start with a PEM header.
    #[error("missing expected PEM header")]
    MissingPemHeader,

    /// PEM framing or base64 body could not be decoded.
    #[error("could not parse PEM data: {0}")]
    PemDecode(String),

    /// PEM block carries a label we were not asked for.
    #[error("found PEM block of type \"{found}\" instead of types {expected:?}")]
    UnexpectedPemType {
        /// Label found in the block
        found: String,
        /// Labels that would have been accepted
        expected: Vec<String>,
    },

    /// Bytes follow the PEM block.
    #[error("trailing data found after PEM data")]
    TrailingData,

    /// Private key is neither PKCS#1 nor PKCS#8.
    #[error("could not load PEM private key as PKCS#1 or PKCS#8: {0}")]
    KeyParse(String),

    /// PKCS#8 container holds something other than an RSA key.
    #[error("non-RSA private key found in PKCS#8 block")]
    NonRsaPrivateKey,

    /// Certificate DER could not be parsed.
    #[error("could not parse certificate: {0}")]
    CertificateParse(String),

    /// Certificate public key is not RSA.
    #[error("expected RSA public key in certificate")]
    NonRsaCertificateKey,

    /// Certificate and private key do not belong together.
    #[error("mismatched RSA public and private keys")]
    KeyMismatch,

    /// CSR DER could not be parsed.
    #[error("could not parse certificate request: {0}")]
    CsrParse(String),

    /// CSR is not signed by the key it carries.
    #[error("certificate request signature check failed: {0}")]
    CsrSignature(String),

    /// Issuance template rejected the requested fields.
    #[error("invalid certificate template: {0}")]
    Template(String),

    /// No verified client certificate on the connection.
    #[error("no client certificate presented")]
    NoClientCertificate,

    /// Client certificate does not chain to this authority.
    #[error("certificate not valid under this authority: {0}")]
    Untrusted(String),

    /// Verified certificate has no subject common name.
    #[error("certificate has no subject common name")]
    MissingCommonName,

    /// System randomness source failed.
    #[error("randomness source failure")]
    Randomness,

    /// Signing the certificate failed.
    #[error("certificate signing failed: {0}")]
    Signing(String),

    /// rustls refused the trust store or server identity.
    #[error("tls setup error: {0}")]
    Tls(String),

    /// Configuration is invalid or missing required fields.
    #[error("config error: {0}")]
    Config(String),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<rustls::Error> for CaError {
    fn from(err: rustls::Error) -> Self {
        Self::Tls(err.to_string())
    }
}

impl CaError {
    /// Classify this error.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::MissingPemHeader
            | Self::PemDecode(_)
            | Self::UnexpectedPemType { .. }
            | Self::TrailingData
            | Self::KeyParse(_)
            | Self::CertificateParse(_)
            | Self::CsrParse(_)
            | Self::Template(_) => ErrorCategory::MalformedInput,
            Self::NonRsaPrivateKey
            | Self::NonRsaCertificateKey
            | Self::KeyMismatch
            | Self::CsrSignature(_) => ErrorCategory::PolicyViolation,
            Self::NoClientCertificate | Self::Untrusted(_) | Self::MissingCommonName => {
                ErrorCategory::TrustFailure
            }
            Self::Randomness | Self::Signing(_) => ErrorCategory::ResourceFailure,
            Self::Tls(_) | Self::Config(_) | Self::Io(_) => ErrorCategory::Configuration,
        }
    }

    /// Returns true if the caller's request was at fault (maps to HTTP 400).
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::MalformedInput
                | ErrorCategory::PolicyViolation
                | ErrorCategory::TrustFailure
        )
    }
}
