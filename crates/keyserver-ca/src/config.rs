//! Where the authority's key material lives on disk.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::authority::TlsAuthority;
use crate::error::{CaError, Result};

/// Locations of the CA private key and certificate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorityConfig {
    /// PEM private key, PKCS#1 or PKCS#8.
    pub key_path: PathBuf,

    /// PEM CA certificate.
    pub certificate_path: PathBuf,
}

impl AuthorityConfig {
    /// Load config from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| CaError::Config(e.to_string()))
    }

    /// Read both files and build the authority.
    pub fn load_authority(&self) -> Result<TlsAuthority> {
        let key = std::fs::read(&self.key_path)?;
        let certificate = std::fs::read(&self.certificate_path)?;
        TlsAuthority::load(&key, &certificate)
    }
}
