//! Signing CSRs into short-lived identity certificates.
//!
//! Every certificate issued here is a leaf: digital-signature key usage,
//! client-auth always, server-auth only for hosts, and never a CA.

use chrono::{DateTime, TimeZone, Utc};
use rcgen::string::Ia5String;
use rcgen::{
    CertificateParams, DistinguishedName, DnType, ExtendedKeyUsagePurpose, IsCa,
    KeyUsagePurpose, SanType, SerialNumber, SubjectPublicKeyInfo,
};
use ring::rand::{SecureRandom, SystemRandom};
use serde::Serialize;
use std::net::IpAddr;
use std::time::Duration;
use time::OffsetDateTime;
use tracing::{info, warn};
use x509_parser::certification_request::X509CertificationRequest;
use x509_parser::prelude::FromDer;

use crate::authority::TlsAuthority;
use crate::error::{CaError, Result};
use crate::issuer_name::ensure_issuer_name;
use crate::pem_block::{encode_certificate, load_single_pem_block, CERTIFICATE_REQUEST_TAG};

/// Serial numbers are drawn uniformly from `[0, 2^SERIAL_NUMBER_BITS)`.
pub const SERIAL_NUMBER_BITS: usize = 159;

const SERIAL_NUMBER_BYTES: usize = SERIAL_NUMBER_BITS.div_ceil(8);
const SERIAL_TOP_BYTE_MASK: u8 = 0xff >> (SERIAL_NUMBER_BYTES * 8 - SERIAL_NUMBER_BITS);

/// A freshly signed certificate and the facts worth auditing about it.
#[derive(Debug, Clone, Serialize)]
pub struct IssuedCertificate {
    /// PEM `CERTIFICATE` block
    pub pem: String,
    /// Serial number (hex)
    pub serial: String,
    /// Subject common name
    pub common_name: String,
    /// Issued for a host (server-auth) rather than only a client
    pub is_host: bool,
    /// DNS subject alternative names
    pub dns_names: Vec<String>,
    /// IP subject alternative names
    pub ip_addresses: Vec<IpAddr>,
    /// Not valid before
    pub not_before: DateTime<Utc>,
    /// Not valid after
    pub not_after: DateTime<Utc>,
}

impl TlsAuthority {
    /// Sign a PEM CSR and return the certificate as PEM.
    ///
    /// `names` become SANs: IP literals as IP addresses, everything else as
    /// DNS names. The certificate is valid from now for `lifespan`, whole
    /// seconds only.
    ///
    /// Leaves are marked `CA:FALSE` and carry no path-length constraint.
    /// The CSR contributes only its public key, which must be RSA, P-256,
    /// P-384 or Ed25519.
    pub fn sign<S: AsRef<str>>(
        &self,
        csr_pem: &str,
        is_host: bool,
        lifespan: Duration,
        common_name: &str,
        names: &[S],
    ) -> Result<String> {
        self.sign_detailed(csr_pem, is_host, lifespan, common_name, names)
            .map(|issued| issued.pem)
    }

    /// Like [`TlsAuthority::sign`], also returning the certificate's metadata.
    pub fn sign_detailed<S: AsRef<str>>(
        &self,
        csr_pem: &str,
        is_host: bool,
        lifespan: Duration,
        common_name: &str,
        names: &[S],
    ) -> Result<IssuedCertificate> {
        let csr_der = load_single_pem_block(csr_pem.as_bytes(), &[CERTIFICATE_REQUEST_TAG])?;
        let subject_key = parse_signed_request(&csr_der)?;

        let (dns_names, ip_addresses) = partition_names(names);
        let serial = random_serial()?;
        let (not_before, not_after) = validity_window(lifespan)?;

        let mut params = CertificateParams::default();
        let mut dn = DistinguishedName::new();
        dn.push(DnType::CommonName, common_name);
        params.distinguished_name = dn;
        // CA:FALSE with no pathlen; RFC 5280 only allows pathlen on CAs.
        params.is_ca = IsCa::ExplicitNoCa;
        params.key_usages = vec![KeyUsagePurpose::DigitalSignature];
        params.extended_key_usages = extended_key_usages(is_host);
        params.not_before = not_before;
        params.not_after = not_after;
        params.serial_number = Some(SerialNumber::from(serial.to_vec()));
        params.subject_alt_names = subject_alt_names(&dns_names, &ip_addresses)?;
        params.use_authority_key_identifier_extension = true;

        let certificate = params
            .signed_by(&subject_key, &self.issuer)
            .map_err(|e| CaError::Signing(e.to_string()))?;
        let der = ensure_issuer_name(
            certificate.der().to_vec(),
            &self.certificate.subject_raw,
            self.issuer.key(),
        )?;

        let serial = serial_hex(&serial);
        info!(
            serial = %serial,
            common_name = %common_name,
            is_host,
            lifespan_secs = lifespan.as_secs(),
            "issued certificate"
        );

        Ok(IssuedCertificate {
            pem: encode_certificate(&der),
            serial,
            common_name: common_name.to_string(),
            is_host,
            dns_names,
            ip_addresses,
            not_before: to_chrono(not_before)?,
            not_after: to_chrono(not_after)?,
        })
    }
}

/// Split names into DNS names and IP addresses, keeping relative order.
///
/// Anything that parses as an IP literal is an IP address, even if the
/// caller meant it as a name.
pub fn partition_names<S: AsRef<str>>(names: &[S]) -> (Vec<String>, Vec<IpAddr>) {
    let mut dns_names = Vec::new();
    let mut ip_addresses = Vec::new();
    for name in names {
        let name = name.as_ref();
        match name.parse::<IpAddr>() {
            Ok(ip) => ip_addresses.push(ip),
            Err(_) => dns_names.push(name.to_string()),
        }
    }
    (dns_names, ip_addresses)
}

/// Parse a CSR, check that it is signed by the key it carries, and return
/// that key.
///
/// Nothing else in the request is used, so requested extensions and
/// attributes never cause a rejection.
fn parse_signed_request(der: &[u8]) -> Result<SubjectPublicKeyInfo> {
    let (rem, request) =
        X509CertificationRequest::from_der(der).map_err(|e| CaError::CsrParse(e.to_string()))?;
    if !rem.is_empty() {
        return Err(CaError::CsrParse(
            "trailing data after certificate request".to_string(),
        ));
    }

    request.verify_signature().map_err(|e| {
        warn!(error = %e, "rejected certificate request with bad self-signature");
        CaError::CsrSignature(e.to_string())
    })?;

    SubjectPublicKeyInfo::from_der(request.certification_request_info.subject_pki.raw)
        .map_err(|e| CaError::CsrParse(format!("unsupported subject public key: {e}")))
}

fn random_serial() -> Result<[u8; SERIAL_NUMBER_BYTES]> {
    let mut serial = [0u8; SERIAL_NUMBER_BYTES];
    SystemRandom::new()
        .fill(&mut serial)
        .map_err(|_| CaError::Randomness)?;
    serial[0] &= SERIAL_TOP_BYTE_MASK;
    Ok(serial)
}

// Matches the minimal DER integer encoding of the serial.
fn serial_hex(serial: &[u8]) -> String {
    let start = serial.iter().position(|&b| b != 0).unwrap_or(serial.len() - 1);
    hex::encode(&serial[start..])
}

fn validity_window(lifespan: Duration) -> Result<(OffsetDateTime, OffsetDateTime)> {
    let seconds = i64::try_from(lifespan.as_secs())
        .map_err(|_| CaError::Template("lifespan out of range".to_string()))?;
    let now = OffsetDateTime::from_unix_timestamp(OffsetDateTime::now_utc().unix_timestamp())
        .map_err(|e| CaError::Template(e.to_string()))?;
    let not_after = now
        .checked_add(time::Duration::seconds(seconds))
        .ok_or_else(|| CaError::Template("lifespan out of range".to_string()))?;
    Ok((now, not_after))
}

fn extended_key_usages(is_host: bool) -> Vec<ExtendedKeyUsagePurpose> {
    let mut usages = vec![ExtendedKeyUsagePurpose::ClientAuth];
    if is_host {
        usages.push(ExtendedKeyUsagePurpose::ServerAuth);
    }
    usages
}

fn subject_alt_names(dns_names: &[String], ip_addresses: &[IpAddr]) -> Result<Vec<SanType>> {
    let mut sans = Vec::with_capacity(dns_names.len() + ip_addresses.len());
    for name in dns_names {
        let ia5 = Ia5String::try_from(name.clone())
            .map_err(|e| CaError::Template(format!("invalid DNS name '{name}': {e}")))?;
        sans.push(SanType::DnsName(ia5));
    }
    sans.extend(ip_addresses.iter().copied().map(SanType::IpAddress));
    Ok(sans)
}

fn to_chrono(t: OffsetDateTime) -> Result<DateTime<Utc>> {
    Utc.timestamp_opt(t.unix_timestamp(), 0)
        .single()
        .ok_or_else(|| CaError::Template(format!("timestamp out of range: {t}")))
}
