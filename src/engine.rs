//! Cryptographic operations behind a narrow trait.
//!
//! The lifecycle code only ever asks for four things: an RSA key, a
//! self-signed root certificate, a CSR and a signed leaf certificate. All of
//! them read and write PEM files at the paths they are given.

use crate::error::{Error, Result};
use crate::types::{validity_window, Digest, DistinguishedName};
use rcgen::{
    BasicConstraints, CertificateParams, CertificateSigningRequestParams, Ia5String, IsCa,
    KeyPair, KeyUsagePurpose, SanType, SerialNumber,
};
use rsa::pkcs8::{EncodePrivateKey, LineEnding};
use rsa::RsaPrivateKey;
use std::fs;
use std::path::Path;

/// Inputs for signing a CSR with the root CA.
#[derive(Debug, Clone)]
pub struct SigningRequest<'a> {
    pub csr: &'a Path,
    pub ca_certificate: &'a Path,
    pub ca_key: &'a Path,
    pub out: &'a Path,
    pub days: u32,
    pub digest: Digest,
    pub serial: &'a [u8],
    pub subject_alt_name: &'a str,
}

pub trait CryptoEngine {
    fn generate_rsa_key(&self, out: &Path, bits: u32) -> Result<()>;

    fn generate_self_signed_cert(
        &self,
        key: &Path,
        out: &Path,
        digest: Digest,
        days: u32,
        subject: &DistinguishedName,
    ) -> Result<()>;

    fn generate_csr(
        &self,
        key: &Path,
        out: &Path,
        digest: Digest,
        subject: &DistinguishedName,
    ) -> Result<()>;

    fn sign_certificate(&self, request: &SigningRequest<'_>) -> Result<()>;
}

/// Pure Rust engine: `rsa` for key generation, `rcgen` for everything
/// that gets signed.
#[derive(Debug, Clone, Copy, Default)]
pub struct RcgenEngine;

impl RcgenEngine {
    pub fn new() -> Self {
        Self
    }

    fn load_key(path: &Path, digest: Digest) -> Result<KeyPair> {
        let pem = fs::read_to_string(path)?;
        KeyPair::from_pem_and_sign_algo(&pem, digest.to_rcgen())
            .map_err(|e| Error::CryptoEngine(format!("{}: {}", path.display(), e)))
    }
}

fn random_serial() -> SerialNumber {
    let mut bytes: [u8; 16] = rand::random();
    bytes[0] = (bytes[0] & 0x7f) | 0x01;
    SerialNumber::from_slice(&bytes)
}

fn write_private(path: &Path, contents: &str) -> Result<()> {
    fs::write(path, contents)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;
    }

    Ok(())
}

impl CryptoEngine for RcgenEngine {
    fn generate_rsa_key(&self, out: &Path, bits: u32) -> Result<()> {
        tracing::debug!(path = %out.display(), bits, "Generating RSA key");
        let key = RsaPrivateKey::new(&mut rand::thread_rng(), bits as usize)?;
        let pem = key.to_pkcs8_pem(LineEnding::LF)?;
        write_private(out, &pem)
    }

    fn generate_self_signed_cert(
        &self,
        key: &Path,
        out: &Path,
        digest: Digest,
        days: u32,
        subject: &DistinguishedName,
    ) -> Result<()> {
        tracing::debug!(key = %key.display(), path = %out.display(), subject = %subject, days, "Self-signing root certificate");
        let (not_before, not_after) = validity_window(days)?;
        let key_pair = Self::load_key(key, digest)?;

        let mut params = CertificateParams::default();
        params.distinguished_name = subject.to_rcgen();
        params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
        params.key_usages = vec![
            KeyUsagePurpose::DigitalSignature,
            KeyUsagePurpose::KeyCertSign,
            KeyUsagePurpose::CrlSign,
        ];
        (params.not_before, params.not_after) = (not_before, not_after);
        params.serial_number = Some(random_serial());

        let certificate = params.self_signed(&key_pair)?;
        fs::write(out, certificate.pem())?;
        Ok(())
    }

    fn generate_csr(
        &self,
        key: &Path,
        out: &Path,
        digest: Digest,
        subject: &DistinguishedName,
    ) -> Result<()> {
        tracing::debug!(key = %key.display(), path = %out.display(), subject = %subject, "Generating certificate request");
        let key_pair = Self::load_key(key, digest)?;

        let mut params = CertificateParams::default();
        params.distinguished_name = subject.to_rcgen();

        let csr = params.serialize_request(&key_pair)?;
        fs::write(out, csr.pem()?)?;
        Ok(())
    }

    fn sign_certificate(&self, request: &SigningRequest<'_>) -> Result<()> {
        tracing::debug!(
            csr = %request.csr.display(),
            path = %request.out.display(),
            serial = %hex::encode_upper(request.serial),
            days = request.days,
            digest = request.digest.name(),
            "Signing certificate"
        );

        let (not_before, not_after) = validity_window(request.days)?;
        let ca_key = Self::load_key(request.ca_key, request.digest)?;
        let ca_pem = fs::read_to_string(request.ca_certificate)?;
        let issuer = CertificateParams::from_ca_cert_pem(&ca_pem)?.self_signed(&ca_key)?;

        let csr_pem = fs::read_to_string(request.csr)?;
        let mut csr = CertificateSigningRequestParams::from_pem(&csr_pem)
            .map_err(|e| Error::CryptoEngine(format!("{}: {}", request.csr.display(), e)))?;

        let san = Ia5String::try_from(request.subject_alt_name.to_string())?;
        csr.params.subject_alt_names = vec![SanType::DnsName(san)];
        csr.params.is_ca = IsCa::NoCa;
        (csr.params.not_before, csr.params.not_after) = (not_before, not_after);
        csr.params.serial_number = Some(SerialNumber::from_slice(request.serial));

        let certificate = csr.signed_by(&issuer, &ca_key)?;
        fs::write(request.out, certificate.pem())?;
        Ok(())
    }
}
