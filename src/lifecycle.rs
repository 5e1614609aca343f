//! Per-domain key → request → certificate lifecycle.
//!
//! The three artifacts of a domain exist independently on disk. Creation
//! enforces the dependency order: a request needs a key and a certificate
//! needs a request, and missing prerequisites are created on the fly with
//! default settings. Deletion only cascades when asked to.

use crate::ca::Authority;
use crate::engine::{CryptoEngine, SigningRequest};
use crate::error::{Error, Result};
use crate::store::{validate_domain, Domains};
use crate::types::{
    validity_window, ArtifactKind, CertificateOptions, DeleteOptions, Digest, KeyOptions,
    RequestOptions, Subject, DEFAULT_KEY_LENGTH,
};
use std::path::PathBuf;

/// Outcome of a create operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Issuance {
    pub domain: String,
    /// Path of the requested artifact.
    pub path: PathBuf,
    /// Every artifact written, prerequisites first.
    pub created: Vec<ArtifactKind>,
}

impl Issuance {
    fn new(domain: &str, path: PathBuf) -> Self {
        Self {
            domain: domain.to_string(),
            path,
            created: Vec::new(),
        }
    }

    /// Prerequisites that did not exist and were generated along the way.
    pub fn implicit(&self) -> &[ArtifactKind] {
        match self.created.split_last() {
            Some((_, rest)) => rest,
            None => &[],
        }
    }
}

impl<E: CryptoEngine> Authority<E> {
    /// Initialization gate shared by every per-domain operation. Only
    /// checks that the template exists; callers that need the subject load
    /// it afterwards.
    fn prepare(&self, domain: &str) -> Result<()> {
        self.require_initialized()?;
        validate_domain(domain)
    }

    fn refuse_overwrite(&self, kind: ArtifactKind, domain: &str, force: bool) -> Result<()> {
        if !force && self.store().exists(kind, domain) {
            return Err(Error::AlreadyExists(format!("{} for {}", kind, domain)));
        }
        Ok(())
    }

    fn write_key(&self, domain: &str, length: u32, issuance: &mut Issuance) -> Result<()> {
        let path = self.store().path(ArtifactKind::Key, domain);
        self.engine().generate_rsa_key(&path, length)?;
        tracing::info!(domain = %domain, bits = length, path = %path.display(), "Key created");
        issuance.created.push(ArtifactKind::Key);
        Ok(())
    }

    fn write_request(
        &self,
        domain: &str,
        subject: &Subject,
        issuance: &mut Issuance,
    ) -> Result<()> {
        let key = self.store().path(ArtifactKind::Key, domain);
        let path = self.store().path(ArtifactKind::Request, domain);
        let name = subject.leaf_name(domain);
        self.engine().generate_csr(&key, &path, Digest::Sha512, &name)?;
        tracing::info!(domain = %domain, subject = %name, path = %path.display(), "Request created");
        issuance.created.push(ArtifactKind::Request);
        Ok(())
    }

    /// Implicit key creation ignores the caller's force and length.
    fn ensure_key(&self, domain: &str, issuance: &mut Issuance) -> Result<()> {
        if self.store().exists(ArtifactKind::Key, domain) {
            return Ok(());
        }
        self.write_key(domain, DEFAULT_KEY_LENGTH, issuance)
    }

    fn ensure_request(
        &self,
        domain: &str,
        subject: &Subject,
        issuance: &mut Issuance,
    ) -> Result<()> {
        if self.store().exists(ArtifactKind::Request, domain) {
            return Ok(());
        }
        self.write_request(domain, subject, issuance)
    }
}

pub struct Keys<'a, E> {
    authority: &'a Authority<E>,
}

impl<'a, E: CryptoEngine> Keys<'a, E> {
    pub(crate) fn new(authority: &'a Authority<E>) -> Self {
        Self { authority }
    }

    pub fn list(&self) -> Result<Domains> {
        self.authority.require_initialized()?;
        self.authority.store().list(ArtifactKind::Key)
    }

    pub fn exists(&self, domain: &str) -> bool {
        self.authority.store().exists(ArtifactKind::Key, domain)
    }

    pub fn create(&self, domain: &str, options: KeyOptions) -> Result<Issuance> {
        self.authority.prepare(domain)?;
        self.authority
            .refuse_overwrite(ArtifactKind::Key, domain, options.force)?;

        let mut issuance = Issuance::new(
            domain,
            self.authority.store().path(ArtifactKind::Key, domain),
        );
        self.authority
            .write_key(domain, options.length, &mut issuance)?;
        Ok(issuance)
    }

    pub fn delete(&self, domain: &str) -> Result<()> {
        self.authority.prepare(domain)?;
        self.authority.store().remove(ArtifactKind::Key, domain)
    }
}

pub struct Requests<'a, E> {
    authority: &'a Authority<E>,
}

impl<'a, E: CryptoEngine> Requests<'a, E> {
    pub(crate) fn new(authority: &'a Authority<E>) -> Self {
        Self { authority }
    }

    pub fn list(&self) -> Result<Domains> {
        self.authority.require_initialized()?;
        self.authority.store().list(ArtifactKind::Request)
    }

    pub fn exists(&self, domain: &str) -> bool {
        self.authority.store().exists(ArtifactKind::Request, domain)
    }

    pub fn create(&self, domain: &str, options: RequestOptions) -> Result<Issuance> {
        self.authority.prepare(domain)?;
        let subject = self.authority.subject()?;
        self.authority
            .refuse_overwrite(ArtifactKind::Request, domain, options.force)?;

        let mut issuance = Issuance::new(
            domain,
            self.authority.store().path(ArtifactKind::Request, domain),
        );
        self.authority.ensure_key(domain, &mut issuance)?;
        self.authority
            .write_request(domain, &subject, &mut issuance)?;
        Ok(issuance)
    }

    pub fn delete(&self, domain: &str) -> Result<()> {
        self.authority.prepare(domain)?;
        self.authority.store().remove(ArtifactKind::Request, domain)
    }
}

pub struct Certificates<'a, E> {
    authority: &'a Authority<E>,
}

impl<'a, E: CryptoEngine> Certificates<'a, E> {
    pub(crate) fn new(authority: &'a Authority<E>) -> Self {
        Self { authority }
    }

    pub fn list(&self) -> Result<Domains> {
        self.authority.require_initialized()?;
        self.authority.store().list(ArtifactKind::Certificate)
    }

    pub fn exists(&self, domain: &str) -> bool {
        self.authority
            .store()
            .exists(ArtifactKind::Certificate, domain)
    }

    /// Issues a certificate signed by the root CA, creating the key and
    /// request first when they are missing.
    pub fn create(&self, domain: &str, options: CertificateOptions) -> Result<Issuance> {
        self.authority.prepare(domain)?;
        let subject = self.authority.subject()?;
        self.authority
            .refuse_overwrite(ArtifactKind::Certificate, domain, options.force)?;
        validity_window(options.days)?;
        self.authority.require_root()?;

        let store = self.authority.store();
        let mut issuance = Issuance::new(domain, store.path(ArtifactKind::Certificate, domain));
        self.authority.ensure_key(domain, &mut issuance)?;
        self.authority
            .ensure_request(domain, &subject, &mut issuance)?;

        let serial = store.next_serial()?;
        let csr = store.path(ArtifactKind::Request, domain);
        let ca_certificate = store.root_certificate_path();
        let ca_key = store.root_key_path();
        self.authority.engine().sign_certificate(&SigningRequest {
            csr: &csr,
            ca_certificate: &ca_certificate,
            ca_key: &ca_key,
            out: &issuance.path,
            days: options.days,
            digest: Digest::Sha512,
            serial: &serial,
            subject_alt_name: domain,
        })?;
        store.record_serial(&serial)?;

        tracing::info!(
            domain = %domain,
            serial = %hex::encode_upper(&serial),
            days = options.days,
            path = %issuance.path.display(),
            "Certificate issued"
        );
        issuance.created.push(ArtifactKind::Certificate);
        Ok(issuance)
    }

    /// Removes the certificate and, depending on `options`, the key and
    /// request it was issued from.
    ///
    /// Only a missing certificate is reported. Failures while removing the
    /// key or request are logged and skipped. Returns what was removed.
    pub fn delete(&self, domain: &str, options: DeleteOptions) -> Result<Vec<ArtifactKind>> {
        self.authority.prepare(domain)?;
        let store = self.authority.store();

        store.remove(ArtifactKind::Certificate, domain)?;
        let mut removed = vec![ArtifactKind::Certificate];

        let cascade = [
            (options.removes_key(), ArtifactKind::Key),
            (options.removes_request(), ArtifactKind::Request),
        ];
        for (wanted, kind) in cascade {
            if !wanted {
                continue;
            }
            match store.remove(kind, domain) {
                Ok(()) => removed.push(kind),
                Err(e) => {
                    tracing::warn!(domain = %domain, kind = %kind, error = %e, "Skipping removal");
                }
            }
        }

        Ok(removed)
    }

    pub fn revoke(&self, domain: &str) -> Result<()> {
        self.authority.prepare(domain)?;
        Err(Error::NotSupported("certificate revocation"))
    }
}
