use crate::engine::{CryptoEngine, RcgenEngine};
use crate::error::{Error, Result};
use crate::lifecycle::{Certificates, Keys, Requests};
use crate::store::ArtifactStore;
use crate::types::{validity_window, Digest, InitOptions, Subject, ROOT_KEY_LENGTH};
use std::path::PathBuf;

/// A CA directory together with the engine used to fill it.
#[derive(Debug, Clone)]
pub struct Authority<E = RcgenEngine> {
    store: ArtifactStore,
    engine: E,
}

/// What is present of the root CA.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaStatus {
    Uninitialized,
    Initialized,
    /// Some but not all of the template, root key and root certificate
    /// exist, e.g. after root certificate generation failed.
    Incomplete {
        subject: bool,
        root_key: bool,
        root_certificate: bool,
    },
}

impl Authority<RcgenEngine> {
    pub fn open(dir: impl Into<PathBuf>) -> Self {
        Self::new(ArtifactStore::new(dir), RcgenEngine::new())
    }
}

impl<E: CryptoEngine> Authority<E> {
    pub fn new(store: ArtifactStore, engine: E) -> Self {
        Self { store, engine }
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn keys(&self) -> Keys<'_, E> {
        Keys::new(self)
    }

    pub fn requests(&self) -> Requests<'_, E> {
        Requests::new(self)
    }

    pub fn certificates(&self) -> Certificates<'_, E> {
        Certificates::new(self)
    }

    /// Creates the directory tree, the subject template and the root key and
    /// certificate.
    ///
    /// An existing root key is only replaced with `force`. The check runs
    /// before anything is written, so a refused init leaves the previous
    /// template and root untouched.
    pub fn init(&self, subject: &Subject, options: InitOptions) -> Result<()> {
        subject.validate()?;
        validity_window(options.days)?;
        self.store.ensure_directories()?;

        let root_key = self.store.root_key_path();
        let root_cert = self.store.root_certificate_path();

        if root_key.exists() && !options.force {
            return Err(Error::AlreadyExists("Root key".to_string()));
        }

        subject.save(&self.store.subject_path())?;

        self.engine.generate_rsa_key(&root_key, ROOT_KEY_LENGTH)?;
        self.engine.generate_self_signed_cert(
            &root_key,
            &root_cert,
            Digest::Sha512,
            options.days,
            &subject.root_name(),
        )?;

        tracing::info!(
            dir = %self.store.base().display(),
            subject = %subject.root_name(),
            days = options.days,
            "Root CA created"
        );
        Ok(())
    }

    pub fn status(&self) -> CaStatus {
        let subject = self.store.subject_path().exists();
        let root_key = self.store.root_key_path().exists();
        let root_certificate = self.store.root_certificate_path().exists();

        match (subject, root_key, root_certificate) {
            (false, false, false) => CaStatus::Uninitialized,
            (true, true, true) => CaStatus::Initialized,
            _ => CaStatus::Incomplete {
                subject,
                root_key,
                root_certificate,
            },
        }
    }

    /// Loads the subject template; fails with `NotInitialized` when `init`
    /// has never run.
    pub fn subject(&self) -> Result<Subject> {
        Subject::load(&self.store.subject_path())
    }

    /// Presence check on the subject template. Does not parse it.
    pub(crate) fn require_initialized(&self) -> Result<()> {
        if !self.store.subject_path().exists() {
            return Err(Error::NotInitialized);
        }
        Ok(())
    }

    pub(crate) fn require_root(&self) -> Result<()> {
        if !self.store.root_key_path().exists() {
            return Err(Error::RootIncomplete("root key"));
        }
        if !self.store.root_certificate_path().exists() {
            return Err(Error::RootIncomplete("root certificate"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Call, RecordingEngine};
    use std::fs;
    use tempfile::TempDir;

    fn authority() -> (TempDir, Authority<RecordingEngine>) {
        let dir = TempDir::new().unwrap();
        let authority = Authority::new(
            ArtifactStore::new(dir.path().join("ca")),
            RecordingEngine::new(),
        );
        (dir, authority)
    }

    fn subject() -> Subject {
        Subject::new("US", "California", "San Francisco", "Example CA")
    }

    #[test]
    fn test_init_creates_everything() {
        let (_dir, ca) = authority();
        assert_eq!(ca.status(), CaStatus::Uninitialized);

        ca.init(&subject(), InitOptions::default()).unwrap();

        assert_eq!(ca.status(), CaStatus::Initialized);
        assert_eq!(ca.subject().unwrap(), subject());
        assert_eq!(
            ca.engine().calls(),
            vec![
                Call::Key {
                    path: ca.store().root_key_path(),
                    bits: ROOT_KEY_LENGTH,
                },
                Call::SelfSigned {
                    path: ca.store().root_certificate_path(),
                    days: 36500,
                    subject: "/C=US/ST=California/L=San Francisco/O=Example CA".to_string(),
                },
            ]
        );
    }

    #[test]
    fn test_second_init_without_force_is_refused() {
        let (_dir, ca) = authority();
        ca.init(&subject(), InitOptions::default()).unwrap();

        let key_before = fs::read(ca.store().root_key_path()).unwrap();
        let crt_before = fs::read(ca.store().root_certificate_path()).unwrap();

        let other = Subject::new("DE", "Berlin", "Berlin", "Other");
        let err = ca.init(&other, InitOptions::default()).unwrap_err();
        assert!(matches!(err, Error::AlreadyExists(_)));

        assert_eq!(fs::read(ca.store().root_key_path()).unwrap(), key_before);
        assert_eq!(
            fs::read(ca.store().root_certificate_path()).unwrap(),
            crt_before
        );
        // The refused init must not have replaced the template either.
        assert_eq!(ca.subject().unwrap(), subject());
        assert_eq!(ca.engine().calls().len(), 2);
    }

    #[test]
    fn test_forced_init_replaces_root() {
        let (_dir, ca) = authority();
        ca.init(&subject(), InitOptions::default()).unwrap();
        let key_before = fs::read(ca.store().root_key_path()).unwrap();

        let other = Subject::new("DE", "Berlin", "Berlin", "Other");
        ca.init(&other, InitOptions::default().with_force(true).with_days(10))
            .unwrap();

        assert_ne!(fs::read(ca.store().root_key_path()).unwrap(), key_before);
        assert_eq!(ca.subject().unwrap(), other);
        assert!(matches!(
            ca.engine().calls().last(),
            Some(Call::SelfSigned { days: 10, .. })
        ));
    }

    #[test]
    fn test_init_rejects_missing_field() {
        let (_dir, ca) = authority();
        let mut incomplete = subject();
        incomplete.organization = String::new();

        let err = ca.init(&incomplete, InitOptions::default()).unwrap_err();
        assert!(matches!(err, Error::MissingArgument("organization")));
        assert!(!ca.store().base().exists());
    }

    #[test]
    fn test_init_rejects_unrepresentable_validity() {
        let (_dir, ca) = authority();

        let err = ca
            .init(&subject(), InitOptions::default().with_days(4_000_000))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
        assert!(!ca.store().base().exists());
        assert!(ca.engine().calls().is_empty());
    }

    #[test]
    fn test_forced_init_with_bad_validity_keeps_root() {
        let (_dir, ca) = authority();
        ca.init(&subject(), InitOptions::default()).unwrap();
        let key_before = fs::read(ca.store().root_key_path()).unwrap();

        let other = Subject::new("DE", "Berlin", "Berlin", "Other");
        let err = ca
            .init(
                &other,
                InitOptions::default().with_force(true).with_days(u32::MAX),
            )
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
        assert_eq!(fs::read(ca.store().root_key_path()).unwrap(), key_before);
        assert_eq!(ca.subject().unwrap(), subject());
        assert_eq!(ca.engine().calls().len(), 2);
    }

    #[test]
    fn test_failed_root_certificate_is_reported_as_incomplete() {
        let (_dir, ca) = authority();
        ca.engine().fail_on("self_signed");

        let err = ca.init(&subject(), InitOptions::default()).unwrap_err();
        assert!(matches!(err, Error::CryptoEngine(_)));
        assert_eq!(
            ca.status(),
            CaStatus::Incomplete {
                subject: true,
                root_key: true,
                root_certificate: false,
            }
        );
        assert!(matches!(
            ca.require_root(),
            Err(Error::RootIncomplete("root certificate"))
        ));
    }
}
