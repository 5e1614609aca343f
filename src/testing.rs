//! Recording stand-in for [`CryptoEngine`] used by the unit tests.
//!
//! Every call is logged and writes a small placeholder file, so existence
//! checks behave as with the real engine. Each file gets unique contents.

use crate::engine::{CryptoEngine, SigningRequest};
use crate::error::{Error, Result};
use crate::types::{Digest, DistinguishedName};
use std::cell::{Cell, RefCell};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Key { path: PathBuf, bits: u32 },
    SelfSigned { path: PathBuf, days: u32, subject: String },
    Csr { path: PathBuf, subject: String },
    Sign { path: PathBuf, days: u32, san: String },
}

#[derive(Debug, Default)]
pub struct RecordingEngine {
    calls: RefCell<Vec<Call>>,
    fail_on: Cell<Option<&'static str>>,
    counter: Cell<u64>,
}

impl RecordingEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.borrow().clone()
    }

    pub fn clear(&self) {
        self.calls.borrow_mut().clear();
    }

    /// Makes the named operation (`key`, `self_signed`, `csr`, `sign`) fail
    /// without writing anything.
    pub fn fail_on(&self, operation: &'static str) {
        self.fail_on.set(Some(operation));
    }

    fn run(&self, operation: &'static str, out: &Path, call: Call) -> Result<()> {
        if self.fail_on.get() == Some(operation) {
            return Err(Error::CryptoEngine(format!("injected failure: {}", operation)));
        }
        let n = self.counter.get() + 1;
        self.counter.set(n);
        fs::write(out, format!("{} #{}\n", operation, n))?;
        self.calls.borrow_mut().push(call);
        Ok(())
    }
}

impl CryptoEngine for RecordingEngine {
    fn generate_rsa_key(&self, out: &Path, bits: u32) -> Result<()> {
        self.run(
            "key",
            out,
            Call::Key {
                path: out.to_path_buf(),
                bits,
            },
        )
    }

    fn generate_self_signed_cert(
        &self,
        key: &Path,
        out: &Path,
        _digest: Digest,
        days: u32,
        subject: &DistinguishedName,
    ) -> Result<()> {
        assert!(key.exists(), "self-signing without a key");
        self.run(
            "self_signed",
            out,
            Call::SelfSigned {
                path: out.to_path_buf(),
                days,
                subject: subject.to_string(),
            },
        )
    }

    fn generate_csr(
        &self,
        key: &Path,
        out: &Path,
        _digest: Digest,
        subject: &DistinguishedName,
    ) -> Result<()> {
        assert!(key.exists(), "request without a key");
        self.run(
            "csr",
            out,
            Call::Csr {
                path: out.to_path_buf(),
                subject: subject.to_string(),
            },
        )
    }

    fn sign_certificate(&self, request: &SigningRequest<'_>) -> Result<()> {
        assert!(request.csr.exists(), "signing without a request");
        assert!(request.ca_key.exists() && request.ca_certificate.exists());
        self.run(
            "sign",
            request.out,
            Call::Sign {
                path: request.out.to_path_buf(),
                days: request.days,
                san: request.subject_alt_name.to_string(),
            },
        )
    }
}
