//! On-disk layout of a CA directory.
//!
//! ```text
//! <dir>/root/ca.key   root private key
//! <dir>/root/ca.crt   root certificate
//! <dir>/root/ca.srl   last issued serial number (hex)
//! <dir>/cfg/subj.yaml subject template
//! <dir>/key/<domain>.key
//! <dir>/req/<domain>.csr
//! <dir>/crt/<domain>.crt
//! ```

use crate::error::{Error, Result};
use crate::types::ArtifactKind;
use rand::RngCore;
use std::ffi::OsStr;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

const ROOT_DIR: &str = "root";
const CFG_DIR: &str = "cfg";
const ROOT_KEY_FILENAME: &str = "ca.key";
const ROOT_CERT_FILENAME: &str = "ca.crt";
const SERIAL_FILENAME: &str = "ca.srl";
const SUBJECT_FILENAME: &str = "subj.yaml";

/// Length in bytes of a freshly generated starting serial.
const SERIAL_LEN: usize = 16;

#[derive(Debug, Clone)]
pub struct ArtifactStore {
    base: PathBuf,
}

impl ArtifactStore {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    pub fn dir(&self, kind: ArtifactKind) -> PathBuf {
        self.base.join(kind.dir_name())
    }

    pub fn path(&self, kind: ArtifactKind, domain: &str) -> PathBuf {
        self.dir(kind).join(format!("{}.{}", domain, kind.extension()))
    }

    pub fn exists(&self, kind: ArtifactKind, domain: &str) -> bool {
        self.path(kind, domain).exists()
    }

    /// Domains that currently have an artifact of `kind`, in directory order.
    pub fn list(&self, kind: ArtifactKind) -> Result<Domains> {
        let entries = fs::read_dir(self.dir(kind))?;
        Ok(Domains {
            entries,
            extension: kind.extension(),
        })
    }

    pub fn remove(&self, kind: ArtifactKind, domain: &str) -> Result<()> {
        let path = self.path(kind, domain);
        match fs::remove_file(&path) {
            Ok(()) => {
                tracing::info!(kind = %kind, domain = %domain, path = %path.display(), "Artifact removed");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(Error::NotFound(format!("{} for {}", kind, domain)))
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn ensure_directories(&self) -> Result<()> {
        let dirs = [
            self.base.join(ROOT_DIR),
            self.base.join(CFG_DIR),
            self.dir(ArtifactKind::Key),
            self.dir(ArtifactKind::Request),
            self.dir(ArtifactKind::Certificate),
        ];
        for dir in &dirs {
            fs::create_dir_all(dir)?;
        }
        Ok(())
    }

    pub fn root_key_path(&self) -> PathBuf {
        self.base.join(ROOT_DIR).join(ROOT_KEY_FILENAME)
    }

    pub fn root_certificate_path(&self) -> PathBuf {
        self.base.join(ROOT_DIR).join(ROOT_CERT_FILENAME)
    }

    pub fn serial_path(&self) -> PathBuf {
        self.base.join(ROOT_DIR).join(SERIAL_FILENAME)
    }

    pub fn subject_path(&self) -> PathBuf {
        self.base.join(CFG_DIR).join(SUBJECT_FILENAME)
    }

    /// Computes the next certificate serial number without consuming it.
    ///
    /// The serial file holds the last serial issued. When it does not exist
    /// yet a random positive serial is used as the starting point. Call
    /// [`record_serial`](Self::record_serial) once the certificate is signed.
    pub fn next_serial(&self) -> Result<Vec<u8>> {
        let path = self.serial_path();
        match fs::read_to_string(&path) {
            Ok(contents) => {
                let mut last = hex::decode(contents.trim()).map_err(|e| {
                    Error::InvalidInput(format!("serial file {}: {}", path.display(), e))
                })?;
                increment(&mut last);
                Ok(last)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                let mut serial = vec![0u8; SERIAL_LEN];
                rand::thread_rng().fill_bytes(&mut serial);
                serial[0] = (serial[0] & 0x7f) | 0x01;
                tracing::debug!(path = %path.display(), "No serial file, starting a new sequence");
                Ok(serial)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Stores `serial` as the last serial issued.
    pub fn record_serial(&self, serial: &[u8]) -> Result<()> {
        fs::write(self.serial_path(), format!("{}\n", hex::encode_upper(serial)))?;
        Ok(())
    }
}

/// Big-endian increment. Grows the number when it overflows and keeps the
/// leading bit clear so the serial stays positive in DER.
fn increment(serial: &mut Vec<u8>) {
    for byte in serial.iter_mut().rev() {
        let (value, overflow) = byte.overflowing_add(1);
        *byte = value;
        if !overflow {
            break;
        }
    }
    if serial.iter().all(|b| *b == 0) {
        serial.insert(0, 1);
    } else if serial[0] & 0x80 != 0 {
        serial.insert(0, 0);
    }
}

/// Rejects domains that cannot be used as a single file name inside the
/// store.
pub fn validate_domain(domain: &str) -> Result<()> {
    if domain.is_empty() {
        return Err(Error::MissingArgument("domain"));
    }
    if domain == "." || domain == ".." || domain.contains(['/', '\\', '\0']) {
        return Err(Error::InvalidInput(format!("invalid domain name: {:?}", domain)));
    }
    Ok(())
}

/// Lazy listing of domain names in an artifact directory.
#[derive(Debug)]
pub struct Domains {
    entries: fs::ReadDir,
    extension: &'static str,
}

impl Iterator for Domains {
    type Item = Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let entry = match self.entries.next()? {
                Ok(entry) => entry,
                Err(e) => return Some(Err(e.into())),
            };
            let path = entry.path();
            if path.extension() != Some(OsStr::new(self.extension)) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(OsStr::to_str) {
                return Some(Ok(stem.to_string()));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use tempfile::TempDir;

    fn store() -> (TempDir, ArtifactStore) {
        let dir = TempDir::new().unwrap();
        let store = ArtifactStore::new(dir.path().join("ca"));
        store.ensure_directories().unwrap();
        (dir, store)
    }

    #[test]
    fn test_paths_are_fixed() {
        let store = ArtifactStore::new("/srv/ca");
        assert_eq!(
            store.path(ArtifactKind::Key, "example.com"),
            PathBuf::from("/srv/ca/key/example.com.key")
        );
        assert_eq!(
            store.path(ArtifactKind::Request, "example.com"),
            PathBuf::from("/srv/ca/req/example.com.csr")
        );
        assert_eq!(
            store.path(ArtifactKind::Certificate, "example.com"),
            PathBuf::from("/srv/ca/crt/example.com.crt")
        );
        assert_eq!(store.root_key_path(), PathBuf::from("/srv/ca/root/ca.key"));
        assert_eq!(
            store.root_certificate_path(),
            PathBuf::from("/srv/ca/root/ca.crt")
        );
        assert_eq!(store.subject_path(), PathBuf::from("/srv/ca/cfg/subj.yaml"));
    }

    #[test]
    fn test_ensure_directories_is_idempotent() {
        let (_dir, store) = store();
        store.ensure_directories().unwrap();
        for sub in ["root", "cfg", "key", "req", "crt"] {
            assert!(store.base().join(sub).is_dir());
        }
    }

    #[test]
    fn test_list_strips_extension_and_skips_foreign_files() {
        let (_dir, store) = store();
        fs::write(store.path(ArtifactKind::Key, "a.example.com"), "k").unwrap();
        fs::write(store.path(ArtifactKind::Key, "b.example.com"), "k").unwrap();
        fs::write(store.dir(ArtifactKind::Key).join("notes.txt"), "x").unwrap();

        let listed: HashSet<String> = store
            .list(ArtifactKind::Key)
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();
        let expected: HashSet<String> = ["a.example.com", "b.example.com"]
            .into_iter()
            .map(String::from)
            .collect();
        assert_eq!(listed, expected);

        // Listing again re-reads the directory.
        fs::remove_file(store.path(ArtifactKind::Key, "a.example.com")).unwrap();
        assert_eq!(store.list(ArtifactKind::Key).unwrap().count(), 1);
    }

    #[test]
    fn test_remove_missing_is_not_found() {
        let (_dir, store) = store();
        let err = store.remove(ArtifactKind::Request, "nope.example.com").unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));

        fs::write(store.path(ArtifactKind::Request, "yes.example.com"), "r").unwrap();
        store.remove(ArtifactKind::Request, "yes.example.com").unwrap();
        assert!(!store.exists(ArtifactKind::Request, "yes.example.com"));
    }

    #[test]
    fn test_serial_is_recorded_then_incremented() {
        let (_dir, store) = store();
        assert!(!store.serial_path().exists());

        let first = store.next_serial().unwrap();
        assert_eq!(first.len(), SERIAL_LEN);
        assert_eq!(first[0] & 0x80, 0);
        assert!(!store.serial_path().exists());
        store.record_serial(&first).unwrap();
        assert!(store.serial_path().exists());

        let second = store.next_serial().unwrap();
        assert_eq!(store.next_serial().unwrap(), second);
        store.record_serial(&second).unwrap();
        let mut expected = first.clone();
        increment(&mut expected);
        assert_eq!(second, expected);

        let on_disk = fs::read_to_string(store.serial_path()).unwrap();
        assert_eq!(on_disk.trim(), hex::encode_upper(&second));
    }

    #[test]
    fn test_increment_carries() {
        let mut serial = vec![0x01, 0xff];
        increment(&mut serial);
        assert_eq!(serial, vec![0x02, 0x00]);

        let mut serial = vec![0x7f, 0xff];
        increment(&mut serial);
        assert_eq!(serial, vec![0x00, 0x80, 0x00]);

        let mut serial = vec![0xff];
        increment(&mut serial);
        assert_eq!(serial, vec![0x01, 0x00]);
    }

    #[test]
    fn test_validate_domain() {
        assert!(validate_domain("example.com").is_ok());
        assert!(validate_domain("*.example.com").is_ok());
        assert!(matches!(
            validate_domain(""),
            Err(Error::MissingArgument("domain"))
        ));
        assert!(matches!(
            validate_domain("../etc/passwd"),
            Err(Error::InvalidInput(_))
        ));
        assert!(matches!(validate_domain(".."), Err(Error::InvalidInput(_))));
    }
}
