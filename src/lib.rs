//! caman - a local certificate authority manager
//!
//! Keeps a self-signed root CA and, per domain, a private key, a certificate
//! signing request and a signed certificate as plain PEM files in a fixed
//! directory layout:
//!
//! - `init` creates the root key and certificate and stores the subject
//!   fields (country, state, city, organization) every later request reuses
//! - keys, requests and certificates are created, listed and deleted by
//!   domain name; a certificate pulls in a missing key and request on its own
//! - all cryptography sits behind the [`CryptoEngine`] trait
//!
//! # Examples
//!
//! ## Initializing a CA
//!
//! ```no_run
//! use caman::{Authority, InitOptions, Subject};
//!
//! let ca = Authority::open("ca");
//! let subject = Subject::new("US", "California", "San Francisco", "Example CA");
//! ca.init(&subject, InitOptions::default()).unwrap();
//! ```
//!
//! ## Issuing a Certificate
//!
//! ```no_run
//! use caman::{Authority, CertificateOptions};
//!
//! let ca = Authority::open("ca");
//! let issued = ca
//!     .certificates()
//!     .create("example.com", CertificateOptions::default().with_days(90))
//!     .unwrap();
//!
//! // key/example.com.key and req/example.com.csr were created as needed
//! println!("{} ({:?})", issued.path.display(), issued.created);
//! ```
//!
//! ## Cleaning up a Domain
//!
//! ```no_run
//! use caman::{Authority, DeleteOptions};
//!
//! let ca = Authority::open("ca");
//! ca.certificates()
//!     .delete("example.com", DeleteOptions::all())
//!     .unwrap();
//! ```

pub mod ca;
pub mod engine;
pub mod error;
pub mod lifecycle;
pub mod store;
pub mod template;
pub mod types;

#[cfg(feature = "cli")]
pub mod cli;

#[cfg(test)]
mod testing;

pub use error::{Error, Result};

pub use ca::{Authority, CaStatus};
pub use engine::{CryptoEngine, RcgenEngine, SigningRequest};
pub use lifecycle::{Certificates, Issuance, Keys, Requests};
pub use store::{ArtifactStore, Domains};
pub use types::{
    ArtifactKind, CertificateOptions, DeleteOptions, Digest, DistinguishedName, InitOptions,
    KeyOptions, RequestOptions, Subject,
};

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;
    use x509_parser::pem::parse_x509_pem;

    #[test]
    fn test_full_lifecycle_with_rcgen_engine() {
        let dir = TempDir::new().unwrap();
        let ca = Authority::open(dir.path().join("ca"));
        let subject = Subject::new("NL", "Noord-Holland", "Amsterdam", "Test CA");

        ca.init(&subject, InitOptions::default().with_days(3650))
            .unwrap();
        assert_eq!(ca.status(), CaStatus::Initialized);

        let issued = ca
            .certificates()
            .create("test.example.com", CertificateOptions::default())
            .unwrap();
        assert_eq!(issued.created, ArtifactKind::ALL.to_vec());

        let pem = fs::read(&issued.path).unwrap();
        let (_, pem) = parse_x509_pem(&pem).unwrap();
        let cert = pem.parse_x509().unwrap();
        let cn = cert.subject().iter_common_name().next().unwrap();
        assert_eq!(cn.as_str().unwrap(), "test.example.com");
        let city = cert.subject().iter_locality().next().unwrap();
        assert_eq!(city.as_str().unwrap(), "Amsterdam");

        let removed = ca
            .certificates()
            .delete("test.example.com", DeleteOptions::all())
            .unwrap();
        assert_eq!(removed.len(), 3);
        assert_eq!(ca.keys().list().unwrap().count(), 0);
    }

    #[test]
    fn test_uninitialized_directory() {
        let dir = TempDir::new().unwrap();
        let ca = Authority::open(dir.path().join("ca"));

        assert_eq!(ca.status(), CaStatus::Uninitialized);
        assert!(matches!(ca.subject(), Err(Error::NotInitialized)));
        assert!(matches!(
            ca.certificates().revoke("example.com"),
            Err(Error::NotInitialized)
        ));
    }
}
