use serde::{Deserialize, Serialize};
use std::fmt;
use time::{Duration, OffsetDateTime};

/// Key length for keys created by `key create` and for implicit key creation.
pub const DEFAULT_KEY_LENGTH: u32 = 2048;

/// Key length of the root CA key.
pub const ROOT_KEY_LENGTH: u32 = 4096;

/// Validity of issued leaf certificates.
pub const DEFAULT_CERTIFICATE_DAYS: u32 = 730;

/// Validity of the self-signed root certificate.
pub const DEFAULT_ROOT_DAYS: u32 = 36500;

/// Validity window of a certificate issued now for `days` days.
///
/// Fails with `InvalidInput` when the end date cannot be represented.
pub fn validity_window(days: u32) -> crate::Result<(OffsetDateTime, OffsetDateTime)> {
    let not_before = OffsetDateTime::now_utc();
    let not_after = not_before
        .checked_add(Duration::days(i64::from(days)))
        .ok_or_else(|| {
            crate::Error::InvalidInput(format!("validity of {} days is out of range", days))
        })?;
    Ok((not_before, not_after))
}

/// The three per-domain artifacts, in dependency order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactKind {
    Key,
    Request,
    Certificate,
}

impl ArtifactKind {
    pub const ALL: [ArtifactKind; 3] = [
        ArtifactKind::Key,
        ArtifactKind::Request,
        ArtifactKind::Certificate,
    ];

    pub fn extension(&self) -> &'static str {
        match self {
            ArtifactKind::Key => "key",
            ArtifactKind::Request => "csr",
            ArtifactKind::Certificate => "crt",
        }
    }

    pub fn dir_name(&self) -> &'static str {
        match self {
            ArtifactKind::Key => "key",
            ArtifactKind::Request => "req",
            ArtifactKind::Certificate => "crt",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ArtifactKind::Key => "Key",
            ArtifactKind::Request => "Request",
            ArtifactKind::Certificate => "Certificate",
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The CA-wide distinguished name fields, persisted once by `init`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
    pub country: String,
    pub state: String,
    pub city: String,
    pub organization: String,
}

impl Subject {
    pub fn new(
        country: impl Into<String>,
        state: impl Into<String>,
        city: impl Into<String>,
        organization: impl Into<String>,
    ) -> Self {
        Self {
            country: country.into(),
            state: state.into(),
            city: city.into(),
            organization: organization.into(),
        }
    }

    /// Builds a subject from positional arguments, failing on the first one
    /// that is absent or empty.
    pub fn from_args(
        country: Option<String>,
        state: Option<String>,
        city: Option<String>,
        organization: Option<String>,
    ) -> crate::Result<Self> {
        fn required(value: Option<String>, name: &'static str) -> crate::Result<String> {
            match value {
                Some(v) if !v.trim().is_empty() => Ok(v),
                _ => Err(crate::Error::MissingArgument(name)),
            }
        }

        Ok(Self {
            country: required(country, "country")?,
            state: required(state, "state")?,
            city: required(city, "city")?,
            organization: required(organization, "organization")?,
        })
    }

    pub fn validate(&self) -> crate::Result<()> {
        Self::from_args(
            Some(self.country.clone()),
            Some(self.state.clone()),
            Some(self.city.clone()),
            Some(self.organization.clone()),
        )
        .map(|_| ())
    }

    /// DN of the root certificate.
    pub fn root_name(&self) -> DistinguishedName {
        DistinguishedName {
            country: self.country.clone(),
            state: self.state.clone(),
            locality: self.city.clone(),
            organization: self.organization.clone(),
            common_name: None,
        }
    }

    /// DN of a leaf request for `domain`.
    pub fn leaf_name(&self, domain: &str) -> DistinguishedName {
        DistinguishedName {
            common_name: Some(domain.to_string()),
            ..self.root_name()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DistinguishedName {
    pub country: String,
    pub state: String,
    pub locality: String,
    pub organization: String,
    pub common_name: Option<String>,
}

impl DistinguishedName {
    pub fn to_rcgen(&self) -> rcgen::DistinguishedName {
        let mut dn = rcgen::DistinguishedName::new();
        dn.push(rcgen::DnType::CountryName, self.country.as_str());
        dn.push(rcgen::DnType::StateOrProvinceName, self.state.as_str());
        dn.push(rcgen::DnType::LocalityName, self.locality.as_str());
        dn.push(rcgen::DnType::OrganizationName, self.organization.as_str());
        if let Some(ref cn) = self.common_name {
            dn.push(rcgen::DnType::CommonName, cn.as_str());
        }
        dn
    }
}

/// Renders in the `/C=../ST=../L=../O=..[/CN=..]` form.
impl fmt::Display for DistinguishedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "/C={}/ST={}/L={}/O={}",
            self.country, self.state, self.locality, self.organization
        )?;
        if let Some(ref cn) = self.common_name {
            write!(f, "/CN={}", cn)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Digest {
    #[default]
    Sha512,
}

impl Digest {
    pub fn to_rcgen(&self) -> &'static rcgen::SignatureAlgorithm {
        match self {
            Digest::Sha512 => &rcgen::PKCS_RSA_SHA512,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Digest::Sha512 => "sha512",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InitOptions {
    pub force: bool,
    pub days: u32,
}

impl Default for InitOptions {
    fn default() -> Self {
        Self {
            force: false,
            days: DEFAULT_ROOT_DAYS,
        }
    }
}

impl InitOptions {
    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    pub fn with_days(mut self, days: u32) -> Self {
        self.days = days;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyOptions {
    pub force: bool,
    pub length: u32,
}

impl Default for KeyOptions {
    fn default() -> Self {
        Self {
            force: false,
            length: DEFAULT_KEY_LENGTH,
        }
    }
}

impl KeyOptions {
    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    pub fn with_length(mut self, length: u32) -> Self {
        self.length = length;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RequestOptions {
    pub force: bool,
}

impl RequestOptions {
    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CertificateOptions {
    pub force: bool,
    pub days: u32,
}

impl Default for CertificateOptions {
    fn default() -> Self {
        Self {
            force: false,
            days: DEFAULT_CERTIFICATE_DAYS,
        }
    }
}

impl CertificateOptions {
    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    pub fn with_days(mut self, days: u32) -> Self {
        self.days = days;
        self
    }
}

/// Which dependent artifacts `certificate delete` removes along with the
/// certificate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DeleteOptions {
    pub all: bool,
    pub key: bool,
    pub request: bool,
}

impl DeleteOptions {
    pub fn all() -> Self {
        Self {
            all: true,
            ..Self::default()
        }
    }

    pub fn with_key(mut self, key: bool) -> Self {
        self.key = key;
        self
    }

    pub fn with_request(mut self, request: bool) -> Self {
        self.request = request;
        self
    }

    pub fn removes_key(&self) -> bool {
        self.all || self.key
    }

    pub fn removes_request(&self) -> bool {
        self.all || self.request
    }
}
