//! Subject template persistence (`cfg/subj.yaml`).
//!
//! The template is written by `init` and read back by every request and
//! certificate issuance. Its presence is what marks a CA directory as
//! initialized.

use crate::error::{Error, Result};
use crate::types::Subject;
use serde::Deserialize;
use std::fs;
use std::io;
use std::path::Path;

/// Mirror of [`Subject`] with every field optional so a missing field can be
/// reported by name.
#[derive(Debug, Deserialize)]
struct StoredSubject {
    country: Option<String>,
    state: Option<String>,
    city: Option<String>,
    organization: Option<String>,
}

impl Subject {
    /// Writes the template, replacing whatever was there.
    pub fn save(&self, path: &Path) -> Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        fs::write(path, yaml)?;
        tracing::info!(path = %path.display(), "Subject template written");
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let yaml = match fs::read_to_string(path) {
            Ok(yaml) => yaml,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Err(Error::NotInitialized),
            Err(e) => return Err(e.into()),
        };

        let stored: StoredSubject = serde_yaml::from_str(&yaml)?;
        let field = |value: Option<String>, name: &str| {
            value.ok_or_else(|| Error::Corrupt(format!("missing field `{}`", name)))
        };

        Ok(Self {
            country: field(stored.country, "country")?,
            state: field(stored.state, "state")?,
            city: field(stored.city, "city")?,
            organization: field(stored.organization, "organization")?,
        })
    }
}
