//! Credentials file persistence

use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::debug;

use super::{Credentials, RawCredentials};
use crate::error::CredentialError;

/// TOML credentials file, by default `$XDG_CONFIG_HOME/tunnler/credentials.toml`
#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
}

impl Default for CredentialStore {
    fn default() -> Self {
        Self::at(tunnler_paths::credentials_path())
    }
}

impl CredentialStore {
    /// Store backed by a specific file
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load stored credentials; a missing file yields empty credentials
    pub fn load(&self) -> Result<RawCredentials, CredentialError> {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "No credentials file");
            return Ok(RawCredentials::default());
        }
        let contents = std::fs::read_to_string(&self.path)?;
        Ok(toml::from_str(&contents)?)
    }

    /// Write credentials, creating parent directories
    ///
    /// Returns the path written to.
    pub fn save(&self, credentials: &Credentials) -> Result<PathBuf, CredentialError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let raw = RawCredentials::from(credentials.clone());
        let toml = toml::to_string_pretty(&raw)?;
        write_private(&self.path, &toml)?;

        debug!(path = %self.path.display(), "Saved credentials");
        Ok(self.path.clone())
    }
}

/// Write `contents` to a file only the owner can read
///
/// New files are created with mode 0600; an existing file is narrowed
/// to 0600 before it is truncated.
fn write_private(path: &Path, contents: &str) -> std::io::Result<()> {
    let mut options = std::fs::OpenOptions::new();
    options.write(true).create(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options.open(path)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(std::fs::Permissions::from_mode(0o600))?;
    }
    file.set_len(0)?;
    file.write_all(contents.as_bytes())
}
