//! Custom request headers and their on-disk store.
//!
//! Users can attach arbitrary headers to every request (reverse-proxy auth,
//! tunnels, etc). The list is ordered, persisted as JSON in a private file,
//! loaded once at startup and replaced wholesale on update.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use super::ApiError;

/// A single user-defined header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomHeader {
    pub name: String,
    pub value: String,
}

impl CustomHeader {
    #[must_use]
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// JSON file holding the custom header list.
#[derive(Debug, Clone)]
pub struct HeaderStore {
    path: PathBuf,
}

impl HeaderStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the stored headers. A missing file is an empty list.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Io`] when the file exists but cannot be read, and
    /// [`ApiError::Decode`] when its content is not a header list.
    #[instrument(skip(self), fields(path = %self.path.display()))]
    pub async fn load(&self) -> Result<Vec<CustomHeader>, ApiError> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(ApiError::io(&self.path, e)),
        };
        if raw.trim().is_empty() {
            return Ok(Vec::new());
        }
        let headers: Vec<CustomHeader> = serde_json::from_str(&raw)
            .map_err(|e| ApiError::decode(self.path.display().to_string(), e))?;
        debug!(count = headers.len(), "loaded custom headers");
        Ok(headers)
    }

    /// Replaces the stored list with `headers`.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Io`] if the file or its parent directory cannot be written.
    #[instrument(skip(self, headers), fields(path = %self.path.display(), count = headers.len()))]
    pub async fn save(&self, headers: &[CustomHeader]) -> Result<(), ApiError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| ApiError::io(parent, e))?;
        }
        let json = serde_json::to_string_pretty(headers)
            .map_err(|e| ApiError::decode(self.path.display().to_string(), e))?;
        tokio::fs::write(&self.path, json)
            .await
            .map_err(|e| ApiError::io(&self.path, e))?;
        restrict_permissions(&self.path).await?;
        Ok(())
    }
}

#[cfg(unix)]
async fn restrict_permissions(path: &Path) -> Result<(), ApiError> {
    use std::os::unix::fs::PermissionsExt;
    tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
        .await
        .map_err(|e| ApiError::io(path, e))
}

#[cfg(not(unix))]
async fn restrict_permissions(_path: &Path) -> Result<(), ApiError> {
    Ok(())
}
