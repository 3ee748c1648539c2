//! On-disk layout of downloaded archives.
//!
//! ```text
//! <root>/<archive id>/<page index>
//! <root>/<archive id>/thumbs/<page index>
//! ```
//!
//! Page indices are zero-based and files carry no extension. Every query
//! here is a plain filesystem check with no side effects.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::api::ApiError;

const THUMBS_DIR: &str = "thumbs";

#[derive(Debug, Clone)]
pub struct DownloadStorage {
    root: PathBuf,
}

impl DownloadStorage {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Archive ids become directory names, so anything that could escape the
    /// root is refused.
    #[must_use]
    pub fn is_valid_id(id: &str) -> bool {
        !id.is_empty()
            && id != "."
            && id != ".."
            && !id.contains(['/', '\\'])
            && !id.contains('\0')
    }

    #[must_use]
    pub fn archive_dir(&self, id: &str) -> PathBuf {
        self.root.join(id)
    }

    #[must_use]
    pub fn thumbs_dir(&self, id: &str) -> PathBuf {
        self.archive_dir(id).join(THUMBS_DIR)
    }

    #[must_use]
    pub fn page_path(&self, id: &str, index: usize) -> PathBuf {
        self.archive_dir(id).join(index.to_string())
    }

    #[must_use]
    pub fn thumb_path(&self, id: &str, index: usize) -> PathBuf {
        self.thumbs_dir(id).join(index.to_string())
    }

    /// An archive counts as downloaded once its directory exists.
    #[must_use]
    pub fn is_downloaded(&self, id: &str) -> bool {
        Self::is_valid_id(id) && self.archive_dir(id).is_dir()
    }

    /// Number of page files present for `id` (thumbnails excluded).
    #[must_use]
    pub fn downloaded_page_count(&self, id: &str) -> usize {
        if !Self::is_valid_id(id) {
            return 0;
        }
        let Ok(entries) = std::fs::read_dir(self.archive_dir(id)) else {
            return 0;
        };
        entries
            .filter_map(Result::ok)
            .filter(|entry| entry.file_type().is_ok_and(|t| t.is_file()))
            .filter(|entry| {
                entry
                    .file_name()
                    .to_str()
                    .is_some_and(|name| name.parse::<usize>().is_ok())
            })
            .count()
    }

    #[must_use]
    pub fn downloaded_page(&self, id: &str, index: usize) -> Option<PathBuf> {
        if !Self::is_valid_id(id) {
            return None;
        }
        let path = self.page_path(id, index);
        path.is_file().then_some(path)
    }

    #[must_use]
    pub fn downloaded_thumb(&self, id: &str, index: usize) -> Option<PathBuf> {
        if !Self::is_valid_id(id) {
            return None;
        }
        let path = self.thumb_path(id, index);
        path.is_file().then_some(path)
    }

    /// Creates the archive and thumbnail directories.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Io`] if a directory cannot be created.
    pub async fn prepare(&self, id: &str) -> Result<(), ApiError> {
        let thumbs = self.thumbs_dir(id);
        tokio::fs::create_dir_all(&thumbs)
            .await
            .map_err(|e| ApiError::io(thumbs, e))
    }

    /// Recursively removes everything stored for `id`. Missing is fine.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Io`] if the directory exists but cannot be removed.
    pub async fn remove(&self, id: &str) -> Result<(), ApiError> {
        let dir = self.archive_dir(id);
        match tokio::fs::remove_dir_all(&dir).await {
            Ok(()) => {
                debug!(path = %dir.display(), "removed archive directory");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(ApiError::io(dir, e)),
        }
    }
}
