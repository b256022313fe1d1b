//! # Token Store
//!
//! Persists the API token pair between runs as a single JSON object.
//!
//! Writes go to a temp file in the same directory which is then renamed over
//! the target, so a crash never leaves a half-written token behind. A file
//! that does not parse is deleted and treated as absent.

use std::io::Write;
use std::path::{Path, PathBuf};

use drf_core::Token;
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::error::SyncResult;

/// File-backed token persistence.
#[derive(Debug, Clone)]
pub struct TokenStore {
    path: PathBuf,
}

impl TokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        TokenStore { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the persisted token.
    ///
    /// Never fails: a missing file, an unreadable file and a corrupt file
    /// all mean "no token". Corrupt files are removed.
    pub fn load(&self) -> Option<Token> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = ?self.path, "No persisted token");
                return None;
            }
            Err(e) => {
                warn!(path = ?self.path, error = %e, "Could not read token file");
                return None;
            }
        };

        match serde_json::from_str::<Token>(&contents) {
            Ok(token) => {
                debug!(path = ?self.path, "Loaded persisted token");
                Some(token)
            }
            Err(e) => {
                warn!(path = ?self.path, error = %e, "Token file is corrupt, removing it");
                if let Err(e) = std::fs::remove_file(&self.path) {
                    warn!(path = ?self.path, error = %e, "Could not remove corrupt token file");
                }
                None
            }
        }
    }

    /// Atomically replaces the persisted token.
    pub fn save(&self, token: &Token) -> SyncResult<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir)?;

        let mut file = NamedTempFile::new_in(&dir)?;
        serde_json::to_writer(&mut file, token).map_err(std::io::Error::from)?;
        file.write_all(b"\n")?;
        file.as_file().sync_all()?;
        file.persist(&self.path)?;

        debug!(path = ?self.path, "Token persisted");
        Ok(())
    }

    /// Removes the persisted token, if any.
    pub fn clear(&self) -> SyncResult<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
