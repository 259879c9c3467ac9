use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, warn};

use super::{CredentialStore, MemoryCredentialStore, StoreError};
use crate::models::auth::Credential;

/// Durable store backed by one JSON document.
///
/// The document holds the fixed keys `accessToken`, `refreshToken` and
/// `user`. Writes go to a temp file in the same directory and are renamed
/// over the target, so a crash never leaves a half-written document behind.
/// Reads are served from memory.
#[derive(Debug)]
pub struct FileCredentialStore {
    path: PathBuf,
    cache: MemoryCredentialStore,
}

impl FileCredentialStore {
    /// Open the store at `path`, loading any credential persisted by an
    /// earlier run. A missing, unreadable or partial document counts as
    /// signed out.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let cache = match read_document(&path) {
            Some(credential) => {
                debug!(path = %path.display(), "restored persisted credential");
                MemoryCredentialStore::with_credential(credential)
            }
            None => MemoryCredentialStore::new(),
        };
        Self { path, cache }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_document(&self, credential: &Credential) -> Result<(), StoreError> {
        let dir = match self.path.parent() {
            Some(d) if !d.as_os_str().is_empty() => d.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir)?;
        let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
        serde_json::to_writer_pretty(&mut tmp, credential)?;
        tmp.flush()?;
        tmp.persist(&self.path).map_err(|e| e.error)?;
        Ok(())
    }
}

fn read_document(path: &Path) -> Option<Credential> {
    let content = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "cannot read credential document");
            return None;
        }
    };
    match serde_json::from_str::<Credential>(&content) {
        Ok(c) if !c.access_token.is_empty() && !c.refresh_token.is_empty() => Some(c),
        Ok(_) | Err(_) => {
            warn!(path = %path.display(), "ignoring incomplete credential document");
            None
        }
    }
}

impl CredentialStore for FileCredentialStore {
    fn load(&self) -> Option<Arc<Credential>> {
        self.cache.load()
    }

    fn save(&self, credential: Credential) -> Result<Arc<Credential>, StoreError> {
        self.write_document(&credential)?;
        self.cache.save(credential)
    }

    fn clear(&self) -> Result<(), StoreError> {
        self.cache.clear()?;
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
