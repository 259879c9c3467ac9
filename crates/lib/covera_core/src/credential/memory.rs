use std::sync::{Arc, RwLock};

use super::{CredentialStore, StoreError};
use crate::models::auth::Credential;

/// In-memory store. Lost when the process exits.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    current: RwLock<Option<Arc<Credential>>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-seeded with `credential`.
    pub fn with_credential(credential: Credential) -> Self {
        Self {
            current: RwLock::new(Some(Arc::new(credential))),
        }
    }

    pub(super) fn replace(&self, next: Option<Arc<Credential>>) -> Result<(), StoreError> {
        let mut guard = self.current.write().map_err(|_| StoreError::Poisoned)?;
        *guard = next;
        Ok(())
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn load(&self) -> Option<Arc<Credential>> {
        match self.current.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn save(&self, credential: Credential) -> Result<Arc<Credential>, StoreError> {
        let credential = Arc::new(credential);
        self.replace(Some(Arc::clone(&credential)))?;
        Ok(credential)
    }

    fn clear(&self) -> Result<(), StoreError> {
        self.replace(None)
    }
}
