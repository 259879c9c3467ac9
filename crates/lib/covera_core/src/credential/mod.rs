//! Credential storage.
//!
//! A [`CredentialStore`] holds at most one [`Credential`] and swaps it as a
//! whole: readers get an `Arc` to a fully written value, never a mix of two
//! generations.

mod file;
mod memory;

pub use file::FileCredentialStore;
pub use memory::MemoryCredentialStore;

use std::sync::Arc;

use thiserror::Error;

use crate::models::auth::Credential;

/// Credential storage errors.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("Credential lock poisoned")]
    Poisoned,
}

/// Process-wide holder of the current credential.
pub trait CredentialStore: Send + Sync {
    /// Latest fully written credential, if any. Never blocks on I/O.
    fn load(&self) -> Option<Arc<Credential>>;

    /// Replace the stored credential in one step.
    fn save(&self, credential: Credential) -> Result<Arc<Credential>, StoreError>;

    /// Remove the credential entirely.
    fn clear(&self) -> Result<(), StoreError>;

    /// Whether a credential is present.
    fn is_signed_in(&self) -> bool {
        self.load().is_some()
    }
}
