pub mod jwt;

use crate::core::errors::LedgerError;

/// Maps a caller credential to a stable member identity.
pub trait IdentityProvider: Send + Sync {
    fn identify(&self, credential: &str) -> Result<String, LedgerError>;
}
