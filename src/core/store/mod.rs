//! Secret storage.
//!
//! Stores are key-value persistence for secret values, addressed by
//! secret id. The orchestrator only ever calls [`SecretStore::get`] and
//! [`SecretStore::set`]; everything else is store-specific.
//!
//! ## Adding a New Store
//!
//! 1. Implement the `SecretStore` trait
//! 2. Add the implementation in a new file (e.g., `vault.rs`)
//! 3. Register a factory in `registry::STORE_KINDS`

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use crate::error::Result;

/// Key-value persistence for secret values.
///
/// Implementations must be safe to share across threads; the orchestrator
/// holds them as `Arc<dyn SecretStore>`.
pub trait SecretStore: Send + Sync {
    /// Name the store is registered under.
    fn name(&self) -> &str;

    /// Read the current value of a secret.
    ///
    /// Returns `Ok(None)` when the secret does not exist yet.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the backing storage cannot be read.
    fn get(&self, secret_id: &str) -> Result<Option<String>>;

    /// Write a new value for a secret, creating it if absent.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the backing storage cannot be written.
    fn set(&self, secret_id: &str, value: &str) -> Result<()>;

    /// Whether the store is currently reachable.
    fn validate_connection(&self) -> bool {
        true
    }
}
