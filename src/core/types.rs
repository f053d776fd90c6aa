//! Type aliases for domain concepts.
//!
//! Provides semantic type aliases to make function signatures more descriptive.

/// Opaque identifier of a secret inside a store.
pub type SecretId = String;

/// Name of a rotation job; keys the result map of `rotate_all`.
pub type JobName = String;

/// Name a store is registered under.
pub type StoreName = String;

/// Name a generator is registered under.
pub type GeneratorName = String;

/// Base64 ciphertext token produced by the cipher service.
pub type CipherToken = String;

/// Truncated SHA-256 hex digest identifying a master key.
pub type KeyId = String;
