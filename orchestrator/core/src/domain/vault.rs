// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Secret Vault
//!
//! Domain port for the centralized secret store that holds credential
//! ciphertext. Implementations live in `infrastructure/vault/`.

use async_trait::async_trait;

#[async_trait]
pub trait SecretVault: Send + Sync {
    /// Encrypts `plaintext` under the named transit key and returns the
    /// ciphertext envelope.
    async fn encrypt(&self, namespace: &str, plaintext: &[u8]) -> Result<String, VaultError>;

    async fn decrypt(&self, namespace: &str, ciphertext: &str) -> Result<Vec<u8>, VaultError>;

    /// Writes a key/value document at `path`.
    async fn put(&self, path: &str, payload: serde_json::Value) -> Result<(), VaultError>;

    /// Returns `true` when the vault is sealed.
    async fn seal_status(&self) -> Result<bool, VaultError>;

    /// Submits one unseal key share. Returns `true` once the vault reports
    /// itself unsealed.
    async fn unseal(&self, key: &str) -> Result<bool, VaultError>;
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum VaultError {
    #[error("Vault unavailable: {0}")]
    Unavailable(String),

    #[error("Vault is sealed")]
    Sealed,

    #[error("Vault rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Invalid vault response: {0}")]
    InvalidResponse(String),
}

impl VaultError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, VaultError::Unavailable(_) | VaultError::Sealed)
    }
}
