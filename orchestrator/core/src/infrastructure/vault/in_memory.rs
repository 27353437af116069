// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! In-process [`SecretVault`] for development and tests.
//!
//! Ciphertext uses the transit envelope shape `vault:v1:<base64>` so pool
//! entries look the same as those produced by a real vault. The encoding is
//! reversible and offers no secrecy.

use crate::domain::vault::{SecretVault, VaultError};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

const ENVELOPE_PREFIX: &str = "vault:v1:";

#[derive(Default)]
pub struct InMemoryVault {
    unavailable: AtomicBool,
    sealed: AtomicBool,
    kv: RwLock<HashMap<String, serde_json::Value>>,
}

impl InMemoryVault {
    pub fn new() -> Self {
        Self::default()
    }

    /// Produces the ciphertext `encrypt` would return, without the async hop.
    pub fn seal_plaintext(&self, plaintext: &str) -> String {
        format!("{}{}", ENVELOPE_PREFIX, STANDARD.encode(plaintext.as_bytes()))
    }

    pub fn set_available(&self, available: bool) {
        self.unavailable.store(!available, Ordering::SeqCst);
    }

    pub fn set_sealed(&self, sealed: bool) {
        self.sealed.store(sealed, Ordering::SeqCst);
    }

    pub fn kv_entry(&self, path: &str) -> Option<serde_json::Value> {
        self.kv.read().get(path).cloned()
    }

    fn ensure_ready(&self) -> Result<(), VaultError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(VaultError::Unavailable("in-memory vault offline".to_string()));
        }
        if self.sealed.load(Ordering::SeqCst) {
            return Err(VaultError::Sealed);
        }
        Ok(())
    }
}

#[async_trait]
impl SecretVault for InMemoryVault {
    async fn encrypt(&self, _namespace: &str, plaintext: &[u8]) -> Result<String, VaultError> {
        self.ensure_ready()?;
        Ok(format!("{}{}", ENVELOPE_PREFIX, STANDARD.encode(plaintext)))
    }

    async fn decrypt(&self, _namespace: &str, ciphertext: &str) -> Result<Vec<u8>, VaultError> {
        self.ensure_ready()?;
        let encoded = ciphertext
            .strip_prefix(ENVELOPE_PREFIX)
            .ok_or_else(|| VaultError::Rejected {
                status: 400,
                message: "invalid ciphertext".to_string(),
            })?;
        STANDARD
            .decode(encoded)
            .map_err(|e| VaultError::InvalidResponse(e.to_string()))
    }

    async fn put(&self, path: &str, payload: serde_json::Value) -> Result<(), VaultError> {
        self.ensure_ready()?;
        self.kv.write().insert(path.to_string(), payload);
        Ok(())
    }

    async fn seal_status(&self) -> Result<bool, VaultError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(VaultError::Unavailable("in-memory vault offline".to_string()));
        }
        Ok(self.sealed.load(Ordering::SeqCst))
    }

    async fn unseal(&self, key: &str) -> Result<bool, VaultError> {
        if key.is_empty() {
            return Err(VaultError::Rejected {
                status: 400,
                message: "empty unseal key".to_string(),
            });
        }
        self.sealed.store(false, Ordering::SeqCst);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_envelope_roundtrip() {
        let vault = InMemoryVault::new();
        let ciphertext = vault.encrypt("swarm-keys", b"sk_abc").await.unwrap();
        assert!(ciphertext.starts_with("vault:v1:"));
        assert_eq!(ciphertext, vault.seal_plaintext("sk_abc"));
        assert_eq!(vault.decrypt("swarm-keys", &ciphertext).await.unwrap(), b"sk_abc");
    }

    #[tokio::test]
    async fn test_sealed_vault_rejects_operations() {
        let vault = InMemoryVault::new();
        vault.set_sealed(true);
        assert!(matches!(
            vault.encrypt("swarm-keys", b"x").await,
            Err(VaultError::Sealed)
        ));
        assert!(vault.unseal("share").await.unwrap());
        assert!(vault.encrypt("swarm-keys", b"x").await.is_ok());
    }
}
