// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Credential Manager
//!
//! Owns the pool of rate-limited API credentials and hands them out
//! round-robin. Secrets stay encrypted in the pool; [`CredentialManager::decrypt`]
//! asks the vault for plaintext just before an outbound call.
//!
//! ## Concurrency
//!
//! The pool sits behind a single `parking_lot::Mutex`. Leasing is a bounded
//! scan under that lock and never suspends. Rotations are serialized by a
//! separate async guard held across their vault round trips; the pool lock is
//! only taken for the final in-place swap, so concurrent leases observe either
//! the old or the new secret, never a torn entry.

use crate::domain::config::CredentialsConfig;
use crate::domain::credential::{Credential, CredentialId, CredentialSnapshot, Plaintext};
use crate::domain::events::CredentialEvent;
use crate::domain::vault::{SecretVault, VaultError};
use crate::infrastructure::event_bus::EventBus;
use chrono::Utc;
use parking_lot::Mutex;
use rand::RngCore;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    #[error("No credentials available: every credential is at its rate limit")]
    NoCredentialsAvailable,

    #[error("Credential not found: {0}")]
    NotFound(CredentialId),

    #[error("Vault operation failed: {0}")]
    VaultUnavailable(#[from] VaultError),

    #[error("Duplicate credential id: {0}")]
    Duplicate(CredentialId),
}

/// Decrypted credential handed to one outbound call.
#[derive(Debug, Clone)]
pub struct CredentialLease {
    pub credential_id: CredentialId,
    pub secret: Plaintext,
}

/// Stable-ordered arena plus the round-robin cursor.
struct CredentialPool {
    entries: Vec<Credential>,
    cursor: usize,
}

pub struct CredentialManager {
    vault: Arc<dyn SecretVault>,
    settings: CredentialsConfig,
    pool: Mutex<CredentialPool>,
    rotation: tokio::sync::Mutex<()>,
    event_bus: Option<EventBus>,
}

impl CredentialManager {
    /// Builds a manager over an empty pool without contacting the vault.
    pub fn new(vault: Arc<dyn SecretVault>, settings: CredentialsConfig) -> Self {
        Self {
            vault,
            settings,
            pool: Mutex::new(CredentialPool {
                entries: Vec::new(),
                cursor: 0,
            }),
            rotation: tokio::sync::Mutex::new(()),
            event_bus: None,
        }
    }

    /// Checks the vault seal state, unsealing with `unseal_keys` when needed,
    /// then loads the configured pool.
    pub async fn connect(
        vault: Arc<dyn SecretVault>,
        settings: CredentialsConfig,
        unseal_keys: &[String],
    ) -> Result<Self, CredentialError> {
        if vault.seal_status().await? {
            if unseal_keys.is_empty() {
                warn!("Vault is sealed and no unseal keys are configured");
                return Err(CredentialError::VaultUnavailable(VaultError::Sealed));
            }

            info!(key_shares = unseal_keys.len(), "Vault is sealed, attempting auto-unseal");
            let mut unsealed = false;
            for key in unseal_keys {
                if vault.unseal(key).await? {
                    unsealed = true;
                    break;
                }
            }
            if !unsealed {
                return Err(CredentialError::VaultUnavailable(VaultError::Sealed));
            }
            info!("Vault unsealed");
        }

        let manager = Self::new(vault, settings);
        manager.load_pool()?;
        Ok(manager)
    }

    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    /// Adds every `spec.credentials.pool` entry to the pool.
    pub fn load_pool(&self) -> Result<(), CredentialError> {
        for entry in self.settings.pool.clone() {
            self.add_credential(Credential::new(
                CredentialId::new(entry.id),
                entry.ciphertext,
                entry.rate_limit,
            ))?;
        }
        info!(pool_size = self.len(), "Credential pool loaded");
        Ok(())
    }

    pub fn add_credential(&self, credential: Credential) -> Result<(), CredentialError> {
        let mut pool = self.pool.lock();
        if pool.entries.iter().any(|c| c.id == credential.id) {
            return Err(CredentialError::Duplicate(credential.id));
        }
        debug!(credential_id = %credential.id, rate_limit = credential.rate_limit, "Credential added");
        pool.entries.push(credential);
        Ok(())
    }

    /// Leases the next credential below its rate limit, scanning round-robin
    /// from the cursor. The returned copy already carries the incremented usage.
    pub fn get_credential(&self) -> Result<Credential, CredentialError> {
        let mut pool = self.pool.lock();
        let size = pool.entries.len();

        for offset in 0..size {
            let index = (pool.cursor + offset) % size;
            let entry = &mut pool.entries[index];
            if entry.has_capacity() {
                entry.usage += 1;
                let leased = entry.clone();
                pool.cursor = (index + 1) % size;
                drop(pool);

                metrics::counter!("hivemind_credential_leases_total").increment(1);
                debug!(credential_id = %leased.id, usage = leased.usage, "Credential leased");
                return Ok(leased);
            }
        }
        drop(pool);

        metrics::counter!("hivemind_credentials_exhausted_total").increment(1);
        warn!(pool_size = size, "All credentials are at their rate limit");
        if let Some(bus) = &self.event_bus {
            bus.publish_credential_event(CredentialEvent::CredentialsExhausted {
                pool_size: size,
                exhausted_at: Utc::now(),
            });
        }
        Err(CredentialError::NoCredentialsAvailable)
    }

    /// Decrypts a leased credential's secret through the vault.
    pub async fn decrypt(&self, credential: &Credential) -> Result<Plaintext, CredentialError> {
        let bytes = self
            .vault
            .decrypt(&self.settings.namespace, &credential.ciphertext)
            .await?;
        let secret = String::from_utf8(bytes).map_err(|_| {
            VaultError::InvalidResponse(format!("secret for {} is not UTF-8", credential.id))
        })?;
        Ok(Plaintext::new(secret))
    }

    /// Lease and decrypt in one step.
    pub async fn acquire(&self) -> Result<CredentialLease, CredentialError> {
        let credential = self.get_credential()?;
        let secret = self.decrypt(&credential).await?;
        Ok(CredentialLease {
            credential_id: credential.id,
            secret,
        })
    }

    /// Issues a fresh secret for `id`, encrypts it, persists the ciphertext to
    /// the KV store and swaps it into the pool. On any vault failure the pool
    /// is left untouched.
    ///
    /// Usage is carried over: the new secret inherits the slot's consumption
    /// for the current window.
    pub async fn rotate(&self, id: &CredentialId) -> Result<CredentialSnapshot, CredentialError> {
        let _rotating = self.rotation.lock().await;
        if !self.pool.lock().entries.iter().any(|c| &c.id == id) {
            return Err(CredentialError::NotFound(id.clone()));
        }

        let secret = self.generate_secret();
        let ciphertext = self
            .vault
            .encrypt(&self.settings.namespace, secret.expose().as_bytes())
            .await?;

        let rotated_at = Utc::now();
        let path = format!(
            "{}/{}/{}",
            self.settings.kv_mount, self.settings.kv_path_prefix, id
        );
        self.vault
            .put(
                &path,
                serde_json::json!({
                    "key": ciphertext,
                    "last_rotated": rotated_at.to_rfc3339(),
                }),
            )
            .await?;

        let snapshot = {
            let mut pool = self.pool.lock();
            let entry = pool
                .entries
                .iter_mut()
                .find(|c| &c.id == id)
                .ok_or_else(|| CredentialError::NotFound(id.clone()))?;
            entry.ciphertext = ciphertext;
            entry.last_rotated = rotated_at;
            entry.snapshot()
        };

        metrics::counter!("hivemind_credential_rotations_total").increment(1);
        info!(credential_id = %id, "Credential rotated");
        if let Some(bus) = &self.event_bus {
            bus.publish_credential_event(CredentialEvent::CredentialRotated {
                credential_id: id.clone(),
                rotated_at,
            });
        }
        Ok(snapshot)
    }

    /// Starts a new rate-limiting window.
    pub fn reset_usage_window(&self) {
        let mut pool = self.pool.lock();
        for entry in pool.entries.iter_mut() {
            entry.usage = 0;
        }
        debug!(pool_size = pool.entries.len(), "Credential usage window reset");
    }

    /// Resets usage every `usage_window_secs` until `cancel` fires.
    pub fn spawn_window_reset(self: &Arc<Self>, cancel: CancellationToken) -> JoinHandle<()> {
        let manager = Arc::clone(self);
        let period = Duration::from_secs(self.settings.usage_window_secs.max(1));
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            // first tick completes immediately
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        debug!("Credential window reset stopped");
                        break;
                    }
                    _ = ticker.tick() => manager.reset_usage_window(),
                }
            }
        })
    }

    pub fn pool_snapshot(&self) -> Vec<CredentialSnapshot> {
        self.pool.lock().entries.iter().map(Credential::snapshot).collect()
    }

    pub fn len(&self) -> usize {
        self.pool.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn generate_secret(&self) -> Plaintext {
        let mut bytes = [0u8; 32];
        rand::rng().fill_bytes(&mut bytes);
        Plaintext::new(format!("{}{}", self.settings.secret_prefix, hex::encode(bytes)))
    }
}
