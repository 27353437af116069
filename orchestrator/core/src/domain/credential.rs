// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Credentials
//!
//! A [`Credential`] is a leasable handle on an encrypted API key. The
//! ciphertext is the only form kept in memory; plaintext exists only inside a
//! [`Plaintext`] for the duration of one outbound call.
//!
//! Usage is counted per limiting window. While a credential is leasable,
//! `usage <= rate_limit` holds.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CredentialId(String);

impl CredentialId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CredentialId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    pub id: CredentialId,
    pub ciphertext: String,
    pub rate_limit: u32,
    pub usage: u32,
    pub last_rotated: DateTime<Utc>,
}

impl Credential {
    pub fn new(id: CredentialId, ciphertext: impl Into<String>, rate_limit: u32) -> Self {
        Self {
            id,
            ciphertext: ciphertext.into(),
            rate_limit,
            usage: 0,
            last_rotated: Utc::now(),
        }
    }

    pub fn has_capacity(&self) -> bool {
        self.usage < self.rate_limit
    }

    pub fn snapshot(&self) -> CredentialSnapshot {
        CredentialSnapshot {
            id: self.id.clone(),
            usage: self.usage,
            rate_limit: self.rate_limit,
            last_rotated: self.last_rotated,
        }
    }
}

/// Redacted view of a credential, safe to log or print.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialSnapshot {
    pub id: CredentialId,
    pub usage: u32,
    pub rate_limit: u32,
    pub last_rotated: DateTime<Utc>,
}

/// Decrypted API key. Never printed.
#[derive(Clone)]
pub struct Plaintext(String);

impl Plaintext {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Plaintext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Plaintext([REDACTED])")
    }
}
