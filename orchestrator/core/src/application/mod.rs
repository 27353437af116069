// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod credential_manager;

pub use credential_manager::{CredentialError, CredentialLease, CredentialManager};
