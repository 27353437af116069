// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Secret Vault Infrastructure
//
// Adapters for the SecretVault port: the OpenBao/Vault HTTP API used in
// deployments, and an in-process vault for development and tests.

pub mod in_memory;
pub mod openbao;

pub use in_memory::InMemoryVault;
pub use openbao::OpenBaoVault;
