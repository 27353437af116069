// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Domain
//!
//! Types and ports shared by the credential manager, the swarm scheduler and
//! the mode adapter.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Entities, value objects, events and the vault/completion
//!   ports implemented in `infrastructure`

pub mod config;
pub mod credential;
pub mod events;
pub mod identity;
pub mod llm;
pub mod mode;
pub mod task;
pub mod vault;
