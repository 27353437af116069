// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Hivemind Core
//!
//! Domain model, credential leasing and external adapters for the hivemind
//! swarm orchestrator.
//!
//! # Architecture
//!
//! - **Layer:** Core System
//! - **Purpose:** `domain` holds the model and ports, `application` the
//!   credential manager, `infrastructure` the vault, completion and event bus
//!   adapters

pub mod application;
pub mod domain;
pub mod infrastructure;

pub use domain::*;
