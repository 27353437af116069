// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # `hivemind-swarm` — Adaptive Swarm Orchestration
//!
//! Runs pools of agents under an operating mode and keeps their parallelism
//! tuned from observed task outcomes.
//!
//! ## Crate Layout
//!
//! | Module | Layer | Contents |
//! |--------|-------|----------|
//! | [`domain`] | Domain | `Swarm`, `Agent`, `SwarmMetrics` |
//! | [`application`] | Application | `ModeController`, `AdaptiveConcurrencyController`, `SwarmScheduler`, `ModeAdapter` |
//!
//! ## Data flow
//!
//! A caller hands a task to the [`application::ModeAdapter`], which reads the
//! swarm's mode from the [`application::ModeController`]. Distributed tasks
//! are split into subtasks and submitted to the [`application::SwarmScheduler`];
//! each subtask runs on an idle agent through a credential-backed completion
//! call. Outcomes feed the [`application::AdaptiveConcurrencyController`],
//! whose recommendation bounds how many agents the scheduler keeps busy.

pub mod application;
pub mod domain;

pub use domain::*;
