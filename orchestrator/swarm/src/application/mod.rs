// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod concurrency;
pub mod mode_adapter;
pub mod mode_controller;
pub mod scheduler;

pub use concurrency::AdaptiveConcurrencyController;
pub use mode_adapter::{AgentExecutor, ExecutionError, ModeAdapter};
pub use mode_controller::{
    ModeConfigSink, ModeController, ModeError, ModeSwitchOutcome, ModeTransition,
    PermissiveTransitionPolicy, TransitionPolicy,
};
pub use scheduler::{
    ExecutionFailure, SchedulerError, SwarmScheduler, TaskExecutor, TaskHandle,
};
