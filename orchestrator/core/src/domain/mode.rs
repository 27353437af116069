// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Operating Modes
//!
//! A [`Mode`] is a named operating profile that trades latency against
//! throughput and capability. The table of per-mode metrics is static: it is
//! defined here once and never mutated at runtime.
//!
//! | Mode | Latency | Throughput | Tools | Max agents |
//! |------|---------|------------|-------|------------|
//! | `Instant` | 150 ms | 100 tps | no | 1 |
//! | `Thinking` | 2000 ms | 20 tps | no | 1 |
//! | `Agent` | 500 ms | 50 tps | yes | 10 |
//! | `AgentSwarm` | 800 ms | 450 tps | yes | 100 |
//!
//! Each mode maps to exactly one [`ExecutionPath`]; the mode adapter matches
//! on that sum type to pick a handler.

use crate::domain::llm::CompletionOptions;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Fast answers, no deliberate reasoning, no tools.
    #[default]
    Instant,
    /// Deliberate reasoning before answering.
    Thinking,
    /// Tool-augmented completion.
    Agent,
    /// Work fanned out across a swarm of agents.
    AgentSwarm,
}

/// Static performance profile of a [`Mode`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModeMetrics {
    pub avg_latency_ms: f64,
    pub throughput_tps: f64,
    pub accuracy_percent: f64,
    pub cost_per_1k_tokens: f64,
    pub max_context_tokens: u32,
    pub supports_vision: bool,
    pub supports_tools: bool,
    pub max_parallel_agents: u32,
}

/// Capability summary returned by `get_mode_capabilities`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModeCapabilities {
    pub mode: Mode,
    pub supports_vision: bool,
    pub supports_tools: bool,
    pub max_parallel_agents: u32,
    pub max_context_tokens: u32,
}

/// Configuration a mode imposes on the swarm that runs it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModeProfile {
    pub mode: Mode,
    /// Upper bound on in-flight subtasks of one distributed task.
    pub parallelism_ceiling: u32,
    pub tools_enabled: bool,
    pub vision_enabled: bool,
}

/// How a task is executed under a given mode.
#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionPath {
    /// Single completion call with fixed options.
    Direct(CompletionOptions),
    /// Completion call carrying the task's tool definitions.
    ToolAugmented,
    /// Subtasks distributed across the swarm's agents.
    Distributed,
}

impl Mode {
    pub const ALL: [Mode; 4] = [Mode::Instant, Mode::Thinking, Mode::Agent, Mode::AgentSwarm];

    /// Stable snake_case name, used for config values and metric labels.
    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Instant => "instant",
            Mode::Thinking => "thinking",
            Mode::Agent => "agent",
            Mode::AgentSwarm => "agent_swarm",
        }
    }

    pub fn metrics(self) -> ModeMetrics {
        match self {
            Mode::Instant => ModeMetrics {
                avg_latency_ms: 150.0,
                throughput_tps: 100.0,
                accuracy_percent: 92.0,
                cost_per_1k_tokens: 0.002,
                max_context_tokens: 131_072,
                supports_vision: true,
                supports_tools: false,
                max_parallel_agents: 1,
            },
            Mode::Thinking => ModeMetrics {
                avg_latency_ms: 2000.0,
                throughput_tps: 20.0,
                accuracy_percent: 96.0,
                cost_per_1k_tokens: 0.008,
                max_context_tokens: 262_144,
                supports_vision: true,
                supports_tools: false,
                max_parallel_agents: 1,
            },
            Mode::Agent => ModeMetrics {
                avg_latency_ms: 500.0,
                throughput_tps: 50.0,
                accuracy_percent: 94.0,
                cost_per_1k_tokens: 0.005,
                max_context_tokens: 262_144,
                supports_vision: true,
                supports_tools: true,
                max_parallel_agents: 10,
            },
            Mode::AgentSwarm => ModeMetrics {
                avg_latency_ms: 800.0,
                throughput_tps: 450.0,
                accuracy_percent: 95.0,
                cost_per_1k_tokens: 0.012,
                max_context_tokens: 1_048_576,
                supports_vision: true,
                supports_tools: true,
                max_parallel_agents: 100,
            },
        }
    }

    pub fn capabilities(self) -> ModeCapabilities {
        let metrics = self.metrics();
        ModeCapabilities {
            mode: self,
            supports_vision: metrics.supports_vision,
            supports_tools: metrics.supports_tools,
            max_parallel_agents: metrics.max_parallel_agents,
            max_context_tokens: metrics.max_context_tokens,
        }
    }

    pub fn profile(self) -> ModeProfile {
        let metrics = self.metrics();
        ModeProfile {
            mode: self,
            parallelism_ceiling: metrics.max_parallel_agents,
            tools_enabled: metrics.supports_tools,
            vision_enabled: metrics.supports_vision,
        }
    }

    pub fn execution_path(self) -> ExecutionPath {
        match self {
            Mode::Instant => ExecutionPath::Direct(CompletionOptions {
                max_tokens: 512,
                temperature: 0.3,
                reasoning: false,
                tools: Vec::new(),
            }),
            Mode::Thinking => ExecutionPath::Direct(CompletionOptions {
                max_tokens: 4096,
                temperature: 0.7,
                reasoning: true,
                tools: Vec::new(),
            }),
            Mode::Agent => ExecutionPath::ToolAugmented,
            Mode::AgentSwarm => ExecutionPath::Distributed,
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Mode::Instant => "Instant",
            Mode::Thinking => "Thinking",
            Mode::Agent => "Agent",
            Mode::AgentSwarm => "Agent Swarm",
        };
        f.write_str(name)
    }
}

#[derive(Debug, thiserror::Error)]
#[error("Unknown mode '{0}' (expected instant, thinking, agent or agent_swarm)")]
pub struct ParseModeError(String);

impl FromStr for Mode {
    type Err = ParseModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "instant" | "fast" => Ok(Mode::Instant),
            "thinking" => Ok(Mode::Thinking),
            "agent" => Ok(Mode::Agent),
            "agent_swarm" | "swarm" => Ok(Mode::AgentSwarm),
            _ => Err(ParseModeError(s.to_string())),
        }
    }
}
