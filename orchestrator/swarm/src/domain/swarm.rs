// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Swarm Domain Aggregates
//!
//! - [`Swarm`] — aggregate root tracking agent membership and the mode profile
//!   currently applied to the swarm.
//! - [`Agent`] — one worker slot with an explicit status state machine.
//! - [`SwarmMetrics`] — derived point-in-time snapshot; never stored.
//!
//! ## Agent lifecycle
//!
//! ```text
//! Idle --assign--> Busy --complete--> Idle
//!                   |
//!                   +--fail--> Error --recover--> Idle
//! ```

use chrono::{DateTime, Utc};
use hivemind_core::domain::identity::{AgentId, SwarmId};
use hivemind_core::domain::mode::{Mode, ModeProfile};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    Idle,
    Busy,
    Error,
}

impl fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            AgentStatus::Idle => "idle",
            AgentStatus::Busy => "busy",
            AgentStatus::Error => "error",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Agent {agent_id} cannot {action} while {from}")]
pub struct AgentStateError {
    pub agent_id: AgentId,
    pub from: AgentStatus,
    pub action: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Agent {
    pub id: AgentId,
    pub swarm_id: SwarmId,
    pub mode: Mode,
    pub status: AgentStatus,
    pub task_count: u64,
    pub last_active: DateTime<Utc>,
}

impl Agent {
    pub fn new(swarm_id: &SwarmId, index: usize, mode: Mode) -> Self {
        Self {
            id: AgentId::for_slot(swarm_id, index),
            swarm_id: swarm_id.clone(),
            mode,
            status: AgentStatus::Idle,
            task_count: 0,
            last_active: Utc::now(),
        }
    }

    pub fn is_idle(&self) -> bool {
        self.status == AgentStatus::Idle
    }

    pub fn is_busy(&self) -> bool {
        self.status == AgentStatus::Busy
    }

    /// Idle → Busy; counts the task.
    pub fn assign(&mut self) -> Result<(), AgentStateError> {
        self.transition(AgentStatus::Idle, AgentStatus::Busy, "assign")?;
        self.task_count += 1;
        Ok(())
    }

    /// Busy → Idle after a successful execution.
    pub fn complete(&mut self) -> Result<(), AgentStateError> {
        self.transition(AgentStatus::Busy, AgentStatus::Idle, "complete")
    }

    /// Busy → Error after a failed execution.
    pub fn fail(&mut self) -> Result<(), AgentStateError> {
        self.transition(AgentStatus::Busy, AgentStatus::Error, "fail")
    }

    /// Error → Idle.
    pub fn recover(&mut self) -> Result<(), AgentStateError> {
        self.transition(AgentStatus::Error, AgentStatus::Idle, "recover")
    }

    fn transition(
        &mut self,
        expected: AgentStatus,
        next: AgentStatus,
        action: &'static str,
    ) -> Result<(), AgentStateError> {
        if self.status != expected {
            return Err(AgentStateError {
                agent_id: self.id.clone(),
                from: self.status,
                action,
            });
        }
        self.status = next;
        self.last_active = Utc::now();
        Ok(())
    }
}

/// Aggregate root for one named swarm.
///
/// # Invariants
///
/// - Agent slots are created with the swarm and never added afterwards.
/// - `profile.mode` is the mode every agent of the swarm runs under.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Swarm {
    pub id: SwarmId,
    pub agents: Vec<AgentId>,
    pub profile: ModeProfile,
    pub created_at: DateTime<Utc>,
}

impl Swarm {
    /// Builds the swarm and its `size` idle agents.
    pub fn initialize(id: SwarmId, size: usize, mode: Mode) -> (Self, Vec<Agent>) {
        let agents: Vec<Agent> = (0..size).map(|i| Agent::new(&id, i, mode)).collect();
        let swarm = Self {
            agents: agents.iter().map(|a| a.id.clone()).collect(),
            id,
            profile: mode.profile(),
            created_at: Utc::now(),
        };
        (swarm, agents)
    }
}

/// Point-in-time snapshot computed on read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwarmMetrics {
    pub swarm_id: SwarmId,
    pub mode: Mode,
    pub active_agents: usize,
    pub pending_tasks: usize,
    /// Parallelism recommendation in effect when the snapshot was taken.
    pub parallelism: usize,
    pub total_agents: usize,
    pub completed_tasks: u64,
    pub failed_tasks: u64,
    pub avg_latency_ms: f64,
    /// `active_agents / total_agents`, or 0 for an empty swarm.
    pub resource_utilization: f64,
}
