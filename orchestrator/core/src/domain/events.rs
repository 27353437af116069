// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use crate::domain::credential::CredentialId;
use crate::domain::identity::{AgentId, SwarmId, TaskId};
use crate::domain::mode::Mode;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ModeEvent {
    ModeSwitched {
        swarm_id: SwarmId,
        from: Mode,
        to: Mode,
        reason: String,
        switched_at: DateTime<Utc>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TaskEvent {
    TaskDispatched {
        swarm_id: SwarmId,
        task_id: TaskId,
        agent_id: AgentId,
        dispatched_at: DateTime<Utc>,
    },
    /// No idle agent was free at dequeue time; the task goes back to the queue.
    TaskRequeued {
        swarm_id: SwarmId,
        task_id: TaskId,
        attempt: u32,
        requeued_at: DateTime<Utc>,
    },
    TaskCompleted {
        swarm_id: SwarmId,
        task_id: TaskId,
        agent_id: AgentId,
        latency_ms: u64,
        completed_at: DateTime<Utc>,
    },
    TaskFailed {
        swarm_id: SwarmId,
        task_id: TaskId,
        agent_id: Option<AgentId>,
        reason: String,
        failed_at: DateTime<Utc>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum AgentEvent {
    AgentFailed {
        agent_id: AgentId,
        reason: String,
        failed_at: DateTime<Utc>,
    },
    AgentRecovered {
        agent_id: AgentId,
        recovered_at: DateTime<Utc>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum CredentialEvent {
    CredentialRotated {
        credential_id: CredentialId,
        rotated_at: DateTime<Utc>,
    },
    /// Every credential in the pool reached its rate limit.
    CredentialsExhausted {
        pool_size: usize,
        exhausted_at: DateTime<Utc>,
    },
}

impl TaskEvent {
    pub fn swarm_id(&self) -> &SwarmId {
        match self {
            TaskEvent::TaskDispatched { swarm_id, .. }
            | TaskEvent::TaskRequeued { swarm_id, .. }
            | TaskEvent::TaskCompleted { swarm_id, .. }
            | TaskEvent::TaskFailed { swarm_id, .. } => swarm_id,
        }
    }
}

impl ModeEvent {
    pub fn swarm_id(&self) -> &SwarmId {
        match self {
            ModeEvent::ModeSwitched { swarm_id, .. } => swarm_id,
        }
    }
}
