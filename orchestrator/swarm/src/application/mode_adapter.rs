// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Mode Adapter
//!
//! Routes a task to the execution path of its swarm's current mode.
//!
//! | Path | Modes | Execution |
//! |---|---|---|
//! | [`ExecutionPath::Direct`] | Instant, Thinking | one completion with the mode's fixed options |
//! | [`ExecutionPath::ToolAugmented`] | Agent | one completion carrying the task's tools |
//! | [`ExecutionPath::Distributed`] | AgentSwarm | subtasks scheduled on swarm agents, aggregated by priority |
//!
//! Every completion call leases a credential first; the plaintext key lives
//! only for the duration of that call.

use crate::application::mode_controller::{ModeController, ModeError};
use crate::application::scheduler::{
    ExecutionFailure, SchedulerError, SwarmScheduler, TaskExecutor,
};
use crate::domain::swarm::Agent;
use async_trait::async_trait;
use futures::{stream, StreamExt, TryStreamExt};
use hivemind_core::application::credential_manager::{CredentialError, CredentialManager};
use hivemind_core::domain::identity::{SwarmId, TaskId};
use hivemind_core::domain::llm::{CompletionClient, CompletionError, CompletionOptions};
use hivemind_core::domain::mode::ExecutionPath;
use hivemind_core::domain::task::{Task, TaskResult, TokenUsage, Tool};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

#[derive(Debug, thiserror::Error)]
pub enum ExecutionError {
    #[error(transparent)]
    Credential(#[from] CredentialError),

    #[error(transparent)]
    Completion(#[from] CompletionError),

    #[error(transparent)]
    Scheduler(#[from] SchedulerError),

    #[error(transparent)]
    Mode(#[from] ModeError),

    #[error("Task {0} runs in swarm mode but has no subtasks")]
    MissingSubtasks(TaskId),
}

impl ExecutionError {
    pub fn is_retryable(&self) -> bool {
        match self {
            ExecutionError::Credential(CredentialError::VaultUnavailable(e)) => e.is_retryable(),
            ExecutionError::Completion(e) => e.is_retryable(),
            ExecutionError::Scheduler(e) => e.is_retryable(),
            _ => false,
        }
    }
}

enum CompletionCall<'a> {
    Plain(&'a CompletionOptions),
    WithTools(&'a [Tool]),
}

async fn complete_leased(
    credentials: &CredentialManager,
    client: &dyn CompletionClient,
    task: &Task,
    call: CompletionCall<'_>,
) -> Result<TaskResult, ExecutionError> {
    let lease = credentials.acquire().await?;
    let started = Instant::now();
    let mut result = match call {
        CompletionCall::Plain(options) => {
            client
                .complete(lease.secret.expose(), &task.prompt, options)
                .await?
        }
        CompletionCall::WithTools(tools) => {
            client
                .complete_with_tools(lease.secret.expose(), &task.prompt, tools)
                .await?
        }
    };
    result.task_id = task.id;
    result.latency_ms = started.elapsed().as_millis() as u64;
    debug!(
        task_id = %task.id,
        credential_id = %lease.credential_id,
        latency_ms = result.latency_ms,
        "Completion finished"
    );
    Ok(result)
}

pub struct ModeAdapter {
    controller: Arc<ModeController>,
    scheduler: Arc<SwarmScheduler>,
    credentials: Arc<CredentialManager>,
    client: Arc<dyn CompletionClient>,
}

impl ModeAdapter {
    pub fn new(
        controller: Arc<ModeController>,
        scheduler: Arc<SwarmScheduler>,
        credentials: Arc<CredentialManager>,
        client: Arc<dyn CompletionClient>,
    ) -> Self {
        Self {
            controller,
            scheduler,
            credentials,
            client,
        }
    }

    /// Executes `task` under the swarm's current mode.
    pub async fn execute_task(
        &self,
        swarm_id: &SwarmId,
        task: Task,
    ) -> Result<TaskResult, ExecutionError> {
        let mode = self.controller.get_current_mode(swarm_id);
        debug!(swarm_id = %swarm_id, task_id = %task.id, mode = %mode, "Executing task");

        match mode.execution_path() {
            ExecutionPath::Direct(options) => self.execute_direct(&task, &options).await,
            ExecutionPath::ToolAugmented => self.execute_with_tools(&task).await,
            ExecutionPath::Distributed => self.execute_swarm(swarm_id, task).await,
        }
    }

    /// Picks a mode for the task, switches the swarm if needed, then executes.
    pub async fn execute_auto(
        &self,
        swarm_id: &SwarmId,
        task: Task,
    ) -> Result<TaskResult, ExecutionError> {
        let selected = ModeController::auto_select_mode(&task);
        if selected != self.controller.get_current_mode(swarm_id) {
            self.controller
                .switch_mode(swarm_id, selected, "auto-selected")?;
        }
        self.execute_task(swarm_id, task).await
    }

    async fn execute_direct(
        &self,
        task: &Task,
        options: &CompletionOptions,
    ) -> Result<TaskResult, ExecutionError> {
        complete_leased(
            &self.credentials,
            self.client.as_ref(),
            task,
            CompletionCall::Plain(options),
        )
        .await
    }

    async fn execute_with_tools(&self, task: &Task) -> Result<TaskResult, ExecutionError> {
        complete_leased(
            &self.credentials,
            self.client.as_ref(),
            task,
            CompletionCall::WithTools(&task.tools),
        )
        .await
    }

    /// Fans subtasks out to the scheduler, at most `parallelism_ceiling` at a
    /// time, and joins the results in ascending priority order.
    async fn execute_swarm(
        &self,
        swarm_id: &SwarmId,
        task: Task,
    ) -> Result<TaskResult, ExecutionError> {
        if task.subtasks.is_empty() {
            return Err(ExecutionError::MissingSubtasks(task.id));
        }

        let ceiling = self
            .scheduler
            .swarm_profile(swarm_id)
            .ok_or_else(|| SchedulerError::UnknownSwarm(swarm_id.clone()))?
            .parallelism_ceiling
            .max(1) as usize;

        let mut subtasks = task.subtasks.clone();
        subtasks.sort_by_key(|s| s.priority);
        let children: Vec<Task> = subtasks.into_iter().map(|s| s.into_task(&task)).collect();
        let started = Instant::now();

        info!(
            swarm_id = %swarm_id,
            task_id = %task.id,
            subtasks = children.len(),
            ceiling,
            "Distributing task across swarm"
        );

        let scheduler = &self.scheduler;
        let results: Vec<TaskResult> = stream::iter(children.into_iter().map(|child| async move {
            let handle = scheduler.submit_task(swarm_id, child)?;
            Ok::<_, ExecutionError>(handle.wait().await?)
        }))
        .buffered(ceiling)
        .try_collect()
        .await?;

        let mut aggregated = TaskResult::new(task.id, String::new());
        let mut usage = TokenUsage::default();
        let mut sections = Vec::with_capacity(results.len());
        for result in results {
            usage.accumulate(&result.usage);
            aggregated.tool_calls.extend(result.tool_calls);
            sections.push(result.content);
        }
        aggregated.content = sections.join("\n\n");
        aggregated.usage = usage;
        aggregated.latency_ms = started.elapsed().as_millis() as u64;
        Ok(aggregated)
    }
}

/// [`TaskExecutor`] that runs a scheduled task as a credential-backed
/// completion on behalf of one agent.
///
/// Tool definitions are forwarded only when the agent's mode enables tools.
pub struct AgentExecutor {
    credentials: Arc<CredentialManager>,
    client: Arc<dyn CompletionClient>,
}

impl AgentExecutor {
    pub fn new(credentials: Arc<CredentialManager>, client: Arc<dyn CompletionClient>) -> Self {
        Self {
            credentials,
            client,
        }
    }
}

#[async_trait]
impl TaskExecutor for AgentExecutor {
    async fn execute(&self, agent: &Agent, task: &Task) -> Result<TaskResult, ExecutionFailure> {
        let options = match agent.mode.execution_path() {
            ExecutionPath::Direct(options) => options,
            _ => CompletionOptions::tool_augmented(&[]),
        };
        let call = if agent.mode.profile().tools_enabled && !task.tools.is_empty() {
            CompletionCall::WithTools(&task.tools)
        } else {
            CompletionCall::Plain(&options)
        };

        complete_leased(&self.credentials, self.client.as_ref(), task, call)
            .await
            .map_err(|e| ExecutionFailure::new(e.to_string(), e.is_retryable()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hivemind_core::domain::config::{CredentialEntry, CredentialsConfig};
    use hivemind_core::domain::mode::Mode;
    use hivemind_core::infrastructure::vault::InMemoryVault;
    use parking_lot::Mutex;

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Plain { key: String, options: CompletionOptions },
        Tools { key: String, tools: usize },
    }

    #[derive(Default)]
    struct RecordingClient {
        calls: Mutex<Vec<Call>>,
    }

    #[async_trait]
    impl CompletionClient for RecordingClient {
        async fn complete(
            &self,
            api_key: &str,
            prompt: &str,
            options: &CompletionOptions,
        ) -> Result<TaskResult, CompletionError> {
            self.calls.lock().push(Call::Plain {
                key: api_key.to_string(),
                options: options.clone(),
            });
            Ok(TaskResult::new(TaskId::new(), format!("plain:{}", prompt)))
        }

        async fn complete_with_tools(
            &self,
            api_key: &str,
            prompt: &str,
            tools: &[Tool],
        ) -> Result<TaskResult, CompletionError> {
            self.calls.lock().push(Call::Tools {
                key: api_key.to_string(),
                tools: tools.len(),
            });
            Ok(TaskResult::new(TaskId::new(), format!("tools:{}", prompt)))
        }
    }

    fn credentials() -> Arc<CredentialManager> {
        let vault = Arc::new(InMemoryVault::new());
        let settings = CredentialsConfig {
            pool: vec![CredentialEntry {
                id: "primary".to_string(),
                ciphertext: vault.seal_plaintext("sk_live"),
                rate_limit: 100,
            }],
            ..CredentialsConfig::default()
        };
        let manager = CredentialManager::new(vault, settings);
        manager.load_pool().unwrap();
        Arc::new(manager)
    }

    fn search_tool() -> Tool {
        Tool {
            name: "search".to_string(),
            description: String::new(),
            parameters: serde_json::json!({"type": "object"}),
        }
    }

    #[tokio::test]
    async fn test_agent_executor_respects_tool_enablement() {
        let client = Arc::new(RecordingClient::default());
        let executor = AgentExecutor::new(credentials(), client.clone());
        let swarm = SwarmId::new("alpha");
        let task = Task::new("look it up").with_tools(vec![search_tool()]);

        let instant = Agent::new(&swarm, 0, Mode::Instant);
        let result = executor.execute(&instant, &task).await.unwrap();
        assert_eq!(result.task_id, task.id);

        let agent = Agent::new(&swarm, 1, Mode::Agent);
        executor.execute(&agent, &task).await.unwrap();

        let calls = client.calls.lock().clone();
        match &calls[0] {
            Call::Plain { key, options } => {
                assert_eq!(key, "sk_live");
                assert_eq!(options.max_tokens, 512);
                assert!(options.tools.is_empty());
            }
            other => panic!("unexpected call {:?}", other),
        }
        assert_eq!(
            calls[1],
            Call::Tools {
                key: "sk_live".to_string(),
                tools: 1
            }
        );
    }

    #[tokio::test]
    async fn test_exhausted_credentials_are_not_retryable() {
        let vault = Arc::new(InMemoryVault::new());
        let manager = Arc::new(CredentialManager::new(vault, CredentialsConfig::default()));
        let executor = AgentExecutor::new(manager, Arc::new(RecordingClient::default()));
        let agent = Agent::new(&SwarmId::new("alpha"), 0, Mode::Instant);

        let failure = executor
            .execute(&agent, &Task::new("x"))
            .await
            .unwrap_err();
        assert!(!failure.retryable);
    }

    #[test]
    fn test_vault_outage_is_retryable() {
        let err = ExecutionError::Credential(CredentialError::VaultUnavailable(
            hivemind_core::domain::vault::VaultError::Unavailable("down".to_string()),
        ));
        assert!(err.is_retryable());
        assert!(!ExecutionError::MissingSubtasks(TaskId::new()).is_retryable());
    }
}
