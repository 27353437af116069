// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use async_trait::async_trait;
use hivemind_core::application::credential_manager::CredentialManager;
use hivemind_core::domain::config::{CredentialEntry, CredentialsConfig, SchedulerConfig};
use hivemind_core::domain::identity::{SwarmId, TaskId};
use hivemind_core::domain::llm::{CompletionClient, CompletionError, CompletionOptions};
use hivemind_core::domain::mode::Mode;
use hivemind_core::domain::task::{Subtask, Task, TaskResult, TokenUsage, Tool};
use hivemind_core::infrastructure::vault::InMemoryVault;
use hivemind_swarm::application::{
    AdaptiveConcurrencyController, AgentExecutor, ExecutionError, ModeAdapter, ModeController,
    SwarmScheduler,
};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Echoes the prompt and tracks how many calls overlap.
#[derive(Default)]
struct EchoClient {
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    options: Mutex<Vec<CompletionOptions>>,
}

impl EchoClient {
    async fn answer(&self, prompt: &str, label: &str) -> TaskResult {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(20)).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let mut result = TaskResult::new(TaskId::new(), format!("{}:{}", label, prompt));
        result.usage = TokenUsage {
            prompt_tokens: 3,
            completion_tokens: 2,
            total_tokens: 5,
        };
        result
    }
}

#[async_trait]
impl CompletionClient for EchoClient {
    async fn complete(
        &self,
        _api_key: &str,
        prompt: &str,
        options: &CompletionOptions,
    ) -> Result<TaskResult, CompletionError> {
        self.options.lock().push(options.clone());
        Ok(self.answer(prompt, "plain").await)
    }

    async fn complete_with_tools(
        &self,
        _api_key: &str,
        prompt: &str,
        _tools: &[Tool],
    ) -> Result<TaskResult, CompletionError> {
        Ok(self.answer(prompt, "tools").await)
    }
}

struct Harness {
    controller: Arc<ModeController>,
    scheduler: Arc<SwarmScheduler>,
    adapter: ModeAdapter,
    client: Arc<EchoClient>,
    cancel: CancellationToken,
}

fn harness(agents: usize) -> Harness {
    let vault = Arc::new(InMemoryVault::new());
    let settings = CredentialsConfig {
        pool: vec![CredentialEntry {
            id: "primary".to_string(),
            ciphertext: vault.seal_plaintext("sk_test"),
            rate_limit: 1_000,
        }],
        ..CredentialsConfig::default()
    };
    let credentials = Arc::new(CredentialManager::new(vault, settings));
    credentials.load_pool().unwrap();

    let client = Arc::new(EchoClient::default());
    let scheduler = Arc::new(SwarmScheduler::new(
        SchedulerConfig {
            requeue_delay_ms: 5,
            ..SchedulerConfig::default()
        },
        Arc::new(AgentExecutor::new(credentials.clone(), client.clone())),
        Arc::new(AdaptiveConcurrencyController::default()),
    ));
    let controller = Arc::new(ModeController::new().with_config_sink(scheduler.clone()));

    let swarm = SwarmId::new("research");
    scheduler
        .initialize_swarm(swarm.clone(), agents, Mode::Instant)
        .unwrap();
    controller.register_swarm(&swarm, Mode::Instant).unwrap();

    let cancel = CancellationToken::new();
    scheduler.spawn(cancel.clone());

    let adapter = ModeAdapter::new(
        controller.clone(),
        scheduler.clone(),
        credentials,
        client.clone(),
    );
    Harness {
        controller,
        scheduler,
        adapter,
        client,
        cancel,
    }
}

#[tokio::test]
async fn test_instant_mode_uses_direct_options() {
    let h = harness(1);
    let swarm = SwarmId::new("research");
    let task = Task::new("quick");
    let task_id = task.id;

    let result = h.adapter.execute_task(&swarm, task).await.unwrap();
    assert_eq!(result.task_id, task_id);
    assert_eq!(result.content, "plain:quick");

    let options = h.client.options.lock().clone();
    assert_eq!(options[0].max_tokens, 512);
    assert!(!options[0].reasoning);
    h.cancel.cancel();
}

#[tokio::test]
async fn test_swarm_mode_aggregates_by_priority_under_ceiling() {
    let h = harness(4);
    let swarm = SwarmId::new("research");
    h.controller
        .switch_mode(&swarm, Mode::AgentSwarm, "fan out")
        .unwrap();
    assert_eq!(
        h.scheduler.swarm_profile(&swarm).unwrap().mode,
        Mode::AgentSwarm
    );

    let task = Task::new("survey")
        .with_subtask(Subtask::new("third", 30))
        .with_subtask(Subtask::new("first", 10))
        .with_subtask(Subtask::new("second", 20));
    let task_id = task.id;

    let result = h.adapter.execute_task(&swarm, task).await.unwrap();
    assert_eq!(result.task_id, task_id);
    assert_eq!(result.content, "plain:first\n\nplain:second\n\nplain:third");
    assert_eq!(result.usage.total_tokens, 15);
    assert!(h.client.peak.load(Ordering::SeqCst) <= 4);

    let metrics = h.scheduler.get_swarm_metrics(&swarm).unwrap();
    assert_eq!(metrics.completed_tasks, 3);
    assert_eq!(metrics.active_agents, 0);
    h.cancel.cancel();
}

#[tokio::test]
async fn test_swarm_mode_without_subtasks_is_rejected() {
    let h = harness(2);
    let swarm = SwarmId::new("research");
    h.controller
        .switch_mode(&swarm, Mode::AgentSwarm, "fan out")
        .unwrap();

    let err = h
        .adapter
        .execute_task(&swarm, Task::new("lonely"))
        .await
        .unwrap_err();
    assert!(matches!(err, ExecutionError::MissingSubtasks(_)));
    h.cancel.cancel();
}

#[tokio::test]
async fn test_execute_auto_switches_mode() {
    let h = harness(2);
    let swarm = SwarmId::new("research");
    let task = Task::new("use tools")
        .with_complexity(0.6)
        .with_tools(vec![Tool {
            name: "search".to_string(),
            description: "web search".to_string(),
            parameters: serde_json::json!({"type": "object"}),
        }]);

    let result = h.adapter.execute_auto(&swarm, task).await.unwrap();
    assert_eq!(result.content, "tools:use tools");
    assert_eq!(h.controller.get_current_mode(&swarm), Mode::Agent);

    let history = h.controller.get_mode_history(&swarm);
    let last = history.last().unwrap();
    assert_eq!(last.reason, "auto-selected");
    assert_eq!(last.to, Mode::Agent);
    assert!(h
        .scheduler
        .agents(&swarm)
        .iter()
        .all(|agent| agent.mode == Mode::Agent));
    h.cancel.cancel();
}
