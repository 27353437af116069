// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Swarm Scheduler
//!
//! Owns every agent and the bounded task queue, and turns queued tasks into
//! agent assignments.
//!
//! ## Message flow
//!
//! ```text
//! submit_task ──try_send──▶ queue ──▶ process_tasks loop ──spawn──▶ worker
//!      ▲                                  ▲      │                    │
//!      │                                  │      └─ requeue (delay) ──┘ (no idle agent)
//!   TaskHandle ◀── reply ──── completion ─┴───────────────────────────┘
//! ```
//!
//! Only the loop mutates agent status after dispatch: a worker never touches
//! agent state, it sends a completion event back. The loop marks the agent
//! idle, records the reward and only then answers the caller, so a caller
//! that sees a result also sees the agent idle again.
//!
//! A worker that is cancelled or panics still reports a failed completion
//! through [`CompletionGuard`]'s `Drop`.

use crate::application::concurrency::AdaptiveConcurrencyController;
use crate::application::mode_controller::ModeConfigSink;
use crate::domain::swarm::{Agent, Swarm, SwarmMetrics};
use async_trait::async_trait;
use chrono::Utc;
use hivemind_core::domain::config::SchedulerConfig;
use hivemind_core::domain::events::{AgentEvent, TaskEvent};
use hivemind_core::domain::identity::{AgentId, SwarmId, TaskId};
use hivemind_core::domain::mode::{Mode, ModeProfile};
use hivemind_core::domain::task::{Task, TaskResult};
use hivemind_core::infrastructure::event_bus::EventBus;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, thiserror::Error)]
pub enum SchedulerError {
    #[error("Task queue is full (capacity {capacity})")]
    QueueFull { capacity: usize },

    #[error("Unknown swarm: {0}")]
    UnknownSwarm(SwarmId),

    #[error("Swarm already exists: {0}")]
    SwarmExists(SwarmId),

    #[error("Swarm {0} still has agents draining from a previous teardown")]
    SwarmDraining(SwarmId),

    #[error("No agent became available in swarm {swarm_id} after {attempts} attempts")]
    NoAgentAvailable { swarm_id: SwarmId, attempts: u32 },

    #[error("Agent {agent_id} failed: {reason}")]
    AgentExecutionFailure {
        agent_id: AgentId,
        reason: String,
        retryable: bool,
    },

    #[error("Task {task_id} on agent {agent_id} timed out after {timeout:?}")]
    Timeout {
        task_id: TaskId,
        agent_id: AgentId,
        timeout: Duration,
    },

    #[error("Scheduler is shutting down")]
    ShuttingDown,
}

impl SchedulerError {
    pub fn is_retryable(&self) -> bool {
        match self {
            SchedulerError::QueueFull { .. }
            | SchedulerError::NoAgentAvailable { .. }
            | SchedulerError::Timeout { .. } => true,
            SchedulerError::AgentExecutionFailure { retryable, .. } => *retryable,
            _ => false,
        }
    }
}

/// Failure reported by a [`TaskExecutor`].
#[derive(Debug, Clone, thiserror::Error)]
#[error("{reason}")]
pub struct ExecutionFailure {
    pub reason: String,
    pub retryable: bool,
}

impl ExecutionFailure {
    pub fn new(reason: impl Into<String>, retryable: bool) -> Self {
        Self {
            reason: reason.into(),
            retryable,
        }
    }
}

/// Performs the work of one task on one agent.
///
/// `agent` is a snapshot taken at dispatch; it is already marked busy.
#[async_trait]
pub trait TaskExecutor: Send + Sync {
    async fn execute(&self, agent: &Agent, task: &Task) -> Result<TaskResult, ExecutionFailure>;
}

type Reply = oneshot::Sender<Result<TaskResult, SchedulerError>>;

/// Awaitable result of a submitted task.
#[derive(Debug)]
pub struct TaskHandle {
    task_id: TaskId,
    receiver: oneshot::Receiver<Result<TaskResult, SchedulerError>>,
}

impl TaskHandle {
    pub fn task_id(&self) -> TaskId {
        self.task_id
    }

    pub async fn wait(self) -> Result<TaskResult, SchedulerError> {
        self.receiver
            .await
            .unwrap_or(Err(SchedulerError::ShuttingDown))
    }
}

struct QueuedTask {
    swarm_id: SwarmId,
    task: Task,
    attempts: u32,
    reply: Reply,
}

struct Completion {
    swarm_id: SwarmId,
    agent_id: AgentId,
    task_id: TaskId,
    latency: Duration,
    outcome: Result<TaskResult, SchedulerError>,
    reply: Reply,
}

/// Sends the completion exactly once, including when the worker is dropped
/// before finishing.
struct CompletionGuard {
    sender: mpsc::UnboundedSender<Completion>,
    started: Instant,
    pending: Option<Completion>,
}

impl CompletionGuard {
    fn finish(mut self, outcome: Result<TaskResult, SchedulerError>) {
        if let Some(mut completion) = self.pending.take() {
            completion.outcome = outcome;
            completion.latency = self.started.elapsed();
            let _ = self.sender.send(completion);
        }
    }
}

impl Drop for CompletionGuard {
    fn drop(&mut self) {
        if let Some(mut completion) = self.pending.take() {
            completion.latency = self.started.elapsed();
            let _ = self.sender.send(completion);
        }
    }
}

struct SwarmEntry {
    swarm: Swarm,
    pending: usize,
    completed: u64,
    failed: u64,
    total_latency_ms: u64,
}

#[derive(Default)]
struct SchedulerState {
    swarms: HashMap<SwarmId, SwarmEntry>,
    agents: HashMap<AgentId, Agent>,
    busy: usize,
}

pub struct SwarmScheduler {
    config: SchedulerConfig,
    state: Mutex<SchedulerState>,
    queue_tx: mpsc::Sender<QueuedTask>,
    queue_rx: Mutex<Option<mpsc::Receiver<QueuedTask>>>,
    completion_tx: mpsc::UnboundedSender<Completion>,
    completion_rx: Mutex<Option<mpsc::UnboundedReceiver<Completion>>>,
    pending: AtomicUsize,
    executor: Arc<dyn TaskExecutor>,
    concurrency: Arc<AdaptiveConcurrencyController>,
    event_bus: Option<EventBus>,
}

impl SwarmScheduler {
    pub fn new(
        config: SchedulerConfig,
        executor: Arc<dyn TaskExecutor>,
        concurrency: Arc<AdaptiveConcurrencyController>,
    ) -> Self {
        let (queue_tx, queue_rx) = mpsc::channel(config.queue_capacity.max(1));
        let (completion_tx, completion_rx) = mpsc::unbounded_channel();
        Self {
            config,
            state: Mutex::new(SchedulerState::default()),
            queue_tx,
            queue_rx: Mutex::new(Some(queue_rx)),
            completion_tx,
            completion_rx: Mutex::new(Some(completion_rx)),
            pending: AtomicUsize::new(0),
            executor,
            concurrency,
            event_bus: None,
        }
    }

    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    /// Creates `agent_count` idle agents tagged with `mode`. Fails with
    /// `SwarmDraining` while a torn-down swarm of the same id still has busy
    /// agents, since the new agents would reuse their slot ids.
    pub fn initialize_swarm(
        &self,
        swarm_id: SwarmId,
        agent_count: usize,
        mode: Mode,
    ) -> Result<(), SchedulerError> {
        let mut state = self.state.lock();
        if state.swarms.contains_key(&swarm_id) {
            return Err(SchedulerError::SwarmExists(swarm_id));
        }
        if state.agents.values().any(|agent| agent.swarm_id == swarm_id) {
            return Err(SchedulerError::SwarmDraining(swarm_id));
        }

        let (swarm, agents) = Swarm::initialize(swarm_id.clone(), agent_count, mode);
        for agent in agents {
            state.agents.insert(agent.id.clone(), agent);
        }
        state.swarms.insert(
            swarm_id.clone(),
            SwarmEntry {
                swarm,
                pending: 0,
                completed: 0,
                failed: 0,
                total_latency_ms: 0,
            },
        );
        info!(swarm_id = %swarm_id, agents = agent_count, mode = %mode, "Swarm initialized");
        Ok(())
    }

    /// Removes a swarm. Idle agents go immediately; busy agents go when their
    /// task completes. Tasks still queued for the swarm fail with `UnknownSwarm`.
    pub fn teardown_swarm(&self, swarm_id: &SwarmId) -> Result<usize, SchedulerError> {
        let mut state = self.state.lock();
        let entry = state
            .swarms
            .remove(swarm_id)
            .ok_or_else(|| SchedulerError::UnknownSwarm(swarm_id.clone()))?;

        let mut removed = 0;
        for agent_id in &entry.swarm.agents {
            let busy = state.agents.get(agent_id).is_some_and(Agent::is_busy);
            if !busy && state.agents.remove(agent_id).is_some() {
                removed += 1;
            }
        }
        info!(
            swarm_id = %swarm_id,
            removed,
            draining = entry.swarm.agents.len() - removed,
            "Swarm torn down"
        );
        Ok(removed)
    }

    /// Enqueues a task without blocking. A full queue fails with `QueueFull`.
    pub fn submit_task(&self, swarm_id: &SwarmId, task: Task) -> Result<TaskHandle, SchedulerError> {
        let task_id = task.id;
        {
            let mut state = self.state.lock();
            let entry = state
                .swarms
                .get_mut(swarm_id)
                .ok_or_else(|| SchedulerError::UnknownSwarm(swarm_id.clone()))?;
            entry.pending += 1;
        }

        let (reply, receiver) = oneshot::channel();
        let queued = QueuedTask {
            swarm_id: swarm_id.clone(),
            task,
            attempts: 0,
            reply,
        };

        // counted before the send so the loop never decrements first
        self.pending.fetch_add(1, Ordering::SeqCst);
        match self.queue_tx.try_send(queued) {
            Ok(()) => {
                metrics::counter!("hivemind_tasks_submitted_total").increment(1);
                debug!(swarm_id = %swarm_id, task_id = %task_id, "Task queued");
                Ok(TaskHandle { task_id, receiver })
            }
            Err(err) => {
                self.release_pending(swarm_id);
                self.pending.fetch_sub(1, Ordering::SeqCst);
                match err {
                    mpsc::error::TrySendError::Full(_) => {
                        warn!(swarm_id = %swarm_id, capacity = self.config.queue_capacity, "Task queue full");
                        Err(SchedulerError::QueueFull {
                            capacity: self.config.queue_capacity,
                        })
                    }
                    mpsc::error::TrySendError::Closed(_) => Err(SchedulerError::ShuttingDown),
                }
            }
        }
    }

    /// Runs the scheduling loop until `cancel` fires. Only one loop may run per
    /// scheduler; a second call returns immediately.
    pub async fn process_tasks(self: Arc<Self>, cancel: CancellationToken) {
        let queue_rx = self.queue_rx.lock().take();
        let completion_rx = self.completion_rx.lock().take();
        let (Some(mut queue_rx), Some(mut completion_rx)) = (queue_rx, completion_rx) else {
            warn!("Scheduling loop already running");
            return;
        };

        info!(queue_capacity = self.config.queue_capacity, "Scheduling loop started");
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                Some(completion) = completion_rx.recv() => self.handle_completion(completion),
                queued = queue_rx.recv() => match queued {
                    Some(queued) => self.dispatch(queued),
                    None => break,
                },
            }
        }

        queue_rx.close();
        while let Ok(queued) = queue_rx.try_recv() {
            self.release_pending(&queued.swarm_id);
            self.pending.fetch_sub(1, Ordering::SeqCst);
            let _ = queued.reply.send(Err(SchedulerError::ShuttingDown));
        }
        info!("Scheduling loop stopped");
    }

    /// Spawns [`Self::process_tasks`] on the current runtime.
    pub fn spawn(self: &Arc<Self>, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(Arc::clone(self).process_tasks(cancel))
    }

    fn dispatch(self: &Arc<Self>, queued: QueuedTask) {
        let limit = self.concurrency.recommended_parallelism();
        let assignment = {
            let mut state = self.state.lock();
            if !state.swarms.contains_key(&queued.swarm_id) {
                drop(state);
                self.pending.fetch_sub(1, Ordering::SeqCst);
                warn!(swarm_id = %queued.swarm_id, task_id = %queued.task.id, "Dropping task for unknown swarm");
                let _ = queued
                    .reply
                    .send(Err(SchedulerError::UnknownSwarm(queued.swarm_id)));
                return;
            }

            let candidate = if state.busy < limit {
                let view = &*state;
                view.swarms.get(&queued.swarm_id).and_then(|entry| {
                    entry
                        .swarm
                        .agents
                        .iter()
                        .find(|id| view.agents.get(*id).is_some_and(Agent::is_idle))
                        .cloned()
                })
            } else {
                None
            };

            match candidate {
                Some(agent_id) => {
                    let snapshot = match state.agents.get_mut(&agent_id) {
                        Some(agent) => match agent.assign() {
                            Ok(()) => Some(agent.clone()),
                            Err(e) => {
                                error!(error = %e, "Idle agent refused assignment");
                                None
                            }
                        },
                        None => None,
                    };
                    if snapshot.is_some() {
                        state.busy += 1;
                        if let Some(entry) = state.swarms.get_mut(&queued.swarm_id) {
                            entry.pending = entry.pending.saturating_sub(1);
                        }
                    }
                    snapshot
                }
                None => None,
            }
        };

        match assignment {
            Some(agent) => {
                self.pending.fetch_sub(1, Ordering::SeqCst);
                self.start_worker(agent, queued);
            }
            None => self.requeue(queued),
        }
    }

    fn start_worker(self: &Arc<Self>, agent: Agent, queued: QueuedTask) {
        let QueuedTask {
            swarm_id,
            task,
            reply,
            ..
        } = queued;

        debug!(swarm_id = %swarm_id, task_id = %task.id, agent_id = %agent.id, "Task dispatched");
        self.publish_task(TaskEvent::TaskDispatched {
            swarm_id: swarm_id.clone(),
            task_id: task.id,
            agent_id: agent.id.clone(),
            dispatched_at: Utc::now(),
        });

        let timeout = Duration::from_secs(self.config.task_timeout_secs);
        let guard = CompletionGuard {
            sender: self.completion_tx.clone(),
            started: Instant::now(),
            pending: Some(Completion {
                swarm_id,
                agent_id: agent.id.clone(),
                task_id: task.id,
                latency: Duration::ZERO,
                outcome: Err(SchedulerError::AgentExecutionFailure {
                    agent_id: agent.id.clone(),
                    reason: "worker aborted before completion".to_string(),
                    retryable: true,
                }),
                reply,
            }),
        };
        let executor = Arc::clone(&self.executor);

        tokio::spawn(async move {
            let outcome = match tokio::time::timeout(timeout, executor.execute(&agent, &task)).await {
                Ok(Ok(result)) => Ok(result),
                Ok(Err(failure)) => Err(SchedulerError::AgentExecutionFailure {
                    agent_id: agent.id.clone(),
                    reason: failure.reason,
                    retryable: failure.retryable,
                }),
                Err(_) => Err(SchedulerError::Timeout {
                    task_id: task.id,
                    agent_id: agent.id.clone(),
                    timeout,
                }),
            };
            guard.finish(outcome);
        });
    }

    fn requeue(self: &Arc<Self>, mut queued: QueuedTask) {
        queued.attempts += 1;
        if queued.attempts > self.config.max_requeue_attempts {
            self.release_pending(&queued.swarm_id);
            self.pending.fetch_sub(1, Ordering::SeqCst);
            warn!(
                swarm_id = %queued.swarm_id,
                task_id = %queued.task.id,
                attempts = queued.attempts - 1,
                "No agent became available"
            );
            self.publish_task(TaskEvent::TaskFailed {
                swarm_id: queued.swarm_id.clone(),
                task_id: queued.task.id,
                agent_id: None,
                reason: "no agent available".to_string(),
                failed_at: Utc::now(),
            });
            let _ = queued.reply.send(Err(SchedulerError::NoAgentAvailable {
                swarm_id: queued.swarm_id,
                attempts: queued.attempts - 1,
            }));
            return;
        }

        metrics::counter!("hivemind_tasks_requeued_total").increment(1);
        debug!(
            swarm_id = %queued.swarm_id,
            task_id = %queued.task.id,
            attempt = queued.attempts,
            "No idle agent, requeueing"
        );
        self.publish_task(TaskEvent::TaskRequeued {
            swarm_id: queued.swarm_id.clone(),
            task_id: queued.task.id,
            attempt: queued.attempts,
            requeued_at: Utc::now(),
        });

        let delay = Duration::from_millis(self.config.requeue_delay_ms);
        let queue_tx = self.queue_tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            // dropping the task on a closed queue drops its reply: the caller sees ShuttingDown
            let _ = queue_tx.send(queued).await;
        });
    }

    fn handle_completion(&self, completion: Completion) {
        let Completion {
            swarm_id,
            agent_id,
            task_id,
            latency,
            outcome,
            reply,
        } = completion;
        let latency_ms = latency.as_millis() as u64;
        let succeeded = outcome.is_ok();

        let mut recovered = false;
        {
            let mut state = self.state.lock();
            state.busy = state.busy.saturating_sub(1);

            let swarm_alive = state.swarms.contains_key(&swarm_id);
            if let Some(agent) = state.agents.get_mut(&agent_id) {
                let released = if succeeded {
                    agent.complete()
                } else {
                    agent.fail().and_then(|_| {
                        recovered = true;
                        agent.recover()
                    })
                };
                if let Err(e) = released {
                    error!(error = %e, "Agent status out of sync");
                }
            }
            if !swarm_alive {
                state.agents.remove(&agent_id);
            }

            if let Some(entry) = state.swarms.get_mut(&swarm_id) {
                if succeeded {
                    entry.completed += 1;
                    entry.total_latency_ms += latency_ms;
                } else {
                    entry.failed += 1;
                }
            }
        }

        self.concurrency
            .record_reward(if succeeded { 1.0 } else { 0.0 });
        let label = if succeeded { "success" } else { "failure" };
        metrics::counter!("hivemind_tasks_completed_total", "outcome" => label).increment(1);
        metrics::histogram!("hivemind_task_latency_ms").record(latency_ms as f64);

        match &outcome {
            Ok(_) => {
                debug!(swarm_id = %swarm_id, task_id = %task_id, agent_id = %agent_id, latency_ms, "Task completed");
                self.publish_task(TaskEvent::TaskCompleted {
                    swarm_id,
                    task_id,
                    agent_id,
                    latency_ms,
                    completed_at: Utc::now(),
                });
            }
            Err(e) => {
                warn!(swarm_id = %swarm_id, task_id = %task_id, agent_id = %agent_id, error = %e, "Task failed");
                if let Some(bus) = &self.event_bus {
                    bus.publish_agent_event(AgentEvent::AgentFailed {
                        agent_id: agent_id.clone(),
                        reason: e.to_string(),
                        failed_at: Utc::now(),
                    });
                    if recovered {
                        bus.publish_agent_event(AgentEvent::AgentRecovered {
                            agent_id: agent_id.clone(),
                            recovered_at: Utc::now(),
                        });
                    }
                }
                self.publish_task(TaskEvent::TaskFailed {
                    swarm_id,
                    task_id,
                    agent_id: Some(agent_id),
                    reason: e.to_string(),
                    failed_at: Utc::now(),
                });
            }
        }

        // the caller may have dropped its handle
        let _ = reply.send(outcome);
    }

    /// Updates a swarm's profile and retags its agents with the profile's mode.
    pub fn apply_mode_profile(
        &self,
        swarm_id: &SwarmId,
        profile: ModeProfile,
    ) -> Result<(), SchedulerError> {
        let mut state = self.state.lock();
        let agent_ids = {
            let entry = state
                .swarms
                .get_mut(swarm_id)
                .ok_or_else(|| SchedulerError::UnknownSwarm(swarm_id.clone()))?;
            entry.swarm.profile = profile;
            entry.swarm.agents.clone()
        };
        for agent_id in &agent_ids {
            if let Some(agent) = state.agents.get_mut(agent_id) {
                agent.mode = profile.mode;
            }
        }
        debug!(
            swarm_id = %swarm_id,
            mode = %profile.mode,
            parallelism_ceiling = profile.parallelism_ceiling,
            tools_enabled = profile.tools_enabled,
            "Mode profile applied"
        );
        Ok(())
    }

    pub fn swarm_profile(&self, swarm_id: &SwarmId) -> Option<ModeProfile> {
        self.state
            .lock()
            .swarms
            .get(swarm_id)
            .map(|entry| entry.swarm.profile)
    }

    /// Snapshot derived from current agent statuses, queue depth and the
    /// concurrency recommendation.
    pub fn get_swarm_metrics(&self, swarm_id: &SwarmId) -> Result<SwarmMetrics, SchedulerError> {
        let parallelism = self.concurrency.recommended_parallelism();
        let state = self.state.lock();
        let entry = state
            .swarms
            .get(swarm_id)
            .ok_or_else(|| SchedulerError::UnknownSwarm(swarm_id.clone()))?;

        let total_agents = entry.swarm.agents.len();
        let active_agents = entry
            .swarm
            .agents
            .iter()
            .filter(|id| state.agents.get(*id).is_some_and(Agent::is_busy))
            .count();

        Ok(SwarmMetrics {
            swarm_id: swarm_id.clone(),
            mode: entry.swarm.profile.mode,
            active_agents,
            pending_tasks: entry.pending,
            parallelism,
            total_agents,
            completed_tasks: entry.completed,
            failed_tasks: entry.failed,
            avg_latency_ms: if entry.completed > 0 {
                entry.total_latency_ms as f64 / entry.completed as f64
            } else {
                0.0
            },
            resource_utilization: if total_agents > 0 {
                active_agents as f64 / total_agents as f64
            } else {
                0.0
            },
        })
    }

    pub fn agents(&self, swarm_id: &SwarmId) -> Vec<Agent> {
        let state = self.state.lock();
        state
            .swarms
            .get(swarm_id)
            .map(|entry| {
                entry
                    .swarm
                    .agents
                    .iter()
                    .filter_map(|id| state.agents.get(id).cloned())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn swarm_ids(&self) -> Vec<SwarmId> {
        let mut ids: Vec<SwarmId> = self.state.lock().swarms.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Tasks accepted but not yet dispatched, across all swarms.
    pub fn pending_tasks(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    fn release_pending(&self, swarm_id: &SwarmId) {
        if let Some(entry) = self.state.lock().swarms.get_mut(swarm_id) {
            entry.pending = entry.pending.saturating_sub(1);
        }
    }

    fn publish_task(&self, event: TaskEvent) {
        if let Some(bus) = &self.event_bus {
            bus.publish_task_event(event);
        }
    }
}

impl ModeConfigSink for SwarmScheduler {
    fn apply_profile(&self, swarm_id: &SwarmId, profile: ModeProfile) {
        if let Err(e) = self.apply_mode_profile(swarm_id, profile) {
            debug!(swarm_id = %swarm_id, error = %e, "Mode profile not applied");
        }
    }
}
