// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use async_trait::async_trait;
use hivemind_core::domain::config::{ConcurrencyConfig, SchedulerConfig};
use hivemind_core::domain::events::TaskEvent;
use hivemind_core::domain::identity::{SwarmId, TaskId};
use hivemind_core::domain::mode::Mode;
use hivemind_core::domain::task::{Task, TaskResult};
use hivemind_core::infrastructure::event_bus::{EventBus, OrchestrationEvent};
use hivemind_swarm::application::concurrency::AdaptiveConcurrencyController;
use hivemind_swarm::application::scheduler::{
    ExecutionFailure, SchedulerError, SwarmScheduler, TaskExecutor,
};
use hivemind_swarm::domain::swarm::Agent;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Semaphore};
use tokio_util::sync::CancellationToken;

/// Reports each start and then blocks until the test hands out a permit.
struct GatedExecutor {
    started: mpsc::UnboundedSender<TaskId>,
    gate: Arc<Semaphore>,
}

#[async_trait]
impl TaskExecutor for GatedExecutor {
    async fn execute(&self, agent: &Agent, task: &Task) -> Result<TaskResult, ExecutionFailure> {
        let _ = self.started.send(task.id);
        let permit = self
            .gate
            .acquire()
            .await
            .map_err(|e| ExecutionFailure::new(e.to_string(), false))?;
        permit.forget();
        Ok(TaskResult::new(task.id, format!("done by {}", agent.id)))
    }
}

fn scheduler_config() -> SchedulerConfig {
    SchedulerConfig {
        queue_capacity: 8,
        requeue_delay_ms: 10,
        max_requeue_attempts: 500,
        task_timeout_secs: 10,
    }
}

fn gated_scheduler() -> (
    Arc<SwarmScheduler>,
    mpsc::UnboundedReceiver<TaskId>,
    Arc<Semaphore>,
) {
    let (started_tx, started_rx) = mpsc::unbounded_channel();
    let gate = Arc::new(Semaphore::new(0));
    let executor = GatedExecutor {
        started: started_tx,
        gate: gate.clone(),
    };
    let scheduler = Arc::new(SwarmScheduler::new(
        scheduler_config(),
        Arc::new(executor),
        Arc::new(AdaptiveConcurrencyController::new(ConcurrencyConfig::default())),
    ));
    (scheduler, started_rx, gate)
}

async fn next_start(started: &mut mpsc::UnboundedReceiver<TaskId>) -> TaskId {
    tokio::time::timeout(Duration::from_secs(2), started.recv())
        .await
        .expect("executor did not start in time")
        .expect("executor channel closed")
}

#[tokio::test]
async fn test_three_tasks_on_two_agents() {
    let (scheduler, mut started, gate) = gated_scheduler();
    let swarm = SwarmId::new("fast");
    scheduler
        .initialize_swarm(swarm.clone(), 2, Mode::Instant)
        .unwrap();
    let cancel = CancellationToken::new();
    let loop_handle = scheduler.spawn(cancel.clone());

    let handles: Vec<_> = (0..3)
        .map(|i| {
            scheduler
                .submit_task(&swarm, Task::new(format!("task {}", i)))
                .unwrap()
        })
        .collect();

    next_start(&mut started).await;
    next_start(&mut started).await;

    // two agents busy, the third task waits
    let metrics = scheduler.get_swarm_metrics(&swarm).unwrap();
    assert_eq!(metrics.active_agents, 2);
    assert_eq!(metrics.pending_tasks, 1);
    assert!(tokio::time::timeout(Duration::from_millis(50), started.recv())
        .await
        .is_err());

    gate.add_permits(1);
    next_start(&mut started).await;
    gate.add_permits(2);

    for handle in handles {
        let result = tokio::time::timeout(Duration::from_secs(2), handle.wait())
            .await
            .unwrap()
            .unwrap();
        assert!(result.content.starts_with("done by fast-agent-"));
    }

    let metrics = scheduler.get_swarm_metrics(&swarm).unwrap();
    assert_eq!(metrics.pending_tasks, 0);
    assert_eq!(metrics.active_agents, 0);
    assert_eq!(metrics.completed_tasks, 3);
    assert_eq!(metrics.resource_utilization, 0.0);
    assert!(scheduler.agents(&swarm).iter().all(Agent::is_idle));

    cancel.cancel();
    loop_handle.await.unwrap();
}

#[tokio::test]
async fn test_full_queue_rejects_without_blocking() {
    let (scheduler, _started, _gate) = gated_scheduler();
    let swarm = SwarmId::new("fast");
    scheduler
        .initialize_swarm(swarm.clone(), 1, Mode::Instant)
        .unwrap();

    // no loop running: nothing drains the queue
    let mut accepted = Vec::new();
    for i in 0..8 {
        accepted.push(
            scheduler
                .submit_task(&swarm, Task::new(format!("task {}", i)))
                .unwrap(),
        );
    }

    let overflow = tokio::time::timeout(Duration::from_millis(100), async {
        scheduler.submit_task(&swarm, Task::new("overflow"))
    })
    .await
    .expect("submit_task blocked on a full queue");
    assert!(matches!(
        overflow,
        Err(SchedulerError::QueueFull { capacity: 8 })
    ));
    assert!(overflow.unwrap_err().is_retryable());

    assert_eq!(scheduler.pending_tasks(), 8);
    assert_eq!(scheduler.get_swarm_metrics(&swarm).unwrap().pending_tasks, 8);
}

#[tokio::test]
async fn test_task_events_published() {
    let bus = EventBus::new(64);
    let mut receiver = bus.subscribe_swarm(SwarmId::new("observed"));
    let (started_tx, _started_rx) = mpsc::unbounded_channel();
    let gate = Arc::new(Semaphore::new(10));
    let scheduler = Arc::new(
        SwarmScheduler::new(
            scheduler_config(),
            Arc::new(GatedExecutor {
                started: started_tx,
                gate,
            }),
            Arc::new(AdaptiveConcurrencyController::default()),
        )
        .with_event_bus(bus.clone()),
    );
    let swarm = SwarmId::new("observed");
    scheduler
        .initialize_swarm(swarm.clone(), 1, Mode::Instant)
        .unwrap();
    let cancel = CancellationToken::new();
    scheduler.spawn(cancel.clone());

    let task = Task::new("watch me");
    let task_id = task.id;
    scheduler.submit_task(&swarm, task).unwrap().wait().await.unwrap();

    let mut dispatched = false;
    let mut completed = false;
    while !(dispatched && completed) {
        let event = tokio::time::timeout(Duration::from_secs(1), receiver.recv())
            .await
            .unwrap()
            .unwrap();
        match event {
            OrchestrationEvent::Task(TaskEvent::TaskDispatched { task_id: id, .. }) => {
                assert_eq!(id, task_id);
                dispatched = true;
            }
            OrchestrationEvent::Task(TaskEvent::TaskCompleted { task_id: id, .. }) => {
                assert!(dispatched);
                assert_eq!(id, task_id);
                completed = true;
            }
            _ => {}
        }
    }
    cancel.cancel();
}

#[tokio::test]
async fn test_teardown_drains_busy_agents() {
    let (scheduler, mut started, gate) = gated_scheduler();
    let swarm = SwarmId::new("short-lived");
    scheduler
        .initialize_swarm(swarm.clone(), 2, Mode::Instant)
        .unwrap();
    let cancel = CancellationToken::new();
    scheduler.spawn(cancel.clone());

    let handle = scheduler.submit_task(&swarm, Task::new("in flight")).unwrap();
    next_start(&mut started).await;

    // the idle agent goes now, the busy one after its task
    assert_eq!(scheduler.teardown_swarm(&swarm).unwrap(), 1);
    assert!(scheduler.get_swarm_metrics(&swarm).is_err());
    assert!(matches!(
        scheduler.initialize_swarm(swarm.clone(), 1, Mode::Agent),
        Err(SchedulerError::SwarmDraining(_))
    ));

    gate.add_permits(1);
    assert!(handle.wait().await.is_ok());

    // the slot name is free again
    scheduler
        .initialize_swarm(swarm.clone(), 1, Mode::Agent)
        .unwrap();
    assert_eq!(scheduler.agents(&swarm).len(), 1);
    cancel.cancel();
}

#[tokio::test]
async fn test_reinitialized_swarm_never_shares_an_agent_with_drained_work() {
    let (scheduler, mut started, gate) = gated_scheduler();
    let swarm = SwarmId::new("recycled");
    scheduler
        .initialize_swarm(swarm.clone(), 1, Mode::Instant)
        .unwrap();
    let cancel = CancellationToken::new();
    scheduler.spawn(cancel.clone());

    let first = scheduler.submit_task(&swarm, Task::new("old generation")).unwrap();
    next_start(&mut started).await;
    assert_eq!(scheduler.teardown_swarm(&swarm).unwrap(), 0);

    // the busy slot still belongs to the old generation
    assert!(scheduler
        .initialize_swarm(swarm.clone(), 1, Mode::Instant)
        .is_err());
    assert!(matches!(
        scheduler.submit_task(&swarm, Task::new("too early")),
        Err(SchedulerError::UnknownSwarm(_))
    ));

    gate.add_permits(1);
    assert!(first.wait().await.is_ok());

    scheduler
        .initialize_swarm(swarm.clone(), 1, Mode::Instant)
        .unwrap();
    let second = scheduler.submit_task(&swarm, Task::new("new generation")).unwrap();
    let third = scheduler.submit_task(&swarm, Task::new("queued behind")).unwrap();
    next_start(&mut started).await;

    // one agent means one task in flight
    assert!(
        tokio::time::timeout(Duration::from_millis(100), started.recv())
            .await
            .is_err()
    );
    let busy: Vec<_> = scheduler
        .agents(&swarm)
        .into_iter()
        .filter(|agent| agent.is_busy())
        .collect();
    assert_eq!(busy.len(), 1);

    gate.add_permits(2);
    assert!(second.wait().await.is_ok());
    assert!(third.wait().await.is_ok());
    cancel.cancel();
}
