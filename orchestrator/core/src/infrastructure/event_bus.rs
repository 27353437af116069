// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Event Bus - Pub/Sub for orchestration events
//
// In-memory event streaming over tokio broadcast channels. Events are lost on
// restart; slow receivers observe `Lagged` rather than blocking publishers.

use crate::domain::events::{AgentEvent, CredentialEvent, ModeEvent, TaskEvent};
use crate::domain::identity::SwarmId;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Unified event type for the event bus
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OrchestrationEvent {
    Mode(ModeEvent),
    Task(TaskEvent),
    Agent(AgentEvent),
    Credential(CredentialEvent),
}

impl OrchestrationEvent {
    /// Swarm the event belongs to, when it is swarm-scoped.
    pub fn swarm_id(&self) -> Option<&SwarmId> {
        match self {
            OrchestrationEvent::Mode(event) => Some(event.swarm_id()),
            OrchestrationEvent::Task(event) => Some(event.swarm_id()),
            OrchestrationEvent::Agent(_) | OrchestrationEvent::Credential(_) => None,
        }
    }
}

#[derive(Clone)]
pub struct EventBus {
    sender: Arc<broadcast::Sender<OrchestrationEvent>>,
}

impl EventBus {
    /// Create a new event bus with specified channel capacity.
    /// Capacity is how many events are buffered before the oldest are dropped.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender: Arc::new(sender),
        }
    }

    pub fn with_default_capacity() -> Self {
        Self::new(1000)
    }

    pub fn publish_mode_event(&self, event: ModeEvent) {
        self.publish(OrchestrationEvent::Mode(event));
    }

    pub fn publish_task_event(&self, event: TaskEvent) {
        self.publish(OrchestrationEvent::Task(event));
    }

    pub fn publish_agent_event(&self, event: AgentEvent) {
        self.publish(OrchestrationEvent::Agent(event));
    }

    pub fn publish_credential_event(&self, event: CredentialEvent) {
        self.publish(OrchestrationEvent::Credential(event));
    }

    fn publish(&self, event: OrchestrationEvent) {
        debug!("Publishing event: {:?}", event);

        // send() fails only when nobody is subscribed
        let receiver_count = self.sender.send(event).unwrap_or(0);
        if receiver_count == 0 {
            debug!("No subscribers listening to event");
        }
    }

    pub fn subscribe(&self) -> EventReceiver {
        EventReceiver {
            receiver: self.sender.subscribe(),
        }
    }

    /// Subscribe to mode and task events of a single swarm
    pub fn subscribe_swarm(&self, swarm_id: SwarmId) -> SwarmEventReceiver {
        SwarmEventReceiver {
            receiver: self.sender.subscribe(),
            swarm_id,
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::with_default_capacity()
    }
}

fn map_recv_error(e: broadcast::error::RecvError) -> EventBusError {
    match e {
        broadcast::error::RecvError::Closed => EventBusError::Closed,
        broadcast::error::RecvError::Lagged(n) => {
            warn!("Event receiver lagged by {} events", n);
            EventBusError::Lagged(n)
        }
    }
}

pub struct EventReceiver {
    receiver: broadcast::Receiver<OrchestrationEvent>,
}

impl EventReceiver {
    pub async fn recv(&mut self) -> Result<OrchestrationEvent, EventBusError> {
        self.receiver.recv().await.map_err(map_recv_error)
    }

    pub fn try_recv(&mut self) -> Result<OrchestrationEvent, EventBusError> {
        self.receiver.try_recv().map_err(|e| match e {
            broadcast::error::TryRecvError::Empty => EventBusError::Empty,
            broadcast::error::TryRecvError::Closed => EventBusError::Closed,
            broadcast::error::TryRecvError::Lagged(n) => {
                warn!("Event receiver lagged by {} events", n);
                EventBusError::Lagged(n)
            }
        })
    }
}

/// Receiver filtered to one swarm
pub struct SwarmEventReceiver {
    receiver: broadcast::Receiver<OrchestrationEvent>,
    swarm_id: SwarmId,
}

impl SwarmEventReceiver {
    pub async fn recv(&mut self) -> Result<OrchestrationEvent, EventBusError> {
        loop {
            let event = self.receiver.recv().await.map_err(map_recv_error)?;
            if event.swarm_id() == Some(&self.swarm_id) {
                return Ok(event);
            }
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EventBusError {
    #[error("Event bus is closed")]
    Closed,

    #[error("No events available")]
    Empty,

    #[error("Receiver lagged by {0} events (events were dropped)")]
    Lagged(u64),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::identity::TaskId;
    use crate::domain::mode::Mode;
    use chrono::Utc;

    #[tokio::test]
    async fn test_event_bus_publish_subscribe() {
        let bus = EventBus::new(10);
        let mut receiver = bus.subscribe();

        bus.publish_mode_event(ModeEvent::ModeSwitched {
            swarm_id: SwarmId::new("alpha"),
            from: Mode::Instant,
            to: Mode::Agent,
            reason: "test".to_string(),
            switched_at: Utc::now(),
        });

        match receiver.recv().await.unwrap() {
            OrchestrationEvent::Mode(ModeEvent::ModeSwitched { to, .. }) => {
                assert_eq!(to, Mode::Agent);
            }
            other => panic!("Wrong event type received: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_swarm_event_filtering() {
        let bus = EventBus::new(10);
        let mut receiver = bus.subscribe_swarm(SwarmId::new("alpha"));

        bus.publish_task_event(TaskEvent::TaskRequeued {
            swarm_id: SwarmId::new("beta"),
            task_id: TaskId::new(),
            attempt: 1,
            requeued_at: Utc::now(),
        });
        let task_id = TaskId::new();
        bus.publish_task_event(TaskEvent::TaskRequeued {
            swarm_id: SwarmId::new("alpha"),
            task_id,
            attempt: 1,
            requeued_at: Utc::now(),
        });

        match receiver.recv().await.unwrap() {
            OrchestrationEvent::Task(TaskEvent::TaskRequeued { task_id: id, .. }) => {
                assert_eq!(id, task_id);
            }
            other => panic!("Wrong event type received: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_try_recv_empty() {
        let bus = EventBus::new(4);
        let mut receiver = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 1);
        assert!(matches!(receiver.try_recv(), Err(EventBusError::Empty)));
    }
}
