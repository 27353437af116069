// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Mode Controller
//!
//! Single source of truth for each swarm's current [`Mode`] and its
//! transition history.
//!
//! Every switch passes through one [`TransitionPolicy`] before any state
//! changes. The default [`PermissiveTransitionPolicy`] accepts everything,
//! including same-mode switches, which still record a transition.
//!
//! Mode state and history sit behind one `RwLock`. A switch holds the write
//! side while it updates the mode, applies the new [`ModeProfile`] to the
//! scheduler and appends history, so history order matches switch order.

use chrono::{DateTime, Utc};
use hivemind_core::domain::events::ModeEvent;
use hivemind_core::domain::identity::SwarmId;
use hivemind_core::domain::mode::{Mode, ModeCapabilities, ModeProfile};
use hivemind_core::domain::task::Task;
use hivemind_core::infrastructure::event_bus::EventBus;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

#[derive(Debug, Clone, thiserror::Error)]
pub enum ModeError {
    #[error("Transition {from} -> {to} rejected: {reason}")]
    InvalidTransition { from: Mode, to: Mode, reason: String },

    #[error("Swarm already registered: {0}")]
    SwarmAlreadyRegistered(SwarmId),
}

/// One recorded mode change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModeTransition {
    pub from: Mode,
    pub to: Mode,
    pub timestamp: DateTime<Utc>,
    pub reason: String,
    pub duration: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModeSwitchOutcome {
    pub previous: Mode,
    pub current: Mode,
    pub duration: Duration,
}

/// Decides whether a swarm may move from one mode to another.
pub trait TransitionPolicy: Send + Sync {
    fn validate(&self, swarm_id: &SwarmId, from: Mode, to: Mode) -> Result<(), ModeError>;
}

/// Accepts every transition.
#[derive(Debug, Default, Clone, Copy)]
pub struct PermissiveTransitionPolicy;

impl TransitionPolicy for PermissiveTransitionPolicy {
    fn validate(&self, _swarm_id: &SwarmId, _from: Mode, _to: Mode) -> Result<(), ModeError> {
        Ok(())
    }
}

/// Receives the profile of a swarm's new mode. Implemented by the scheduler.
pub trait ModeConfigSink: Send + Sync {
    fn apply_profile(&self, swarm_id: &SwarmId, profile: ModeProfile);
}

#[derive(Default)]
struct SwarmModeState {
    current: Mode,
    history: Vec<ModeTransition>,
}

pub struct ModeController {
    registry: RwLock<HashMap<SwarmId, SwarmModeState>>,
    policy: Arc<dyn TransitionPolicy>,
    config_sink: Option<Arc<dyn ModeConfigSink>>,
    event_bus: Option<EventBus>,
}

impl ModeController {
    pub fn new() -> Self {
        Self {
            registry: RwLock::new(HashMap::new()),
            policy: Arc::new(PermissiveTransitionPolicy),
            config_sink: None,
            event_bus: None,
        }
    }

    pub fn with_policy(mut self, policy: Arc<dyn TransitionPolicy>) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_config_sink(mut self, sink: Arc<dyn ModeConfigSink>) -> Self {
        self.config_sink = Some(sink);
        self
    }

    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    /// Starts tracking `swarm_id` in `mode`. Records a transition with reason
    /// "swarm initialized".
    pub fn register_swarm(&self, swarm_id: &SwarmId, mode: Mode) -> Result<(), ModeError> {
        let mut registry = self.registry.write();
        if registry.contains_key(swarm_id) {
            return Err(ModeError::SwarmAlreadyRegistered(swarm_id.clone()));
        }

        if let Some(sink) = &self.config_sink {
            sink.apply_profile(swarm_id, mode.profile());
        }
        registry.insert(
            swarm_id.clone(),
            SwarmModeState {
                current: mode,
                history: vec![ModeTransition {
                    from: mode,
                    to: mode,
                    timestamp: Utc::now(),
                    reason: "swarm initialized".to_string(),
                    duration: Duration::ZERO,
                }],
            },
        );
        debug!(swarm_id = %swarm_id, mode = %mode, "Swarm registered");
        Ok(())
    }

    /// Stops tracking a swarm and hands back its history.
    pub fn remove_swarm(&self, swarm_id: &SwarmId) -> Option<Vec<ModeTransition>> {
        let removed = self.registry.write().remove(swarm_id);
        if removed.is_some() {
            debug!(swarm_id = %swarm_id, "Swarm removed from mode registry");
        }
        removed.map(|state| state.history)
    }

    /// Switches a swarm to `target`. Unknown swarms start from the default mode.
    pub fn switch_mode(
        &self,
        swarm_id: &SwarmId,
        target: Mode,
        reason: &str,
    ) -> Result<ModeSwitchOutcome, ModeError> {
        let started = Instant::now();

        let outcome = {
            let mut registry = self.registry.write();
            let previous = registry
                .get(swarm_id)
                .map(|state| state.current)
                .unwrap_or_default();

            self.policy.validate(swarm_id, previous, target)?;

            let state = registry.entry(swarm_id.clone()).or_default();
            state.current = target;
            if let Some(sink) = &self.config_sink {
                sink.apply_profile(swarm_id, target.profile());
            }

            let duration = started.elapsed();
            state.history.push(ModeTransition {
                from: previous,
                to: target,
                timestamp: Utc::now(),
                reason: reason.to_string(),
                duration,
            });
            ModeSwitchOutcome {
                previous,
                current: target,
                duration,
            }
        };

        metrics::counter!("hivemind_mode_switches_total", "to" => target.as_str()).increment(1);
        info!(
            swarm_id = %swarm_id,
            from = %outcome.previous,
            to = %outcome.current,
            reason,
            duration_us = outcome.duration.as_micros() as u64,
            "Mode switched"
        );
        if let Some(bus) = &self.event_bus {
            bus.publish_mode_event(ModeEvent::ModeSwitched {
                swarm_id: swarm_id.clone(),
                from: outcome.previous,
                to: outcome.current,
                reason: reason.to_string(),
                switched_at: Utc::now(),
            });
        }
        Ok(outcome)
    }

    pub fn get_current_mode(&self, swarm_id: &SwarmId) -> Mode {
        self.registry
            .read()
            .get(swarm_id)
            .map(|state| state.current)
            .unwrap_or_default()
    }

    pub fn get_mode_capabilities(&self, mode: Mode) -> ModeCapabilities {
        mode.capabilities()
    }

    /// Picks a mode from task attributes alone.
    pub fn auto_select_mode(task: &Task) -> Mode {
        if task.requires_vision && task.requires_tools && task.complexity > 0.8 {
            Mode::AgentSwarm
        } else if task.requires_tools && task.complexity > 0.5 {
            Mode::Agent
        } else if task.complexity > 0.3 {
            Mode::Thinking
        } else {
            Mode::Instant
        }
    }

    pub fn get_mode_history(&self, swarm_id: &SwarmId) -> Vec<ModeTransition> {
        self.registry
            .read()
            .get(swarm_id)
            .map(|state| state.history.clone())
            .unwrap_or_default()
    }

    /// Number of recorded transitions into each mode.
    pub fn get_mode_statistics(&self, swarm_id: &SwarmId) -> HashMap<Mode, usize> {
        let mut stats = HashMap::new();
        if let Some(state) = self.registry.read().get(swarm_id) {
            for transition in &state.history {
                *stats.entry(transition.to).or_insert(0) += 1;
            }
        }
        stats
    }

    pub fn registered_swarms(&self) -> Vec<SwarmId> {
        let mut ids: Vec<SwarmId> = self.registry.read().keys().cloned().collect();
        ids.sort();
        ids
    }
}

impl Default for ModeController {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct RecordingSink {
        applied: Mutex<Vec<(SwarmId, ModeProfile)>>,
    }

    impl ModeConfigSink for RecordingSink {
        fn apply_profile(&self, swarm_id: &SwarmId, profile: ModeProfile) {
            self.applied.lock().push((swarm_id.clone(), profile));
        }
    }

    struct NoSwarmMode;

    impl TransitionPolicy for NoSwarmMode {
        fn validate(&self, _swarm_id: &SwarmId, from: Mode, to: Mode) -> Result<(), ModeError> {
            if to == Mode::AgentSwarm {
                return Err(ModeError::InvalidTransition {
                    from,
                    to,
                    reason: "not enough agents".to_string(),
                });
            }
            Ok(())
        }
    }

    #[test]
    fn test_unknown_swarm_defaults_to_instant() {
        let controller = ModeController::new();
        assert_eq!(controller.get_current_mode(&SwarmId::new("ghost")), Mode::Instant);
        assert!(controller.get_mode_history(&SwarmId::new("ghost")).is_empty());
    }

    #[test]
    fn test_same_mode_switch_records_history() {
        let controller = ModeController::new();
        let swarm = SwarmId::new("alpha");
        controller.register_swarm(&swarm, Mode::Instant).unwrap();

        let outcome = controller.switch_mode(&swarm, Mode::Instant, "noop").unwrap();
        assert_eq!(outcome.previous, Mode::Instant);
        assert_eq!(outcome.current, Mode::Instant);

        let history = controller.get_mode_history(&swarm);
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].reason, "noop");
    }

    #[test]
    fn test_switch_applies_profile_to_sink() {
        let sink = Arc::new(RecordingSink::default());
        let controller = ModeController::new().with_config_sink(sink.clone());
        let swarm = SwarmId::new("alpha");
        controller.register_swarm(&swarm, Mode::Instant).unwrap();
        controller.switch_mode(&swarm, Mode::AgentSwarm, "scale out").unwrap();

        let applied = sink.applied.lock();
        assert_eq!(applied.len(), 2);
        assert_eq!(applied[1].1.parallelism_ceiling, 100);
        assert!(applied[1].1.tools_enabled);
        assert_eq!(controller.get_current_mode(&swarm), Mode::AgentSwarm);
    }

    #[test]
    fn test_policy_rejection_leaves_state_untouched() {
        let controller = ModeController::new().with_policy(Arc::new(NoSwarmMode));
        let swarm = SwarmId::new("alpha");
        controller.register_swarm(&swarm, Mode::Agent).unwrap();

        let result = controller.switch_mode(&swarm, Mode::AgentSwarm, "too big");
        assert!(matches!(result, Err(ModeError::InvalidTransition { .. })));
        assert_eq!(controller.get_current_mode(&swarm), Mode::Agent);
        assert_eq!(controller.get_mode_history(&swarm).len(), 1);
    }

    #[test]
    fn test_rejected_switch_does_not_register_unknown_swarm() {
        let controller = ModeController::new().with_policy(Arc::new(NoSwarmMode));
        let swarm = SwarmId::new("fresh");

        let result = controller.switch_mode(&swarm, Mode::AgentSwarm, "too big");
        assert!(matches!(result, Err(ModeError::InvalidTransition { .. })));
        assert!(controller.registered_swarms().is_empty());
        assert!(controller.get_mode_history(&swarm).is_empty());
        controller.register_swarm(&swarm, Mode::Agent).unwrap();
    }

    #[test]
    fn test_auto_select_decision_tree() {
        let swarm_task = Task::new("map the maze")
            .with_vision()
            .with_tools(vec![])
            .with_complexity(0.9);
        assert_eq!(ModeController::auto_select_mode(&swarm_task), Mode::AgentSwarm);

        let tool_task = Task::new("call api").with_tools(vec![]).with_complexity(0.6);
        assert_eq!(ModeController::auto_select_mode(&tool_task), Mode::Agent);

        let deep_task = Task::new("prove it").with_complexity(0.4);
        assert_eq!(ModeController::auto_select_mode(&deep_task), Mode::Thinking);

        let quick_task = Task::new("hello").with_complexity(0.1);
        for _ in 0..10 {
            assert_eq!(ModeController::auto_select_mode(&quick_task), Mode::Instant);
        }
    }

    #[test]
    fn test_statistics_count_transitions_into_mode() {
        let controller = ModeController::new();
        let swarm = SwarmId::new("alpha");
        controller.register_swarm(&swarm, Mode::Instant).unwrap();
        controller.switch_mode(&swarm, Mode::Agent, "a").unwrap();
        controller.switch_mode(&swarm, Mode::Instant, "b").unwrap();
        controller.switch_mode(&swarm, Mode::Agent, "c").unwrap();

        let stats = controller.get_mode_statistics(&swarm);
        assert_eq!(stats.get(&Mode::Agent), Some(&2));
        assert_eq!(stats.get(&Mode::Instant), Some(&2));
        assert_eq!(stats.get(&Mode::Thinking), None);
    }

    #[test]
    fn test_register_twice_and_remove() {
        let controller = ModeController::new();
        let swarm = SwarmId::new("alpha");
        controller.register_swarm(&swarm, Mode::Thinking).unwrap();
        assert!(controller.register_swarm(&swarm, Mode::Instant).is_err());

        let history = controller.remove_swarm(&swarm).unwrap();
        assert_eq!(history[0].reason, "swarm initialized");
        assert_eq!(controller.get_current_mode(&swarm), Mode::Instant);
        assert!(controller.registered_swarms().is_empty());
    }
}
