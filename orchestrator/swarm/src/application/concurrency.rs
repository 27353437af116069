// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Adaptive Concurrency Controller
//!
//! Turns a stream of task-outcome rewards into one recommended parallelism
//! level for the scheduler.
//!
//! Rewards live in a fixed-capacity ring buffer; the oldest sample is
//! overwritten once the buffer is full. The recommendation is
//! `max_parallel_steps / 10`, scaled by `scale_up_multiplier` when the mean of
//! the most recent `recent_window` samples exceeds
//! `high_confidence_threshold`. Consistently good outcomes therefore never
//! yield a lower recommendation than consistently poor ones.
//!
//! Reads and writes take independent sides of one `RwLock`; a reader may see
//! a recommendation that predates the very latest sample.

use hivemind_core::domain::config::ConcurrencyConfig;
use parking_lot::RwLock;
use tracing::trace;

pub struct AdaptiveConcurrencyController {
    config: ConcurrencyConfig,
    history: RwLock<RewardHistory>,
}

/// Ring buffer of reward samples plus the derived learning rate.
struct RewardHistory {
    samples: Vec<f64>,
    head: usize,
    len: usize,
    sum: f64,
    learning_rate: f64,
}

impl RewardHistory {
    fn with_capacity(capacity: usize, learning_rate: f64) -> Self {
        Self {
            samples: vec![0.0; capacity.max(1)],
            head: 0,
            len: 0,
            sum: 0.0,
            learning_rate,
        }
    }

    fn capacity(&self) -> usize {
        self.samples.len()
    }

    fn push(&mut self, value: f64) {
        let capacity = self.capacity();
        if self.len < capacity {
            let slot = (self.head + self.len) % capacity;
            self.samples[slot] = value;
            self.len += 1;
        } else {
            // full: the slot at head holds the oldest sample
            self.sum -= self.samples[self.head];
            self.samples[self.head] = value;
            self.head = (self.head + 1) % capacity;
        }
        self.sum += value;
    }

    fn mean(&self) -> Option<f64> {
        (self.len > 0).then(|| self.sum / self.len as f64)
    }

    /// Mean of the newest `window` samples, if that many exist.
    fn recent_mean(&self, window: usize) -> Option<f64> {
        if window == 0 || self.len < window {
            return None;
        }
        let capacity = self.capacity();
        let start = self.head + self.len - window;
        let total: f64 = (0..window)
            .map(|i| self.samples[(start + i) % capacity])
            .sum();
        Some(total / window as f64)
    }
}

impl AdaptiveConcurrencyController {
    pub fn new(config: ConcurrencyConfig) -> Self {
        let history = RewardHistory::with_capacity(config.capacity, config.base_learning_rate);
        Self {
            config,
            history: RwLock::new(history),
        }
    }

    /// Appends one reward sample. Values are clamped to `[0, 1]`; NaN is dropped.
    pub fn record_reward(&self, reward: f64) {
        if reward.is_nan() {
            return;
        }
        let reward = reward.clamp(0.0, 1.0);

        let recommendation = {
            let mut history = self.history.write();
            history.push(reward);
            if history.len > self.config.learning_rate_min_samples {
                if let Some(mean) = history.mean() {
                    history.learning_rate = self.config.base_learning_rate * (1.0 + mean);
                }
            }
            self.recommend(&history)
        };

        metrics::gauge!("hivemind_parallelism_recommendation").set(recommendation as f64);
        trace!(reward, recommendation, "Reward recorded");
    }

    /// Recommended number of concurrently busy agents.
    pub fn recommended_parallelism(&self) -> usize {
        self.recommend(&self.history.read())
    }

    pub fn learning_rate(&self) -> f64 {
        self.history.read().learning_rate
    }

    pub fn sample_count(&self) -> usize {
        self.history.read().len
    }

    pub fn recent_mean(&self) -> Option<f64> {
        self.history.read().recent_mean(self.config.recent_window)
    }

    fn recommend(&self, history: &RewardHistory) -> usize {
        let base = (self.config.max_parallel_steps / 10).max(1);
        match history.recent_mean(self.config.recent_window) {
            Some(mean) if mean > self.config.high_confidence_threshold => {
                (base as f64 * self.config.scale_up_multiplier) as usize
            }
            _ => base,
        }
    }
}

impl Default for AdaptiveConcurrencyController {
    fn default() -> Self {
        Self::new(ConcurrencyConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn controller_with_capacity(capacity: usize) -> AdaptiveConcurrencyController {
        AdaptiveConcurrencyController::new(ConcurrencyConfig {
            capacity,
            ..ConcurrencyConfig::default()
        })
    }

    #[test]
    fn test_base_recommendation_without_history() {
        let controller = AdaptiveConcurrencyController::default();
        assert_eq!(controller.recommended_parallelism(), 150);
        assert_eq!(controller.recent_mean(), None);
    }

    #[test]
    fn test_sustained_success_scales_up() {
        let controller = AdaptiveConcurrencyController::default();
        for _ in 0..50 {
            controller.record_reward(1.0);
        }
        assert_eq!(controller.recommended_parallelism(), 225);
    }

    #[test]
    fn test_monotonic_responsiveness() {
        let good = AdaptiveConcurrencyController::default();
        let poor = AdaptiveConcurrencyController::default();
        for i in 0..200 {
            good.record_reward(0.9 + (i % 10) as f64 * 0.01);
            poor.record_reward((i % 10) as f64 * 0.01);
        }
        assert!(good.recommended_parallelism() >= poor.recommended_parallelism());
    }

    #[test]
    fn test_ring_buffer_evicts_oldest() {
        let controller = controller_with_capacity(60);
        for _ in 0..60 {
            controller.record_reward(0.0);
        }
        assert_eq!(controller.recommended_parallelism(), 150);

        // 50 fresh successes push the recent window above threshold
        for _ in 0..50 {
            controller.record_reward(1.0);
        }
        assert_eq!(controller.sample_count(), 60);
        assert_eq!(controller.recent_mean(), Some(1.0));
        assert_eq!(controller.recommended_parallelism(), 225);
    }

    #[test]
    fn test_learning_rate_recomputed_past_threshold() {
        let controller = AdaptiveConcurrencyController::default();
        for _ in 0..100 {
            controller.record_reward(1.0);
        }
        assert_eq!(controller.learning_rate(), 0.01);

        controller.record_reward(1.0);
        assert!((controller.learning_rate() - 0.02).abs() < 1e-12);
    }

    #[test]
    fn test_out_of_range_rewards_clamped() {
        let controller = controller_with_capacity(50);
        controller.record_reward(f64::NAN);
        assert_eq!(controller.sample_count(), 0);
        for _ in 0..50 {
            controller.record_reward(7.0);
        }
        assert_eq!(controller.recent_mean(), Some(1.0));
    }
}
