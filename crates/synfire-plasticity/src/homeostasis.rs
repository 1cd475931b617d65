//! Homeostatic threshold adaptation.
//!
//! Drives the firing rate toward a target by moving the firing threshold:
//! a neuron firing above target raises its threshold, one firing below
//! lowers it. A calcium proxy integrates firing activity (incremented per
//! fire, decayed per tick) and gates the synaptic scaling controller
//! downstream.
//!
//! The update is the rate-error gradient
//! `Δthreshold = (observed − target) × strength × basal_step`, with the
//! result clamped into `[0.1 × base, 5 × base]` on every path.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use synfire_core::config::{HomeostasisConfig, THRESHOLD_MAX_FACTOR, THRESHOLD_MIN_FACTOR};

use crate::history::FiringHistory;

/// Read-only snapshot of homeostatic state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HomeostaticInfo {
    /// Target firing rate in Hz; zero means disabled
    pub target_firing_rate: f64,
    /// Adjustment strength in [0, 1]
    pub strength: f64,
    /// Current calcium proxy level
    pub calcium_level: f64,
    /// Firing rate over the activity window
    pub current_firing_rate: f64,
    /// Entries currently retained in the firing history
    pub firing_history_len: usize,
    /// Activity window the rate is measured over
    pub activity_window: Duration,
    /// Lower threshold bound
    pub min_threshold: f64,
    /// Upper threshold bound
    pub max_threshold: f64,
}

/// Calcium proxy, firing history, and threshold adaptation
#[derive(Debug, Clone)]
pub struct HomeostaticController {
    config: HomeostasisConfig,
    base_threshold: f64,
    min_threshold: f64,
    max_threshold: f64,
    calcium: f64,
    firing_history: FiringHistory,
    last_update: Instant,
}

impl HomeostaticController {
    pub fn new(config: HomeostasisConfig, base_threshold: f64) -> Self {
        let firing_history = FiringHistory::new(config.activity_window, config.firing_history_cap);
        Self {
            min_threshold: base_threshold * THRESHOLD_MIN_FACTOR,
            max_threshold: base_threshold * THRESHOLD_MAX_FACTOR,
            base_threshold,
            calcium: 0.0,
            firing_history,
            last_update: Instant::now(),
            config,
        }
    }

    /// Homeostasis runs only with a positive target rate
    pub fn is_enabled(&self) -> bool {
        self.config.target_firing_rate > 0.0
    }

    /// Whether the update cadence has elapsed
    pub fn due(&self, now: Instant) -> bool {
        now.duration_since(self.last_update) >= self.config.update_interval
    }

    /// Record a firing event: history append plus calcium increment.
    ///
    /// Called exactly once per fire, enabled or not; the firing history
    /// also feeds rate queries and scaling gates.
    pub fn on_fire(&mut self, at: Instant) {
        self.firing_history.record(at);
        self.calcium += self.config.calcium_increment;
    }

    /// Run one homeostatic tick against the current threshold.
    ///
    /// Returns the new clamped threshold. Calcium decays on every tick,
    /// including while disabled; the threshold only moves while enabled.
    pub fn update(&mut self, now: Instant, current_threshold: f64) -> f64 {
        self.last_update = now;
        self.firing_history.prune(now);

        // Decay may transiently undershoot zero with pathological
        // configs; clamp keeps the proxy non-negative at rest.
        self.calcium = (self.calcium * self.config.calcium_decay).max(0.0);

        if !self.is_enabled() {
            return current_threshold;
        }

        let observed = self.firing_history.rate(now);
        let rate_error = observed - self.config.target_firing_rate;
        let delta = rate_error * self.config.strength * self.config.basal_step;
        let updated = (current_threshold + delta).clamp(self.min_threshold, self.max_threshold);

        if delta != 0.0 {
            trace!(
                observed_hz = observed,
                target_hz = self.config.target_firing_rate,
                delta,
                threshold = updated,
                "homeostatic tick"
            );
        }
        updated
    }

    /// Reconfigure target rate and strength.
    ///
    /// Passing 0/0 disables homeostasis and resets: the returned threshold
    /// is the base threshold, calcium and firing history are cleared.
    /// Returns the threshold the neuron should adopt.
    pub fn set_parameters(&mut self, target_rate: f64, strength: f64, current_threshold: f64) -> f64 {
        self.config.target_firing_rate = target_rate.max(0.0);
        self.config.strength = strength.clamp(0.0, 1.0);

        if self.config.target_firing_rate == 0.0 && self.config.strength == 0.0 {
            debug!("homeostasis disabled, resetting threshold and calcium");
            self.calcium = 0.0;
            self.firing_history.clear();
            return self.base_threshold;
        }
        current_threshold
    }

    /// Firing rate over the activity window ending at `now`
    pub fn firing_rate(&self, now: Instant) -> f64 {
        self.firing_history.rate(now)
    }

    pub fn calcium_level(&self) -> f64 {
        self.calcium
    }

    /// Most recent firing instant
    pub fn last_fire(&self) -> Option<Instant> {
        self.firing_history.last()
    }

    pub fn firing_history_len(&self) -> usize {
        self.firing_history.len()
    }

    pub fn base_threshold(&self) -> f64 {
        self.base_threshold
    }

    pub fn min_threshold(&self) -> f64 {
        self.min_threshold
    }

    pub fn max_threshold(&self) -> f64 {
        self.max_threshold
    }

    /// Target firing rate in Hz (zero while disabled)
    pub fn target_rate(&self) -> f64 {
        self.config.target_firing_rate
    }

    pub fn info(&self, now: Instant) -> HomeostaticInfo {
        HomeostaticInfo {
            target_firing_rate: self.config.target_firing_rate,
            strength: self.config.strength,
            calcium_level: self.calcium,
            current_firing_rate: self.firing_rate(now),
            firing_history_len: self.firing_history.len(),
            activity_window: self.config.activity_window,
            min_threshold: self.min_threshold,
            max_threshold: self.max_threshold,
        }
    }

}
