//! Synaptic scaling: per-source input gain regulation.
//!
//! Keeps the aggregate effective input strength near a target by
//! multiplying every per-source receptor gain with a single scaling
//! factor. Scaling is deliberately conservative: it only acts when the
//! neuron is metabolically active (calcium floor), actually firing (rate
//! floor), and the deviation from target is significant. All three gates
//! must pass or the tick changes nothing.
//!
//! Clamp ordering: the global factor is clamped first, then each gain is
//! clamped after multiplication.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use synfire_core::config::{ScalingConfig, MAX_INPUT_GAIN, MIN_INPUT_GAIN};
use synfire_core::types::SourceId;

use crate::history::SampleHistory;

/// Why a scaling tick made no change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScalingGate {
    /// Controller is disabled
    Disabled,
    /// Calcium proxy below the activity floor
    CalciumFloor,
    /// Firing rate below the rate floor
    RateFloor,
    /// Deviation from target below the significance threshold
    NotSignificant,
    /// No sources with recent activity
    NoActivity,
}

/// Outcome of one scaling tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScalingOutcome {
    /// Gains were multiplied by the contained factor
    Applied { factor: f64, observed: f64 },
    /// A gate failed; nothing changed, no history entry appended
    Skipped(ScalingGate),
}

/// Read-only snapshot of scaling state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynapticScalingInfo {
    pub enabled: bool,
    pub target_input_strength: f64,
    pub scaling_rate: f64,
    /// Per-source receptor gains
    pub input_gains: HashMap<SourceId, f64>,
    /// Most recent scaling factors, oldest first
    pub recent_factors: Vec<f64>,
    /// Registered source count
    pub source_count: usize,
    /// Whether the factor history currently looks oscillatory
    pub oscillating: bool,
}

/// Per-source input gain regulation toward a target aggregate strength
#[derive(Debug, Clone)]
pub struct SynapticScalingController {
    config: ScalingConfig,
    gains: HashMap<SourceId, f64>,
    activity: HashMap<SourceId, SampleHistory>,
    factor_history: Vec<f64>,
    last_scaling: Instant,
    last_cleanup: Instant,
}

impl SynapticScalingController {
    pub fn new(config: ScalingConfig) -> Self {
        let now = Instant::now();
        Self {
            config,
            gains: HashMap::new(),
            activity: HashMap::new(),
            factor_history: Vec::new(),
            last_scaling: now,
            last_cleanup: now,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Enable with a fresh target, rate, and cadence
    pub fn enable(&mut self, target: f64, rate: f64, interval: Duration) {
        self.config.enabled = true;
        self.config.target_input_strength = target.max(0.0);
        self.config.scaling_rate = rate.clamp(0.0, 1.0);
        self.config.scaling_interval = interval;
        debug!(target, rate, ?interval, "synaptic scaling enabled");
    }

    /// Apply the source's receptor gain to a raw input value.
    ///
    /// First sight of a source registers it with unit gain.
    pub fn apply_gain(&mut self, source: &SourceId, value: f64) -> f64 {
        let gain = *self
            .gains
            .entry(source.clone())
            .or_insert(1.0);
        value * gain
    }

    /// Record a pre-integration input sample for the source.
    ///
    /// Histories are bounded per source; the global bound is enforced by
    /// shrinking the per-source cap share when many sources are active.
    pub fn record_activity(&mut self, source: &SourceId, effective_value: f64, now: Instant) {
        let cap = self.per_source_cap();
        let history = self
            .activity
            .entry(source.clone())
            .or_insert_with(|| SampleHistory::new(cap));
        history.record(effective_value, now);
        self.gains.entry(source.clone()).or_insert(1.0);
    }

    fn per_source_cap(&self) -> usize {
        let sources = self.activity.len().max(1);
        let share = self.config.global_activity_cap / sources;
        self.config.per_source_cap.min(share.max(1))
    }

    /// Whether the scaling cadence has elapsed
    pub fn due(&self, now: Instant) -> bool {
        self.config.enabled
            && now.duration_since(self.last_scaling) >= self.config.scaling_interval
    }

    /// Run one scaling tick gated on calcium, firing rate, and deviation.
    pub fn update(&mut self, now: Instant, calcium: f64, firing_rate: f64) -> ScalingOutcome {
        self.last_scaling = now;

        if !self.config.enabled {
            return ScalingOutcome::Skipped(ScalingGate::Disabled);
        }
        if calcium < self.config.calcium_floor {
            trace!(calcium, floor = self.config.calcium_floor, "scaling gated: calcium");
            return ScalingOutcome::Skipped(ScalingGate::CalciumFloor);
        }
        if firing_rate < self.config.rate_floor {
            trace!(firing_rate, floor = self.config.rate_floor, "scaling gated: rate");
            return ScalingOutcome::Skipped(ScalingGate::RateFloor);
        }

        let window = self.config.scaling_interval.max(Duration::from_secs(1));
        let observed: f64 = {
            let mut sum = 0.0;
            let mut any = false;
            for history in self.activity.values() {
                if let Some(mean) = history.recent_mean(window, now) {
                    sum += mean;
                    any = true;
                }
            }
            if !any {
                return ScalingOutcome::Skipped(ScalingGate::NoActivity);
            }
            sum
        };

        let target = self.config.target_input_strength;
        let deviation = if target > 0.0 {
            ((observed - target) / target).abs()
        } else {
            f64::INFINITY
        };
        if deviation <= self.config.significance_threshold {
            return ScalingOutcome::Skipped(ScalingGate::NotSignificant);
        }

        // Global factor clamped before multiplication, each gain clamped after.
        let factor = (1.0 + (target - observed) * self.config.scaling_rate)
            .clamp(self.config.min_factor, self.config.max_factor);

        for gain in self.gains.values_mut() {
            *gain = (*gain * factor).clamp(MIN_INPUT_GAIN, MAX_INPUT_GAIN);
        }

        self.factor_history.push(factor);
        if self.factor_history.len() > self.config.factor_history_cap {
            let overflow = self.factor_history.len() - self.config.factor_history_cap;
            self.factor_history.drain(..overflow);
        }

        debug!(observed, target, factor, sources = self.gains.len(), "scaling applied");
        ScalingOutcome::Applied { factor, observed }
    }

    /// Whether the stale-source cleanup cadence has elapsed
    pub fn cleanup_due(&self, now: Instant) -> bool {
        now.duration_since(self.last_cleanup) >= self.config.cleanup_interval
    }

    /// Drop sources with no activity inside the cleanup interval.
    ///
    /// Deregistration is never required of callers; silence decays a
    /// source out of the maps.
    pub fn cleanup(&mut self, now: Instant) -> usize {
        self.last_cleanup = now;
        let stale_after = self.config.cleanup_interval;
        let stale: Vec<SourceId> = self
            .activity
            .iter()
            .filter(|(_, history)| {
                history
                    .last_instant()
                    .map(|at| now.duration_since(at) > stale_after)
                    .unwrap_or(true)
            })
            .map(|(source, _)| source.clone())
            .collect();
        for source in &stale {
            self.activity.remove(source);
            self.gains.remove(source);
        }
        if !stale.is_empty() {
            debug!(removed = stale.len(), "pruned stale scaling sources");
        }
        stale.len()
    }

    /// Oscillation check over the most recent six factors.
    ///
    /// Reports true when more than half of the scanned interior points
    /// are local extrema, the signature of gains bouncing around target
    /// instead of converging.
    pub fn oscillating(&self) -> bool {
        let n = self.factor_history.len();
        if n < 4 {
            return false;
        }
        let tail = &self.factor_history[n.saturating_sub(6)..];
        let interior = tail.len() - 2;
        let extrema = tail
            .windows(3)
            .filter(|w| (w[1] - w[0]) * (w[2] - w[1]) < 0.0)
            .count();
        extrema * 2 > interior
    }

    /// Current gain for a source; unregistered sources read as 1.0
    pub fn gain_for(&self, source: &SourceId) -> f64 {
        self.gains.get(source).copied().unwrap_or(1.0)
    }

    /// Explicitly set a source's gain, clamped to the legal range
    pub fn set_gain(&mut self, source: &SourceId, gain: f64) -> f64 {
        let clamped = gain.clamp(MIN_INPUT_GAIN, MAX_INPUT_GAIN);
        self.gains.insert(source.clone(), clamped);
        clamped
    }

    pub fn gains(&self) -> &HashMap<SourceId, f64> {
        &self.gains
    }

    pub fn factor_history_len(&self) -> usize {
        self.factor_history.len()
    }

    pub fn source_count(&self) -> usize {
        self.gains.len()
    }

    pub fn info(&self) -> SynapticScalingInfo {
        SynapticScalingInfo {
            enabled: self.config.enabled,
            target_input_strength: self.config.target_input_strength,
            scaling_rate: self.config.scaling_rate,
            input_gains: self.gains.clone(),
            recent_factors: {
                let n = self.factor_history.len();
                self.factor_history[n.saturating_sub(6)..].to_vec()
            },
            source_count: self.gains.len(),
            oscillating: self.oscillating(),
        }
    }
}
