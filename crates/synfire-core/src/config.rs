//! Neuron configuration.
//!
//! Every tunable of the runtime lives here, grouped per subsystem the way
//! the loop consumes them. Invalid values never abort construction:
//! [`NeuronConfig::validate`] clamps each offender to the nearest legal
//! value and logs one warning per clamped parameter.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::NeuronError;
use crate::types::{LigandKind, NeuronId};

/// Lower bound on the current threshold, as a multiple of the base threshold
pub const THRESHOLD_MIN_FACTOR: f64 = 0.1;
/// Upper bound on the current threshold, as a multiple of the base threshold
pub const THRESHOLD_MAX_FACTOR: f64 = 5.0;
/// Smallest legal per-source input gain
pub const MIN_INPUT_GAIN: f64 = 0.001;
/// Largest legal per-source input gain
pub const MAX_INPUT_GAIN: f64 = 100.0;

/// Homeostatic plasticity settings (threshold adaptation, calcium proxy)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HomeostasisConfig {
    /// Target firing rate in Hz; zero disables homeostasis
    pub target_firing_rate: f64,
    /// Adjustment strength in [0, 1]
    pub strength: f64,
    /// Window over which the firing rate is measured
    pub activity_window: Duration,
    /// Cadence of homeostatic updates
    pub update_interval: Duration,
    /// Calcium added per firing event
    pub calcium_increment: f64,
    /// Multiplicative calcium retention per homeostatic tick
    pub calcium_decay: f64,
    /// Basal threshold step multiplied by rate error and strength
    pub basal_step: f64,
    /// Hard cap on retained firing-history entries
    pub firing_history_cap: usize,
}

impl Default for HomeostasisConfig {
    fn default() -> Self {
        Self {
            target_firing_rate: 0.0, // disabled until configured
            strength: 0.2,
            activity_window: Duration::from_secs(10),
            update_interval: Duration::from_millis(100),
            calcium_increment: 1.0,
            calcium_decay: 0.95,
            basal_step: 0.01,
            firing_history_cap: 1000,
        }
    }
}

/// Synaptic scaling settings (per-source input gain regulation)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScalingConfig {
    /// Whether scaling runs at all
    pub enabled: bool,
    /// Target aggregate input strength across sources
    pub target_input_strength: f64,
    /// Gain applied to the (target − observed) error per scaling tick
    pub scaling_rate: f64,
    /// Cadence of scaling updates
    pub scaling_interval: Duration,
    /// Lower clamp on the global scaling factor
    pub min_factor: f64,
    /// Upper clamp on the global scaling factor
    pub max_factor: f64,
    /// Calcium level below which scaling is gated off
    pub calcium_floor: f64,
    /// Firing rate (Hz) below which scaling is gated off
    pub rate_floor: f64,
    /// Relative deviation from target that counts as significant
    pub significance_threshold: f64,
    /// Per-source cap on retained activity samples
    pub per_source_cap: usize,
    /// Cap on activity samples across all sources
    pub global_activity_cap: usize,
    /// Cap on retained scaling factors (oscillation detection window source)
    pub factor_history_cap: usize,
    /// Cadence of stale-source cleanup
    pub cleanup_interval: Duration,
}

impl Default for ScalingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            target_input_strength: 1.0,
            scaling_rate: 0.1,
            scaling_interval: Duration::from_secs(1),
            min_factor: 0.8,
            max_factor: 1.2,
            calcium_floor: 0.2,
            rate_floor: 0.1,
            significance_threshold: 0.10,
            per_source_cap: 100,
            global_activity_cap: 10_000,
            factor_history_cap: 50,
            cleanup_interval: Duration::from_secs(30),
        }
    }
}

/// Spike-timing-dependent feedback settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StdpConfig {
    /// Whether STDP feedback is scheduled on fire
    pub enabled: bool,
    /// Delay between a fire and its retrospective feedback pass
    pub feedback_delay: Duration,
    /// Learning rate carried on emitted adjustments
    pub learning_rate: f64,
    /// Pairings with |Δt| beyond this window are skipped
    pub window: Duration,
    /// LTD/LTP asymmetry ratio carried to the fabric's weight rule
    pub asymmetry_ratio: f64,
}

impl Default for StdpConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            feedback_delay: Duration::from_millis(5),
            learning_rate: 0.01,
            window: Duration::from_millis(100),
            asymmetry_ratio: 1.2,
        }
    }
}

/// Queue capacities and loop cadences
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Bounded input queue capacity
    pub input_capacity: usize,
    /// Bounded axonal queue capacity
    pub axon_capacity: usize,
    /// Max signals drained per loop iteration
    pub batch_size: usize,
    /// Loop tick used for dispatch and cadence checks
    pub tick_interval: Duration,
    /// Deadline applied to every fabric callback
    pub callback_deadline: Duration,
    /// Cadence of health pushes to the fabric (zero disables)
    pub health_report_interval: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            input_capacity: 256,
            axon_capacity: 512,
            batch_size: 32,
            tick_interval: Duration::from_millis(1),
            callback_deadline: Duration::from_millis(250),
            health_report_interval: Duration::from_secs(5),
        }
    }
}

/// Full construction-time configuration of a neuron
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NeuronConfig {
    /// Neuron identity
    pub id: NeuronId,
    /// Firing threshold the membrane accumulator is compared against
    pub base_threshold: f64,
    /// Multiplicative membrane retention per tick, in [0, 1]
    pub decay_rate: f64,
    /// No second fire within this interval of the last
    pub refractory_period: Duration,
    /// Output amplitude multiplier applied on fire
    pub fire_factor: f64,
    /// Ligand released through the fabric on fire, when configured
    pub released_ligand: Option<LigandKind>,
    /// Homeostatic plasticity settings
    pub homeostasis: HomeostasisConfig,
    /// Synaptic scaling settings
    pub scaling: ScalingConfig,
    /// STDP feedback settings
    pub stdp: StdpConfig,
    /// Queue capacities and cadences
    pub queues: QueueConfig,
}

impl NeuronConfig {
    /// Configuration with nominal defaults for the given identity
    pub fn new(id: impl Into<NeuronId>) -> Self {
        Self {
            id: id.into(),
            base_threshold: 1.0,
            decay_rate: 0.95,
            refractory_period: Duration::from_millis(5),
            fire_factor: 1.0,
            released_ligand: None,
            homeostasis: HomeostasisConfig::default(),
            scaling: ScalingConfig::default(),
            stdp: StdpConfig::default(),
            queues: QueueConfig::default(),
        }
    }

    /// Derived lower bound for the adaptive threshold
    pub fn threshold_min(&self) -> f64 {
        self.base_threshold * THRESHOLD_MIN_FACTOR
    }

    /// Derived upper bound for the adaptive threshold
    pub fn threshold_max(&self) -> f64 {
        self.base_threshold * THRESHOLD_MAX_FACTOR
    }

    /// Clamp every out-of-range parameter to its nearest legal value.
    ///
    /// Returns the list of clamps performed, one entry per parameter, each
    /// already logged. Callers treat a non-empty list as advisory.
    pub fn validate(&mut self) -> Vec<NeuronError> {
        let mut clamped = Vec::new();

        let mut clamp = |name: &'static str, value: &mut f64, lo: f64, hi: f64| {
            if !value.is_finite() || *value < lo || *value > hi {
                let legal = if value.is_finite() {
                    value.clamp(lo, hi)
                } else {
                    lo
                };
                warn!(parameter = name, value = *value, clamped_to = legal, "clamping invalid parameter");
                clamped.push(NeuronError::InvalidParameter {
                    name,
                    value: *value,
                    clamped_to: legal,
                });
                *value = legal;
            }
        };

        clamp("base_threshold", &mut self.base_threshold, f64::MIN_POSITIVE, f64::MAX);
        clamp("decay_rate", &mut self.decay_rate, 0.0, 1.0);
        clamp("fire_factor", &mut self.fire_factor, 0.0, f64::MAX);
        clamp(
            "homeostasis.target_firing_rate",
            &mut self.homeostasis.target_firing_rate,
            0.0,
            f64::MAX,
        );
        clamp("homeostasis.strength", &mut self.homeostasis.strength, 0.0, 1.0);
        clamp(
            "homeostasis.calcium_decay",
            &mut self.homeostasis.calcium_decay,
            0.0,
            1.0,
        );
        clamp(
            "scaling.target_input_strength",
            &mut self.scaling.target_input_strength,
            0.0,
            f64::MAX,
        );
        clamp("scaling.scaling_rate", &mut self.scaling.scaling_rate, 0.0, 1.0);
        clamp("scaling.min_factor", &mut self.scaling.min_factor, 0.0, 1.0);
        clamp("scaling.max_factor", &mut self.scaling.max_factor, 1.0, f64::MAX);
        clamp("stdp.learning_rate", &mut self.stdp.learning_rate, 0.0, 1.0);
        clamp(
            "stdp.asymmetry_ratio",
            &mut self.stdp.asymmetry_ratio,
            0.0,
            f64::MAX,
        );

        clamped
    }
}
