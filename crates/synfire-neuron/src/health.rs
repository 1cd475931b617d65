//! Health assessment and diagnostic snapshots.
//!
//! Health is derived, never stored: each query assembles one consistent
//! snapshot of neuron state and scores it. The score starts at 1.0 and
//! loses ground per detected issue; issues come from a closed vocabulary
//! so the fabric can aggregate them across thousands of neurons.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

use synfire_core::config::{MAX_INPUT_GAIN, MIN_INPUT_GAIN};
use synfire_core::traits::HealthReport;
use synfire_core::types::{LifecycleState, NeuronId, SourceId};

use crate::dendrite::DendriteStats;

/// Closed vocabulary of detectable issues
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HealthIssue {
    HyperactiveFiring,
    HypoactiveFiring,
    InputBufferCongestion,
    IsolatedNeuron,
    ExcessiveConnections,
    ThresholdTooHigh,
    ThresholdTooLow,
    CalciumOverload,
    CalciumUnderflow,
    ProlongedSilence,
    ExtremeReceptorGains,
    ScalingOscillations,
    ScalingConvergenceFailure,
    DendriticSaturation,
    DendriticUnderutilization,
    ExcessiveShuntingInhibition,
    AxonalDeliveryBacklog,
    MissingMatrixCallbacks,
}

impl HealthIssue {
    /// Stable tag used in reports and logs
    pub fn tag(&self) -> &'static str {
        match self {
            Self::HyperactiveFiring => "hyperactive_firing",
            Self::HypoactiveFiring => "hypoactive_firing",
            Self::InputBufferCongestion => "input_buffer_congestion",
            Self::IsolatedNeuron => "isolated_neuron",
            Self::ExcessiveConnections => "excessive_connections",
            Self::ThresholdTooHigh => "threshold_too_high",
            Self::ThresholdTooLow => "threshold_too_low",
            Self::CalciumOverload => "calcium_overload",
            Self::CalciumUnderflow => "calcium_underflow",
            Self::ProlongedSilence => "prolonged_silence",
            Self::ExtremeReceptorGains => "extreme_receptor_gains",
            Self::ScalingOscillations => "scaling_oscillations",
            Self::ScalingConvergenceFailure => "scaling_convergence_failure",
            Self::DendriticSaturation => "dendritic_saturation",
            Self::DendriticUnderutilization => "dendritic_underutilization",
            Self::ExcessiveShuntingInhibition => "excessive_shunting_inhibition",
            Self::AxonalDeliveryBacklog => "axonal_delivery_backlog",
            Self::MissingMatrixCallbacks => "missing_matrix_callbacks",
        }
    }

    /// Score deduction the issue costs
    fn penalty(&self) -> f64 {
        match self {
            Self::HyperactiveFiring | Self::HypoactiveFiring => 0.15,
            Self::InputBufferCongestion => 0.15,
            Self::IsolatedNeuron => 0.20,
            Self::ExcessiveConnections => 0.10,
            Self::ThresholdTooHigh | Self::ThresholdTooLow => 0.10,
            Self::CalciumOverload | Self::CalciumUnderflow => 0.10,
            Self::ProlongedSilence => 0.15,
            Self::ExtremeReceptorGains => 0.10,
            Self::ScalingOscillations => 0.10,
            Self::ScalingConvergenceFailure => 0.10,
            Self::DendriticSaturation => 0.10,
            Self::DendriticUnderutilization => 0.05,
            Self::ExcessiveShuntingInhibition => 0.10,
            Self::AxonalDeliveryBacklog => 0.15,
            Self::MissingMatrixCallbacks => 0.20,
        }
    }
}

impl std::fmt::Display for HealthIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.tag())
    }
}

/// Raw observations one assessment runs over
#[derive(Debug, Clone)]
pub struct HealthInputs {
    /// Firing rate over the activity window, Hz
    pub firing_rate: f64,
    /// Homeostatic target rate, 0 when disabled
    pub target_rate: f64,
    /// Input queue utilization in [0, 1]
    pub buffer_utilization: f64,
    /// Registered outputs
    pub connection_count: usize,
    /// Current over base threshold
    pub threshold_ratio: f64,
    /// Calcium proxy level
    pub calcium: f64,
    /// Per-source receptor gains
    pub gains: HashMap<SourceId, f64>,
    /// Scaling controller flags
    pub scaling_enabled: bool,
    pub scaling_oscillating: bool,
    /// Recent scaling factors, oldest first
    pub recent_factors: Vec<f64>,
    /// Dendrite utilization counters
    pub dendrite: DendriteStats,
    /// Dendritic strategy name
    pub dendrite_name: &'static str,
    /// Axonal entries still waiting on their deadline
    pub axon_backlog: usize,
    /// Axonal queue capacity
    pub axon_capacity: usize,
    /// Time since the last fire, None if the neuron never fired
    pub since_last_fire: Option<Duration>,
    /// Time the neuron has been running
    pub uptime: Duration,
    /// Whether a fabric bundle is configured
    pub callbacks_present: bool,
}

/// Derived health metrics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthMetrics {
    /// Current firing rate, Hz
    pub activity_level: f64,
    /// Buffer utilization plus weighted subsystem activity, in [0, 1]
    pub processing_load: f64,
    /// Registered outputs
    pub connection_count: usize,
    /// Composite score in [0, 1]
    pub health_score: f64,
    /// Detected issues, deduplicated
    pub issues: Vec<HealthIssue>,
}

impl HealthMetrics {
    /// Compact report for pushing through the fabric
    pub fn to_report(&self, neuron_id: &NeuronId) -> HealthReport {
        HealthReport {
            neuron_id: neuron_id.clone(),
            health_score: self.health_score,
            activity_level: self.activity_level,
            processing_load: self.processing_load,
            issues: self.issues.iter().map(|i| i.tag().to_string()).collect(),
            reported_at: Utc::now(),
        }
    }
}

/// Full diagnostic snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetailedHealthReport {
    pub neuron_id: NeuronId,
    pub lifecycle: LifecycleState,
    pub metrics: HealthMetrics,
    pub current_threshold: f64,
    pub base_threshold: f64,
    pub calcium_level: f64,
    /// Gains sorted by magnitude, largest first
    pub input_gains: Vec<(SourceId, f64)>,
    /// Recent scaling factors, oldest first
    pub recent_scaling_factors: Vec<f64>,
    pub dendrite_strategy: String,
    pub dropped_inputs: u64,
    pub axon_fallback_deliveries: u64,
    pub swallowed_deliveries: u64,
    pub feedback_runs: u64,
    pub adjustments_emitted: u64,
    pub strategy_failures: u64,
    pub generated_at: DateTime<Utc>,
}

/// Sort a gain table by magnitude, largest first
pub fn sorted_gains(gains: &HashMap<SourceId, f64>) -> Vec<(SourceId, f64)> {
    let mut rows: Vec<(SourceId, f64)> =
        gains.iter().map(|(s, &g)| (s.clone(), g)).collect();
    rows.sort_by_key(|&(_, g)| std::cmp::Reverse(OrderedFloat(g)));
    rows
}

/// Tuning knobs for issue detection
#[derive(Debug, Clone)]
pub struct HealthThresholds {
    pub hyperactive_factor: f64,
    pub hypoactive_factor: f64,
    pub absolute_hyperactive_hz: f64,
    pub congestion_utilization: f64,
    pub excessive_connections: usize,
    pub threshold_high_ratio: f64,
    pub threshold_low_ratio: f64,
    pub calcium_overload: f64,
    pub silence_after: Duration,
    pub extreme_gain_low: f64,
    pub extreme_gain_high: f64,
    pub convergence_tolerance: f64,
    pub saturation_ratio: f64,
    pub underutilization_ratio: f64,
    pub shunt_floor: f64,
    pub backlog_ratio: f64,
}

impl Default for HealthThresholds {
    fn default() -> Self {
        Self {
            hyperactive_factor: 3.0,
            hypoactive_factor: 1.0 / 3.0,
            absolute_hyperactive_hz: 200.0,
            congestion_utilization: 0.8,
            excessive_connections: 1_000,
            threshold_high_ratio: 4.0,
            threshold_low_ratio: 0.2,
            calcium_overload: 50.0,
            silence_after: Duration::from_secs(30),
            extreme_gain_low: MIN_INPUT_GAIN * 2.0,
            extreme_gain_high: MAX_INPUT_GAIN * 0.5,
            convergence_tolerance: 0.15,
            saturation_ratio: 0.5,
            underutilization_ratio: 0.02,
            shunt_floor: 0.3,
            backlog_ratio: 0.8,
        }
    }
}

/// Score one snapshot of observations
pub fn assess(inputs: &HealthInputs, thresholds: &HealthThresholds) -> HealthMetrics {
    let mut issues = Vec::new();

    if inputs.target_rate > 0.0 {
        if inputs.firing_rate > inputs.target_rate * thresholds.hyperactive_factor {
            issues.push(HealthIssue::HyperactiveFiring);
        } else if inputs.firing_rate < inputs.target_rate * thresholds.hypoactive_factor {
            issues.push(HealthIssue::HypoactiveFiring);
        }
    } else if inputs.firing_rate > thresholds.absolute_hyperactive_hz {
        issues.push(HealthIssue::HyperactiveFiring);
    }

    if inputs.buffer_utilization > thresholds.congestion_utilization {
        issues.push(HealthIssue::InputBufferCongestion);
    }

    if inputs.connection_count == 0 {
        issues.push(HealthIssue::IsolatedNeuron);
    } else if inputs.connection_count > thresholds.excessive_connections {
        issues.push(HealthIssue::ExcessiveConnections);
    }

    if inputs.threshold_ratio >= thresholds.threshold_high_ratio {
        issues.push(HealthIssue::ThresholdTooHigh);
    } else if inputs.threshold_ratio <= thresholds.threshold_low_ratio {
        issues.push(HealthIssue::ThresholdTooLow);
    }

    if inputs.calcium > thresholds.calcium_overload {
        issues.push(HealthIssue::CalciumOverload);
    } else if inputs.calcium < 0.0 {
        issues.push(HealthIssue::CalciumUnderflow);
    }

    let silent_for = inputs.since_last_fire.unwrap_or(inputs.uptime);
    if silent_for >= thresholds.silence_after {
        issues.push(HealthIssue::ProlongedSilence);
    }

    if inputs.gains.values().any(|&g| {
        g <= thresholds.extreme_gain_low || g >= thresholds.extreme_gain_high
    }) {
        issues.push(HealthIssue::ExtremeReceptorGains);
    }

    if inputs.scaling_oscillating {
        issues.push(HealthIssue::ScalingOscillations);
    }

    if inputs.scaling_enabled && inputs.recent_factors.len() >= 6 {
        let mean_error: f64 = inputs
            .recent_factors
            .iter()
            .map(|f| (f - 1.0).abs())
            .sum::<f64>()
            / inputs.recent_factors.len() as f64;
        if mean_error > thresholds.convergence_tolerance {
            issues.push(HealthIssue::ScalingConvergenceFailure);
        }
    }

    if inputs.dendrite.saturation_ratio() > thresholds.saturation_ratio {
        issues.push(HealthIssue::DendriticSaturation);
    } else if inputs.dendrite.reads > 100
        && inputs.dendrite.utilization() < thresholds.underutilization_ratio
    {
        issues.push(HealthIssue::DendriticUnderutilization);
    }

    if inputs.dendrite_name == "shunting_inhibition"
        && inputs.dendrite.reads > 0
        && inputs.dendrite.shunt_factor < thresholds.shunt_floor
    {
        issues.push(HealthIssue::ExcessiveShuntingInhibition);
    }

    if inputs.axon_capacity > 0 {
        let backlog_ratio = inputs.axon_backlog as f64 / inputs.axon_capacity as f64;
        if backlog_ratio > thresholds.backlog_ratio {
            issues.push(HealthIssue::AxonalDeliveryBacklog);
        }
    }

    if !inputs.callbacks_present {
        issues.push(HealthIssue::MissingMatrixCallbacks);
    }

    let processing_load = (inputs.buffer_utilization * 0.5
        + inputs.dendrite.utilization() * 0.25
        + (inputs.axon_backlog as f64 / inputs.axon_capacity.max(1) as f64) * 0.25)
        .clamp(0.0, 1.0);

    let health_score = issues
        .iter()
        .fold(1.0_f64, |score, issue| score - issue.penalty())
        .clamp(0.0, 1.0);

    HealthMetrics {
        activity_level: inputs.firing_rate,
        processing_load,
        connection_count: inputs.connection_count,
        health_score,
        issues,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quiet_inputs() -> HealthInputs {
        HealthInputs {
            firing_rate: 5.0,
            target_rate: 5.0,
            buffer_utilization: 0.1,
            connection_count: 3,
            threshold_ratio: 1.0,
            calcium: 2.0,
            gains: HashMap::from([("a".to_string(), 1.0)]),
            scaling_enabled: false,
            scaling_oscillating: false,
            recent_factors: Vec::new(),
            dendrite: DendriteStats {
                reads: 100,
                active_reads: 40,
                ..Default::default()
            },
            dendrite_name: "temporal_summation",
            axon_backlog: 0,
            axon_capacity: 512,
            since_last_fire: Some(Duration::from_millis(100)),
            uptime: Duration::from_secs(10),
            callbacks_present: true,
        }
    }

    #[test]
    fn test_healthy_neuron_scores_full() {
        let metrics = assess(&quiet_inputs(), &HealthThresholds::default());
        assert_eq!(metrics.health_score, 1.0);
        assert!(metrics.issues.is_empty());
    }

    #[test]
    fn test_hyperactive_detected() {
        let mut inputs = quiet_inputs();
        inputs.firing_rate = 50.0;
        let metrics = assess(&inputs, &HealthThresholds::default());
        assert!(metrics.issues.contains(&HealthIssue::HyperactiveFiring));
        assert!(metrics.health_score < 1.0);
    }

    #[test]
    fn test_hypoactive_detected() {
        let mut inputs = quiet_inputs();
        inputs.firing_rate = 0.5;
        let metrics = assess(&inputs, &HealthThresholds::default());
        assert!(metrics.issues.contains(&HealthIssue::HypoactiveFiring));
    }

    #[test]
    fn test_isolation_detected() {
        let mut inputs = quiet_inputs();
        inputs.connection_count = 0;
        let metrics = assess(&inputs, &HealthThresholds::default());
        assert!(metrics.issues.contains(&HealthIssue::IsolatedNeuron));
    }

    #[test]
    fn test_threshold_drift_detected() {
        let mut inputs = quiet_inputs();
        inputs.threshold_ratio = 4.5;
        let metrics = assess(&inputs, &HealthThresholds::default());
        assert!(metrics.issues.contains(&HealthIssue::ThresholdTooHigh));

        inputs.threshold_ratio = 0.15;
        let metrics = assess(&inputs, &HealthThresholds::default());
        assert!(metrics.issues.contains(&HealthIssue::ThresholdTooLow));
    }

    #[test]
    fn test_missing_callbacks_detected() {
        let mut inputs = quiet_inputs();
        inputs.callbacks_present = false;
        let metrics = assess(&inputs, &HealthThresholds::default());
        assert!(metrics.issues.contains(&HealthIssue::MissingMatrixCallbacks));
    }

    #[test]
    fn test_prolonged_silence_detected() {
        let mut inputs = quiet_inputs();
        inputs.since_last_fire = None;
        inputs.uptime = Duration::from_secs(60);
        inputs.target_rate = 0.0;
        inputs.firing_rate = 0.0;
        let metrics = assess(&inputs, &HealthThresholds::default());
        assert!(metrics.issues.contains(&HealthIssue::ProlongedSilence));
    }

    #[test]
    fn test_extreme_gains_detected() {
        let mut inputs = quiet_inputs();
        inputs.gains.insert("hot".to_string(), 80.0);
        let metrics = assess(&inputs, &HealthThresholds::default());
        assert!(metrics.issues.contains(&HealthIssue::ExtremeReceptorGains));
    }

    #[test]
    fn test_score_never_negative() {
        let inputs = HealthInputs {
            firing_rate: 1000.0,
            target_rate: 1.0,
            buffer_utilization: 1.0,
            connection_count: 0,
            threshold_ratio: 5.0,
            calcium: 1000.0,
            gains: HashMap::from([("g".to_string(), 99.0)]),
            scaling_enabled: true,
            scaling_oscillating: true,
            recent_factors: vec![1.5; 8],
            dendrite: DendriteStats {
                reads: 10,
                active_reads: 10,
                saturated_reads: 9,
                ..Default::default()
            },
            dendrite_name: "shunting_inhibition",
            axon_backlog: 512,
            axon_capacity: 512,
            since_last_fire: None,
            uptime: Duration::from_secs(120),
            callbacks_present: false,
        };
        let metrics = assess(&inputs, &HealthThresholds::default());
        assert!(metrics.health_score >= 0.0);
        assert!(metrics.issues.len() > 5);
    }

    #[test]
    fn test_sorted_gains_largest_first() {
        let gains = HashMap::from([
            ("a".to_string(), 0.5),
            ("b".to_string(), 2.0),
            ("c".to_string(), 1.0),
        ]);
        let sorted = sorted_gains(&gains);
        assert_eq!(sorted[0].0, "b");
        assert_eq!(sorted[2].0, "a");
    }

    #[test]
    fn test_issue_tags_are_snake_case() {
        assert_eq!(HealthIssue::ScalingOscillations.tag(), "scaling_oscillations");
        assert_eq!(
            HealthIssue::MissingMatrixCallbacks.to_string(),
            "missing_matrix_callbacks"
        );
    }
}
