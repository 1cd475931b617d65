//! Dendritic integration strategies.
//!
//! The dendrite turns a stream of (effective-input, timestamp) pairs into
//! the membrane-input contribution the neuron folds into its accumulator.
//! Strategies form a closed set modeled as a tagged enum with one
//! polymorphic [`DendriticIntegrator::contribution`] operation; no open
//! hierarchy, no trait objects.
//!
//! Strategies are purely computational: they hold no locks and are invoked
//! only from the owning neuron's loop. Each deposit contributes to exactly
//! one read.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

/// Contribution produced by one integration read
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DendriticOutput {
    /// Membrane input to fold into the accumulator
    pub contribution: f64,
    /// Whether the dendrite generated a local (dendritic) spike
    pub dendritic_spike: bool,
}

impl DendriticOutput {
    fn quiet() -> Self {
        Self {
            contribution: 0.0,
            dendritic_spike: false,
        }
    }
}

/// Utilization counters the health subsystem classifies dendrites by
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct DendriteStats {
    /// Integration reads performed
    pub reads: u64,
    /// Reads that produced a non-zero contribution
    pub active_reads: u64,
    /// Reads clamped at the saturation ceiling
    pub saturated_reads: u64,
    /// Dendritic spikes generated
    pub dendritic_spikes: u64,
    /// Mean shunting attenuation over recent reads (1.0 = none)
    pub shunt_factor: f64,
}

impl DendriteStats {
    /// Fraction of reads that carried signal
    pub fn utilization(&self) -> f64 {
        if self.reads == 0 {
            return 0.0;
        }
        self.active_reads as f64 / self.reads as f64
    }

    /// Fraction of reads clamped at saturation
    pub fn saturation_ratio(&self) -> f64 {
        if self.reads == 0 {
            return 0.0;
        }
        self.saturated_reads as f64 / self.reads as f64
    }
}

/// Temporal summation over a sliding exponential kernel
#[derive(Debug, Clone)]
pub struct SummationWindow {
    deposits: VecDeque<(f64, Instant)>,
    tau: Duration,
    window: Duration,
}

impl SummationWindow {
    fn new(tau: Duration, window: Duration) -> Self {
        Self {
            deposits: VecDeque::new(),
            tau,
            window,
        }
    }

    fn deposit(&mut self, value: f64, at: Instant) {
        self.deposits.push_back((value, at));
    }

    /// Drain deposits inside the window, each weighted by its age
    fn drain_weighted(&mut self, now: Instant) -> f64 {
        let tau_s = self.tau.as_secs_f64();
        let mut sum = 0.0;
        while let Some(&(value, at)) = self.deposits.front() {
            self.deposits.pop_front();
            let age = now.saturating_duration_since(at);
            if age > self.window {
                continue;
            }
            let weight = if tau_s > 0.0 {
                (-age.as_secs_f64() / tau_s).exp()
            } else {
                1.0
            };
            sum += value * weight;
        }
        sum
    }
}

/// The closed strategy set for dendritic integration
#[derive(Debug)]
pub enum DendriticIntegrator {
    /// Hand inputs through unchanged, no temporal structure
    Passive {
        pending: f64,
        stats: DendriteStats,
    },
    /// Exponential-kernel summation over a sliding window
    TemporalSummation {
        state: SummationWindow,
        stats: DendriteStats,
    },
    /// Inhibition divides the excitatory drive instead of subtracting
    ShuntingInhibition {
        shunt_strength: f64,
        excitatory: f64,
        inhibitory: f64,
        stats: DendriteStats,
    },
    /// Temporal summation plus membrane noise and branch saturation
    BiologicalTemporalSummation {
        noise_std: f64,
        saturation_ceiling: f64,
        state: SummationWindow,
        rng: StdRng,
        stats: DendriteStats,
    },
    /// Supra-linear burst when local summation crosses the dendritic threshold
    ActiveDendrite {
        dendritic_threshold: f64,
        burst_gain: f64,
        pending: f64,
        stats: DendriteStats,
    },
}

/// Shared window parameters for the summation strategies
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SummationWindowConfig {
    /// Kernel time constant
    pub tau: Duration,
    /// Deposits older than this are discarded unread
    pub window: Duration,
}

impl Default for SummationWindowConfig {
    fn default() -> Self {
        Self {
            tau: Duration::from_millis(10),
            window: Duration::from_millis(50),
        }
    }
}

impl DendriticIntegrator {
    pub fn passive() -> Self {
        Self::Passive {
            pending: 0.0,
            stats: DendriteStats::default(),
        }
    }

    pub fn temporal_summation(config: SummationWindowConfig) -> Self {
        Self::TemporalSummation {
            state: SummationWindow::new(config.tau, config.window),
            stats: DendriteStats::default(),
        }
    }

    pub fn shunting_inhibition(shunt_strength: f64) -> Self {
        Self::ShuntingInhibition {
            shunt_strength: shunt_strength.max(0.0),
            excitatory: 0.0,
            inhibitory: 0.0,
            stats: DendriteStats {
                shunt_factor: 1.0,
                ..Default::default()
            },
        }
    }

    pub fn biological_temporal_summation(
        config: SummationWindowConfig,
        noise_std: f64,
        saturation_ceiling: f64,
    ) -> Self {
        Self::BiologicalTemporalSummation {
            state: SummationWindow::new(config.tau, config.window),
            noise_std: noise_std.max(0.0),
            saturation_ceiling: saturation_ceiling.max(0.0),
            rng: StdRng::from_entropy(),
            stats: DendriteStats::default(),
        }
    }

    pub fn active_dendrite(dendritic_threshold: f64, burst_gain: f64) -> Self {
        Self::ActiveDendrite {
            dendritic_threshold: dendritic_threshold.max(0.0),
            burst_gain: burst_gain.max(1.0),
            pending: 0.0,
            stats: DendriteStats::default(),
        }
    }

    /// Strategy name used for health-metric classification
    pub fn name(&self) -> &'static str {
        match self {
            Self::Passive { .. } => "passive",
            Self::TemporalSummation { .. } => "temporal_summation",
            Self::ShuntingInhibition { .. } => "shunting_inhibition",
            Self::BiologicalTemporalSummation { .. } => "biological_temporal_summation",
            Self::ActiveDendrite { .. } => "active_dendrite",
        }
    }

    /// Accept one effective input
    pub fn deposit(&mut self, value: f64, at: Instant) {
        match self {
            Self::Passive { pending, .. } => *pending += value,
            Self::TemporalSummation { state, .. } => state.deposit(value, at),
            Self::ShuntingInhibition {
                excitatory,
                inhibitory,
                ..
            } => {
                if value >= 0.0 {
                    *excitatory += value;
                } else {
                    *inhibitory += -value;
                }
            }
            Self::BiologicalTemporalSummation { state, .. } => state.deposit(value, at),
            Self::ActiveDendrite { pending, .. } => *pending += value,
        }
    }

    /// Produce the current membrane-input contribution.
    ///
    /// Consumes pending deposits; a second read without new deposits is
    /// quiet.
    pub fn contribution(&mut self, now: Instant) -> DendriticOutput {
        match self {
            Self::Passive { pending, stats } => {
                let sum = std::mem::take(pending);
                stats.reads += 1;
                if sum != 0.0 {
                    stats.active_reads += 1;
                }
                DendriticOutput {
                    contribution: sum,
                    dendritic_spike: false,
                }
            }
            Self::TemporalSummation { state, stats, .. } => {
                let sum = state.drain_weighted(now);
                stats.reads += 1;
                if sum != 0.0 {
                    stats.active_reads += 1;
                }
                DendriticOutput {
                    contribution: sum,
                    dendritic_spike: false,
                }
            }
            Self::ShuntingInhibition {
                shunt_strength,
                excitatory,
                inhibitory,
                stats,
            } => {
                let e = std::mem::take(excitatory);
                let i = std::mem::take(inhibitory);
                let attenuation = 1.0 / (1.0 + *shunt_strength * i);
                stats.reads += 1;
                if e != 0.0 || i != 0.0 {
                    stats.active_reads += 1;
                }
                // Running mean keeps the health check cheap
                stats.shunt_factor = 0.9 * stats.shunt_factor + 0.1 * attenuation;
                DendriticOutput {
                    contribution: e * attenuation,
                    dendritic_spike: false,
                }
            }
            Self::BiologicalTemporalSummation {
                state,
                noise_std,
                saturation_ceiling,
                rng,
                stats,
                ..
            } => {
                let mut sum = state.drain_weighted(now);
                stats.reads += 1;
                if sum != 0.0 {
                    stats.active_reads += 1;
                    if *noise_std > 0.0 {
                        if let Ok(noise) = Normal::new(0.0, *noise_std) {
                            sum += noise.sample(rng);
                        }
                    }
                }
                if *saturation_ceiling > 0.0 && sum.abs() > *saturation_ceiling {
                    sum = sum.clamp(-*saturation_ceiling, *saturation_ceiling);
                    stats.saturated_reads += 1;
                }
                DendriticOutput {
                    contribution: sum,
                    dendritic_spike: false,
                }
            }
            Self::ActiveDendrite {
                dendritic_threshold,
                burst_gain,
                pending,
                stats,
            } => {
                let sum = std::mem::take(pending);
                stats.reads += 1;
                if sum == 0.0 {
                    return DendriticOutput::quiet();
                }
                stats.active_reads += 1;
                if sum > *dendritic_threshold {
                    stats.dendritic_spikes += 1;
                    DendriticOutput {
                        contribution: sum * *burst_gain,
                        dendritic_spike: true,
                    }
                } else {
                    DendriticOutput {
                        contribution: sum,
                        dendritic_spike: false,
                    }
                }
            }
        }
    }

    pub fn stats(&self) -> DendriteStats {
        match self {
            Self::Passive { stats, .. }
            | Self::TemporalSummation { stats, .. }
            | Self::ShuntingInhibition { stats, .. }
            | Self::BiologicalTemporalSummation { stats, .. }
            | Self::ActiveDendrite { stats, .. } => *stats,
        }
    }
}

impl Default for DendriticIntegrator {
    fn default() -> Self {
        Self::temporal_summation(SummationWindowConfig::default())
    }
}
