//! # Synfire Neuron - Concurrent Spiking-Neuron Runtime
//!
//! Each [`Neuron`] is an independently scheduled computational unit: a
//! tokio task that integrates incoming spikes through a pluggable
//! dendritic strategy, fires through a refractory gate when its membrane
//! accumulator crosses an adaptive threshold, and delivers outgoing
//! spikes through a delay-bearing axonal scheduler. Three plasticity
//! loops adapt its parameters on distinct timescales: STDP feedback per
//! fire, homeostatic threshold adaptation over hundreds of milliseconds,
//! synaptic scaling over seconds.
//!
//! ## Architecture
//!
//! ```text
//! external threads          neuron loop task                 fabric
//! ───────────────          ─────────────────                ───────
//! receive(signal) ──►  bounded input queue
//!                            │ gain · record · dendrite
//!                            ▼
//!                      membrane accumulator ── threshold ──► fire
//!                            │                                │
//!                      axonal scheduler ◄─────────────────────┤
//!                            │ deadline sort · dispatch       │
//!                            ▼                                ▼
//!                      targets (SignalReceiver)      STDP feedback
//!                                                    list / apply
//!                                                    (outside the lock)
//! ```
//!
//! ## Lock discipline
//!
//! One `RwLock` guards the neuron's mutable state. The hard rule is that
//! no fabric callback is ever invoked while that lock is held: every
//! callback site snapshots under the lock, releases, calls out under a
//! deadline, and re-acquires to merge. The output table lives in a
//! `DashMap` so wiring changes never contend with the loop.

pub mod axon;
pub mod dendrite;
pub mod health;
pub mod neuron;

pub use axon::{AxonCounters, AxonalScheduler, DelayedDelivery};
pub use dendrite::{DendriteStats, DendriticIntegrator, DendriticOutput, SummationWindowConfig};
pub use health::{
    assess, DetailedHealthReport, HealthInputs, HealthIssue, HealthMetrics, HealthThresholds,
};
pub use neuron::{FiringStatus, Neuron};

// The crate's public surface re-exports the contract types callers wire
// against, so a fabric implementation only needs this crate.
pub use synfire_core::{
    HomeostasisConfig, LifecycleState, LigandKind, NeuralFabric, NeuralSignal, NeuronConfig,
    NeuronError, NoopFabric, PlasticityAdjustment, QueueConfig, ScalingConfig, SignalReceiver,
    StdpConfig, SynapseCriteria, SynapseDescriptor,
};
pub use synfire_plasticity::{HomeostaticInfo, SynapticScalingInfo};
