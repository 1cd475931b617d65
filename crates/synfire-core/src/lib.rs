//! # Synfire Core - Signals, Identities, and Fabric Contracts
//!
//! Foundational types for the Synfire spiking-neuron runtime:
//!
//! - **Signals**: [`NeuralSignal`] spikes with chemical context,
//!   [`ElectricalSignal`] broadcasts
//! - **Identities**: string-token [`NeuronId`] / [`SynapseId`] /
//!   [`SourceId`] compared by exact equality, [`LifecycleState`] machine
//! - **Synapses**: read-only [`SynapseDescriptor`] views of fabric-owned
//!   records, [`PlasticityAdjustment`] messages flowing neuron → fabric
//! - **Fabric contract**: the [`NeuralFabric`] callback bundle and the
//!   [`SignalReceiver`] target handle
//! - **Configuration**: [`NeuronConfig`] with clamp-and-continue
//!   validation
//! - **Errors**: the recoverable [`NeuronError`] taxonomy
//!
//! Neurons hold identities, never references, toward synapses and other
//! neurons; the fabric owns every cross-neuron record. That one rule keeps
//! reference cycles out of the runtime.

pub mod config;
pub mod error;
pub mod traits;
pub mod types;

pub use config::{
    HomeostasisConfig, NeuronConfig, QueueConfig, ScalingConfig, StdpConfig, MAX_INPUT_GAIN,
    MIN_INPUT_GAIN, THRESHOLD_MAX_FACTOR, THRESHOLD_MIN_FACTOR,
};
pub use error::{DeliveryError, NeuronError, Result};
pub use traits::{
    FabricResult, HealthReport, NeuralFabric, NoopFabric, SignalReceiver, SynapseSpec,
};
pub use types::{
    ComponentKind, ElectricalSignal, LifecycleState, LigandKind, NeuralSignal, NeuronId,
    PlasticityAdjustment, PlasticityEventKind, SourceId, SynapseCriteria, SynapseDescriptor,
    SynapseId,
};
