//! The fabric callback bundle.
//!
//! The fabric is the enclosing orchestration layer: it owns synapses,
//! spatial delays, chemical signaling, and component discovery. A neuron
//! consumes these capabilities through [`NeuralFabric`] and nothing else —
//! it never registers or manipulates synapses itself.
//!
//! Contract for every method: the caller invokes it **outside** its own
//! state lock and under a deadline. Plasticity application is one-way
//! (neuron → fabric); the fabric must not call back into the same neuron
//! synchronously.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{
    ComponentKind, ElectricalSignal, LifecycleState, LigandKind, NeuronId, PlasticityAdjustment,
    SynapseCriteria, SynapseDescriptor, SynapseId,
};

/// Result type for fabric operations
pub type FabricResult<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// Compact health summary pushed to the fabric
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    /// Reporting neuron
    pub neuron_id: NeuronId,
    /// Composite score in [0, 1]
    pub health_score: f64,
    /// Current firing rate in Hz
    pub activity_level: f64,
    /// Buffer utilization plus weighted subsystem activity, in [0, 1]
    pub processing_load: f64,
    /// Issue tags from the closed health vocabulary
    pub issues: Vec<String>,
    /// Wall-clock report time
    pub reported_at: DateTime<Utc>,
}

/// Request to create a synapse through the fabric
#[derive(Debug, Clone)]
pub struct SynapseSpec {
    pub source_id: NeuronId,
    pub target_id: NeuronId,
    pub weight: f64,
    pub delay: Duration,
}

/// Capability bundle provided by the enclosing fabric.
///
/// Every method is fallible from the neuron's point of view; failures are
/// swallowed locally (the neuron degrades, it never propagates them).
#[async_trait]
pub trait NeuralFabric: Send + Sync {
    /// List synapse records matching the criteria
    async fn list_synapses(&self, criteria: SynapseCriteria) -> FabricResult<Vec<SynapseDescriptor>>;

    /// Apply a plasticity adjustment to a synapse by id
    async fn apply_plasticity(
        &self,
        synapse_id: SynapseId,
        adjustment: PlasticityAdjustment,
    ) -> FabricResult<()>;

    /// Create a synapse, returning its identity
    async fn create_synapse(&self, spec: SynapseSpec) -> FabricResult<SynapseId>;

    /// Delete a synapse by id
    async fn delete_synapse(&self, synapse_id: SynapseId) -> FabricResult<()>;

    /// Fetch a single synapse record
    async fn get_synapse(&self, synapse_id: SynapseId) -> FabricResult<Option<SynapseDescriptor>>;

    /// Read a synapse weight
    async fn get_synapse_weight(&self, synapse_id: SynapseId) -> FabricResult<f64>;

    /// Overwrite a synapse weight
    async fn set_synapse_weight(&self, synapse_id: SynapseId, weight: f64) -> FabricResult<()>;

    /// Spatial (distance-derived) delay toward a target component
    async fn spatial_delay(&self, target_id: NeuronId) -> FabricResult<Duration>;

    /// Components of the given kind within the given radius
    async fn find_nearby(
        &self,
        kind: ComponentKind,
        radius_um: f64,
    ) -> FabricResult<Vec<NeuronId>>;

    /// Release a chemical ligand into the local volume
    async fn release_chemical(&self, ligand: LigandKind, concentration: f64) -> FabricResult<()>;

    /// Broadcast an electrical signal to coupled neighbors
    async fn send_electrical(&self, signal: ElectricalSignal) -> FabricResult<()>;

    /// Push a health summary
    async fn report_health(&self, report: HealthReport) -> FabricResult<()>;

    /// Notify a lifecycle transition
    async fn report_state_change(
        &self,
        neuron_id: NeuronId,
        from: LifecycleState,
        to: LifecycleState,
    ) -> FabricResult<()>;

    /// Opaque identity of the matrix behind this bundle
    async fn matrix_handle(&self) -> FabricResult<String> {
        Ok(String::from("matrix"))
    }
}

/// A fabric that accepts everything and returns nothing.
///
/// Useful as a stand-in where callback effects are irrelevant; with it in
/// place STDP feedback runs to completion and emits zero adjustments.
#[derive(Debug, Default)]
pub struct NoopFabric;

#[async_trait]
impl NeuralFabric for NoopFabric {
    async fn list_synapses(&self, _criteria: SynapseCriteria) -> FabricResult<Vec<SynapseDescriptor>> {
        Ok(Vec::new())
    }

    async fn apply_plasticity(
        &self,
        _synapse_id: SynapseId,
        _adjustment: PlasticityAdjustment,
    ) -> FabricResult<()> {
        Ok(())
    }

    async fn create_synapse(&self, spec: SynapseSpec) -> FabricResult<SynapseId> {
        Ok(format!("{}->{}", spec.source_id, spec.target_id))
    }

    async fn delete_synapse(&self, _synapse_id: SynapseId) -> FabricResult<()> {
        Ok(())
    }

    async fn get_synapse(&self, _synapse_id: SynapseId) -> FabricResult<Option<SynapseDescriptor>> {
        Ok(None)
    }

    async fn get_synapse_weight(&self, _synapse_id: SynapseId) -> FabricResult<f64> {
        Ok(0.0)
    }

    async fn set_synapse_weight(&self, _synapse_id: SynapseId, _weight: f64) -> FabricResult<()> {
        Ok(())
    }

    async fn spatial_delay(&self, _target_id: NeuronId) -> FabricResult<Duration> {
        Ok(Duration::ZERO)
    }

    async fn find_nearby(
        &self,
        _kind: ComponentKind,
        _radius_um: f64,
    ) -> FabricResult<Vec<NeuronId>> {
        Ok(Vec::new())
    }

    async fn release_chemical(&self, _ligand: LigandKind, _concentration: f64) -> FabricResult<()> {
        Ok(())
    }

    async fn send_electrical(&self, _signal: ElectricalSignal) -> FabricResult<()> {
        Ok(())
    }

    async fn report_health(&self, _report: HealthReport) -> FabricResult<()> {
        Ok(())
    }

    async fn report_state_change(
        &self,
        _neuron_id: NeuronId,
        _from: LifecycleState,
        _to: LifecycleState,
    ) -> FabricResult<()> {
        Ok(())
    }
}
