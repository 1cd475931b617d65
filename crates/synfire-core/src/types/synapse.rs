//! Synapse descriptors and plasticity adjustments.
//!
//! Synapses are owned by the fabric and exposed to neurons as read-only
//! [`SynapseDescriptor`] records. A neuron never mutates a weight directly:
//! it emits a [`PlasticityAdjustment`] and the fabric applies it. Holding
//! identities instead of references is what keeps the neuron ↔ synapse ↔
//! neuron cycle out of the ownership graph.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::types::identity::{NeuronId, SynapseId};

/// Read-only view of a fabric-owned synapse
#[derive(Debug, Clone, PartialEq)]
pub struct SynapseDescriptor {
    /// Synapse identity
    pub id: SynapseId,
    /// Pre-synaptic neuron
    pub source_id: NeuronId,
    /// Post-synaptic neuron
    pub target_id: NeuronId,
    /// Current weight as recorded by the fabric
    pub weight: f64,
    /// Last instant a spike was transmitted through this synapse
    pub last_transmission: Option<Instant>,
    /// Last instant any activity (transmission or plasticity) touched it
    pub last_activity: Option<Instant>,
}

impl SynapseDescriptor {
    pub fn new(
        id: impl Into<SynapseId>,
        source_id: impl Into<NeuronId>,
        target_id: impl Into<NeuronId>,
        weight: f64,
    ) -> Self {
        Self {
            id: id.into(),
            source_id: source_id.into(),
            target_id: target_id.into(),
            weight,
            last_transmission: None,
            last_activity: None,
        }
    }

    /// Record a transmission instant, also counting as activity
    pub fn with_transmission(mut self, at: Instant) -> Self {
        self.last_transmission = Some(at);
        self.last_activity = Some(at);
        self
    }

    /// Advisory prunability check.
    ///
    /// A synapse reports prunable when its weight has fallen below
    /// `weight_floor` and nothing has touched it within
    /// `inactivity_window`. The fabric decides whether to act on it.
    pub fn is_prunable(&self, weight_floor: f64, inactivity_window: Duration) -> bool {
        if self.weight >= weight_floor {
            return false;
        }
        match self.last_activity {
            Some(at) => at.elapsed() >= inactivity_window,
            None => true,
        }
    }
}

/// Filter for synapse listing through the fabric
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SynapseCriteria {
    /// Only synapses originating from this neuron
    pub source_id: Option<NeuronId>,
    /// Only synapses targeting this neuron
    pub target_id: Option<NeuronId>,
    /// Only synapses at or above this weight
    pub min_weight: Option<f64>,
}

impl SynapseCriteria {
    /// All synapses targeting `target` (the inbound set used by STDP feedback)
    pub fn inbound_to(target: impl Into<NeuronId>) -> Self {
        Self {
            target_id: Some(target.into()),
            ..Self::default()
        }
    }

    /// All synapses originating at `source`
    pub fn outbound_from(source: impl Into<NeuronId>) -> Self {
        Self {
            source_id: Some(source.into()),
            ..Self::default()
        }
    }

    /// Whether a descriptor passes this filter
    pub fn matches(&self, synapse: &SynapseDescriptor) -> bool {
        if let Some(source) = &self.source_id {
            if &synapse.source_id != source {
                return false;
            }
        }
        if let Some(target) = &self.target_id {
            if &synapse.target_id != target {
                return false;
            }
        }
        if let Some(min) = self.min_weight {
            if synapse.weight < min {
                return false;
            }
        }
        true
    }
}

/// Kind of plasticity event that produced an adjustment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlasticityEventKind {
    /// Pairwise spike-timing adjustment
    PairwiseStdp,
    /// Rate-based scaling nudge
    ScalingNudge,
}

/// A signed pre/post timing adjustment emitted toward the fabric.
///
/// `delta_t` follows the convention `t_pre − t_post`: negative means the
/// pre-synaptic spike led the post-synaptic fire (causal, LTP), positive
/// means it trailed (anti-causal, LTD).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlasticityAdjustment {
    /// Pre-minus-post spike interval in milliseconds
    pub delta_t_ms: f64,
    /// Learning rate in effect when the adjustment was produced
    pub learning_rate: f64,
    /// What produced the adjustment
    pub event_kind: Option<PlasticityEventKind>,
}

impl PlasticityAdjustment {
    /// Pairwise STDP adjustment from a signed pre-minus-post interval
    pub fn pairwise(delta_t_ms: f64, learning_rate: f64) -> Self {
        Self {
            delta_t_ms,
            learning_rate,
            event_kind: Some(PlasticityEventKind::PairwiseStdp),
        }
    }

    /// Whether the pairing was causal (pre led post)
    pub fn is_causal(&self) -> bool {
        self.delta_t_ms < 0.0
    }
}
