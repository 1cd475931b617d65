//! Neural signal values.
//!
//! A [`NeuralSignal`] is the unit of communication between neurons: one
//! spike, stamped at creation and immutable afterwards. Chemical context
//! travels on the signal as an optional [`LigandKind`] tag.

use std::time::Instant;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::identity::{NeuronId, SourceId, SynapseId};

/// Chemical messenger kinds recognized by the fabric
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LigandKind {
    /// Primary excitatory transmitter
    Glutamate,
    /// Primary inhibitory transmitter
    Gaba,
    /// Reward / plasticity modulation
    Dopamine,
    /// Mood / gain modulation
    Serotonin,
    /// Attention / encoding modulation
    Acetylcholine,
}

impl LigandKind {
    /// Whether release of this ligand excites downstream receptors
    pub fn is_excitatory(&self) -> bool {
        matches!(self, LigandKind::Glutamate | LigandKind::Acetylcholine)
    }
}

/// A single spike travelling between components.
///
/// Value semantics: construct once, never mutate. The timestamp is the
/// monotonic instant of emission, not of delivery; axonal delay is applied
/// by the sender's delivery scheduler.
#[derive(Debug, Clone, PartialEq)]
pub struct NeuralSignal {
    /// Unique event id, for tracing delivery paths
    pub event_id: Uuid,
    /// Signal amplitude; negative values are inhibitory
    pub value: f64,
    /// Emission instant
    pub timestamp: Instant,
    /// Component that emitted the signal
    pub source_id: SourceId,
    /// Synapse the signal travelled through, when known
    pub synapse_id: Option<SynapseId>,
    /// Chemical context, when the source releases a ligand
    pub ligand: Option<LigandKind>,
}

impl NeuralSignal {
    /// Create a signal stamped now
    pub fn new(value: f64, source_id: impl Into<SourceId>) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            value,
            timestamp: Instant::now(),
            source_id: source_id.into(),
            synapse_id: None,
            ligand: None,
        }
    }

    /// Create a signal with an explicit emission instant
    pub fn at(value: f64, source_id: impl Into<SourceId>, timestamp: Instant) -> Self {
        Self {
            timestamp,
            ..Self::new(value, source_id)
        }
    }

    /// Tag the signal with the synapse it travelled through
    pub fn with_synapse(mut self, synapse_id: impl Into<SynapseId>) -> Self {
        self.synapse_id = Some(synapse_id.into());
        self
    }

    /// Tag the signal with a chemical context
    pub fn with_ligand(mut self, ligand: LigandKind) -> Self {
        self.ligand = Some(ligand);
        self
    }

    /// Whether the signal drives the membrane toward threshold
    pub fn is_excitatory(&self) -> bool {
        self.value > 0.0
    }
}

/// A gap-junction style broadcast value.
///
/// Electrical signals bypass synaptic machinery entirely; the fabric fans
/// them out to electrically coupled neighbors.
#[derive(Debug, Clone, PartialEq)]
pub struct ElectricalSignal {
    /// Coupling current
    pub value: f64,
    /// Broadcasting neuron
    pub source_id: NeuronId,
    /// Emission instant
    pub timestamp: Instant,
}

impl ElectricalSignal {
    pub fn new(value: f64, source_id: impl Into<NeuronId>) -> Self {
        Self {
            value,
            source_id: source_id.into(),
            timestamp: Instant::now(),
        }
    }
}
