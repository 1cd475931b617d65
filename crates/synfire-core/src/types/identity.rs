//! Component identities and lifecycle states.

use serde::{Deserialize, Serialize};

/// Unique identifier for a neuron
pub type NeuronId = String;

/// Unique identifier for a synapse (fabric-owned)
pub type SynapseId = String;

/// Identifier of an input source as observed by a neuron.
///
/// Sources are usually neuron ids, but sensory gateways and test harnesses
/// inject signals under arbitrary names, so the neuron treats the source as
/// an opaque token compared by exact string equality.
pub type SourceId = String;

/// Kind of component addressable through the fabric
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ComponentKind {
    /// A spiking neuron
    Neuron,
    /// A synaptic connection record
    Synapse,
    /// A chemical or electrical gate
    Gate,
    /// The orchestration fabric itself
    Fabric,
}

/// Lifecycle state of a neuron
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LifecycleState {
    /// Created but not yet started
    Initialized,
    /// Loop task is live and processing
    Running,
    /// Close requested; loop is draining
    Stopping,
    /// Terminal state
    Stopped,
}

impl LifecycleState {
    /// Check if a state transition is valid.
    ///
    /// Re-entering the current state is always valid; every transition
    /// surface is idempotent.
    pub fn can_transition_to(&self, target: LifecycleState) -> bool {
        use LifecycleState::*;
        if *self == target {
            return true;
        }
        matches!(
            (self, target),
            (Initialized, Running)
                | (Initialized, Stopping)
                | (Running, Stopping)
                | (Stopping, Stopped)
        )
    }

    /// Whether the neuron still accepts inbound signals in this state
    pub fn accepts_input(&self) -> bool {
        matches!(self, LifecycleState::Running)
    }

    /// Human-readable description of the state
    pub fn description(&self) -> &'static str {
        match self {
            LifecycleState::Initialized => "initialized",
            LifecycleState::Running => "running",
            LifecycleState::Stopping => "stopping",
            LifecycleState::Stopped => "stopped",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_transitions() {
        assert!(LifecycleState::Initialized.can_transition_to(LifecycleState::Running));
        assert!(LifecycleState::Running.can_transition_to(LifecycleState::Stopping));
        assert!(LifecycleState::Stopping.can_transition_to(LifecycleState::Stopped));
    }

    #[test]
    fn test_invalid_transitions() {
        assert!(!LifecycleState::Stopped.can_transition_to(LifecycleState::Running));
        assert!(!LifecycleState::Stopping.can_transition_to(LifecycleState::Running));
        assert!(!LifecycleState::Initialized.can_transition_to(LifecycleState::Stopped));
    }

    #[test]
    fn test_self_transition_is_idempotent() {
        for state in [
            LifecycleState::Initialized,
            LifecycleState::Running,
            LifecycleState::Stopping,
            LifecycleState::Stopped,
        ] {
            assert!(state.can_transition_to(state));
        }
    }

    #[test]
    fn test_input_acceptance() {
        assert!(LifecycleState::Running.accepts_input());
        assert!(!LifecycleState::Stopping.accepts_input());
        assert!(!LifecycleState::Stopped.accepts_input());
    }
}
