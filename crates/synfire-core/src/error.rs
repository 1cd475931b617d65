//! Error types for the Synfire runtime.
//!
//! Every kind here is recoverable: the owning neuron clamps, counts, or
//! degrades and keeps running. Errors never propagate synchronously across
//! neurons; the fabric observes failures through the health surface.

use thiserror::Error;

/// Errors surfaced by a neuron or one of its subsystems
#[derive(Debug, Error)]
pub enum NeuronError {
    #[error("input queue full, signal dropped")]
    InputQueueFull,

    #[error("history buffer at capacity: {0}")]
    HistoryOverflow(String),

    #[error("strategy failure in {strategy}: {reason}")]
    StrategyFailure { strategy: String, reason: String },

    #[error("no fabric callbacks configured")]
    CallbackMissing,

    #[error("fabric callback exceeded deadline")]
    CallbackTimeout,

    #[error("invalid parameter {name}={value}, clamped to {clamped_to}")]
    InvalidParameter {
        name: &'static str,
        value: f64,
        clamped_to: f64,
    },

    #[error("neuron is shutting down")]
    ShuttingDown,

    #[error("{quantity}={value} outside bound {bound}")]
    BoundViolation {
        quantity: &'static str,
        value: f64,
        bound: f64,
    },

    #[error("invalid lifecycle transition: current={from}, attempted={to}")]
    InvalidTransition { from: String, to: String },
}

impl NeuronError {
    /// Whether the caller may simply retry or continue
    pub fn is_benign(&self) -> bool {
        matches!(
            self,
            NeuronError::InputQueueFull
                | NeuronError::ShuttingDown
                | NeuronError::CallbackMissing
                | NeuronError::CallbackTimeout
        )
    }
}

/// Result type for neuron operations
pub type Result<T> = std::result::Result<T, NeuronError>;

/// Error returned by a signal receiver when delivery fails
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("receiver queue full")]
    QueueFull,

    #[error("receiver closed")]
    Closed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_benign_kinds() {
        assert!(NeuronError::InputQueueFull.is_benign());
        assert!(NeuronError::ShuttingDown.is_benign());
        assert!(!NeuronError::StrategyFailure {
            strategy: "active_dendrite".into(),
            reason: "non-finite contribution".into(),
        }
        .is_benign());
    }

    #[test]
    fn test_error_display() {
        let err = NeuronError::InvalidParameter {
            name: "decay_rate",
            value: -0.5,
            clamped_to: 0.0,
        };
        assert_eq!(
            err.to_string(),
            "invalid parameter decay_rate=-0.5, clamped to 0"
        );
    }

    #[test]
    fn test_overflow_and_bound_kinds() {
        let overflow = NeuronError::HistoryOverflow("scaling factors".into());
        assert_eq!(overflow.to_string(), "history buffer at capacity: scaling factors");
        assert!(!overflow.is_benign());

        let bound = NeuronError::BoundViolation {
            quantity: "input_gain",
            value: 250.0,
            bound: 100.0,
        };
        assert_eq!(bound.to_string(), "input_gain=250 outside bound 100");
    }
}
