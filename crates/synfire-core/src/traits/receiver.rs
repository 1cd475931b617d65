//! Target handles for spike delivery.

use crate::error::DeliveryError;
use crate::types::NeuralSignal;

/// A component able to accept spikes.
///
/// `deliver` must be non-blocking: the axonal scheduler calls it from the
/// owning neuron's loop and must never stall behind a slow receiver. A full
/// receiver signals back-pressure through [`DeliveryError::QueueFull`]; the
/// sender treats the lost spike as dropout.
pub trait SignalReceiver: Send + Sync {
    /// Identity of the receiving component
    fn receiver_id(&self) -> &str;

    /// Accept one signal without blocking
    fn deliver(&self, signal: NeuralSignal) -> Result<(), DeliveryError>;
}
