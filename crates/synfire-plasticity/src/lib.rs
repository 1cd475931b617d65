//! # Synfire Plasticity - Adaptation Controllers
//!
//! The three plasticity mechanisms a Synfire neuron runs on distinct
//! timescales:
//!
//! - **Homeostasis** (hundreds of milliseconds): threshold adaptation
//!   toward a target firing rate, with a calcium activity proxy —
//!   [`HomeostaticController`]
//! - **Synaptic scaling** (seconds): multiplicative per-source receptor
//!   gain regulation toward a target aggregate input strength, gated on
//!   calcium, firing rate, and deviation significance —
//!   [`SynapticScalingController`]
//! - **STDP feedback** (milliseconds, retrospective): per-fire scan of
//!   recently active inbound synapses, emitting timing-signed
//!   adjustments the fabric applies — [`StdpFeedbackEngine`]
//!
//! Controllers are plain state machines: no locks, no tasks, no fabric
//! handles. The owning neuron drives them from its loop and performs all
//! callback traffic itself, which is what keeps the runtime's lock
//! ordering trivial to audit.

pub mod history;
pub mod homeostasis;
pub mod scaling;
pub mod stdp;

pub use history::{FiringHistory, SampleHistory};
pub use homeostasis::{HomeostaticController, HomeostaticInfo};
pub use scaling::{
    ScalingGate, ScalingOutcome, SynapticScalingController, SynapticScalingInfo,
};
pub use stdp::{ScheduledFeedback, StdpFeedbackEngine};
