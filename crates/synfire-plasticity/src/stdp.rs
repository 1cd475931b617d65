//! Spike-timing-dependent feedback.
//!
//! When the neuron fires, it owes every recently active inbound synapse a
//! verdict: did that synapse help cause the fire (pre led post, causal,
//! potentiate) or arrive too late (anti-causal, depress)? The engine
//! schedules one retrospective pass per fire and, when the pass runs,
//! turns a synapse-list snapshot into [`PlasticityAdjustment`]s for the
//! fabric to apply. The neuron never touches weights itself.
//!
//! The enabled flag is an atomic so toggling never needs the neuron's
//! state lock; in-flight passes observe the old value and finish
//! harmlessly.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use tracing::{debug, trace};

use synfire_core::config::StdpConfig;
use synfire_core::types::{PlasticityAdjustment, SynapseDescriptor, SynapseId};

/// One scheduled retrospective pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduledFeedback {
    /// The fire that triggered the pass
    pub fired_at: Instant,
    /// When the pass becomes runnable
    pub due_at: Instant,
}

/// Schedules and computes retrospective STDP feedback
#[derive(Debug)]
pub struct StdpFeedbackEngine {
    config: StdpConfig,
    enabled: AtomicBool,
    pending: VecDeque<ScheduledFeedback>,
}

impl StdpFeedbackEngine {
    pub fn new(config: StdpConfig) -> Self {
        let enabled = AtomicBool::new(config.enabled);
        Self {
            config,
            enabled,
            pending: VecDeque::new(),
        }
    }

    /// Atomically enable with fresh delay and learning rate
    pub fn enable(&mut self, feedback_delay: Duration, learning_rate: f64) {
        self.config.feedback_delay = feedback_delay;
        self.config.learning_rate = learning_rate.max(0.0);
        self.enabled.store(true, Ordering::SeqCst);
        debug!(?feedback_delay, learning_rate, "stdp feedback enabled");
    }

    /// Atomically disable; scheduled passes are dropped
    pub fn disable(&mut self) {
        self.enabled.store(false, Ordering::SeqCst);
        self.pending.clear();
        debug!("stdp feedback disabled");
    }

    /// Lock-free read of the enabled flag
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    pub fn learning_rate(&self) -> f64 {
        self.config.learning_rate
    }

    pub fn window(&self) -> Duration {
        self.config.window
    }

    pub fn feedback_delay(&self) -> Duration {
        self.config.feedback_delay
    }

    /// Schedule exactly one feedback pass for a fire at `fired_at`
    pub fn schedule_fire(&mut self, fired_at: Instant) {
        if !self.is_enabled() {
            return;
        }
        self.pending.push_back(ScheduledFeedback {
            fired_at,
            due_at: fired_at + self.config.feedback_delay,
        });
    }

    /// Pop every pass that has become runnable by `now`
    pub fn take_due(&mut self, now: Instant) -> Vec<ScheduledFeedback> {
        let mut due = Vec::new();
        while let Some(front) = self.pending.front() {
            if front.due_at <= now {
                due.push(*front);
                self.pending.pop_front();
            } else {
                break;
            }
        }
        due
    }

    /// Drop every scheduled pass (shutdown path)
    pub fn cancel_all(&mut self) -> usize {
        let cancelled = self.pending.len();
        self.pending.clear();
        cancelled
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Turn a synapse-list snapshot into adjustments for one fire.
    ///
    /// Pure computation over immutable inputs; callers run it without any
    /// lock held. Δt follows `t_pre − t_post`: negative when the synapse's
    /// last activity preceded the fire (causal). Pairings outside the
    /// window and synapses with no recorded activity are skipped. A zero
    /// learning rate still emits structurally complete adjustments.
    pub fn compute_adjustments(
        &self,
        fired_at: Instant,
        synapses: &[SynapseDescriptor],
    ) -> Vec<(SynapseId, PlasticityAdjustment)> {
        let window_ms = self.config.window.as_secs_f64() * 1e3;
        let mut adjustments = Vec::new();

        for synapse in synapses {
            let Some(pre_at) = synapse.last_activity.or(synapse.last_transmission) else {
                continue;
            };
            let delta_t_ms = signed_interval_ms(pre_at, fired_at);
            if !delta_t_ms.is_finite() || delta_t_ms.abs() > window_ms {
                trace!(synapse = %synapse.id, delta_t_ms, "pairing outside stdp window");
                continue;
            }
            adjustments.push((
                synapse.id.clone(),
                PlasticityAdjustment::pairwise(delta_t_ms, self.config.learning_rate),
            ));
        }

        adjustments
    }
}

/// Signed `a − b` in milliseconds
fn signed_interval_ms(a: Instant, b: Instant) -> f64 {
    if a >= b {
        a.duration_since(b).as_secs_f64() * 1e3
    } else {
        -(b.duration_since(a).as_secs_f64() * 1e3)
    }
}
