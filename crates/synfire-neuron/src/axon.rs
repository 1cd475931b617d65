//! Axonal delivery scheduling.
//!
//! Outgoing spikes carry a per-output delay. The scheduler queues them as
//! [`DelayedDelivery`] records and the owning loop's dispatch pass releases
//! every record whose deadline has elapsed, in deadline order (stable for
//! ties). A full queue degrades gracefully: the spike is delivered
//! immediately instead of being dropped, and the fallback is counted.
//!
//! Receiver errors are swallowed. A lost spike models synaptic dropout;
//! the count surfaces through health, never through the loop.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tracing::{trace, warn};

use synfire_core::traits::SignalReceiver;
use synfire_core::types::NeuralSignal;

/// One spike awaiting its delivery deadline
pub struct DelayedDelivery {
    /// The spike to deliver
    pub signal: NeuralSignal,
    /// Target handle
    pub target: Arc<dyn SignalReceiver>,
    /// Deadline after which the spike is released
    pub deliver_at: Instant,
}

impl std::fmt::Debug for DelayedDelivery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DelayedDelivery")
            .field("target", &self.target.receiver_id())
            .field("deliver_at", &self.deliver_at)
            .field("value", &self.signal.value)
            .finish()
    }
}

/// Shared delivery counters read by the health subsystem
#[derive(Debug, Default)]
pub struct AxonCounters {
    /// Spikes delivered on schedule
    pub delivered: AtomicU64,
    /// Spikes delivered immediately because the queue was full
    pub fallback_deliveries: AtomicU64,
    /// Deliveries swallowed after a receiver error
    pub swallowed: AtomicU64,
}

/// Queue of delayed outgoing spikes with deadline-ordered dispatch
pub struct AxonalScheduler {
    tx: mpsc::Sender<DelayedDelivery>,
    rx: mpsc::Receiver<DelayedDelivery>,
    pending: Vec<DelayedDelivery>,
    counters: Arc<AxonCounters>,
    closed_observed: bool,
}

impl AxonalScheduler {
    pub fn new(capacity: usize, counters: Arc<AxonCounters>) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        Self {
            tx,
            rx,
            pending: Vec::new(),
            counters,
            closed_observed: false,
        }
    }

    /// Enqueue a spike for delivery after `delay`.
    ///
    /// A full queue falls back to immediate delivery; a closed queue is
    /// logged once and further schedules are ignored.
    pub fn schedule(
        &mut self,
        signal: NeuralSignal,
        target: Arc<dyn SignalReceiver>,
        delay: Duration,
        now: Instant,
    ) {
        let delivery = DelayedDelivery {
            deliver_at: now + delay,
            signal,
            target,
        };
        match self.tx.try_send(delivery) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(delivery)) => {
                trace!(
                    target_id = delivery.target.receiver_id(),
                    "axonal queue full, delivering immediately"
                );
                self.counters
                    .fallback_deliveries
                    .fetch_add(1, Ordering::Relaxed);
                Self::deliver(&self.counters, delivery);
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                if !self.closed_observed {
                    warn!("axonal queue closed, discarding outgoing spikes");
                    self.closed_observed = true;
                }
            }
        }
    }

    /// Release every spike whose deadline has elapsed.
    ///
    /// Drains newly queued items into the pending list, stable-sorts by
    /// deadline, delivers the due prefix, retains the rest. Returns the
    /// number delivered.
    pub fn dispatch(&mut self, now: Instant) -> usize {
        while let Ok(delivery) = self.rx.try_recv() {
            self.pending.push(delivery);
        }
        if self.pending.is_empty() {
            return 0;
        }

        self.pending.sort_by_key(|d| d.deliver_at);
        let due = self.pending.partition_point(|d| d.deliver_at <= now);
        let mut delivered = 0;
        for delivery in self.pending.drain(..due) {
            if Self::deliver(&self.counters, delivery) {
                delivered += 1;
            }
        }
        delivered
    }

    fn deliver(counters: &AxonCounters, delivery: DelayedDelivery) -> bool {
        match delivery.target.deliver(delivery.signal) {
            Ok(()) => {
                counters.delivered.fetch_add(1, Ordering::Relaxed);
                true
            }
            Err(err) => {
                // Dropout: the spike is lost, the neuron moves on
                trace!(
                    target_id = delivery.target.receiver_id(),
                    error = %err,
                    "delivery swallowed"
                );
                counters.swallowed.fetch_add(1, Ordering::Relaxed);
                false
            }
        }
    }

    /// Entries waiting for their deadline
    pub fn backlog(&self) -> usize {
        self.pending.len()
    }

    /// Discard every queued and pending delivery (shutdown path)
    pub fn cancel_all(&mut self) -> usize {
        let mut cancelled = self.pending.len();
        self.pending.clear();
        while self.rx.try_recv().is_ok() {
            cancelled += 1;
        }
        cancelled
    }
}

impl std::fmt::Debug for AxonalScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AxonalScheduler")
            .field("pending", &self.pending.len())
            .field("closed_observed", &self.closed_observed)
            .finish()
    }
}
