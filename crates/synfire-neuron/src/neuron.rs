//! The neuron core: state machine, event loop, and lock discipline.
//!
//! Each neuron owns exactly one loop task. External threads interact
//! through the bounded input queue and a small set of mutexed accessors;
//! everything else happens on the loop. One `parking_lot::RwLock` guards
//! the mutable state; the output table lives in a `DashMap` so wiring
//! changes never contend with membrane updates.
//!
//! The one rule every path here honors: **no fabric callback while the
//! state lock is held**. Snapshot under the lock, release, call out,
//! re-acquire to merge. The deadlock regression tests exist to keep it
//! that way.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::{timeout, MissedTickBehavior};
use tracing::{debug, info, trace, warn};

use synfire_core::config::{NeuronConfig, StdpConfig};
use synfire_core::error::{DeliveryError, NeuronError, Result};
use synfire_core::traits::{NeuralFabric, SignalReceiver};
use synfire_core::types::{
    ElectricalSignal, LifecycleState, LigandKind, NeuralSignal, NeuronId, SourceId,
    SynapseCriteria,
};
use synfire_plasticity::{
    HomeostaticController, HomeostaticInfo, StdpFeedbackEngine, SynapticScalingController,
    SynapticScalingInfo,
};

use crate::axon::{AxonCounters, AxonalScheduler};
use crate::dendrite::DendriticIntegrator;
use crate::health::{
    assess, sorted_gains, DetailedHealthReport, HealthInputs, HealthMetrics, HealthThresholds,
};

/// Snapshot of the firing machinery
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FiringStatus {
    /// Whether the refractory gate is currently closed
    pub is_refractory: bool,
    /// Time since the last fire, None if the neuron never fired
    pub time_since_last_fire: Option<Duration>,
    /// Current membrane accumulator
    pub accumulator: f64,
    /// Current adaptive threshold
    pub current_threshold: f64,
    /// Firing rate over the activity window, Hz
    pub firing_rate: f64,
}

/// One registered output connection
struct OutputConnection {
    target: Arc<dyn SignalReceiver>,
    weight: f64,
    delay: Duration,
    /// Per-output STDP override, recorded for the fabric's synapse bookkeeping
    stdp: Option<StdpConfig>,
}

/// Everything a fire decides before the state lock is released
struct FirePlan {
    amplitude: f64,
    fired_at: Instant,
    release: Option<(LigandKind, f64)>,
}

/// Mutable neuron state, all behind one lock
struct NeuronState {
    current_threshold: f64,
    accumulator: f64,
    last_fire: Option<Instant>,
    started_at: Instant,
    homeostasis: HomeostaticController,
    scaling: SynapticScalingController,
    stdp: StdpFeedbackEngine,
    dendrite: DendriticIntegrator,
}

/// Monotonic event counters, shared with health queries
#[derive(Debug, Default)]
struct RuntimeCounters {
    dropped_inputs: AtomicU64,
    feedback_runs: AtomicU64,
    adjustments_emitted: AtomicU64,
    strategy_failures: AtomicU64,
}

struct NeuronInner {
    id: NeuronId,
    config: NeuronConfig,
    state: RwLock<NeuronState>,
    lifecycle: RwLock<LifecycleState>,
    outputs: DashMap<String, OutputConnection>,
    input_tx: mpsc::Sender<NeuralSignal>,
    input_rx: Mutex<Option<mpsc::Receiver<NeuralSignal>>>,
    fabric: RwLock<Option<Arc<dyn NeuralFabric>>>,
    shutdown: Notify,
    task: Mutex<Option<JoinHandle<()>>>,
    axon_counters: Arc<AxonCounters>,
    axon_backlog: AtomicUsize,
    counters: RuntimeCounters,
    health_thresholds: HealthThresholds,
}

/// A concurrently adaptable spiking neuron.
///
/// Cheap to clone: clones share the same underlying state and loop task.
#[derive(Clone)]
pub struct Neuron {
    inner: Arc<NeuronInner>,
}

impl Neuron {
    /// Build a neuron from a configuration.
    ///
    /// Out-of-range parameters are clamped (and logged), never rejected.
    /// The neuron starts in `Initialized`; call [`Neuron::start`] to spawn
    /// its loop.
    pub fn new(mut config: NeuronConfig) -> Self {
        config.validate();

        let (input_tx, input_rx) = mpsc::channel(config.queues.input_capacity.max(1));
        let state = NeuronState {
            current_threshold: config.base_threshold,
            accumulator: 0.0,
            last_fire: None,
            started_at: Instant::now(),
            homeostasis: HomeostaticController::new(config.homeostasis.clone(), config.base_threshold),
            scaling: SynapticScalingController::new(config.scaling.clone()),
            stdp: StdpFeedbackEngine::new(config.stdp.clone()),
            dendrite: DendriticIntegrator::default(),
        };

        Self {
            inner: Arc::new(NeuronInner {
                id: config.id.clone(),
                state: RwLock::new(state),
                lifecycle: RwLock::new(LifecycleState::Initialized),
                outputs: DashMap::new(),
                input_tx,
                input_rx: Mutex::new(Some(input_rx)),
                fabric: RwLock::new(None),
                shutdown: Notify::new(),
                task: Mutex::new(None),
                axon_counters: Arc::new(AxonCounters::default()),
                axon_backlog: AtomicUsize::new(0),
                counters: RuntimeCounters::default(),
                health_thresholds: HealthThresholds::default(),
                config,
            }),
        }
    }

    pub fn id(&self) -> &NeuronId {
        &self.inner.id
    }

    pub fn lifecycle_state(&self) -> LifecycleState {
        *self.inner.lifecycle.read()
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Transition to `Running` and spawn the loop task. Idempotent.
    pub async fn start(&self) -> Result<()> {
        {
            let current = *self.inner.lifecycle.read();
            match current {
                LifecycleState::Running => return Ok(()),
                LifecycleState::Initialized => {}
                other => {
                    return Err(NeuronError::InvalidTransition {
                        from: other.description().to_string(),
                        to: LifecycleState::Running.description().to_string(),
                    })
                }
            }
        }

        let Some(rx) = self.inner.input_rx.lock().take() else {
            return Ok(());
        };

        {
            let mut state = self.inner.state.write();
            state.started_at = Instant::now();
        }
        *self.inner.lifecycle.write() = LifecycleState::Running;

        let axon = AxonalScheduler::new(
            self.inner.config.queues.axon_capacity,
            self.inner.axon_counters.clone(),
        );
        let inner = self.inner.clone();
        let handle = tokio::spawn(run_loop(inner, rx, axon));
        *self.inner.task.lock() = Some(handle);

        info!(neuron = %self.inner.id, "neuron started");
        report_state_change(
            &self.inner,
            LifecycleState::Initialized,
            LifecycleState::Running,
        )
        .await;
        Ok(())
    }

    /// Transition to `Stopping`, wait for the loop to drain, land in
    /// `Stopped`. Idempotent: a second close is a no-op.
    pub async fn close(&self) -> Result<()> {
        let current = *self.inner.lifecycle.read();
        match current {
            LifecycleState::Stopped | LifecycleState::Stopping => return Ok(()),
            LifecycleState::Initialized => {
                // Never started: no loop to drain
                *self.inner.lifecycle.write() = LifecycleState::Stopped;
                self.inner.state.write().stdp.cancel_all();
                report_state_change(&self.inner, current, LifecycleState::Stopped).await;
                return Ok(());
            }
            LifecycleState::Running => {}
        }

        *self.inner.lifecycle.write() = LifecycleState::Stopping;
        self.inner.shutdown.notify_one();

        let handle = self.inner.task.lock().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Inbound
    // ------------------------------------------------------------------

    /// Non-blocking enqueue of one signal.
    ///
    /// Returns [`NeuronError::InputQueueFull`] when the newest signal is
    /// dropped under load and [`NeuronError::ShuttingDown`] once the
    /// neuron no longer accepts input. Both are benign.
    pub fn receive(&self, signal: NeuralSignal) -> Result<()> {
        if !self.inner.lifecycle.read().accepts_input() {
            return Err(NeuronError::ShuttingDown);
        }
        match self.inner.input_tx.try_send(signal) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.inner.counters.dropped_inputs.fetch_add(1, Ordering::Relaxed);
                Err(NeuronError::InputQueueFull)
            }
            Err(mpsc::error::TrySendError::Closed(_)) => Err(NeuronError::ShuttingDown),
        }
    }

    // ------------------------------------------------------------------
    // Wiring
    // ------------------------------------------------------------------

    /// Register an output connection under a caller-chosen name
    pub fn add_output(
        &self,
        name: impl Into<String>,
        target: Arc<dyn SignalReceiver>,
        weight: f64,
        delay: Duration,
    ) {
        self.inner.outputs.insert(
            name.into(),
            OutputConnection {
                target,
                weight,
                delay,
                stdp: None,
            },
        );
    }

    /// Register an output carrying its own STDP configuration
    pub fn add_output_with_stdp(
        &self,
        name: impl Into<String>,
        target: Arc<dyn SignalReceiver>,
        weight: f64,
        delay: Duration,
        stdp: StdpConfig,
    ) {
        self.inner.outputs.insert(
            name.into(),
            OutputConnection {
                target,
                weight,
                delay,
                stdp: Some(stdp),
            },
        );
    }

    /// Remove an output; returns whether it existed
    pub fn remove_output(&self, name: &str) -> bool {
        self.inner.outputs.remove(name).is_some()
    }

    /// The STDP configuration an output carries, if any
    pub fn output_stdp_config(&self, name: &str) -> Option<StdpConfig> {
        self.inner
            .outputs
            .get(name)
            .and_then(|conn| conn.stdp.clone())
    }

    /// Registered output count
    pub fn output_count(&self) -> usize {
        self.inner.outputs.len()
    }

    /// Wire an output through the fabric.
    ///
    /// Asks the fabric to create the synapse record and to resolve the
    /// spatial delay toward the target, then registers the output under
    /// the returned synapse id. Falls back to a zero delay when the
    /// lookup fails; fails only when no bundle is installed or the
    /// creation itself times out.
    pub async fn connect_via_fabric(
        &self,
        target_id: impl Into<NeuronId>,
        target: Arc<dyn SignalReceiver>,
        weight: f64,
    ) -> Result<synfire_core::SynapseId> {
        let fabric = self.inner.fabric.read().clone();
        let Some(fabric) = fabric else {
            return Err(NeuronError::CallbackMissing);
        };
        let deadline = self.inner.config.queues.callback_deadline;
        let target_id = target_id.into();

        let delay = match timeout(deadline, fabric.spatial_delay(target_id.clone())).await {
            Ok(Ok(delay)) => delay,
            _ => Duration::ZERO,
        };

        let spec = synfire_core::SynapseSpec {
            source_id: self.inner.id.clone(),
            target_id,
            weight,
            delay,
        };
        let synapse_id = match timeout(deadline, fabric.create_synapse(spec)).await {
            Ok(Ok(id)) => id,
            Ok(Err(err)) => {
                warn!(neuron = %self.inner.id, error = %err, "synapse creation failed");
                return Err(NeuronError::CallbackMissing);
            }
            Err(_) => return Err(NeuronError::CallbackTimeout),
        };

        self.add_output(synapse_id.clone(), target, weight, delay);
        Ok(synapse_id)
    }

    // ------------------------------------------------------------------
    // Configuration surfaces
    // ------------------------------------------------------------------

    /// Install the fabric callback bundle
    pub fn set_callbacks(&self, fabric: Arc<dyn NeuralFabric>) {
        *self.inner.fabric.write() = Some(fabric);
    }

    /// Swap the dendritic integration strategy
    pub fn set_dendritic_strategy(&self, integrator: DendriticIntegrator) {
        debug!(neuron = %self.inner.id, strategy = integrator.name(), "dendritic strategy set");
        self.inner.state.write().dendrite = integrator;
    }

    /// Enable synaptic scaling toward a target aggregate input strength
    pub fn enable_synaptic_scaling(&self, target: f64, rate: f64, interval: Duration) {
        self.inner.state.write().scaling.enable(target, rate, interval);
    }

    /// Reconfigure homeostasis; 0/0 disables and resets threshold,
    /// calcium, and firing history
    pub fn set_homeostatic_parameters(&self, target_rate: f64, strength: f64) {
        let mut state = self.inner.state.write();
        let threshold = state.current_threshold;
        state.current_threshold = state
            .homeostasis
            .set_parameters(target_rate, strength, threshold);
    }

    /// Enable STDP feedback scheduling
    pub fn enable_stdp_feedback(&self, feedback_delay: Duration, learning_rate: f64) {
        self.inner.state.write().stdp.enable(feedback_delay, learning_rate);
    }

    /// Disable STDP feedback; scheduled passes are dropped
    pub fn disable_stdp_feedback(&self) {
        self.inner.state.write().stdp.disable();
    }

    pub fn is_stdp_feedback_enabled(&self) -> bool {
        self.inner.state.read().stdp.is_enabled()
    }

    /// Set a per-source receptor gain; the stored (clamped) value is returned
    pub fn set_input_gain(&self, source: &SourceId, gain: f64) -> f64 {
        self.inner.state.write().scaling.set_gain(source, gain)
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    pub fn current_firing_rate(&self) -> f64 {
        self.inner.state.read().homeostasis.firing_rate(Instant::now())
    }

    pub fn current_threshold(&self) -> f64 {
        self.inner.state.read().current_threshold
    }

    pub fn base_threshold(&self) -> f64 {
        self.inner.config.base_threshold
    }

    pub fn calcium_level(&self) -> f64 {
        self.inner.state.read().homeostasis.calcium_level()
    }

    pub fn input_gains(&self) -> HashMap<SourceId, f64> {
        self.inner.state.read().scaling.gains().clone()
    }

    pub fn homeostatic_info(&self) -> HomeostaticInfo {
        self.inner.state.read().homeostasis.info(Instant::now())
    }

    pub fn synaptic_scaling_info(&self) -> SynapticScalingInfo {
        self.inner.state.read().scaling.info()
    }

    pub fn firing_status(&self) -> FiringStatus {
        let state = self.inner.state.read();
        let now = Instant::now();
        let since = state.last_fire.map(|at| now.duration_since(at));
        FiringStatus {
            is_refractory: since
                .map(|d| d < self.inner.config.refractory_period)
                .unwrap_or(false),
            time_since_last_fire: since,
            accumulator: state.accumulator,
            current_threshold: state.current_threshold,
            firing_rate: state.homeostasis.firing_rate(now),
        }
    }

    /// One read-consistent health assessment
    pub fn health_metrics(&self) -> HealthMetrics {
        let inputs = self.health_inputs();
        assess(&inputs, &self.inner.health_thresholds)
    }

    /// Full diagnostic snapshot, wall-clock stamped
    pub fn detailed_health_report(&self) -> DetailedHealthReport {
        let metrics = self.health_metrics();
        let state = self.inner.state.read();
        DetailedHealthReport {
            neuron_id: self.inner.id.clone(),
            lifecycle: *self.inner.lifecycle.read(),
            current_threshold: state.current_threshold,
            base_threshold: self.inner.config.base_threshold,
            calcium_level: state.homeostasis.calcium_level(),
            input_gains: sorted_gains(state.scaling.gains()),
            recent_scaling_factors: state.scaling.info().recent_factors,
            dendrite_strategy: state.dendrite.name().to_string(),
            dropped_inputs: self.inner.counters.dropped_inputs.load(Ordering::Relaxed),
            axon_fallback_deliveries: self
                .inner
                .axon_counters
                .fallback_deliveries
                .load(Ordering::Relaxed),
            swallowed_deliveries: self.inner.axon_counters.swallowed.load(Ordering::Relaxed),
            feedback_runs: self.inner.counters.feedback_runs.load(Ordering::Relaxed),
            adjustments_emitted: self
                .inner
                .counters
                .adjustments_emitted
                .load(Ordering::Relaxed),
            strategy_failures: self.inner.counters.strategy_failures.load(Ordering::Relaxed),
            generated_at: chrono::Utc::now(),
            metrics,
        }
    }

    /// Broadcast an electrical signal through the fabric
    pub async fn broadcast_electrical(&self, value: f64) -> Result<()> {
        let fabric = self.inner.fabric.read().clone();
        let Some(fabric) = fabric else {
            return Err(NeuronError::CallbackMissing);
        };
        let signal = ElectricalSignal::new(value, self.inner.id.clone());
        match timeout(
            self.inner.config.queues.callback_deadline,
            fabric.send_electrical(signal),
        )
        .await
        {
            Ok(Ok(())) => Ok(()),
            Ok(Err(err)) => {
                trace!(neuron = %self.inner.id, error = %err, "electrical broadcast failed");
                Ok(())
            }
            Err(_) => Err(NeuronError::CallbackTimeout),
        }
    }

    fn health_inputs(&self) -> HealthInputs {
        let now = Instant::now();
        let capacity = self.inner.config.queues.input_capacity;
        let available = self.inner.input_tx.capacity();
        let buffer_utilization = if capacity > 0 {
            1.0 - (available as f64 / capacity as f64)
        } else {
            0.0
        };

        let state = self.inner.state.read();
        let scaling_info = state.scaling.info();
        HealthInputs {
            firing_rate: state.homeostasis.firing_rate(now),
            target_rate: state.homeostasis.target_rate(),
            buffer_utilization,
            connection_count: self.inner.outputs.len(),
            threshold_ratio: state.current_threshold / self.inner.config.base_threshold,
            calcium: state.homeostasis.calcium_level(),
            gains: state.scaling.gains().clone(),
            scaling_enabled: scaling_info.enabled,
            scaling_oscillating: scaling_info.oscillating,
            recent_factors: scaling_info.recent_factors,
            dendrite: state.dendrite.stats(),
            dendrite_name: state.dendrite.name(),
            axon_backlog: self.inner.axon_backlog.load(Ordering::Relaxed),
            axon_capacity: self.inner.config.queues.axon_capacity,
            since_last_fire: state.last_fire.map(|at| now.duration_since(at)),
            uptime: now.duration_since(state.started_at),
            callbacks_present: self.inner.fabric.read().is_some(),
        }
    }
}

impl SignalReceiver for Neuron {
    fn receiver_id(&self) -> &str {
        &self.inner.id
    }

    fn deliver(&self, signal: NeuralSignal) -> std::result::Result<(), DeliveryError> {
        self.receive(signal).map_err(|err| match err {
            NeuronError::InputQueueFull => DeliveryError::QueueFull,
            _ => DeliveryError::Closed,
        })
    }
}

impl std::fmt::Debug for Neuron {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Neuron")
            .field("id", &self.inner.id)
            .field("lifecycle", &*self.inner.lifecycle.read())
            .field("outputs", &self.inner.outputs.len())
            .finish()
    }
}

// ----------------------------------------------------------------------
// Loop internals
// ----------------------------------------------------------------------

async fn run_loop(
    inner: Arc<NeuronInner>,
    mut rx: mpsc::Receiver<NeuralSignal>,
    mut axon: AxonalScheduler,
) {
    let mut tick = tokio::time::interval(inner.config.queues.tick_interval);
    tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let batch_size = inner.config.queues.batch_size.max(1);
    let health_interval = inner.config.queues.health_report_interval;
    let mut last_health_push = Instant::now();

    loop {
        tokio::select! {
            biased;
            _ = inner.shutdown.notified() => break,
            maybe = rx.recv() => {
                match maybe {
                    Some(first) => {
                        let mut batch = Vec::with_capacity(batch_size);
                        batch.push(first);
                        while batch.len() < batch_size {
                            match rx.try_recv() {
                                Ok(signal) => batch.push(signal),
                                Err(_) => break,
                            }
                        }
                        absorb_signals(&inner, batch);
                    }
                    None => break,
                }
            }
            _ = tick.tick() => {}
        }

        let now = Instant::now();
        if let Some(plan) = integrate(&inner, now) {
            propagate_fire(&inner, &plan, &mut axon, now);
            if let Some((ligand, concentration)) = plan.release {
                release_chemical(&inner, ligand, concentration).await;
            }
        }

        axon.dispatch(now);
        inner.axon_backlog.store(axon.backlog(), Ordering::Relaxed);

        run_plasticity_ticks(&inner, now);
        run_due_feedback(&inner, now).await;

        if !health_interval.is_zero() && now.duration_since(last_health_push) >= health_interval {
            last_health_push = now;
            push_health(&inner).await;
        }
    }

    // Stopping: drain pending inputs into the membrane, cancel what was
    // scheduled, and land in Stopped. No further outgoing spikes.
    rx.close();
    let mut drained = Vec::new();
    while let Ok(signal) = rx.try_recv() {
        drained.push(signal);
    }
    if !drained.is_empty() {
        absorb_signals(&inner, drained);
    }
    let cancelled_deliveries = axon.cancel_all();
    let cancelled_feedbacks = inner.state.write().stdp.cancel_all();
    debug!(
        neuron = %inner.id,
        cancelled_deliveries,
        cancelled_feedbacks,
        "neuron loop drained"
    );

    *inner.lifecycle.write() = LifecycleState::Stopped;
    report_state_change(&inner, LifecycleState::Stopping, LifecycleState::Stopped).await;
    info!(neuron = %inner.id, "neuron stopped");
}

/// Gain, record, and hand each signal to the dendrite.
///
/// Deposits are stamped with the arrival instant, not the emission
/// timestamp: axonal delay models travel time, the postsynaptic
/// potential starts on receipt.
fn absorb_signals(inner: &Arc<NeuronInner>, batch: Vec<NeuralSignal>) {
    let now = Instant::now();
    let mut state = inner.state.write();
    for signal in batch {
        let effective = state.scaling.apply_gain(&signal.source_id, signal.value);
        state.scaling.record_activity(&signal.source_id, effective, now);
        state.dendrite.deposit(effective, now);
    }
}

/// Advance the membrane and decide whether to fire.
///
/// Runs entirely under the state lock and returns everything the fire
/// needs so propagation can happen after release.
fn integrate(inner: &Arc<NeuronInner>, now: Instant) -> Option<FirePlan> {
    let mut state = inner.state.write();

    let output = match std::panic::catch_unwind(AssertUnwindSafe(|| state.dendrite.contribution(now)))
    {
        Ok(output) if output.contribution.is_finite() => output,
        Ok(_) => {
            quarantine_dendrite(inner, &mut state, "non-finite contribution");
            return None;
        }
        Err(_) => {
            quarantine_dendrite(inner, &mut state, "panic during integration");
            return None;
        }
    };

    state.accumulator = state.accumulator * inner.config.decay_rate + output.contribution;
    if !state.accumulator.is_finite() {
        warn!(neuron = %inner.id, "membrane accumulator went non-finite, resetting");
        state.accumulator = 0.0;
        return None;
    }

    // Refractory gate
    if let Some(last) = state.last_fire {
        if now.duration_since(last) < inner.config.refractory_period {
            return None;
        }
    }

    if state.accumulator < state.current_threshold {
        return None;
    }

    // Fire: reset, stamp, record, schedule feedback — exactly once
    let amplitude = state.accumulator * inner.config.fire_factor;
    state.accumulator = 0.0;
    state.last_fire = Some(now);
    state.homeostasis.on_fire(now);
    state.stdp.schedule_fire(now);

    trace!(neuron = %inner.id, amplitude, "fired");
    Some(FirePlan {
        amplitude,
        fired_at: now,
        release: inner
            .config
            .released_ligand
            .map(|ligand| (ligand, amplitude)),
    })
}

fn quarantine_dendrite(inner: &Arc<NeuronInner>, state: &mut NeuronState, reason: &str) {
    warn!(
        neuron = %inner.id,
        strategy = state.dendrite.name(),
        reason,
        "dendritic strategy failed, swapping to passive"
    );
    inner.counters.strategy_failures.fetch_add(1, Ordering::Relaxed);
    state.dendrite = DendriticIntegrator::passive();
}

/// Schedule one delayed delivery per output.
///
/// Runs without the state lock: the fire plan was snapshotted under it.
/// Delivered magnitude is capped at the output weight; the sign follows
/// the weight, so inhibitory outputs deliver negative values.
fn propagate_fire(
    inner: &Arc<NeuronInner>,
    plan: &FirePlan,
    axon: &mut AxonalScheduler,
    now: Instant,
) {
    for entry in inner.outputs.iter() {
        let conn = entry.value();
        let magnitude = plan.amplitude.abs().min(conn.weight.abs());
        let value = if conn.weight < 0.0 { -magnitude } else { magnitude };

        let mut signal =
            NeuralSignal::at(value, inner.id.clone(), plan.fired_at).with_synapse(entry.key().clone());
        if let Some(ligand) = inner.config.released_ligand {
            signal = signal.with_ligand(ligand);
        }
        axon.schedule(signal, conn.target.clone(), conn.delay, now);
    }
}

/// Homeostatic, scaling, and cleanup cadences, all under the state lock
fn run_plasticity_ticks(inner: &Arc<NeuronInner>, now: Instant) {
    let mut state = inner.state.write();

    if state.homeostasis.due(now) {
        let threshold = state.current_threshold;
        state.current_threshold = state.homeostasis.update(now, threshold);
    }

    if state.scaling.due(now) {
        let calcium = state.homeostasis.calcium_level();
        let rate = state.homeostasis.firing_rate(now);
        state.scaling.update(now, calcium, rate);
    }

    if state.scaling.cleanup_due(now) {
        state.scaling.cleanup(now);
    }
}

/// Execute due STDP feedback passes.
///
/// Snapshot the due list under the lock, release, list synapses through
/// the fabric, re-acquire to compute adjustments, release again to apply.
async fn run_due_feedback(inner: &Arc<NeuronInner>, now: Instant) {
    let due = inner.state.write().stdp.take_due(now);
    if due.is_empty() {
        return;
    }

    let fabric = inner.fabric.read().clone();
    let Some(fabric) = fabric else {
        // Missing bundle: feedback is a no-op; health surfaces it
        trace!(neuron = %inner.id, "feedback skipped, no fabric callbacks");
        return;
    };
    let deadline = inner.config.queues.callback_deadline;

    for feedback in due {
        inner.counters.feedback_runs.fetch_add(1, Ordering::Relaxed);

        let listed = timeout(
            deadline,
            fabric.list_synapses(SynapseCriteria::inbound_to(inner.id.clone())),
        )
        .await;
        let synapses = match listed {
            Ok(Ok(synapses)) => synapses,
            Ok(Err(err)) => {
                trace!(neuron = %inner.id, error = %err, "synapse listing failed");
                continue;
            }
            Err(_) => {
                trace!(neuron = %inner.id, "synapse listing timed out");
                continue;
            }
        };
        if synapses.is_empty() {
            continue;
        }

        let adjustments = {
            let state = inner.state.read();
            state.stdp.compute_adjustments(feedback.fired_at, &synapses)
        };

        for (synapse_id, adjustment) in adjustments {
            match timeout(deadline, fabric.apply_plasticity(synapse_id, adjustment)).await {
                Ok(Ok(())) => {
                    inner
                        .counters
                        .adjustments_emitted
                        .fetch_add(1, Ordering::Relaxed);
                }
                Ok(Err(err)) => {
                    trace!(neuron = %inner.id, error = %err, "plasticity application failed");
                }
                Err(_) => {
                    trace!(neuron = %inner.id, "plasticity application timed out");
                }
            }
        }
    }
}

async fn release_chemical(inner: &Arc<NeuronInner>, ligand: LigandKind, concentration: f64) {
    let fabric = inner.fabric.read().clone();
    let Some(fabric) = fabric else { return };
    let deadline = inner.config.queues.callback_deadline;
    if timeout(deadline, fabric.release_chemical(ligand, concentration))
        .await
        .is_err()
    {
        trace!(neuron = %inner.id, "chemical release timed out");
    }
}

async fn push_health(inner: &Arc<NeuronInner>) {
    let fabric = inner.fabric.read().clone();
    let Some(fabric) = fabric else { return };

    let neuron = Neuron { inner: inner.clone() };
    let report = neuron.health_metrics().to_report(&inner.id);
    let deadline = inner.config.queues.callback_deadline;
    if timeout(deadline, fabric.report_health(report)).await.is_err() {
        trace!(neuron = %inner.id, "health push timed out");
    }
}

async fn report_state_change(inner: &Arc<NeuronInner>, from: LifecycleState, to: LifecycleState) {
    let fabric = inner.fabric.read().clone();
    let Some(fabric) = fabric else { return };
    let deadline = inner.config.queues.callback_deadline;
    if timeout(deadline, fabric.report_state_change(inner.id.clone(), from, to))
        .await
        .is_err()
    {
        trace!(neuron = %inner.id, "state-change report timed out");
    }
}
