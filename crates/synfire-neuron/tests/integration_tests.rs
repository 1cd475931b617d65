//! End-to-end scenarios driving whole neurons against a recording fabric:
//! causal and anti-causal STDP weight movement, homeostatic threshold
//! adaptation in both directions, synaptic scaling gates, and the
//! boundary behaviors around missing callbacks and zero learning rates.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::time::sleep;

use synfire_core::traits::{FabricResult, HealthReport, NeuralFabric, SynapseSpec};
use synfire_core::types::{
    ComponentKind, ElectricalSignal, LifecycleState, LigandKind, NeuronId, PlasticityAdjustment,
    SynapseCriteria, SynapseDescriptor, SynapseId,
};
use synfire_neuron::{HomeostasisConfig, NeuralSignal, Neuron, NeuronConfig, ScalingConfig};

/// Fabric double that owns synapse records and applies a pairwise STDP
/// weight rule with LTD/LTP asymmetry 1.2, weights clamped to [0, 2].
struct RecordingFabric {
    synapses: Mutex<HashMap<SynapseId, SynapseDescriptor>>,
    applied: Mutex<Vec<(SynapseId, PlasticityAdjustment)>>,
    released: Mutex<Vec<(LigandKind, f64)>>,
    health_reports: Mutex<Vec<HealthReport>>,
    state_changes: Mutex<Vec<(NeuronId, LifecycleState, LifecycleState)>>,
}

const STDP_TAU_MS: f64 = 20.0;
const LTD_ASYMMETRY: f64 = 1.2;
const WEIGHT_MIN: f64 = 0.0;
const WEIGHT_MAX: f64 = 2.0;

impl RecordingFabric {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            synapses: Mutex::new(HashMap::new()),
            applied: Mutex::new(Vec::new()),
            released: Mutex::new(Vec::new()),
            health_reports: Mutex::new(Vec::new()),
            state_changes: Mutex::new(Vec::new()),
        })
    }

    fn insert_synapse(&self, descriptor: SynapseDescriptor) {
        self.synapses.lock().insert(descriptor.id.clone(), descriptor);
    }

    fn touch(&self, synapse_id: &str, at: Instant) {
        if let Some(synapse) = self.synapses.lock().get_mut(synapse_id) {
            synapse.last_transmission = Some(at);
            synapse.last_activity = Some(at);
        }
    }

    fn weight(&self, synapse_id: &str) -> f64 {
        self.synapses.lock()[synapse_id].weight
    }

    fn applied_count(&self) -> usize {
        self.applied.lock().len()
    }
}

#[async_trait]
impl NeuralFabric for RecordingFabric {
    async fn list_synapses(
        &self,
        criteria: SynapseCriteria,
    ) -> FabricResult<Vec<SynapseDescriptor>> {
        Ok(self
            .synapses
            .lock()
            .values()
            .filter(|s| criteria.matches(s))
            .cloned()
            .collect())
    }

    async fn apply_plasticity(
        &self,
        synapse_id: SynapseId,
        adjustment: PlasticityAdjustment,
    ) -> FabricResult<()> {
        self.applied.lock().push((synapse_id.clone(), adjustment));
        if let Some(synapse) = self.synapses.lock().get_mut(&synapse_id) {
            let kernel = (-adjustment.delta_t_ms.abs() / STDP_TAU_MS).exp();
            let dw = if adjustment.is_causal() {
                adjustment.learning_rate * kernel
            } else {
                -adjustment.learning_rate * LTD_ASYMMETRY * kernel
            };
            synapse.weight = (synapse.weight + dw).clamp(WEIGHT_MIN, WEIGHT_MAX);
        }
        Ok(())
    }

    async fn create_synapse(&self, spec: SynapseSpec) -> FabricResult<SynapseId> {
        let id = format!("{}->{}", spec.source_id, spec.target_id);
        self.insert_synapse(SynapseDescriptor::new(
            id.clone(),
            spec.source_id,
            spec.target_id,
            spec.weight,
        ));
        Ok(id)
    }

    async fn delete_synapse(&self, synapse_id: SynapseId) -> FabricResult<()> {
        self.synapses.lock().remove(&synapse_id);
        Ok(())
    }

    async fn get_synapse(&self, synapse_id: SynapseId) -> FabricResult<Option<SynapseDescriptor>> {
        Ok(self.synapses.lock().get(&synapse_id).cloned())
    }

    async fn get_synapse_weight(&self, synapse_id: SynapseId) -> FabricResult<f64> {
        Ok(self.synapses.lock().get(&synapse_id).map(|s| s.weight).unwrap_or(0.0))
    }

    async fn set_synapse_weight(&self, synapse_id: SynapseId, weight: f64) -> FabricResult<()> {
        if let Some(synapse) = self.synapses.lock().get_mut(&synapse_id) {
            synapse.weight = weight;
        }
        Ok(())
    }

    async fn spatial_delay(&self, _target_id: NeuronId) -> FabricResult<Duration> {
        Ok(Duration::from_millis(1))
    }

    async fn find_nearby(
        &self,
        _kind: ComponentKind,
        _radius_um: f64,
    ) -> FabricResult<Vec<NeuronId>> {
        Ok(Vec::new())
    }

    async fn release_chemical(&self, ligand: LigandKind, concentration: f64) -> FabricResult<()> {
        self.released.lock().push((ligand, concentration));
        Ok(())
    }

    async fn send_electrical(&self, _signal: ElectricalSignal) -> FabricResult<()> {
        Ok(())
    }

    async fn report_health(&self, report: HealthReport) -> FabricResult<()> {
        self.health_reports.lock().push(report);
        Ok(())
    }

    async fn report_state_change(
        &self,
        neuron_id: NeuronId,
        from: LifecycleState,
        to: LifecycleState,
    ) -> FabricResult<()> {
        self.state_changes.lock().push((neuron_id, from, to));
        Ok(())
    }
}

fn post_neuron_config(id: &str) -> NeuronConfig {
    let mut config = NeuronConfig::new(id);
    config.base_threshold = 1.0;
    config.refractory_period = Duration::from_millis(3);
    config
}

/// Drive the neuron with one strong suprathreshold input and give the
/// loop time to fire and run its feedback pass.
async fn pair_once(neuron: &Neuron, fabric: &RecordingFabric, synapse_id: &str, pre_lead: i64) {
    if pre_lead >= 0 {
        // Causal: pre activity first, post fire pre_lead ms later
        fabric.touch(synapse_id, Instant::now());
        sleep(Duration::from_millis(pre_lead as u64)).await;
        let _ = neuron.receive(NeuralSignal::new(3.0, "driver"));
    } else {
        // Anti-causal: post fires first, pre activity follows
        let _ = neuron.receive(NeuralSignal::new(3.0, "driver"));
        sleep(Duration::from_millis((-pre_lead) as u64)).await;
        fabric.touch(synapse_id, Instant::now());
    }
    // Let the fire, the feedback delay, and the apply round-trip finish
    sleep(Duration::from_millis(40)).await;
}

#[tokio::test]
async fn test_causal_stdp_strengthens_synapse() {
    let fabric = RecordingFabric::new();
    fabric.insert_synapse(SynapseDescriptor::new("p->q", "p", "q", 0.8));

    let neuron = Neuron::new(post_neuron_config("q"));
    neuron.set_callbacks(fabric.clone());
    neuron.enable_stdp_feedback(Duration::from_millis(5), 0.02);
    neuron.start().await.unwrap();

    for _ in 0..20 {
        pair_once(&neuron, &fabric, "p->q", 5).await;
    }
    neuron.close().await.unwrap();

    let final_weight = fabric.weight("p->q");
    assert!(
        final_weight > 0.8,
        "causal pairing should potentiate: {final_weight}"
    );
    assert!(final_weight <= WEIGHT_MAX);
    assert!(fabric.applied_count() >= 10);
    assert!(fabric
        .applied
        .lock()
        .iter()
        .all(|(_, adj)| adj.is_causal()));
}

#[tokio::test]
async fn test_anti_causal_stdp_weakens_synapse() {
    let fabric = RecordingFabric::new();
    fabric.insert_synapse(SynapseDescriptor::new("p->q", "p", "q", 0.8));

    let neuron = Neuron::new(post_neuron_config("q"));
    neuron.set_callbacks(fabric.clone());
    // Delay the feedback pass past the trailing pre spike
    neuron.enable_stdp_feedback(Duration::from_millis(20), 0.02);
    neuron.start().await.unwrap();

    for _ in 0..20 {
        pair_once(&neuron, &fabric, "p->q", -10).await;
    }
    neuron.close().await.unwrap();

    let final_weight = fabric.weight("p->q");
    assert!(
        final_weight < 0.8,
        "anti-causal pairing should depress: {final_weight}"
    );
    assert!(final_weight >= WEIGHT_MIN);
}

#[tokio::test]
async fn test_homeostasis_raises_threshold_under_drive() {
    let mut config = post_neuron_config("h-up");
    config.homeostasis = HomeostasisConfig {
        target_firing_rate: 5.0,
        strength: 0.05,
        activity_window: Duration::from_secs(1),
        update_interval: Duration::from_millis(100),
        ..Default::default()
    };
    let neuron = Neuron::new(config);
    neuron.start().await.unwrap();

    // 100 Hz drive for 300 ms, well above the 5 Hz target
    for _ in 0..30 {
        let _ = neuron.receive(NeuralSignal::new(2.0, "driver"));
        sleep(Duration::from_millis(10)).await;
    }
    sleep(Duration::from_secs(1)).await;

    let threshold = neuron.current_threshold();
    assert!(
        threshold > 1.0,
        "overdriven neuron should raise threshold: {threshold}"
    );
    neuron.close().await.unwrap();
}

#[tokio::test]
async fn test_homeostasis_lowers_threshold_when_quiet() {
    let mut config = post_neuron_config("h-down");
    config.base_threshold = 2.0;
    config.homeostasis = HomeostasisConfig {
        target_firing_rate: 5.0,
        strength: 0.05,
        activity_window: Duration::from_secs(1),
        update_interval: Duration::from_millis(100),
        ..Default::default()
    };
    let neuron = Neuron::new(config);
    neuron.start().await.unwrap();

    // Subthreshold trickle at ~7 Hz for 1.5 s: no fires, rate stays at 0
    for _ in 0..10 {
        let _ = neuron.receive(NeuralSignal::new(0.5, "driver"));
        sleep(Duration::from_millis(150)).await;
    }

    let threshold = neuron.current_threshold();
    assert!(
        threshold < 2.0,
        "quiet neuron should lower threshold: {threshold}"
    );
    assert!(threshold >= 0.2); // bound: 0.1 × base
    neuron.close().await.unwrap();
}

#[tokio::test]
async fn test_scaling_gates_block_inactive_neuron() {
    let mut config = post_neuron_config("s-gated");
    config.base_threshold = 10.0; // nothing below fires
    config.scaling = ScalingConfig {
        enabled: true,
        target_input_strength: 1.0,
        scaling_rate: 0.1,
        scaling_interval: Duration::from_millis(100),
        ..Default::default()
    };
    let neuron = Neuron::new(config);
    neuron.start().await.unwrap();

    // Strong mean input, but zero calcium and no firing history
    for _ in 0..10 {
        let _ = neuron.receive(NeuralSignal::new(3.0, "pre-1"));
        sleep(Duration::from_millis(30)).await;
    }

    let info = neuron.synaptic_scaling_info();
    assert_eq!(info.input_gains.get("pre-1"), Some(&1.0), "gains must not move");
    assert!(info.recent_factors.is_empty(), "no history entry when gated");
    neuron.close().await.unwrap();
}

#[tokio::test]
async fn test_scaling_pulls_overdriven_gain_down() {
    let mut config = post_neuron_config("s-active");
    config.scaling = ScalingConfig {
        enabled: true,
        target_input_strength: 1.0,
        scaling_rate: 0.1,
        scaling_interval: Duration::from_millis(150),
        calcium_floor: 0.2,
        rate_floor: 0.1,
        ..Default::default()
    };
    let neuron = Neuron::new(config);
    neuron.start().await.unwrap();

    // Suprathreshold 3.0 inputs: the neuron fires (calcium, rate) and the
    // observed mean strength of 3.0 deviates >10% from the 1.0 target
    for _ in 0..40 {
        let _ = neuron.receive(NeuralSignal::new(3.0, "pre-1"));
        sleep(Duration::from_millis(10)).await;
    }

    let info = neuron.synaptic_scaling_info();
    let gain = info.input_gains.get("pre-1").copied().unwrap_or(1.0);
    assert!(gain < 1.0, "overdriven source should be scaled down: {gain}");
    assert!(!info.recent_factors.is_empty());
    assert!(info.recent_factors.iter().all(|f| *f < 1.0));
    neuron.close().await.unwrap();
}

#[tokio::test]
async fn test_zero_learning_rate_emits_but_does_not_move_weight() {
    let fabric = RecordingFabric::new();
    fabric.insert_synapse(SynapseDescriptor::new("p->q", "p", "q", 0.8));

    let neuron = Neuron::new(post_neuron_config("q"));
    neuron.set_callbacks(fabric.clone());
    neuron.enable_stdp_feedback(Duration::from_millis(5), 0.0);
    neuron.start().await.unwrap();

    for _ in 0..5 {
        pair_once(&neuron, &fabric, "p->q", 5).await;
    }
    neuron.close().await.unwrap();

    assert!(fabric.applied_count() >= 1, "adjustments still emitted");
    assert!(fabric
        .applied
        .lock()
        .iter()
        .all(|(_, adj)| adj.learning_rate == 0.0));
    assert_eq!(fabric.weight("p->q"), 0.8);
}

#[tokio::test]
async fn test_missing_bundle_feedback_is_noop() {
    let neuron = Neuron::new(post_neuron_config("lonely"));
    neuron.enable_stdp_feedback(Duration::from_millis(5), 0.02);
    neuron.start().await.unwrap();

    for _ in 0..5 {
        let _ = neuron.receive(NeuralSignal::new(3.0, "driver"));
        sleep(Duration::from_millis(10)).await;
    }
    sleep(Duration::from_millis(50)).await;

    let report = neuron.detailed_health_report();
    assert_eq!(report.adjustments_emitted, 0);
    assert!(report
        .metrics
        .issues
        .iter()
        .any(|i| i.tag() == "missing_matrix_callbacks"));
    neuron.close().await.unwrap();
}

#[tokio::test]
async fn test_refractory_period_spaces_fires() {
    let mut config = post_neuron_config("refractory");
    config.refractory_period = Duration::from_millis(20);
    let neuron = Neuron::new(config);
    let downstream = Neuron::new(post_neuron_config("downstream"));
    neuron.add_output("out", Arc::new(downstream.clone()), 0.8, Duration::ZERO);
    neuron.start().await.unwrap();

    // Hammer with strong input faster than the refractory period
    for _ in 0..50 {
        let _ = neuron.receive(NeuralSignal::new(5.0, "driver"));
        sleep(Duration::from_millis(2)).await;
    }

    // 100 ms of hammering with a 20 ms gate: at most ~6 fires
    let rate = neuron.current_firing_rate();
    let info = neuron.homeostatic_info();
    assert!(
        info.firing_history_len <= 7,
        "refractory gate must space fires, got {}",
        info.firing_history_len
    );
    assert!(rate > 0.0);
    neuron.close().await.unwrap();
}

#[tokio::test]
async fn test_state_changes_reported_to_fabric() {
    let fabric = RecordingFabric::new();
    let neuron = Neuron::new(post_neuron_config("observed"));
    neuron.set_callbacks(fabric.clone());

    neuron.start().await.unwrap();
    neuron.close().await.unwrap();
    sleep(Duration::from_millis(20)).await;

    let changes = fabric.state_changes.lock().clone();
    assert!(changes
        .iter()
        .any(|(_, from, to)| *from == LifecycleState::Initialized && *to == LifecycleState::Running));
    assert!(changes
        .iter()
        .any(|(_, _, to)| *to == LifecycleState::Stopped));
}

#[tokio::test]
async fn test_health_pushed_on_cadence() {
    let fabric = RecordingFabric::new();
    let mut config = post_neuron_config("reporter");
    config.queues.health_report_interval = Duration::from_millis(50);
    let neuron = Neuron::new(config);
    neuron.set_callbacks(fabric.clone());
    neuron.start().await.unwrap();

    sleep(Duration::from_millis(250)).await;
    neuron.close().await.unwrap();

    let reports = fabric.health_reports.lock().clone();
    assert!(
        reports.len() >= 2,
        "expected periodic health pushes, got {}",
        reports.len()
    );
    assert!(reports.iter().all(|r| r.neuron_id == "reporter"));
    assert!(reports.iter().all(|r| (0.0..=1.0).contains(&r.health_score)));
}

#[tokio::test]
async fn test_ligand_release_on_fire() {
    let fabric = RecordingFabric::new();
    let mut config = post_neuron_config("chatty");
    config.released_ligand = Some(LigandKind::Glutamate);
    let neuron = Neuron::new(config);
    neuron.set_callbacks(fabric.clone());
    neuron.start().await.unwrap();

    let _ = neuron.receive(NeuralSignal::new(3.0, "driver"));
    sleep(Duration::from_millis(30)).await;
    neuron.close().await.unwrap();

    let released = fabric.released.lock().clone();
    assert!(!released.is_empty());
    assert!(released.iter().all(|(l, c)| *l == LigandKind::Glutamate && *c > 0.0));
}

#[tokio::test]
async fn test_delayed_delivery_respects_axonal_delay() {
    let neuron = Neuron::new(post_neuron_config("delayer"));
    let downstream = Neuron::new(post_neuron_config("downstream"));
    neuron.add_output(
        "slow",
        Arc::new(downstream.clone()),
        0.8,
        Duration::from_millis(50),
    );
    neuron.start().await.unwrap();
    downstream.start().await.unwrap();

    let _ = neuron.receive(NeuralSignal::new(3.0, "driver"));
    sleep(Duration::from_millis(20)).await;

    // Fired, but the spike is still in flight
    assert!(neuron.current_firing_rate() > 0.0);
    assert_eq!(downstream.current_firing_rate(), 0.0);

    sleep(Duration::from_millis(60)).await;
    // Delivered 0.8 is below downstream's 1.0 threshold; check membrane moved
    let status = downstream.firing_status();
    assert!(status.accumulator != 0.0 || downstream.input_gains().contains_key("delayer"));

    neuron.close().await.unwrap();
    downstream.close().await.unwrap();
}

#[tokio::test]
async fn test_exactly_one_feedback_per_fire() {
    let fabric = RecordingFabric::new();
    fabric.insert_synapse(SynapseDescriptor::new("p->q", "p", "q", 0.8));

    let neuron = Neuron::new(post_neuron_config("q"));
    neuron.set_callbacks(fabric.clone());
    neuron.enable_stdp_feedback(Duration::from_millis(2), 0.02);
    neuron.start().await.unwrap();

    // Well-separated fires so every scheduled feedback runs before close
    for _ in 0..8 {
        let _ = neuron.receive(NeuralSignal::new(3.0, "driver"));
        sleep(Duration::from_millis(30)).await;
    }
    sleep(Duration::from_millis(50)).await;

    let fires = neuron.homeostatic_info().firing_history_len as u64;
    let report = neuron.detailed_health_report();
    assert!(fires > 0);
    assert_eq!(
        report.feedback_runs, fires,
        "each fire schedules exactly one feedback pass"
    );
    neuron.close().await.unwrap();
}

#[tokio::test]
async fn test_connect_via_fabric_uses_spatial_delay() {
    let fabric = RecordingFabric::new();
    let neuron = Neuron::new(post_neuron_config("wired"));
    let downstream = Neuron::new(post_neuron_config("far-away"));
    neuron.set_callbacks(fabric.clone());

    let synapse_id = neuron
        .connect_via_fabric("far-away", Arc::new(downstream.clone()), 0.6)
        .await
        .unwrap();

    assert_eq!(synapse_id, "wired->far-away");
    assert_eq!(neuron.output_count(), 1);
    // The fabric now owns the record the neuron wired through
    assert_eq!(fabric.weight(&synapse_id), 0.6);
}

#[tokio::test]
async fn test_connect_without_bundle_is_rejected() {
    let neuron = Neuron::new(post_neuron_config("unwired"));
    let downstream = Neuron::new(post_neuron_config("target"));
    let err = neuron
        .connect_via_fabric("target", Arc::new(downstream), 0.6)
        .await
        .unwrap_err();
    assert!(err.is_benign());
    assert_eq!(neuron.output_count(), 0);
}

#[tokio::test]
async fn test_synapse_prunability_advisory() {
    let fresh = SynapseDescriptor::new("s1", "a", "b", 0.01).with_transmission(Instant::now());
    assert!(!fresh.is_prunable(0.05, Duration::from_secs(60)));

    let stale = SynapseDescriptor::new("s2", "a", "b", 0.01);
    assert!(stale.is_prunable(0.05, Duration::from_secs(0)));

    let strong = SynapseDescriptor::new("s3", "a", "b", 0.9);
    assert!(!strong.is_prunable(0.05, Duration::from_secs(0)));
}
