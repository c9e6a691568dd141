//! Single-partition behaviour of the splitting orchestrator.

use cardion_core::{
    ConfigError, FieldReader, NodeId, ParameterSet, PartitionId, RunError, StepIndex, TimeInterval,
};
use cardion_engine::{
    MeshConfig, Orchestrator, OrchestratorBuilder, RecordingSink, SimulationConfig,
    StimulusRegion, WantedQuantity, VM,
};
use cardion_reaction::{
    EnvironmentBuilder, HodgkinHuxley1952, PassiveMembrane, ReactionIntegrator, ReactionModel, ReactionState, Scheme,
};
use cardion_test_utils::{partitions, strip_mesh, ConstantRate};

/// A passive strip of 8 square elements on `[0, 1]`, stimulated on its left
/// half until 0.5, with power-of-two step sizes.
fn passive_config(pde_step: f64) -> SimulationConfig {
    let mut config = SimulationConfig::default();
    config.mesh = MeshConfig {
        width: 1.0,
        height: 0.125,
        elements_x: 8,
        elements_y: 1,
        partitions: 1,
        quadrature_points: 2,
    };
    config.materials.am = 1.0;
    config.materials.cm = 1.0;
    config.materials.sigma_11 = 1e-3;
    config.materials.sigma_22 = 1e-3;
    config.time.ode_step = 1.0 / 1024.0;
    config.time.pde_step = pde_step;
    config.time.start = 0.0;
    config.time.stimulus_stop = 0.5;
    config.time.stop = 1.0;
    config.stimulus.value = -10.0;
    config.stimulus.region = StimulusRegion::LeftHalf;
    config.initial_voltage = 0.0;
    config.output_frequency = 0;
    config.scheme = Scheme::RungeKutta4;
    config.solver.tolerance = 1e-12;
    config.coupling.wanted = vec![WantedQuantity {
        variable: "membrane/i_L".into(),
        field: "i_L".into(),
    }];
    config
}

fn build(config: &SimulationConfig, model: impl ReactionModel) -> Orchestrator {
    let mesh = config.mesh.build_mesh().unwrap();
    let partition = partitions(&mesh, 1).remove(0);
    OrchestratorBuilder::new(config.clone())
        .partition(partition)
        .model(model)
        .build()
        .unwrap()
}

fn final_voltage(pde_step: f64) -> Vec<f64> {
    let config = passive_config(pde_step);
    let mesh = config.mesh.build_mesh().unwrap();
    let mut o = build(&config, PassiveMembrane::default());
    o.run_protocol(&config.protocol(&mesh).unwrap()).unwrap();
    assert_eq!(o.time(), 1.0);
    o.owned_values(VM).unwrap().into_iter().map(|(_, v)| v).collect()
}

fn max_difference(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y).abs()).fold(0.0, f64::max)
}

#[test]
fn without_conduction_every_node_follows_the_reaction_alone() {
    let mut config = passive_config(1.0 / 64.0);
    config.materials.sigma_11 = 0.0;
    config.materials.sigma_22 = 0.0;
    config.initial_voltage = -75.0;
    let model = PassiveMembrane::default();
    let mut o = build(&config, model);
    o.run(&TimeInterval::new(0.0, 0.5, 1.0 / 64.0).unwrap()).unwrap();

    let env = EnvironmentBuilder::new(model).build().unwrap();
    let v = env.resolve("membrane/V").unwrap();
    let mut state = ReactionState::new(&env, 1);
    state.set(0, v, -75.0).unwrap();
    let integrator = ReactionIntegrator::new(Scheme::RungeKutta4, 1.0 / 1024.0).unwrap();
    integrator.advance(&env, &mut state, &[NodeId(0)], 0.0, 0.5).unwrap();
    let reference = state.get(0, v);

    let exact = model.analytic(0.5, -75.0, 1.0, 0.0);
    assert!((reference - exact).abs() < 1e-9);
    for (node, value) in o.owned_values(VM).unwrap() {
        assert!(
            (value - reference).abs() < 1e-9,
            "node {node}: {value} vs {reference}"
        );
    }
}

#[test]
fn halving_the_pde_step_roughly_halves_the_error() {
    let reference = final_voltage(1.0 / 512.0);
    let coarse = max_difference(&final_voltage(1.0 / 16.0), &reference);
    let fine = max_difference(&final_voltage(1.0 / 32.0), &reference);
    assert!(coarse > 1e-8, "coarse error {coarse} too small to measure");
    let ratio = coarse / fine;
    assert!((1.6..2.8).contains(&ratio), "error ratio {ratio}");
}

#[test]
fn uniform_growth_is_preserved_by_diffusion() {
    let mut config = passive_config(1.0 / 16.0);
    config.coupling.wanted = vec![WantedQuantity {
        variable: "membrane/i_K".into(),
        field: "i_K".into(),
    }];
    config.initial_voltage = 2.0;
    let mut o = build(&config, ConstantRate::new(0.0, 3.0));
    o.run(&TimeInterval::new(0.0, 1.0, 1.0 / 16.0).unwrap()).unwrap();
    for (_, value) in o.owned_values(VM).unwrap() {
        assert!((value - 5.0).abs() < 1e-9, "{value}");
    }
}

#[test]
fn non_divisible_sub_step_is_refused_before_any_mutation() {
    let mut config = SimulationConfig::default();
    config.mesh.elements_x = 4;
    config.mesh.elements_y = 2;
    config.time.ode_step = 1e-5;
    let sink = RecordingSink::new();
    let mesh = config.mesh.build_mesh().unwrap();
    let mut o = OrchestratorBuilder::new(config)
        .partition(partitions(&mesh, 1).remove(0))
        .model(HodgkinHuxley1952::new())
        .sink(sink.clone())
        .build()
        .unwrap();
    let vm = o.store().resolve(VM, 0, ParameterSet::Values).unwrap();
    let before = o.store().read(vm).unwrap().to_vec();

    let err = o
        .run(&TimeInterval::new(0.0, 1.5e-3, 1.5e-4).unwrap())
        .unwrap_err();
    assert!(matches!(
        err,
        RunError::Config(ConfigError::SubStepNotDivisible { .. })
    ));
    assert_eq!(o.time(), 0.0);
    assert_eq!(o.step_index(), StepIndex(0));
    assert_eq!(o.store().read(vm).unwrap(), before.as_slice());
    assert!(sink.is_empty());
}

#[test]
fn strip_front_spreads_once_the_stimulus_ends() {
    let mesh = strip_mesh(10, 0.1);
    let mut config = SimulationConfig::default();
    config.mesh.width = 0.1;
    config.mesh.height = 0.01;
    config.mesh.elements_x = 10;
    config.mesh.elements_y = 1;
    config.stimulus.region = StimulusRegion::LeftHalf;
    config.output_frequency = 0;
    let mut o = OrchestratorBuilder::new(config.clone())
        .partition(partitions(&mesh, 1).remove(0))
        .model(HodgkinHuxley1952::new())
        .build()
        .unwrap();
    let protocol = config.protocol(&mesh).unwrap();
    assert_eq!(protocol.nodes.len(), 10);
    assert_eq!(o.partition().id(), PartitionId(0));

    let voltage = |o: &Orchestrator| {
        let mut vm = vec![f64::NAN; mesh.node_count()];
        for (node, v) in o.owned_values(VM).unwrap() {
            vm[node.index()] = v;
        }
        assert!(vm.iter().all(|v| v.is_finite()));
        vm
    };

    let [on, off] = [&protocol.phases[0], &protocol.phases[1]];
    o.set_stimulus(&protocol.nodes, on.value).unwrap();
    o.run(&on.interval).unwrap();
    assert!((o.time() - 0.2).abs() < 1e-12);
    let vm = voltage(&o);
    for node in [0usize, 1, 11, 12] {
        assert!(vm[node] > -40.0, "stimulated node {node} at {}", vm[node]);
    }
    for node in [7usize, 10, 18, 21] {
        assert!((vm[node] + 75.0).abs() < 5.0, "unstimulated node {node} at {}", vm[node]);
    }

    o.set_stimulus(&protocol.nodes, off.value).unwrap();
    o.run(&off.interval).unwrap();
    assert!((o.time() - 0.7).abs() < 1e-12);
    let vm = voltage(&o);
    // The front has crossed node 7 but not yet the far edge.
    for node in [7usize, 18] {
        assert!(vm[node] > -30.0, "node {node} at {}", vm[node]);
    }
    for node in [10usize, 21] {
        assert!(vm[node] < -65.0, "far node {node} at {}", vm[node]);
    }

    o.run(&TimeInterval::new(o.time(), 1.5, 1e-3).unwrap()).unwrap();
    let vm = voltage(&o);
    for node in [10usize, 21] {
        assert!(vm[node] > 0.0, "far node {node} at {}", vm[node]);
    }
}
