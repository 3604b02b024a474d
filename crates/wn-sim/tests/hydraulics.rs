use proptest::prelude::*;
use wn_controls::RuleSet;
use wn_model::{LinkStatus, Network, compile, from_yaml_str};
use wn_results::{HydraulicStep, HydraulicStreamWriter};
use wn_sim::{CancelToken, HydraulicEngine, SimError};

fn network(yaml: &str) -> Network {
    compile(&from_yaml_str(yaml).unwrap()).unwrap()
}

fn node(net: &Network, name: &str) -> usize {
    net.index.node(name).unwrap().pos()
}

fn link(net: &Network, name: &str) -> usize {
    net.index.link(name).unwrap().pos()
}

/// Step through the whole period, collecting one record per solution.
fn simulate(engine: &mut HydraulicEngine) -> Vec<HydraulicStep> {
    engine.init();
    let mut records = Vec::new();
    loop {
        let solution = engine.run_step().unwrap();
        assert!(solution.balanced, "unbalanced at t = {}", solution.time);
        let mut record = engine.snapshot();
        record.step = engine.next_step().unwrap();
        let last = record.is_last();
        records.push(record);
        if last {
            break;
        }
    }
    records
}

const TWO_NODE: &str = r#"
name: two-node
options:
  flow_units: GPM
junctions:
  - id: B
    demands: [{ base: 500 }]
reservoirs:
  - id: A
    head: 100
pipes:
  - id: P1
    from: A
    to: B
    length: 1000
    diameter: 12
    roughness: 100
"#;

#[test]
fn single_pipe_carries_the_demand() {
    let net = network(TWO_NODE);
    let mut engine = HydraulicEngine::new(&net, None).unwrap();
    engine.init();
    let solution = engine.run_step().unwrap();
    assert!(solution.balanced);

    // 500 gpm in cfs
    let q = engine.state().flow[link(&net, "P1")];
    assert!((q - 1.114).abs() < 1e-3, "flow {q}");

    let hb = engine.state().head[node(&net, "B")];
    assert!(hb < 100.0 && hb > 95.0, "head {hb}");
    // Hazen-Williams loss for this pipe is a little over one foot.
    assert!((hb - 98.86).abs() < 0.05, "head {hb}");
}

#[test]
fn idle_loop_settles_at_reservoir_head() {
    let net = network(
        r#"
name: triangle
options:
  flow_units: CFS
junctions:
  - id: J1
  - id: J2
  - id: J3
reservoirs:
  - id: R1
    head: 100
pipes:
  - { id: P0, from: R1, to: J1, length: 500, diameter: 12, roughness: 100 }
  - { id: P1, from: J1, to: J2, length: 1000, diameter: 8, roughness: 100 }
  - { id: P2, from: J2, to: J3, length: 1000, diameter: 8, roughness: 100 }
  - { id: P3, from: J3, to: J1, length: 1000, diameter: 8, roughness: 100 }
"#,
    );
    let mut engine = HydraulicEngine::new(&net, None).unwrap();
    engine.init();
    let solution = engine.run_step().unwrap();
    assert!(solution.balanced);
    assert!(solution.iterations <= 3, "{} iterations", solution.iterations);
    for q in &engine.state().flow {
        assert!(q.abs() < 1e-4, "flow {q}");
    }
    for h in &engine.state().head {
        assert!((h - 100.0).abs() < 1e-6, "head {h}");
    }
}

#[test]
fn zero_demand_pipe_has_no_flow() {
    let net = network(
        r#"
name: idle
options:
  flow_units: CFS
junctions:
  - id: J1
reservoirs:
  - id: R1
    head: 50
pipes:
  - { id: P1, from: R1, to: J1, length: 1000, diameter: 12, roughness: 100 }
"#,
    );
    let mut engine = HydraulicEngine::new(&net, None).unwrap();
    engine.init();
    let solution = engine.run_step().unwrap();
    assert!(solution.iterations <= 2);
    assert!(engine.state().flow[0].abs() < 1e-6);
    assert!((engine.state().head[0] - 50.0).abs() < 1e-6);
}

/// A tank drains into one junction; a check-valved reservoir takes over
/// once the tank is empty.
const DRAINING_TANK: &str = r#"
name: draining
options:
  flow_units: CFS
  times:
    duration: 10800
junctions:
  - id: J1
    demands: [{ base: 0.05 }]
reservoirs:
  - id: R1
    head: 80
tanks:
  - id: T1
    elevation: 100
    init_level: 10
    min_level: 5
    max_level: 20
    diameter: 10
pipes:
  - { id: P1, from: T1, to: J1, length: 1000, diameter: 12, roughness: 100 }
  - { id: P2, from: R1, to: J1, length: 1000, diameter: 12, roughness: 100, status: cv }
"#;

#[test]
fn tank_step_lands_on_empty_level() {
    let net = network(DRAINING_TANK);
    let mut engine = HydraulicEngine::new(&net, None).unwrap();
    let records = simulate(&mut engine);

    let times: Vec<i64> = records.iter().map(|r| r.time).collect();
    assert_eq!(times, vec![0, 3600, 7200, 7854, 10800]);

    let t1 = node(&net, "T1");
    let hmin = 105.0;
    let at_empty = &records[3];
    assert!((at_empty.head[t1] - hmin).abs() < 1e-9);
    for r in &records {
        assert!(r.head[t1] >= hmin - 1e-9, "t = {} head {}", r.time, r.head[t1]);
    }
    // Once empty the tank stops feeding the junction.
    let p1 = link(&net, "P1");
    assert_eq!(records[4].flow[p1], 0.0);
    assert!(records[4].flow[link(&net, "P2")] > 0.04);
}

#[test]
fn tank_level_follows_net_inflow() {
    let net = network(DRAINING_TANK);
    let mut engine = HydraulicEngine::new(&net, None).unwrap();
    let records = simulate(&mut engine);
    let t1 = node(&net, "T1");
    let area = std::f64::consts::PI * 25.0;
    let drop = 0.05 * 3600.0 / area;
    assert!((records[0].head[t1] - records[1].head[t1] - drop).abs() < 1e-4);
}

#[test]
fn prv_holds_downstream_grade() {
    let net = network(
        r#"
name: prv
options:
  flow_units: CFS
junctions:
  - id: J1
  - id: J2
    elevation: 10
  - id: J3
    demands: [{ base: 1 }]
reservoirs:
  - id: R1
    head: 200
pipes:
  - { id: P1, from: R1, to: J1, length: 1000, diameter: 12, roughness: 100 }
  - { id: P2, from: J2, to: J3, length: 1000, diameter: 12, roughness: 100 }
valves:
  - { id: V1, from: J1, to: J2, kind: PRV, diameter: 12, setting: 50 }
"#,
    );
    let mut engine = HydraulicEngine::new(&net, None).unwrap();
    engine.init();
    assert!(engine.run_step().unwrap().balanced);
    let s = engine.state();
    assert!((s.head[node(&net, "J2")] - 60.0).abs() < 1e-3);
    assert_eq!(s.status[link(&net, "V1")], LinkStatus::Active);
    assert!((s.flow[link(&net, "V1")] - 1.0).abs() < 1e-3);
}

#[test]
fn pump_operates_on_its_curve() {
    let net = network(
        r#"
name: pumped
options:
  flow_units: CFS
junctions:
  - id: J1
reservoirs:
  - id: R1
    head: 0
  - id: R2
    head: 150
curves:
  - id: C1
    points: [[0, 200], [1, 160], [2, 90]]
pumps:
  - { id: PU1, from: R1, to: J1, curve: C1 }
pipes:
  - { id: P1, from: J1, to: R2, length: 1000, diameter: 12, roughness: 100 }
"#,
    );
    let mut engine = HydraulicEngine::new(&net, None).unwrap();
    engine.init();
    assert!(engine.run_step().unwrap().balanced);
    let s = engine.state();
    let q = s.flow[link(&net, "PU1")];
    assert!(q > 1.0 && q < 1.3, "pump flow {q}");

    // h = 200 - 40 q^n through the two outer points
    let n = (110.0_f64 / 40.0).ln() / 2.0_f64.ln();
    let gain = s.head[node(&net, "J1")] - s.head[node(&net, "R1")];
    assert!((gain - (200.0 - 40.0 * q.powf(n))).abs() < 0.05, "gain {gain}");
    assert_eq!(s.status[link(&net, "PU1")], LinkStatus::Open);
}

#[test]
fn time_rule_closes_pipe() {
    let net = network(
        r#"
name: ruled
options:
  flow_units: CFS
  times:
    duration: 14400
junctions:
  - id: J1
    demands: [{ base: 1 }]
reservoirs:
  - id: R1
    head: 100
pipes:
  - { id: P1, from: R1, to: J1, length: 1000, diameter: 12, roughness: 100 }
  - { id: P2, from: R1, to: J1, length: 1000, diameter: 12, roughness: 100 }
rules:
  - id: close-p2
    premises:
      - subject: { type: time }
        relation: ge
        value: 7200
    then:
      - link: P2
        action: { type: status, status: closed }
"#,
    );
    let rules = RuleSet::from_network(&net).unwrap();
    let mut engine = HydraulicEngine::new(&net, Some(Box::new(rules))).unwrap();
    let records = simulate(&mut engine);
    let p2 = link(&net, "P2");
    for r in &records {
        if r.time < 7200 {
            assert!(r.flow[p2] > 0.4, "t = {}", r.time);
        } else {
            assert_eq!(r.flow[p2], 0.0, "t = {}", r.time);
        }
    }
    assert!(records.iter().any(|r| r.time == 7200));
}

#[test]
fn simple_control_opens_on_time() {
    let net = network(
        r#"
name: controlled
options:
  flow_units: CFS
  times:
    duration: 7200
junctions:
  - id: J1
    demands: [{ base: 1 }]
reservoirs:
  - id: R1
    head: 100
pipes:
  - { id: P1, from: R1, to: J1, length: 1000, diameter: 12, roughness: 100 }
  - { id: P2, from: R1, to: J1, length: 1000, diameter: 12, roughness: 100, status: closed }
controls:
  - link: P2
    action: { type: status, status: open }
    when: { type: time, seconds: 3600 }
"#,
    );
    let mut engine = HydraulicEngine::new(&net, None).unwrap();
    let records = simulate(&mut engine);
    let p2 = link(&net, "P2");
    assert_eq!(records[0].flow[p2], 0.0);
    assert!((records[1].flow[p2] - 0.5).abs() < 1e-3);
}

fn run_to_bytes(net: &Network, cancel: &CancelToken) -> Result<Vec<u8>, SimError> {
    let mut engine = HydraulicEngine::new(net, None)?;
    let mut writer = HydraulicStreamWriter::new(Vec::new(), engine.stream_header())?;
    engine.run(&mut writer, cancel)?;
    Ok(writer.finish()?)
}

#[test]
fn repeated_runs_are_identical() {
    let net = network(DRAINING_TANK);
    let cancel = CancelToken::new();
    let first = run_to_bytes(&net, &cancel).unwrap();
    let second = run_to_bytes(&net, &cancel).unwrap();
    assert!(!first.is_empty());
    assert_eq!(first, second);
}

#[test]
fn cancelled_run_stops_before_first_step() {
    let net = network(DRAINING_TANK);
    let mut engine = HydraulicEngine::new(&net, None).unwrap();
    let mut writer = HydraulicStreamWriter::new(Vec::new(), engine.stream_header()).unwrap();
    let cancel = CancelToken::new();
    cancel.cancel();
    let err = engine.run(&mut writer, &cancel).unwrap_err();
    assert!(matches!(err, SimError::Cancelled { time: 0 }));
    assert_eq!(err.code(), 1);
    assert_eq!(writer.steps_written(), 0);
}

#[test]
fn clock_tracks_simulated_time() {
    let net = network(DRAINING_TANK);
    let mut engine = HydraulicEngine::new(&net, None).unwrap();
    let clock = engine.clock();
    simulate(&mut engine);
    assert_eq!(clock.get(), 10800);
    assert_eq!(engine.current_time(), 10800);
}

/// A chain fed by one reservoir, with optional chords closing loops.
fn random_network(demands: &[f64], chords: &[(usize, usize)]) -> String {
    let mut yaml = String::from("name: random\noptions:\n  flow_units: CFS\njunctions:\n");
    for (i, d) in demands.iter().enumerate() {
        yaml += &format!("  - {{ id: J{i}, demands: [{{ base: {d} }}] }}\n");
    }
    yaml += "reservoirs:\n  - { id: R, head: 300 }\npipes:\n";
    yaml += "  - { id: P0, from: R, to: J0, length: 1000, diameter: 16, roughness: 120 }\n";
    for i in 1..demands.len() {
        yaml += &format!(
            "  - {{ id: P{i}, from: J{}, to: J{i}, length: 800, diameter: 10, roughness: 110 }}\n",
            i - 1
        );
    }
    for (c, &(a, b)) in chords.iter().enumerate() {
        yaml += &format!(
            "  - {{ id: C{c}, from: J{a}, to: J{b}, length: 1200, diameter: 8, roughness: 100 }}\n"
        );
    }
    yaml
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn junction_continuity_holds(
        demands in prop::collection::vec(0.0f64..2.0, 2..7),
        raw_chords in prop::collection::vec((0usize..7, 0usize..7), 0..3),
    ) {
        let n = demands.len();
        let chords: Vec<(usize, usize)> = raw_chords
            .into_iter()
            .map(|(a, b)| (a % n, b % n))
            .filter(|(a, b)| a != b)
            .collect();
        let net = network(&random_network(&demands, &chords));
        let mut engine = HydraulicEngine::new(&net, None).unwrap();
        engine.init();
        let solution = engine.run_step().unwrap();
        prop_assert!(solution.balanced);

        let s = engine.state();
        let mut net_inflow = vec![0.0; net.node_count()];
        for k in 0..net.link_count() {
            let (n1, n2) = net.link_nodes(wn_core::Id::from_usize(k));
            net_inflow[n1] -= s.flow[k];
            net_inflow[n2] += s.flow[k];
        }
        for j in 0..net.junction_count {
            prop_assert!(
                (net_inflow[j] - s.demand[j]).abs() < 1e-5,
                "junction {}: inflow {} demand {}", j, net_inflow[j], s.demand[j]
            );
        }
    }
}
