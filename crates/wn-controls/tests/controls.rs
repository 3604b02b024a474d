use wn_controls::{
    NetworkView, RuleEvaluator, RuleSet, due_controls, pressure_switches, time_to_next_control,
};
use wn_core::{LinkId, NodeId, TankId};
use wn_model::{LinkAction, LinkStatus, Network, compile, from_yaml_str};

const NET: &str = r#"
name: controlled
options:
  flow_units: CFS
  times:
    duration: 86400
    start_clocktime: 3600
junctions:
  - id: J1
    elevation: 10
reservoirs:
  - id: R1
    head: 50
tanks:
  - id: T1
    elevation: 100
    init_level: 5
    max_level: 20
    diameter: 10
pipes:
  - id: P1
    from: R1
    to: J1
    length: 100
    diameter: 6
    roughness: 100
  - id: P2
    from: J1
    to: T1
    length: 100
    diameter: 6
    roughness: 100
valves:
  - id: V1
    from: J1
    to: T1
    kind: PRV
    diameter: 6
    setting: 30
controls:
  - link: P2
    action: { type: status, status: closed }
    when: { type: node_above, node: T1, value: 18 }
  - link: V1
    action: { type: setting, value: 25 }
    when: { type: node_below, node: J1, value: 5 }
  - link: P1
    action: { type: status, status: closed }
    when: { type: clock_time, seconds: 7200 }
  - link: P1
    action: { type: status, status: open }
    when: { type: time, seconds: 10800 }
rules:
  - id: close-low
    priority: 1
    premises:
      - subject: { type: time }
        relation: ge
        value: 0
    then:
      - link: P1
        action: { type: status, status: closed }
  - id: keep-open
    priority: 5
    premises:
      - subject: { type: time }
        relation: ge
        value: 0
    then:
      - link: P1
        action: { type: status, status: open }
  - id: prv-setting
    premises:
      - subject: { type: node, id: J1, variable: pressure }
        relation: gt
        value: 100
      - join: or
        subject: { type: link, id: P2, variable: status }
        relation: eq
        value: closed
    then:
      - link: V1
        action: { type: setting, value: 20 }
    else:
      - link: V1
        action: { type: setting, value: 25 }
"#;

struct Snapshot {
    net: Network,
    head: Vec<f64>,
    demand: Vec<f64>,
    volume: Vec<f64>,
    flow: Vec<f64>,
    status: Vec<LinkStatus>,
    setting: Vec<Option<f64>>,
}

impl Snapshot {
    fn new() -> Self {
        let net = compile(&from_yaml_str(NET).unwrap()).unwrap();
        let head = vec![40.0, 50.0, 105.0];
        let volume = net.tanks.iter().map(|t| t.v0).collect();
        let status = net.links.iter().map(|l| l.initial_status).collect();
        let setting = net.links.iter().map(|l| l.initial_setting).collect();
        Self {
            head,
            demand: vec![0.0; 3],
            volume,
            flow: vec![1.0; 3],
            status,
            setting,
            net,
        }
    }

    fn set_tank_head(&mut self, h: f64) {
        let t = &self.net.tanks[1];
        self.head[t.node.pos()] = h;
        self.volume[1] = t.volume_at(h);
    }
}

impl NetworkView for Snapshot {
    fn network(&self) -> &Network {
        &self.net
    }
    fn head(&self, node: NodeId) -> f64 {
        self.head[node.pos()]
    }
    fn demand(&self, node: NodeId) -> f64 {
        self.demand[node.pos()]
    }
    fn tank_volume(&self, tank: TankId) -> f64 {
        self.volume[tank.pos()]
    }
    fn flow(&self, link: LinkId) -> f64 {
        self.flow[link.pos()]
    }
    fn status(&self, link: LinkId) -> LinkStatus {
        self.status[link.pos()]
    }
    fn setting(&self, link: LinkId) -> Option<f64> {
        self.setting[link.pos()]
    }
}

#[test]
fn tank_control_fires_at_level() {
    let mut view = Snapshot::new();
    assert!(!due_controls(&view.net.controls, &view, 0, 3600).contains(&0));
    view.set_tank_head(118.5);
    assert!(due_controls(&view.net.controls, &view, 0, 3600).contains(&0));
}

#[test]
fn time_and_clock_controls() {
    let view = Snapshot::new();
    let controls = &view.net.controls;
    // start clock 01:00, so 02:00 is one hour into the run
    assert_eq!(due_controls(controls, &view, 3600, 3600), vec![2]);
    assert_eq!(due_controls(controls, &view, 10800, 3600), vec![3]);
    assert!(due_controls(controls, &view, 3600 + 86400, 3600).contains(&2));
}

#[test]
fn pressure_switch_uses_head_tolerance() {
    let mut view = Snapshot::new();
    view.head[0] = 15.0004;
    assert_eq!(pressure_switches(&view.net.controls, &view, 0.0005), vec![1]);
    view.head[0] = 15.01;
    assert!(pressure_switches(&view.net.controls, &view, 0.0005).is_empty());
}

#[test]
fn next_control_time() {
    let mut view = Snapshot::new();
    let tank = view.net.tanks[1].clone();
    view.set_tank_head(110.0);
    view.demand[tank.node.pos()] = 2.0;
    let dt = time_to_next_control(&view.net.controls, &view, 0, 3600, 36000, |_| true);
    // 8 ft of rise to reach 118 at 2 cfs; clock control fires after 1 h
    let fill = ((tank.volume_at(118.0) - tank.volume_at(110.0)) / 2.0).round() as i64;
    assert_eq!(dt, fill.min(3600));
    // controls that would not change their link are ignored
    let dt = time_to_next_control(&view.net.controls, &view, 0, 3600, 36000, |c| {
        matches!(c.action, LinkAction::Close) && c.link.pos() == 1
    });
    assert_eq!(dt, fill);
}

#[test]
fn higher_priority_rule_wins() {
    let view = Snapshot::new();
    let mut rules = RuleSet::from_network(&view.net).unwrap();
    assert_eq!(rules.step(), 360);
    let out = rules.evaluate(&view, 3600, 360);
    // keep-open outranks close-low, and P1 is already open
    assert!(out.actions.iter().all(|a| a.link.pos() != 0));
    assert_eq!(out.next_evaluation, Some(3960));
}

#[test]
fn else_actions_apply_when_premises_fail() {
    let mut view = Snapshot::new();
    let mut rules = RuleSet::from_network(&view.net).unwrap();
    let out = rules.evaluate(&view, 0, 360);
    let v1 = out.actions.iter().find(|a| a.link.pos() == 2).unwrap();
    assert_eq!(v1.action, LinkAction::Setting(25.0));

    // OR premise: closing P2 makes the THEN branch apply
    view.status[1] = LinkStatus::Closed;
    let out = rules.evaluate(&view, 0, 360);
    let v1 = out.actions.iter().find(|a| a.link.pos() == 2).unwrap();
    assert_eq!(v1.action, LinkAction::Setting(20.0));

    // no action when the setting is already in place
    view.setting[2] = Some(20.0);
    let out = rules.evaluate(&view, 0, 360);
    assert!(out.actions.iter().all(|a| a.link.pos() != 2));
}
