use crate::net::{
    CamConfig, CamLookup, DeviceId, Frame, InterfaceId, Ipv4Address, MacAddress, NetError,
    Network, Port, Route, TopologyRules,
};
use crate::sim::{DropReason, Engine, EngineConfig, EngineEventKind, EventLog, SimTime};

fn mac_of(net: &Network, id: DeviceId) -> MacAddress {
    net.registry.get(id).unwrap().mac()
}

fn ip(s: &str) -> Ipv4Address {
    s.parse().unwrap()
}

fn cam_lookup(engine: &Engine, sw: DeviceId, mac: &MacAddress) -> CamLookup {
    engine
        .network()
        .registry
        .get(sw)
        .unwrap()
        .as_switch()
        .unwrap()
        .cam
        .lookup(mac)
}

fn drops(log: &EventLog) -> Vec<DropReason> {
    log.events()
        .into_iter()
        .filter_map(|ev| match ev.kind {
            EngineEventKind::Dropped { reason, .. } => Some(reason),
            _ => None,
        })
        .collect()
}

#[test]
fn switch_learn_lookup_forget_scenario() {
    let mut net = Network::default();
    let s = net.add_switch("S");
    let p1 = net.add_pc("P1");
    let p2 = net.add_pc("P2");
    net.connect(p1, s).unwrap();
    net.connect(p2, s).unwrap();
    assert_eq!(net.graph.port_towards(s, p1), Some(Port(1)));
    assert_eq!(net.graph.port_towards(s, p2), Some(Port(2)));

    let m1 = mac_of(&net, p1);
    let cam = &mut net.registry.get_mut(s).unwrap().as_switch_mut().unwrap().cam;
    cam.learn_mac_address(m1, Port(1), SimTime::ZERO);
    assert_eq!(cam.lookup(&m1), CamLookup::Port(Port(1)));
    cam.forget_mac_address(&m1);
    assert_eq!(cam.lookup(&m1), CamLookup::Flood);
}

fn star(pcs: usize, cam: CamConfig) -> (Engine, DeviceId, Vec<DeviceId>) {
    let mut net = Network::new(cam, TopologyRules::default());
    let sw = net.add_switch("sw1");
    let hosts: Vec<DeviceId> = (1..=pcs).map(|i| net.add_pc(format!("pc{i}"))).collect();
    for &h in &hosts {
        net.connect(h, sw).unwrap();
    }
    let mut engine = Engine::new(net, EngineConfig::default());
    engine.start().unwrap();
    (engine, sw, hosts)
}

#[test]
fn switch_floods_unknown_then_forwards_learned() {
    let (mut e, sw, hosts) = star(3, CamConfig::default());
    let m1 = mac_of(e.network(), hosts[0]);
    let m2 = mac_of(e.network(), hosts[1]);

    e.send_frame(hosts[0], m2).unwrap();
    e.run().unwrap();
    assert_eq!(e.now(), SimTime(2));
    assert_eq!(e.stats.flooded_frames, 1);
    assert_eq!(e.stats.delivered_frames, 1);
    // pc3 saw the flooded copy and ignored it.
    assert_eq!(e.stats.dropped_frames, 1);
    assert_eq!(cam_lookup(&e, sw, &m1), CamLookup::Port(Port(1)));
    assert_eq!(cam_lookup(&e, sw, &m2), CamLookup::Flood);

    e.send_frame(hosts[1], m1).unwrap();
    e.run().unwrap();
    assert_eq!(e.stats.flooded_frames, 1);
    assert_eq!(e.stats.delivered_frames, 2);
    assert_eq!(e.stats.dropped_frames, 1);
    assert_eq!(cam_lookup(&e, sw, &m2), CamLookup::Port(Port(2)));
}

#[test]
fn broadcast_reaches_every_other_host() {
    let (mut e, _, hosts) = star(4, CamConfig::default());
    let log = EventLog::new();
    e.subscribe(log.clone());

    e.send_frame(hosts[0], MacAddress::BROADCAST).unwrap();
    e.run().unwrap();
    assert_eq!(e.stats.delivered_frames, 3);
    assert_eq!(e.stats.dropped_frames, 0);

    let flooded_ports = log.events().into_iter().find_map(|ev| match ev.kind {
        EngineEventKind::Flooded { ports, .. } => Some(ports),
        _ => None,
    });
    assert_eq!(flooded_ports, Some(vec![Port(2), Port(3), Port(4)]));
}

#[test]
fn frame_for_ingress_port_is_filtered() {
    let (mut e, sw, hosts) = star(2, CamConfig::default());
    let log = EventLog::new();
    e.subscribe(log.clone());
    let m1 = mac_of(e.network(), hosts[0]);

    e.inject(sw, Some(hosts[0]), Frame::new(99, m1, m1)).unwrap();
    e.run().unwrap();
    assert_eq!(drops(&log), vec![DropReason::Filtered]);
    assert_eq!(e.stats.flooded_frames, 0);
}

#[test]
fn inject_requires_an_existing_link() {
    let (mut e, _, hosts) = star(2, CamConfig::default());
    let m1 = mac_of(e.network(), hosts[0]);
    assert!(matches!(
        e.inject(hosts[1], Some(hosts[0]), Frame::new(1, m1, m1)),
        Err(NetError::InvalidTopology(_))
    ));
    assert!(matches!(
        e.inject(DeviceId(50), None, Frame::new(1, m1, m1)),
        Err(NetError::NotFound(_))
    ));
}

#[test]
fn moved_host_is_relearned_on_new_port() {
    let (mut e, sw, hosts) = star(2, CamConfig::default());
    let log = EventLog::new();
    e.subscribe(log.clone());
    let m1 = mac_of(e.network(), hosts[0]);

    e.send_frame(hosts[0], MacAddress::BROADCAST).unwrap();
    e.run().unwrap();
    // Same source MAC shows up behind port 2.
    e.inject(sw, Some(hosts[1]), Frame::new(77, m1, MacAddress::BROADCAST))
        .unwrap();
    e.run().unwrap();

    assert_eq!(cam_lookup(&e, sw, &m1), CamLookup::Port(Port(2)));
    let moves: Vec<(Port, Option<Port>)> = log
        .events()
        .into_iter()
        .filter_map(|ev| match ev.kind {
            EngineEventKind::MacLearned { port, previous, .. } => Some((port, previous)),
            _ => None,
        })
        .collect();
    assert_eq!(moves, vec![(Port(1), None), (Port(2), Some(Port(1)))]);
}

#[test]
fn sending_from_an_isolated_device_fails() {
    let mut net = Network::default();
    let lonely = net.add_pc("lonely");
    let mut e = Engine::new(net, EngineConfig::default());
    e.start().unwrap();
    assert!(matches!(
        e.send_frame(lonely, MacAddress::BROADCAST),
        Err(NetError::InvalidTopology(_))
    ));
    assert!(matches!(
        e.send_frame(DeviceId(9), MacAddress::BROADCAST),
        Err(NetError::NotFound(_))
    ));
}

#[test]
fn cam_entries_age_out_when_time_advances() {
    let (mut e, sw, hosts) = star(2, CamConfig { max_age: Some(3) });
    let log = EventLog::new();
    e.subscribe(log.clone());
    let m1 = mac_of(e.network(), hosts[0]);

    e.send_frame(hosts[0], MacAddress::BROADCAST).unwrap();
    e.run().unwrap();
    assert!(e.advance(1).is_empty());
    assert_eq!(e.advance(2), vec![(sw, m1)]);
    assert_eq!(cam_lookup(&e, sw, &m1), CamLookup::Flood);
    assert!(log.events().iter().any(|ev| ev.kind
        == EngineEventKind::MacAged {
            switch: sw,
            mac: m1
        }));
}

/// pc1 -- sw1 -- r1 -- pc2，路由器接口 0/1 依次接 sw1、pc2
fn routed_lab(ttl: u8) -> (Engine, DeviceId, DeviceId, DeviceId) {
    let mut net = Network::default();
    let pc1 = net.add_pc("pc1");
    let sw1 = net.add_switch("sw1");
    let r1 = net.add_router("r1");
    let pc2 = net.add_pc("pc2");

    net.add_router_interface(r1, "10.0.1.1/24".parse().unwrap()).unwrap();
    net.add_router_interface(r1, "10.0.2.1/24".parse().unwrap()).unwrap();
    net.configure_pc(pc1, "10.0.1.10/24".parse().unwrap(), Some(ip("10.0.1.1")))
        .unwrap();
    net.configure_pc(pc2, "10.0.2.10/24".parse().unwrap(), Some(ip("10.0.2.1")))
        .unwrap();

    net.connect(pc1, sw1).unwrap();
    net.connect(sw1, r1).unwrap();
    net.connect(r1, pc2).unwrap();

    let mut e = Engine::new(
        net,
        EngineConfig {
            default_ttl: ttl,
            ..EngineConfig::default()
        },
    );
    e.start().unwrap();
    (e, pc1, r1, pc2)
}

#[test]
fn router_forwards_between_subnets() {
    let (mut e, pc1, r1, pc2) = routed_lab(64);
    let log = EventLog::new();
    e.subscribe(log.clone());

    let frame_id = e.send_packet(pc1, ip("10.0.2.10")).unwrap();
    e.run().unwrap();
    assert_eq!(e.stats.delivered_frames, 1);
    assert_eq!(e.stats.dropped_frames, 0);

    let events = log.events();
    assert!(events.iter().any(|ev| ev.kind
        == EngineEventKind::Routed {
            frame_id,
            router: r1,
            dst: ip("10.0.2.10"),
            interface: InterfaceId(1),
        }));
    assert!(events.iter().any(|ev| ev.kind
        == EngineEventKind::Delivered {
            frame_id,
            device: pc2
        }));

    // The reply goes straight out of the router port, no switch on that side.
    e.send_packet(pc2, ip("10.0.1.10")).unwrap();
    e.run().unwrap();
    assert_eq!(e.stats.delivered_frames, 2);
}

#[test]
fn same_subnet_packet_skips_the_gateway() {
    let (mut e, pc1, r1, _) = routed_lab(64);
    let log = EventLog::new();
    e.subscribe(log.clone());

    e.send_packet(pc1, ip("10.0.1.1")).unwrap();
    e.run().unwrap();
    assert!(log.events().iter().any(|ev| matches!(
        ev.kind,
        EngineEventKind::Delivered { device, .. } if device == r1
    )));
    assert!(
        !log.events()
            .iter()
            .any(|ev| matches!(ev.kind, EngineEventKind::Routed { .. }))
    );
}

#[test]
fn router_drops_expired_ttl_and_unroutable_packets() {
    let (mut e, pc1, _, _) = routed_lab(1);
    let log = EventLog::new();
    e.subscribe(log.clone());
    e.send_packet(pc1, ip("10.0.2.10")).unwrap();
    e.run().unwrap();
    assert_eq!(drops(&log), vec![DropReason::TtlExpired]);

    let (mut e, pc1, _, _) = routed_lab(64);
    let log = EventLog::new();
    e.subscribe(log.clone());
    e.send_packet(pc1, ip("172.16.0.1")).unwrap();
    e.run().unwrap();
    assert_eq!(drops(&log), vec![DropReason::NoRoute]);
}

#[test]
fn route_on_unwired_interface_is_dropped() {
    let (mut e, pc1, r1, _) = routed_lab(64);
    e.network_mut()
        .add_router_interface(r1, "10.0.3.1/24".parse().unwrap())
        .unwrap();
    let log = EventLog::new();
    e.subscribe(log.clone());

    e.send_packet(pc1, ip("10.0.3.9")).unwrap();
    e.run().unwrap();
    assert_eq!(drops(&log), vec![DropReason::InterfaceDown]);
}

#[test]
fn unresolvable_next_hop_is_dropped() {
    let (mut e, pc1, r1, _) = routed_lab(64);
    e.network_mut()
        .add_route(r1, Route::connected("10.0.9.0/24".parse().unwrap(), InterfaceId(1)))
        .unwrap();
    let log = EventLog::new();
    e.subscribe(log.clone());

    e.send_packet(pc1, ip("10.0.9.9")).unwrap();
    e.run().unwrap();
    assert_eq!(drops(&log), vec![DropReason::Unresolved]);
}

#[test]
fn static_routes_chain_two_routers() {
    let mut net = Network::default();
    let pc1 = net.add_pc("pc1");
    let r1 = net.add_router("r1");
    let r2 = net.add_router("r2");
    let pc2 = net.add_pc("pc2");

    net.add_router_interface(r1, "10.0.1.1/24".parse().unwrap()).unwrap();
    net.add_router_interface(r1, "10.0.12.1/30".parse().unwrap()).unwrap();
    net.add_router_interface(r2, "10.0.12.2/30".parse().unwrap()).unwrap();
    net.add_router_interface(r2, "10.0.2.1/24".parse().unwrap()).unwrap();
    net.add_route(
        r1,
        Route::via("10.0.2.0/24".parse().unwrap(), InterfaceId(1), ip("10.0.12.2")),
    )
    .unwrap();
    net.add_route(
        r2,
        Route::via("10.0.1.0/24".parse().unwrap(), InterfaceId(0), ip("10.0.12.1")),
    )
    .unwrap();
    net.configure_pc(pc1, "10.0.1.10/24".parse().unwrap(), Some(ip("10.0.1.1")))
        .unwrap();
    net.configure_pc(pc2, "10.0.2.10/24".parse().unwrap(), Some(ip("10.0.2.1")))
        .unwrap();
    net.connect(pc1, r1).unwrap();
    net.connect(r1, r2).unwrap();
    net.connect(r2, pc2).unwrap();

    let mut e = Engine::new(net, EngineConfig::default());
    e.start().unwrap();
    e.send_packet(pc1, ip("10.0.2.10")).unwrap();
    e.run().unwrap();
    e.send_packet(pc2, ip("10.0.1.10")).unwrap();
    e.run().unwrap();
    assert_eq!(e.stats.delivered_frames, 2);
    assert_eq!(e.stats.dropped_frames, 0);
    assert_eq!(e.now(), SimTime(6));
}

#[test]
fn send_packet_validates_the_sender() {
    let (mut e, pc1, r1, _) = routed_lab(64);
    assert!(matches!(
        e.send_packet(r1, ip("10.0.2.10")),
        Err(NetError::InvalidTopology(_))
    ));

    let bare = e.network_mut().add_pc("bare");
    assert!(matches!(
        e.send_packet(bare, ip("10.0.2.10")),
        Err(NetError::InvalidAddress(_))
    ));

    e.network_mut()
        .configure_pc(pc1, "10.0.1.10/24".parse().unwrap(), None)
        .unwrap();
    assert_eq!(
        e.send_packet(pc1, ip("10.0.2.10")),
        Err(NetError::NoRoute(ip("10.0.2.10")))
    );
}

#[test]
fn route_changes_notify_observers_and_take_effect() {
    let (mut e, pc1, r1, pc2) = routed_lab(64);
    let log = EventLog::new();
    e.subscribe(log.clone());

    let route = Route::via("10.0.9.0/24".parse().unwrap(), InterfaceId(1), ip("10.0.2.10"));
    e.add_route(r1, route).unwrap();
    e.send_packet(pc1, ip("10.0.9.9")).unwrap();
    e.run().unwrap();
    assert!(log.events().iter().any(|ev| matches!(
        ev.kind,
        EngineEventKind::Delivered { device, .. } if device == pc2
    )));

    let removed = e
        .remove_route(r1, route.prefix, route.interface)
        .unwrap();
    assert_eq!(removed, route);
    e.send_packet(pc1, ip("10.0.9.9")).unwrap();
    e.run().unwrap();
    assert_eq!(drops(&log), vec![DropReason::NoRoute]);
    assert!(matches!(
        e.remove_route(r1, route.prefix, route.interface),
        Err(NetError::NotFound(_))
    ));
    assert!(matches!(
        e.add_route(pc1, route),
        Err(NetError::InvalidTopology(_))
    ));

    let changes: Vec<EngineEventKind> = log
        .events()
        .into_iter()
        .map(|ev| ev.kind)
        .filter(|k| {
            matches!(
                k,
                EngineEventKind::RouteInstalled { .. } | EngineEventKind::RouteRemoved { .. }
            )
        })
        .collect();
    assert_eq!(
        changes,
        vec![
            EngineEventKind::RouteInstalled { router: r1, route },
            EngineEventKind::RouteRemoved { router: r1, route },
        ]
    );
}

#[test]
fn frame_on_a_removed_cable_is_dropped() {
    let mut net = Network::default();
    let a = net.add_pc("A");
    let b = net.add_pc("B");
    net.connect(a, b).unwrap();
    let mut e = Engine::new(net, EngineConfig::default());
    e.start().unwrap();
    let log = EventLog::new();
    e.subscribe(log.clone());

    let mb = mac_of(e.network(), b);
    e.send_frame(a, mb).unwrap();
    e.network_mut().disconnect(a, b).unwrap();
    e.run().unwrap();
    assert_eq!(e.stats.delivered_frames, 0);
    assert_eq!(e.stats.dropped_frames, 1);
    assert_eq!(drops(&log), vec![DropReason::LinkDown]);
}

#[test]
fn renumbering_an_interface_reports_the_route_swap() {
    let (mut e, pc1, r1, _) = routed_lab(64);
    let log = EventLog::new();
    e.subscribe(log.clone());

    let renumbered = e
        .increment_interface_octet(r1, InterfaceId(1), 3, 1)
        .unwrap();
    assert_eq!(renumbered.interface.to_string(), "10.0.3.1/24");
    let old = Route::connected("10.0.2.0/24".parse().unwrap(), InterfaceId(1));
    let new = Route::connected("10.0.3.0/24".parse().unwrap(), InterfaceId(1));
    assert_eq!(renumbered.removed, Some(old));
    assert_eq!(renumbered.installed, Some(new));

    // Host part only: the connected route stays put.
    let renumbered = e
        .increment_interface_octet(r1, InterfaceId(1), 4, 1)
        .unwrap();
    assert_eq!(renumbered.removed, None);
    assert_eq!(renumbered.installed, None);

    let changes: Vec<EngineEventKind> = log.events().into_iter().map(|ev| ev.kind).collect();
    assert_eq!(
        changes,
        vec![
            EngineEventKind::RouteRemoved {
                router: r1,
                route: old
            },
            EngineEventKind::RouteInstalled {
                router: r1,
                route: new
            },
        ]
    );

    e.send_packet(pc1, ip("10.0.2.10")).unwrap();
    e.run().unwrap();
    assert_eq!(drops(&log), vec![DropReason::NoRoute]);

    assert!(matches!(
        e.increment_interface_octet(pc1, InterfaceId(0), 1, 1),
        Err(NetError::InvalidTopology(_))
    ));
}

#[test]
fn disconnect_reports_forgotten_macs() {
    let (mut e, sw, hosts) = star(3, CamConfig::default());
    let log = EventLog::new();
    e.subscribe(log.clone());
    let m1 = mac_of(e.network(), hosts[0]);

    e.send_frame(hosts[0], MacAddress::BROADCAST).unwrap();
    e.send_frame(hosts[1], MacAddress::BROADCAST).unwrap();
    e.run().unwrap();

    let link = e.disconnect(hosts[0], sw).unwrap();
    assert_eq!(link.endpoint(sw).and_then(|ep| ep.port), Some(Port(1)));
    assert_eq!(cam_lookup(&e, sw, &m1), CamLookup::Flood);

    let forgotten: Vec<EngineEventKind> = log
        .events()
        .into_iter()
        .map(|ev| ev.kind)
        .filter(|k| matches!(k, EngineEventKind::MacForgotten { .. }))
        .collect();
    assert_eq!(
        forgotten,
        vec![EngineEventKind::MacForgotten {
            switch: sw,
            mac: m1,
            port: Port(1)
        }]
    );
    assert!(matches!(
        e.disconnect(hosts[0], sw),
        Err(NetError::NotFound(_))
    ));
}
