use crate::net::{CamConfig, CamLookup, CamTable, MacAddress, Port};
use crate::sim::SimTime;

fn mac(n: u32) -> MacAddress {
    MacAddress::locally_administered(n)
}

#[test]
fn learning_same_binding_twice_keeps_one_entry() {
    let mut cam = CamTable::default();
    assert!(cam.learn_mac_address(mac(1), Port(1), SimTime(1)).is_none());
    let prev = cam
        .learn_mac_address(mac(1), Port(1), SimTime(5))
        .expect("refresh returns the previous entry");
    assert_eq!(prev.port, Port(1));
    assert_eq!(prev.last_seen, SimTime(1));
    assert_eq!(cam.len(), 1);
    assert_eq!(cam.get(&mac(1)).unwrap().last_seen, SimTime(5));
}

#[test]
fn learning_on_new_port_overwrites_old_binding() {
    let mut cam = CamTable::default();
    cam.learn_mac_address(mac(1), Port(1), SimTime(1));
    let prev = cam.learn_mac_address(mac(1), Port(3), SimTime(2));
    assert_eq!(prev.map(|e| e.port), Some(Port(1)));
    assert_eq!(cam.len(), 1);
    assert_eq!(cam.lookup(&mac(1)), CamLookup::Port(Port(3)));
}

#[test]
fn forgetting_unknown_mac_is_noop() {
    let mut cam = CamTable::default();
    cam.learn_mac_address(mac(1), Port(1), SimTime(0));
    assert!(!cam.forget_mac_address(&mac(2)));
    assert_eq!(cam.len(), 1);

    assert!(cam.forget_mac_address(&mac(1)));
    assert!(!cam.forget_mac_address(&mac(1)));
    assert!(cam.is_empty());
}

#[test]
fn unknown_and_broadcast_destinations_flood() {
    let mut cam = CamTable::default();
    assert_eq!(cam.lookup(&mac(7)), CamLookup::Flood);
    cam.learn_mac_address(MacAddress::BROADCAST, Port(2), SimTime(0));
    assert_eq!(cam.lookup(&MacAddress::BROADCAST), CamLookup::Flood);
}

#[test]
fn forget_port_removes_every_mac_on_that_port() {
    let mut cam = CamTable::default();
    cam.learn_mac_address(mac(1), Port(1), SimTime(0));
    cam.learn_mac_address(mac(2), Port(2), SimTime(0));
    cam.learn_mac_address(mac(3), Port(2), SimTime(0));
    assert_eq!(cam.forget_port(Port(2)), 2);
    assert_eq!(cam.forget_port(Port(2)), 0);
    assert_eq!(cam.len(), 1);
    assert_eq!(cam.lookup(&mac(3)), CamLookup::Flood);
}

#[test]
fn entries_snapshot_is_sorted_by_mac() {
    let mut cam = CamTable::default();
    cam.learn_mac_address(mac(3), Port(1), SimTime(0));
    cam.learn_mac_address(mac(1), Port(2), SimTime(0));
    cam.learn_mac_address(mac(2), Port(3), SimTime(0));
    let macs: Vec<MacAddress> = cam.entries().into_iter().map(|(m, _)| m).collect();
    assert_eq!(macs, vec![mac(1), mac(2), mac(3)]);
}

#[test]
fn aging_disabled_keeps_entries_forever() {
    let mut cam = CamTable::new(CamConfig { max_age: None });
    cam.learn_mac_address(mac(1), Port(1), SimTime(0));
    assert!(cam.age_entries(SimTime(u64::MAX)).is_empty());
    assert_eq!(cam.len(), 1);
}

#[test]
fn aging_evicts_entries_older_than_max_age() {
    let mut cam = CamTable::new(CamConfig { max_age: Some(10) });
    cam.learn_mac_address(mac(1), Port(1), SimTime(0));
    cam.learn_mac_address(mac(2), Port(2), SimTime(5));

    // Exactly max_age old is still fresh.
    assert!(cam.age_entries(SimTime(10)).is_empty());
    assert_eq!(cam.age_entries(SimTime(11)), vec![mac(1)]);
    assert_eq!(cam.len(), 1);

    // A refresh restarts the clock.
    cam.learn_mac_address(mac(2), Port(2), SimTime(12));
    assert!(cam.age_entries(SimTime(20)).is_empty());
    assert_eq!(cam.age_entries(SimTime(23)), vec![mac(2)]);
    assert!(cam.is_empty());
}

#[test]
fn max_age_can_be_changed_at_runtime() {
    let mut cam = CamTable::default();
    assert_eq!(cam.max_age(), None);
    cam.learn_mac_address(mac(1), Port(1), SimTime(0));
    cam.set_max_age(Some(1));
    assert_eq!(cam.age_entries(SimTime(2)), vec![mac(1)]);
}
