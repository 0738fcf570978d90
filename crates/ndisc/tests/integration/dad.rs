//! Duplicate address detection integration tests.
//!
//! Nodes probe for addresses over a shared lab segment.

use std::time::Duration;

use ndisc::Result;
use ndisc::ndp::types::link::link_local;
use ndisc::ndp::wire::NeighborAdvertisement;
use ndisc::ndp::types::ALL_NODES;
use ndisc::ndp::{AddressConfig, AddressState, InterfaceConfig, NdEvent};

use crate::common::{Lab, addr, mac};

#[test]
fn test_idle_link_address_becomes_active() -> Result<()> {
    let mut lab = Lab::new();
    let a = lab.add_node(1);
    let target = addr("fe80::1");

    let node = lab.node(a);
    node.stack
        .add_address(node.eth0, AddressConfig::new(target, 64))?;
    assert_eq!(
        node.stack.address(node.eth0, &target).map(|a| a.state()),
        Some(AddressState::Tentative)
    );

    lab.advance(Duration::from_secs(1));

    let node = lab.node(a);
    let eth0 = node.eth0;
    assert_eq!(
        node.stack.address(eth0, &target).map(|a| a.state()),
        Some(AddressState::Active)
    );
    assert!(node.stack.interface(eth0).unwrap().dad_session(
        node.stack.address(eth0, &target).unwrap().id()
    ).is_none());
    assert_eq!(
        node.events(),
        vec![
            NdEvent::AddressTentative {
                iface: eth0,
                addr: target
            },
            NdEvent::AddressReady {
                iface: eth0,
                addr: target
            },
        ]
    );
    let hw = lab.nodes[a].hw;
    assert_eq!(lab.solicitations_from(hw), 1);
    Ok(())
}

#[test]
fn test_defended_address_is_duplicated() -> Result<()> {
    let mut lab = Lab::new();
    let a = lab.add_node(1);
    let b = lab.add_node(2);
    let target = addr("fe80::1");

    let owner = lab.node(b);
    owner
        .stack
        .add_address(owner.eth0, AddressConfig::new(target, 64).no_dad())?;
    owner.events();

    let node = lab.node(a);
    node.stack
        .add_address(node.eth0, AddressConfig::new(target, 64))?;
    lab.pump();

    let node = lab.node(a);
    let eth0 = node.eth0;
    assert_eq!(
        node.stack.address(eth0, &target).map(|a| a.state()),
        Some(AddressState::Duplicated)
    );

    // The verify timer removes it; nothing else is sent for it.
    lab.advance(Duration::from_secs(3));
    let node = lab.node(a);
    assert!(node.stack.address(eth0, &target).is_none());
    let events = node.events();
    assert!(events.contains(&NdEvent::AddressDuplicated {
        iface: eth0,
        addr: target
    }));
    assert!(events.contains(&NdEvent::AddressRemoved {
        iface: eth0,
        addr: target
    }));
    assert!(!events.iter().any(|e| matches!(e, NdEvent::AddressReady { .. })));

    let hw = lab.nodes[a].hw;
    assert_eq!(lab.solicitations_from(hw), 1);

    // The defender keeps its address.
    let owner = lab.node(b);
    assert_eq!(
        owner.stack.address(owner.eth0, &target).map(|a| a.state()),
        Some(AddressState::Active)
    );
    Ok(())
}

#[test]
fn test_exactly_configured_solicitations_sent() -> Result<()> {
    let mut lab = Lab::new();
    let a = lab.add_node_with(InterfaceConfig::ethernet("eth0", mac(1)).dad_transmits(3));
    let target = addr("2001:db8::10");

    let node = lab.node(a);
    node.stack
        .add_address(node.eth0, AddressConfig::new(target, 64))?;

    lab.advance(Duration::from_millis(2500));
    let node = lab.node(a);
    assert_eq!(
        node.stack.address(node.eth0, &target).map(|a| a.state()),
        Some(AddressState::Tentative)
    );

    lab.advance(Duration::from_secs(5));
    let node = lab.node(a);
    assert_eq!(
        node.stack.address(node.eth0, &target).map(|a| a.state()),
        Some(AddressState::Active)
    );
    let hw = lab.nodes[a].hw;
    assert_eq!(lab.solicitations_from(hw), 3);
    Ok(())
}

#[test]
fn test_advertisement_anywhere_in_window_duplicates() -> Result<()> {
    let target = addr("2001:db8::10");

    for offset_ms in [0, 500, 1500, 2900] {
        let mut lab = Lab::new();
        let a = lab.add_node_with(InterfaceConfig::ethernet("eth0", mac(1)).dad_transmits(3));
        let node = lab.node(a);
        let eth0 = node.eth0;
        node.stack
            .add_address(eth0, AddressConfig::new(target, 64))?;

        lab.advance(Duration::from_millis(offset_ms));
        let na = NeighborAdvertisement::new(target).target_link_addr(mac(9));
        let node = lab.node(a);
        let _ = node.stack.input(eth0, &na.to_packet(target, ALL_NODES));

        lab.advance(Duration::from_secs(5));
        let node = lab.node(a);
        let events = node.events();
        assert!(
            events.contains(&NdEvent::AddressDuplicated {
                iface: eth0,
                addr: target
            }),
            "advertisement at {offset_ms}ms not detected"
        );
        assert!(!events.iter().any(|e| matches!(e, NdEvent::AddressReady { .. })));
        assert!(node.stack.address(eth0, &target).is_none());
    }
    Ok(())
}

#[test]
fn test_simultaneous_probes_both_back_off() -> Result<()> {
    let mut lab = Lab::new();
    let a = lab.add_node(1);
    let b = lab.add_node(2);
    let target = addr("2001:db8::77");

    for i in [a, b] {
        let node = lab.node(i);
        node.stack
            .add_address(node.eth0, AddressConfig::new(target, 64))?;
    }
    lab.pump();
    lab.advance(Duration::from_millis(1500));

    for i in [a, b] {
        let node = lab.node(i);
        let eth0 = node.eth0;
        assert!(
            node.events().contains(&NdEvent::AddressDuplicated {
                iface: eth0,
                addr: target
            }),
            "node {i} kept a contested address"
        );
    }
    Ok(())
}

#[test]
fn test_duplicate_link_local_disables_ipv6() -> Result<()> {
    let mut lab = Lab::new();
    let a = lab.add_node(1);
    let b = lab.add_node(2);
    let ll = link_local(&mac(1).interface_id());

    // Another node already answers for A's interface-derived address.
    let owner = lab.node(b);
    owner
        .stack
        .add_address(owner.eth0, AddressConfig::new(ll, 64).no_dad())?;

    let node = lab.node(a);
    node.stack.autoconfigure(node.eth0)?;
    lab.advance(Duration::from_secs(3));

    let node = lab.node(a);
    let eth0 = node.eth0;
    let events = node.events();
    assert!(events.contains(&NdEvent::AddressDuplicated { iface: eth0, addr: ll }));
    assert!(events.contains(&NdEvent::InterfaceDisabled { iface: eth0 }));
    assert!(!events.iter().any(|e| matches!(e, NdEvent::RouterSolicitation { .. })));
    assert!(!node.stack.interface(eth0).unwrap().is_ipv6_up());
    Ok(())
}
