//! Address resolution integration tests.

use std::time::Duration;

use ndisc::Result;
use ndisc::ndp::wire::NdMessage;
use ndisc::ndp::{
    AddressConfig, LinkAddr, NdEvent, NeighborState, RemovalReason, Resolution, Route,
    RoutingTable,
};

use crate::common::{Lab, addr, data_packet, nd_message};

/// Two nodes with verified addresses `2001:db8::1` and `2001:db8::2`.
fn pair() -> (Lab, usize, usize) {
    let mut lab = Lab::new();
    let a = lab.add_node(1);
    let b = lab.add_node(2);
    for (i, local) in [(a, "2001:db8::1"), (b, "2001:db8::2")] {
        let node = lab.node(i);
        node.stack
            .add_address(node.eth0, AddressConfig::new(addr(local), 64).no_dad())
            .unwrap();
        node.events();
    }
    (lab, a, b)
}

#[test]
fn test_unknown_neighbor_resolved_and_queue_flushed() -> Result<()> {
    let (mut lab, a, b) = pair();
    let peer = addr("2001:db8::2");
    let packet = data_packet(addr("2001:db8::1"), peer, b"hello");
    let peer_hw = lab.nodes[b].hw;

    let node = lab.node(a);
    let eth0 = node.eth0;
    assert_eq!(node.stack.send(eth0, packet.clone())?, Resolution::Pending);
    let entry = node.stack.neighbor(eth0, &peer).unwrap();
    assert_eq!(entry.state(), NeighborState::Incomplete);
    assert_eq!(entry.queued(), 1);

    lab.advance(Duration::ZERO);

    let hw = lab.nodes[a].hw;
    let solicitations: Vec<_> = lab
        .frames_from(hw)
        .into_iter()
        .filter(|f| matches!(nd_message(f), Some((_, _, NdMessage::Solicitation(_)))))
        .collect();
    assert_eq!(solicitations.len(), 1);
    assert!(solicitations[0].to.is_multicast());

    let node = lab.node(a);
    let entry = node.stack.neighbor(eth0, &peer).unwrap();
    assert_eq!(entry.state(), NeighborState::Reachable);
    assert_eq!(entry.link_addr(), Some(peer_hw));
    assert_eq!(entry.queued(), 0);
    assert!(node.events().contains(&NdEvent::NeighborResolved {
        iface: eth0,
        addr: peer,
        link_addr: peer_hw
    }));

    // The parked packet went out unchanged, to the resolved address.
    assert!(
        lab.frames_from(hw)
            .iter()
            .any(|f| f.to == peer_hw && f.data == packet)
    );
    Ok(())
}

#[test]
fn test_resolved_neighbor_sends_immediately() -> Result<()> {
    let (mut lab, a, b) = pair();
    let peer = addr("2001:db8::2");
    let peer_hw = lab.nodes[b].hw;

    let node = lab.node(a);
    let eth0 = node.eth0;
    node.stack
        .send(eth0, data_packet(addr("2001:db8::1"), peer, b"1"))?;
    lab.advance(Duration::ZERO);

    let node = lab.node(a);
    let result = node
        .stack
        .send(eth0, data_packet(addr("2001:db8::1"), peer, b"2"))?;
    assert_eq!(result, Resolution::Resolved(peer_hw));
    Ok(())
}

#[test]
fn test_unanswered_resolution_drops_entry_and_route() -> Result<()> {
    let (mut lab, a, _) = pair();
    let ghost = addr("2001:db8::99");

    let node = lab.node(a);
    let eth0 = node.eth0;
    node.stack
        .routes_mut()
        .add_route(Route::via(addr("2001:db8:1::"), 48, ghost, eth0))?;
    node.stack
        .send(eth0, data_packet(addr("2001:db8::1"), addr("2001:db8:1::5"), b"x"))?;
    assert!(node.stack.neighbor(eth0, &ghost).is_some());

    lab.advance(Duration::from_secs(4));

    let hw = lab.nodes[a].hw;
    assert_eq!(lab.solicitations_from(hw), 3);

    let node = lab.node(a);
    assert!(node.stack.neighbor(eth0, &ghost).is_none());
    assert!(
        node.stack
            .routes()
            .routes()
            .iter()
            .all(|r| r.next_hop != ghost)
    );
    assert!(node.events().contains(&NdEvent::NeighborRemoved {
        iface: eth0,
        addr: ghost,
        reason: RemovalReason::Unresolved
    }));

    // The next send starts over.
    assert!(matches!(
        node.stack
            .send(eth0, data_packet(addr("2001:db8::1"), addr("2001:db8:1::5"), b"y")),
        Err(ndisc::Error::NoRoute(_))
    ));
    Ok(())
}

#[test]
fn test_queue_keeps_newest_packets_in_order() -> Result<()> {
    let (mut lab, a, b) = pair();
    let peer = addr("2001:db8::2");
    let peer_hw = lab.nodes[b].hw;

    let node = lab.node(a);
    let eth0 = node.eth0;
    for n in 0u8..5 {
        node.stack
            .send(eth0, data_packet(addr("2001:db8::1"), peer, &[n]))?;
    }
    assert_eq!(node.stack.neighbor(eth0, &peer).unwrap().queued(), 3);
    assert_eq!(node.stack.interface(eth0).unwrap().stats().queue_drops, 2);

    lab.advance(Duration::ZERO);

    let hw = lab.nodes[a].hw;
    let payloads: Vec<u8> = lab
        .frames_from(hw)
        .iter()
        .filter(|f| f.to == peer_hw && nd_message(f).is_none())
        .filter_map(|f| f.data.last().copied())
        .collect();
    assert_eq!(payloads, vec![2, 3, 4]);
    Ok(())
}

#[test]
fn test_multicast_destination_skips_cache() -> Result<()> {
    let (mut lab, a, _) = pair();
    let group = addr("ff02::1");

    let node = lab.node(a);
    let eth0 = node.eth0;
    let result = node
        .stack
        .send(eth0, data_packet(addr("2001:db8::1"), group, b"m"))?;

    assert_eq!(
        result,
        Resolution::Resolved(LinkAddr::new([0x33, 0x33, 0, 0, 0, 1]))
    );
    assert!(node.stack.neighbor(eth0, &group).is_none());
    Ok(())
}

#[test]
fn test_solicitation_uses_queued_packet_source() -> Result<()> {
    let (mut lab, a, _) = pair();
    let second = addr("2001:db8::5");

    let node = lab.node(a);
    let eth0 = node.eth0;
    node.stack
        .add_address(eth0, AddressConfig::new(second, 64).no_dad())?;
    node.stack
        .send(eth0, data_packet(second, addr("2001:db8::2"), b"s"))?;

    lab.advance(Duration::ZERO);

    let hw = lab.nodes[a].hw;
    let sources: Vec<_> = lab
        .frames_from(hw)
        .iter()
        .filter_map(nd_message)
        .filter(|(_, _, m)| matches!(m, NdMessage::Solicitation(_)))
        .map(|(src, _, _)| src)
        .collect();
    assert_eq!(sources, vec![second]);
    Ok(())
}
