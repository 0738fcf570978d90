//! Neighbor unreachability detection integration tests.

use std::net::Ipv6Addr;
use std::time::Duration;

use ndisc::Result;
use ndisc::ndp::wire::NdMessage;
use ndisc::ndp::{
    AddressConfig, LinkState, NdEvent, NeighborState, RemovalReason, Route, RoutingTable,
};

use crate::common::{Lab, addr, data_packet, mac, nd_message};

const A_ADDR: &str = "2001:db8::1";
const B_ADDR: &str = "2001:db8::2";

/// Two nodes where A has already resolved B.
fn resolved_pair() -> (Lab, usize, usize) {
    let mut lab = Lab::new();
    let a = lab.add_node(1);
    let b = lab.add_node(2);
    for (i, local) in [(a, A_ADDR), (b, B_ADDR)] {
        let node = lab.node(i);
        node.stack
            .add_address(node.eth0, AddressConfig::new(addr(local), 64).no_dad())
            .unwrap();
    }

    let node = lab.node(a);
    node.stack
        .send(node.eth0, data_packet(addr(A_ADDR), addr(B_ADDR), b"0"))
        .unwrap();
    lab.advance(Duration::ZERO);

    let node = lab.node(a);
    assert_eq!(
        node.stack.neighbor(node.eth0, &addr(B_ADDR)).map(|e| e.state()),
        Some(NeighborState::Reachable)
    );
    node.events();
    lab.segment.clear_frames();
    (lab, a, b)
}

fn state(lab: &mut Lab, i: usize, peer: &Ipv6Addr) -> Option<NeighborState> {
    let node = lab.node(i);
    node.stack.neighbor(node.eth0, peer).map(|e| e.state())
}

#[test]
fn test_reachable_goes_stale_after_reachable_time() {
    let (mut lab, a, _) = resolved_pair();
    let peer = addr(B_ADDR);

    lab.advance(Duration::from_millis(29_999));
    assert_eq!(state(&mut lab, a, &peer), Some(NeighborState::Reachable));

    lab.advance(Duration::from_millis(1));
    assert_eq!(state(&mut lab, a, &peer), Some(NeighborState::Stale));

    // Nothing is sent to an idle stale neighbor.
    lab.advance(Duration::from_secs(60));
    assert_eq!(state(&mut lab, a, &peer), Some(NeighborState::Stale));
    let hw = lab.nodes[a].hw;
    assert_eq!(lab.solicitations_from(hw), 0);
}

#[test]
fn test_unanswered_probes_delete_entry_and_routes() -> Result<()> {
    let (mut lab, a, b) = resolved_pair();
    let peer = addr(B_ADDR);
    let peer_hw = lab.nodes[b].hw;

    let node = lab.node(a);
    let eth0 = node.eth0;
    node.stack
        .routes_mut()
        .add_route(Route::via(addr("2001:db8:2::"), 48, peer, eth0))?;

    lab.advance(Duration::from_secs(60));
    assert_eq!(state(&mut lab, a, &peer), Some(NeighborState::Stale));

    // B goes silent.
    lab.segment.set_link(peer_hw, LinkState::Down);
    lab.segment.clear_frames();

    let node = lab.node(a);
    node.stack
        .send(eth0, data_packet(addr(A_ADDR), peer, b"1"))?;
    assert_eq!(state(&mut lab, a, &peer), Some(NeighborState::Delay));

    lab.advance(Duration::from_secs(5));
    assert_eq!(state(&mut lab, a, &peer), Some(NeighborState::Probe));

    lab.advance(Duration::from_secs(4));
    assert_eq!(state(&mut lab, a, &peer), None);

    let hw = lab.nodes[a].hw;
    let probes: Vec<_> = lab
        .frames_from(hw)
        .into_iter()
        .filter(|f| matches!(nd_message(f), Some((_, _, NdMessage::Solicitation(_)))))
        .collect();
    assert_eq!(probes.len(), 3);
    assert!(probes.iter().all(|f| f.to == peer_hw));

    let node = lab.node(a);
    assert!(
        node.stack
            .routes()
            .routes()
            .iter()
            .all(|r| r.next_hop != peer)
    );
    assert!(node.events().contains(&NdEvent::NeighborRemoved {
        iface: eth0,
        addr: peer,
        reason: RemovalReason::Unreachable
    }));
    Ok(())
}

#[test]
fn test_answered_probe_restores_reachability() -> Result<()> {
    let (mut lab, a, _) = resolved_pair();
    let peer = addr(B_ADDR);

    lab.advance(Duration::from_secs(31));
    assert_eq!(state(&mut lab, a, &peer), Some(NeighborState::Stale));

    let node = lab.node(a);
    node.stack
        .send(node.eth0, data_packet(addr(A_ADDR), peer, b"1"))?;
    lab.advance(Duration::from_secs(5));

    assert_eq!(state(&mut lab, a, &peer), Some(NeighborState::Reachable));
    let node = lab.node(a);
    let entry = node.stack.neighbor(node.eth0, &peer).unwrap();
    assert_eq!(entry.unanswered_probes(), 0);
    Ok(())
}

#[test]
fn test_upper_layer_confirmation_skips_probing() -> Result<()> {
    let (mut lab, a, _) = resolved_pair();
    let peer = addr(B_ADDR);

    lab.advance(Duration::from_secs(31));
    let node = lab.node(a);
    let eth0 = node.eth0;
    node.stack
        .send(eth0, data_packet(addr(A_ADDR), peer, b"1"))?;
    assert_eq!(state(&mut lab, a, &peer), Some(NeighborState::Delay));

    let node = lab.node(a);
    node.stack.confirm_reachability(eth0, &peer)?;
    assert_eq!(state(&mut lab, a, &peer), Some(NeighborState::Reachable));

    lab.segment.clear_frames();
    lab.advance(Duration::from_secs(6));
    let hw = lab.nodes[a].hw;
    assert_eq!(lab.solicitations_from(hw), 0);
    Ok(())
}

#[test]
fn test_unreachable_default_router_removed() -> Result<()> {
    let (mut lab, a, b) = resolved_pair();
    let router = addr(B_ADDR);
    let router_hw = lab.nodes[b].hw;

    let node = lab.node(a);
    let eth0 = node.eth0;
    node.stack.add_default_router(eth0, router)?;
    assert_eq!(node.stack.next_hop(eth0, &addr("2001:db8:ff::1"))?, router);

    lab.advance(Duration::from_secs(31));
    lab.segment.set_link(router_hw, LinkState::Down);

    let node = lab.node(a);
    node.stack
        .send(eth0, data_packet(addr(A_ADDR), addr("2001:db8:ff::1"), b"r"))?;
    lab.advance(Duration::from_secs(9));

    let node = lab.node(a);
    let intf = node.stack.interface(eth0).unwrap();
    assert!(intf.routers().is_empty());
    assert!(node.stack.neighbor(eth0, &router).is_none());
    assert!(node.stack.routes().routes().iter().all(|r| !r.is_gateway()));
    Ok(())
}

#[test]
fn test_idle_stale_entry_expires() {
    let (mut lab, a, b) = resolved_pair();
    let peer = addr(B_ADDR);
    let peer_hw = lab.nodes[b].hw;
    lab.segment.set_link(peer_hw, LinkState::Down);

    lab.advance(Duration::from_secs(700));

    assert_eq!(state(&mut lab, a, &peer), None);
    let node = lab.node(a);
    let eth0 = node.eth0;
    assert!(node.events().contains(&NdEvent::NeighborRemoved {
        iface: eth0,
        addr: peer,
        reason: RemovalReason::Expired
    }));
}

#[test]
fn test_static_neighbor_never_probed() -> Result<()> {
    let mut lab = Lab::new();
    let a = lab.add_node(1);
    let peer = addr(B_ADDR);

    let node = lab.node(a);
    let eth0 = node.eth0;
    node.stack
        .add_address(eth0, AddressConfig::new(addr(A_ADDR), 64).no_dad())?;
    node.stack.add_static_neighbor(eth0, peer, mac(2))?;

    for _ in 0..3 {
        let node = lab.node(a);
        node.stack
            .send(eth0, data_packet(addr(A_ADDR), peer, b"p"))?;
        lab.advance(Duration::from_secs(40));
    }

    let node = lab.node(a);
    let entry = node.stack.neighbor(eth0, &peer).unwrap();
    assert!(entry.is_permanent());
    let hw = lab.nodes[a].hw;
    assert_eq!(lab.solicitations_from(hw), 0);
    Ok(())
}
