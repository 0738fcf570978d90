//! Address lifecycle integration tests.
//!
//! Creation, lifetimes and deletion, with emphasis on the routes each
//! address leaves behind.

use std::time::Duration;

use ndisc::ndp::types::link::with_interface_id;
use ndisc::ndp::{
    AddressConfig, AddressState, Lifetime, LinkState, NdEvent, Route, RouteKind, RoutingTable,
};
use ndisc::{Error, Result};

use crate::common::{Lab, addr, mac};

#[test]
fn test_delete_twice_leaves_unrelated_routes() -> Result<()> {
    let mut lab = Lab::new();
    let a = lab.add_node(1);
    let node = lab.node(a);
    let eth0 = node.eth0;

    node.stack
        .add_address(eth0, AddressConfig::new(addr("2001:db8::1"), 64).no_dad())?;
    node.stack
        .add_address(eth0, AddressConfig::new(addr("2001:db8:5::1"), 64).no_dad())?;
    node.stack
        .routes_mut()
        .add_route(Route::via(addr("2001:db8:7::"), 48, addr("2001:db8:5::fe"), eth0))?;
    let before = node.stack.routes().routes().len();

    node.stack.delete_address(eth0, &addr("2001:db8::1"))?;
    let after_first = node.stack.routes().routes();
    assert_eq!(after_first.len(), before - 1);

    let second = node.stack.delete_address(eth0, &addr("2001:db8::1"));
    assert!(matches!(second, Err(Error::AddressNotFound { .. })));
    assert_eq!(node.stack.routes().routes(), after_first);
    assert!(
        after_first
            .iter()
            .any(|r| r.kind == RouteKind::Gateway && r.next_hop == addr("2001:db8:5::fe"))
    );
    Ok(())
}

#[test]
fn test_delete_removes_orphaned_gateway_routes() -> Result<()> {
    let mut lab = Lab::new();
    let a = lab.add_node(1);
    let node = lab.node(a);
    let eth0 = node.eth0;

    node.stack
        .add_address(eth0, AddressConfig::new(addr("2001:db8::1"), 64).no_dad())?;
    // Reachable only through the prefix the address brings.
    node.stack
        .routes_mut()
        .add_route(Route::via(addr("2001:db8:9::"), 48, addr("2001:db8::fe"), eth0))?;
    // Through a link-local router, independent of any global prefix.
    node.stack
        .routes_mut()
        .add_route(Route::via(addr("2001:db8:a::"), 48, addr("fe80::fe"), eth0))?;

    node.stack.delete_address(eth0, &addr("2001:db8::1"))?;

    let routes = node.stack.routes().routes();
    assert!(routes.iter().all(|r| r.next_hop != addr("2001:db8::fe")));
    assert!(routes.iter().all(|r| r.next_hop != addr("2001:db8::1")));
    assert!(routes.iter().any(|r| r.next_hop == addr("fe80::fe")));
    Ok(())
}

#[test]
fn test_lifetimes_deprecate_then_expire() -> Result<()> {
    let mut lab = Lab::new();
    let a = lab.add_node(1);
    let target = addr("2001:db8::1");
    let node = lab.node(a);
    let eth0 = node.eth0;

    node.stack.add_address(
        eth0,
        AddressConfig::new(target, 64)
            .preferred(Lifetime::Seconds(10))
            .valid(Lifetime::Seconds(20)),
    )?;

    lab.advance(Duration::from_secs(11));
    let node = lab.node(a);
    assert_eq!(
        node.stack.address(eth0, &target).map(|a| a.state()),
        Some(AddressState::Deprecated)
    );
    assert!(node.events().contains(&NdEvent::AddressDeprecated {
        iface: eth0,
        addr: target
    }));

    lab.advance(Duration::from_secs(10));
    let node = lab.node(a);
    assert!(node.stack.address(eth0, &target).is_none());
    assert!(
        node.stack
            .routes()
            .routes()
            .iter()
            .all(|r| r.next_hop != target)
    );
    assert!(node.events().contains(&NdEvent::AddressRemoved {
        iface: eth0,
        addr: target
    }));
    Ok(())
}

#[test]
fn test_renewed_preferred_lifetime_reactivates() -> Result<()> {
    let mut lab = Lab::new();
    let a = lab.add_node(1);
    let target = addr("2001:db8::1");
    let node = lab.node(a);
    let eth0 = node.eth0;

    node.stack.add_address(
        eth0,
        AddressConfig::new(target, 64)
            .preferred(Lifetime::Seconds(5))
            .valid(Lifetime::Seconds(60)),
    )?;
    lab.advance(Duration::from_secs(6));

    let node = lab.node(a);
    node.stack
        .update_lifetimes(eth0, &target, Some(Lifetime::Seconds(30)), None)?;
    assert_eq!(
        node.stack.address(eth0, &target).map(|a| a.state()),
        Some(AddressState::Active)
    );

    // The valid lifetime was left alone and still ends the address.
    lab.advance(Duration::from_secs(60));
    let node = lab.node(a);
    assert!(node.stack.address(eth0, &target).is_none());
    Ok(())
}

#[test]
fn test_address_from_prefix_uses_interface_id() -> Result<()> {
    let mut lab = Lab::new();
    let a = lab.add_node(1);
    let node = lab.node(a);
    let eth0 = node.eth0;
    let prefix = addr("2001:db8:1::");

    let id = node.stack.add_address_from_prefix(
        eth0,
        prefix,
        64,
        Lifetime::Infinite,
        Lifetime::Infinite,
    )?;
    let expected = with_interface_id(&prefix, 64, &mac(1).interface_id());
    let entry = node.stack.address(eth0, &expected).unwrap();
    assert_eq!(entry.id(), id);

    // Seen again: same address, refreshed in place.
    let again = node.stack.add_address_from_prefix(
        eth0,
        prefix,
        64,
        Lifetime::Seconds(300),
        Lifetime::Seconds(600),
    )?;
    assert_eq!(again, id);
    assert_eq!(
        node.stack.address(eth0, &expected).map(|a| a.valid()),
        Some(Lifetime::Seconds(600))
    );

    assert!(matches!(
        node.stack
            .add_address_from_prefix(eth0, prefix, 80, Lifetime::Infinite, Lifetime::Infinite),
        Err(Error::InvalidPrefix(80))
    ));
    Ok(())
}

#[test]
fn test_link_up_resumes_deferred_dad() -> Result<()> {
    let mut lab = Lab::new();
    let a = lab.add_node(1);
    let hw = lab.nodes[a].hw;
    let target = addr("2001:db8::1");

    lab.segment.set_link(hw, LinkState::Down);
    let node = lab.node(a);
    let eth0 = node.eth0;
    node.stack.add_address(eth0, AddressConfig::new(target, 64))?;

    lab.advance(Duration::from_secs(3));
    assert_eq!(lab.solicitations_from(hw), 0);
    let node = lab.node(a);
    assert_eq!(
        node.stack.address(eth0, &target).map(|a| a.state()),
        Some(AddressState::Tentative)
    );

    lab.segment.set_link(hw, LinkState::Up);
    let node = lab.node(a);
    node.stack.link_changed(eth0, LinkState::Up);
    lab.advance(Duration::from_secs(1));

    let node = lab.node(a);
    assert_eq!(
        node.stack.address(eth0, &target).map(|a| a.state()),
        Some(AddressState::Active)
    );
    assert_eq!(lab.solicitations_from(hw), 1);
    Ok(())
}

#[test]
fn test_remove_interface_clears_everything() -> Result<()> {
    let mut lab = Lab::new();
    let a = lab.add_node(1);
    let node = lab.node(a);
    let eth0 = node.eth0;

    node.stack
        .add_address(eth0, AddressConfig::new(addr("2001:db8::1"), 64).no_dad())?;
    node.stack.add_default_router(eth0, addr("fe80::1"))?;
    node.stack.remove_interface(eth0)?;

    assert!(node.stack.interface(eth0).is_none());
    assert!(node.stack.routes().routes().is_empty());
    assert!(node.stack.next_deadline().is_none());
    Ok(())
}
