//! Worker integration tests.
//!
//! Each node runs on its own worker task; the segment pushes frames
//! straight into the receiving worker's handle. Tokio's clock is paused,
//! so timers fire as soon as every task is idle.

use std::net::Ipv6Addr;
use std::time::Duration;

use bytes::Bytes;
use ndisc::lab::{LabLink, Segment};
use ndisc::ndp::worker::{self, WorkerHandle};
use ndisc::ndp::{
    AddressConfig, AddressState, IfIndex, InterfaceConfig, LinkAddr, LinkState, NdEvent, NdStack,
    NeighborState, Resolution, StackConfig,
};
use tokio::time::timeout;
use tokio_stream::StreamExt;

use crate::common::{addr, data_packet, mac};

/// Give up on an event after this much virtual time.
const EVENT_TIMEOUT: Duration = Duration::from_secs(30);

/// Spawn a node on `segment` and wire its port to the worker.
fn spawn_node(segment: &Segment, hw: LinkAddr) -> (WorkerHandle<LabLink>, IfIndex) {
    let mut stack = NdStack::new(StackConfig::new(), LabLink::new());
    let eth0 = stack.add_interface(InterfaceConfig::ethernet("eth0", hw));
    stack.link_mut().attach(eth0, segment, hw);
    stack.enable_interface(eth0).unwrap();

    let (handle, _task) = worker::spawn(stack);
    let rx = handle.clone();
    segment.connect(hw, move |frame: Bytes| {
        let _ = rx.deliver(eth0, frame);
    });
    (handle, eth0)
}

async fn wait_for<F>(events: &mut ndisc::ndp::EventStream, mut pred: F) -> NdEvent
where
    F: FnMut(&NdEvent) -> bool,
{
    timeout(EVENT_TIMEOUT, async {
        loop {
            match events.next().await {
                Some(event) if pred(&event) => return event,
                Some(_) => continue,
                None => panic!("event stream ended"),
            }
        }
    })
    .await
    .expect("event not seen in time")
}

async fn address_state(
    handle: &WorkerHandle<LabLink>,
    iface: IfIndex,
    target: Ipv6Addr,
) -> Option<AddressState> {
    handle
        .with(move |stack| stack.address(iface, &target).map(|a| a.state()))
        .await
        .unwrap()
}

#[tokio::test(start_paused = true)]
async fn test_resolution_between_workers() {
    let segment = Segment::new();
    let (a, a_eth0) = spawn_node(&segment, mac(1));
    let (b, b_eth0) = spawn_node(&segment, mac(2));
    let local = addr("2001:db8::1");
    let peer = addr("2001:db8::2");

    a.add_address(a_eth0, AddressConfig::new(local, 64).no_dad())
        .await
        .unwrap();
    b.add_address(b_eth0, AddressConfig::new(peer, 64).no_dad())
        .await
        .unwrap();

    let mut events = a.subscribe().unwrap();
    let result = a
        .send(a_eth0, data_packet(local, peer, b"ping"))
        .await
        .unwrap();
    assert_eq!(result, Resolution::Pending);

    let resolved = wait_for(&mut events, |e| matches!(e, NdEvent::NeighborResolved { .. })).await;
    assert_eq!(
        resolved,
        NdEvent::NeighborResolved {
            iface: a_eth0,
            addr: peer,
            link_addr: mac(2)
        }
    );

    let state = a
        .with(move |stack| stack.neighbor(a_eth0, &peer).map(|e| e.state()))
        .await
        .unwrap();
    assert_eq!(state, Some(NeighborState::Reachable));

    // B learned A from the solicitation.
    let learned = b
        .with(move |stack| stack.neighbor(b_eth0, &local).and_then(|e| e.link_addr()))
        .await
        .unwrap();
    assert_eq!(learned, Some(mac(1)));
}

#[tokio::test(start_paused = true)]
async fn test_duplicate_detected_between_workers() {
    let segment = Segment::new();
    let (a, a_eth0) = spawn_node(&segment, mac(1));
    let (b, b_eth0) = spawn_node(&segment, mac(2));
    let target = addr("2001:db8::42");

    b.add_address(b_eth0, AddressConfig::new(target, 64).no_dad())
        .await
        .unwrap();

    let mut events = a.subscribe().unwrap();
    a.add_address(a_eth0, AddressConfig::new(target, 64))
        .await
        .unwrap();

    let event = wait_for(&mut events, |e| {
        matches!(
            e,
            NdEvent::AddressDuplicated { .. } | NdEvent::AddressReady { .. }
        )
    })
    .await;
    assert_eq!(
        event,
        NdEvent::AddressDuplicated {
            iface: a_eth0,
            addr: target
        }
    );
    assert_eq!(
        address_state(&b, b_eth0, target).await,
        Some(AddressState::Active)
    );
}

#[tokio::test(start_paused = true)]
async fn test_link_change_through_handle_defers_dad() {
    let segment = Segment::new();
    let (a, a_eth0) = spawn_node(&segment, mac(1));
    let target = addr("2001:db8::7");

    segment.set_link(mac(1), LinkState::Down);
    a.link_changed(a_eth0, LinkState::Down).unwrap();
    a.add_address(a_eth0, AddressConfig::new(target, 64))
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(
        address_state(&a, a_eth0, target).await,
        Some(AddressState::Tentative)
    );

    let mut events = a.subscribe().unwrap();
    segment.set_link(mac(1), LinkState::Up);
    a.link_changed(a_eth0, LinkState::Up).unwrap();

    wait_for(&mut events, |e| matches!(e, NdEvent::AddressReady { .. })).await;
    assert_eq!(
        address_state(&a, a_eth0, target).await,
        Some(AddressState::Active)
    );
}
