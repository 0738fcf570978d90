//! In-memory Ethernet segments for tests and simulations.
//!
//! A [`Segment`] is a shared broadcast domain. Each node attaches its
//! interfaces with a [`LabLink`], which implements
//! [`LinkLayer`](crate::ndp::LinkLayer): unicast frames reach the port with
//! the matching hardware address, multicast frames reach every other port.
//! Frames land in a port's inbox unless a sink is connected, in which case
//! they are pushed straight to it (typically a worker handle).
//!
//! # Example
//!
//! ```ignore
//! use ndisc::lab::{LabLink, Segment};
//!
//! let segment = Segment::new();
//! let mut link = LabLink::new();
//! link.attach(eth0, &segment, mac);
//!
//! let (handle, _task) = ndisc::ndp::worker::spawn(NdStack::new(config, link));
//! let rx = handle.clone();
//! segment.connect(mac, move |frame| {
//!     let _ = rx.deliver(eth0, frame);
//! });
//! ```

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bytes::Bytes;
use tracing::trace;

use crate::ndp::{Error, IfIndex, LinkAddr, LinkLayer, LinkState, Result};

type Sink = Arc<dyn Fn(Bytes) + Send + Sync>;

/// A frame observed on a segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Sending port.
    pub from: LinkAddr,
    /// Destination link-layer address.
    pub to: LinkAddr,
    /// IPv6 packet.
    pub data: Bytes,
}

struct Port {
    hw: LinkAddr,
    up: bool,
    inbox: VecDeque<Bytes>,
    sink: Option<Sink>,
}

#[derive(Default)]
struct SegmentInner {
    ports: Vec<Port>,
    frames: Vec<Frame>,
}

impl SegmentInner {
    fn port(&self, hw: LinkAddr) -> Option<&Port> {
        self.ports.iter().find(|p| p.hw == hw)
    }

    fn port_mut(&mut self, hw: LinkAddr) -> &mut Port {
        match self.ports.iter().position(|p| p.hw == hw) {
            Some(i) => &mut self.ports[i],
            None => {
                self.ports.push(Port {
                    hw,
                    up: true,
                    inbox: VecDeque::new(),
                    sink: None,
                });
                let last = self.ports.len() - 1;
                &mut self.ports[last]
            }
        }
    }
}

/// A shared broadcast domain.
#[derive(Clone, Default)]
pub struct Segment {
    inner: Arc<Mutex<SegmentInner>>,
}

impl fmt::Debug for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.lock();
        f.debug_struct("Segment")
            .field("ports", &inner.ports.len())
            .field("frames", &inner.frames.len())
            .finish()
    }
}

impl Segment {
    /// Create an empty segment.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, SegmentInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add a port with hardware address `hw` (no-op if it exists).
    pub fn plug(&self, hw: LinkAddr) {
        self.lock().port_mut(hw);
    }

    /// Push frames for `hw` into `sink` instead of its inbox.
    ///
    /// Frames already waiting in the inbox are flushed to the sink first.
    pub fn connect<F>(&self, hw: LinkAddr, sink: F)
    where
        F: Fn(Bytes) + Send + Sync + 'static,
    {
        let sink: Sink = Arc::new(sink);
        let pending: Vec<Bytes> = {
            let mut inner = self.lock();
            let port = inner.port_mut(hw);
            port.sink = Some(Arc::clone(&sink));
            port.inbox.drain(..).collect()
        };
        for frame in pending {
            sink(frame);
        }
    }

    /// Bring a port's carrier up or down.
    pub fn set_link(&self, hw: LinkAddr, state: LinkState) {
        self.lock().port_mut(hw).up = state == LinkState::Up;
    }

    /// Carrier state of a port.
    pub fn link_state(&self, hw: LinkAddr) -> LinkState {
        match self.lock().port(hw) {
            Some(port) if port.up => LinkState::Up,
            _ => LinkState::Down,
        }
    }

    /// Drain frames waiting for `hw`.
    pub fn take_inbox(&self, hw: LinkAddr) -> Vec<Bytes> {
        self.lock().port_mut(hw).inbox.drain(..).collect()
    }

    /// Every frame sent on the segment so far.
    pub fn frames(&self) -> Vec<Frame> {
        self.lock().frames.clone()
    }

    /// Forget the frame log.
    pub fn clear_frames(&self) {
        self.lock().frames.clear();
    }

    fn transmit(&self, from: LinkAddr, to: LinkAddr, data: Bytes) -> Result<()> {
        let mut sinks = Vec::new();
        {
            let mut inner = self.lock();
            if !inner.port(from).is_some_and(|p| p.up) {
                return Err(Error::Link(format!("port {from} has no carrier")));
            }
            inner.frames.push(Frame {
                from,
                to,
                data: data.clone(),
            });
            for port in inner.ports.iter_mut() {
                if port.hw == from || !port.up {
                    continue;
                }
                if port.hw != to && !to.is_multicast() {
                    continue;
                }
                match &port.sink {
                    Some(sink) => sinks.push(Arc::clone(sink)),
                    None => port.inbox.push_back(data.clone()),
                }
            }
        }
        trace!(%from, %to, len = data.len(), receivers = sinks.len(), "segment frame");

        // Sinks may call back into the segment.
        for sink in sinks {
            sink(data.clone());
        }
        Ok(())
    }
}

/// Link layer backed by one or more [`Segment`] ports.
#[derive(Debug, Default, Clone)]
pub struct LabLink {
    ports: HashMap<IfIndex, (Segment, LinkAddr)>,
}

impl LabLink {
    /// Create a link with no attachments.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach `iface` to `segment` as hardware address `hw`.
    pub fn attach(&mut self, iface: IfIndex, segment: &Segment, hw: LinkAddr) {
        segment.plug(hw);
        self.ports.insert(iface, (segment.clone(), hw));
    }

    /// Builder form of [`attach`](Self::attach).
    pub fn with_port(mut self, iface: IfIndex, segment: &Segment, hw: LinkAddr) -> Self {
        self.attach(iface, segment, hw);
        self
    }
}

impl LinkLayer for LabLink {
    fn send(&mut self, iface: IfIndex, dst: LinkAddr, frame: Bytes) -> Result<()> {
        let (segment, hw) = self
            .ports
            .get(&iface)
            .ok_or(Error::InterfaceNotFound(iface))?;
        segment.transmit(*hw, dst, frame)
    }

    fn link_state(&self, iface: IfIndex) -> LinkState {
        match self.ports.get(&iface) {
            Some((segment, hw)) => segment.link_state(*hw),
            None => LinkState::Down,
        }
    }
}
