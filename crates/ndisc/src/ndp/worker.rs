//! Async driver for an [`NdStack`].
//!
//! The stack itself is synchronous and clock-agnostic. [`spawn`] moves it
//! onto a tokio task that owns it exclusively: packets, link changes and
//! management calls arrive over a channel and are applied one at a time,
//! and the task sleeps until the stack's next timer deadline between
//! commands. Virtual stack time is anchored to the task's start instant, so
//! a paused tokio clock drives the protocol deterministically in tests.
//!
//! # Example
//!
//! ```ignore
//! use ndisc::ndp::{worker, AddressConfig};
//!
//! let (handle, task) = worker::spawn(stack);
//! let mut events = handle.subscribe()?;
//!
//! handle
//!     .with(move |stack| stack.add_address(eth0, AddressConfig::new(addr, 64)))
//!     .await??;
//!
//! // Driver receive path.
//! handle.deliver(eth0, frame)?;
//! ```

use std::time::Duration;

use bytes::Bytes;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use tracing::{debug, trace};

use super::address::{AddressConfig, AddressId};
use super::error::{Error, Result};
use super::event::{EventStream, NdEvent};
use super::interface::IfIndex;
use super::link::{LinkLayer, LinkState};
use super::multicast::{GroupTable, MulticastGroups};
use super::resolve::Resolution;
use super::route::{RouteTable, RoutingTable};
use super::stack::NdStack;

/// How long the worker sleeps when no timer is armed.
const IDLE_WAKEUP: Duration = Duration::from_secs(3600);

type Call<L, R, M> = Box<dyn FnOnce(&mut NdStack<L, R, M>) + Send>;

enum Command<L, R, M> {
    Input { iface: IfIndex, frame: Bytes },
    LinkChanged { iface: IfIndex, state: LinkState },
    Subscribe(mpsc::UnboundedSender<NdEvent>),
    Call(Call<L, R, M>),
    Shutdown,
}

/// Cloneable handle to a running worker.
pub struct WorkerHandle<L, R = RouteTable, M = GroupTable> {
    tx: mpsc::UnboundedSender<Command<L, R, M>>,
}

impl<L, R, M> Clone for WorkerHandle<L, R, M> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<L, R, M> std::fmt::Debug for WorkerHandle<L, R, M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerHandle")
            .field("closed", &self.tx.is_closed())
            .finish()
    }
}

impl<L, R, M> WorkerHandle<L, R, M>
where
    L: LinkLayer + Send + 'static,
    R: RoutingTable + Send + 'static,
    M: MulticastGroups + Send + 'static,
{
    fn command(&self, command: Command<L, R, M>) -> Result<()> {
        self.tx.send(command).map_err(|_| Error::WorkerClosed)
    }

    /// Queue an inbound packet for processing.
    ///
    /// Never blocks, so it can be called from a driver's receive path.
    pub fn deliver(&self, iface: IfIndex, frame: Bytes) -> Result<()> {
        self.command(Command::Input { iface, frame })
    }

    /// Report a link state change.
    pub fn link_changed(&self, iface: IfIndex, state: LinkState) -> Result<()> {
        self.command(Command::LinkChanged { iface, state })
    }

    /// Subscribe to protocol events emitted from now on.
    pub fn subscribe(&self) -> Result<EventStream> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.command(Command::Subscribe(tx))?;
        Ok(EventStream::new(rx))
    }

    /// Run `f` against the stack on the worker task and return its result.
    pub async fn with<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut NdStack<L, R, M>) -> T + Send + 'static,
        T: Send + 'static,
    {
        let (reply, rx) = oneshot::channel();
        self.command(Command::Call(Box::new(move |stack| {
            let _ = reply.send(f(stack));
        })))?;
        rx.await.map_err(|_| Error::WorkerClosed)
    }

    /// Add an address to an interface.
    pub async fn add_address(&self, iface: IfIndex, config: AddressConfig) -> Result<AddressId> {
        self.with(move |stack| stack.add_address(iface, config))
            .await?
    }

    /// Delete an address from an interface.
    pub async fn delete_address(&self, iface: IfIndex, addr: std::net::Ipv6Addr) -> Result<()> {
        self.with(move |stack| stack.delete_address(iface, &addr))
            .await?
    }

    /// Send an IPv6 packet out of `iface`, resolving its next hop.
    pub async fn send(&self, iface: IfIndex, packet: Bytes) -> Result<Resolution> {
        self.with(move |stack| stack.send(iface, packet)).await?
    }

    /// Stop the worker. The task's [`JoinHandle`] yields the stack.
    pub fn shutdown(&self) -> Result<()> {
        self.command(Command::Shutdown)
    }
}

struct Worker<L, R, M> {
    stack: NdStack<L, R, M>,
    rx: mpsc::UnboundedReceiver<Command<L, R, M>>,
    subscribers: Vec<mpsc::UnboundedSender<NdEvent>>,
    epoch: Instant,
}

impl<L, R, M> Worker<L, R, M>
where
    L: LinkLayer,
    R: RoutingTable,
    M: MulticastGroups,
{
    async fn run(mut self) -> NdStack<L, R, M> {
        loop {
            let wake = match self.stack.next_deadline() {
                Some(deadline) => self.epoch + deadline,
                None => Instant::now() + IDLE_WAKEUP,
            };

            tokio::select! {
                command = self.rx.recv() => {
                    let Some(command) = command else { break };
                    self.catch_up();
                    if !self.handle(command) {
                        break;
                    }
                }
                _ = time::sleep_until(wake) => {}
            }

            self.catch_up();
            self.publish();
        }

        self.publish();
        debug!(now = ?self.stack.now(), "neighbor discovery worker stopped");
        self.stack
    }

    /// Bring stack time up to the wall clock, firing everything due.
    ///
    /// Timers armed with no delay are due at the current stack time, so
    /// this runs even when the clock has not moved.
    fn catch_up(&mut self) {
        let now = self.epoch.elapsed().max(self.stack.now());
        self.stack.advance_to(now);
    }

    fn handle(&mut self, command: Command<L, R, M>) -> bool {
        match command {
            Command::Input { iface, frame } => {
                if let Err(e) = self.stack.input(iface, &frame) {
                    trace!(%iface, error = %e, "inbound packet dropped");
                }
            }
            Command::LinkChanged { iface, state } => self.stack.link_changed(iface, state),
            Command::Subscribe(tx) => self.subscribers.push(tx),
            Command::Call(f) => f(&mut self.stack),
            Command::Shutdown => return false,
        }
        true
    }

    fn publish(&mut self) {
        let events = self.stack.take_events();
        if events.is_empty() {
            return;
        }
        for event in events {
            trace!(?event, "event");
            self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
        }
    }
}

/// Move `stack` onto a new tokio task.
///
/// The task runs until every handle is dropped or
/// [`WorkerHandle::shutdown`] is called, then returns the stack.
pub fn spawn<L, R, M>(stack: NdStack<L, R, M>) -> (WorkerHandle<L, R, M>, JoinHandle<NdStack<L, R, M>>)
where
    L: LinkLayer + Send + 'static,
    R: RoutingTable + Send + 'static,
    M: MulticastGroups + Send + 'static,
{
    let (tx, rx) = mpsc::unbounded_channel();
    let now = Instant::now();
    let epoch = now.checked_sub(stack.now()).unwrap_or(now);
    let worker = Worker {
        stack,
        rx,
        subscribers: Vec::new(),
        epoch,
    };
    (WorkerHandle { tx }, tokio::spawn(worker.run()))
}
