//! Async RCON client: connection facade plus the reader, manager and
//! dispatcher tasks it spawns.
//!
//! One connection runs three cooperating tasks. The reader parses inbound
//! datagrams and forwards typed packets; the manager is the sole socket
//! writer and the sole owner of the in-flight table and sequence cursor;
//! the dispatcher decouples the consumer of server events from the protocol
//! loop. All task boundaries are bounded channels.

pub mod connection;
pub(crate) mod dispatcher;
pub(crate) mod manager;
pub(crate) mod reader;

pub use connection::{Connection, PacketEvent};

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use bytes::Bytes;
use tokio::net::UdpSocket;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use crate::config::Tunables;
use crate::error::Result;

/// Capacity of the facade-to-manager request queue.
pub(crate) const REQUEST_QUEUE: usize = 4;

/// Capacity of the reader-to-manager parsed-packet queue.
pub(crate) const PACKET_QUEUE: usize = 64;

/// Capacity of the manager's internal ack queue.
pub(crate) const ACK_QUEUE: usize = 64;

/// Capacity of the manager-to-dispatcher message queue.
pub(crate) const MESSAGE_QUEUE: usize = 64;

/// Capacity of the consumer-facing events channel.
pub(crate) const EVENTS_QUEUE: usize = 32;

/// A `send` call in flight between the facade and the manager.
pub(crate) struct SendRequest {
    pub command: Bytes,
    pub waiter: oneshot::Sender<Result<Bytes>>,
}

/// State shared by the facade and the connection tasks.
#[derive(Debug)]
pub(crate) struct Shared {
    pub socket: UdpSocket,
    pub tunables: Tunables,
    pub cancel: CancellationToken,
    alive: AtomicBool,
    malformed: AtomicU64,
    last_activity_ms: AtomicU64,
}

impl Shared {
    pub fn new(socket: UdpSocket, tunables: Tunables) -> Self {
        Self {
            socket,
            tunables,
            cancel: CancellationToken::new(),
            alive: AtomicBool::new(false),
            malformed: AtomicU64::new(0),
            last_activity_ms: AtomicU64::new(now_ms()),
        }
    }

    pub fn alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    pub fn set_alive(&self, alive: bool) {
        self.alive.store(alive, Ordering::SeqCst);
    }

    /// Mark not-alive, returning whether this call did the transition.
    pub fn take_alive(&self) -> bool {
        self.alive.swap(false, Ordering::SeqCst)
    }

    /// Fatal-error teardown: mark not-alive and cancel every task.
    pub fn shutdown(&self) {
        self.set_alive(false);
        self.cancel.cancel();
    }

    pub fn count_malformed(&self) {
        self.malformed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn malformed(&self) -> u64 {
        self.malformed.load(Ordering::Relaxed)
    }

    /// Record socket activity (called by the reader after every read).
    pub fn touch(&self) {
        self.last_activity_ms.store(now_ms(), Ordering::Relaxed);
    }

    pub fn last_activity(&self) -> SystemTime {
        UNIX_EPOCH + std::time::Duration::from_millis(self.last_activity_ms.load(Ordering::Relaxed))
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
