//! Connection facade: lifecycle, the public `send` path and tunables.

use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};

use bytes::Bytes;
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, timeout, Instant};
use tracing::{debug, info, warn};

use crate::client::manager::Manager;
use crate::client::{dispatcher, reader, SendRequest, Shared};
use crate::client::{EVENTS_QUEUE, MESSAGE_QUEUE, PACKET_QUEUE, REQUEST_QUEUE};
use crate::config::{Config, Tunables};
use crate::error::{Error, Result};
use crate::packet::{Packet, PacketKind, LOGIN_SUCCESS, PACKET_OVERHEAD};

/// A server-pushed message or login notification, in receipt order.
#[derive(Debug, Clone)]
pub struct PacketEvent {
    /// Sequence id the server attached to the packet
    pub seq: u8,
    /// Raw message body
    pub body: Bytes,
    /// When the dispatcher forwarded the event
    pub timestamp: SystemTime,
}

/// A live RCON session.
///
/// Created by [`Connection::open`] after a successful login handshake.
/// `send` is safe to call from many tasks concurrently; replies are routed
/// back by sequence id. Server-pushed messages arrive on the receiver
/// returned by [`Connection::events`].
///
/// ```rust,no_run
/// use bercon::Connection;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let conn = Connection::open("127.0.0.1:2305", "secret").await?;
///
///     let reply = conn.send("players").await?;
///     println!("{}", String::from_utf8_lossy(&reply));
///
///     conn.close().await;
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct Connection {
    shared: Arc<Shared>,
    req_tx: mpsc::Sender<SendRequest>,
    events_rx: Mutex<Option<mpsc::Receiver<PacketEvent>>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    address: String,
}

impl Connection {
    /// Open a connection with default configuration.
    pub async fn open(address: &str, password: &str) -> Result<Self> {
        Self::open_with(address, password, Config::default()).await
    }

    /// Open a connection: resolve and connect the UDP socket, run the login
    /// handshake synchronously, then start the reader, manager and
    /// dispatcher tasks.
    pub async fn open_with(address: &str, password: &str, config: Config) -> Result<Self> {
        config.validate()?;

        let socket = UdpSocket::bind("0.0.0.0:0").await?;
        socket.connect(address).await?;

        let tunables = Tunables::new(&config);

        // Login must succeed before any loop starts; on failure the socket
        // is simply dropped.
        login(&socket, password, &tunables).await?;
        info!(address, "login successful");

        let shared = Arc::new(Shared::new(socket, tunables));
        shared.set_alive(true);

        let (req_tx, req_rx) = mpsc::channel(REQUEST_QUEUE);
        let (pkt_tx, pkt_rx) = mpsc::channel(PACKET_QUEUE);
        let (msg_tx, msg_rx) = mpsc::channel(MESSAGE_QUEUE);
        let (events_tx, events_rx) = mpsc::channel(EVENTS_QUEUE);

        let manager = Manager::new(shared.clone(), req_rx, pkt_rx, msg_tx);
        let tasks = vec![
            tokio::spawn(reader::run(shared.clone(), pkt_tx)),
            tokio::spawn(manager.run()),
            tokio::spawn(dispatcher::run(
                shared.cancel.clone(),
                msg_rx,
                events_tx,
            )),
        ];

        Ok(Self {
            shared,
            req_tx,
            events_rx: Mutex::new(Some(events_rx)),
            tasks: Mutex::new(tasks),
            address: address.to_string(),
        })
    }

    /// Dispatch a command and wait for the (reassembled) reply body.
    ///
    /// The deadline starts now and covers both queueing and the reply.
    pub async fn send(&self, command: &str) -> Result<Bytes> {
        if !self.alive() {
            return Err(Error::ConnectionDown);
        }

        let deadline = Instant::now() + self.shared.tunables.deadline();
        let (waiter, reply) = oneshot::channel();
        let req = SendRequest {
            command: Bytes::copy_from_slice(command.as_bytes()),
            waiter,
        };

        tokio::select! {
            res = self.req_tx.send(req) => {
                if res.is_err() {
                    return Err(Error::ConnectionClosed);
                }
            }
            _ = self.shared.cancel.cancelled() => return Err(Error::ConnectionClosed),
            _ = sleep_until(deadline) => return Err(Error::Timeout),
        }

        tokio::select! {
            resp = reply => match resp {
                Ok(result) => result,
                // Manager dropped the waiter: the connection went away.
                Err(_) => Err(Error::ConnectionClosed),
            },
            _ = self.shared.cancel.cancelled() => Err(Error::ConnectionClosed),
            _ = sleep_until(deadline) => Err(Error::Timeout),
        }
    }

    /// Whether the connection is serving requests.
    pub fn alive(&self) -> bool {
        self.shared.alive()
    }

    /// The address this connection was opened against.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Take the receiver for server-pushed messages and login
    /// notifications. Yields `None` after the first call; the channel is
    /// closed by [`Connection::close`].
    pub fn events(&self) -> Option<mpsc::Receiver<PacketEvent>> {
        self.events_rx.lock().expect("events lock poisoned").take()
    }

    /// Close the connection: cancel the tasks, wait for them to drain and
    /// close the events channel. Idempotent; later calls are no-ops.
    pub async fn close(&self) {
        if !self.shared.take_alive() {
            debug!("connection already closed");
            return;
        }

        self.shared.cancel.cancel();

        let handles: Vec<_> = {
            let mut tasks = self.tasks.lock().expect("tasks lock poisoned");
            tasks.drain(..).collect()
        };

        for handle in handles {
            if let Err(err) = handle.await {
                if !err.is_cancelled() {
                    warn!(error = %err, "connection task panicked");
                }
            }
        }

        info!(address = %self.address, "RCON connection closed");
    }

    /// Set the request/response deadline. Zero resets to the default.
    pub fn set_deadline(&self, d: Duration) {
        self.shared.tunables.set_deadline(d);
    }

    /// Current request/response deadline.
    pub fn deadline(&self) -> Duration {
        self.shared.tunables.deadline()
    }

    /// Set the keepalive interval; out-of-range values clamp to the
    /// default (BattlEye drops sessions idle beyond ~45 s). Takes effect
    /// on the next timer re-arm.
    pub fn set_keepalive(&self, d: Duration) {
        self.shared.tunables.set_keepalive(d);
    }

    /// Current keepalive interval.
    pub fn keepalive(&self) -> Duration {
        self.shared.tunables.keepalive()
    }

    /// Begin sending periodic keepalive packets.
    pub fn start_keepalive(&self) {
        self.shared.tunables.set_keepalive_enabled(true);
    }

    /// Set the micro-sleep used while probing for a free sequence id under
    /// contention. Zero busy-spins.
    pub fn set_micro_sleep(&self, d: Duration) {
        self.shared.tunables.set_micro_sleep(d);
    }

    /// Current micro-sleep interval.
    pub fn micro_sleep(&self) -> Duration {
        self.shared.tunables.micro_sleep()
    }

    /// Set the packet buffer size, capped at the protocol maximum. The
    /// read buffer itself is sized once at open; this bounds later writes.
    pub fn set_buffer_size(&self, size: u16) {
        self.shared.tunables.set_buffer_size(size);
    }

    /// Set how many login attempts a reopen helper should use. Kept on the
    /// live connection for parity with the configuration surface.
    pub fn set_login_attempts(&self, attempts: u32) {
        self.shared.tunables.set_login_attempts(attempts);
    }

    /// Count of malformed datagrams dropped by the reader.
    pub fn malformed_packets(&self) -> u64 {
        self.shared.malformed()
    }

    /// Time of the last successful socket read.
    pub fn last_activity(&self) -> SystemTime {
        self.shared.last_activity()
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        // Tasks watch the token; no awaiting possible here.
        if self.shared.take_alive() {
            self.shared.cancel.cancel();
        }
    }
}

/// One synchronous login handshake per attempt: write the password packet,
/// read one datagram under the deadline, require a Login-kind reply whose
/// first body byte signals success. Only timeouts are retried.
async fn login(socket: &UdpSocket, password: &str, tunables: &Tunables) -> Result<()> {
    let attempts = tunables.login_attempts();
    let deadline = tunables.deadline();
    let mut buf = vec![0u8; tunables.buffer_size().max(PACKET_OVERHEAD) as usize];
    let request = Packet::login(Bytes::copy_from_slice(password.as_bytes())).encode();

    for attempt in 1..=attempts {
        socket.send(&request).await?;
        debug!(attempt, "login request sent");

        let n = match timeout(deadline, socket.recv(&mut buf)).await {
            Ok(read) => read?,
            Err(_) => {
                debug!(attempt, "login response timed out");
                continue;
            }
        };

        let pkt = Packet::decode(&buf[..n]).map_err(|_| Error::NotResponse)?;
        if pkt.kind != PacketKind::Login {
            return Err(Error::NotResponse);
        }

        if pkt.body.first() != Some(&LOGIN_SUCCESS) {
            return Err(Error::LoginFailed);
        }

        return Ok(());
    }

    Err(Error::Timeout)
}
