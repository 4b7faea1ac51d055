//! Shared test helper: a scripted BattlEye server on a real UDP socket.
//!
//! The server answers the login handshake according to its [`LoginMode`],
//! hands every command packet to the test's responder closure, records all
//! decoded packets it receives (including acks), and can push unsolicited
//! packets or raw datagrams to the connected client.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use bercon::packet::{Packet, PacketKind, LOGIN_SUCCESS};

/// How the server treats login requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginMode {
    /// Reply with the success status byte
    Accept,
    /// Reply with a failure status byte
    Reject,
    /// Never reply (forces client-side timeouts)
    Ignore,
    /// Reply with a Command packet instead of a Login one
    WrongKind,
}

/// Closure invoked for every Command packet; returns the packets to send
/// back.
pub type Responder = Box<dyn FnMut(&Packet) -> Vec<Packet> + Send>;

/// Replies every command with its own body echoed back on the same seq.
pub fn echo_responder() -> Responder {
    Box::new(|pkt| vec![Packet::command(pkt.seq, pkt.body.clone())])
}

/// Never replies to commands.
pub fn silent_responder() -> Responder {
    Box::new(|_| Vec::new())
}

pub struct MockServer {
    pub addr: SocketAddr,
    received: Arc<Mutex<Vec<Packet>>>,
    push_tx: mpsc::UnboundedSender<Vec<u8>>,
    handle: JoinHandle<()>,
}

impl MockServer {
    pub async fn spawn(login: LoginMode, mut responder: Responder) -> Self {
        let socket = UdpSocket::bind("127.0.0.1:0").await.expect("bind mock server");
        let addr = socket.local_addr().expect("mock server addr");

        let received = Arc::new(Mutex::new(Vec::new()));
        let (push_tx, mut push_rx) = mpsc::unbounded_channel::<Vec<u8>>();

        let log = received.clone();
        let handle = tokio::spawn(async move {
            let mut peer: Option<SocketAddr> = None;
            let mut buf = vec![0u8; 4096];

            loop {
                tokio::select! {
                    res = socket.recv_from(&mut buf) => {
                        let Ok((n, from)) = res else { break };
                        peer = Some(from);

                        let Ok(pkt) = Packet::decode(&buf[..n]) else { continue };
                        log.lock().unwrap().push(pkt.clone());

                        let replies = match pkt.kind {
                            PacketKind::Login => match login {
                                LoginMode::Accept => {
                                    vec![Packet::login(Bytes::from_static(&[LOGIN_SUCCESS]))]
                                }
                                LoginMode::Reject => {
                                    vec![Packet::login(Bytes::from_static(&[0x00]))]
                                }
                                LoginMode::Ignore => Vec::new(),
                                LoginMode::WrongKind => {
                                    vec![Packet::command(0, Bytes::from_static(&[LOGIN_SUCCESS]))]
                                }
                            },
                            PacketKind::Command => responder(&pkt),
                            // Acks are recorded, never answered.
                            PacketKind::Message => Vec::new(),
                        };

                        for reply in replies {
                            let _ = socket.send_to(&reply.encode(), from).await;
                        }
                    }

                    datagram = push_rx.recv() => {
                        let Some(datagram) = datagram else { break };
                        if let Some(peer) = peer {
                            let _ = socket.send_to(&datagram, peer).await;
                        }
                    }
                }
            }
        });

        Self {
            addr,
            received,
            push_tx,
            handle,
        }
    }

    pub fn address(&self) -> String {
        self.addr.to_string()
    }

    /// Push an unsolicited packet to the connected client.
    pub fn push(&self, pkt: Packet) {
        let _ = self.push_tx.send(pkt.encode().to_vec());
    }

    /// Push a raw datagram (possibly malformed) to the connected client.
    pub fn push_raw(&self, datagram: &[u8]) {
        let _ = self.push_tx.send(datagram.to_vec());
    }

    /// Snapshot of every packet received so far.
    pub fn received(&self) -> Vec<Packet> {
        self.received.lock().unwrap().clone()
    }

    /// Poll until `pred` holds over the received packets, or give up after
    /// five seconds.
    pub async fn wait_for(&self, pred: impl Fn(&[Packet]) -> bool) -> bool {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);

        while tokio::time::Instant::now() < deadline {
            if pred(&self.received()) {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }

        false
    }
}

impl Drop for MockServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
