//! Manager task: the single writer.
//!
//! Every socket write and every mutation of the in-flight table and the
//! sequence cursor happens here, so none of that state needs a lock. The
//! loop selects over caller requests, parsed packets from the reader, the
//! internal ack queue, the keepalive timer and cancellation.

use std::collections::HashMap;
use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tracing::{debug, trace, warn};

use crate::client::{SendRequest, Shared};
use crate::error::{Error, Result};
use crate::packet::{Packet, PacketKind, MAX_COMMAND_BODY, PACKET_OVERHEAD};

/// Per-sequence reply aggregator.
struct InFlight {
    waiter: oneshot::Sender<Result<Bytes>>,
    state: Reassembly,
    started_at: Instant,
}

/// Reassembly state for one sequence id.
enum Reassembly {
    /// Nothing received yet; a single-page reply completes immediately.
    Empty,
    /// Multipart reply in progress.
    Partial {
        expected: u8,
        next: u8,
        buf: BytesMut,
    },
}

pub(crate) struct Manager {
    shared: Arc<Shared>,
    req_rx: mpsc::Receiver<SendRequest>,
    pkt_rx: mpsc::Receiver<Packet>,
    ack_rx: mpsc::Receiver<u8>,
    ack_tx: mpsc::Sender<u8>,
    msg_tx: mpsc::Sender<Packet>,
    inflight: HashMap<u8, InFlight>,
    cursor: u8,
}

impl Manager {
    pub fn new(
        shared: Arc<Shared>,
        req_rx: mpsc::Receiver<SendRequest>,
        pkt_rx: mpsc::Receiver<Packet>,
        msg_tx: mpsc::Sender<Packet>,
    ) -> Self {
        let (ack_tx, ack_rx) = mpsc::channel(crate::client::ACK_QUEUE);

        Self {
            shared,
            req_rx,
            pkt_rx,
            ack_rx,
            ack_tx,
            msg_tx,
            inflight: HashMap::with_capacity(16),
            cursor: 0,
        }
    }

    pub async fn run(mut self) {
        let mut next_tick = Instant::now() + self.shared.tunables.keepalive();

        loop {
            tokio::select! {
                _ = self.shared.cancel.cancelled() => break,

                req = self.req_rx.recv() => match req {
                    Some(req) => self.handle_request(req).await,
                    None => break,
                },

                pkt = self.pkt_rx.recv() => match pkt {
                    Some(pkt) => self.handle_packet(pkt),
                    None => break,
                },

                seq = self.ack_rx.recv() => {
                    // Cannot be None: we hold a sender for the queue.
                    if let Some(seq) = seq {
                        self.send_ack(seq).await;
                    }
                },

                _ = tokio::time::sleep_until(next_tick) => {
                    if self.shared.tunables.keepalive_enabled() {
                        self.keepalive_tick().await;
                    }
                    next_tick = Instant::now() + self.shared.tunables.keepalive();
                },
            }
        }

        trace!("manager loop stopped");
    }

    /// Allocate a sequence, register the waiter and write the command.
    async fn handle_request(&mut self, req: SendRequest) {
        let Some(seq) = self.next_free_seq().await else {
            let _ = req.waiter.send(Err(Error::BufferFull));
            return;
        };

        self.inflight.insert(
            seq,
            InFlight {
                waiter: req.waiter,
                state: Reassembly::Empty,
                started_at: Instant::now(),
            },
        );

        if req.command.is_empty() {
            debug!(seq, "sending empty command");
        } else {
            debug!(seq, command = %String::from_utf8_lossy(&req.command), "sending command");
        }

        if let Err(err) = self.write_packet(Packet::command(seq, req.command)).await {
            let fatal = matches!(err, Error::Io(_));
            if let Some(holder) = self.inflight.remove(&seq) {
                let _ = holder.waiter.send(Err(err));
            }
            if fatal {
                self.shared.shutdown();
            }
        }
    }

    fn handle_packet(&mut self, pkt: Packet) {
        match pkt.kind {
            PacketKind::Login => {
                // Informational only; never block the protocol loop on the
                // consumer.
                if self.msg_tx.try_send(pkt).is_err() {
                    trace!("event queue full, login notification dropped");
                }
            }

            PacketKind::Message => {
                let seq = pkt.seq;
                if self.msg_tx.try_send(pkt).is_err() {
                    trace!(seq, "event queue full, server message dropped");
                }
                if self.ack_tx.try_send(seq).is_err() {
                    warn!(seq, "ack queue full, message not acknowledged");
                }
            }

            PacketKind::Command => self.handle_command(pkt),
        }
    }

    /// Complete a waiter or grow its multipart aggregate. Pages must arrive
    /// strictly in order; any gap resolves the waiter with `BadSequence`.
    fn handle_command(&mut self, pkt: Packet) {
        let seq = pkt.seq;

        let Some(holder) = self.inflight.get_mut(&seq) else {
            // Stale reply or a keepalive response whose waiter is long gone.
            trace!(seq, "command reply without waiter dropped");
            return;
        };

        let outcome = match &mut holder.state {
            Reassembly::Empty if pkt.pages == 0 => Some(Ok(pkt.body)),

            Reassembly::Empty => {
                if pkt.page as u16 + 1 == pkt.pages as u16 {
                    Some(Ok(pkt.body))
                } else {
                    holder.state = Reassembly::Partial {
                        expected: pkt.pages,
                        next: pkt.page,
                        buf: BytesMut::from(&pkt.body[..]),
                    };
                    None
                }
            }

            Reassembly::Partial { expected, next, buf } => {
                if pkt.page as u16 != *next as u16 + 1 {
                    debug!(
                        seq,
                        have = *next,
                        got = pkt.page,
                        "multipart page out of order"
                    );
                    Some(Err(Error::BadSequence))
                } else {
                    buf.extend_from_slice(&pkt.body);
                    *next = pkt.page;

                    if *next as u16 + 1 == *expected as u16 {
                        Some(Ok(std::mem::take(buf).freeze()))
                    } else {
                        None
                    }
                }
            }
        };

        if let Some(result) = outcome {
            self.complete(seq, result);
        }
    }

    /// Remove the in-flight entry and resolve its waiter.
    fn complete(&mut self, seq: u8, result: Result<Bytes>) {
        if let Some(holder) = self.inflight.remove(&seq) {
            trace!(
                seq,
                elapsed_ms = holder.started_at.elapsed().as_millis() as u64,
                ok = result.is_ok(),
                "request completed"
            );
            let _ = holder.waiter.send(result);
        }
    }

    /// Echo a Message packet with an empty body.
    async fn send_ack(&mut self, seq: u8) {
        if let Err(err) = self.write_packet(Packet::message(seq, Bytes::new())).await {
            warn!(seq, error = %err, "failed to acknowledge server message");
            if matches!(err, Error::Io(_)) {
                self.shared.shutdown();
            }
        }
    }

    /// Fire-and-forget empty command to keep the login session alive. Any
    /// reply carries a seq with no in-flight entry and is dropped.
    async fn keepalive_tick(&mut self) {
        let Some(seq) = self.try_free_seq() else {
            trace!("no free sequence id, keepalive skipped");
            return;
        };

        match self.write_packet(Packet::command(seq, Bytes::new())).await {
            Ok(()) => debug!(seq, "keepalive packet sent"),
            Err(err) => {
                warn!(seq, error = %err, "keepalive write failed");
                if matches!(err, Error::Io(_)) {
                    self.shared.shutdown();
                }
            }
        }
    }

    /// Next free sequence id, waiting up to the deadline under contention.
    ///
    /// Each pass probes the full ring once; between passes the loop sleeps
    /// the configured micro-sleep (zero means yield-and-retry).
    async fn next_free_seq(&mut self) -> Option<u8> {
        let deadline = Instant::now() + self.shared.tunables.deadline();

        loop {
            if let Some(seq) = self.try_free_seq() {
                return Some(seq);
            }

            if Instant::now() >= deadline || self.shared.cancel.is_cancelled() {
                return None;
            }

            let pause = self.shared.tunables.micro_sleep();
            if pause.is_zero() {
                tokio::task::yield_now().await;
            } else {
                tokio::time::sleep(pause).await;
            }
        }
    }

    /// Single non-blocking probe over all 256 ids.
    fn try_free_seq(&mut self) -> Option<u8> {
        for _ in 0..=u8::MAX {
            let seq = self.cursor;
            self.cursor = self.cursor.wrapping_add(1);

            if !self.inflight.contains_key(&seq) {
                return Some(seq);
            }
        }

        None
    }

    /// Encode and write one packet. Only the manager (and the login
    /// handshake, before the loops start) touches the socket write path.
    async fn write_packet(&self, pkt: Packet) -> Result<()> {
        if pkt.kind == PacketKind::Command && pkt.body.len() > MAX_COMMAND_BODY {
            return Err(Error::CommandTooLong);
        }

        let capacity = self.shared.tunables.buffer_size().saturating_sub(PACKET_OVERHEAD);
        if pkt.body.len() > capacity as usize {
            return Err(Error::BadSize);
        }

        let wire = pkt.encode();
        self.shared.socket.send(&wire).await?;

        Ok(())
    }
}
