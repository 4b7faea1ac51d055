//! Dispatcher task: forwards server messages and login notifications to
//! the consumer-facing events channel.
//!
//! The manager enqueues onto the internal queue without blocking (overflow
//! drops at the source), so a slow or absent consumer can never stall the
//! protocol loop. Stamping the receipt time happens here.

use std::time::SystemTime;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::trace;

use crate::client::PacketEvent;
use crate::packet::Packet;

pub(crate) async fn run(
    cancel: CancellationToken,
    mut msg_rx: mpsc::Receiver<Packet>,
    events_tx: mpsc::Sender<PacketEvent>,
) {
    loop {
        let pkt = tokio::select! {
            _ = cancel.cancelled() => break,
            pkt = msg_rx.recv() => match pkt {
                Some(pkt) => pkt,
                None => break,
            },
        };

        let event = PacketEvent {
            seq: pkt.seq,
            body: pkt.body,
            timestamp: SystemTime::now(),
        };

        tokio::select! {
            _ = cancel.cancelled() => break,
            res = events_tx.send(event) => {
                if res.is_err() {
                    break; // consumer dropped the receiver
                }
            }
        }
    }

    trace!("dispatcher loop stopped");
    // Dropping events_tx here closes the consumer channel.
}
