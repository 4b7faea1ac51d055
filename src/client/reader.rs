//! Reader task: reads datagrams, decodes them and forwards typed packets
//! to the manager.
//!
//! Reads are bounded by the current deadline so cancellation is observed
//! promptly even on an idle socket. Malformed datagrams are counted and
//! dropped; they are never fatal. Any other read error tears the
//! connection down.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, error, trace};

use crate::client::Shared;
use crate::packet::{Packet, PACKET_OVERHEAD};

pub(crate) async fn run(shared: Arc<Shared>, pkt_tx: mpsc::Sender<Packet>) {
    // One buffer per reader task, reused for every datagram; decoded
    // payloads are copied out by the codec.
    let mut buf = vec![0u8; shared.tunables.buffer_size().max(PACKET_OVERHEAD) as usize];

    loop {
        if shared.cancel.is_cancelled() {
            break;
        }

        let deadline = shared.tunables.deadline();
        let read = tokio::time::timeout(deadline, shared.socket.recv(&mut buf)).await;

        let n = match read {
            // Deadline elapsed: loop around so cancellation is re-checked.
            Err(_) => continue,

            Ok(Ok(n)) => n,

            Ok(Err(err)) => {
                if shared.cancel.is_cancelled() {
                    break;
                }

                error!(error = %err, "socket read failed, stopping connection");
                shared.shutdown();
                break;
            }
        };

        shared.touch();

        let pkt = match Packet::decode(&buf[..n]) {
            Ok(pkt) => pkt,
            Err(err) => {
                shared.count_malformed();
                debug!(len = n, error = %err, "malformed datagram dropped");
                continue;
            }
        };

        tokio::select! {
            res = pkt_tx.send(pkt) => {
                if res.is_err() {
                    break; // manager gone
                }
            }
            _ = shared.cancel.cancelled() => break,
        }
    }

    trace!("reader loop stopped");
}
