//! Event fan-out to connected players.
//!
//! Every connection owns a bounded outbound queue drained by a dedicated
//! writer task, so a slow or dead peer can never block anyone else's
//! delivery. Broadcasts serialize the event once, snapshot the recipient
//! handles under the session lock, and deliver entirely outside it with
//! non-blocking sends. Queue overflow drops the line for that recipient and
//! is accounted, never waited on.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use metrics::counter;
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use wordrush_core::protocol::ServerEvent;

use crate::metrics::BROADCAST_DROPS_TOTAL;
use crate::session::Session;

/// Outbound queue depth per connection.
const OUTBOUND_QUEUE_DEPTH: usize = 64;

/// Handle for queueing wire lines to one connection's writer task.
///
/// Cheap to clone; clones share the drop counter. Sends never block.
#[derive(Clone)]
pub struct Outbound {
    tx: mpsc::Sender<Arc<String>>,
    dropped: Arc<AtomicU64>,
    label: Arc<str>,
}

impl Outbound {
    /// Create an outbound handle and the receiver its writer task drains.
    /// `label` identifies the connection in logs (peer address).
    pub fn channel(label: &str) -> (Self, mpsc::Receiver<Arc<String>>) {
        let (tx, rx) = mpsc::channel(OUTBOUND_QUEUE_DEPTH);
        let outbound = Self {
            tx,
            dropped: Arc::new(AtomicU64::new(0)),
            label: Arc::from(label),
        };
        (outbound, rx)
    }

    /// Serialize and queue one event for this connection.
    pub fn send_event(&self, event: &ServerEvent) {
        match event.to_line() {
            Ok(line) => {
                let _ = self.send_line(&Arc::new(line));
            }
            Err(error) => {
                warn!(kind = ?event.kind, %error, "failed to serialize event");
            }
        }
    }

    /// Queue one pre-serialized line. Returns `false` when the queue was
    /// full or the writer is gone; the line is dropped and counted.
    pub fn send_line(&self, line: &Arc<String>) -> bool {
        if self.tx.try_send(Arc::clone(line)).is_ok() {
            return true;
        }
        let drops = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
        counter!(BROADCAST_DROPS_TOTAL).increment(1);
        warn!(peer = %self.label, drops, "outbound queue full, dropping line");
        false
    }

    /// Total lines dropped on this connection so far.
    pub fn drop_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Drain a connection's outbound queue onto its socket.
///
/// Exits when every [`Outbound`] clone is dropped or the peer stops
/// accepting writes; the write half is shut down on the way out so queued
/// farewell lines are flushed before the FIN.
pub async fn writer_task(mut half: OwnedWriteHalf, mut rx: mpsc::Receiver<Arc<String>>) {
    while let Some(line) = rx.recv().await {
        if half.write_all(line.as_bytes()).await.is_err()
            || half.write_all(b"\n").await.is_err()
        {
            debug!("peer stopped accepting writes");
            break;
        }
    }
    let _ = half.shutdown().await;
}

/// Fan one event out to every player currently in the session.
///
/// The payload is serialized once and shared; each recipient's queue gets an
/// independent entry, so one recipient's delivery can never mutate or stall
/// another's.
pub fn broadcast(session: &Session, event: &ServerEvent) {
    let line = match event.to_line() {
        Ok(line) => Arc::new(line),
        Err(error) => {
            warn!(kind = ?event.kind, %error, "failed to serialize broadcast");
            return;
        }
    };

    let recipients = session.recipients();
    let mut delivered = 0_usize;
    for outbound in &recipients {
        if outbound.send_line(&line) {
            delivered += 1;
        }
    }
    debug!(
        kind = ?event.kind,
        recipients = recipients.len(),
        delivered,
        "broadcast event"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn send_event_reaches_the_receiver() {
        let (outbound, mut rx) = Outbound::channel("test");
        outbound.send_event(&ServerEvent::countdown(3));
        let line = rx.recv().await.expect("line queued");
        assert!(line.contains(r#""type":"countdown""#));
        assert_eq!(outbound.drop_count(), 0);
    }

    #[tokio::test]
    async fn overflow_drops_and_counts() {
        let (outbound, _rx) = Outbound::channel("test");
        let line = Arc::new("x".to_string());
        for _ in 0..OUTBOUND_QUEUE_DEPTH {
            assert!(outbound.send_line(&line));
        }
        assert!(!outbound.send_line(&line));
        assert_eq!(outbound.drop_count(), 1);
    }

    #[tokio::test]
    async fn closed_receiver_counts_as_drop() {
        let (outbound, rx) = Outbound::channel("test");
        drop(rx);
        assert!(!outbound.send_line(&Arc::new("x".to_string())));
        assert_eq!(outbound.drop_count(), 1);
    }
}
