//! # wordrush-server
//!
//! Session lifecycle and concurrency engine for the wordrush typing-race
//! server: clients connect over TCP, are matched into small lobbies, and
//! race through a shared word sequence while receiving live progress
//! broadcasts from their peers.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | `session` | One lobby/race: player slots, word sequence, phase flags |
//! | `registry` | Bounded session pool + deterministic matchmaking |
//! | `countdown` | Pre-race countdown coordinator task |
//! | `broadcast` | Per-connection outbound queues and session fan-out |
//! | `connection` | Per-connection protocol state machine |
//! | `metrics` | Metric name constants |
//!
//! ## Concurrency model
//!
//! One task per accepted connection, one per running countdown coordinator,
//! one writer task per connection; the accept loop only accepts and spawns.
//! The registry and each session carry their own mutex, critical sections
//! stay short, and no lock is ever held across socket I/O — tick-driven
//! checks snapshot what they need under the lock and act outside it.

#![deny(unsafe_code)]

pub mod broadcast;
pub mod connection;
pub mod countdown;
pub mod metrics;
pub mod registry;
pub mod session;

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use ::metrics::{counter, gauge};
use tokio::net::{TcpListener, TcpStream};
use tracing::{info, warn};

use wordrush_core::config::Config;
use wordrush_core::protocol::ServerEvent;
use wordrush_core::words::WordPool;

use crate::metrics::{
    CONNECTIONS_ACTIVE, CONNECTIONS_OPENED_TOTAL, CONNECTIONS_REJECTED_TOTAL,
};
use crate::registry::SessionRegistry;

/// Fatal server startup errors. Anything after a successful bind is
/// contained to individual connection handlers.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// The listening socket could not be bound.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// Requested listen address.
        addr: SocketAddr,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// Bind the configured port and serve forever.
pub async fn serve(config: Arc<Config>, pool: Arc<WordPool>) -> Result<(), ServerError> {
    let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, config.port));
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| ServerError::Bind { addr, source })?;
    serve_on(listener, config, pool).await
}

/// Serve on a pre-bound listener (tests bind an ephemeral port themselves).
///
/// The global connection cap is enforced here: over-capacity connections get
/// a single `error` line and are closed without a handler ever being
/// spawned for them.
pub async fn serve_on(
    listener: TcpListener,
    config: Arc<Config>,
    pool: Arc<WordPool>,
) -> Result<(), ServerError> {
    let registry = Arc::new(SessionRegistry::new(&config, pool));
    let active = Arc::new(AtomicUsize::new(0));
    match listener.local_addr() {
        Ok(addr) => info!(%addr, "server listening"),
        Err(_) => info!("server listening"),
    }

    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(error) => {
                warn!(%error, "failed to accept connection");
                continue;
            }
        };
        if active.load(Ordering::Acquire) >= config.max_connections() {
            counter!(CONNECTIONS_REJECTED_TOTAL).increment(1);
            warn!(%peer, "server full, rejecting connection");
            reject(&stream);
            continue;
        }

        counter!(CONNECTIONS_OPENED_TOTAL).increment(1);
        let _ = active.fetch_add(1, Ordering::AcqRel);
        gauge!(CONNECTIONS_ACTIVE).increment(1.0);
        let config = Arc::clone(&config);
        let registry = Arc::clone(&registry);
        let active = Arc::clone(&active);
        drop(tokio::spawn(async move {
            connection::handle(stream, peer, config, registry).await;
            let _ = active.fetch_sub(1, Ordering::AcqRel);
            gauge!(CONNECTIONS_ACTIVE).decrement(1.0);
        }));
    }
}

/// Tell an over-capacity peer why it is being turned away. Best-effort:
/// the stream is dropped (closed) by the caller right after.
fn reject(stream: &TcpStream) {
    if let Ok(line) = ServerEvent::error("server is full, try again later").to_line() {
        let _ = stream.try_write(line.as_bytes());
        let _ = stream.try_write(b"\n");
    }
}
