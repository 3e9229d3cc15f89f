//! The per-connection protocol state machine.
//!
//! One handler task per accepted connection, walking
//! `HANDSHAKE → LOBBY_WAIT → PLAYING → GRACE_PERIOD → CLOSED`, with `CLOSED`
//! reachable from anywhere on disconnect, protocol error, or timeout.
//!
//! The playing loop polls: every pass checks the session-wide hard timeout,
//! then the `ended` flag, then attempts a read bounded by the poll interval.
//! The timed-out read arm doubles as the inactivity watchdog once the race
//! has started, so one loop watches all three timeout policies without a
//! separate timer. Progress through the word sequence is purely handler-local;
//! the session only carries the shared sequence and phase flags.

use std::sync::Arc;
use std::time::Instant;

use futures::StreamExt;
use metrics::counter;
use tokio::net::TcpStream;
use tokio::net::tcp::OwnedReadHalf;
use tokio::time::timeout;
use tokio_util::codec::{FramedRead, LinesCodec, LinesCodecError};
use tracing::{debug, info, warn};

use wordrush_core::config::Config;
use wordrush_core::protocol::{ClientCommand, Handshake, ServerEvent};
use wordrush_core::wpm::words_per_minute;

use crate::broadcast::{Outbound, broadcast, writer_task};
use crate::countdown;
use crate::metrics::WORDS_ACCEPTED_TOTAL;
use crate::registry::SessionRegistry;
use crate::session::{Player, Session};

type LineReader = FramedRead<OwnedReadHalf, LinesCodec>;

/// Drive one accepted connection to completion.
///
/// Splits the socket, spawns the writer task, runs the state machine, then
/// drains the writer so farewell lines are flushed before the socket closes.
pub async fn handle(
    stream: TcpStream,
    peer: std::net::SocketAddr,
    config: Arc<Config>,
    registry: Arc<SessionRegistry>,
) {
    let (read_half, write_half) = stream.into_split();
    let mut reader = FramedRead::new(
        read_half,
        LinesCodec::new_with_max_length(config.max_line_len),
    );
    let label = peer.to_string();
    let (outbound, outbound_rx) = Outbound::channel(&label);
    let writer = tokio::spawn(writer_task(write_half, outbound_rx));

    run(&mut reader, &outbound, &config, &registry, &label).await;

    drop(reader);
    drop(outbound);
    if let Err(error) = writer.await {
        warn!(peer = %label, %error, "writer task failed");
    }
}

/// The state machine proper: handshake, lobby placement, play, deregister.
async fn run(
    reader: &mut LineReader,
    outbound: &Outbound,
    config: &Config,
    registry: &SessionRegistry,
    label: &str,
) {
    // HANDSHAKE
    let Some(hello) = handshake(reader, outbound, config).await else {
        return;
    };
    info!(peer = %label, id = %hello.uuid, name = %hello.name, "client connected");

    // LOBBY_WAIT
    let Some(session) = registry.find_or_create() else {
        outbound.send_event(&ServerEvent::error("couldn't find available session"));
        info!(peer = %label, "no available session");
        return;
    };
    let count = match session.join(Player {
        id: hello.uuid.clone(),
        name: hello.name.clone(),
        outbound: outbound.clone(),
    }) {
        Ok(count) => count,
        Err(error) => {
            outbound.send_event(&ServerEvent::error(error.to_string()));
            info!(peer = %label, %error, "join refused");
            return;
        }
    };
    debug!(count, "player added to session");
    outbound.send_event(&ServerEvent::lobby(&hello.name, "added to lobby"));

    if session.try_begin_countdown() {
        info!(count, "starting countdown");
        let task = countdown::spawn(
            Arc::clone(&session),
            config.countdown_start,
            config.countdown_tick(),
        );
        session.store_countdown_task(task);
    }

    // PLAYING (the grace period is entered from inside on completion)
    play(reader, outbound, &session, config, &hello.name).await;

    // CLOSED: deregister, and let the emptier dispose.
    if session.leave(&hello.uuid) == Some(0) {
        if let Some(task) = session.take_countdown_task() {
            // Never dispose a session out from under a live coordinator.
            if let Err(error) = task.await {
                warn!(%error, "countdown task failed");
            }
        }
        info!("last player left, disposing session");
        registry.remove(&session);
    }
    info!(peer = %label, id = %hello.uuid, "connection closed");
}

/// Read and validate the mandatory first message.
async fn handshake(
    reader: &mut LineReader,
    outbound: &Outbound,
    config: &Config,
) -> Option<Handshake> {
    let line = match reader.next().await {
        Some(Ok(line)) => line,
        Some(Err(LinesCodecError::MaxLineLengthExceeded)) => {
            outbound.send_event(&ServerEvent::error("invalid format"));
            return None;
        }
        Some(Err(LinesCodecError::Io(error))) => {
            debug!(%error, "handshake read failed");
            return None;
        }
        None => {
            debug!("peer closed before handshake");
            return None;
        }
    };

    match Handshake::parse(&line, config.max_id_len, config.max_name_len) {
        Ok(hello) => Some(hello),
        Err(error) => {
            outbound.send_event(&ServerEvent::error(error.to_string()));
            debug!(%error, "handshake rejected");
            None
        }
    }
}

/// The polling play loop. Every pass checks the hard timeout, then the
/// `ended` flag, then attempts a timed read.
async fn play(
    reader: &mut LineReader,
    outbound: &Outbound,
    session: &Arc<Session>,
    config: &Config,
    name: &str,
) {
    let words = session.words();
    let mut local_index = 0_usize;
    let mut last_activity: Option<Instant> = None;

    loop {
        if session.try_end_after(config.hard_timeout()) {
            info!("hard session limit reached, ending session");
            broadcast(
                session,
                &ServerEvent::session_end("session closed after reaching the hard time limit"),
            );
        }
        let phase = session.phase();
        if phase.ended {
            outbound.send_event(&ServerEvent::session_end("closing session"));
            return;
        }

        let line = match timeout(config.poll_interval(), reader.next()).await {
            // Nothing readable within the poll interval: run the
            // inactivity watchdog (idle time counts from the later of race
            // start and the last received message).
            Err(_) => {
                if let Some(start) = phase.start_time {
                    let idle_since = last_activity.unwrap_or(start);
                    if idle_since.elapsed() >= config.inactivity_kick() {
                        outbound
                            .send_event(&ServerEvent::inactive_timeout("kicked after inactivity"));
                        info!(player = %name, "kicking for inactivity");
                        return;
                    }
                }
                continue;
            }
            Ok(None) => {
                debug!(player = %name, "peer disconnected");
                return;
            }
            Ok(Some(Err(LinesCodecError::MaxLineLengthExceeded))) => {
                warn!(player = %name, "oversize line, closing");
                return;
            }
            Ok(Some(Err(LinesCodecError::Io(error)))) => {
                debug!(player = %name, %error, "read failed");
                return;
            }
            Ok(Some(Ok(line))) => line,
        };

        // Lines that are not JSON objects are skipped without comment.
        let Some(command) = ClientCommand::parse(&line) else {
            continue;
        };
        match command {
            ClientCommand::Disconnect => {
                outbound.send_event(&ServerEvent::bye("disconnected on request"));
                info!(player = %name, "voluntary disconnect");
                return;
            }
            // Pre-start chatter is ignored and does not count as activity.
            _ if !phase.has_started => {}
            ClientCommand::Invalid => {
                outbound.send_event(&ServerEvent::error("missing word field"));
            }
            ClientCommand::Word(word) => {
                last_activity = Some(Instant::now());
                if words.get(local_index).is_some_and(|expected| *expected == word) {
                    local_index += 1;
                    counter!(WORDS_ACCEPTED_TOTAL).increment(1);
                    let elapsed = phase.start_time.map(|start| start.elapsed()).unwrap_or_default();
                    let value = words_per_minute(words, local_index, elapsed);
                    outbound.send_event(&ServerEvent::wpm(name, value));
                    broadcast(session, &ServerEvent::wpm(name, value));
                }
                // A mismatch changes nothing; the player resubmits.
                if local_index >= words.len() {
                    outbound.send_event(&ServerEvent::completed(
                        name,
                        "all words completed, disconnecting when the grace window closes",
                    ));
                    info!(player = %name, "sequence completed");
                    grace_period(reader, outbound, session, config, name).await;
                    return;
                }
            }
        }
    }
}

/// Bounded post-completion window: keep observing `ended`, warn at a fixed
/// cadence, close on expiry or peer exit.
async fn grace_period(
    reader: &mut LineReader,
    outbound: &Outbound,
    session: &Session,
    config: &Config,
    name: &str,
) {
    let opened = Instant::now();
    let window = config.grace_window();
    let mut warnings_sent = 0_u64;

    loop {
        if session.phase().ended {
            outbound.send_event(&ServerEvent::session_end("closing session"));
            return;
        }
        let elapsed = opened.elapsed();
        if elapsed >= window {
            outbound.send_event(&ServerEvent::timeout("grace window expired, disconnecting"));
            info!(player = %name, "grace window expired");
            return;
        }

        let warnings_due = elapsed.as_secs() / config.grace_warning_interval_secs;
        if warnings_due > warnings_sent {
            warnings_sent = warnings_due;
            let remaining = window.saturating_sub(elapsed).as_secs();
            outbound.send_event(&ServerEvent::timeout_warning(remaining));
        }

        match timeout(config.poll_interval(), reader.next()).await {
            Err(_) => {}
            Ok(None) => {
                debug!(player = %name, "peer disconnected during grace window");
                return;
            }
            Ok(Some(Err(_))) => return,
            // Content during the grace window is ignored.
            Ok(Some(Ok(_line))) => {}
        }
    }
}
