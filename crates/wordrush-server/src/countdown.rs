//! The pre-race countdown coordinator.
//!
//! One task per starting session, spawned by whichever joiner wins
//! [`Session::try_begin_countdown`]. The coordinator broadcasts the tick
//! values down to 1, re-reading the membership each tick so mid-countdown
//! joiners are included, then performs the activation sequence in a fixed
//! order: flip `has_started` (stamping the start time), broadcast the full
//! word sequence, clear the countdown flag. Handlers therefore never observe
//! a started race whose sequence they cannot read — the sequence lives on
//! the session object and the `words` broadcast is a courtesy copy.
//!
//! The coordinator owns no lock while sleeping, and the session is never
//! disposed underneath it: the last-leaving handler drains this task before
//! asking the registry to drop the session.

use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use wordrush_core::protocol::ServerEvent;

use crate::broadcast::broadcast;
use crate::metrics::RACES_STARTED_TOTAL;
use crate::session::Session;

/// Spawn the coordinator for a session whose countdown claim was just won.
pub fn spawn(session: Arc<Session>, start: u32, tick: Duration) -> JoinHandle<()> {
    tokio::spawn(run(session, start, tick))
}

async fn run(session: Arc<Session>, start: u32, tick: Duration) {
    for value in (1..=start).rev() {
        broadcast(&session, &ServerEvent::countdown(value));
        debug!(value, "countdown tick");
        tokio::time::sleep(tick).await;
    }

    session.activate();
    broadcast(&session, &ServerEvent::words(session.words().to_vec()));
    session.finish_countdown();

    counter!(RACES_STARTED_TOTAL).increment(1);
    info!(players = session.player_count(), "race activated");
}
