//! The bounded pool of live sessions, plus the matchmaking rule.
//!
//! Matchmaking is deterministic: the first eligible session in slot order
//! wins, and only when none exists is a new session created in the first
//! free slot. The scan and the create decision share one critical section so
//! two concurrent callers can never both decide to create when one slot was
//! actually free.
//!
//! Lock ordering: the registry lock is taken first and per-session locks are
//! taken briefly inside it for the eligibility read; session code never
//! acquires the registry lock, so the order cannot invert.

use std::sync::Arc;

use metrics::counter;
use parking_lot::Mutex;
use tracing::debug;

use wordrush_core::config::Config;
use wordrush_core::words::WordPool;

use crate::metrics::{SESSIONS_CREATED_TOTAL, SESSIONS_DISPOSED_TOTAL};
use crate::session::Session;

struct Slots {
    entries: Vec<Option<Arc<Session>>>,
    count: usize,
}

/// Fixed-capacity registry of live sessions.
pub struct SessionRegistry {
    lobby_capacity: usize,
    words_per_race: usize,
    pool: Arc<WordPool>,
    slots: Mutex<Slots>,
}

impl SessionRegistry {
    /// Build a registry around an immutable word pool.
    pub fn new(config: &Config, pool: Arc<WordPool>) -> Self {
        Self {
            lobby_capacity: config.lobby_capacity,
            words_per_race: config.words_per_race,
            pool,
            slots: Mutex::new(Slots {
                entries: (0..config.registry_capacity).map(|_| None).collect(),
                count: 0,
            }),
        }
    }

    /// Return the first eligible session, or create one in the first free
    /// slot, or `None` when the registry is full of ineligible sessions.
    ///
    /// Eligible means "not started and not full", read under each session's
    /// own lock so the pair is consistent. The returned session may still
    /// refuse the eventual `join` — the race activating in between is
    /// handled there, not here.
    pub fn find_or_create(&self) -> Option<Arc<Session>> {
        let mut slots = self.slots.lock();

        let mut first_free = None;
        for (index, entry) in slots.entries.iter().enumerate() {
            match entry {
                Some(session) => {
                    if session.is_eligible() {
                        return Some(Arc::clone(session));
                    }
                }
                None => {
                    if first_free.is_none() {
                        first_free = Some(index);
                    }
                }
            }
        }

        let index = first_free?;
        let words = self.pool.chunk(&mut rand::rng(), self.words_per_race);
        let session = Arc::new(Session::new(self.lobby_capacity, words));
        slots.entries[index] = Some(Arc::clone(&session));
        slots.count += 1;
        counter!(SESSIONS_CREATED_TOTAL).increment(1);
        debug!(slot = index, live = slots.count, "session created");
        Some(session)
    }

    /// Release a session's registry slot. No-op when it is not registered.
    ///
    /// Removal only drops the registry's reference; handlers still holding
    /// an `Arc` to the session keep a valid object. Callers invoke this only
    /// after observing the last player leave.
    pub fn remove(&self, session: &Arc<Session>) {
        let mut slots = self.slots.lock();
        let position = slots
            .entries
            .iter()
            .position(|entry| entry.as_ref().is_some_and(|s| Arc::ptr_eq(s, session)));
        if let Some(index) = position {
            slots.entries[index] = None;
            slots.count -= 1;
            counter!(SESSIONS_DISPOSED_TOTAL).increment(1);
            debug!(slot = index, live = slots.count, "session disposed");
        }
    }

    /// Number of registered sessions.
    pub fn session_count(&self) -> usize {
        self.slots.lock().count
    }
}
