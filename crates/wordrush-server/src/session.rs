//! One lobby/race instance.
//!
//! A session owns its player slots, its immutable word sequence, and its
//! phase flags. All mutable state sits behind a single mutex with short
//! critical sections; callers snapshot what they need and act outside the
//! lock, so no network I/O ever happens while it is held. The word sequence
//! is sampled at creation and never changes, so it lives outside the lock
//! and handlers read it directly rather than depending on message delivery.

use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::task::JoinHandle;

use crate::broadcast::Outbound;

/// A player as held in a session slot: identity plus the outbound handle
/// broadcasts deliver through.
#[derive(Clone)]
pub struct Player {
    /// Self-asserted client identifier; slot identity is equality on this.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Queue handle to this player's connection.
    pub outbound: Outbound,
}

/// Why a join was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum JoinError {
    /// Every slot is occupied.
    #[error("lobby is full")]
    Full,
    /// The race already activated; late joiners are rejected outright.
    #[error("race already started")]
    AlreadyStarted,
}

/// Consistent snapshot of a session's phase, taken under the lock.
#[derive(Debug, Clone, Copy)]
pub struct Phase {
    /// The countdown finished and the race is live.
    pub has_started: bool,
    /// The session is over and every handler should wind down.
    pub ended: bool,
    /// Monotonic activation timestamp; set exactly when `has_started` flips.
    pub start_time: Option<Instant>,
}

struct State {
    slots: Vec<Option<Player>>,
    count: usize,
    has_started: bool,
    ended: bool,
    countdown_active: bool,
    start_time: Option<Instant>,
}

impl State {
    fn occupied(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }
}

/// One lobby/race instance with bounded player capacity.
pub struct Session {
    words: Vec<String>,
    state: Mutex<State>,
    countdown_task: Mutex<Option<JoinHandle<()>>>,
}

impl Session {
    /// Create an empty session around a pre-sampled word sequence.
    pub fn new(capacity: usize, words: Vec<String>) -> Self {
        Self {
            words,
            state: Mutex::new(State {
                slots: (0..capacity).map(|_| None).collect(),
                count: 0,
                has_started: false,
                ended: false,
                countdown_active: false,
                start_time: None,
            }),
            countdown_task: Mutex::new(None),
        }
    }

    /// The shared word sequence, immutable for the session's lifetime.
    pub fn words(&self) -> &[String] {
        &self.words
    }

    /// Occupy the first empty slot. Returns the post-join player count.
    ///
    /// Atomic with respect to concurrent joins/leaves; rejects both a full
    /// lobby and a race that has already activated (the matchmaker's
    /// eligibility read can go stale between selection and join).
    pub fn join(&self, player: Player) -> Result<usize, JoinError> {
        let mut state = self.state.lock();
        if state.has_started {
            return Err(JoinError::AlreadyStarted);
        }
        let slot = state
            .slots
            .iter()
            .position(Option::is_none)
            .ok_or(JoinError::Full)?;
        state.slots[slot] = Some(player);
        state.count += 1;
        debug_assert_eq!(state.count, state.occupied());
        Ok(state.count)
    }

    /// Clear the slot whose identity matches `id`. Returns the remaining
    /// player count when the player was present, `None` otherwise.
    pub fn leave(&self, id: &str) -> Option<usize> {
        let mut state = self.state.lock();
        let slot = state
            .slots
            .iter()
            .position(|slot| slot.as_ref().is_some_and(|p| p.id == id))?;
        state.slots[slot] = None;
        state.count -= 1;
        debug_assert_eq!(state.count, state.occupied());
        Some(state.count)
    }

    /// Claim the right to run this session's countdown coordinator.
    ///
    /// Check-and-set under the lock: succeeds exactly once per session,
    /// and only while at least two players are present and the race has
    /// neither started nor a coordinator already claimed. Any joiner may
    /// attempt it, which makes a failed coordinator spawn retryable.
    pub fn try_begin_countdown(&self) -> bool {
        let mut state = self.state.lock();
        if state.count >= 2 && !state.has_started && !state.countdown_active {
            state.countdown_active = true;
            return true;
        }
        false
    }

    /// Activate the race: flip `has_started` and stamp the start time.
    /// Called only from the countdown coordinator, exactly once.
    pub fn activate(&self) {
        let mut state = self.state.lock();
        debug_assert!(!state.has_started, "session activated twice");
        state.has_started = true;
        state.start_time = Some(Instant::now());
    }

    /// Mark the coordinator finished. After activation `has_started` keeps
    /// the countdown from ever being claimed again.
    pub fn finish_countdown(&self) {
        self.state.lock().countdown_active = false;
    }

    /// Flip `ended` if the race has run longer than `limit`.
    ///
    /// Returns `true` for exactly one caller per session: the handler that
    /// wins the transition performs the group `session_end` broadcast,
    /// everyone else just observes `ended` on their next pass.
    pub fn try_end_after(&self, limit: Duration) -> bool {
        let mut state = self.state.lock();
        if !state.has_started || state.ended {
            return false;
        }
        match state.start_time {
            Some(start) if start.elapsed() >= limit => {
                state.ended = true;
                true
            }
            _ => false,
        }
    }

    /// Snapshot the phase flags in one critical section.
    pub fn phase(&self) -> Phase {
        let state = self.state.lock();
        Phase {
            has_started: state.has_started,
            ended: state.ended,
            start_time: state.start_time,
        }
    }

    /// Snapshot the outbound handles of every current player. Taken under
    /// the lock, delivered outside it.
    pub fn recipients(&self) -> Vec<Outbound> {
        let state = self.state.lock();
        state
            .slots
            .iter()
            .flatten()
            .map(|player| player.outbound.clone())
            .collect()
    }

    /// Current player count.
    pub fn player_count(&self) -> usize {
        self.state.lock().count
    }

    /// Whether the matchmaker may place a new player here.
    pub fn is_eligible(&self) -> bool {
        let state = self.state.lock();
        !state.has_started && state.count < state.slots.len()
    }

    /// Hand the spawned coordinator's handle to the session so the last
    /// leaver can drain it before disposal.
    pub fn store_countdown_task(&self, handle: JoinHandle<()>) {
        *self.countdown_task.lock() = Some(handle);
    }

    /// Take the coordinator's handle, if one is in flight.
    pub fn take_countdown_task(&self) -> Option<JoinHandle<()>> {
        self.countdown_task.lock().take()
    }
}
