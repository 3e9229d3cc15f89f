//! Metric name constants.
//!
//! Names are centralized to avoid typos across modules. No recorder is
//! installed by this crate; recording is a no-op unless an embedder installs
//! one.

/// Connections admitted past the capacity gate (counter).
pub const CONNECTIONS_OPENED_TOTAL: &str = "connections_opened_total";
/// Connections rejected at the capacity gate (counter).
pub const CONNECTIONS_REJECTED_TOTAL: &str = "connections_rejected_total";
/// Currently live connection handlers (gauge).
pub const CONNECTIONS_ACTIVE: &str = "connections_active";
/// Sessions created total (counter).
pub const SESSIONS_CREATED_TOTAL: &str = "sessions_created_total";
/// Sessions disposed total (counter).
pub const SESSIONS_DISPOSED_TOTAL: &str = "sessions_disposed_total";
/// Races activated total (counter).
pub const RACES_STARTED_TOTAL: &str = "races_started_total";
/// Correctly submitted words total (counter).
pub const WORDS_ACCEPTED_TOTAL: &str = "words_accepted_total";
/// Outbound lines dropped on full per-connection queues (counter).
pub const BROADCAST_DROPS_TOTAL: &str = "broadcast_drops_total";
