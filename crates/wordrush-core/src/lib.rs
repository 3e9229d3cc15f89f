//! # wordrush-core
//!
//! Foundation crate for the wordrush typing-race server.
//!
//! This crate provides the shared vocabulary the server and binary depend on:
//!
//! - **Configuration**: [`config::Config`] — every behavioral constant
//!   (capacities, timeouts, lengths), layered over compiled defaults from an
//!   optional JSON file and `WORDRUSH_*` environment overrides
//! - **Wire protocol**: [`protocol::Handshake`], [`protocol::ClientCommand`],
//!   [`protocol::ServerEvent`] — the newline-delimited JSON records exchanged
//!   with clients
//! - **Word pool**: [`words::WordPool`] — the immutable dictionary sampled
//!   into per-race word sequences
//! - **Scoring**: [`wpm::words_per_minute`] — the words-per-minute formula
//!
//! ## Crate Position
//!
//! Foundation crate. Depended on by `wordrush-server` and the `wordrush`
//! binary; depends on no other workspace crate.

#![deny(unsafe_code)]

pub mod config;
pub mod protocol;
pub mod words;
pub mod wpm;
