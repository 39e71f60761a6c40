//! # Trivia Game Server Library
//!
//! Server-side engine for a real-time multiplayer trivia game. Clients
//! connect over TCP, register a unique username, and race to answer timed
//! rounds of multiple-choice questions; the server assigns points by arrival
//! order and maintains a live competition-ranked scoreboard until the
//! question sequence is exhausted or the game is aborted.
//!
//! ## Architecture
//!
//! One tokio task per connection reads that player's inbound lines for the
//! connection's lifetime; the accept loop runs on its own task; a running
//! game is driven by one additional task. Everything they share — live
//! connections, retained scores, answer histories, the active round and the
//! running/ending flags — lives in a single [`registry::SessionState`]
//! behind one mutex, because the critical operations are compound:
//! uniqueness check + insert on registration, answered check + insert on
//! submission, roster-size check on game start.
//!
//! ## Module Organization
//!
//! - [`questions`] — loads the question file (five-line blocks, cycling when
//!   the file holds fewer questions than requested).
//! - [`registry`] — player registry and shared session state.
//! - [`round`] — the round-by-round state machine and game teardown.
//! - [`scoring`] — answer normalization and the race-scoring rule.
//! - [`scoreboard`] — competition-ranked scoreboard computation.
//! - [`network`] — TCP accept loop, per-connection tasks, lifecycle control.
//!
//! ## Design Limitations
//!
//! There is no per-client timeout or backpressure: a connected client that
//! never answers stalls its round until it disconnects or the player count
//! drops below the minimum. Dropped players cannot reconnect into a running
//! game, and no state survives a process restart.

pub mod network;
pub mod questions;
pub mod registry;
pub mod round;
pub mod scoreboard;
pub mod scoring;
