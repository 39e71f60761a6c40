//! Player registry and shared game-session state
//!
//! This module owns every piece of state the per-connection tasks and the
//! round-controller task mutate concurrently: the live-connection map, the
//! retained score map, answer histories, the active round and the
//! running/ending flags. All of it lives in a single [`SessionState`] so the
//! compound operations (uniqueness check + insert, answered check + insert,
//! roster-size check + start decision) happen under one mutex.
//!
//! Scores are kept in a map separate from the live connections: a player who
//! disconnects and rejoins under the same name before a game starts keeps
//! their score. Only an idle-time disconnect discards it.

use crate::round::RoundState;
use crate::scoreboard;
use log::info;
use shared::{Question, ScoreboardEntry, ServerMessage};
use std::collections::{HashMap, HashSet};
use std::fmt;
use tokio::sync::mpsc;

/// Control messages for a connection's outbound queue.
#[derive(Debug)]
pub enum Outbound {
    /// One protocol line, newline appended by the connection task.
    Line(String),
    /// Drop the connection. Idempotent; extra closes are ignored.
    Close,
}

/// Sending side of one player's transport session.
///
/// Sends are fire-and-forget: a failure means the connection task is gone,
/// which the registry learns about through `unregister`, so errors here are
/// only logged.
#[derive(Debug, Clone)]
pub struct PlayerHandle {
    sender: mpsc::UnboundedSender<Outbound>,
}

impl PlayerHandle {
    pub fn new(sender: mpsc::UnboundedSender<Outbound>) -> Self {
        Self { sender }
    }

    /// Queues one message line for delivery. Best-effort; no acknowledgment
    /// is awaited.
    pub fn send(&self, message: &ServerMessage) {
        let _ = self.sender.send(Outbound::Line(message.to_line()));
    }

    /// Asks the connection task to drop the stream. Safe from any context.
    pub fn close(&self) {
        let _ = self.sender.send(Outbound::Close);
    }
}

/// One evaluated answer in a player's history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerRecord {
    pub question_index: usize,
    pub answer: String,
    pub correct: bool,
}

/// Why a registration attempt was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegisterError {
    EmptyName,
    NameTaken(String),
    GameInProgress,
}

impl RegisterError {
    /// The protocol line sent to the client before the connection is closed.
    pub fn to_message(&self) -> ServerMessage {
        match self {
            RegisterError::EmptyName => ServerMessage::EmptyName,
            RegisterError::NameTaken(username) => ServerMessage::NameTaken {
                username: username.clone(),
            },
            RegisterError::GameInProgress => ServerMessage::GameAlreadyStarted,
        }
    }
}

impl fmt::Display for RegisterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegisterError::EmptyName => write!(f, "username is empty"),
            RegisterError::NameTaken(username) => {
                write!(f, "username {} is already taken", username)
            }
            RegisterError::GameInProgress => write!(f, "a game is already in progress"),
        }
    }
}

impl std::error::Error for RegisterError {}

/// All shared, mutably-accessed server state. Always used behind a single
/// `Arc<tokio::sync::Mutex<SessionState>>`.
pub struct SessionState {
    /// Live connections, keyed by normalized username.
    pub(crate) players: HashMap<String, PlayerHandle>,
    /// Cumulative scores, retained independently of the live connections.
    pub(crate) scores: HashMap<String, u32>,
    /// Ordered answer history per username.
    pub(crate) histories: HashMap<String, Vec<AnswerRecord>>,
    /// The loaded question sequence for this process.
    pub(crate) questions: Vec<Question>,
    /// State of the active round, if a question is in flight.
    pub(crate) round: Option<RoundState>,
    /// Usernames connected at the moment the game started.
    pub(crate) roster: HashSet<String>,
    pub(crate) game_running: bool,
    /// Guards teardown so concurrent completion triggers collapse into one.
    pub(crate) game_ending: bool,
}

impl SessionState {
    pub fn new(questions: Vec<Question>) -> Self {
        Self {
            players: HashMap::new(),
            scores: HashMap::new(),
            histories: HashMap::new(),
            questions,
            round: None,
            roster: HashSet::new(),
            game_running: false,
            game_ending: false,
        }
    }

    /// Registers a new player and broadcasts the refreshed scoreboard.
    ///
    /// Usernames are trimmed and lowercased before any check. Returns the
    /// normalized username on success. A name freed by a disconnect may be
    /// reused; if the score map still holds an entry for it, that score is
    /// kept.
    pub fn register(
        &mut self,
        username: &str,
        handle: PlayerHandle,
    ) -> Result<String, RegisterError> {
        if self.game_running {
            return Err(RegisterError::GameInProgress);
        }

        let username = username.trim().to_lowercase();
        if username.is_empty() {
            return Err(RegisterError::EmptyName);
        }
        if self.players.contains_key(&username) {
            return Err(RegisterError::NameTaken(username));
        }

        self.players.insert(username.clone(), handle);
        self.scores.entry(username.clone()).or_insert(0);
        self.histories.entry(username.clone()).or_default();

        info!("{} has connected to the server", username);
        self.broadcast_scoreboard();
        Ok(username)
    }

    /// Removes a live connection and notifies the remaining players.
    ///
    /// During a game the score is retained for end-of-game ranking; outside a
    /// game it is discarded together with the answer history. Returns false
    /// if the player was not registered (already removed by teardown).
    pub fn unregister(&mut self, username: &str) -> bool {
        if self.players.remove(username).is_none() {
            return false;
        }
        if !self.game_ending {
            info!("{} has disconnected from the server", username);
        }

        if !self.game_running {
            self.scores.remove(username);
            self.histories.remove(username);
        }

        self.broadcast(&ServerMessage::UserLeft {
            username: username.to_string(),
        });
        if !self.game_running {
            self.broadcast_scoreboard();
        }
        true
    }

    /// Atomic, consistent copy of the currently connected usernames.
    pub fn connected_players(&self) -> Vec<String> {
        self.players.keys().cloned().collect()
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn question_count(&self) -> usize {
        self.questions.len()
    }

    pub fn is_running(&self) -> bool {
        self.game_running
    }

    pub fn is_ending(&self) -> bool {
        self.game_ending
    }

    /// The answer history recorded for a username, if any.
    pub fn history(&self, username: &str) -> Option<&[AnswerRecord]> {
        self.histories.get(username).map(Vec::as_slice)
    }

    pub fn score(&self, username: &str) -> Option<u32> {
        self.scores.get(username).copied()
    }

    /// Sends one message to a single connected player, if still connected.
    pub fn send_to(&self, username: &str, message: &ServerMessage) {
        if let Some(handle) = self.players.get(username) {
            handle.send(message);
        }
    }

    /// Sends one message to every connected player. Unreachable players are
    /// cleaned up through their own connection tasks, never retried here.
    pub fn broadcast(&self, message: &ServerMessage) {
        for handle in self.players.values() {
            handle.send(message);
        }
    }

    /// Asks every connection task to drop its stream. Safe to repeat.
    pub fn close_all(&self) {
        for handle in self.players.values() {
            handle.close();
        }
    }

    /// Competition-ranked scoreboard over the currently connected players.
    pub fn scoreboard_entries(&self) -> Vec<ScoreboardEntry> {
        let scores: Vec<(String, u32)> = self
            .players
            .keys()
            .map(|name| (name.clone(), self.scores.get(name).copied().unwrap_or(0)))
            .collect();
        scoreboard::compute(scores)
    }

    /// Recomputes the ranked scoreboard and pushes it to every player.
    pub fn broadcast_scoreboard(&self) {
        let entries = self.scoreboard_entries();
        self.broadcast(&ServerMessage::Scoreboard { entries });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::Label;
    use tokio::sync::mpsc::UnboundedReceiver;

    fn question() -> Question {
        Question {
            prompt: "2+2?".to_string(),
            option_a: "3".to_string(),
            option_b: "4".to_string(),
            option_c: "5".to_string(),
            correct: Label::B,
        }
    }

    fn new_state() -> SessionState {
        SessionState::new(vec![question()])
    }

    fn new_handle() -> (PlayerHandle, UnboundedReceiver<Outbound>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (PlayerHandle::new(tx), rx)
    }

    fn drain_lines(rx: &mut UnboundedReceiver<Outbound>) -> Vec<String> {
        let mut lines = Vec::new();
        while let Ok(out) = rx.try_recv() {
            if let Outbound::Line(line) = out {
                lines.push(line);
            }
        }
        lines
    }

    #[test]
    fn test_register_normalizes_username() {
        let mut state = new_state();
        let (handle, _rx) = new_handle();

        let name = state.register("  Alice ", handle).unwrap();
        assert_eq!(name, "alice");
        assert_eq!(state.connected_players(), vec!["alice".to_string()]);
        assert_eq!(state.score("alice"), Some(0));
    }

    #[test]
    fn test_register_empty_name_rejected() {
        let mut state = new_state();
        let (handle, _rx) = new_handle();

        assert_eq!(state.register("   ", handle), Err(RegisterError::EmptyName));
        assert_eq!(state.player_count(), 0);
    }

    #[test]
    fn test_register_duplicate_rejected_then_reusable() {
        let mut state = new_state();
        let (handle1, _rx1) = new_handle();
        let (handle2, _rx2) = new_handle();
        let (handle3, _rx3) = new_handle();

        state.register("alice", handle1).unwrap();
        assert_eq!(
            state.register("ALICE", handle2),
            Err(RegisterError::NameTaken("alice".to_string()))
        );

        // Once the name is freed it may be registered again.
        assert!(state.unregister("alice"));
        assert_eq!(state.register("alice", handle3), Ok("alice".to_string()));
    }

    #[test]
    fn test_register_rejected_while_game_running() {
        let mut state = new_state();
        let (handle, _rx) = new_handle();

        state.game_running = true;
        assert_eq!(
            state.register("alice", handle),
            Err(RegisterError::GameInProgress)
        );
    }

    #[test]
    fn test_register_broadcasts_scoreboard_to_existing_players() {
        let mut state = new_state();
        let (handle1, mut rx1) = new_handle();
        let (handle2, _rx2) = new_handle();

        state.register("alice", handle1).unwrap();
        drain_lines(&mut rx1);

        state.register("bob", handle2).unwrap();
        let lines = drain_lines(&mut rx1);
        assert!(
            lines.iter().any(|l| l.starts_with("SCOREBOARD:")),
            "existing player should receive the refreshed scoreboard: {:?}",
            lines
        );
    }

    #[test]
    fn test_unregister_discards_score_when_idle() {
        let mut state = new_state();
        let (handle, _rx) = new_handle();

        state.register("alice", handle).unwrap();
        state.scores.insert("alice".to_string(), 7);
        state.unregister("alice");

        assert_eq!(state.score("alice"), None);
        assert!(state.history("alice").is_none());
    }

    #[test]
    fn test_unregister_retains_score_during_game() {
        let mut state = new_state();
        let (handle, _rx) = new_handle();

        state.register("alice", handle).unwrap();
        state.scores.insert("alice".to_string(), 7);
        state.game_running = true;
        state.unregister("alice");

        // Retained for end-of-game ranking.
        assert_eq!(state.score("alice"), Some(7));
    }

    #[test]
    fn test_rejoin_before_game_start_keeps_score() {
        let mut state = new_state();
        let (handle1, _rx1) = new_handle();
        let (handle2, _rx2) = new_handle();

        state.register("alice", handle1).unwrap();
        state.scores.insert("alice".to_string(), 5);

        // Simulate a drop while a game is running, then a rejoin after it
        // ended: the retained score is reused.
        state.game_running = true;
        state.unregister("alice");
        state.game_running = false;
        state.register("alice", handle2).unwrap();
        assert_eq!(state.score("alice"), Some(5));
    }

    #[test]
    fn test_unregister_notifies_remaining_players() {
        let mut state = new_state();
        let (handle1, mut rx1) = new_handle();
        let (handle2, _rx2) = new_handle();

        state.register("alice", handle1).unwrap();
        state.register("bob", handle2).unwrap();
        drain_lines(&mut rx1);

        state.unregister("bob");
        let lines = drain_lines(&mut rx1);
        assert!(lines.contains(&"USER_LEFT:bob".to_string()));
        assert!(lines.iter().any(|l| l.starts_with("SCOREBOARD:")));
    }

    #[test]
    fn test_unregister_unknown_player_is_noop() {
        let mut state = new_state();
        assert!(!state.unregister("ghost"));
    }

    #[test]
    fn test_snapshot_is_a_copy() {
        let mut state = new_state();
        let (handle1, _rx1) = new_handle();
        let (handle2, _rx2) = new_handle();

        state.register("alice", handle1).unwrap();
        let snapshot = state.connected_players();
        state.register("bob", handle2).unwrap();

        assert_eq!(snapshot, vec!["alice".to_string()]);
        assert_eq!(state.player_count(), 2);
    }
}
