//! Round controller: drives one question at a time through broadcast,
//! answer collection, scoring, reporting and advance
//!
//! The controller runs as its own task for the duration of a game. Answer
//! collection is a bounded polling wait (100 ms): each interval it observes
//! the shutdown signal, the connected-player count and the remaining-answer
//! set. A player who disconnects mid-round simply drops out of the remaining
//! set, so their absence never stalls the round. All terminal paths (question
//! exhaustion, player shortfall, shutdown) converge on [`SessionState::finish`],
//! guarded by the ending flag so teardown executes at most once per game.

use crate::registry::{AnswerRecord, SessionState};
use crate::scoring::{self, AnswerError};
use log::{info, warn};
use shared::{ServerMessage, MIN_PLAYERS};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};

/// How often the answer-collection wait re-checks its completion predicate
/// and the shutdown signal.
pub const ANSWER_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Why a game-start request was rejected. Nothing is mutated on rejection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartError {
    AlreadyRunning,
    NotEnoughPlayers(usize),
    NoQuestions,
}

impl fmt::Display for StartError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StartError::AlreadyRunning => {
                write!(f, "a game is already in progress, wait for it to finish")
            }
            StartError::NotEnoughPlayers(count) => write!(
                f,
                "need at least {} players to start the game, have {}",
                MIN_PLAYERS, count
            ),
            StartError::NoQuestions => write!(f, "no questions are loaded"),
        }
    }
}

impl std::error::Error for StartError {}

/// Per-question state, created fresh on each broadcast and destroyed on
/// advance.
#[derive(Debug, Default)]
pub struct RoundState {
    pub question_index: usize,
    /// Players who have submitted an answer for the active question.
    pub answered: HashSet<String>,
    /// Correct answers in arrival order; the order defines the bonus rank.
    pub correct_order: Vec<String>,
    /// Result line per player, delivered when the round is reported.
    pub pending_results: HashMap<String, ServerMessage>,
    /// Points earned this round, committed on report.
    pub round_points: HashMap<String, u32>,
}

impl RoundState {
    fn new(question_index: usize) -> Self {
        Self {
            question_index,
            ..Default::default()
        }
    }
}

impl SessionState {
    /// Starts a game: requires at least [`MIN_PLAYERS`] registered players
    /// and a non-empty question sequence, and rejects if a game is already
    /// running or still tearing down. On success the game roster is
    /// snapshotted and the running flag raised; the caller is expected to
    /// drive [`run_game`] on its own task.
    pub fn begin_game(&mut self) -> Result<(), StartError> {
        if self.game_running || self.game_ending {
            return Err(StartError::AlreadyRunning);
        }
        if self.players.len() < MIN_PLAYERS {
            return Err(StartError::NotEnoughPlayers(self.players.len()));
        }
        if self.questions.is_empty() {
            return Err(StartError::NoQuestions);
        }

        self.roster = self.players.keys().cloned().collect();
        self.round = None;
        self.game_running = true;
        info!("Game started with {} players", self.roster.len());
        Ok(())
    }

    /// Makes `index` the active question and returns its broadcast message.
    pub fn begin_round(&mut self, index: usize) -> Option<ServerMessage> {
        let question = self.questions.get(index)?;
        let message = question.to_message();
        self.round = Some(RoundState::new(index));
        Some(message)
    }

    /// Players still expected to answer the active question: every currently
    /// connected player who has not answered yet.
    pub fn round_remaining(&self) -> Vec<String> {
        match &self.round {
            Some(round) => self
                .players
                .keys()
                .filter(|name| !round.answered.contains(*name))
                .cloned()
                .collect(),
            None => Vec::new(),
        }
    }

    /// Evaluates one submitted answer as it arrives.
    ///
    /// Duplicate submissions from an already-answered player are silently
    /// discarded (first answer wins). The answered mark, the arrival rank and
    /// the history record are all committed under the session mutex, so
    /// concurrent submissions evaluate exactly once each.
    pub fn submit_answer(&mut self, username: &str, raw_answer: &str) -> Result<(), AnswerError> {
        if !self.game_running {
            warn!("{} tried to answer before the game started", username);
            return Err(AnswerError::GameNotStarted);
        }
        let question_count = self.questions.len();
        let Some(round) = self.round.as_mut() else {
            warn!("{} tried to answer with no active question", username);
            return Err(AnswerError::NoActiveQuestion);
        };
        if round.question_index >= question_count {
            warn!("{} tried to answer with no active question", username);
            return Err(AnswerError::NoActiveQuestion);
        }

        if !round.answered.insert(username.to_string()) {
            // First answer wins; later submissions are a no-op.
            return Ok(());
        }
        info!("Player {} submitted answer: {}", username, raw_answer);

        let question = &self.questions[round.question_index];
        let arrival_rank = round.correct_order.len() + 1;
        let outcome = scoring::evaluate(raw_answer, question, arrival_rank, self.players.len());

        if outcome.correct {
            round.correct_order.push(username.to_string());
            round
                .round_points
                .insert(username.to_string(), outcome.points);
            info!(
                "{} answered correctly (+{} pts, arrival {})",
                username, outcome.points, arrival_rank
            );
        } else {
            info!("{} answered incorrectly", username);
        }
        round
            .pending_results
            .insert(username.to_string(), outcome.message);

        self.histories
            .entry(username.to_string())
            .or_default()
            .push(AnswerRecord {
                question_index: round.question_index,
                answer: outcome.normalized,
                correct: outcome.correct,
            });
        Ok(())
    }

    /// Reports the closed round: delivers each player's pending result line,
    /// commits round point deltas into the cumulative scores, then
    /// recomputes and broadcasts the scoreboard.
    pub fn report_round(&mut self) {
        let Some(round) = self.round.take() else {
            return;
        };

        for (username, message) in &round.pending_results {
            self.send_to(username, message);
        }
        for (username, points) in &round.round_points {
            if let Some(score) = self.scores.get_mut(username) {
                *score += points;
            }
        }
        self.broadcast_scoreboard();
    }

    /// Tears the game down: announces the winner(s), notifies and closes
    /// every session, clears all round/game/player state and releases the
    /// running/ending flags last so a new game may start.
    ///
    /// Idempotent while a teardown is in flight; concurrent completion
    /// triggers collapse into one execution.
    pub fn finish(&mut self, reason: &str) {
        if self.game_ending {
            return;
        }
        self.game_ending = true;
        info!("{}", reason);

        let announcement = self.winner_announcement();
        info!("{}", announcement);

        self.broadcast(&ServerMessage::Announcement {
            text: reason.to_string(),
        });
        self.broadcast(&ServerMessage::Announcement {
            text: announcement,
        });
        self.broadcast(&ServerMessage::GameOver);
        self.close_all();

        self.players.clear();
        self.scores.clear();
        self.histories.clear();
        self.roster.clear();
        self.round = None;

        // Released last so a new game may start.
        self.game_running = false;
        self.game_ending = false;
    }

    /// Winner line over the connected players: everyone tied at the maximum
    /// score wins.
    fn winner_announcement(&self) -> String {
        let mut max_score = 0;
        let mut winners: Vec<&str> = Vec::new();

        let mut usernames: Vec<&String> = self.players.keys().collect();
        usernames.sort();
        for username in usernames {
            let score = self.scores.get(username).copied().unwrap_or(0);
            if winners.is_empty() || score > max_score {
                max_score = score;
                winners = vec![username];
            } else if score == max_score {
                winners.push(username);
            }
        }

        if winners.is_empty() {
            "No winners.".to_string()
        } else {
            format!(
                "The winner(s): {} with {} points!",
                winners.join(", "),
                max_score
            )
        }
    }
}

/// Drives a started game to completion. Runs on its own task, concurrently
/// with the accept loop and the per-connection tasks; all coordination goes
/// through the shared session mutex.
///
/// The caller must have already raised the running flag via
/// [`SessionState::begin_game`].
pub async fn run_game(state: Arc<Mutex<SessionState>>, shutdown: watch::Receiver<bool>) {
    let question_count = state.lock().await.question_count();

    for index in 0..question_count {
        if *shutdown.borrow() {
            finish_game(&state, "Server shutting down.").await;
            return;
        }

        // Broadcasting: push the question to every connected player.
        {
            let mut session = state.lock().await;
            if session.player_count() < MIN_PLAYERS {
                drop(session);
                finish_game(&state, "Player count is less than 2; ending the game.").await;
                return;
            }
            match session.begin_round(index) {
                Some(message) => session.broadcast(&message),
                None => break,
            }
            info!("Question {}/{} sent", index + 1, question_count);
        }

        // AwaitingAnswers: poll until every currently connected player has
        // answered, the player count falls short, or shutdown is raised. The
        // signal is observed at least once per interval.
        loop {
            if *shutdown.borrow() {
                finish_game(&state, "Server shutting down.").await;
                return;
            }
            {
                let session = state.lock().await;
                if !session.is_running() {
                    // Torn down externally while we slept.
                    return;
                }
                // The shortfall check comes first: losing a player mid-round
                // ends the game even if everyone still connected has
                // answered.
                if session.player_count() < MIN_PLAYERS {
                    drop(session);
                    finish_game(&state, "Player count is less than 2; ending the game.").await;
                    return;
                }
                if session.round_remaining().is_empty() {
                    break;
                }
            }
            tokio::time::sleep(ANSWER_POLL_INTERVAL).await;
        }

        // Reporting: individual results, score commit, scoreboard broadcast.
        {
            let mut session = state.lock().await;
            session.report_round();
            if !session.is_running() {
                return;
            }
        }
    }

    finish_game(&state, "All questions have been sent and answered!").await;
}

/// Convergence point for every terminal transition.
pub async fn finish_game(state: &Arc<Mutex<SessionState>>, reason: &str) {
    state.lock().await.finish(reason);
}
