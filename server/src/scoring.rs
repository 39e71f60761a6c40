//! Scoring engine: answer normalization and the race-scoring rule
//!
//! Answers are raced within a round. The first correct arrival earns as many
//! points as there are connected players at evaluation time; every later
//! correct arrival earns exactly 1 point; wrong answers earn 0 and the reply
//! names the correct label. Arrival ranks 1 through 3 get an ordinal
//! acknowledgment in the result text.

use shared::{Question, ServerMessage};
use std::fmt;

/// Why a submitted answer was rejected before evaluation.
///
/// These are temporal errors: round state is unaffected and the player may
/// retry on the next valid question.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerError {
    GameNotStarted,
    NoActiveQuestion,
}

impl AnswerError {
    /// The error line reported back to the submitting player.
    pub fn to_message(&self) -> ServerMessage {
        match self {
            AnswerError::GameNotStarted => ServerMessage::GameNotStarted,
            AnswerError::NoActiveQuestion => ServerMessage::NoActiveQuestion,
        }
    }
}

impl fmt::Display for AnswerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnswerError::GameNotStarted => write!(f, "no game is running"),
            AnswerError::NoActiveQuestion => write!(f, "no question is active"),
        }
    }
}

impl std::error::Error for AnswerError {}

/// Result of evaluating one answer against the active question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundOutcome {
    pub correct: bool,
    /// Points earned this round; committed to the cumulative score only when
    /// the round is reported.
    pub points: u32,
    /// The pending per-player result line, delivered when the round closes.
    pub message: ServerMessage,
    /// The trimmed, uppercased answer as recorded in the history.
    pub normalized: String,
}

/// Evaluates one answer. `arrival_rank` is the 1-based position this answer
/// would take among the round's correct answers; `connected_players` is the
/// player count at evaluation time, which sets the first-arrival bonus.
pub fn evaluate(
    raw_answer: &str,
    question: &Question,
    arrival_rank: usize,
    connected_players: usize,
) -> RoundOutcome {
    let normalized = raw_answer.trim().to_uppercase();
    let correct = normalized == question.correct.as_str();

    if correct {
        let points = if arrival_rank == 1 {
            connected_players as u32
        } else {
            1
        };
        let text = if arrival_rank <= 3 {
            format!(
                "Congratulations! You are the {} person to answer correctly. Points earned: {}",
                ordinal(arrival_rank),
                points
            )
        } else {
            format!("Congratulations! Points earned: {}", points)
        };
        RoundOutcome {
            correct: true,
            points,
            message: ServerMessage::Correct { message: text },
            normalized,
        }
    } else {
        RoundOutcome {
            correct: false,
            points: 0,
            message: ServerMessage::Wrong {
                message: format!("Wrong Answer! Correct answer: {}.", question.correct),
            },
            normalized,
        }
    }
}

/// 1-based rank as an English ordinal ("1st", "2nd", "3rd", "4th", ...).
fn ordinal(rank: usize) -> String {
    let suffix = match rank {
        1 => "st",
        2 => "nd",
        3 => "rd",
        _ => "th",
    };
    format!("{}{}", rank, suffix)
}
