//! Wire protocol types shared by the trivia server, the test client and the
//! integration tests.
//!
//! The protocol is newline-delimited UTF-8 text, one message per line. The
//! first line a client sends is its raw username; everything after that uses
//! a colon-delimited tag. `ServerMessage`/`ClientMessage` own the exact line
//! formats so no other crate ever builds protocol strings by hand.

use std::fmt;

/// Minimum number of connected players required to start (or keep) a game.
pub const MIN_PLAYERS: usize = 2;

/// One of the three answer options of a question.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Label {
    A,
    B,
    C,
}

impl Label {
    /// Parses a label from user or file input. Trims and uppercases first,
    /// so `" a "` parses as `Label::A`.
    pub fn parse(s: &str) -> Option<Label> {
        match s.trim().to_uppercase().as_str() {
            "A" => Some(Label::A),
            "B" => Some(Label::B),
            "C" => Some(Label::C),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Label::A => "A",
            Label::B => "B",
            Label::C => "C",
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A multiple-choice question. Immutable once loaded; the active question is
/// identified solely by its index into the loaded sequence.
///
/// The correct answer is stored as an explicit [`Label`] supplied by the
/// question source, never inferred from the option text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    pub prompt: String,
    pub option_a: String,
    pub option_b: String,
    pub option_c: String,
    pub correct: Label,
}

impl Question {
    /// The broadcast message announcing this question as a new round.
    pub fn to_message(&self) -> ServerMessage {
        ServerMessage::Question {
            prompt: self.prompt.clone(),
            option_a: self.option_a.clone(),
            option_b: self.option_b.clone(),
            option_c: self.option_c.clone(),
        }
    }
}

/// One row of the ranked scoreboard.
///
/// Ranks follow competition ranking: tied scores share a rank and the next
/// distinct score's rank is its 1-based position in the sorted sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoreboardEntry {
    pub rank: usize,
    pub username: String,
    pub score: u32,
}

/// Messages sent from the server to clients, one per line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerMessage {
    Welcome {
        username: String,
    },
    EmptyName,
    NameTaken {
        username: String,
    },
    GameAlreadyStarted,
    Question {
        prompt: String,
        option_a: String,
        option_b: String,
        option_c: String,
    },
    Correct {
        message: String,
    },
    Wrong {
        message: String,
    },
    GameNotStarted,
    NoActiveQuestion,
    Scoreboard {
        entries: Vec<ScoreboardEntry>,
    },
    UserLeft {
        username: String,
    },
    /// Free-form announcement text (teardown reasons, winner lines).
    Announcement {
        text: String,
    },
    GameOver,
}

impl ServerMessage {
    /// Renders the message as its wire line, without the trailing newline.
    pub fn to_line(&self) -> String {
        match self {
            ServerMessage::Welcome { username } => format!("Welcome, {}!", username),
            ServerMessage::EmptyName => "The name cannot be empty!".to_string(),
            ServerMessage::NameTaken { username } => {
                format!("The name {} already exists!", username)
            }
            ServerMessage::GameAlreadyStarted => "GAME_ALREADY_STARTED".to_string(),
            ServerMessage::Question {
                prompt,
                option_a,
                option_b,
                option_c,
            } => format!("QUESTION:{}:{}:{}:{}", prompt, option_a, option_b, option_c),
            ServerMessage::Correct { message } => format!("RESULT:CORRECT:{}", message),
            ServerMessage::Wrong { message } => format!("RESULT:WRONG:{}", message),
            ServerMessage::GameNotStarted => "ERROR:GAME_NOT_STARTED".to_string(),
            ServerMessage::NoActiveQuestion => "ERROR:NO_ACTIVE_QUESTION".to_string(),
            ServerMessage::Scoreboard { entries } => {
                let names: Vec<String> = entries
                    .iter()
                    .map(|e| format!("{}. {}", e.rank, e.username))
                    .collect();
                let scores: Vec<String> = entries.iter().map(|e| e.score.to_string()).collect();
                format!("SCOREBOARD:{}:{}", names.join(","), scores.join(","))
            }
            ServerMessage::UserLeft { username } => format!("USER_LEFT:{}", username),
            ServerMessage::Announcement { text } => text.clone(),
            ServerMessage::GameOver => "GAMEOVER".to_string(),
        }
    }

    /// Decodes a wire line back into a message. Lines that match no tagged
    /// format are treated as announcements, which is also how clients should
    /// display them.
    pub fn parse(line: &str) -> ServerMessage {
        if line == "GAMEOVER" {
            return ServerMessage::GameOver;
        }
        if line == "GAME_ALREADY_STARTED" {
            return ServerMessage::GameAlreadyStarted;
        }
        if line == "ERROR:GAME_NOT_STARTED" {
            return ServerMessage::GameNotStarted;
        }
        if line == "ERROR:NO_ACTIVE_QUESTION" {
            return ServerMessage::NoActiveQuestion;
        }
        if line == "The name cannot be empty!" {
            return ServerMessage::EmptyName;
        }
        if let Some(rest) = line.strip_prefix("Welcome, ") {
            if let Some(username) = rest.strip_suffix('!') {
                return ServerMessage::Welcome {
                    username: username.to_string(),
                };
            }
        }
        if let Some(rest) = line.strip_prefix("The name ") {
            if let Some(username) = rest.strip_suffix(" already exists!") {
                return ServerMessage::NameTaken {
                    username: username.to_string(),
                };
            }
        }
        if let Some(rest) = line.strip_prefix("QUESTION:") {
            let parts: Vec<&str> = rest.splitn(4, ':').collect();
            if parts.len() == 4 {
                return ServerMessage::Question {
                    prompt: parts[0].to_string(),
                    option_a: parts[1].to_string(),
                    option_b: parts[2].to_string(),
                    option_c: parts[3].to_string(),
                };
            }
        }
        if let Some(message) = line.strip_prefix("RESULT:CORRECT:") {
            return ServerMessage::Correct {
                message: message.to_string(),
            };
        }
        if let Some(message) = line.strip_prefix("RESULT:WRONG:") {
            return ServerMessage::Wrong {
                message: message.to_string(),
            };
        }
        if let Some(rest) = line.strip_prefix("SCOREBOARD:") {
            if let Some(entries) = parse_scoreboard(rest) {
                return ServerMessage::Scoreboard { entries };
            }
        }
        if let Some(username) = line.strip_prefix("USER_LEFT:") {
            return ServerMessage::UserLeft {
                username: username.to_string(),
            };
        }
        ServerMessage::Announcement {
            text: line.to_string(),
        }
    }
}

/// Parses the two parallel comma-separated scoreboard lists. The lists must
/// be positionally aligned; a length mismatch makes the whole line invalid.
fn parse_scoreboard(rest: &str) -> Option<Vec<ScoreboardEntry>> {
    let (names, scores) = rest.rsplit_once(':')?;
    if names.is_empty() && scores.is_empty() {
        return Some(Vec::new());
    }

    let names: Vec<&str> = names.split(',').collect();
    let scores: Vec<&str> = scores.split(',').collect();
    if names.len() != scores.len() {
        return None;
    }

    let mut entries = Vec::with_capacity(names.len());
    for (name, score) in names.iter().zip(scores.iter()) {
        let (rank, username) = name.split_once(". ")?;
        entries.push(ScoreboardEntry {
            rank: rank.parse().ok()?,
            username: username.to_string(),
            score: score.parse().ok()?,
        });
    }
    Some(entries)
}

/// Messages sent from clients to the server after registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientMessage {
    /// A submitted answer. The label is kept raw here; the server validates
    /// by normalization rather than rejecting unknown labels.
    Answer { label: String },
}

impl ClientMessage {
    pub fn to_line(&self) -> String {
        match self {
            ClientMessage::Answer { label } => format!("ANSWER:{}", label),
        }
    }

    /// Parses a post-registration client line. Anything that is not a
    /// well-formed `ANSWER:<label>` yields `None` and is echoed back by the
    /// server.
    pub fn parse(line: &str) -> Option<ClientMessage> {
        let parts: Vec<&str> = line.split(':').collect();
        if parts.len() == 2 && parts[0] == "ANSWER" {
            return Some(ClientMessage::Answer {
                label: parts[1].to_string(),
            });
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_question() -> Question {
        Question {
            prompt: "Capital of Norway?".to_string(),
            option_a: "Oslo".to_string(),
            option_b: "Bergen".to_string(),
            option_c: "Stavanger".to_string(),
            correct: Label::A,
        }
    }

    #[test]
    fn test_label_parse_normalizes() {
        assert_eq!(Label::parse(" a "), Some(Label::A));
        assert_eq!(Label::parse("B"), Some(Label::B));
        assert_eq!(Label::parse("c\n"), Some(Label::C));
        assert_eq!(Label::parse("D"), None);
        assert_eq!(Label::parse(""), None);
    }

    #[test]
    fn test_question_broadcast_format() {
        let msg = sample_question().to_message();
        assert_eq!(
            msg.to_line(),
            "QUESTION:Capital of Norway?:Oslo:Bergen:Stavanger"
        );
    }

    #[test]
    fn test_question_line_parse() {
        let line = "QUESTION:Capital of Norway?:Oslo:Bergen:Stavanger";
        match ServerMessage::parse(line) {
            ServerMessage::Question {
                prompt,
                option_a,
                option_b,
                option_c,
            } => {
                assert_eq!(prompt, "Capital of Norway?");
                assert_eq!(option_a, "Oslo");
                assert_eq!(option_b, "Bergen");
                assert_eq!(option_c, "Stavanger");
            }
            other => panic!("Unexpected message: {:?}", other),
        }
    }

    #[test]
    fn test_registration_lines() {
        assert_eq!(
            ServerMessage::Welcome {
                username: "alice".to_string()
            }
            .to_line(),
            "Welcome, alice!"
        );
        assert_eq!(
            ServerMessage::NameTaken {
                username: "alice".to_string()
            }
            .to_line(),
            "The name alice already exists!"
        );
        assert_eq!(ServerMessage::EmptyName.to_line(), "The name cannot be empty!");
        assert_eq!(
            ServerMessage::parse("Welcome, alice!"),
            ServerMessage::Welcome {
                username: "alice".to_string()
            }
        );
        assert_eq!(
            ServerMessage::parse("The name alice already exists!"),
            ServerMessage::NameTaken {
                username: "alice".to_string()
            }
        );
    }

    #[test]
    fn test_scoreboard_lists_are_aligned() {
        let entries = vec![
            ScoreboardEntry {
                rank: 1,
                username: "alice".to_string(),
                score: 2,
            },
            ScoreboardEntry {
                rank: 2,
                username: "bob".to_string(),
                score: 1,
            },
        ];
        let line = ServerMessage::Scoreboard { entries }.to_line();
        assert_eq!(line, "SCOREBOARD:1. alice,2. bob:2,1");

        // The two comma-separated lists must always have equal length and be
        // positionally aligned.
        let rest = line.strip_prefix("SCOREBOARD:").unwrap();
        let (names, scores) = rest.rsplit_once(':').unwrap();
        assert_eq!(names.split(',').count(), scores.split(',').count());
    }

    #[test]
    fn test_scoreboard_roundtrip() {
        let entries = vec![
            ScoreboardEntry {
                rank: 1,
                username: "alice".to_string(),
                score: 10,
            },
            ScoreboardEntry {
                rank: 1,
                username: "bob".to_string(),
                score: 10,
            },
            ScoreboardEntry {
                rank: 3,
                username: "carol".to_string(),
                score: 7,
            },
        ];
        let line = ServerMessage::Scoreboard {
            entries: entries.clone(),
        }
        .to_line();
        match ServerMessage::parse(&line) {
            ServerMessage::Scoreboard { entries: parsed } => assert_eq!(parsed, entries),
            other => panic!("Unexpected message: {:?}", other),
        }
    }

    #[test]
    fn test_empty_scoreboard_line() {
        let line = ServerMessage::Scoreboard { entries: vec![] }.to_line();
        assert_eq!(line, "SCOREBOARD::");
        match ServerMessage::parse(&line) {
            ServerMessage::Scoreboard { entries } => assert!(entries.is_empty()),
            other => panic!("Unexpected message: {:?}", other),
        }
    }

    #[test]
    fn test_client_answer_parse() {
        assert_eq!(
            ClientMessage::parse("ANSWER:A"),
            Some(ClientMessage::Answer {
                label: "A".to_string()
            })
        );
        // Unknown labels are carried through; the server validates by
        // normalization.
        assert_eq!(
            ClientMessage::parse("ANSWER:x"),
            Some(ClientMessage::Answer {
                label: "x".to_string()
            })
        );
        assert_eq!(ClientMessage::parse("ANSWER"), None);
        assert_eq!(ClientMessage::parse("ANSWER:A:B"), None);
        assert_eq!(ClientMessage::parse("hello"), None);
    }

    #[test]
    fn test_unrecognized_line_is_announcement() {
        match ServerMessage::parse("The winner(s): alice with 2 points!") {
            ServerMessage::Announcement { text } => {
                assert_eq!(text, "The winner(s): alice with 2 points!")
            }
            other => panic!("Unexpected message: {:?}", other),
        }
    }
}
