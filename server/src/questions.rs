//! Question source: loads the on-disk question file
//!
//! The file holds questions as blocks of five non-empty lines: prompt,
//! option A, option B, option C, and the correct label as a bare `A`/`B`/`C`
//! line. Blank lines are skipped. When fewer questions exist in the file
//! than requested, loading cycles through the blocks in order.

use log::info;
use shared::{Label, Question};
use std::fmt;
use std::fs;
use std::io;
use std::path::Path;

/// Lines per question block in the file format.
const BLOCK_LINES: usize = 5;

#[derive(Debug)]
pub enum QuestionFileError {
    Io(io::Error),
    /// The file holds no complete five-line block.
    Empty,
    /// A block's fifth line is not a bare `A`/`B`/`C` label.
    BadLabel { block: usize, found: String },
}

impl fmt::Display for QuestionFileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QuestionFileError::Io(e) => write!(f, "could not read the question file: {}", e),
            QuestionFileError::Empty => {
                write!(f, "the question file holds no complete question block")
            }
            QuestionFileError::BadLabel { block, found } => write!(
                f,
                "question block {} has an invalid correct-answer label {:?} (expected A, B or C)",
                block, found
            ),
        }
    }
}

impl std::error::Error for QuestionFileError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            QuestionFileError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for QuestionFileError {
    fn from(e: io::Error) -> Self {
        QuestionFileError::Io(e)
    }
}

/// Loads `count` questions from the file at `path`, cycling through the
/// file's blocks when it holds fewer than requested.
pub fn load_questions(
    path: impl AsRef<Path>,
    count: usize,
) -> Result<Vec<Question>, QuestionFileError> {
    let path = path.as_ref();
    let text = fs::read_to_string(path)?;

    let lines: Vec<&str> = text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();
    let total_in_file = lines.len() / BLOCK_LINES;
    if total_in_file == 0 {
        return Err(QuestionFileError::Empty);
    }

    let mut parsed = Vec::with_capacity(total_in_file);
    for block in 0..total_in_file {
        let base = block * BLOCK_LINES;
        let label_line = lines[base + 4];
        let correct = Label::parse(label_line).ok_or_else(|| QuestionFileError::BadLabel {
            block: block + 1,
            found: label_line.to_string(),
        })?;
        parsed.push(Question {
            prompt: lines[base].to_string(),
            option_a: lines[base + 1].to_string(),
            option_b: lines[base + 2].to_string(),
            option_c: lines[base + 3].to_string(),
            correct,
        });
    }
    info!(
        "File {} opened successfully ({} questions)",
        path.display(),
        total_in_file
    );

    Ok((0..count).map(|q| parsed[q % total_in_file].clone()).collect())
}
