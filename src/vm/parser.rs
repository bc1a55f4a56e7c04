// Program text parser: comma-separated integer listing -> initial memory image

use std::str::FromStr;

use super::error::ProgramError;

/// A parsed program listing: the integers seeding memory addresses `0..n`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Program {
    words: Vec<i64>,
}

impl Program {
    /// Parse a comma-separated listing. Whitespace around tokens (including a
    /// trailing newline from a file) is insignificant.
    pub fn parse(text: &str) -> Result<Program, ProgramError> {
        let mut words = Vec::new();
        for (index, token) in text.trim().split(',').enumerate() {
            let token = token.trim();
            let word = token
                .parse::<i64>()
                .map_err(|_| ProgramError::MalformedProgram {
                    index,
                    token: token.to_string(),
                })?;
            words.push(word);
        }
        Ok(Program { words })
    }

    pub fn from_words(words: Vec<i64>) -> Program {
        Program { words }
    }

    pub fn words(&self) -> &[i64] {
        &self.words
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}

impl FromStr for Program {
    type Err = ProgramError;

    fn from_str(text: &str) -> Result<Program, ProgramError> {
        Program::parse(text)
    }
}
