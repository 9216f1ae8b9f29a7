use std::ops::{Deref, DerefMut};

use serde::{Deserialize, Serialize};

use crate::model::mongodb::Id;

/// The most options a single question may offer.
pub const MAX_OPTIONS: usize = 15;

/// One answer to a question, with its running tally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollOption {
    pub label: String,
    #[serde(default)]
    pub votes: u64,
}

impl PollOption {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            votes: 0,
        }
    }

    pub fn with_votes(label: impl Into<String>, votes: u64) -> Self {
        Self {
            label: label.into(),
            votes,
        }
    }
}

/// Core question data, as stored in the database.
///
/// Options live in positional slots; an empty slot is simply absent from
/// totals and from the rendered question. Documents with more than
/// [`MAX_OPTIONS`] slots are refused when loaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "UncheckedQuestion")]
pub struct QuestionCore {
    pub text: String,
    pub options: Vec<Option<PollOption>>,
}

/// A question as read, before its slots are counted.
#[derive(Deserialize)]
struct UncheckedQuestion {
    text: String,
    options: Vec<Option<PollOption>>,
}

impl TryFrom<UncheckedQuestion> for QuestionCore {
    type Error = String;

    fn try_from(question: UncheckedQuestion) -> Result<Self, Self::Error> {
        if question.options.len() > MAX_OPTIONS {
            return Err(format!(
                "question {:?} has {} option slots, at most {MAX_OPTIONS} are allowed",
                question.text,
                question.options.len()
            ));
        }
        Ok(Self {
            text: question.text,
            options: question.options,
        })
    }
}

impl QuestionCore {
    /// Find the slot holding the option with exactly this label.
    pub fn slot_of(&self, label: &str) -> Option<usize> {
        self.options
            .iter()
            .position(|slot| matches!(slot, Some(option) if option.label == label))
    }

    /// Occupied slots, with their positions.
    pub fn occupied(&self) -> impl Iterator<Item = (usize, &PollOption)> {
        self.options
            .iter()
            .enumerate()
            .filter_map(|(slot, option)| option.as_ref().map(|option| (slot, option)))
    }

    /// Total votes cast across all options.
    pub fn total_votes(&self) -> u64 {
        self.occupied().map(|(_, option)| option.votes).sum()
    }
}

/// A question without an ID.
pub type NewQuestion = QuestionCore;

/// A question from the database, with its unique ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub question: QuestionCore,
}

impl Deref for Question {
    type Target = QuestionCore;

    fn deref(&self) -> &Self::Target {
        &self.question
    }
}

impl DerefMut for Question {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.question
    }
}

/// Example data for tests.
#[cfg(test)]
mod examples {
    use super::*;

    impl QuestionCore {
        pub fn example() -> Self {
            Self::example_with_votes([3, 4, 5])
        }

        pub fn example_with_votes(votes: [u64; 3]) -> Self {
            Self {
                text: "Best dressed".to_string(),
                options: vec![
                    Some(PollOption::with_votes("OptionA", votes[0])),
                    Some(PollOption::with_votes("OptionB", votes[1])),
                    Some(PollOption::with_votes("OptionC", votes[2])),
                ],
            }
        }

        pub fn example2() -> Self {
            Self {
                text: "Most likely to succeed".to_string(),
                options: vec![
                    Some(PollOption::new("Ada")),
                    None,
                    Some(PollOption::new("Grace")),
                ],
            }
        }
    }

    impl Question {
        pub fn example() -> Self {
            Self {
                id: Id::new(),
                question: QuestionCore::example(),
            }
        }

        pub fn example2() -> Self {
            Self {
                id: Id::new(),
                question: QuestionCore::example2(),
            }
        }
    }
}
