//! Display percentages derived from question tallies. Never stored.

use serde::{Deserialize, Serialize};

use crate::model::{mongodb::Id, question::Question};

/// `floor(count / total * 100)`, or 0 when nothing has been cast.
pub fn percentage(count: u64, total: u64) -> u8 {
    if total == 0 {
        return 0;
    }
    let percent = u128::from(count) * 100 / u128::from(total);
    u8::try_from(percent.min(100)).unwrap_or(100)
}

/// A single option as presented to voters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionView {
    pub slot: usize,
    pub label: String,
    pub votes: u64,
    pub percentage: u8,
}

/// A question with live percentages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionView {
    pub id: Id,
    pub text: String,
    pub total_votes: u64,
    pub options: Vec<OptionView>,
}

impl From<&Question> for QuestionView {
    fn from(question: &Question) -> Self {
        let total = question.total_votes();
        let options = question
            .occupied()
            .map(|(slot, option)| OptionView {
                slot,
                label: option.label.clone(),
                votes: option.votes,
                percentage: percentage(option.votes, total),
            })
            .collect();
        Self {
            id: question.id,
            text: question.text.clone(),
            total_votes: total,
            options,
        }
    }
}
