use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::model::mongodb::{serde_string_map, Id};

/// In-progress selections for one voting session: question to chosen option label.
/// Never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Ballot {
    #[serde(with = "serde_string_map")]
    selections: BTreeMap<Id, String>,
}

impl Ballot {
    /// Choose an option for a question, replacing any earlier choice.
    /// Returns the replaced choice, if there was one.
    pub fn select(&mut self, question: Id, option: impl Into<String>) -> Option<String> {
        self.selections.insert(question, option.into())
    }

    pub fn choice(&self, question: Id) -> Option<&str> {
        self.selections.get(&question).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.selections.is_empty()
    }

    pub fn len(&self) -> usize {
        self.selections.len()
    }

    pub fn clear(&mut self) {
        self.selections.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = (Id, &str)> {
        self.selections
            .iter()
            .map(|(question, option)| (*question, option.as_str()))
    }

    pub fn questions(&self) -> Vec<Id> {
        self.selections.keys().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_write_wins() {
        let question = Id::new();
        let mut ballot = Ballot::default();
        assert!(ballot.is_empty());
        assert_eq!(None, ballot.select(question, "A"));
        assert_eq!(Some("A".to_string()), ballot.select(question, "B"));
        assert_eq!(Some("B"), ballot.choice(question));
        assert_eq!(1, ballot.len());
        ballot.clear();
        assert!(ballot.is_empty());
    }

    #[test]
    fn keys_are_hex_strings() {
        let question = Id::new();
        let mut ballot = Ballot::default();
        ballot.select(question, "A");
        let json = rocket::serde::json::serde_json::to_value(&ballot).unwrap();
        assert_eq!(Some("A"), json[question.to_string()].as_str());
        let back: Ballot = rocket::serde::json::serde_json::from_value(json).unwrap();
        assert_eq!(ballot, back);
    }
}
