use std::ops::Deref;

use chrono::{DateTime, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use serde::{Deserialize, Serialize};

use crate::identity::Identity;
use crate::model::mongodb::Id;

/// Durable proof that an identity has voted. At most one exists per identity,
/// enforced by a unique index; it is never updated or deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteReceiptCore {
    pub identity: Identity,
    /// The account that submitted the vote.
    pub user_id: Id,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub timestamp: DateTime<Utc>,
    /// Every question the ballot answered, whether or not the answer matched an option.
    pub voted_questions: Vec<Id>,
}

impl VoteReceiptCore {
    pub fn new(identity: Identity, user_id: Id, voted_questions: Vec<Id>) -> Self {
        Self {
            identity,
            user_id,
            timestamp: Utc::now(),
            voted_questions,
        }
    }
}

/// A receipt without an ID.
pub type NewVoteReceipt = VoteReceiptCore;

/// A receipt from the database, with its unique ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteReceipt {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub receipt: VoteReceiptCore,
}

impl Deref for VoteReceipt {
    type Target = VoteReceiptCore;

    fn deref(&self) -> &Self::Target {
        &self.receipt
    }
}
